pub mod handlers;
pub mod index;
pub mod report;
pub mod tokenize;

pub use handlers::{AppState, router};
pub use index::{IndexError, TextIndex, WordFrequency};
pub use report::{WRAP_WIDTH, frequency_report, join_sections, wrap, write_report};
pub use tokenize::{LINES_PER_PAGE, page_of_line, tokenize};
