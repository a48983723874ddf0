use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::index::WordFrequency;

/// Line width used by the text reports.
pub const WRAP_WIDTH: usize = 120;

/// Greedy word wrap on spaces. Width counts characters, not bytes; a word
/// longer than `width` gets a line of its own.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// `"{label}: a, b, c"` wrapped to [`WRAP_WIDTH`].
pub(crate) fn wrapped_list<I, T>(label: &str, items: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: ToString,
{
    let joined = items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    wrap(&format!("{label}: {joined}"), WRAP_WIDTH)
}

/// One `"{word}: {n} occurrences"` line per ranked lemma.
pub fn frequency_report(items: &[WordFrequency]) -> Vec<String> {
    items
        .iter()
        .map(|f| format!("{}: {} occurrences", f.word, f.occurrences))
        .collect()
}

/// Reports for several words, separated by a blank line.
pub fn join_sections<I>(sections: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut lines = Vec::new();
    for (i, section) in sections.into_iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.extend(section);
    }
    lines
}

/// Write `lines` joined by `\n` to `output`, or to stdout when no path is given.
pub fn write_report(output: Option<&Path>, lines: &[String]) -> Result<()> {
    let text = lines.join("\n");
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!("report written to {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}
