/// Non-blank corpus lines per page.
pub const LINES_PER_PAGE: usize = 45;

/// Split a line into lowercase word tokens.
///
/// A double hyphen and every character outside the Cyrillic alphabet (other
/// than a single hyphen) separate tokens, so hyphenated compounds survive.
pub fn tokenize(line: &str) -> Vec<String> {
    let lower = line.to_lowercase();
    let mut cleaned = String::with_capacity(lower.len());
    let mut chars = lower.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '-' && chars.peek() == Some(&'-') {
            chars.next();
            cleaned.push(' ');
        } else if is_word_char(c) {
            cleaned.push(c);
        } else {
            cleaned.push(' ');
        }
    }

    cleaned
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// One-based page of a zero-based line number.
pub fn page_of_line(line: usize) -> usize {
    line / LINES_PER_PAGE + 1
}

fn is_word_char(c: char) -> bool {
    matches!(c, 'а'..='я' | 'ё' | '-')
}
