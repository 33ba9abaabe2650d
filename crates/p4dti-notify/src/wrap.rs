//! Word-wraps a report body at a fixed column count.
//!
//! All administrative and user-facing notifications are routed through
//! this one function, so every report reads the same regardless of
//! which caller composed it. Paragraphs (blank-line-separated) wrap
//! independently; a single word longer than the column count is left
//! unbroken rather than split mid-word.

pub const DEFAULT_WRAP_COLUMN: usize = 72;

pub fn wrap(body: &str, column: usize) -> String {
    body.split("\n\n")
        .map(|paragraph| wrap_paragraph(paragraph, column))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn wrap_paragraph(paragraph: &str, column: usize) -> String {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in paragraph.split_whitespace() {
        let candidate_len = if current.is_empty() { word.len() } else { current.len() + 1 + word.len() };
        if candidate_len > column && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_at_column() {
        let body = "the quick brown fox jumps over the lazy dog and keeps going";
        let wrapped = wrap(body, 20);
        for line in wrapped.lines() {
            assert!(line.len() <= 20, "line too long: {line:?}");
        }
    }

    #[test]
    fn preserves_paragraph_breaks() {
        let body = "first paragraph here\n\nsecond paragraph here";
        let wrapped = wrap(body, 72);
        assert_eq!(wrapped, body);
    }

    #[test]
    fn overlong_word_is_not_split() {
        let body = "a-single-word-that-exceeds-the-configured-wrap-column-by-itself short";
        let wrapped = wrap(body, 20);
        assert!(wrapped.lines().next().unwrap().len() > 20);
    }
}
