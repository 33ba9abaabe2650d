//! The text translator.
//!
//! Side 0 stores text without a trailing newline; side 1 stores it with
//! one. Blank-only lines are normalised to empty on side-0 read, which
//! prevents side-1's own canonicalisation of those lines from causing a
//! spurious diff on the next poll (see the design notes on text-field
//! blank-line canonicalisation: deviating from this causes oscillating
//! replications).

pub fn to_1(value: &str) -> String {
    let mut s = value.to_string();
    if !s.ends_with('\n') {
        s.push('\n');
    }
    s
}

pub fn to_0(value: &str) -> String {
    let trimmed = value.strip_suffix('\n').unwrap_or(value);
    trimmed
        .lines()
        .map(|line| if line.trim().is_empty() { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_1_adds_trailing_newline() {
        assert_eq!(to_1("hello"), "hello\n");
        assert_eq!(to_1("hello\n"), "hello\n");
    }

    #[test]
    fn to_0_strips_trailing_newline() {
        assert_eq!(to_0("hello\n"), "hello");
    }

    #[test]
    fn to_0_normalises_blank_only_lines() {
        assert_eq!(to_0("one\n   \ntwo\n"), "one\n\ntwo");
    }
}
