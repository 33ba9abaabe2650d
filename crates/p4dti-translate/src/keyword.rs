//! The keyword translator: a bijection between an arbitrary side-0
//! string and a side-1 "word"-safe encoding.
//!
//! Whitespace becomes underscore (or a `\xNN` escape for anything other
//! than a plain space); the literal characters that the encoding itself
//! uses as punctuation (`_ ; / # "` and backslash) are backslash-escaped
//! so the mapping stays reversible.

const ESCAPED: &[char] = &['_', ';', '/', '#', '"'];

/// Encodes a side-0 value for side-1 storage.
pub fn to_1(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            c if ESCAPED.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            ' ' => out.push('_'),
            c if c.is_whitespace() => out.push_str(&format!("\\x{:02X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Decodes a side-1 value back to its side-0 form.
pub fn to_0(value: &str) -> super::error::Result<String> {
    let mut out = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => out.push('\\'),
                Some(c2) if ESCAPED.contains(&c2) => out.push(c2),
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    let code = u32::from_str_radix(&hex, 16).map_err(|_| malformed(value))?;
                    out.push(char::from_u32(code).ok_or_else(|| malformed(value))?);
                }
                _ => return Err(malformed(value)),
            },
            '_' => out.push(' '),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn malformed(value: &str) -> super::error::TranslateError {
    super::error::TranslateError::Malformed {
        kind: "keyword".to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(s: &str) {
        let encoded = to_1(s);
        assert_eq!(to_0(&encoded).unwrap(), s, "roundtrip failed for {s:?} (encoded {encoded:?})");
    }

    #[test]
    fn plain_word_is_unchanged() {
        assert_eq!(to_1("widget"), "widget");
    }

    #[test]
    fn space_becomes_underscore() {
        assert_eq!(to_1("foo bar"), "foo_bar");
    }

    #[test]
    fn literal_underscore_is_escaped() {
        assert_eq!(to_1("foo_bar"), "foo\\_bar");
    }

    #[test]
    fn tab_becomes_hex_escape() {
        assert_eq!(to_1("a\tb"), "a\\x09b");
    }

    #[test]
    fn roundtrips_representative_values() {
        for s in ["widget", "foo bar", "a_b;c/d#e\"f", "tab\there", "back\\slash"] {
            roundtrip(s);
        }
    }

    #[test]
    fn bad_escape_is_malformed() {
        assert!(to_0("foo\\qbar").is_err());
    }
}
