//! A small `LIKE`-style glob matcher for the issue-store's
//! `accept_product_pattern` predicate: `*` matches any run of
//! characters, everything else matches literally. Good enough for the
//! single-wildcard and prefix/suffix patterns sites actually configure.

pub fn matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match_parts(pattern.split('*').collect::<Vec<_>>().as_slice(), value, pattern.starts_with('*'), pattern.ends_with('*'))
}

fn match_parts(parts: &[&str], value: &str, leading_wildcard: bool, trailing_wildcard: bool) -> bool {
    let parts: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return true;
    }

    let mut rest = value;
    for (i, part) in parts.iter().enumerate() {
        let is_first = i == 0;
        let is_last = i == parts.len() - 1;
        match rest.find(part) {
            Some(pos) => {
                if is_first && !leading_wildcard && pos != 0 {
                    return false;
                }
                rest = &rest[pos + part.len()..];
            }
            None => return false,
        }
        if is_last && !trailing_wildcard && !rest.is_empty() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_alone_matches_everything() {
        assert!(matches("*", "anything"));
    }

    #[test]
    fn exact_match_with_no_wildcard() {
        assert!(matches("Widgets", "Widgets"));
        assert!(!matches("Widgets", "Gadgets"));
    }

    #[test]
    fn prefix_wildcard() {
        assert!(matches("*gets", "Widgets"));
        assert!(!matches("*gets", "Widgex"));
    }

    #[test]
    fn suffix_wildcard() {
        assert!(matches("Wid*", "Widgets"));
        assert!(!matches("Wid*", "Gadgets"));
    }

    #[test]
    fn both_sides_wildcard() {
        assert!(matches("*idge*", "Widgets"));
    }
}
