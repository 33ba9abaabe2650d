//! The enum translator: keyword-translated, with the empty side-0 value
//! mapped to the side-1 sentinel `NONE`.

use crate::error::Result;
use crate::keyword;

const NONE_SENTINEL: &str = "NONE";

pub fn to_1(value: &str) -> String {
    if value.is_empty() {
        return NONE_SENTINEL.to_string();
    }
    keyword::to_1(value)
}

pub fn to_0(value: &str) -> Result<String> {
    if value == NONE_SENTINEL {
        return Ok(String::new());
    }
    keyword::to_0(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_maps_to_none_sentinel() {
        assert_eq!(to_1(""), "NONE");
        assert_eq!(to_0("NONE").unwrap(), "");
    }

    #[test]
    fn nonempty_roundtrips_through_keyword() {
        let encoded = to_1("priority one");
        assert_eq!(encoded, "priority_one");
        assert_eq!(to_0(&encoded).unwrap(), "priority one");
    }
}
