//! The integer translator: decimal on both sides, with an empty side-1
//! value reading as zero on side 0.

use crate::error::{Result, TranslateError};

pub fn to_1(value: i64) -> String {
    value.to_string()
}

pub fn to_0(value: &str) -> Result<i64> {
    if value.is_empty() {
        return Ok(0);
    }
    value.parse().map_err(|_| TranslateError::Malformed {
        kind: "int".to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_side1_value_is_zero() {
        assert_eq!(to_0("").unwrap(), 0);
    }

    #[test]
    fn roundtrips() {
        assert_eq!(to_0(&to_1(42)).unwrap(), 42);
    }

    #[test]
    fn non_numeric_is_malformed() {
        assert!(to_0("abc").is_err());
    }
}
