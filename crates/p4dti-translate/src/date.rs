//! Date and timestamp translators.
//!
//! Side 0 stores `YYYY-MM-DD HH:MM:SS`; side 1 accepts either
//! `YYYY/MM/DD HH:MM:SS` or seconds-since-epoch, and the timestamp
//! translator additionally supports a packed `YYYYMMDDhhmmss` side-0
//! form.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{Result, TranslateError};

const SIDE0_DATE_FMT: &str = "%Y-%m-%d %H:%M:%S";
const SIDE1_DATE_FMT: &str = "%Y/%m/%d %H:%M:%S";
const SIDE0_TIMESTAMP_FMT: &str = "%Y%m%d%H%M%S";

/// The two accepted side-1 wire forms for a date/timestamp value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side1DateForm {
    Slashed,
    Epoch,
}

fn malformed(kind: &str, value: &str) -> TranslateError {
    TranslateError::Malformed { kind: kind.to_string(), value: value.to_string() }
}

pub mod date {
    use super::*;

    pub fn to_1(value: &str, form: Side1DateForm) -> Result<String> {
        let dt = NaiveDateTime::parse_from_str(value, SIDE0_DATE_FMT).map_err(|_| malformed("date", value))?;
        Ok(render(dt, form))
    }

    pub fn to_0(value: &str) -> Result<String> {
        parse_side1(value).map(|dt| dt.format(SIDE0_DATE_FMT).to_string())
    }
}

pub mod timestamp {
    use super::*;

    pub fn to_1(value: &str, form: Side1DateForm) -> Result<String> {
        let dt = NaiveDateTime::parse_from_str(value, SIDE0_TIMESTAMP_FMT).map_err(|_| malformed("timestamp", value))?;
        Ok(render(dt, form))
    }

    pub fn to_0(value: &str) -> Result<String> {
        parse_side1(value).map(|dt| dt.format(SIDE0_TIMESTAMP_FMT).to_string())
    }
}

fn render(dt: NaiveDateTime, form: Side1DateForm) -> String {
    match form {
        Side1DateForm::Slashed => dt.format(SIDE1_DATE_FMT).to_string(),
        Side1DateForm::Epoch => dt.and_utc().timestamp().to_string(),
    }
}

fn parse_side1(value: &str) -> Result<NaiveDateTime> {
    if let Ok(epoch) = value.parse::<i64>() {
        return Utc
            .timestamp_opt(epoch, 0)
            .single()
            .map(|dt: DateTime<Utc>| dt.naive_utc())
            .ok_or_else(|| malformed("epoch timestamp", value));
    }
    NaiveDateTime::parse_from_str(value, SIDE1_DATE_FMT).map_err(|_| malformed("side-1 date", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_roundtrips_through_slashed_form() {
        let s0 = "2024-03-05 10:30:00";
        let s1 = date::to_1(s0, Side1DateForm::Slashed).unwrap();
        assert_eq!(s1, "2024/03/05 10:30:00");
        assert_eq!(date::to_0(&s1).unwrap(), s0);
    }

    #[test]
    fn date_roundtrips_through_epoch_form() {
        let s0 = "2024-03-05 10:30:00";
        let s1 = date::to_1(s0, Side1DateForm::Epoch).unwrap();
        assert_eq!(date::to_0(&s1).unwrap(), s0);
    }

    #[test]
    fn timestamp_roundtrips_packed_form() {
        let s0 = "20240305103000";
        let s1 = timestamp::to_1(s0, Side1DateForm::Slashed).unwrap();
        assert_eq!(timestamp::to_0(&s1).unwrap(), s0);
    }

    #[test]
    fn malformed_date_is_an_error() {
        assert!(date::to_1("not-a-date", Side1DateForm::Slashed).is_err());
    }
}
