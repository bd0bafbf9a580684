//! Input validation shared by the REST layer and store-level transforms.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidateError {
    #[error("too short")]
    TooShort,

    #[error("too long")]
    TooLong,

    #[error("invalid date")]
    InvalidDate,

    #[error("invalid time")]
    InvalidTime,

    #[error("invalid calendar mode")]
    InvalidCalendarMode,
}

/// Check a string's byte length against inclusive bounds.
pub fn check_len(input: &str, min: usize, max: usize) -> Result<(), ValidateError> {
    if input.len() < min {
        return Err(ValidateError::TooShort);
    }
    if input.len() > max {
        return Err(ValidateError::TooLong);
    }
    Ok(())
}

/// Parse a date like `2024-02-15`.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

/// Parse a wall-clock time like `18:30`.
pub fn parse_clock(input: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(input, "%H:%M").ok()
}

pub fn check_date(input: &str) -> Result<(), ValidateError> {
    parse_date(input).map(|_| ()).ok_or(ValidateError::InvalidDate)
}

pub fn check_clock(input: &str) -> Result<(), ValidateError> {
    parse_clock(input).map(|_| ()).ok_or(ValidateError::InvalidTime)
}

/// How a group's calendar is displayed: a recurring week or a fixed date
/// range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarMode {
    DayOfWeek,
    Range { start: NaiveDate, end: NaiveDate },
}

/// Parse a calendar mode: either the literal `dayOfWeek` or
/// `<date> to <date>`.
pub fn parse_calendar_mode(input: &str) -> Option<CalendarMode> {
    if input == "dayOfWeek" {
        return Some(CalendarMode::DayOfWeek);
    }
    let mut segments = input.splitn(2, " to ");
    let start = parse_date(segments.next()?)?;
    let end = parse_date(segments.next()?)?;
    Some(CalendarMode::Range { start, end })
}

pub fn check_calendar_mode(input: &str) -> Result<(), ValidateError> {
    parse_calendar_mode(input)
        .map(|_| ())
        .ok_or(ValidateError::InvalidCalendarMode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_bounds() {
        assert_eq!(check_len("", 1, 5), Err(ValidateError::TooShort));
        assert_eq!(check_len("abcdef", 1, 5), Err(ValidateError::TooLong));
        assert!(check_len("abc", 1, 5).is_ok());
    }

    #[test]
    fn dates_and_clocks() {
        assert!(parse_date("2024-02-15").is_some());
        assert!(parse_date("2024-2-15").is_none());
        assert!(parse_date("15/02/2024").is_none());
        assert!(parse_clock("18:00").is_some());
        assert!(parse_clock("25:00").is_none());
    }

    #[test]
    fn calendar_modes() {
        assert_eq!(parse_calendar_mode("dayOfWeek"), Some(CalendarMode::DayOfWeek));
        assert!(matches!(
            parse_calendar_mode("2024-02-01 to 2024-02-29"),
            Some(CalendarMode::Range { .. })
        ));
        assert_eq!(parse_calendar_mode("2024-02-01"), None);
        assert_eq!(parse_calendar_mode("yesterday to tomorrow"), None);
    }
}
