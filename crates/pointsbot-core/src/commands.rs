//! Platform-agnostic parsing of slot command arguments
//!
//! Each transport extracts the argument text of a command and hands it
//! here. The result maps 1:1 onto a booking operation.

use crate::slots::GenerateRequest;
use chrono::{NaiveDate, NaiveTime, TimeDelta, Weekday};
use thiserror::Error;

/// Weeks generated when the command does not say.
pub const DEFAULT_GENERATE_WEEKS: u32 = 1;
/// Upper bound on weeks generated by one command.
pub const MAX_GENERATE_WEEKS: u32 = 26;

const BOOK_CALLBACK_PREFIX: &str = "book:";

/// Errors parsing command arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Wrong number of arguments
    #[error("usage: {0}")]
    Usage(&'static str),
    /// An argument could not be parsed
    #[error("invalid {field}: {value}")]
    Invalid {
        /// Argument name
        field: &'static str,
        /// Raw text
        value: String,
    },
    /// Too many weeks requested
    #[error("at most 26 weeks can be generated at once")]
    TooManyWeeks,
}

/// Usage line of `free`.
pub const FREE_USAGE: &str = "/free <teacher_id> [YYYY-MM-DD]";
/// Usage line of `book`.
pub const BOOK_USAGE: &str = "/book <slot_id>";
/// Usage line of `cancel`.
pub const CANCEL_USAGE: &str = "/cancel <slot_id>";
/// Usage line of `generate`.
pub const GENERATE_USAGE: &str =
    "/generate <weekday> <HH:MM> <HH:MM> <step_minutes> <group_id> [weeks]";

/// Arguments of "list free slots for owner X on date D".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeArgs {
    /// Staff member whose slots are listed
    pub owner_id: i64,
    /// Local date; `None` lists the coming week
    pub date: Option<NaiveDate>,
}

fn invalid(field: &'static str, value: &str) -> CommandError {
    CommandError::Invalid {
        field,
        value: value.to_string(),
    }
}

fn parse_id(field: &'static str, raw: &str) -> Result<i64, CommandError> {
    raw.parse().map_err(|_| invalid(field, raw))
}

fn parse_time(field: &'static str, raw: &str) -> Result<NaiveTime, CommandError> {
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| invalid(field, raw))
}

/// Parse `<owner_id> [YYYY-MM-DD]`.
///
/// # Errors
///
/// Returns a `CommandError` for missing or malformed arguments.
pub fn parse_free(args: &str) -> Result<FreeArgs, CommandError> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    match parts.as_slice() {
        [owner] => Ok(FreeArgs {
            owner_id: parse_id("teacher id", owner)?,
            date: None,
        }),
        [owner, date] => Ok(FreeArgs {
            owner_id: parse_id("teacher id", owner)?,
            date: Some(
                NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid("date", date))?,
            ),
        }),
        _ => Err(CommandError::Usage(FREE_USAGE)),
    }
}

/// Parse a single slot id, as taken by `book` and `cancel`.
///
/// # Errors
///
/// Returns a `CommandError` for missing or malformed arguments.
pub fn parse_slot_id(args: &str, usage: &'static str) -> Result<i64, CommandError> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    match parts.as_slice() {
        [id] => parse_id("slot id", id),
        _ => Err(CommandError::Usage(usage)),
    }
}

/// Parse `<weekday> <HH:MM> <HH:MM> <step_minutes> <group_id> [weeks]`
/// into a request for slots owned by `owner_id`.
///
/// Only the argument syntax is checked; the window and step are validated
/// by the planner.
///
/// # Errors
///
/// Returns a `CommandError` for missing or malformed arguments.
pub fn parse_generate(args: &str, owner_id: i64) -> Result<GenerateRequest, CommandError> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (weekday, start, end, step, group, weeks) = match parts.as_slice() {
        [weekday, start, end, step, group] => (weekday, start, end, step, group, None),
        [weekday, start, end, step, group, weeks] => {
            (weekday, start, end, step, group, Some(weeks))
        }
        _ => return Err(CommandError::Usage(GENERATE_USAGE)),
    };

    let weeks_ahead = match weeks {
        Some(raw) => raw.parse::<u32>().map_err(|_| invalid("weeks", raw))?,
        None => DEFAULT_GENERATE_WEEKS,
    };
    if weeks_ahead > MAX_GENERATE_WEEKS {
        return Err(CommandError::TooManyWeeks);
    }

    let step = step
        .parse::<i64>()
        .ok()
        .and_then(TimeDelta::try_minutes)
        .ok_or_else(|| invalid("step", step))?;

    Ok(GenerateRequest {
        owner_id,
        group_id: parse_id("group id", group)?,
        weekday: weekday
            .parse::<Weekday>()
            .map_err(|_| invalid("weekday", weekday))?,
        start_time: parse_time("start time", start)?,
        end_time: parse_time("end time", end)?,
        step,
        weeks_ahead,
    })
}

/// Callback payload of an inline "book" button.
#[must_use]
pub fn book_callback_data(slot_id: i64) -> String {
    format!("{BOOK_CALLBACK_PREFIX}{slot_id}")
}

/// Slot id of a "book" button payload.
#[must_use]
pub fn parse_book_callback(data: &str) -> Option<i64> {
    data.strip_prefix(BOOK_CALLBACK_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_free() {
        assert_eq!(
            parse_free("7"),
            Ok(FreeArgs {
                owner_id: 7,
                date: None
            })
        );
        assert_eq!(
            parse_free(" 7   2026-10-19 "),
            Ok(FreeArgs {
                owner_id: 7,
                date: NaiveDate::from_ymd_opt(2026, 10, 19),
            })
        );
        assert_eq!(parse_free(""), Err(CommandError::Usage(FREE_USAGE)));
        assert!(matches!(
            parse_free("7 19.10.2026"),
            Err(CommandError::Invalid { field: "date", .. })
        ));
    }

    #[test]
    fn test_parse_slot_id() {
        assert_eq!(parse_slot_id("42", BOOK_USAGE), Ok(42));
        assert_eq!(
            parse_slot_id("42 43", BOOK_USAGE),
            Err(CommandError::Usage(BOOK_USAGE))
        );
        assert!(parse_slot_id("abc", CANCEL_USAGE).is_err());
    }

    #[test]
    fn test_parse_generate() {
        let request = parse_generate("Mon 16:00 18:00 20 11", 7).expect("valid command");
        assert_eq!(request.owner_id, 7);
        assert_eq!(request.group_id, 11);
        assert_eq!(request.weekday, Weekday::Mon);
        assert_eq!(request.step, TimeDelta::minutes(20));
        assert_eq!(request.weeks_ahead, DEFAULT_GENERATE_WEEKS);
        assert_eq!(
            request.end_time,
            NaiveTime::from_hms_opt(18, 0, 0).expect("time")
        );

        let request = parse_generate("friday 09:30 12:00 30 2 4", 7).expect("valid command");
        assert_eq!(request.weekday, Weekday::Fri);
        assert_eq!(request.weeks_ahead, 4);
    }

    #[test]
    fn test_parse_generate_rejects_bad_input() {
        assert_eq!(
            parse_generate("Mon 16:00 18:00", 7),
            Err(CommandError::Usage(GENERATE_USAGE))
        );
        assert!(matches!(
            parse_generate("Someday 16:00 18:00 20 11", 7),
            Err(CommandError::Invalid {
                field: "weekday",
                ..
            })
        ));
        assert!(matches!(
            parse_generate("Mon 16h 18:00 20 11", 7),
            Err(CommandError::Invalid {
                field: "start time",
                ..
            })
        ));
        assert_eq!(
            parse_generate("Mon 16:00 18:00 20 11 52", 7),
            Err(CommandError::TooManyWeeks)
        );
    }

    #[test]
    fn test_book_callback_roundtrip() {
        assert_eq!(parse_book_callback(&book_callback_data(15)), Some(15));
        assert_eq!(parse_book_callback("cancel:15"), None);
        assert_eq!(parse_book_callback("book:x"), None);
    }
}
