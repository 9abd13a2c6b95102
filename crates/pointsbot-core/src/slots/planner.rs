use super::NewSlot;
use chrono::{
    DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc, Weekday,
};
use chrono_tz::Tz;
use thiserror::Error;

/// Errors for a generation request that cannot produce slots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The window does not start before it ends
    #[error("window start {start} is not before end {end}")]
    EmptyWindow {
        /// Requested start
        start: NaiveTime,
        /// Requested end
        end: NaiveTime,
    },
    /// Step is zero or negative
    #[error("step must be positive")]
    NonPositiveStep,
    /// No weeks requested
    #[error("at least one week is required")]
    NoWeeks,
    /// The computed date left chrono's range
    #[error("date out of range")]
    OutOfRange,
}

/// Weekly fixed-window generation of one staff member's slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Owning staff member
    pub owner_id: i64,
    /// Group the slots are offered to
    pub group_id: i64,
    /// Day of week of every generated slot
    pub weekday: Weekday,
    /// Local start of the daily window
    pub start_time: NaiveTime,
    /// Local end of the daily window
    pub end_time: NaiveTime,
    /// Slot length and spacing
    pub step: TimeDelta,
    /// Number of consecutive weeks
    pub weeks_ahead: u32,
}

impl GenerateRequest {
    /// Check the preconditions of generation.
    ///
    /// # Errors
    ///
    /// Returns the first violated precondition.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.start_time >= self.end_time {
            return Err(PlanError::EmptyWindow {
                start: self.start_time,
                end: self.end_time,
            });
        }
        if self.step <= TimeDelta::zero() {
            return Err(PlanError::NonPositiveStep);
        }
        if self.weeks_ahead == 0 {
            return Err(PlanError::NoWeeks);
        }
        Ok(())
    }
}

/// Compute the slots a request describes.
///
/// Starts at the first local date on or after `now` that falls on the
/// requested weekday. Within each day the window is walked in `step`
/// increments of wall-clock time; a slot that would cross `end_time` is not
/// emitted.
///
/// Around a daylight-saving change a start that does not exist locally is
/// skipped and an ambiguous start takes its earlier instant. Every slot
/// lasts exactly `step`.
///
/// # Errors
///
/// Returns a `PlanError` if the request is invalid.
pub fn plan_slots(
    request: &GenerateRequest,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<Vec<NewSlot>, PlanError> {
    request.validate()?;

    let today = now.with_timezone(&tz).date_naive();
    let first = next_weekday_on_or_after(today, request.weekday)?;
    let mut slots = Vec::new();

    for week in 0..request.weeks_ahead {
        let date = first
            .checked_add_days(Days::new(7 * u64::from(week)))
            .ok_or(PlanError::OutOfRange)?;
        let window_end = date.and_time(request.end_time);
        let mut cursor = date.and_time(request.start_time);

        loop {
            let Some(end) = cursor.checked_add_signed(request.step) else {
                break;
            };
            if end > window_end {
                break;
            }
            if let Some(start_at) = to_utc(cursor, tz) {
                slots.push(NewSlot {
                    owner_id: request.owner_id,
                    group_id: request.group_id,
                    start_at,
                    end_at: start_at + request.step,
                });
            }
            cursor = end;
        }
    }

    Ok(slots)
}

fn next_weekday_on_or_after(date: NaiveDate, weekday: Weekday) -> Result<NaiveDate, PlanError> {
    let ahead = (weekday.num_days_from_monday() + 7 - date.weekday().num_days_from_monday()) % 7;
    date.checked_add_days(Days::new(u64::from(ahead)))
        .ok_or(PlanError::OutOfRange)
}

/// `None` inside a spring-forward gap.
fn to_utc(local: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    local
        .and_local_timezone(tz)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn monday_request(weeks: u32) -> GenerateRequest {
        GenerateRequest {
            owner_id: 7,
            group_id: 11,
            weekday: Weekday::Mon,
            start_time: time(16, 0),
            end_time: time(18, 0),
            step: TimeDelta::minutes(20),
            weeks_ahead: weeks,
        }
    }

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .expect("valid instant")
    }

    const fn utc() -> Tz {
        Tz::UTC
    }

    #[test]
    fn test_monday_window_yields_six_slots() {
        // 2026-10-14 is a Wednesday
        let now = at(2026, 10, 14, 9, 0, 0);
        let slots = plan_slots(&monday_request(1), now, utc()).expect("plan");

        let starts: Vec<String> = slots
            .iter()
            .map(|s| s.start_at.format("%Y-%m-%d %H:%M").to_string())
            .collect();
        assert_eq!(
            starts,
            vec![
                "2026-10-19 16:00",
                "2026-10-19 16:20",
                "2026-10-19 16:40",
                "2026-10-19 17:00",
                "2026-10-19 17:20",
                "2026-10-19 17:40",
            ]
        );
        for slot in &slots {
            assert_eq!(slot.end_at - slot.start_at, TimeDelta::minutes(20));
        }
        assert_eq!(slots[5].end_at, at(2026, 10, 19, 18, 0, 0));
    }

    #[test]
    fn test_same_weekday_starts_today() {
        let now = at(2026, 10, 19, 8, 0, 0);
        let slots = plan_slots(&monday_request(1), now, utc()).expect("plan");
        assert_eq!(slots[0].start_at.date_naive(), now.date_naive());
    }

    #[test]
    fn test_partial_slot_is_not_emitted() {
        let now = at(2026, 10, 14, 9, 0, 0);
        let request = GenerateRequest {
            step: TimeDelta::minutes(45),
            ..monday_request(1)
        };
        // 16:00, 16:45; 17:30 would end at 18:15
        assert_eq!(plan_slots(&request, now, utc()).expect("plan").len(), 2);
    }

    #[test]
    fn test_weeks_are_seven_days_apart() {
        let now = at(2026, 10, 14, 9, 0, 0);
        let slots = plan_slots(&monday_request(3), now, utc()).expect("plan");
        assert_eq!(slots.len(), 18);
        assert_eq!(slots[6].start_at - slots[0].start_at, TimeDelta::days(7));
        assert_eq!(slots[12].start_at - slots[0].start_at, TimeDelta::days(14));
    }

    #[test]
    fn test_local_zone_shifts_date_and_instant() {
        // 22:30 UTC on Sunday is already Monday in Moscow
        let now = at(2026, 10, 18, 22, 30, 0);
        let slots = plan_slots(&monday_request(1), now, Europe::Moscow).expect("plan");
        assert_eq!(slots[0].start_at, at(2026, 10, 19, 13, 0, 0));
    }

    #[test]
    fn test_wall_clock_is_kept_across_dst_end() {
        // Berlin leaves summer time on 2026-10-25
        let now = at(2026, 10, 14, 9, 0, 0);
        let slots = plan_slots(&monday_request(2), now, Europe::Berlin).expect("plan");
        assert_eq!(slots.len(), 12);
        assert_eq!(slots[0].start_at, at(2026, 10, 19, 14, 0, 0));
        assert_eq!(slots[6].start_at, at(2026, 10, 26, 15, 0, 0));
        for slot in &slots {
            let local = slot.start_at.with_timezone(&Europe::Berlin);
            assert!(local.time() >= time(16, 0));
            assert!(local.time() < time(18, 0));
        }
    }

    #[test]
    fn test_spring_forward_gap_is_skipped() {
        // 2026-03-29 is a Sunday; Berlin clocks jump from 02:00 to 03:00
        let now = at(2026, 3, 25, 9, 0, 0);
        let request = GenerateRequest {
            weekday: Weekday::Sun,
            start_time: time(1, 0),
            end_time: time(4, 0),
            step: TimeDelta::minutes(30),
            ..monday_request(1)
        };
        let slots = plan_slots(&request, now, Europe::Berlin).expect("plan");
        let starts: Vec<DateTime<Utc>> = slots.iter().map(|s| s.start_at).collect();
        assert_eq!(
            starts,
            vec![
                at(2026, 3, 29, 0, 0, 0),
                at(2026, 3, 29, 0, 30, 0),
                at(2026, 3, 29, 1, 0, 0),
                at(2026, 3, 29, 1, 30, 0),
            ]
        );
        for slot in &slots {
            assert_eq!(slot.end_at - slot.start_at, TimeDelta::minutes(30));
        }
    }

    #[test]
    fn test_ambiguous_fall_back_start_takes_earlier_instant() {
        // 02:00-03:00 happens twice in Berlin on 2026-10-25
        let now = at(2026, 10, 21, 9, 0, 0);
        let request = GenerateRequest {
            weekday: Weekday::Sun,
            start_time: time(2, 0),
            end_time: time(3, 0),
            step: TimeDelta::minutes(30),
            ..monday_request(1)
        };
        let slots = plan_slots(&request, now, Europe::Berlin).expect("plan");
        let starts: Vec<DateTime<Utc>> = slots.iter().map(|s| s.start_at).collect();
        assert_eq!(
            starts,
            vec![at(2026, 10, 25, 0, 0, 0), at(2026, 10, 25, 0, 30, 0)]
        );
    }

    #[test]
    fn test_invalid_requests_are_rejected() {
        let now = Utc::now();
        let inverted = GenerateRequest {
            start_time: time(18, 0),
            end_time: time(16, 0),
            ..monday_request(1)
        };
        assert!(matches!(
            plan_slots(&inverted, now, utc()),
            Err(PlanError::EmptyWindow { .. })
        ));

        let zero_step = GenerateRequest {
            step: TimeDelta::zero(),
            ..monday_request(1)
        };
        assert_eq!(
            plan_slots(&zero_step, now, utc()),
            Err(PlanError::NonPositiveStep)
        );

        assert_eq!(
            plan_slots(&monday_request(0), now, utc()),
            Err(PlanError::NoWeeks)
        );
    }
}
