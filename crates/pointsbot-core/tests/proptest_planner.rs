use chrono::{Datelike, NaiveTime, TimeDelta, TimeZone, Utc, Weekday};
use chrono_tz::{Asia, Europe, Pacific, Tz};
use pointsbot_core::commands::parse_generate;
use pointsbot_core::slots::{plan_slots, GenerateRequest};
use proptest::prelude::*;

fn weekday_from(index: u8) -> Weekday {
    Weekday::try_from(index % 7).unwrap_or(Weekday::Mon)
}

/// Zones without daylight saving in the sampled years.
fn steady_zone() -> impl Strategy<Value = Tz> {
    prop::sample::select(vec![
        Tz::UTC,
        Europe::Moscow,
        Asia::Tokyo,
        Asia::Kolkata,
        Pacific::Honolulu,
    ])
}

fn dst_zone() -> impl Strategy<Value = Tz> {
    prop::sample::select(vec![
        Europe::Berlin,
        Europe::London,
        chrono_tz::America::New_York,
        chrono_tz::Australia::Sydney,
    ])
}

fn local_window(start_minute: u32, length: u32) -> Option<(NaiveTime, NaiveTime, u32)> {
    let end_minute = (start_minute + length).min(24 * 60 - 1);
    if end_minute <= start_minute {
        return None;
    }
    let start = NaiveTime::from_hms_opt(start_minute / 60, start_minute % 60, 0)?;
    let end = NaiveTime::from_hms_opt(end_minute / 60, end_minute % 60, 0)?;
    Some((start, end, end_minute - start_minute))
}

proptest! {
    /// Every planned slot fits the local window on the requested weekday.
    #[test]
    fn slots_fit_window(
        start_minute in 0u32..(23 * 60),
        length in 1u32..240,
        step in 1i64..180,
        weeks in 1u32..5,
        weekday in 0u8..7,
        tz in steady_zone(),
        now_secs in 1_700_000_000i64..1_900_000_000,
    ) {
        let window = local_window(start_minute, length);
        prop_assume!(window.is_some());
        let (start_time, end_time, minutes) = window.expect("window");
        let now = Utc.timestamp_opt(now_secs, 0).single().expect("instant");
        let request = GenerateRequest {
            owner_id: 1,
            group_id: 1,
            weekday: weekday_from(weekday),
            start_time,
            end_time,
            step: TimeDelta::minutes(step),
            weeks_ahead: weeks,
        };

        let slots = plan_slots(&request, now, tz).expect("valid request");

        let per_day = i64::from(minutes) / step;
        prop_assert_eq!(slots.len() as i64, per_day * i64::from(weeks));
        for slot in &slots {
            let local_start = slot.start_at.with_timezone(&tz);
            let local_end = slot.end_at.with_timezone(&tz);
            prop_assert_eq!(slot.end_at - slot.start_at, TimeDelta::minutes(step));
            prop_assert_eq!(local_start.weekday(), request.weekday);
            prop_assert!(local_start.time() >= start_time);
            prop_assert!(local_end.time() <= end_time);
            prop_assert!(local_start.date_naive() >= now.with_timezone(&tz).date_naive());
        }
    }

    /// Across DST switches every slot still starts inside the local window
    /// on the right weekday, lasts one step and never repeats an instant.
    #[test]
    fn slots_survive_dst_switches(
        start_minute in 0u32..(23 * 60),
        length in 1u32..240,
        step in 1i64..180,
        weeks in 1u32..5,
        weekday in 0u8..7,
        tz in dst_zone(),
        now_secs in 1_700_000_000i64..1_900_000_000,
    ) {
        let window = local_window(start_minute, length);
        prop_assume!(window.is_some());
        let (start_time, end_time, minutes) = window.expect("window");
        let now = Utc.timestamp_opt(now_secs, 0).single().expect("instant");
        let request = GenerateRequest {
            owner_id: 1,
            group_id: 1,
            weekday: weekday_from(weekday),
            start_time,
            end_time,
            step: TimeDelta::minutes(step),
            weeks_ahead: weeks,
        };

        let slots = plan_slots(&request, now, tz).expect("valid request");

        let per_day = i64::from(minutes) / step;
        prop_assert!(slots.len() as i64 <= per_day * i64::from(weeks));
        for pair in slots.windows(2) {
            prop_assert!(pair[0].start_at < pair[1].start_at);
        }
        for slot in &slots {
            let local_start = slot.start_at.with_timezone(&tz);
            prop_assert_eq!(slot.end_at - slot.start_at, TimeDelta::minutes(step));
            prop_assert_eq!(local_start.weekday(), request.weekday);
            prop_assert!(local_start.time() >= start_time);
            prop_assert!(local_start.time() < end_time);
        }
    }

    /// Argument parsing never panics on arbitrary input.
    #[test]
    fn parse_generate_does_not_crash(s in "\\PC*") {
        let _ = parse_generate(&s, 1);
    }
}
