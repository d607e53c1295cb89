use crate::error::{invalid_event_error, AppResult};
use chrono::{DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime};

/// Source of the current local time
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock that always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Parse time string in HH:MM format
pub fn parse_time(time_str: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hour = parts[0].parse::<u32>().ok()?;
    let minute = parts[1].parse::<u32>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// Split a YYYY-MM-DD string into its numeric parts without range checks
pub fn parse_date_parts(date_str: &str) -> Option<(i32, i32, i32)> {
    let parts: Vec<&str> = date_str.trim().split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let year = parts[0].trim().parse::<i32>().ok()?;
    let month = parts[1].trim().parse::<i32>().ok()?;
    let day = parts[2].trim().parse::<i32>().ok()?;
    Some((year, month, day))
}

/// Build a date, letting out-of-range months and days spill over into the
/// neighbouring months and years (month 13 is January of the next year,
/// April 31 is May 1, day 0 is the last day of the previous month).
pub fn rollover_date(year: i32, month: i32, day: i32) -> Option<NaiveDate> {
    let first_of_year = NaiveDate::from_ymd_opt(year, 1, 1)?;

    let month_offset = month.checked_sub(1)?;
    let first_of_month = if month_offset >= 0 {
        first_of_year.checked_add_months(Months::new(month_offset.unsigned_abs()))?
    } else {
        first_of_year.checked_sub_months(Months::new(month_offset.unsigned_abs()))?
    };

    let day_offset = i64::from(day) - 1;
    first_of_month.checked_add_signed(Duration::try_days(day_offset)?)
}

/// Move a date from the notes into the present or future.
///
/// A year before the current one is replaced by the current year. If the
/// resulting date (at local midnight) is still before `now`, it is moved
/// one year forward.
pub fn normalize_event_date(date_str: &str, now: NaiveDateTime) -> AppResult<NaiveDate> {
    let (year, month, day) = parse_date_parts(date_str)
        .ok_or_else(|| invalid_event_error(&format!("date '{}' is not YYYY-MM-DD", date_str)))?;

    let current_year = now.year();
    let year = if year < current_year { current_year } else { year };

    let out_of_range = || invalid_event_error(&format!("date '{}' is out of range", date_str));
    let mut date = rollover_date(year, month, day).ok_or_else(out_of_range)?;

    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(out_of_range)?;
    if midnight < now {
        date = rollover_date(date.year() + 1, date.month() as i32, date.day() as i32)
            .ok_or_else(out_of_range)?;
    }

    Ok(date)
}

/// Normalize a date and render it as YYYYMMDD
pub fn adjust_event_date(date_str: &str, now: NaiveDateTime) -> AppResult<String> {
    Ok(normalize_event_date(date_str, now)?
        .format("%Y%m%d")
        .to_string())
}

/// Render an HH:MM time as HHMM
pub fn compact_time(time_str: &str) -> AppResult<String> {
    shift_time(time_str, 0)
}

/// Add minutes to an HH:MM time and render the result as HHMM.
/// Overflow past midnight wraps around and the day is dropped.
pub fn shift_time(time_str: &str, minutes: i64) -> AppResult<String> {
    let (hour, minute) = parse_time(time_str)
        .ok_or_else(|| invalid_event_error(&format!("time '{}' is not HH:MM", time_str)))?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| invalid_event_error(&format!("time '{}' is out of range", time_str)))?;
    let offset = Duration::try_minutes(minutes)
        .ok_or_else(|| invalid_event_error(&format!("offset of {} minutes is too large", minutes)))?;

    let (shifted, _days) = time.overflowing_add_signed(offset);
    Ok(shifted.format("%H%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_time() {
        // Valid cases
        assert_eq!(parse_time("00:00"), Some((0, 0)));
        assert_eq!(parse_time("12:30"), Some((12, 30)));
        assert_eq!(parse_time("23:59"), Some((23, 59)));
        assert_eq!(parse_time("9:05"), Some((9, 5)));

        // Invalid cases
        assert_eq!(parse_time("24:00"), None); // Hour out of range
        assert_eq!(parse_time("12:60"), None); // Minute out of range
        assert_eq!(parse_time("12:30:45"), None); // Too many parts
        assert_eq!(parse_time("12"), None); // Too few parts
        assert_eq!(parse_time("12:ab"), None); // Invalid minute
        assert_eq!(parse_time("ab:30"), None); // Invalid hour
    }

    #[test]
    fn test_parse_date_parts() {
        assert_eq!(parse_date_parts("2025-03-24"), Some((2025, 3, 24)));
        assert_eq!(parse_date_parts("2025-13-40"), Some((2025, 13, 40)));
        assert_eq!(parse_date_parts("2025/03/24"), None);
        assert_eq!(parse_date_parts("2025-03"), None);
        assert_eq!(parse_date_parts("tomorrow"), None);
    }

    #[test]
    fn test_rollover_date() {
        let ymd = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();

        assert_eq!(rollover_date(2025, 3, 24), Some(ymd(2025, 3, 24)));
        assert_eq!(rollover_date(2025, 13, 1), Some(ymd(2026, 1, 1)));
        assert_eq!(rollover_date(2025, 4, 31), Some(ymd(2025, 5, 1)));
        assert_eq!(rollover_date(2025, 3, 0), Some(ymd(2025, 2, 28)));
        assert_eq!(rollover_date(2025, 0, 15), Some(ymd(2024, 12, 15)));
        assert_eq!(rollover_date(2025, 2, 29), Some(ymd(2025, 3, 1)));
        assert_eq!(rollover_date(2024, 2, 29), Some(ymd(2024, 2, 29)));
    }

    #[test]
    fn test_past_year_is_corrected_and_pushed_forward() {
        // 2020-01-01 becomes 2025-01-01, which is already past on 2025-06-01
        let now = at(2025, 6, 1, 10, 0);
        assert_eq!(adjust_event_date("2020-01-01", now).unwrap(), "20260101");
    }

    #[test]
    fn test_past_year_with_upcoming_day_stays_this_year() {
        let now = at(2025, 6, 1, 10, 0);
        assert_eq!(adjust_event_date("2019-12-24", now).unwrap(), "20251224");
    }

    #[test]
    fn test_future_date_is_kept() {
        let now = at(2025, 6, 1, 10, 0);
        assert_eq!(adjust_event_date("2025-06-02", now).unwrap(), "20250602");
        assert_eq!(adjust_event_date("2027-02-10", now).unwrap(), "20270210");
    }

    #[test]
    fn test_current_year_past_date_moves_one_year() {
        let now = at(2025, 6, 1, 10, 0);
        assert_eq!(adjust_event_date("2025-05-31", now).unwrap(), "20260531");
    }

    #[test]
    fn test_today_counts_as_past_after_midnight() {
        // Local midnight of today is earlier than 10:00
        let now = at(2025, 6, 1, 10, 0);
        assert_eq!(adjust_event_date("2025-06-01", now).unwrap(), "20260601");

        // Exactly at midnight the date is not strictly earlier
        let midnight = at(2025, 6, 1, 0, 0);
        assert_eq!(adjust_event_date("2025-06-01", midnight).unwrap(), "20250601");
    }

    #[test]
    fn test_result_is_never_before_now() {
        let now = at(2025, 6, 1, 10, 0);
        for date in ["2001-01-01", "2024-12-31", "2025-06-01", "2023-06-02", "1999-11-30"] {
            let normalized = normalize_event_date(date, now).unwrap();
            assert!(normalized.year() >= 2025, "{} -> {}", date, normalized);
            assert!(normalized > now.date(), "{} -> {}", date, normalized);
        }
    }

    #[test]
    fn test_leap_day_pushed_into_non_leap_year() {
        // 2024-02-29 is past on 2024-06-01; 2025 has no Feb 29
        let now = at(2024, 6, 1, 10, 0);
        assert_eq!(adjust_event_date("2024-02-29", now).unwrap(), "20250301");
    }

    #[test]
    fn test_out_of_range_components_roll_over() {
        let now = at(2025, 6, 1, 10, 0);
        assert_eq!(adjust_event_date("2025-13-05", now).unwrap(), "20260105");
        assert_eq!(adjust_event_date("2025-09-31", now).unwrap(), "20251001");
    }

    #[test]
    fn test_malformed_dates_are_rejected() {
        let now = at(2025, 6, 1, 10, 0);
        assert!(adjust_event_date("next friday", now).is_err());
        assert!(adjust_event_date("2025-06", now).is_err());
        assert!(adjust_event_date("", now).is_err());
    }

    #[test]
    fn test_shift_time() {
        assert_eq!(shift_time("09:00", 15).unwrap(), "0915");
        assert_eq!(shift_time("12:00", 15).unwrap(), "1215");
        assert_eq!(shift_time("10:50", 15).unwrap(), "1105");
        assert_eq!(shift_time("7:30", 15).unwrap(), "0745");
    }

    #[test]
    fn test_shift_time_wraps_past_midnight() {
        assert_eq!(shift_time("23:50", 15).unwrap(), "0005");
        assert_eq!(shift_time("23:45", 15).unwrap(), "0000");
    }

    #[test]
    fn test_shift_time_rejects_invalid_input() {
        assert!(shift_time("25:00", 15).is_err());
        assert!(shift_time("noon", 15).is_err());
    }

    #[test]
    fn test_compact_time() {
        assert_eq!(compact_time("09:00").unwrap(), "0900");
        assert_eq!(compact_time("9:00").unwrap(), "0900");
        assert!(compact_time("").is_err());
    }

    #[test]
    fn test_fixed_clock() {
        let instant = Local.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let clock = FixedClock(instant);
        assert_eq!(clock.now(), instant);
    }
}
