//! Whole-minute wall-clock helpers.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use tracing::warn;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

pub fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// `None` once the minute count runs past midnight.
pub fn time_from_minutes(minutes: u32) -> Option<NaiveTime> {
    if minutes >= MINUTES_PER_DAY {
        return None;
    }
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

/// 0 = Sunday, 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// True when the time carries no seconds or sub-second component.
pub fn is_whole_minute(time: NaiveTime) -> bool {
    time.second() == 0 && time.nanosecond() == 0
}

/// Clinic wall-clock time for a UTC instant.
pub fn local_wall_time(instant: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDateTime {
    match FixedOffset::east_opt(utc_offset_minutes * 60) {
        Some(offset) => instant.with_timezone(&offset).naive_local(),
        None => {
            warn!("UTC offset of {} minutes is out of range, using UTC", utc_offset_minutes);
            instant.naive_utc()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_minutes_round_trip_bounds() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(minutes_of_day(nine), 540);
        assert_eq!(time_from_minutes(540), Some(nine));
        assert_eq!(time_from_minutes(MINUTES_PER_DAY), None);
    }

    #[test]
    fn test_weekday_index_starts_on_sunday() {
        // 2025-06-01 was a Sunday
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()), 0);
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2025, 6, 7).unwrap()), 6);
    }

    #[test]
    fn test_local_wall_time_applies_offset() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 1, 22, 30, 0).unwrap();
        let local = local_wall_time(instant, 180);
        assert_eq!(local, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap().and_hms_opt(1, 30, 0).unwrap());
    }

    #[test]
    fn test_whole_minute() {
        assert!(is_whole_minute(NaiveTime::from_hms_opt(10, 30, 0).unwrap()));
        assert!(!is_whole_minute(NaiveTime::from_hms_opt(10, 30, 5).unwrap()));
    }
}
