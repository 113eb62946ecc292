// libs/schedule-cell/tests/slot_generator_test.rs

use chrono::{Duration, NaiveDate, NaiveTime};

use schedule_cell::{
    BlackoutCalendar, BlackoutRange, BookedCounts, ClinicPolicy, ScheduleSnapshot, SlotGenerator,
    WeeklyTemplate, WorkingHours,
};
use shared_utils::test_utils::{at, date, time};

// ==============================================================================
// TEST FIXTURES
// ==============================================================================

/// Sunday through Thursday, 09:00-17:00, no break.
fn sunday_to_thursday() -> WeeklyTemplate {
    WeeklyTemplate::uniform(&[0, 1, 2, 3, 4], time(9, 0), time(17, 0)).unwrap()
}

fn snapshot(template: WeeklyTemplate, blackouts: BlackoutCalendar) -> ScheduleSnapshot {
    ScheduleSnapshot::new(template, blackouts, ClinicPolicy::default())
}

// Wednesday 2025-06-04 08:00 is "now" for most tests; the next Sunday is 06-08.
fn wednesday_morning() -> chrono::NaiveDateTime {
    at(2025, 6, 4, 8, 0)
}

fn next_sunday() -> NaiveDate {
    date(2025, 6, 8)
}

// ==============================================================================
// DATE AVAILABILITY
// ==============================================================================

#[test]
fn test_date_inside_blackout_is_unavailable() {
    let blackouts = BlackoutCalendar::new(vec![
        BlackoutRange::new(date(2025, 6, 8), date(2025, 6, 12), Some("Annual leave".into())).unwrap(),
    ]);
    let snapshot = snapshot(sunday_to_thursday(), blackouts);
    let generator = SlotGenerator::from_snapshot(&snapshot);

    for day in 8..=12 {
        assert!(!generator.is_date_available(date(2025, 6, day)), "June {} should be blacked out", day);
    }
    assert!(generator.is_date_available(date(2025, 6, 15)));
}

#[test]
fn test_date_without_active_weekday_is_unavailable() {
    let snapshot = snapshot(sunday_to_thursday(), BlackoutCalendar::default());
    let generator = SlotGenerator::from_snapshot(&snapshot);

    // Friday and Saturday have no entry
    assert!(!generator.is_date_available(date(2025, 6, 6)));
    assert!(!generator.is_date_available(date(2025, 6, 7)));
    assert!(generator.is_date_available(date(2025, 6, 5)));
}

#[test]
fn test_deactivated_weekday_is_unavailable() {
    let mut template = sunday_to_thursday();
    template.deactivate(0).unwrap();
    let snapshot = snapshot(template, BlackoutCalendar::default());
    let generator = SlotGenerator::from_snapshot(&snapshot);

    assert!(!generator.is_date_available(next_sunday()));
    assert!(generator.slots_for_date(next_sunday(), wednesday_morning(), &BookedCounts::new()).is_empty());
}

// ==============================================================================
// SLOT GENERATION
// ==============================================================================

#[test]
fn test_full_day_yields_sixteen_half_hour_slots() {
    let snapshot = snapshot(sunday_to_thursday(), BlackoutCalendar::default());
    let generator = SlotGenerator::from_snapshot(&snapshot);

    let slots = generator.slots_for_date(next_sunday(), wednesday_morning(), &BookedCounts::new());

    assert_eq!(slots.len(), 16);
    assert_eq!(slots.first().unwrap().time, time(9, 0));
    assert_eq!(slots.last().unwrap().time, time(16, 30));
    assert_eq!(slots.last().unwrap().end_time, time(17, 0));
    assert!(slots.iter().all(|slot| slot.is_available));
    assert!(slots.windows(2).all(|pair| pair[0].time < pair[1].time));
}

#[test]
fn test_break_removes_slots() {
    let template = WeeklyTemplate::new(vec![
        WorkingHours::new(0, time(9, 0), time(17, 0)).with_break(time(13, 0), time(14, 0)),
    ])
    .unwrap();
    let snapshot = snapshot(template, BlackoutCalendar::default());
    let generator = SlotGenerator::from_snapshot(&snapshot);

    let slots = generator.slots_for_date(next_sunday(), wednesday_morning(), &BookedCounts::new());
    let times: Vec<NaiveTime> = slots.iter().map(|slot| slot.time).collect();

    assert_eq!(slots.len(), 14);
    assert!(!times.contains(&time(13, 0)));
    assert!(!times.contains(&time(13, 30)));
    assert!(times.contains(&time(12, 30)));
    assert!(times.contains(&time(14, 0)));
}

#[test]
fn test_today_only_lists_slots_strictly_after_now() {
    let snapshot = snapshot(sunday_to_thursday(), BlackoutCalendar::default());
    let generator = SlotGenerator::from_snapshot(&snapshot);

    // Sunday 11:00 exactly: the 11:00 slot is not strictly after now
    let now = at(2025, 6, 8, 11, 0);
    let slots = generator.slots_for_date(next_sunday(), now, &BookedCounts::new());

    assert_eq!(slots.first().unwrap().time, time(11, 30));
    assert!(slots.iter().all(|slot| slot.starts_at() > now));
    assert_eq!(slots.len(), 11);

    // One minute later nothing changes for 11:30
    let slots = generator.slots_for_date(next_sunday(), now + Duration::minutes(29), &BookedCounts::new());
    assert_eq!(slots.first().unwrap().time, time(11, 30));
}

#[test]
fn test_booked_counts_mark_full_slots() {
    let policy = ClinicPolicy {
        max_patients_per_slot: 2,
        ..ClinicPolicy::default()
    };
    let snapshot = ScheduleSnapshot::new(sunday_to_thursday(), BlackoutCalendar::default(), policy);
    let generator = SlotGenerator::from_snapshot(&snapshot);

    let mut booked = BookedCounts::new();
    booked.set(next_sunday(), time(9, 0), 2);
    booked.set(next_sunday(), time(9, 30), 1);

    let slots = generator.slots_for_date(next_sunday(), wednesday_morning(), &booked);

    assert!(!slots[0].is_available);
    assert_eq!(slots[0].remaining_capacity(), 0);
    assert!(slots[1].is_available);
    assert_eq!(slots[1].remaining_capacity(), 1);
    assert_eq!(slots.len(), 16);
}

// ==============================================================================
// HORIZON QUERIES
// ==============================================================================

#[test]
fn test_available_dates_are_inclusive_of_horizon() {
    let policy = ClinicPolicy {
        advance_booking_days: 7,
        ..ClinicPolicy::default()
    };
    let snapshot = ScheduleSnapshot::new(sunday_to_thursday(), BlackoutCalendar::default(), policy);
    let generator = SlotGenerator::from_snapshot(&snapshot);

    // Sunday 06-08 .. Sunday 06-15 inclusive: Sun-Thu plus the following Sunday
    let dates = generator.available_dates(next_sunday(), None);
    assert_eq!(dates.len(), 6);
    assert_eq!(dates.first(), Some(&date(2025, 6, 8)));
    assert_eq!(dates.last(), Some(&date(2025, 6, 15)));

    // A caller window can only shrink the horizon
    assert_eq!(generator.available_dates(next_sunday(), Some(2)).len(), 3);
    assert_eq!(generator.available_dates(next_sunday(), Some(60)).len(), 6);
}

#[test]
fn test_next_available_slot_skips_full_and_blacked_out_days() {
    let blackouts = BlackoutCalendar::new(vec![BlackoutRange::single_day(date(2025, 6, 5), None)]);
    let snapshot = snapshot(sunday_to_thursday(), blackouts);
    let generator = SlotGenerator::from_snapshot(&snapshot);

    // Wednesday 16:30 - nothing left today, Thursday blacked out, Fri/Sat closed
    let now = at(2025, 6, 4, 16, 30);
    let mut booked = BookedCounts::new();
    booked.set(next_sunday(), time(9, 0), 1);

    let next = generator.next_available_slot(now, &booked).unwrap();
    assert_eq!(next.date, next_sunday());
    assert_eq!(next.time, time(9, 30));
}

#[test]
fn test_next_available_slot_none_when_horizon_exhausted() {
    let policy = ClinicPolicy {
        advance_booking_days: 1,
        ..ClinicPolicy::default()
    };
    let snapshot = ScheduleSnapshot::new(sunday_to_thursday(), BlackoutCalendar::default(), policy);
    let generator = SlotGenerator::from_snapshot(&snapshot);

    // Friday: today and tomorrow are both closed
    assert!(generator.next_available_slot(at(2025, 6, 6, 8, 0), &BookedCounts::new()).is_none());
}

#[test]
fn test_summary_aggregates_horizon() {
    let policy = ClinicPolicy {
        advance_booking_days: 6,
        ..ClinicPolicy::default()
    };
    let snapshot = ScheduleSnapshot::new(sunday_to_thursday(), BlackoutCalendar::default(), policy);
    let generator = SlotGenerator::from_snapshot(&snapshot);

    let mut booked = BookedCounts::new();
    booked.set(next_sunday(), time(9, 0), 1);

    // Saturday night: the next seven days hold Sun-Thu
    let summary = generator.summary(at(2025, 6, 7, 20, 0), None, &booked);

    assert_eq!(summary.total_days, 7);
    assert_eq!(summary.available_date_count, 5);
    assert_eq!(summary.total_slot_count, 80);
    assert_eq!(summary.available_slot_count, 79);
    let next = summary.next_available.unwrap();
    assert_eq!((next.date, next.time), (next_sunday(), time(9, 30)));
}

#[test]
fn test_slot_serializes_for_collaborators() {
    let snapshot = snapshot(sunday_to_thursday(), BlackoutCalendar::default());
    let generator = SlotGenerator::from_snapshot(&snapshot);
    let slot = generator.slots_for_date(next_sunday(), wednesday_morning(), &BookedCounts::new())[0].clone();

    let json = serde_json::to_value(&slot).unwrap();
    assert_eq!(json["time"], "09:00:00");
    assert_eq!(json["is_available"], true);
}
