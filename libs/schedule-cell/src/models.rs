// libs/schedule-cell/src/models.rs
use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_utils::time::{is_whole_minute, minutes_of_day, weekday_index};

use crate::error::ScheduleError;

// ==============================================================================
// CLINIC POLICY
// ==============================================================================

/// Ten years of advance booking.
pub const MAX_ADVANCE_BOOKING_DAYS: u32 = 3650;

/// A century of no-show history.
pub const MAX_NO_SHOW_LOOKBACK_DAYS: u32 = 36500;

/// Clinic-wide booking rules. Built once from configuration and passed by
/// value into every computation; changing settings means building a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicPolicy {
    pub slot_duration_minutes: u32,
    pub max_patients_per_slot: u32,
    pub advance_booking_days: u32,
    pub cancellation_hours: u32,
    pub no_show_threshold: u32,
    /// Only no-shows within this many days count. `None` = lifetime.
    pub no_show_lookback_days: Option<u32>,
}

impl Default for ClinicPolicy {
    fn default() -> Self {
        Self {
            slot_duration_minutes: shared_config::DEFAULT_SLOT_DURATION_MINUTES,
            max_patients_per_slot: shared_config::DEFAULT_MAX_PATIENTS_PER_SLOT,
            advance_booking_days: shared_config::DEFAULT_ADVANCE_BOOKING_DAYS,
            cancellation_hours: shared_config::DEFAULT_CANCELLATION_HOURS,
            no_show_threshold: shared_config::DEFAULT_NO_SHOW_THRESHOLD,
            no_show_lookback_days: None,
        }
    }
}

impl ClinicPolicy {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.slot_duration_minutes == 0 {
            return Err(ScheduleError::InvalidPolicy(
                "slot duration must be at least one minute".to_string(),
            ));
        }
        if self.slot_duration_minutes >= 24 * 60 {
            return Err(ScheduleError::InvalidPolicy(
                "slot duration must be shorter than a day".to_string(),
            ));
        }
        if self.max_patients_per_slot == 0 {
            return Err(ScheduleError::InvalidPolicy(
                "each slot must accept at least one patient".to_string(),
            ));
        }
        if self.no_show_threshold == 0 {
            return Err(ScheduleError::InvalidPolicy(
                "no-show threshold must be at least 1".to_string(),
            ));
        }
        if self.advance_booking_days > MAX_ADVANCE_BOOKING_DAYS {
            return Err(ScheduleError::InvalidPolicy(format!(
                "advance booking cannot exceed {} days",
                MAX_ADVANCE_BOOKING_DAYS
            )));
        }
        if self
            .no_show_lookback_days
            .map_or(false, |days| days > MAX_NO_SHOW_LOOKBACK_DAYS)
        {
            return Err(ScheduleError::InvalidPolicy(format!(
                "no-show lookback cannot exceed {} days",
                MAX_NO_SHOW_LOOKBACK_DAYS
            )));
        }
        Ok(())
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(self.slot_duration_minutes as i64)
    }

    pub fn cancellation_window(&self) -> Duration {
        Duration::hours(self.cancellation_hours as i64)
    }

    /// Last date that may be booked when today is `today`. Saturates at
    /// the end of the calendar.
    pub fn booking_horizon_end(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_signed(Duration::days(self.advance_booking_days as i64))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Earliest instant whose no-shows still count against a patient.
    /// `None` counts everything, including a lookback reaching past the
    /// start of the calendar.
    pub fn no_show_window_start(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        self.no_show_lookback_days
            .and_then(|days| now.checked_sub_signed(Duration::days(days as i64)))
    }
}

impl TryFrom<&AppConfig> for ClinicPolicy {
    type Error = ScheduleError;

    fn try_from(config: &AppConfig) -> Result<Self, Self::Error> {
        let policy = Self {
            slot_duration_minutes: config.slot_duration_minutes,
            max_patients_per_slot: config.max_patients_per_slot,
            advance_booking_days: config.advance_booking_days,
            cancellation_hours: config.cancellation_hours,
            no_show_threshold: config.no_show_threshold,
            no_show_lookback_days: config.no_show_lookback_days,
        };
        policy.validate()?;
        Ok(policy)
    }
}

// ==============================================================================
// WEEKLY TEMPLATE
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub weekday: u8, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
}

impl WorkingHours {
    pub fn new(weekday: u8, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            weekday,
            start_time,
            end_time,
            is_active: true,
            break_start: None,
            break_end: None,
        }
    }

    pub fn with_break(mut self, break_start: NaiveTime, break_end: NaiveTime) -> Self {
        self.break_start = Some(break_start);
        self.break_end = Some(break_end);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.weekday > 6 {
            return Err(ScheduleError::InvalidWeekday(self.weekday));
        }

        let invalid = |reason: &str| ScheduleError::InvalidWorkingHours {
            weekday: self.weekday,
            reason: reason.to_string(),
        };

        if ![self.start_time, self.end_time]
            .iter()
            .chain(self.break_start.iter())
            .chain(self.break_end.iter())
            .all(|t| is_whole_minute(*t))
        {
            return Err(invalid("times must be whole minutes"));
        }

        if self.start_time >= self.end_time {
            return Err(invalid("start time must be before end time"));
        }

        match (self.break_start, self.break_end) {
            (None, None) => Ok(()),
            (Some(break_start), Some(break_end)) => {
                if break_start >= break_end {
                    return Err(invalid("break start must be before break end"));
                }
                if break_start < self.start_time || break_end > self.end_time {
                    return Err(invalid("break must lie within working hours"));
                }
                Ok(())
            }
            _ => Err(invalid("break needs both a start and an end")),
        }
    }

    /// Working window in minutes since midnight, `[start, end)`.
    pub fn window_minutes(&self) -> (u32, u32) {
        (minutes_of_day(self.start_time), minutes_of_day(self.end_time))
    }

    /// Break window in minutes since midnight, `[start, end)`.
    pub fn break_minutes(&self) -> Option<(u32, u32)> {
        match (self.break_start, self.break_end) {
            (Some(start), Some(end)) => Some((minutes_of_day(start), minutes_of_day(end))),
            _ => None,
        }
    }
}

/// Recurring Sunday–Saturday working hours. At most one entry per weekday.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTemplate {
    entries: BTreeMap<u8, WorkingHours>,
}

impl WeeklyTemplate {
    pub fn new(entries: Vec<WorkingHours>) -> Result<Self, ScheduleError> {
        let mut template = Self::default();
        for entry in entries {
            entry.validate()?;
            if template.entries.contains_key(&entry.weekday) {
                return Err(ScheduleError::DuplicateWeekday(entry.weekday));
            }
            template.entries.insert(entry.weekday, entry);
        }
        Ok(template)
    }

    /// Same hours on every listed weekday.
    pub fn uniform(
        weekdays: &[u8],
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Self, ScheduleError> {
        Self::new(
            weekdays
                .iter()
                .map(|day| WorkingHours::new(*day, start_time, end_time))
                .collect(),
        )
    }

    /// Insert or replace the entry for its weekday.
    pub fn upsert(&mut self, entry: WorkingHours) -> Result<(), ScheduleError> {
        entry.validate()?;
        self.entries.insert(entry.weekday, entry);
        Ok(())
    }

    pub fn deactivate(&mut self, weekday: u8) -> Result<(), ScheduleError> {
        if weekday > 6 {
            return Err(ScheduleError::InvalidWeekday(weekday));
        }
        if let Some(entry) = self.entries.get_mut(&weekday) {
            entry.is_active = false;
        }
        Ok(())
    }

    pub fn entry(&self, weekday: u8) -> Option<&WorkingHours> {
        self.entries.get(&weekday)
    }

    /// The active entry covering `date`'s weekday, if any.
    pub fn active_entry_for(&self, date: NaiveDate) -> Option<&WorkingHours> {
        self.entries
            .get(&weekday_index(date))
            .filter(|entry| entry.is_active)
    }

    pub fn entries(&self) -> impl Iterator<Item = &WorkingHours> {
        self.entries.values()
    }
}

// ==============================================================================
// BLACKOUTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutRange {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate, // inclusive
    pub reason: Option<String>,
}

impl BlackoutRange {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<String>,
    ) -> Result<Self, ScheduleError> {
        if start_date > end_date {
            return Err(ScheduleError::InvalidBlackout(format!(
                "start date {} is after end date {}",
                start_date, end_date
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            start_date,
            end_date,
            reason,
        })
    }

    pub fn single_day(date: NaiveDate, reason: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_date: date,
            end_date: date,
            reason,
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn day_count(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

/// Overlapping ranges are allowed; a date is blacked out if any range covers it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutCalendar {
    ranges: Vec<BlackoutRange>,
}

impl BlackoutCalendar {
    pub fn new(ranges: Vec<BlackoutRange>) -> Self {
        Self { ranges }
    }

    pub fn add(&mut self, range: BlackoutRange) {
        self.ranges.push(range);
    }

    pub fn remove(&mut self, id: Uuid) -> Option<BlackoutRange> {
        let index = self.ranges.iter().position(|range| range.id == id)?;
        Some(self.ranges.remove(index))
    }

    pub fn is_blacked_out(&self, date: NaiveDate) -> bool {
        self.ranges.iter().any(|range| range.covers(date))
    }

    pub fn covering(&self, date: NaiveDate) -> Vec<&BlackoutRange> {
        self.ranges.iter().filter(|range| range.covers(date)).collect()
    }

    pub fn ranges(&self) -> &[BlackoutRange] {
        &self.ranges
    }
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub end_time: NaiveTime,
    pub booked_count: u32,
    pub capacity: u32,
    pub is_available: bool,
}

impl Slot {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.booked_count)
    }
}

/// Active (non-cancelled, non-deleted) appointment counts keyed by slot start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookedCounts {
    counts: HashMap<NaiveDateTime, u32>,
}

impl BookedCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate, time: NaiveTime) -> u32 {
        self.counts.get(&date.and_time(time)).copied().unwrap_or(0)
    }

    pub fn set(&mut self, date: NaiveDate, time: NaiveTime, count: u32) {
        self.counts.insert(date.and_time(time), count);
    }

    pub fn increment(&mut self, starts_at: NaiveDateTime) {
        *self.counts.entry(starts_at).or_insert(0) += 1;
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }
}

impl FromIterator<NaiveDateTime> for BookedCounts {
    fn from_iter<I: IntoIterator<Item = NaiveDateTime>>(iter: I) -> Self {
        let mut counts = Self::new();
        for starts_at in iter {
            counts.increment(starts_at);
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySummary {
    pub total_days: u32,
    pub available_date_count: u32,
    pub total_slot_count: u32,
    pub available_slot_count: u32,
    pub next_available: Option<Slot>,
}

/// Template, blackouts and policy read together for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub template: WeeklyTemplate,
    pub blackouts: BlackoutCalendar,
    pub policy: ClinicPolicy,
}

impl ScheduleSnapshot {
    pub fn new(template: WeeklyTemplate, blackouts: BlackoutCalendar, policy: ClinicPolicy) -> Self {
        Self {
            template,
            blackouts,
            policy,
        }
    }
}
