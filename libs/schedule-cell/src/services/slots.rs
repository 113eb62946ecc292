// libs/schedule-cell/src/services/slots.rs
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tracing::debug;

use shared_utils::time::{is_whole_minute, minutes_of_day, time_from_minutes};

use crate::models::{
    AvailabilitySummary, BlackoutCalendar, BookedCounts, ClinicPolicy, ScheduleSnapshot, Slot,
    WeeklyTemplate, WorkingHours, MAX_ADVANCE_BOOKING_DAYS,
};

/// Why a specific start time cannot be booked.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRejection {
    #[error("The clinic is closed on this date")]
    BlackedOut,

    #[error("The clinic does not work on this weekday")]
    ClosedOnWeekday,

    #[error("The requested time is outside working hours")]
    OutsideWorkingHours,

    #[error("The requested time falls inside the clinic break")]
    DuringBreak,

    #[error("The requested time does not start a slot")]
    OffGrid,

    #[error("The requested time is in the past")]
    InThePast,

    #[error("The requested date is beyond the advance-booking horizon")]
    BeyondHorizon,

    #[error("The requested slot is fully booked")]
    FullyBooked,
}

/// Pure slot computation over an injected template, blackout calendar and
/// policy. Holds no state of its own and never reads the clock.
#[derive(Debug, Clone, Copy)]
pub struct SlotGenerator<'a> {
    template: &'a WeeklyTemplate,
    blackouts: &'a BlackoutCalendar,
    policy: &'a ClinicPolicy,
}

impl<'a> SlotGenerator<'a> {
    pub fn new(
        template: &'a WeeklyTemplate,
        blackouts: &'a BlackoutCalendar,
        policy: &'a ClinicPolicy,
    ) -> Self {
        Self {
            template,
            blackouts,
            policy,
        }
    }

    pub fn from_snapshot(snapshot: &'a ScheduleSnapshot) -> Self {
        Self::new(&snapshot.template, &snapshot.blackouts, &snapshot.policy)
    }

    /// Blackouts and weekday template only; the booking horizon is layered
    /// on top by the scheduler.
    pub fn is_date_available(&self, date: NaiveDate) -> bool {
        self.date_rejection(date).is_none()
    }

    /// Bookable start times for `date`, ascending. Candidates that do not
    /// start strictly after `now` are dropped.
    pub fn slots_for_date(
        &self,
        date: NaiveDate,
        now: NaiveDateTime,
        booked: &BookedCounts,
    ) -> Vec<Slot> {
        let entry = match self.working_hours_for(date) {
            Some(entry) => entry,
            None => return Vec::new(),
        };

        let duration = self.policy.slot_duration_minutes;
        let capacity = self.policy.max_patients_per_slot;

        let slots: Vec<Slot> = self
            .candidate_starts(entry)
            .into_iter()
            .filter_map(|start| {
                let time = time_from_minutes(start)?;
                let end_time = time_from_minutes(start.saturating_add(duration)).unwrap_or(entry.end_time);
                Some((time, end_time))
            })
            .filter(|(time, _)| date.and_time(*time) > now)
            .map(|(time, end_time)| {
                let booked_count = booked.get(date, time);
                Slot {
                    date,
                    time,
                    end_time,
                    booked_count,
                    capacity,
                    is_available: booked_count < capacity,
                }
            })
            .collect();

        debug!("Generated {} slots for {}", slots.len(), date);
        slots
    }

    pub fn is_slot_available(&self, at: NaiveDateTime, now: NaiveDateTime, booked_count: u32) -> bool {
        self.slot_rejection(at, now, booked_count).is_none()
    }

    /// The first reason `at` cannot be booked, or `None` if it can.
    /// Checks run from the coarsest (date) to the finest (capacity).
    pub fn slot_rejection(
        &self,
        at: NaiveDateTime,
        now: NaiveDateTime,
        booked_count: u32,
    ) -> Option<SlotRejection> {
        let date = at.date();
        if let Some(rejection) = self.date_rejection(date) {
            return Some(rejection);
        }
        let entry = match self.template.active_entry_for(date) {
            Some(entry) => entry,
            None => return Some(SlotRejection::ClosedOnWeekday),
        };

        if let Some(rejection) = self.time_rejection(entry, at.time()) {
            return Some(rejection);
        }

        if at <= now {
            return Some(SlotRejection::InThePast);
        }

        if booked_count >= self.policy.max_patients_per_slot {
            return Some(SlotRejection::FullyBooked);
        }

        None
    }

    /// Dates in `[today, today + horizon]` that have working hours and no
    /// blackout. A caller window is honoured only when smaller than the
    /// policy's advance-booking horizon.
    pub fn available_dates(&self, today: NaiveDate, horizon_days: Option<u32>) -> Vec<NaiveDate> {
        self.dates_in_horizon(today, horizon_days)
            .filter(|date| self.is_date_available(*date))
            .collect()
    }

    pub fn next_available_slot(&self, now: NaiveDateTime, booked: &BookedCounts) -> Option<Slot> {
        self.dates_in_horizon(now.date(), None)
            .filter(|date| self.is_date_available(*date))
            .find_map(|date| {
                self.slots_for_date(date, now, booked)
                    .into_iter()
                    .find(|slot| slot.is_available)
            })
    }

    pub fn summary(
        &self,
        now: NaiveDateTime,
        horizon_days: Option<u32>,
        booked: &BookedCounts,
    ) -> AvailabilitySummary {
        let dates = self.available_dates(now.date(), horizon_days);

        let mut total_slot_count = 0;
        let mut available_slot_count = 0;
        let mut next_available = None;

        for date in &dates {
            for slot in self.slots_for_date(*date, now, booked) {
                total_slot_count += 1;
                if slot.is_available {
                    available_slot_count += 1;
                    if next_available.is_none() {
                        next_available = Some(slot);
                    }
                }
            }
        }

        AvailabilitySummary {
            total_days: self.effective_horizon(horizon_days) + 1,
            available_date_count: dates.len() as u32,
            total_slot_count,
            available_slot_count,
            next_available,
        }
    }

    /// Never wider than `MAX_ADVANCE_BOOKING_DAYS`, even for a policy that
    /// skipped validation.
    pub fn effective_horizon(&self, horizon_days: Option<u32>) -> u32 {
        let max = self.policy.advance_booking_days.min(MAX_ADVANCE_BOOKING_DAYS);
        horizon_days.map_or(max, |requested| requested.min(max))
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    fn date_rejection(&self, date: NaiveDate) -> Option<SlotRejection> {
        if self.blackouts.is_blacked_out(date) {
            return Some(SlotRejection::BlackedOut);
        }
        if self.template.active_entry_for(date).is_none() {
            return Some(SlotRejection::ClosedOnWeekday);
        }
        None
    }

    fn working_hours_for(&self, date: NaiveDate) -> Option<&'a WorkingHours> {
        if self.blackouts.is_blacked_out(date) {
            return None;
        }
        self.template.active_entry_for(date)
    }

    /// Start minutes from opening up to `end - duration`, stepping by the
    /// slot duration, skipping any slot that overlaps the break.
    fn candidate_starts(&self, entry: &WorkingHours) -> Vec<u32> {
        let duration = self.policy.slot_duration_minutes;
        if duration == 0 {
            return Vec::new();
        }

        let (open, close) = entry.window_minutes();
        let breaks = entry.break_minutes();

        (open..)
            .step_by(duration as usize)
            .take_while(|start| start.saturating_add(duration) <= close)
            .filter(|start| match breaks {
                Some((break_start, break_end)) => {
                    !(*start < break_end && start.saturating_add(duration) > break_start)
                }
                None => true,
            })
            .collect()
    }

    fn time_rejection(&self, entry: &WorkingHours, time: NaiveTime) -> Option<SlotRejection> {
        if !is_whole_minute(time) {
            return Some(SlotRejection::OffGrid);
        }

        let duration = self.policy.slot_duration_minutes;
        if duration == 0 {
            return Some(SlotRejection::OffGrid);
        }

        let start = minutes_of_day(time);
        let (open, close) = entry.window_minutes();

        if start < open || start.saturating_add(duration) > close {
            return Some(SlotRejection::OutsideWorkingHours);
        }
        if let Some((break_start, break_end)) = entry.break_minutes() {
            if start < break_end && start.saturating_add(duration) > break_start {
                return Some(SlotRejection::DuringBreak);
            }
        }
        if (start - open) % duration != 0 {
            return Some(SlotRejection::OffGrid);
        }
        None
    }

    fn dates_in_horizon(
        &self,
        today: NaiveDate,
        horizon_days: Option<u32>,
    ) -> impl Iterator<Item = NaiveDate> {
        let days = self.effective_horizon(horizon_days) as i64;
        (0..=days).map_while(move |offset| today.checked_add_signed(Duration::days(offset)))
    }
}
