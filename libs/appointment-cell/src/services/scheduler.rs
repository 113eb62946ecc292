// libs/appointment-cell/src/services/scheduler.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use schedule_cell::{
    AvailabilitySummary, BlackoutRange, ClinicPolicy, ScheduleRepository, ScheduleSnapshot, Slot,
    SlotGenerator, SlotRejection, WorkingHours,
};
use shared_config::AppConfig;
use shared_models::Actor;
use shared_utils::time::{is_whole_minute, local_wall_time};
use shared_utils::Clock;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatistics, AppointmentStatus, BookingEligibility,
    CancellationEligibility, CancelledBy,
};
use crate::services::ledger::BookingLedger;
use crate::services::lifecycle::AppointmentLifecycleService;

const MAX_NOTES_LENGTH: usize = 1000;

/// Booking and lifecycle orchestration for the single clinic.
///
/// Every call reads a fresh schedule snapshot and the current instant, then
/// defers the capacity check to the ledger's atomic `reserve`. Nothing is
/// cached between calls.
pub struct AppointmentScheduler {
    ledger: Arc<dyn BookingLedger>,
    schedule: Arc<dyn ScheduleRepository>,
    clock: Arc<dyn Clock>,
    lifecycle: AppointmentLifecycleService,
    utc_offset_minutes: i32,
}

impl AppointmentScheduler {
    pub fn new(
        ledger: Arc<dyn BookingLedger>,
        schedule: Arc<dyn ScheduleRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            schedule,
            clock,
            lifecycle: AppointmentLifecycleService::new(),
            utc_offset_minutes: 0,
        }
    }

    /// Validate the policy carried by `config` and install it in `schedule`
    /// before handing out a scheduler.
    pub async fn with_config(
        ledger: Arc<dyn BookingLedger>,
        schedule: Arc<dyn ScheduleRepository>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Result<Self, AppointmentError> {
        let policy = ClinicPolicy::try_from(config)?;
        schedule.update_policy(policy).await?;
        info!(
            "Clinic policy installed from configuration (utc offset {} min)",
            config.utc_offset_minutes
        );

        Ok(Self::new(ledger, schedule, clock).with_utc_offset(config.utc_offset_minutes))
    }

    /// `with_config` over `AppConfig::load()`.
    pub async fn from_env(
        ledger: Arc<dyn BookingLedger>,
        schedule: Arc<dyn ScheduleRepository>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppointmentError> {
        let config = AppConfig::load();
        Self::with_config(ledger, schedule, clock, &config).await
    }

    pub fn with_utc_offset(mut self, utc_offset_minutes: i32) -> Self {
        self.utc_offset_minutes = utc_offset_minutes;
        self
    }

    /// Clinic wall-clock "now".
    pub fn local_now(&self) -> NaiveDateTime {
        local_wall_time(self.clock.now(), self.utc_offset_minutes)
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    /// Book `at` for the patient. The result is always a `pending` row.
    #[instrument(skip(self, notes))]
    pub async fn book(
        &self,
        patient_id: Uuid,
        at: NaiveDateTime,
        notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking request from patient {} for {}", patient_id, at);

        let notes = normalize_notes(notes)?;
        let snapshot = self.snapshot().await?;
        let now = self.local_now();

        if let Some(refusal) = self.booking_refusal(&snapshot, patient_id, at, now).await? {
            warn!("Booking for patient {} at {} refused: {}", patient_id, at, refusal);
            return Err(refusal);
        }

        let appointment = Appointment::pending(patient_id, at, notes, self.clock.now());
        let booked = self
            .ledger
            .reserve(appointment, snapshot.policy.max_patients_per_slot)
            .await?;

        info!("Appointment {} booked for patient {} at {}", booked.id, patient_id, at);
        Ok(booked)
    }

    /// Same checks as `book` without reserving anything. Only storage
    /// failures surface as errors.
    #[instrument(skip(self))]
    pub async fn can_book(
        &self,
        patient_id: Uuid,
        at: NaiveDateTime,
    ) -> Result<BookingEligibility, AppointmentError> {
        let snapshot = self.snapshot().await?;
        let now = self.local_now();

        Ok(match self.booking_refusal(&snapshot, patient_id, at, now).await? {
            Some(refusal) => BookingEligibility::denied(refusal_reason(&refusal)),
            None => BookingEligibility::allowed(),
        })
    }

    // ==============================================================================
    // LIFECYCLE TRANSITIONS
    // ==============================================================================

    #[instrument(skip(self))]
    pub async fn confirm(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.appointment(appointment_id).await?;
        let updated = self.lifecycle.confirm(&current, self.clock.now())?;
        self.ledger.commit_transition(current.status, updated).await
    }

    #[instrument(skip(self, admin_notes))]
    pub async fn complete(
        &self,
        appointment_id: Uuid,
        admin_notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.appointment(appointment_id).await?;
        self.lifecycle
            .validate_status_transition(current.status, AppointmentStatus::Completed)?;
        let admin_notes = normalize_notes(admin_notes)?;
        let updated = self.lifecycle.complete(&current, admin_notes, self.clock.now())?;
        self.ledger.commit_transition(current.status, updated).await
    }

    /// Unconditional cancel. Callers acting on behalf of a patient should go
    /// through `cancel_as`, which applies ownership and the notice window.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        reason: &str,
        cancelled_by: CancelledBy,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.appointment(appointment_id).await?;
        let updated = self
            .lifecycle
            .cancel(&current, reason, cancelled_by, self.clock.now())?;
        let cancelled = self.ledger.commit_transition(current.status, updated).await?;

        info!(
            "Appointment {} cancelled, seat at {} released",
            cancelled.id,
            cancelled.starts_at()
        );
        Ok(cancelled)
    }

    #[instrument(skip(self))]
    pub async fn mark_no_show(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let current = self.appointment(appointment_id).await?;
        let updated = self.lifecycle.mark_no_show(&current, self.clock.now())?;
        self.ledger.commit_transition(current.status, updated).await
    }

    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id))]
    pub async fn can_cancel(
        &self,
        appointment: &Appointment,
        actor: &Actor,
    ) -> Result<CancellationEligibility, AppointmentError> {
        let policy = self.snapshot().await?.policy;

        Ok(
            match self
                .lifecycle
                .check_cancellation(appointment, actor, self.local_now(), &policy)
            {
                Ok(()) => CancellationEligibility::allowed(),
                Err(refusal) => CancellationEligibility::denied(refusal_reason(&refusal)),
            },
        )
    }

    /// Cancel on behalf of `actor`, recording the actor's role as the canceller.
    #[instrument(skip(self))]
    pub async fn cancel_as(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        reason: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.appointment(appointment_id).await?;
        let policy = self.snapshot().await?.policy;

        if let Err(refusal) = self
            .lifecycle
            .check_cancellation(&current, actor, self.local_now(), &policy)
        {
            warn!("Actor {} may not cancel appointment {}: {}", actor.id, appointment_id, refusal);
            return Err(refusal);
        }

        let cancelled_by = self.lifecycle.cancelled_by_for(actor);
        self.cancel(appointment_id, reason, cancelled_by).await
    }

    /// Tombstone the row. It stays in storage but leaves every listing and
    /// stops counting against slot capacity.
    #[instrument(skip(self))]
    pub async fn archive(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.ledger.tombstone(appointment_id, self.clock.now()).await
    }

    // ==============================================================================
    // READ QUERIES
    // ==============================================================================

    pub async fn appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.ledger
            .find(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn patient_appointments(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.ledger.appointments_for_patient(patient_id).await
    }

    /// Non-final appointments starting at or after now, soonest first.
    pub async fn upcoming_appointments(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let now = self.local_now();
        let appointments = self.ledger.appointments_for_patient(patient_id).await?;

        Ok(appointments
            .into_iter()
            .filter(|a| !a.status.is_final() && a.starts_at() >= now)
            .collect())
    }

    pub async fn today_appointments(&self) -> Result<Vec<Appointment>, AppointmentError> {
        self.ledger.appointments_for_date(self.local_now().date()).await
    }

    pub async fn appointments_for_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        self.ledger.appointments_for_date(date).await
    }

    pub async fn statistics(&self) -> Result<AppointmentStatistics, AppointmentError> {
        let appointments = self.ledger.all_appointments().await?;
        Ok(AppointmentStatistics::from_appointments(&appointments, self.local_now()))
    }

    pub fn valid_transitions(&self, status: AppointmentStatus) -> Vec<AppointmentStatus> {
        self.lifecycle.get_valid_transitions(status)
    }

    // ==============================================================================
    // AVAILABILITY
    // ==============================================================================

    pub async fn is_date_available(&self, date: NaiveDate) -> Result<bool, AppointmentError> {
        let snapshot = self.snapshot().await?;
        Ok(SlotGenerator::from_snapshot(&snapshot).is_date_available(date))
    }

    pub async fn slots_for_date(&self, date: NaiveDate) -> Result<Vec<Slot>, AppointmentError> {
        let snapshot = self.snapshot().await?;
        let booked = self.ledger.booked_counts_between(date, date).await?;

        Ok(SlotGenerator::from_snapshot(&snapshot).slots_for_date(date, self.local_now(), &booked))
    }

    /// Includes the advance-booking horizon, unlike the pure generator check.
    pub async fn is_slot_available(&self, at: NaiveDateTime) -> Result<bool, AppointmentError> {
        let snapshot = self.snapshot().await?;
        Ok(self.slot_rejection(&snapshot, at, self.local_now()).await?.is_none())
    }

    pub async fn available_dates(&self, horizon_days: Option<u32>) -> Result<Vec<NaiveDate>, AppointmentError> {
        let snapshot = self.snapshot().await?;
        Ok(SlotGenerator::from_snapshot(&snapshot).available_dates(self.local_now().date(), horizon_days))
    }

    pub async fn next_available_slot(&self) -> Result<Option<Slot>, AppointmentError> {
        let snapshot = self.snapshot().await?;
        let now = self.local_now();
        let booked = self
            .ledger
            .booked_counts_between(now.date(), snapshot.policy.booking_horizon_end(now.date()))
            .await?;

        Ok(SlotGenerator::from_snapshot(&snapshot).next_available_slot(now, &booked))
    }

    pub async fn availability_summary(
        &self,
        horizon_days: Option<u32>,
    ) -> Result<AvailabilitySummary, AppointmentError> {
        let snapshot = self.snapshot().await?;
        let now = self.local_now();
        let booked = self
            .ledger
            .booked_counts_between(now.date(), snapshot.policy.booking_horizon_end(now.date()))
            .await?;

        Ok(SlotGenerator::from_snapshot(&snapshot).summary(now, horizon_days, &booked))
    }

    // ==============================================================================
    // SCHEDULE ADMINISTRATION
    // ==============================================================================

    pub async fn upsert_working_hours(&self, entry: WorkingHours) -> Result<WorkingHours, AppointmentError> {
        Ok(self.schedule.upsert_working_hours(entry).await?)
    }

    pub async fn deactivate_weekday(&self, weekday: u8) -> Result<(), AppointmentError> {
        Ok(self.schedule.deactivate_weekday(weekday).await?)
    }

    pub async fn add_blackout(&self, range: BlackoutRange) -> Result<BlackoutRange, AppointmentError> {
        Ok(self.schedule.add_blackout(range).await?)
    }

    pub async fn remove_blackout(&self, id: Uuid) -> Result<BlackoutRange, AppointmentError> {
        Ok(self.schedule.remove_blackout(id).await?)
    }

    pub async fn update_policy(&self, policy: ClinicPolicy) -> Result<ClinicPolicy, AppointmentError> {
        Ok(self.schedule.update_policy(policy).await?)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn snapshot(&self) -> Result<ScheduleSnapshot, AppointmentError> {
        Ok(self.schedule.snapshot().await?)
    }

    /// The first reason a booking must be refused, checked in order:
    /// request shape, no-show history, slot legality. The outer `Result`
    /// carries storage failures only.
    async fn booking_refusal(
        &self,
        snapshot: &ScheduleSnapshot,
        patient_id: Uuid,
        at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Option<AppointmentError>, AppointmentError> {
        if !is_whole_minute(at.time()) {
            return Ok(Some(AppointmentError::ValidationError(
                "Appointment time must be a whole minute".to_string(),
            )));
        }

        let policy = &snapshot.policy;
        let no_shows = self
            .ledger
            .no_show_count_for_patient(patient_id, policy.no_show_window_start(now))
            .await?;
        if no_shows >= policy.no_show_threshold {
            return Ok(Some(AppointmentError::PolicyViolation(format!(
                "Booking is blocked after {} missed appointments",
                no_shows
            ))));
        }

        if let Some(rejection) = self.slot_rejection(snapshot, at, now).await? {
            return Ok(Some(AppointmentError::SlotUnavailable(rejection.to_string())));
        }

        Ok(None)
    }

    async fn slot_rejection(
        &self,
        snapshot: &ScheduleSnapshot,
        at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<Option<SlotRejection>, AppointmentError> {
        if at.date() > snapshot.policy.booking_horizon_end(now.date()) {
            return Ok(Some(SlotRejection::BeyondHorizon));
        }

        let booked_count = self.ledger.active_count_for_slot(at.date(), at.time()).await?;
        let rejection = SlotGenerator::from_snapshot(snapshot).slot_rejection(at, now, booked_count);

        debug!("Slot {} has {} active bookings, rejection: {:?}", at, booked_count, rejection);
        Ok(rejection)
    }
}

/// Trimmed notes, `None` when blank.
fn normalize_notes(notes: Option<String>) -> Result<Option<String>, AppointmentError> {
    let notes = notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    if let Some(text) = &notes {
        if text.chars().count() > MAX_NOTES_LENGTH {
            return Err(AppointmentError::ValidationError(format!(
                "Notes cannot exceed {} characters",
                MAX_NOTES_LENGTH
            )));
        }
    }
    Ok(notes)
}

/// The human-readable part of a refusal, without the error-kind prefix.
fn refusal_reason(error: &AppointmentError) -> String {
    match error {
        AppointmentError::SlotUnavailable(msg)
        | AppointmentError::PolicyViolation(msg)
        | AppointmentError::ValidationError(msg) => msg.clone(),
        AppointmentError::Unauthorized => "You can only cancel your own appointments".to_string(),
        AppointmentError::InvalidStatusTransition { from, .. } => {
            format!("A {} appointment cannot be cancelled", from.label().to_lowercase())
        }
        other => other.to_string(),
    }
}
