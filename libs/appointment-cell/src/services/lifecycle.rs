// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use schedule_cell::ClinicPolicy;
use shared_models::Actor;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, CancelledBy};

/// The appointment state machine. Every method is pure: it validates the
/// move against the current row and returns the updated copy, leaving
/// persistence to the ledger.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !current_status.can_transition_to(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        current_status.valid_transitions().to_vec()
    }

    pub fn confirm(&self, appointment: &Appointment, at: DateTime<Utc>) -> Result<Appointment, AppointmentError> {
        self.validate_status_transition(appointment.status, AppointmentStatus::Confirmed)?;

        let mut updated = appointment.clone();
        updated.status = AppointmentStatus::Confirmed;
        updated.confirmed_at = Some(at);
        updated.updated_at = at;
        Ok(updated)
    }

    pub fn complete(
        &self,
        appointment: &Appointment,
        admin_notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        let mut updated = appointment.clone();
        updated.status = AppointmentStatus::Completed;
        updated.completed_at = Some(at);
        if admin_notes.is_some() {
            updated.admin_notes = admin_notes;
        }
        updated.updated_at = at;
        Ok(updated)
    }

    pub fn cancel(
        &self,
        appointment: &Appointment,
        reason: &str,
        cancelled_by: CancelledBy,
        at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::ValidationError(
                "A cancellation reason is required".to_string(),
            ));
        }

        let mut updated = appointment.clone();
        updated.status = AppointmentStatus::Cancelled;
        updated.cancelled_at = Some(at);
        updated.cancellation_reason = Some(reason.to_string());
        updated.cancelled_by = Some(cancelled_by);
        updated.updated_at = at;
        Ok(updated)
    }

    pub fn mark_no_show(&self, appointment: &Appointment, at: DateTime<Utc>) -> Result<Appointment, AppointmentError> {
        self.validate_status_transition(appointment.status, AppointmentStatus::NoShow)?;

        let mut updated = appointment.clone();
        updated.status = AppointmentStatus::NoShow;
        updated.no_show_at = Some(at);
        updated.updated_at = at;
        Ok(updated)
    }

    /// Ownership, then status, then the cancellation window. Staff skip the
    /// window; patients are held to it. The window is open while
    /// `start - now >= cancellation_hours`.
    pub fn check_cancellation(
        &self,
        appointment: &Appointment,
        actor: &Actor,
        now: NaiveDateTime,
        policy: &ClinicPolicy,
    ) -> Result<(), AppointmentError> {
        if !actor.owns(appointment.patient_id) {
            return Err(AppointmentError::Unauthorized);
        }

        if appointment.status.is_final() {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                to: AppointmentStatus::Cancelled,
            });
        }

        if !actor.is_staff() && appointment.starts_at() - now < policy.cancellation_window() {
            return Err(AppointmentError::PolicyViolation(format!(
                "Appointments can only be cancelled at least {} hours in advance",
                policy.cancellation_hours
            )));
        }

        Ok(())
    }

    /// Who the ledger records as having cancelled.
    pub fn cancelled_by_for(&self, actor: &Actor) -> CancelledBy {
        if actor.is_staff() {
            CancelledBy::Admin
        } else {
            CancelledBy::Patient
        }
    }
}
