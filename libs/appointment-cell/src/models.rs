// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use schedule_cell::ScheduleError;
use shared_models::ErrorKind;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>, // set iff status == Cancelled
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub no_show_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// A fresh `pending` appointment.
    pub fn pending(
        patient_id: Uuid,
        starts_at: NaiveDateTime,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            date: starts_at.date(),
            time: starts_at.time(),
            status: AppointmentStatus::Pending,
            notes,
            admin_notes: None,
            cancellation_reason: None,
            cancelled_by: None,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            no_show_at: None,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    /// Clinic wall-clock start of the appointment.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether this row takes a seat in its slot.
    pub fn holds_capacity(&self) -> bool {
        !self.is_deleted() && self.status.is_active()
    }

    pub fn occupies(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.holds_capacity() && self.date == date && self.time == time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::NoShow => "No Show",
        }
    }

    /// Badge colour used by the presentation layer.
    pub fn color(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "warning",
            AppointmentStatus::Confirmed => "info",
            AppointmentStatus::Completed => "success",
            AppointmentStatus::Cancelled => "danger",
            AppointmentStatus::NoShow => "gray",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Everything except a cancellation occupies a seat in its slot.
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Pending => &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed => &[
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => &[],
            AppointmentStatus::Cancelled => &[],
            AppointmentStatus::NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Admin,
}

// ==============================================================================
// PRE-FLIGHT ANSWERS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingEligibility {
    pub can_book: bool,
    pub reason: Option<String>,
}

impl BookingEligibility {
    pub fn allowed() -> Self {
        Self { can_book: true, reason: None }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            can_book: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationEligibility {
    pub can_cancel: bool,
    pub reason: Option<String>,
}

impl CancellationEligibility {
    pub fn allowed() -> Self {
        Self { can_cancel: true, reason: None }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            can_cancel: false,
            reason: Some(reason.into()),
        }
    }
}

// ==============================================================================
// STATISTICS
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentStatistics {
    pub total: u32,
    pub pending: u32,
    pub confirmed: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub no_show: u32,
    pub today: u32,
    pub upcoming: u32,
}

impl AppointmentStatistics {
    /// Tombstoned rows are skipped. `upcoming` counts non-final appointments
    /// starting at or after `now`.
    pub fn from_appointments<'a, I>(appointments: I, now: NaiveDateTime) -> Self
    where
        I: IntoIterator<Item = &'a Appointment>,
    {
        let mut stats = Self::default();
        for appointment in appointments.into_iter().filter(|a| !a.is_deleted()) {
            stats.total += 1;
            match appointment.status {
                AppointmentStatus::Pending => stats.pending += 1,
                AppointmentStatus::Confirmed => stats.confirmed += 1,
                AppointmentStatus::Completed => stats.completed += 1,
                AppointmentStatus::Cancelled => stats.cancelled += 1,
                AppointmentStatus::NoShow => stats.no_show += 1,
            }
            if appointment.date == now.date() {
                stats.today += 1;
            }
            if !appointment.status.is_final() && appointment.starts_at() >= now {
                stats.upcoming += 1;
            }
        }
        stats
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment slot not available: {0}")]
    SlotUnavailable(String),

    #[error("Booking policy violation: {0}")]
    PolicyViolation(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::NotFound => ErrorKind::NotFound,
            AppointmentError::SlotUnavailable(_) => ErrorKind::SlotUnavailable,
            AppointmentError::PolicyViolation(_) => ErrorKind::PolicyViolation,
            AppointmentError::InvalidStatusTransition { .. } => ErrorKind::StateTransition,
            AppointmentError::Unauthorized => ErrorKind::Authorization,
            AppointmentError::ValidationError(_) => ErrorKind::Validation,
            AppointmentError::DatabaseError(_) => ErrorKind::Storage,
        }
    }
}

impl From<ScheduleError> for AppointmentError {
    fn from(error: ScheduleError) -> Self {
        match error {
            ScheduleError::Storage(msg) => AppointmentError::DatabaseError(msg),
            ScheduleError::BlackoutNotFound(_) => AppointmentError::NotFound,
            other => AppointmentError::ValidationError(other.to_string()),
        }
    }
}
