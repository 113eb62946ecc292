use thiserror::Error;
use uuid::Uuid;

use shared_models::ErrorKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid clinic policy: {0}")]
    InvalidPolicy(String),

    #[error("Weekday must be between 0 (Sunday) and 6 (Saturday), got {0}")]
    InvalidWeekday(u8),

    #[error("Invalid working hours for weekday {weekday}: {reason}")]
    InvalidWorkingHours { weekday: u8, reason: String },

    #[error("Working hours for weekday {0} are defined more than once")]
    DuplicateWeekday(u8),

    #[error("Invalid blackout range: {0}")]
    InvalidBlackout(String),

    #[error("Blackout range not found: {0}")]
    BlackoutNotFound(Uuid),

    #[error("Schedule storage error: {0}")]
    Storage(String),
}

impl ScheduleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScheduleError::BlackoutNotFound(_) => ErrorKind::NotFound,
            ScheduleError::Storage(_) => ErrorKind::Storage,
            _ => ErrorKind::Validation,
        }
    }
}
