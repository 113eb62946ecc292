use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse error categories shared by every cell. Callers at the boundary
/// branch on these instead of on concrete error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    SlotUnavailable,
    PolicyViolation,
    StateTransition,
    NotFound,
    Authorization,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::SlotUnavailable => "slot_unavailable",
            ErrorKind::PolicyViolation => "policy_violation",
            ErrorKind::StateTransition => "state_transition",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
