use std::env;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 30;
pub const DEFAULT_MAX_PATIENTS_PER_SLOT: u32 = 1;
pub const DEFAULT_ADVANCE_BOOKING_DAYS: u32 = 30;
pub const DEFAULT_CANCELLATION_HOURS: u32 = 24;
pub const DEFAULT_NO_SHOW_THRESHOLD: u32 = 3;

/// Clinic-wide settings as they arrive from the environment.
///
/// Values are raw; range checks happen when a `ClinicPolicy` is built from
/// them in the schedule cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub slot_duration_minutes: u32,
    pub max_patients_per_slot: u32,
    pub advance_booking_days: u32,
    pub cancellation_hours: u32,
    pub no_show_threshold: u32,
    /// `None` counts every no-show the patient ever had.
    pub no_show_lookback_days: Option<u32>,
    /// Offset of clinic wall-clock time from UTC.
    pub utc_offset_minutes: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slot_duration_minutes: DEFAULT_SLOT_DURATION_MINUTES,
            max_patients_per_slot: DEFAULT_MAX_PATIENTS_PER_SLOT,
            advance_booking_days: DEFAULT_ADVANCE_BOOKING_DAYS,
            cancellation_hours: DEFAULT_CANCELLATION_HOURS,
            no_show_threshold: DEFAULT_NO_SHOW_THRESHOLD,
            no_show_lookback_days: None,
            utc_offset_minutes: 0,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and then read the process environment.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            slot_duration_minutes: lenient(
                &lookup,
                "CLINIC_SLOT_DURATION_MINUTES",
                defaults.slot_duration_minutes,
            ),
            max_patients_per_slot: lenient(
                &lookup,
                "CLINIC_MAX_PATIENTS_PER_SLOT",
                defaults.max_patients_per_slot,
            ),
            advance_booking_days: lenient(
                &lookup,
                "CLINIC_ADVANCE_BOOKING_DAYS",
                defaults.advance_booking_days,
            ),
            cancellation_hours: lenient(
                &lookup,
                "CLINIC_CANCELLATION_HOURS",
                defaults.cancellation_hours,
            ),
            no_show_threshold: lenient(
                &lookup,
                "CLINIC_NO_SHOW_THRESHOLD",
                defaults.no_show_threshold,
            ),
            no_show_lookback_days: lookup("CLINIC_NO_SHOW_LOOKBACK_DAYS").and_then(|raw| {
                raw.trim().parse().map_err(|_| {
                    warn!("CLINIC_NO_SHOW_LOOKBACK_DAYS is not a number ({}), counting all no-shows", raw);
                }).ok()
            }),
            utc_offset_minutes: lenient(&lookup, "CLINIC_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
        };

        if !config.is_configured() {
            warn!("Clinic policy values out of range - booking will be rejected until fixed");
        }

        config
    }


    /// Cheap range check mirroring the policy invariants.
    pub fn is_configured(&self) -> bool {
        self.slot_duration_minutes > 0
            && self.max_patients_per_slot >= 1
            && self.no_show_threshold >= 1
            && self.utc_offset_minutes.abs() < 24 * 60
    }
}

fn lenient<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        None => {
            warn!("{} not set, using default {}", key, default);
            default
        }
    }
}
