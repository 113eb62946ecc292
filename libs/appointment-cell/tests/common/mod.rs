// libs/appointment-cell/tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};

use appointment_cell::{Appointment, AppointmentError, AppointmentScheduler, InMemoryBookingLedger};
use schedule_cell::{BlackoutCalendar, ClinicPolicy, InMemoryScheduleRepository, ScheduleSnapshot, WeeklyTemplate};
use shared_config::AppConfig;
use shared_utils::test_utils::{init_test_tracing, time, utc};
use shared_utils::FixedClock;

pub struct TestClinic {
    pub scheduler: AppointmentScheduler,
    pub ledger: Arc<InMemoryBookingLedger>,
    pub schedule: Arc<InMemoryScheduleRepository>,
    pub clock: Arc<FixedClock>,
}

impl std::fmt::Debug for TestClinic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClinic").finish_non_exhaustive()
    }
}

/// Sunday through Thursday, 09:00-17:00, no break.
pub fn sunday_to_thursday() -> WeeklyTemplate {
    WeeklyTemplate::uniform(&[0, 1, 2, 3, 4], time(9, 0), time(17, 0)).unwrap()
}

/// Wednesday 2025-06-04 08:00 UTC. The next Sunday is 2025-06-08.
pub fn wednesday_morning() -> DateTime<Utc> {
    utc(2025, 6, 4, 8, 0)
}

pub fn clinic() -> TestClinic {
    clinic_with(ClinicPolicy::default(), Vec::new())
}

pub fn clinic_with_policy(policy: ClinicPolicy) -> TestClinic {
    clinic_with(policy, Vec::new())
}

pub fn clinic_with(policy: ClinicPolicy, history: Vec<Appointment>) -> TestClinic {
    init_test_tracing();

    let snapshot = ScheduleSnapshot::new(sunday_to_thursday(), BlackoutCalendar::default(), policy);
    let schedule = Arc::new(InMemoryScheduleRepository::new(snapshot).unwrap());
    let ledger = Arc::new(InMemoryBookingLedger::with_appointments(history));
    let clock = Arc::new(FixedClock::new(wednesday_morning()));

    let scheduler = AppointmentScheduler::new(ledger.clone(), schedule.clone(), clock.clone());

    TestClinic {
        scheduler,
        ledger,
        schedule,
        clock,
    }
}

/// Default-policy clinic whose scheduler is then built from `config`.
pub async fn configured_clinic(config: &AppConfig) -> Result<TestClinic, AppointmentError> {
    let clinic = clinic();
    let scheduler = AppointmentScheduler::with_config(
        clinic.ledger.clone(),
        clinic.schedule.clone(),
        clinic.clock.clone(),
        config,
    )
    .await?;

    Ok(TestClinic { scheduler, ..clinic })
}
