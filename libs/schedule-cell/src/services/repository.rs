// libs/schedule-cell/src/services/repository.rs
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::models::{BlackoutRange, ClinicPolicy, ScheduleSnapshot, WorkingHours};

/// Read side used by the scheduler plus the staff-facing edits. Storage
/// engines implement this; every write validates the schedule invariants
/// before it lands.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn snapshot(&self) -> Result<ScheduleSnapshot, ScheduleError>;

    async fn upsert_working_hours(&self, entry: WorkingHours) -> Result<WorkingHours, ScheduleError>;

    async fn deactivate_weekday(&self, weekday: u8) -> Result<(), ScheduleError>;

    async fn add_blackout(&self, range: BlackoutRange) -> Result<BlackoutRange, ScheduleError>;

    async fn remove_blackout(&self, id: Uuid) -> Result<BlackoutRange, ScheduleError>;

    async fn update_policy(&self, policy: ClinicPolicy) -> Result<ClinicPolicy, ScheduleError>;
}

#[derive(Debug)]
pub struct InMemoryScheduleRepository {
    state: RwLock<ScheduleSnapshot>,
}

impl InMemoryScheduleRepository {
    pub fn new(snapshot: ScheduleSnapshot) -> Result<Self, ScheduleError> {
        snapshot.policy.validate()?;
        for entry in snapshot.template.entries() {
            entry.validate()?;
        }
        Ok(Self {
            state: RwLock::new(snapshot),
        })
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn snapshot(&self) -> Result<ScheduleSnapshot, ScheduleError> {
        Ok(self.state.read().await.clone())
    }

    async fn upsert_working_hours(&self, entry: WorkingHours) -> Result<WorkingHours, ScheduleError> {
        debug!("Upserting working hours for weekday {}", entry.weekday);
        let mut state = self.state.write().await;
        state.template.upsert(entry.clone())?;
        info!("Working hours for weekday {} updated", entry.weekday);
        Ok(entry)
    }

    async fn deactivate_weekday(&self, weekday: u8) -> Result<(), ScheduleError> {
        let mut state = self.state.write().await;
        state.template.deactivate(weekday)?;
        info!("Weekday {} deactivated", weekday);
        Ok(())
    }

    async fn add_blackout(&self, range: BlackoutRange) -> Result<BlackoutRange, ScheduleError> {
        if range.start_date > range.end_date {
            return Err(ScheduleError::InvalidBlackout(format!(
                "start date {} is after end date {}",
                range.start_date, range.end_date
            )));
        }
        let mut state = self.state.write().await;
        state.blackouts.add(range.clone());
        info!("Blackout {} added: {} to {}", range.id, range.start_date, range.end_date);
        Ok(range)
    }

    async fn remove_blackout(&self, id: Uuid) -> Result<BlackoutRange, ScheduleError> {
        let mut state = self.state.write().await;
        let removed = state
            .blackouts
            .remove(id)
            .ok_or(ScheduleError::BlackoutNotFound(id))?;
        info!("Blackout {} removed", id);
        Ok(removed)
    }

    async fn update_policy(&self, policy: ClinicPolicy) -> Result<ClinicPolicy, ScheduleError> {
        policy.validate()?;
        let mut state = self.state.write().await;
        state.policy = policy.clone();
        info!("Clinic policy replaced");
        Ok(policy)
    }
}
