// libs/appointment-cell/src/services/ledger.rs
//
// Authoritative appointment store. Slot reservation reads the active count
// for the exact (date, time) and inserts under the same lock, so racing
// bookings for the last seat cannot both succeed.
//

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use schedule_cell::BookedCounts;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// Storage capability behind the scheduler. Every read excludes tombstoned
/// rows. `reserve` must be atomic per slot; `commit_transition` per row.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Insert `appointment` if its slot holds fewer than `capacity` active
    /// appointments, checked in the same unit of work as the insert.
    async fn reserve(&self, appointment: Appointment, capacity: u32) -> Result<Appointment, AppointmentError>;

    /// Replace the row with `updated` only if it is still in `expected`.
    async fn commit_transition(
        &self,
        expected: AppointmentStatus,
        updated: Appointment,
    ) -> Result<Appointment, AppointmentError>;

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    async fn active_count_for_slot(&self, date: NaiveDate, time: NaiveTime) -> Result<u32, AppointmentError>;

    /// Active counts for every slot with `from <= date <= to`.
    async fn booked_counts_between(&self, from: NaiveDate, to: NaiveDate) -> Result<BookedCounts, AppointmentError>;

    /// No-shows for the patient, optionally only those starting at or after `since`.
    async fn no_show_count_for_patient(
        &self,
        patient_id: Uuid,
        since: Option<NaiveDateTime>,
    ) -> Result<u32, AppointmentError>;

    async fn appointments_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;

    async fn appointments_for_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError>;

    async fn all_appointments(&self) -> Result<Vec<Appointment>, AppointmentError>;

    /// Set the `deleted_at` tombstone. The row is kept for audit.
    async fn tombstone(&self, id: Uuid, at: DateTime<Utc>) -> Result<Appointment, AppointmentError>;
}

/// Process-local ledger. One mutex guards the whole table, which is the
/// lock scope `reserve` needs.
#[derive(Default)]
pub struct InMemoryBookingLedger {
    rows: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryBookingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load existing rows, e.g. history imported from another store.
    pub fn with_appointments(appointments: Vec<Appointment>) -> Self {
        Self {
            rows: Mutex::new(appointments.into_iter().map(|a| (a.id, a)).collect()),
        }
    }

    /// Every row, tombstones included. Audit use only.
    pub async fn audit_trail(&self) -> Vec<Appointment> {
        let rows = self.rows.lock().await;
        sorted(rows.values().cloned().collect())
    }

    async fn select<F>(&self, predicate: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool + Send,
    {
        let rows = self.rows.lock().await;
        sorted(
            rows.values()
                .filter(|a| !a.is_deleted() && predicate(a))
                .cloned()
                .collect(),
        )
    }
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by(|a, b| {
        a.starts_at()
            .cmp(&b.starts_at())
            .then(a.created_at.cmp(&b.created_at))
    });
    appointments
}

#[async_trait]
impl BookingLedger for InMemoryBookingLedger {
    async fn reserve(&self, appointment: Appointment, capacity: u32) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.lock().await;

        let taken = rows
            .values()
            .filter(|a| a.occupies(appointment.date, appointment.time))
            .count() as u32;

        if taken >= capacity {
            warn!(
                "Slot {} {} is full ({}/{}), rejecting reservation",
                appointment.date, appointment.time, taken, capacity
            );
            return Err(AppointmentError::SlotUnavailable(
                "The requested slot is fully booked".to_string(),
            ));
        }

        if rows.contains_key(&appointment.id) {
            return Err(AppointmentError::DatabaseError(format!(
                "Appointment {} already exists",
                appointment.id
            )));
        }

        debug!(
            "Reserved seat {}/{} at {} {}",
            taken + 1,
            capacity,
            appointment.date,
            appointment.time
        );
        rows.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn commit_transition(
        &self,
        expected: AppointmentStatus,
        updated: Appointment,
    ) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.lock().await;

        let current = rows
            .get_mut(&updated.id)
            .filter(|a| !a.is_deleted())
            .ok_or(AppointmentError::NotFound)?;

        if current.status != expected {
            warn!(
                "Appointment {} moved to {} concurrently, refusing {}",
                updated.id, current.status, updated.status
            );
            return Err(AppointmentError::InvalidStatusTransition {
                from: current.status,
                to: updated.status,
            });
        }

        info!("Appointment {} {} -> {}", updated.id, expected, updated.status);
        *current = updated.clone();
        Ok(updated)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let rows = self.rows.lock().await;
        Ok(rows.get(&id).filter(|a| !a.is_deleted()).cloned())
    }

    async fn active_count_for_slot(&self, date: NaiveDate, time: NaiveTime) -> Result<u32, AppointmentError> {
        let rows = self.rows.lock().await;
        Ok(rows.values().filter(|a| a.occupies(date, time)).count() as u32)
    }

    async fn booked_counts_between(&self, from: NaiveDate, to: NaiveDate) -> Result<BookedCounts, AppointmentError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .filter(|a| a.holds_capacity() && a.date >= from && a.date <= to)
            .map(|a| a.starts_at())
            .collect())
    }

    async fn no_show_count_for_patient(
        &self,
        patient_id: Uuid,
        since: Option<NaiveDateTime>,
    ) -> Result<u32, AppointmentError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .filter(|a| !a.is_deleted())
            .filter(|a| a.patient_id == patient_id && a.status == AppointmentStatus::NoShow)
            .filter(|a| since.map_or(true, |since| a.starts_at() >= since))
            .count() as u32)
    }

    async fn appointments_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.select(|a| a.patient_id == patient_id).await)
    }

    async fn appointments_for_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.select(|a| a.date == date).await)
    }

    async fn all_appointments(&self) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.select(|_| true).await)
    }

    async fn tombstone(&self, id: Uuid, at: DateTime<Utc>) -> Result<Appointment, AppointmentError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(&id)
            .filter(|a| !a.is_deleted())
            .ok_or(AppointmentError::NotFound)?;

        row.deleted_at = Some(at);
        row.updated_at = at;
        info!("Appointment {} archived", id);
        Ok(row.clone())
    }
}
