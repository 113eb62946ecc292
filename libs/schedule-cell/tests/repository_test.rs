// libs/schedule-cell/tests/repository_test.rs

use assert_matches::assert_matches;
use uuid::Uuid;

use schedule_cell::{
    BlackoutRange, ClinicPolicy, InMemoryScheduleRepository, ScheduleError, ScheduleRepository,
    ScheduleSnapshot, SlotGenerator, WeeklyTemplate, WorkingHours,
};
use shared_utils::test_utils::{date, time};

fn repository() -> InMemoryScheduleRepository {
    let template = WeeklyTemplate::uniform(&[0, 1, 2, 3, 4], time(9, 0), time(17, 0)).unwrap();
    InMemoryScheduleRepository::new(ScheduleSnapshot::new(
        template,
        Default::default(),
        ClinicPolicy::default(),
    ))
    .unwrap()
}

#[tokio::test]
async fn test_rejects_invalid_initial_policy() {
    let snapshot = ScheduleSnapshot {
        policy: ClinicPolicy {
            slot_duration_minutes: 0,
            ..ClinicPolicy::default()
        },
        ..ScheduleSnapshot::default()
    };
    assert_matches!(
        InMemoryScheduleRepository::new(snapshot),
        Err(ScheduleError::InvalidPolicy(_))
    );
}

#[tokio::test]
async fn test_upsert_working_hours_replaces_weekday() {
    let repo = repository();

    repo.upsert_working_hours(WorkingHours::new(0, time(10, 0), time(12, 0)))
        .await
        .unwrap();

    let snapshot = repo.snapshot().await.unwrap();
    let sunday = snapshot.template.entry(0).unwrap();
    assert_eq!(sunday.start_time, time(10, 0));
    assert_eq!(snapshot.template.entries().count(), 5);
}

#[tokio::test]
async fn test_upsert_rejects_invalid_hours_and_keeps_state() {
    let repo = repository();

    let result = repo
        .upsert_working_hours(WorkingHours::new(0, time(12, 0), time(10, 0)))
        .await;
    assert_matches!(result, Err(ScheduleError::InvalidWorkingHours { weekday: 0, .. }));

    let snapshot = repo.snapshot().await.unwrap();
    assert_eq!(snapshot.template.entry(0).unwrap().start_time, time(9, 0));
}

#[tokio::test]
async fn test_blackouts_take_effect_and_can_be_removed() {
    let repo = repository();
    let range = BlackoutRange::new(date(2025, 6, 8), date(2025, 6, 9), Some("Conference".into())).unwrap();
    let id = repo.add_blackout(range).await.unwrap().id;

    let snapshot = repo.snapshot().await.unwrap();
    assert!(!SlotGenerator::from_snapshot(&snapshot).is_date_available(date(2025, 6, 8)));

    repo.remove_blackout(id).await.unwrap();
    let snapshot = repo.snapshot().await.unwrap();
    assert!(SlotGenerator::from_snapshot(&snapshot).is_date_available(date(2025, 6, 8)));

    assert_matches!(
        repo.remove_blackout(Uuid::new_v4()).await,
        Err(ScheduleError::BlackoutNotFound(_))
    );
}

#[tokio::test]
async fn test_deactivate_weekday() {
    let repo = repository();
    repo.deactivate_weekday(0).await.unwrap();
    assert_matches!(repo.deactivate_weekday(9).await, Err(ScheduleError::InvalidWeekday(9)));

    let snapshot = repo.snapshot().await.unwrap();
    assert!(!snapshot.template.entry(0).unwrap().is_active);
}

#[tokio::test]
async fn test_update_policy_validates() {
    let repo = repository();

    let invalid = ClinicPolicy {
        max_patients_per_slot: 0,
        ..ClinicPolicy::default()
    };
    assert!(repo.update_policy(invalid).await.is_err());

    let wider = ClinicPolicy {
        max_patients_per_slot: 4,
        ..ClinicPolicy::default()
    };
    repo.update_policy(wider).await.unwrap();
    assert_eq!(repo.snapshot().await.unwrap().policy.max_patients_per_slot, 4);
}
