//! Durability: write-through persistence and restart rehydration over a
//! file-backed SQLite database.

use std::sync::Arc;

use medq_core::application::{EnqueueRequest, QueueCoordinator, WaitEstimator};
use medq_core::domain::{EntryStatus, PriorityClass};
use medq_core::port::time_provider::SystemTimeProvider;
use medq_core::port::Doctor;
use medq_infra_sqlite::{create_pool, run_migrations, SqliteDoctorRegistry, SqliteQueueStore};
use sqlx::SqlitePool;

struct TempDb {
    path: String,
}

impl TempDb {
    fn new() -> Self {
        let path = std::env::temp_dir()
            .join(format!("medq_test_{}.db", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();
        Self { path }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path, suffix));
        }
    }
}

async fn engine_over(pool: &SqlitePool) -> QueueCoordinator {
    let registry = Arc::new(SqliteDoctorRegistry::new(pool.clone()));
    let doctor = Doctor {
        id: "dr-grey".to_string(),
        on_duty: true,
        capacity: 1,
        avg_service_secs: Some(300),
    };
    registry.upsert_doctor(&doctor, None).await.unwrap();

    QueueCoordinator::new(
        registry,
        Arc::new(SqliteQueueStore::new(pool.clone())),
        Arc::new(SystemTimeProvider),
        WaitEstimator::default(),
    )
}

fn request(patient: &str, priority: PriorityClass) -> EnqueueRequest {
    EnqueueRequest {
        doctor_id: "dr-grey".to_string(),
        patient_ref: patient.to_string(),
        priority,
        note: Some("walk-in".to_string()),
    }
}

/// Every state change lands in the store as it happens, terminal states
/// included, so nothing depends on a clean shutdown.
#[tokio::test]
async fn write_through_persists_every_transition() {
    let db = TempDb::new();
    let pool = create_pool(&db.path).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let engine = engine_over(&pool).await;

    engine
        .enqueue(request("p1", PriorityClass::Routine))
        .await
        .unwrap();
    engine
        .enqueue(request("p2", PriorityClass::Routine))
        .await
        .unwrap();
    engine.call_next("dr-grey").await.unwrap();
    engine.complete("dr-grey", 1).await.unwrap();
    engine.cancel("dr-grey", 2).await.unwrap();

    let statuses: Vec<(i64, String)> = sqlx::query_as(
        "SELECT token_number, status FROM queue_entries ORDER BY token_number ASC",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(
        statuses,
        vec![(1, "COMPLETED".to_string()), (2, "CANCELLED".to_string())]
    );
}

/// A restarted engine rebuilds each queue from the active rows, keeps the
/// established ordering, and continues the day's token sequence.
#[tokio::test]
async fn restart_restores_queue_and_token_sequence() {
    let db = TempDb::new();

    // First engine lifetime
    {
        let pool = create_pool(&db.path).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let engine = engine_over(&pool).await;

        for patient in ["p1", "p2", "p3"] {
            engine
                .enqueue(request(patient, PriorityClass::Routine))
                .await
                .unwrap();
        }
        engine
            .escalate("dr-grey", 3, PriorityClass::Urgent)
            .await
            .unwrap();
        engine.call_next("dr-grey").await.unwrap();
        // Pool dropped: simulated crash-free shutdown
    }

    // Restart
    let pool = create_pool(&db.path).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let engine = engine_over(&pool).await;

    let snapshot = engine.snapshot("dr-grey").await.unwrap();
    let tokens: Vec<u32> = snapshot.iter().map(|e| e.token_number).collect();
    // Token 3 was escalated and called in before the restart
    assert_eq!(tokens, vec![3, 1, 2]);
    assert_eq!(snapshot[0].status, EntryStatus::InService);
    assert_eq!(snapshot[0].priority, PriorityClass::Urgent);
    assert_eq!(snapshot[1].note.as_deref(), Some("walk-in"));

    let next = engine
        .enqueue(request("p4", PriorityClass::Routine))
        .await
        .unwrap();
    assert_eq!(next.token_number, 4);

    // The rehydrated queue keeps serving where the old one stopped
    engine.complete("dr-grey", 3).await.unwrap();
    let called = engine.call_next("dr-grey").await.unwrap().unwrap();
    assert_eq!(called.token_number, 1);
}

/// Completed and cancelled entries never come back after a restart
#[tokio::test]
async fn terminal_entries_are_not_rehydrated() {
    let db = TempDb::new();

    {
        let pool = create_pool(&db.path).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let engine = engine_over(&pool).await;

        engine
            .enqueue(request("p1", PriorityClass::Routine))
            .await
            .unwrap();
        engine
            .enqueue(request("p2", PriorityClass::Routine))
            .await
            .unwrap();
        engine.call_next("dr-grey").await.unwrap();
        engine.complete("dr-grey", 1).await.unwrap();
        engine.cancel("dr-grey", 2).await.unwrap();
    }

    let pool = create_pool(&db.path).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let engine = engine_over(&pool).await;

    assert!(engine.snapshot("dr-grey").await.unwrap().is_empty());

    // Tokens still continue past the terminal entries
    let next = engine
        .enqueue(request("p3", PriorityClass::Routine))
        .await
        .unwrap();
    assert_eq!(next.token_number, 3);
}
