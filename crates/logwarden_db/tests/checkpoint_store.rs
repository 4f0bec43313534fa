//! Checkpoint store behaviour against a real SQLite file.

use chrono::{TimeZone, Utc};
use logwarden_db::{CheckpointDb, CheckpointRecord, CheckpointStore};
use logwarden_ids::TenantKey;
use tempfile::TempDir;

#[tokio::test]
async fn test_checkpoint_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("checkpoints.sqlite3");
    let key = TenantKey::new("1001", "srv-7");
    let at = Utc.with_ymd_and_hms(2025, 5, 30, 12, 20, 0).unwrap();

    let db = CheckpointDb::open(&db_path).await.unwrap();
    assert_eq!(db.load(&key).await.unwrap(), None);
    db.save(&key, &CheckpointRecord::completed(42, at).with_source("remote"))
        .await
        .unwrap();
    db.close().await;

    let db = CheckpointDb::open_existing(&db_path).await.unwrap();
    let record = db.load(&key).await.unwrap().expect("record persisted");
    assert_eq!(record.line_count, 42);
    assert_eq!(record.last_updated, at);
    assert!(record.cold_start_complete);
    assert_eq!(record.source.as_deref(), Some("remote"));
}

#[tokio::test]
async fn test_save_is_full_overwrite_per_tenant() {
    let db = CheckpointDb::open_in_memory().await.unwrap();
    let a = TenantKey::new("1001", "a");
    let b = TenantKey::new("1001", "b");

    db.save(&a, &CheckpointRecord::completed(10, Utc::now())).await.unwrap();
    db.save(&b, &CheckpointRecord::completed(99, Utc::now())).await.unwrap();

    let rewound = CheckpointRecord {
        line_count: 2,
        last_updated: Utc::now(),
        cold_start_complete: false,
        source: None,
    };
    db.save(&a, &rewound).await.unwrap();

    let loaded = db.load(&a).await.unwrap().unwrap();
    assert_eq!(loaded.line_count, 2);
    assert!(!loaded.cold_start_complete);
    assert_eq!(loaded.source, None);
    assert_eq!(db.load(&b).await.unwrap().unwrap().line_count, 99);
}

#[tokio::test]
async fn test_list_and_remove() {
    let db = CheckpointDb::open_in_memory().await.unwrap();
    let a = TenantKey::new("2", "x");
    let b = TenantKey::new("1", "y");

    db.save(&a, &CheckpointRecord::completed(1, Utc::now())).await.unwrap();
    db.save(&b, &CheckpointRecord::completed(2, Utc::now())).await.unwrap();

    let all = db.list().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].0, b);

    assert!(db.remove(&a).await.unwrap());
    assert!(!db.remove(&a).await.unwrap());
    assert_eq!(db.list().await.unwrap().len(), 1);
}
