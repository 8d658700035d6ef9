#![cfg(all(feature = "server", feature = "sqlite"))]

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;

use licreg::errors::{LicenseError, LicenseResult};
use licreg::server::database::{Database, NewLicense};
use licreg::server::registry::{CreateLicense, LicenseRegistry, Verification, VerifyFailure};

/// Helper: create an in-memory SQLite Database with the licenses table.
async fn setup_in_memory_db() -> LicenseResult<Arc<Database>> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| LicenseError::ServerError(format!("db connect failed: {e}")))?;

    let db = Arc::new(Database::SQLite(pool));
    db.init_schema().await?;
    Ok(db)
}

fn new_license(key: &str, expires_at: DateTime<Utc>) -> NewLicense {
    NewLicense {
        key: key.to_string(),
        plan: "month".to_string(),
        expires_at,
        device: None,
        note: Some("seeded".to_string()),
        created_at: Utc::now(),
    }
}

fn assert_close(actual: DateTime<Utc>, expected: DateTime<Utc>) {
    let drift = (actual - expected).num_milliseconds().abs();
    assert!(drift <= 5_000, "expected ~{expected}, got {actual}");
}

#[tokio::test]
async fn init_schema_is_idempotent() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    db.init_schema().await?;
    assert_eq!(db.db_type(), "sqlite");
    Ok(())
}

#[tokio::test]
async fn insert_and_get_roundtrip() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let expires_at = Utc::now() + TimeDelta::days(30);

    let stored = db
        .insert_license(&new_license("DB-1", expires_at))
        .await?
        .expect("row inserted");
    assert!(stored.id > 0);
    assert!(stored.is_active);
    assert_eq!(stored.expires_at, expires_at);

    let fetched = db.get_license("DB-1").await?.expect("row exists");
    assert_eq!(fetched, stored);
    assert_eq!(fetched.note.as_deref(), Some("seeded"));

    assert!(db.get_license("DB-2").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_insert_returns_none() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let expires_at = Utc::now() + TimeDelta::days(1);

    assert!(db.insert_license(&new_license("DB-DUP", expires_at)).await?.is_some());

    let mut again = new_license("DB-DUP", expires_at + TimeDelta::days(100));
    again.plan = "year".to_string();
    assert!(db.insert_license(&again).await?.is_none());

    let kept = db.get_license("DB-DUP").await?.expect("row exists");
    assert_eq!(kept.plan, "month");
    Ok(())
}

#[tokio::test]
async fn extend_uses_later_of_now_and_expiry() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let now = Utc::now();

    let future = now + TimeDelta::days(5);
    db.insert_license(&new_license("DB-FUT", future)).await?;
    let extended = db.extend_license("DB-FUT", now, 10.0).await?.expect("row exists");
    assert_close(extended, future + TimeDelta::days(10));

    let past = now - TimeDelta::days(5);
    db.insert_license(&new_license("DB-PAST", past)).await?;
    let extended = db.extend_license("DB-PAST", now, 10.0).await?.expect("row exists");
    assert_close(extended, now + TimeDelta::days(10));

    let stored = db.get_license("DB-PAST").await?.expect("row exists");
    assert_eq!(stored.expires_at, extended);

    assert!(db.extend_license("DB-NONE", now, 10.0).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn extend_stops_at_latest_storable_expiry() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let far = Utc.with_ymd_and_hms(9990, 1, 1, 0, 0, 0).unwrap();
    db.insert_license(&new_license("DB-FAR", far)).await?;

    assert!(db.extend_license("DB-FAR", Utc::now(), 36_500.0).await?.is_none());
    let stored = db.get_license("DB-FAR").await?.expect("row exists");
    assert_eq!(stored.expires_at, far);

    let registry = LicenseRegistry::new(db, "SKU");
    assert!(matches!(
        registry.extend("DB-FAR", 36_500.0).await,
        Err(LicenseError::InvalidInput(_))
    ));

    let extended = registry.extend("DB-FAR", 365.0).await?;
    assert_close(extended, far + TimeDelta::days(365));
    Ok(())
}

#[tokio::test]
async fn extend_supports_fractional_days() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let now = Utc::now();
    db.insert_license(&new_license("DB-HALF", now)).await?;

    let extended = db.extend_license("DB-HALF", now, 0.5).await?.expect("row exists");
    assert_close(extended, now + TimeDelta::hours(12));
    Ok(())
}

#[tokio::test]
async fn set_active_and_bind_device_report_missing_rows() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    db.insert_license(&new_license("DB-UPD", Utc::now())).await?;

    assert!(db.set_active("DB-UPD", false).await?);
    assert!(!db.get_license("DB-UPD").await?.expect("row exists").is_active);
    assert!(!db.set_active("DB-GHOST", false).await?);

    assert!(db.bind_device("DB-UPD", "box-1").await?);
    assert_eq!(
        db.get_license("DB-UPD").await?.expect("row exists").device.as_deref(),
        Some("box-1")
    );
    assert!(!db.bind_device("DB-GHOST", "box-1").await?);
    assert!(db.get_license("DB-GHOST").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn concurrent_extensions_both_apply() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let registry = LicenseRegistry::new(db, "SKU");
    let created = registry
        .create(CreateLicense {
            key: Some("DB-RACE".to_string()),
            days: Some(10.0),
            ..Default::default()
        })
        .await?;

    let (a, b) = tokio::join!(
        registry.extend("DB-RACE", 5.0),
        registry.extend("DB-RACE", 5.0)
    );
    a?;
    b?;

    let license = registry.info("DB-RACE").await?;
    assert_close(license.expires_at, created.expires_at + TimeDelta::days(10));
    Ok(())
}

#[tokio::test]
async fn registry_generates_prefixed_keys() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let registry = LicenseRegistry::new(db, "ACME");

    let license = registry
        .create(CreateLicense {
            plan: Some("year".to_string()),
            ..Default::default()
        })
        .await?;

    assert!(license.key.starts_with("ACME-YEAR-"));
    assert_eq!(license.plan, "year");
    Ok(())
}

#[tokio::test]
async fn registry_blank_inputs_use_defaults() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let registry = LicenseRegistry::new(db, "SKU");

    let license = registry
        .create(CreateLicense {
            plan: Some("   ".to_string()),
            key: Some("  ".to_string()),
            device: Some(String::new()),
            ..Default::default()
        })
        .await?;

    assert_eq!(license.plan, "month");
    assert!(license.key.starts_with("SKU-MONTH-"));
    assert!(license.device.is_none());
    Ok(())
}

#[tokio::test]
async fn registry_reports_errors() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let registry = LicenseRegistry::new(db, "SKU");

    assert_eq!(
        registry.extend("", 1.0).await,
        Err(LicenseError::MissingParameter("key"))
    );
    assert!(matches!(
        registry.extend("DB-X", -1.0).await,
        Err(LicenseError::InvalidInput(_))
    ));
    assert_eq!(
        registry.extend("DB-X", 1.0).await,
        Err(LicenseError::NotFound("DB-X".to_string()))
    );
    assert_eq!(
        registry.set_active("", true).await,
        Err(LicenseError::MissingParameter("params"))
    );
    assert_eq!(
        registry.bind_device("DB-X", "").await,
        Err(LicenseError::MissingParameter("params"))
    );
    assert_eq!(
        registry.info("").await.unwrap_err(),
        LicenseError::MissingParameter("key")
    );
    Ok(())
}

#[tokio::test]
async fn registry_verify_outcomes() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let registry = LicenseRegistry::new(db, "SKU");
    registry
        .create(CreateLicense {
            key: Some("DB-VER".to_string()),
            device: Some("box-a".to_string()),
            ..Default::default()
        })
        .await?;

    assert_eq!(
        registry.verify(None, None).await?,
        Verification::Rejected(VerifyFailure::MissingKey)
    );
    assert_eq!(
        registry.verify(Some("DB-NONE"), None).await?,
        Verification::Rejected(VerifyFailure::NotFound)
    );
    assert_eq!(
        registry.verify(Some("DB-VER"), Some("box-b")).await?,
        Verification::Rejected(VerifyFailure::BoundToOtherDevice)
    );
    assert!(registry.verify(Some("DB-VER"), Some("box-a")).await?.is_valid());

    registry.set_active("DB-VER", false).await?;
    assert_eq!(
        registry.verify(Some("DB-VER"), Some("box-a")).await?,
        Verification::Rejected(VerifyFailure::Revoked)
    );
    Ok(())
}
