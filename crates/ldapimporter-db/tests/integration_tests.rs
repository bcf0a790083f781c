//! Integration tests for the PostgreSQL record store.
//!
//! Prerequisites:
//! - A running PostgreSQL server
//! - `DATABASE_URL` pointing at a database the tests may create tables in
//!
//! Run with: `cargo test -p ldapimporter-db --features integration`

#![cfg(feature = "integration")]

use std::sync::Arc;

use ldapimporter_core::prelude::*;
use ldapimporter_core::registry::{ASSOCIATIONS_TABLE, ESTABLISHMENTS_TABLE, USERS_TABLE};
use ldapimporter_db::PgRecordStore;

/// Store with a unique table prefix so tests do not see each other's rows.
async fn test_store() -> PgRecordStore {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let prefix = format!("t{}_", uuid::Uuid::new_v4().simple());
    let store = PgRecordStore::connect(&database_url, 2)
        .await
        .expect("Failed to create test pool")
        .with_table_prefix(prefix);

    store
        .ensure_table(&TableSpec::new(USERS_TABLE, &["uid"]))
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_schema_setup_is_rerunnable() {
    let store = Arc::new(test_store().await);
    let registry = EstablishmentRegistry::new(store.clone());

    registry.ensure_schema().await.unwrap();
    registry.ensure_schema().await.unwrap();

    let err = store.add_column(USERS_TABLE, "uai_courant").await.unwrap_err();
    assert!(err.is_schema_conflict());
}

#[tokio::test]
async fn test_insert_if_absent() {
    let store = test_store().await;
    store
        .ensure_table(&TableSpec::new(ESTABLISHMENTS_TABLE, &["name", "uai"]))
        .await
        .unwrap();

    let mut row = Row::new();
    row.insert("uai".to_string(), "0450822X".to_string());
    row.insert("name".to_string(), "Lycee Voltaire".to_string());
    let key = Predicate::eq("uai", "0450822X");

    assert!(store.insert_if_absent(ESTABLISHMENTS_TABLE, &key, &row).await.unwrap());
    assert!(!store.insert_if_absent(ESTABLISHMENTS_TABLE, &key, &row).await.unwrap());

    let rows = store.select(ESTABLISHMENTS_TABLE, &Predicate::all()).await.unwrap();
    assert_eq!(rows, vec![row]);
}

#[tokio::test]
async fn test_registry_round_trip() {
    let registry = EstablishmentRegistry::new(Arc::new(test_store().await));
    registry.ensure_schema().await.unwrap();

    registry
        .ensure_establishment("0450822X", Some("Lycee Voltaire"))
        .await
        .unwrap();
    registry
        .ensure_association("0450822X", Some("Profs Lycee Voltaire"))
        .await
        .unwrap();
    registry.ensure_association("0450822X", Some("jdoe")).await.unwrap();
    registry.ensure_association("0450822X", Some("jdoe")).await.unwrap();

    assert_eq!(
        registry.lookup_name("0450822X").await.unwrap().as_deref(),
        Some("Lycee Voltaire")
    );
    let subjects: Vec<_> = registry
        .associations("0450822X")
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.subject_id)
        .collect();
    assert_eq!(subjects, vec!["Profs Lycee Voltaire", "jdoe"]);
}

#[tokio::test]
async fn test_missing_table() {
    let store = test_store().await;

    let err = store
        .exists(ASSOCIATIONS_TABLE, &Predicate::all())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TableNotFound { .. }));
}
