//! CRUD Store Property Tests
//!
//! Behavioural properties of `CrudStore` over the in-memory backend:
//! round trips, create-if-absent, last-writer-wins puts, not-found
//! masking, prefix listing and decode failures.

use futures::TryStreamExt;
use objstore_crud::storage::{InMemoryObjectStore, StoreError};
use objstore_crud::{
    BucketClient, ClientOptions, CrudStore, ErrorKind, FilenameFormat, Operation, StoreConfig,
};
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    age: u32,
}

fn profile(name: &str, age: u32) -> Profile {
    Profile {
        name: name.to_string(),
        age,
    }
}

async fn setup() -> (InMemoryObjectStore, CrudStore<Profile>) {
    let backend = InMemoryObjectStore::new();
    let client = BucketClient::connect("profiles", Arc::new(backend.clone()), ClientOptions::default())
        .await
        .unwrap();
    (backend, CrudStore::new(client))
}

// =============================================================================
// Create / Get
// =============================================================================

#[tokio::test]
async fn test_create_then_get_round_trips() {
    let (_backend, store) = setup().await;

    store.create("ada", &profile("Ada", 36)).await.unwrap();

    assert_eq!(store.get("ada").await.unwrap(), profile("Ada", 36));
}

#[tokio::test]
async fn test_create_existing_key_fails_and_keeps_value() {
    let (_backend, store) = setup().await;

    store.create("ada", &profile("Ada", 36)).await.unwrap();
    let err = store.create("ada", &profile("Imposter", 1)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(err.op(), Operation::Create);
    assert_eq!(err.key(), "ada");
    assert_eq!(store.get("ada").await.unwrap(), profile("Ada", 36));
}

#[tokio::test]
async fn test_get_missing_key_is_not_found_with_backend_cause() {
    let (_backend, store) = setup().await;

    let err = store.get("nobody").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "get nobody: object not found");
    assert!(matches!(err.store_error(), Some(StoreError::NotFound { .. })));

    let cause = err.source().unwrap();
    assert!(cause
        .downcast_ref::<StoreError>()
        .is_some_and(StoreError::is_not_found));
}

#[tokio::test]
async fn test_get_undecodable_bytes_is_decode_error() {
    let (_backend, store) = setup().await;

    store
        .client()
        .write_file("broken", &br#"{"name":"Ada"}"#[..])
        .await
        .unwrap();
    let err = store.get("broken").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(!err.is_not_found());
}

// =============================================================================
// Put
// =============================================================================

#[tokio::test]
async fn test_sequential_puts_last_writer_wins() {
    let (_backend, store) = setup().await;

    store.put("ada", &profile("Ada", 36)).await.unwrap();
    store.put("ada", &profile("Ada", 37)).await.unwrap();
    store.put("ada", &profile("Ada", 38)).await.unwrap();

    assert_eq!(store.get("ada").await.unwrap().age, 38);
}

#[tokio::test]
async fn test_put_after_create_replaces_value() {
    let (backend, store) = setup().await;

    store.create("ada", &profile("Ada", 36)).await.unwrap();
    store.put("ada", &profile("Ada Lovelace", 36)).await.unwrap();

    assert_eq!(store.get("ada").await.unwrap().name, "Ada Lovelace");
    assert_eq!(backend.len(), 1);
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_then_get_is_not_found() {
    let (backend, store) = setup().await;

    store.create("ada", &profile("Ada", 36)).await.unwrap();
    store.delete("ada").await.unwrap();

    assert!(store.get("ada").await.unwrap_err().is_not_found());
    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_delete_missing_key_is_not_found() {
    let (_backend, store) = setup().await;

    let err = store.delete("nobody").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.op(), Operation::Delete);
}

#[tokio::test]
async fn test_create_after_delete_succeeds() {
    let (_backend, store) = setup().await;

    store.create("ada", &profile("Ada", 36)).await.unwrap();
    store.delete("ada").await.unwrap();
    store.create("ada", &profile("Ada", 37)).await.unwrap();

    assert_eq!(store.get("ada").await.unwrap().age, 37);
}

// =============================================================================
// List
// =============================================================================

#[tokio::test]
async fn test_list_prefix_yields_each_match_once() {
    let (_backend, store) = setup().await;

    for key in ["a/1", "a/2", "b/1"] {
        store.create(key, &profile(key, 0)).await.unwrap();
    }

    let mut keys: Vec<String> = store.keys("a/").try_collect().await.unwrap();
    keys.sort();

    assert_eq!(keys, vec!["a/1".to_string(), "a/2".to_string()]);
}

#[tokio::test]
async fn test_list_returns_object_metadata() {
    let (_backend, store) = setup().await;

    store.create("a/1", &profile("x", 1)).await.unwrap();

    let objects: Vec<_> = store.list("a/").try_collect().await.unwrap();

    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].path, "a/1.json");
    assert_eq!(objects[0].content_type.as_deref(), Some("application/json"));
    assert!(objects[0].size_bytes > 0);
}

#[tokio::test]
async fn test_list_spans_many_pages() {
    let backend = InMemoryObjectStore::new().with_page_size(2);
    let client = BucketClient::connect("profiles", Arc::new(backend), ClientOptions::default())
        .await
        .unwrap();
    let store: CrudStore<Profile> = CrudStore::new(client);

    for i in 0..7 {
        store.create(&format!("user/{}", i), &profile("u", i)).await.unwrap();
    }
    store.create("admin/0", &profile("root", 0)).await.unwrap();

    let keys: Vec<String> = store.keys("user/").try_collect().await.unwrap();

    assert_eq!(keys.len(), 7);
    assert!(keys.iter().all(|k| k.starts_with("user/")));
}

#[tokio::test]
async fn test_list_empty_prefix_lists_everything() {
    let (_backend, store) = setup().await;

    for key in ["x", "y", "z"] {
        store.create(key, &profile(key, 0)).await.unwrap();
    }

    let keys: Vec<String> = store.keys("").try_collect().await.unwrap();
    assert_eq!(keys.len(), 3);
}

// =============================================================================
// Filename format and configuration
// =============================================================================

#[tokio::test]
async fn test_custom_filename_format_lays_out_objects() {
    let backend = InMemoryObjectStore::new();
    let options = ClientOptions::default()
        .with_filename_format(FilenameFormat::parse("profiles/%s.v1.json").unwrap());
    let client = BucketClient::connect("b", Arc::new(backend.clone()), options)
        .await
        .unwrap();
    let store: CrudStore<Profile> = CrudStore::new(client);

    store.create("ada", &profile("Ada", 36)).await.unwrap();

    assert!(backend.raw("profiles/ada.v1.json").is_some());
    let keys: Vec<String> = store.keys("").try_collect().await.unwrap();
    assert_eq!(keys, vec!["ada".to_string()]);
}

#[tokio::test]
async fn test_from_config_memory_backend() {
    let config = StoreConfig::memory("scratch");
    let client = BucketClient::from_config(&config).await.unwrap();
    let store: CrudStore<Profile> = CrudStore::new(client);

    store.create("ada", &profile("Ada", 36)).await.unwrap();
    assert_eq!(store.client().bucket(), "scratch");
    assert_eq!(store.get("ada").await.unwrap().age, 36);
}

#[tokio::test]
async fn test_from_config_rejects_bad_filename_format() {
    let config = StoreConfig {
        filename_format: "no-placeholder.json".to_string(),
        ..StoreConfig::memory("scratch")
    };

    let err = BucketClient::from_config(&config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    assert_eq!(err.op(), Operation::Connect);
}
