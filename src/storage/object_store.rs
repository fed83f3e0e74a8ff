//! Object Store Abstraction
//!
//! Trait-based abstraction over the remote object storage service. The
//! service owns durability and atomicity of individual writes; this trait
//! only names the primitives the client layer needs.
//!
//! Implementations:
//! - `InMemoryObjectStore`: For unit tests, DST and the `memory` backend
//! - `CloudObjectStore`: Any `object_store` backend (GCS, S3, ...)
//! - `SimulatedObjectStore`: Fault-injecting wrapper for DST

use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error carried as the original cause of a failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for object store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque version token assigned by the service on every successful write.
///
/// Services identify versions differently (GCS generations, S3 ETags and
/// version ids), so both components are kept and compared together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Generation {
    /// Entity tag reported by the service
    pub e_tag: Option<String>,
    /// Version identifier reported by the service
    pub version: Option<String>,
}

impl Generation {
    pub fn new(e_tag: Option<String>, version: Option<String>) -> Self {
        Generation { e_tag, version }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.version, &self.e_tag) {
            (Some(version), _) => write!(f, "{}", version),
            (None, Some(e_tag)) => write!(f, "{}", e_tag),
            (None, None) => write!(f, "<none>"),
        }
    }
}

/// Metadata for a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object path within the bucket
    pub path: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Generation of the current contents
    pub generation: Generation,
    /// Last update timestamp (Unix ms)
    pub updated_at_ms: u64,
    /// MIME type, when the backend reports it
    pub content_type: Option<String>,
}

/// Result of a list operation
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    /// Objects matching the prefix, in path order
    pub objects: Vec<ObjectMeta>,
    /// Continuation token for the next page (if more results exist)
    pub continuation_token: Option<String>,
}

/// Condition a write must satisfy at commit time
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Precondition {
    /// Unconditional write
    #[default]
    None,
    /// Object must not exist
    DoesNotExist,
    /// Object must exist with exactly this generation
    GenerationMatch(Generation),
}

/// Options applied to a single put
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub precondition: Precondition,
    pub content_type: Option<String>,
}

/// Error type for object store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object does not exist
    #[error("object not found: {path}")]
    NotFound {
        path: String,
        #[source]
        source: Option<BoxError>,
    },
    /// Object already exists (for `DoesNotExist` puts)
    #[error("object already exists: {path}")]
    AlreadyExists {
        path: String,
        #[source]
        source: Option<BoxError>,
    },
    /// Generation precondition did not hold at commit time
    #[error("precondition failed: {path}")]
    Precondition {
        path: String,
        #[source]
        source: Option<BoxError>,
    },
    /// Call did not complete before its deadline
    #[error("operation timed out after {after:?}")]
    TimedOut { after: Duration },
    /// Path rejected by the backend
    #[error("invalid object path: {path}")]
    InvalidPath {
        path: String,
        #[source]
        source: Option<BoxError>,
    },
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Any other backend failure
    #[error("object store error: {0}")]
    Other(#[source] BoxError),
}

impl StoreError {
    pub fn not_found(path: impl Into<String>) -> Self {
        StoreError::NotFound {
            path: path.into(),
            source: None,
        }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        StoreError::AlreadyExists {
            path: path.into(),
            source: None,
        }
    }

    pub fn precondition(path: impl Into<String>) -> Self {
        StoreError::Precondition {
            path: path.into(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Object store abstraction trait
///
/// Every write is atomic: a precondition is checked and the data committed
/// as one step by the implementation.
pub trait ObjectStore: Send + Sync + 'static {
    /// Get an object's metadata without downloading content
    fn head<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<ObjectMeta>>;

    /// Get an object's contents
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<Bytes>>;

    /// Write an object if `options.precondition` holds, returning the new generation
    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Bytes,
        options: WriteOptions,
    ) -> BoxFuture<'a, StoreResult<Generation>>;

    /// Delete an object, `NotFound` if it does not exist
    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<()>>;

    /// List one page of objects whose path starts with `prefix`
    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> BoxFuture<'a, StoreResult<ListResult>>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    fn head<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<ObjectMeta>> {
        (**self).head(path)
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<Bytes>> {
        (**self).get(path)
    }

    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Bytes,
        options: WriteOptions,
    ) -> BoxFuture<'a, StoreResult<Generation>> {
        (**self).put(path, data, options)
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        (**self).delete(path)
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> BoxFuture<'a, StoreResult<ListResult>> {
        (**self).list(prefix, continuation_token)
    }
}

// ============================================================================
// InMemoryObjectStore - For tests and DST
// ============================================================================

const DEFAULT_PAGE_SIZE: usize = 1000;

/// In-memory object store for unit tests and deterministic simulation
#[derive(Debug)]
pub struct InMemoryObjectStore {
    state: Arc<RwLock<MemoryState>>,
    page_size: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, StoredObject>,
    last_generation: u64,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    generation: u64,
    content_type: Option<String>,
    updated_at_ms: u64,
}

impl StoredObject {
    fn meta(&self, path: &str) -> ObjectMeta {
        ObjectMeta {
            path: path.to_string(),
            size_bytes: self.data.len() as u64,
            generation: memory_generation(self.generation),
            updated_at_ms: self.updated_at_ms,
            content_type: self.content_type.clone(),
        }
    }
}

fn memory_generation(n: u64) -> Generation {
    Generation::new(Some(n.to_string()), Some(n.to_string()))
}

impl InMemoryObjectStore {
    /// Create a new in-memory object store
    pub fn new() -> Self {
        InMemoryObjectStore {
            state: Arc::new(RwLock::new(MemoryState::default())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit list pages to `page_size` objects (for pagination tests)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Get the number of stored objects (for testing)
    pub fn len(&self) -> usize {
        self.state.read().objects.len()
    }

    /// Check if empty (for testing)
    pub fn is_empty(&self) -> bool {
        self.state.read().objects.is_empty()
    }

    /// Raw contents of a path, bypassing preconditions (for testing)
    pub fn raw(&self, path: &str) -> Option<Bytes> {
        self.state.read().objects.get(path).map(|obj| obj.data.clone())
    }

    /// Clear all objects (for testing)
    pub fn clear(&self) {
        self.state.write().objects.clear();
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryObjectStore {
    fn clone(&self) -> Self {
        InMemoryObjectStore {
            state: Arc::clone(&self.state),
            page_size: self.page_size,
        }
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn head<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<ObjectMeta>> {
        Box::pin(async move {
            self.state
                .read()
                .objects
                .get(path)
                .map(|obj| obj.meta(path))
                .ok_or_else(|| StoreError::not_found(path))
        })
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(async move {
            self.state
                .read()
                .objects
                .get(path)
                .map(|obj| obj.data.clone())
                .ok_or_else(|| StoreError::not_found(path))
        })
    }

    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Bytes,
        options: WriteOptions,
    ) -> BoxFuture<'a, StoreResult<Generation>> {
        Box::pin(async move {
            let mut state = self.state.write();

            match (&options.precondition, state.objects.get(path)) {
                (Precondition::None, _) => {}
                (Precondition::DoesNotExist, None) => {}
                (Precondition::DoesNotExist, Some(_)) => {
                    return Err(StoreError::already_exists(path));
                }
                (Precondition::GenerationMatch(expected), Some(existing))
                    if memory_generation(existing.generation) == *expected => {}
                (Precondition::GenerationMatch(_), _) => {
                    return Err(StoreError::precondition(path));
                }
            }

            state.last_generation += 1;
            let generation = state.last_generation;
            state.objects.insert(
                path.to_string(),
                StoredObject {
                    data,
                    generation,
                    content_type: options.content_type,
                    updated_at_ms: Self::now_ms(),
                },
            );
            Ok(memory_generation(generation))
        })
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.state
                .write()
                .objects
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(path))
        })
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> BoxFuture<'a, StoreResult<ListResult>> {
        Box::pin(async move {
            use std::ops::Bound;

            let state = self.state.read();
            let start = match continuation_token {
                Some(token) => Bound::Excluded(token.to_string()),
                None => Bound::Included(prefix.to_string()),
            };

            let mut matching = state
                .objects
                .range((start, Bound::Unbounded))
                .take_while(|(path, _)| path.starts_with(prefix));

            let objects: Vec<ObjectMeta> = matching
                .by_ref()
                .take(self.page_size)
                .map(|(path, obj)| obj.meta(path))
                .collect();

            let continuation_token = match matching.next() {
                Some(_) => objects.last().map(|meta| meta.path.clone()),
                None => None,
            };

            Ok(ListResult {
                objects,
                continuation_token,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create() -> WriteOptions {
        WriteOptions {
            precondition: Precondition::DoesNotExist,
            content_type: Some("application/json".to_string()),
        }
    }

    #[tokio::test]
    async fn test_inmemory_put_get() {
        let store = InMemoryObjectStore::new();

        store
            .put("test/key1", Bytes::from_static(b"hello world"), WriteOptions::default())
            .await
            .unwrap();
        let data = store.get("test/key1").await.unwrap();

        assert_eq!(&data[..], b"hello world");
    }

    #[tokio::test]
    async fn test_inmemory_generation_advances() {
        let store = InMemoryObjectStore::new();

        let first = store
            .put("k", Bytes::from_static(b"1"), WriteOptions::default())
            .await
            .unwrap();
        let second = store
            .put("k", Bytes::from_static(b"2"), WriteOptions::default())
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(store.head("k").await.unwrap().generation, second);
    }

    #[tokio::test]
    async fn test_inmemory_does_not_exist_precondition() {
        let store = InMemoryObjectStore::new();

        store.put("k", Bytes::from_static(b"1"), create()).await.unwrap();
        let err = store
            .put("k", Bytes::from_static(b"2"), create())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.raw("k").unwrap(), Bytes::from_static(b"1"));
    }

    #[tokio::test]
    async fn test_inmemory_generation_match() {
        let store = InMemoryObjectStore::new();

        let generation = store.put("k", Bytes::from_static(b"1"), create()).await.unwrap();
        let scoped = WriteOptions {
            precondition: Precondition::GenerationMatch(generation.clone()),
            content_type: None,
        };

        store
            .put("k", Bytes::from_static(b"2"), scoped.clone())
            .await
            .unwrap();
        let err = store
            .put("k", Bytes::from_static(b"3"), scoped)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Precondition { .. }));
        assert_eq!(store.raw("k").unwrap(), Bytes::from_static(b"2"));
    }

    #[tokio::test]
    async fn test_inmemory_generation_match_on_missing_object() {
        let store = InMemoryObjectStore::new();
        let scoped = WriteOptions {
            precondition: Precondition::GenerationMatch(memory_generation(1)),
            content_type: None,
        };

        let err = store
            .put("gone", Bytes::from_static(b"x"), scoped)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Precondition { .. }));
    }

    #[tokio::test]
    async fn test_inmemory_delete() {
        let store = InMemoryObjectStore::new();

        store.put("k", Bytes::from_static(b"data"), create()).await.unwrap();
        store.delete("k").await.unwrap();

        assert!(store.head("k").await.unwrap_err().is_not_found());
        assert!(store.delete("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_inmemory_list_pages() {
        let store = InMemoryObjectStore::new().with_page_size(2);

        for path in ["a/1", "a/2", "a/3", "b/1"] {
            store.put(path, Bytes::from_static(b"x"), create()).await.unwrap();
        }

        let first = store.list("a/", None).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.continuation_token.as_deref(), Some("a/2"));

        let second = store.list("a/", first.continuation_token.as_deref()).await.unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].path, "a/3");
        assert!(second.continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_inmemory_head_reports_content_type() {
        let store = InMemoryObjectStore::new();

        store.put("k", Bytes::from_static(b"{}"), create()).await.unwrap();
        let meta = store.head("k").await.unwrap();

        assert_eq!(meta.path, "k");
        assert_eq!(meta.size_bytes, 2);
        assert_eq!(meta.content_type.as_deref(), Some("application/json"));
    }
}
