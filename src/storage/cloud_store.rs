//! Cloud Object Store Implementation
//!
//! Adapts any backend of the `object_store` crate (Arrow ecosystem) to the
//! `ObjectStore` trait.
//!
//! Supports:
//! - Google Cloud Storage (`gcp` feature)
//! - AWS S3 and S3-compatible services (`aws` feature)
//! - `object_store::memory::InMemory` (always available, used in tests)

use crate::storage::object_store::{
    Generation, ListResult, ObjectMeta, ObjectStore, Precondition, StoreError, StoreResult,
    WriteOptions,
};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore as ObjectStoreTrait;
use object_store::{Attribute, Attributes, PutMode, PutOptions, PutPayload, UpdateVersion};
use std::sync::Arc;

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Object store backed by the `object_store` crate
///
/// The wrapped client carries its own retry, authentication and
/// connection pooling; this type only translates calls and errors.
#[derive(Clone)]
pub struct CloudObjectStore {
    store: Arc<dyn ObjectStoreTrait>,
    page_size: usize,
}

impl CloudObjectStore {
    /// Wrap an existing `object_store` client
    pub fn new(store: Arc<dyn ObjectStoreTrait>) -> Self {
        CloudObjectStore {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit list pages to `page_size` objects
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Google Cloud Storage client configured from `GOOGLE_*` environment variables
    #[cfg(feature = "gcp")]
    pub fn gcs(bucket: &str) -> StoreResult<Self> {
        use object_store::gcp::GoogleCloudStorageBuilder;

        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| StoreError::Other(Box::new(e)))?;
        Ok(CloudObjectStore::new(Arc::new(store)))
    }

    /// S3 client configured from `AWS_*` environment variables
    ///
    /// `endpoint` selects an S3-compatible service such as MinIO.
    #[cfg(feature = "aws")]
    pub fn s3(bucket: &str, region: Option<&str>, endpoint: Option<&str>) -> StoreResult<Self> {
        let store = Self::s3_builder(bucket, region, endpoint)
            .build()
            .map_err(|e| StoreError::Other(Box::new(e)))?;
        Ok(CloudObjectStore::new(Arc::new(store)))
    }

    /// S3 builder with conditional writes enabled.
    ///
    /// Create and update-version puts need a conditional put mode; ETag
    /// matching is used unless `AWS_CONDITIONAL_PUT` selects another.
    #[cfg(feature = "aws")]
    fn s3_builder(
        bucket: &str,
        region: Option<&str>,
        endpoint: Option<&str>,
    ) -> object_store::aws::AmazonS3Builder {
        use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey, S3ConditionalPut};

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if builder
            .get_config_value(&AmazonS3ConfigKey::ConditionalPut)
            .is_none()
        {
            builder = builder.with_conditional_put(S3ConditionalPut::ETagMatch);
        }
        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        builder
    }

    /// Location for `path`. Strings the object_store path model would
    /// rewrite (empty segments, leading or trailing `/`, `.` or `..`
    /// segments, control characters) are rejected, so distinct paths never
    /// share an object.
    fn object_path(path: &str) -> StoreResult<ObjectPath> {
        match ObjectPath::parse(path) {
            Ok(location) if location.as_ref() == path => Ok(location),
            Ok(_) => Err(StoreError::InvalidPath {
                path: path.to_string(),
                source: None,
            }),
            Err(e) => Err(StoreError::InvalidPath {
                path: path.to_string(),
                source: Some(Box::new(e)),
            }),
        }
    }

    /// Root the listing at the prefix's last `/`, the rest is filtered
    fn list_root(prefix: &str) -> StoreResult<Option<ObjectPath>> {
        match prefix.rfind('/').map(|idx| &prefix[..idx]) {
            Some(dir) if !dir.is_empty() => Self::object_path(dir).map(Some),
            _ => Ok(None),
        }
    }

    fn error_path(err: &object_store::Error) -> String {
        match err {
            object_store::Error::NotFound { path, .. }
            | object_store::Error::AlreadyExists { path, .. }
            | object_store::Error::Precondition { path, .. } => path.clone(),
            _ => String::new(),
        }
    }

    /// Convert object_store errors, keeping the original as the source
    fn map_error(err: object_store::Error) -> StoreError {
        match err {
            e @ object_store::Error::NotFound { .. } => StoreError::NotFound {
                path: Self::error_path(&e),
                source: Some(Box::new(e)),
            },
            e @ object_store::Error::AlreadyExists { .. } => StoreError::AlreadyExists {
                path: Self::error_path(&e),
                source: Some(Box::new(e)),
            },
            e @ object_store::Error::Precondition { .. } => StoreError::Precondition {
                path: Self::error_path(&e),
                source: Some(Box::new(e)),
            },
            e => StoreError::Other(Box::new(e)),
        }
    }

    fn to_meta(meta: object_store::ObjectMeta) -> ObjectMeta {
        ObjectMeta {
            path: meta.location.to_string(),
            size_bytes: meta.size as u64,
            generation: Generation::new(meta.e_tag, meta.version),
            updated_at_ms: meta.last_modified.timestamp_millis().try_into().unwrap_or(0),
            content_type: None,
        }
    }

    fn put_options(options: WriteOptions) -> PutOptions {
        let mode = match options.precondition {
            Precondition::None => PutMode::Overwrite,
            Precondition::DoesNotExist => PutMode::Create,
            Precondition::GenerationMatch(generation) => PutMode::Update(UpdateVersion {
                e_tag: generation.e_tag,
                version: generation.version,
            }),
        };

        let mut attributes = Attributes::new();
        if let Some(content_type) = options.content_type {
            attributes.insert(Attribute::ContentType, content_type.into());
        }

        PutOptions {
            mode,
            attributes,
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for CloudObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudObjectStore")
            .field("store", &self.store.to_string())
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl ObjectStore for CloudObjectStore {
    fn head<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<ObjectMeta>> {
        Box::pin(async move {
            let meta = self
                .store
                .head(&Self::object_path(path)?)
                .await
                .map_err(Self::map_error)?;
            Ok(Self::to_meta(meta))
        })
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(async move {
            let result = self
                .store
                .get(&Self::object_path(path)?)
                .await
                .map_err(Self::map_error)?;
            result.bytes().await.map_err(Self::map_error)
        })
    }

    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Bytes,
        options: WriteOptions,
    ) -> BoxFuture<'a, StoreResult<Generation>> {
        Box::pin(async move {
            let location = Self::object_path(path)?;
            let result = self
                .store
                .put_opts(
                    &location,
                    PutPayload::from(data),
                    Self::put_options(options),
                )
                .await
                .map_err(Self::map_error)?;
            Ok(Generation::new(result.e_tag, result.version))
        })
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let location = Self::object_path(path)?;
            // S3 and in-memory deletes are idempotent, so absence is checked first
            self.store.head(&location).await.map_err(Self::map_error)?;
            self.store.delete(&location).await.map_err(Self::map_error)
        })
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> BoxFuture<'a, StoreResult<ListResult>> {
        Box::pin(async move {
            // No stored object can sit under a directory that is not a valid path
            let root = match Self::list_root(prefix) {
                Ok(root) => root,
                Err(_) => return Ok(ListResult::default()),
            };
            let listing = match continuation_token {
                Some(token) => {
                    let offset = ObjectPath::parse(token).map_err(|e| StoreError::InvalidPath {
                        path: token.to_string(),
                        source: Some(Box::new(e)),
                    })?;
                    self.store.list_with_offset(root.as_ref(), &offset)
                }
                None => self.store.list(root.as_ref()),
            };

            let mut objects: Vec<ObjectMeta> = listing
                .try_filter(|meta| futures::future::ready(meta.location.as_ref().starts_with(prefix)))
                .take(self.page_size + 1)
                .map_ok(Self::to_meta)
                .try_collect()
                .await
                .map_err(Self::map_error)?;

            let continuation_token = if objects.len() > self.page_size {
                objects.truncate(self.page_size);
                objects.last().map(|meta| meta.path.clone())
            } else {
                None
            };

            Ok(ListResult {
                objects,
                continuation_token,
            })
        })
    }
}
