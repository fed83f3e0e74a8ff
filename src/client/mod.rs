//! Bucket Client
//!
//! Owns the shared session to one bucket and exposes file-level
//! primitives keyed by the configured key to path mapping.
//!
//! ## Operations
//!
//! ```text
//! write_file(key, reader)  create-if-absent, committed on finish
//! get_file(key)            full contents
//! object(key)              handle for precondition-scoped calls
//! list(prefix)             lazy stream, one service page at a time
//! ```
//!
//! No caching: every call observes the service's state at call time.

pub mod format;
pub mod handle;

pub use format::{FilenameFormat, FormatError};
pub use handle::{ObjectHandle, ObjectWriter};

use crate::error::{Error, ErrorKind, Operation, Result};
use crate::storage::{
    Generation, ObjectMeta, ObjectStore, StoreConfig, StoreError, StoreResult,
    DEFAULT_CONTENT_TYPE,
};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info};

/// Path probed at connect time; it is never written
const PROBE_PATH: &str = "objstore-crud-probe-nonexistent";

/// Client settings fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Key to object path template (default: `%s.json`)
    pub filename_format: FilenameFormat,
    /// MIME type stamped on writes (default: `application/json`)
    pub content_type: String,
    /// Deadline applied to every remote call (default: none)
    pub op_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            filename_format: FilenameFormat::default(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            op_timeout: None,
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &StoreConfig) -> std::result::Result<Self, FormatError> {
        Ok(ClientOptions {
            filename_format: FilenameFormat::parse(&config.filename_format)?,
            content_type: config.content_type.clone(),
            op_timeout: config.op_timeout(),
        })
    }

    pub fn with_filename_format(mut self, format: FilenameFormat) -> Self {
        self.filename_format = format;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }
}

/// Cursor over service pages during a listing
enum PageCursor {
    Start,
    Next(String),
    Done,
}

/// Client for one bucket, cheap to clone
#[derive(Clone)]
pub struct BucketClient {
    bucket: Arc<str>,
    store: Arc<dyn ObjectStore>,
    options: Arc<ClientOptions>,
}

impl std::fmt::Debug for BucketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketClient")
            .field("bucket", &self.bucket)
            .field("options", &self.options)
            .finish()
    }
}

impl BucketClient {
    /// Wrap `store` after checking the bucket is reachable.
    ///
    /// The probe fetches attributes of a path that never exists; anything
    /// but not-found means the bucket is unusable.
    pub async fn connect(
        bucket: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        options: ClientOptions,
    ) -> Result<Self> {
        let bucket: String = bucket.into();
        let client = BucketClient {
            bucket: Arc::from(bucket.as_str()),
            store,
            options: Arc::new(options),
        };

        match client.call(client.store.head(PROBE_PATH)).await {
            Ok(_) => {}
            Err(StoreError::NotFound { .. }) => {}
            Err(e) => {
                return Err(Error::new(Operation::Connect, bucket, ErrorKind::Unavailable)
                    .with_source(e));
            }
        }

        info!(
            bucket = %client.bucket,
            filename_format = %client.options.filename_format,
            content_type = %client.options.content_type,
            "connected to bucket"
        );
        Ok(client)
    }

    /// Build the configured backend and connect
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        let options = ClientOptions::from_config(config).map_err(|e| {
            Error::new(Operation::Connect, &config.bucket, ErrorKind::InvalidConfig).with_source(e)
        })?;
        let store = config
            .open_backend()
            .map_err(|e| Error::config(Operation::Connect, &config.bucket, e))?;
        Self::connect(config.bucket.clone(), store, options).await
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub(crate) fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Object path for `key`
    pub fn filename(&self, key: &str) -> String {
        self.options.filename_format.apply(key)
    }

    /// Key stored at `path`, if the path follows the filename format
    pub fn key_of<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.options.filename_format.key_of(path)
    }

    /// Handle for precondition-scoped operations on `key`
    pub fn object(&self, key: &str) -> ObjectHandle<'_> {
        ObjectHandle::new(self, key)
    }

    /// Write `reader` to `key`, failing if an object already exists there
    pub async fn write_file<R>(&self, key: &str, reader: R) -> Result<Generation>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.write_new(Operation::WriteFile, key, reader).await
    }

    pub(crate) async fn write_new<R>(
        &self,
        op: Operation,
        key: &str,
        mut reader: R,
    ) -> Result<Generation>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut writer = self.object(key).if_absent().writer();
        tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| Error::from_store(op, key, StoreError::Io(e)))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::from_store(op, key, StoreError::Io(e)))?;

        let generation = writer
            .finish()
            .await
            .map_err(|e| Error::from_store(op, key, e))?;
        debug!(%op, key, %generation, "object created");
        Ok(generation)
    }

    /// Read the full contents stored at `key`
    pub async fn get_file(&self, key: &str) -> Result<Bytes> {
        self.read_file(Operation::GetFile, key).await
    }

    pub(crate) async fn read_file(&self, op: Operation, key: &str) -> Result<Bytes> {
        let data = self
            .object(key)
            .read()
            .await
            .map_err(|e| Error::from_store(op, key, e))?;
        debug!(%op, key, size_bytes = data.len(), "object read");
        Ok(data)
    }

    /// Lazily list objects whose key starts with `prefix`.
    ///
    /// Pages are fetched only as the stream is polled. The stream ends
    /// after the last page; a failed page ends it with that error.
    pub fn list(&self, prefix: &str) -> BoxStream<'_, Result<ObjectMeta>> {
        let path_prefix = self.options.filename_format.path_prefix(prefix);
        let key_prefix = prefix.to_string();

        let pages = stream::try_unfold(PageCursor::Start, move |cursor| {
            let path_prefix = path_prefix.clone();
            async move {
                let token = match cursor {
                    PageCursor::Done => return Ok::<_, StoreError>(None),
                    PageCursor::Start => None,
                    PageCursor::Next(token) => Some(token),
                };

                let page = self
                    .call(self.store.list(&path_prefix, token.as_deref()))
                    .await?;
                debug!(
                    prefix = %path_prefix,
                    objects = page.objects.len(),
                    more = page.continuation_token.is_some(),
                    "list page"
                );

                let next = match page.continuation_token {
                    Some(token) => PageCursor::Next(token),
                    None => PageCursor::Done,
                };
                Ok::<_, StoreError>(Some((page.objects, next)))
            }
        });

        pages
            .map_ok(|objects| stream::iter(objects.into_iter().map(Ok)))
            .try_flatten()
            .map_err(move |e| Error::from_store(Operation::List, key_prefix.as_str(), e))
            .boxed()
    }

    /// Run a remote call under the configured deadline
    pub(crate) async fn call<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match self.options.op_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or(Err(StoreError::TimedOut { after: limit })),
            None => fut.await,
        }
    }
}
