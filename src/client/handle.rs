//! Object handles and buffered writers
//!
//! An `ObjectHandle` addresses one object and optionally carries a write
//! precondition. Writers buffer everything and commit in `finish`; a writer
//! dropped before `finish` leaves the remote object untouched.

use crate::client::BucketClient;
use crate::storage::{Generation, ObjectMeta, Precondition, StoreResult, WriteOptions};
use bytes::{Bytes, BytesMut};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tracing::debug;

/// Reference to a single object, scoped by an optional precondition
#[derive(Debug, Clone)]
pub struct ObjectHandle<'a> {
    client: &'a BucketClient,
    key: String,
    path: String,
    precondition: Precondition,
}

impl<'a> ObjectHandle<'a> {
    pub(crate) fn new(client: &'a BucketClient, key: &str) -> Self {
        ObjectHandle {
            client,
            key: key.to_string(),
            path: client.filename(key),
            precondition: Precondition::None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn precondition(&self) -> &Precondition {
        &self.precondition
    }

    /// Scope writes to "object does not exist"
    pub fn if_absent(mut self) -> Self {
        self.precondition = Precondition::DoesNotExist;
        self
    }

    /// Scope writes to "object is still at `generation`"
    pub fn if_generation_match(mut self, generation: Generation) -> Self {
        self.precondition = Precondition::GenerationMatch(generation);
        self
    }

    /// Fetch the object's attributes
    pub async fn attrs(&self) -> StoreResult<ObjectMeta> {
        self.client.call(self.client.store().head(&self.path)).await
    }

    /// Read the full contents
    pub async fn read(&self) -> StoreResult<Bytes> {
        self.client.call(self.client.store().get(&self.path)).await
    }

    /// Delete the object
    pub async fn delete(&self) -> StoreResult<()> {
        self.client.call(self.client.store().delete(&self.path)).await
    }

    /// Start a write scoped by this handle's precondition
    pub fn writer(&self) -> ObjectWriter<'a> {
        ObjectWriter {
            client: self.client,
            path: self.path.clone(),
            options: WriteOptions {
                precondition: self.precondition.clone(),
                content_type: Some(self.client.options().content_type.clone()),
            },
            buf: BytesMut::new(),
        }
    }
}

/// Buffered object write, committed by `finish`
#[derive(Debug)]
pub struct ObjectWriter<'a> {
    client: &'a BucketClient,
    path: String,
    options: WriteOptions,
    buf: BytesMut,
}

impl ObjectWriter<'_> {
    /// Override the content type stamped on this write
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.options.content_type = Some(content_type.into());
    }

    /// Bytes buffered so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Commit the buffered bytes. Only a successful return means the
    /// object was written.
    pub async fn finish(self) -> StoreResult<Generation> {
        let ObjectWriter {
            client,
            path,
            options,
            buf,
        } = self;

        debug!(
            path = %path,
            size_bytes = buf.len(),
            precondition = ?options.precondition,
            "committing object write"
        );
        client
            .call(client.store().put(&path, buf.freeze(), options))
            .await
    }
}

impl AsyncWrite for ObjectWriter<'_> {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().buf.extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{BucketClient, ClientOptions};
    use crate::storage::{InMemoryObjectStore, StoreError};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;

    async fn client(store: &InMemoryObjectStore) -> BucketClient {
        BucketClient::connect("test", Arc::new(store.clone()), ClientOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_dropped_writer_commits_nothing() {
        let store = InMemoryObjectStore::new();
        let client = client(&store).await;

        let mut writer = client.object("k").writer();
        writer.write_all(b"partial").await.unwrap();
        assert_eq!(writer.len(), 7);
        drop(writer);

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_writer_stamps_content_type() {
        let store = InMemoryObjectStore::new();
        let client = client(&store).await;

        let mut writer = client.object("k").if_absent().writer();
        writer.write_all(b"{}").await.unwrap();
        writer.finish().await.unwrap();

        let meta = client.object("k").attrs().await.unwrap();
        assert_eq!(meta.path, "k.json");
        assert_eq!(meta.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_generation_scoped_writer() {
        let store = InMemoryObjectStore::new();
        let client = client(&store).await;

        let mut first = client.object("k").if_absent().writer();
        first.write_all(b"1").await.unwrap();
        let generation = first.finish().await.unwrap();

        let handle = client.object("k").if_generation_match(generation);
        let mut winner = handle.writer();
        let mut loser = handle.writer();
        winner.write_all(b"2").await.unwrap();
        loser.write_all(b"3").await.unwrap();

        winner.finish().await.unwrap();
        let err = loser.finish().await.unwrap_err();

        assert!(matches!(err, StoreError::Precondition { .. }));
        assert_eq!(&client.object("k").read().await.unwrap()[..], b"2");
    }
}
