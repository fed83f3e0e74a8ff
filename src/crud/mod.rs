//! Typed CRUD Store
//!
//! A type-safe record store over a `BucketClient`. Values are encoded
//! with a `Codec` (compact JSON by default) and stored one object per key.
//!
//! ## Compare-and-swap updates
//!
//! ```text
//! put(key, value):
//!   attrs(key) ── exists ──> write if generation == observed
//!              └─ missing ─> write if absent
//!   finish ── precondition violated ──> Conflict
//! ```
//!
//! Exactly one of several puts that observed the same generation commits;
//! the others fail with `ErrorKind::Conflict` and are never retried here.

pub mod codec;

pub use codec::{Codec, JsonCodec, PrettyJsonCodec};

use crate::client::BucketClient;
use crate::error::{Error, ErrorKind, Operation, Result};
use crate::storage::{ObjectMeta, Precondition, StoreError};
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::marker::PhantomData;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Record store for values of type `T`
pub struct CrudStore<T, C = JsonCodec> {
    client: BucketClient,
    codec: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C: Clone> Clone for CrudStore<T, C> {
    fn clone(&self) -> Self {
        CrudStore {
            client: self.client.clone(),
            codec: self.codec.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, C> std::fmt::Debug for CrudStore<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudStore")
            .field("client", &self.client)
            .field("value_type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> CrudStore<T, JsonCodec>
where
    JsonCodec: Codec<T>,
{
    /// JSON store over `client`
    pub fn new(client: BucketClient) -> Self {
        Self::with_codec(client, JsonCodec)
    }
}

impl<T, C: Codec<T>> CrudStore<T, C> {
    pub fn with_codec(client: BucketClient, codec: C) -> Self {
        CrudStore {
            client,
            codec,
            _marker: PhantomData,
        }
    }

    pub fn client(&self) -> &BucketClient {
        &self.client
    }

    fn encode(&self, op: Operation, key: &str, value: &T) -> Result<Bytes> {
        self.codec
            .encode(value)
            .map_err(|e| Error::new(op, key, ErrorKind::Encode).with_source(e))
    }

    /// Store `value` at `key`, failing with `AlreadyExists` if the key is taken
    pub async fn create(&self, key: &str, value: &T) -> Result<()> {
        let data = self.encode(Operation::Create, key, value)?;
        self.client
            .write_new(Operation::Create, key, &data[..])
            .await?;
        Ok(())
    }

    /// Load the value at `key`
    pub async fn get(&self, key: &str) -> Result<T> {
        let data = self.client.read_file(Operation::Get, key).await?;
        self.codec
            .decode(&data)
            .map_err(|e| Error::new(Operation::Get, key, ErrorKind::Decode).with_source(e))
    }

    /// Write `value` at `key` unless another writer got there first.
    ///
    /// A missing key is created; an existing one is replaced only if its
    /// generation is unchanged since the attribute fetch.
    pub async fn put(&self, key: &str, value: &T) -> Result<()> {
        let data = self.encode(Operation::Put, key, value)?;

        let handle = self.client.object(key);
        let handle = match handle.attrs().await {
            Ok(meta) => handle.if_generation_match(meta.generation),
            Err(StoreError::NotFound { .. }) => handle.if_absent(),
            Err(e) => return Err(Error::from_store(Operation::Put, key, e)),
        };
        let scoped_to_generation = matches!(handle.precondition(), Precondition::GenerationMatch(_));

        let mut writer = handle.writer();
        writer
            .write_all(&data)
            .await
            .map_err(|e| Error::from_store(Operation::Put, key, StoreError::Io(e)))?;

        match writer.finish().await {
            Ok(generation) => {
                debug!(key, %generation, "put committed");
                Ok(())
            }
            Err(
                e @ (StoreError::Precondition { .. } | StoreError::AlreadyExists { .. }),
            ) => {
                warn!(key, "put lost a concurrent update");
                Err(Error::conflict(Operation::Put, key, e))
            }
            Err(e @ StoreError::NotFound { .. }) if scoped_to_generation => {
                warn!(key, "object deleted during put");
                Err(Error::conflict(Operation::Put, key, e))
            }
            Err(e) => Err(Error::from_store(Operation::Put, key, e)),
        }
    }

    /// Remove the value at `key`
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .object(key)
            .delete()
            .await
            .map_err(|e| Error::from_store(Operation::Delete, key, e))?;
        debug!(key, "deleted");
        Ok(())
    }

    /// Lazily list stored objects whose key starts with `prefix`
    pub fn list(&self, prefix: &str) -> BoxStream<'_, Result<ObjectMeta>> {
        self.client.list(prefix)
    }

    /// Lazily list the keys starting with `prefix`
    pub fn keys(&self, prefix: &str) -> BoxStream<'_, Result<String>> {
        self.client
            .list(prefix)
            .try_filter_map(move |meta| {
                let key = self.client.key_of(&meta.path).map(str::to_string);
                futures::future::ready(Ok(key))
            })
            .boxed()
    }
}
