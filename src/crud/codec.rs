//! Value codecs
//!
//! A codec turns a value into the object body and back. The store never
//! looks inside the bytes.

use crate::storage::BoxError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub trait Codec<T>: Send + Sync + 'static {
    fn encode(&self, value: &T) -> Result<Bytes, BoxError>;
    fn decode(&self, data: &[u8]) -> Result<T, BoxError>;
}

/// Compact JSON (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<Bytes, BoxError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn decode(&self, data: &[u8]) -> Result<T, BoxError> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Indented JSON, for buckets people read by hand
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyJsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for PrettyJsonCodec {
    fn encode(&self, value: &T) -> Result<Bytes, BoxError> {
        Ok(Bytes::from(serde_json::to_vec_pretty(value)?))
    }

    fn decode(&self, data: &[u8]) -> Result<T, BoxError> {
        Ok(serde_json::from_slice(data)?)
    }
}
