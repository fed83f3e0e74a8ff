//! Typed CRUD records over a cloud object store bucket.
//!
//! ```text
//! CrudStore<T>  ── encode/decode, compare-and-swap put, error masking
//!     │
//! BucketClient  ── key -> path mapping, conditional writes, paged listing
//!     │
//! ObjectStore   ── GCS / S3 (object_store crate), in-memory, simulated
//! ```

pub mod storage;
pub mod client;
pub mod crud;
pub mod error;
pub mod observability;
pub mod cli;
pub mod dst;

pub use client::{BucketClient, ClientOptions, FilenameFormat};
pub use crud::{Codec, CrudStore, JsonCodec, PrettyJsonCodec};
pub use error::{Error, ErrorKind, Operation, Result};
pub use storage::{ObjectMeta, ObjectStore, StoreConfig, StoreError};
