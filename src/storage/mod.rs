//! Object Storage Backends
//!
//! The remote service is reached only through the `ObjectStore` trait:
//! attribute fetch, read, conditional write, delete and paged prefix
//! listing. Everything above this module is backend-agnostic.
//!
//! ## Backends
//!
//! - **InMemoryObjectStore**: generations and preconditions in process memory
//! - **CloudObjectStore**: GCS / S3 through the `object_store` crate
//! - **SimulatedObjectStore**: seeded fault injection for DST

pub mod object_store;
pub mod cloud_store;
pub mod simulated_store;
pub mod config;

pub use object_store::{
    BoxError, Generation, InMemoryObjectStore, ListResult, ObjectMeta, ObjectStore, Precondition,
    StoreError, StoreResult, WriteOptions,
};
pub use cloud_store::CloudObjectStore;
pub use simulated_store::{SimulatedObjectStore, SimulatedStoreConfig, SimulatedStoreStats};
pub use config::{BackendKind, ConfigError, StoreConfig, DEFAULT_CONTENT_TYPE, DEFAULT_FILENAME_FORMAT};
