//! Deterministic Simulation Testing for the CRUD store
//!
//! Shadow-state testing harness that enables:
//! - Deterministic random workload generation
//! - Fault injection at the object store layer
//! - Outcome checking against a shadow model after each operation
//! - Seed-based reproducibility for debugging
//!
//! ## Design (FoundationDB-style DST with shadow state)
//!
//! ```text
//! for seed in 0..1000 {
//!     let harness = CrudDSTHarness::new(config(seed))?;
//!     harness.run(200);
//!     harness.check_invariants();  // violations carry the seed
//! }
//! ```
//!
//! Every failed operation must leave the store untouched, so the shadow
//! model only changes on success.

use crate::client::{BucketClient, ClientOptions};
use crate::crud::CrudStore;
use crate::error::ErrorKind;
use crate::storage::{
    InMemoryObjectStore, ObjectStore, SimulatedObjectStore, SimulatedStoreConfig, SimulatedStoreStats,
};
use futures::TryStreamExt;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::Arc;

const CONNECT_ATTEMPTS: usize = 64;

/// Configuration for CRUD DST
#[derive(Debug, Clone)]
pub struct CrudDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Object store fault configuration
    pub store_config: SimulatedStoreConfig,
    /// Number of distinct keys the workload touches
    pub key_space: usize,
    /// Relative weights: create, get, put, delete, list
    pub weights: [u32; 5],
}

impl Default for CrudDSTConfig {
    fn default() -> Self {
        CrudDSTConfig {
            seed: 0,
            store_config: SimulatedStoreConfig::default(),
            key_space: 16,
            weights: [25, 30, 25, 15, 5],
        }
    }
}

impl CrudDSTConfig {
    pub fn new(seed: u64) -> Self {
        CrudDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// Calm mode - no fault injection
    pub fn calm(seed: u64) -> Self {
        CrudDSTConfig {
            seed,
            store_config: SimulatedStoreConfig::no_faults(),
            ..Default::default()
        }
    }

    /// Moderate fault injection
    pub fn moderate(seed: u64) -> Self {
        CrudDSTConfig {
            seed,
            store_config: SimulatedStoreConfig::default(),
            ..Default::default()
        }
    }

    /// Chaos mode - aggressive fault injection, few keys for more contention
    pub fn chaos(seed: u64) -> Self {
        CrudDSTConfig {
            seed,
            store_config: SimulatedStoreConfig::high_chaos(),
            key_space: 6,
            ..Default::default()
        }
    }
}

/// CRUD operation type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrudOperation {
    Create { key: String, value: u64 },
    Get { key: String },
    Put { key: String, value: u64 },
    Delete { key: String },
    List { prefix: String },
}

/// Outcome of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    /// Expected failure kind (not found, already exists, conflict, ...)
    Rejected(ErrorKind),
    /// Injected fault or decode of corrupted bytes
    Failed(String),
}

/// Workload generator
struct CrudWorkload {
    rng: ChaCha8Rng,
    config: CrudDSTConfig,
    counter: u64,
}

impl CrudWorkload {
    fn new(config: CrudDSTConfig) -> Self {
        CrudWorkload {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            counter: 0,
        }
    }

    fn next_operation(&mut self) -> CrudOperation {
        self.counter += 1;
        let key = format!("k/{:03}", self.rng.gen_range(0..self.config.key_space.max(1)));
        let total: u32 = self.config.weights.iter().sum();
        let mut roll = self.rng.gen_range(0..total.max(1));

        let mut choice = 0;
        for (idx, weight) in self.config.weights.iter().enumerate() {
            if roll < *weight {
                choice = idx;
                break;
            }
            roll -= weight;
        }

        match choice {
            0 => CrudOperation::Create {
                key,
                value: self.counter,
            },
            1 => CrudOperation::Get { key },
            2 => CrudOperation::Put {
                key,
                value: self.counter,
            },
            3 => CrudOperation::Delete { key },
            _ => CrudOperation::List {
                prefix: "k/".to_string(),
            },
        }
    }
}

/// Result of a DST run
#[derive(Debug, Clone)]
pub struct CrudDSTResult {
    /// Seed used
    pub seed: u64,
    /// Total operations attempted
    pub total_operations: u64,
    /// Successful operations
    pub successful_operations: u64,
    /// Operations rejected with an expected error kind
    pub rejected_operations: u64,
    /// Operations failed by injected faults
    pub failed_operations: u64,
    /// Puts that lost to a concurrent writer
    pub conflicts: u64,
    /// Store fault statistics
    pub store_stats: SimulatedStoreStats,
    /// Invariant violations found
    pub invariant_violations: Vec<String>,
}

impl CrudDSTResult {
    pub fn new(seed: u64) -> Self {
        CrudDSTResult {
            seed,
            total_operations: 0,
            successful_operations: 0,
            rejected_operations: 0,
            failed_operations: 0,
            conflicts: 0,
            store_stats: SimulatedStoreStats::default(),
            invariant_violations: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops ({} ok, {} rejected, {} failed), {} conflicts, {} violations",
            self.seed,
            self.total_operations,
            self.successful_operations,
            self.rejected_operations,
            self.failed_operations,
            self.conflicts,
            self.invariant_violations.len()
        )
    }
}

type DSTStore = SimulatedObjectStore<InMemoryObjectStore>;

/// Main DST harness for the CRUD store
pub struct CrudDSTHarness {
    store: CrudStore<u64>,
    faults: Arc<DSTStore>,
    backend: InMemoryObjectStore,
    workload: CrudWorkload,
    /// Ground truth: what the bucket must hold
    shadow: BTreeMap<String, u64>,
    result: CrudDSTResult,
}

impl CrudDSTHarness {
    /// Create a new DST harness.
    ///
    /// Fails only if the connect probe is faulted on every attempt.
    pub async fn new(config: CrudDSTConfig) -> crate::Result<Self> {
        let backend = InMemoryObjectStore::new().with_page_size(4);
        let faults = Arc::new(SimulatedObjectStore::new(
            backend.clone(),
            config.seed.wrapping_add(1), // Different stream from the workload
            config.store_config.clone(),
        ));

        // The connect probe goes through the fault injector too, so retry it
        // a bounded number of times; the retries stay on the seeded stream.
        let mut attempt = 1;
        let client = loop {
            let store: Arc<dyn ObjectStore> = faults.clone();
            match BucketClient::connect("dst", store, ClientOptions::default()).await {
                Ok(client) => break client,
                Err(e) if attempt >= CONNECT_ATTEMPTS => return Err(e),
                Err(_) => attempt += 1,
            }
        };

        Ok(CrudDSTHarness {
            store: CrudStore::new(client),
            faults,
            backend,
            workload: CrudWorkload::new(config.clone()),
            shadow: BTreeMap::new(),
            result: CrudDSTResult::new(config.seed),
        })
    }

    /// Run the workload for a specified number of operations
    pub async fn run(&mut self, operations: usize) {
        for _ in 0..operations {
            let op = self.workload.next_operation();
            self.execute_operation(op).await;
        }
    }

    async fn execute_operation(&mut self, op: CrudOperation) {
        self.result.total_operations += 1;

        let outcome = match &op {
            CrudOperation::Create { key, value } => self.execute_create(key, *value).await,
            CrudOperation::Get { key } => self.execute_get(key).await,
            CrudOperation::Put { key, value } => self.execute_put(key, *value).await,
            CrudOperation::Delete { key } => self.execute_delete(key).await,
            CrudOperation::List { prefix } => self.execute_list(prefix).await,
        };

        match outcome {
            OperationOutcome::Success => self.result.successful_operations += 1,
            OperationOutcome::Rejected(kind) => {
                self.result.rejected_operations += 1;
                if kind == ErrorKind::Conflict {
                    self.result.conflicts += 1;
                }
            }
            OperationOutcome::Failed(_) => self.result.failed_operations += 1,
        }
    }

    fn violation(&mut self, message: String) {
        self.result
            .invariant_violations
            .push(format!("seed {}: {}", self.result.seed, message));
    }

    fn classify(err: &crate::Error) -> OperationOutcome {
        match err.kind() {
            kind @ (ErrorKind::NotFound | ErrorKind::AlreadyExists | ErrorKind::Conflict) => {
                OperationOutcome::Rejected(kind)
            }
            _ => OperationOutcome::Failed(err.to_string()),
        }
    }

    async fn execute_create(&mut self, key: &str, value: u64) -> OperationOutcome {
        match self.store.create(key, &value).await {
            Ok(()) => {
                if self.shadow.contains_key(key) {
                    self.violation(format!("create {} succeeded over an existing value", key));
                }
                self.shadow.insert(key.to_string(), value);
                OperationOutcome::Success
            }
            Err(e) => {
                if e.kind() == ErrorKind::AlreadyExists && !self.shadow.contains_key(key) {
                    self.violation(format!("create {} reported AlreadyExists for a missing key", key));
                }
                Self::classify(&e)
            }
        }
    }

    async fn execute_get(&mut self, key: &str) -> OperationOutcome {
        match self.store.get(key).await {
            Ok(value) => {
                let expected = self.shadow.get(key).copied();
                if expected != Some(value) {
                    self.violation(format!(
                        "get {} returned {}, expected {:?}",
                        key, value, expected
                    ));
                }
                OperationOutcome::Success
            }
            Err(e) => {
                if e.is_not_found() && self.shadow.contains_key(key) {
                    self.violation(format!("get {} reported NotFound for a stored key", key));
                }
                if e.kind() == ErrorKind::Conflict {
                    self.violation(format!("get {} reported a conflict", key));
                }
                Self::classify(&e)
            }
        }
    }

    async fn execute_put(&mut self, key: &str, value: u64) -> OperationOutcome {
        match self.store.put(key, &value).await {
            Ok(()) => {
                self.shadow.insert(key.to_string(), value);
                OperationOutcome::Success
            }
            Err(e) => {
                if e.is_not_found() {
                    self.violation(format!("put {} reported NotFound", key));
                }
                Self::classify(&e)
            }
        }
    }

    async fn execute_delete(&mut self, key: &str) -> OperationOutcome {
        match self.store.delete(key).await {
            Ok(()) => {
                if self.shadow.remove(key).is_none() {
                    self.violation(format!("delete {} succeeded for a missing key", key));
                }
                OperationOutcome::Success
            }
            Err(e) => {
                if e.is_not_found() && self.shadow.contains_key(key) {
                    self.violation(format!("delete {} reported NotFound for a stored key", key));
                }
                Self::classify(&e)
            }
        }
    }

    async fn execute_list(&mut self, prefix: &str) -> OperationOutcome {
        let listed = self.store.keys(prefix).try_collect::<Vec<String>>().await;
        match listed {
            Ok(keys) => {
                let expected: Vec<String> = self
                    .shadow
                    .keys()
                    .filter(|k| k.starts_with(prefix))
                    .cloned()
                    .collect();
                if keys != expected {
                    self.violation(format!(
                        "list {} returned {:?}, expected {:?}",
                        prefix, keys, expected
                    ));
                }
                OperationOutcome::Success
            }
            Err(e) => Self::classify(&e),
        }
    }

    /// Compare the bucket contents with the shadow model
    pub async fn check_invariants(&mut self) {
        let stored = self.backend.len();
        if stored != self.shadow.len() {
            self.violation(format!(
                "bucket holds {} objects, shadow holds {}",
                stored,
                self.shadow.len()
            ));
        }

        let shadow: Vec<(String, u64)> = self.shadow.iter().map(|(k, v)| (k.clone(), *v)).collect();
        for (key, expected) in shadow {
            let path = self.store.client().filename(&key);
            let actual = self
                .backend
                .raw(&path)
                .and_then(|data| serde_json::from_slice::<u64>(&data).ok());
            if actual != Some(expected) {
                self.violation(format!(
                    "{} holds {:?}, expected {}",
                    path, actual, expected
                ));
            }
        }

        self.result.store_stats = self.faults.stats();
    }

    pub fn result(&self) -> &CrudDSTResult {
        &self.result
    }

    pub fn into_result(self) -> CrudDSTResult {
        self.result
    }
}

/// Run DST over `count` consecutive seeds
pub async fn run_dst_batch(
    base_seed: u64,
    count: usize,
    ops_per_run: usize,
    config_fn: impl Fn(u64) -> CrudDSTConfig,
) -> crate::Result<Vec<CrudDSTResult>> {
    let mut results = Vec::with_capacity(count);

    for i in 0..count {
        let seed = base_seed + i as u64;
        let mut harness = CrudDSTHarness::new(config_fn(seed)).await?;
        harness.run(ops_per_run).await;
        harness.check_invariants().await;

        results.push(harness.into_result());
    }

    Ok(results)
}

/// Summary of batch results
pub fn summarize_batch(results: &[CrudDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed_seeds: Vec<u64> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.seed)
        .collect();

    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();
    let total_conflicts: u64 = results.iter().map(|r| r.conflicts).sum();
    let total_failed: u64 = results.iter().map(|r| r.failed_operations).sum();

    let mut summary = format!(
        "Batch: {}/{} passed, {} total ops, {} conflicts, {} injected failures",
        passed, total, total_ops, total_conflicts, total_failed
    );

    if !failed_seeds.is_empty() {
        summary.push_str(&format!("\nFailed seeds: {:?}", failed_seeds));
    }

    summary
}
