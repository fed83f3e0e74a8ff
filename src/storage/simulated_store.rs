//! Simulated Object Store with Fault Injection
//!
//! DST-compatible wrapper that injects faults from a seeded RNG.
//! Follows FoundationDB patterns for deterministic simulation testing:
//! the same seed and the same call sequence produce the same faults.
//!
//! Faults are injected before the inner call, so a failed call never
//! commits anything. The one exception is the concurrent writer, which
//! commits a rewrite of the target object on purpose.

use crate::storage::object_store::{
    Generation, ListResult, ObjectMeta, ObjectStore, Precondition, StoreError, StoreResult,
    WriteOptions,
};
use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for simulated fault injection
#[derive(Debug, Clone)]
pub struct SimulatedStoreConfig {
    /// Probability of PUT operation failure
    pub put_fail_prob: f64,
    /// Probability of GET operation failure
    pub get_fail_prob: f64,
    /// Probability of GET returning corrupted data
    pub get_corrupt_prob: f64,
    /// Probability of operation timeout
    pub timeout_prob: f64,
    /// Probability of DELETE failure
    pub delete_fail_prob: f64,
    /// Probability of LIST failure
    pub list_fail_prob: f64,
    /// Probability that another writer commits between attribute fetch
    /// and a generation-scoped PUT
    pub concurrent_write_prob: f64,
    /// Simulated latency range in microseconds (min, max)
    pub latency_range_us: (u64, u64),
}

impl Default for SimulatedStoreConfig {
    fn default() -> Self {
        SimulatedStoreConfig {
            put_fail_prob: 0.01,         // 1%
            get_fail_prob: 0.01,         // 1%
            get_corrupt_prob: 0.001,     // 0.1%
            timeout_prob: 0.005,         // 0.5%
            delete_fail_prob: 0.01,      // 1%
            list_fail_prob: 0.01,        // 1%
            concurrent_write_prob: 0.05, // 5%
            latency_range_us: (0, 0),
        }
    }
}

impl SimulatedStoreConfig {
    /// High chaos configuration for stress testing
    pub fn high_chaos() -> Self {
        SimulatedStoreConfig {
            put_fail_prob: 0.05,
            get_fail_prob: 0.05,
            get_corrupt_prob: 0.01,
            timeout_prob: 0.02,
            delete_fail_prob: 0.05,
            list_fail_prob: 0.05,
            concurrent_write_prob: 0.20,
            latency_range_us: (0, 0),
        }
    }

    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        SimulatedStoreConfig {
            put_fail_prob: 0.0,
            get_fail_prob: 0.0,
            get_corrupt_prob: 0.0,
            timeout_prob: 0.0,
            delete_fail_prob: 0.0,
            list_fail_prob: 0.0,
            concurrent_write_prob: 0.0,
            latency_range_us: (0, 0),
        }
    }

    /// Only the concurrent writer, on every generation-scoped PUT
    pub fn always_conflict() -> Self {
        SimulatedStoreConfig {
            concurrent_write_prob: 1.0,
            ..Self::no_faults()
        }
    }
}

/// Statistics for fault injection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedStoreStats {
    pub put_attempts: u64,
    pub put_failures: u64,
    pub get_attempts: u64,
    pub get_failures: u64,
    pub get_corruptions: u64,
    pub head_attempts: u64,
    pub delete_attempts: u64,
    pub delete_failures: u64,
    pub list_attempts: u64,
    pub list_failures: u64,
    pub timeouts: u64,
    pub concurrent_writes: u64,
}

/// Inner state for the simulated store
struct SimulatedStoreInner {
    rng: ChaCha8Rng,
    stats: SimulatedStoreStats,
}

/// Simulated object store that wraps another store and injects faults
pub struct SimulatedObjectStore<S: ObjectStore> {
    inner_store: S,
    config: SimulatedStoreConfig,
    state: Arc<Mutex<SimulatedStoreInner>>,
}

impl<S: ObjectStore> SimulatedObjectStore<S> {
    /// Create a new simulated store seeded with `seed`
    pub fn new(inner_store: S, seed: u64, config: SimulatedStoreConfig) -> Self {
        SimulatedObjectStore {
            inner_store,
            config,
            state: Arc::new(Mutex::new(SimulatedStoreInner {
                rng: ChaCha8Rng::seed_from_u64(seed),
                stats: SimulatedStoreStats::default(),
            })),
        }
    }

    /// Access the wrapped store (bypasses fault injection)
    pub fn inner(&self) -> &S {
        &self.inner_store
    }

    /// Get current statistics
    pub fn stats(&self) -> SimulatedStoreStats {
        self.state.lock().stats.clone()
    }

    /// Reset statistics
    pub fn reset_stats(&self) {
        self.state.lock().stats = SimulatedStoreStats::default();
    }

    fn roll(&self, prob: f64) -> bool {
        if prob <= 0.0 {
            return false;
        }
        self.state.lock().rng.gen_bool(prob.min(1.0))
    }

    fn record(&self, update: impl FnOnce(&mut SimulatedStoreStats)) {
        update(&mut self.state.lock().stats);
    }

    fn check_timeout(&self) -> StoreResult<()> {
        if self.roll(self.config.timeout_prob) {
            self.record(|s| s.timeouts += 1);
            return Err(StoreError::TimedOut {
                after: Duration::ZERO,
            });
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        let (min, max) = self.config.latency_range_us;
        if min == 0 && max == 0 {
            return;
        }
        let latency_us = if max > min {
            self.state.lock().rng.gen_range(min..max)
        } else {
            min
        };
        if latency_us > 0 {
            tokio::time::sleep(Duration::from_micros(latency_us)).await;
        }
    }

    /// Commit a rewrite of `path` the way a racing client would
    async fn concurrent_rewrite(&self, path: &str, observed: &Generation) {
        let Ok(meta) = self.inner_store.head(path).await else {
            return;
        };
        let Ok(data) = self.inner_store.get(path).await else {
            return;
        };
        let rewrite = WriteOptions {
            precondition: Precondition::GenerationMatch(observed.clone()),
            content_type: meta.content_type,
        };
        if self.inner_store.put(path, data, rewrite).await.is_ok() {
            self.record(|s| s.concurrent_writes += 1);
        }
    }
}

impl<S: ObjectStore + Clone> Clone for SimulatedObjectStore<S> {
    fn clone(&self) -> Self {
        SimulatedObjectStore {
            inner_store: self.inner_store.clone(),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

fn simulated_failure(what: &str) -> StoreError {
    StoreError::Io(IoError::new(ErrorKind::Other, format!("simulated {} failure", what)))
}

impl<S: ObjectStore> ObjectStore for SimulatedObjectStore<S> {
    fn head<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<ObjectMeta>> {
        Box::pin(async move {
            self.record(|s| s.head_attempts += 1);
            self.check_timeout()?;
            self.simulate_latency().await;
            self.inner_store.head(path).await
        })
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(async move {
            self.record(|s| s.get_attempts += 1);
            self.check_timeout()?;

            if self.roll(self.config.get_fail_prob) {
                self.record(|s| s.get_failures += 1);
                return Err(simulated_failure("get"));
            }

            self.simulate_latency().await;
            let data = self.inner_store.get(path).await?;

            if !data.is_empty() && self.roll(self.config.get_corrupt_prob) {
                self.record(|s| s.get_corruptions += 1);
                let mut corrupted = data.to_vec();
                let idx = self.state.lock().rng.gen_range(0..corrupted.len());
                corrupted[idx] ^= 0xFF;
                return Ok(Bytes::from(corrupted));
            }

            Ok(data)
        })
    }

    fn put<'a>(
        &'a self,
        path: &'a str,
        data: Bytes,
        options: WriteOptions,
    ) -> BoxFuture<'a, StoreResult<Generation>> {
        Box::pin(async move {
            self.record(|s| s.put_attempts += 1);
            self.check_timeout()?;

            if self.roll(self.config.put_fail_prob) {
                self.record(|s| s.put_failures += 1);
                return Err(simulated_failure("put"));
            }

            if let Precondition::GenerationMatch(observed) = &options.precondition {
                if self.roll(self.config.concurrent_write_prob) {
                    self.concurrent_rewrite(path, observed).await;
                }
            }

            self.simulate_latency().await;
            self.inner_store.put(path, data, options).await
        })
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.record(|s| s.delete_attempts += 1);
            self.check_timeout()?;

            if self.roll(self.config.delete_fail_prob) {
                self.record(|s| s.delete_failures += 1);
                return Err(simulated_failure("delete"));
            }

            self.simulate_latency().await;
            self.inner_store.delete(path).await
        })
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> BoxFuture<'a, StoreResult<ListResult>> {
        Box::pin(async move {
            self.record(|s| s.list_attempts += 1);
            self.check_timeout()?;

            if self.roll(self.config.list_fail_prob) {
                self.record(|s| s.list_failures += 1);
                return Err(simulated_failure("list"));
            }

            self.simulate_latency().await;
            self.inner_store.list(prefix, continuation_token).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryObjectStore;

    fn create() -> WriteOptions {
        WriteOptions {
            precondition: Precondition::DoesNotExist,
            content_type: None,
        }
    }

    #[tokio::test]
    async fn test_no_faults_passthrough() {
        let store =
            SimulatedObjectStore::new(InMemoryObjectStore::new(), 1, SimulatedStoreConfig::no_faults());

        store.put("k", Bytes::from_static(b"v"), create()).await.unwrap();
        assert_eq!(&store.get("k").await.unwrap()[..], b"v");

        let stats = store.stats();
        assert_eq!(stats.put_attempts, 1);
        assert_eq!(stats.get_attempts, 1);
        assert_eq!(stats.put_failures, 0);
    }

    #[tokio::test]
    async fn test_failed_put_commits_nothing() {
        let config = SimulatedStoreConfig {
            put_fail_prob: 1.0,
            ..SimulatedStoreConfig::no_faults()
        };
        let store = SimulatedObjectStore::new(InMemoryObjectStore::new(), 7, config);

        let err = store.put("k", Bytes::from_static(b"v"), create()).await.unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert!(store.inner().is_empty());
        assert_eq!(store.stats().put_failures, 1);
    }

    #[tokio::test]
    async fn test_concurrent_writer_advances_generation() {
        let store = SimulatedObjectStore::new(
            InMemoryObjectStore::new(),
            3,
            SimulatedStoreConfig::always_conflict(),
        );

        store.put("k", Bytes::from_static(b"v1"), create()).await.unwrap();
        let observed = store.head("k").await.unwrap().generation;
        let scoped = WriteOptions {
            precondition: Precondition::GenerationMatch(observed.clone()),
            content_type: None,
        };

        let err = store.put("k", Bytes::from_static(b"v2"), scoped).await.unwrap_err();

        assert!(matches!(err, StoreError::Precondition { .. }));
        assert_eq!(store.stats().concurrent_writes, 1);
        assert_eq!(store.inner().raw("k").unwrap(), Bytes::from_static(b"v1"));
        assert_ne!(store.head("k").await.unwrap().generation, observed);
    }

    #[tokio::test]
    async fn test_same_seed_same_faults() {
        async fn run(seed: u64) -> Vec<bool> {
            let store = SimulatedObjectStore::new(
                InMemoryObjectStore::new(),
                seed,
                SimulatedStoreConfig::high_chaos(),
            );
            let mut outcomes = Vec::new();
            for i in 0..50 {
                let path = format!("k{}", i % 5);
                let ok = store
                    .put(&path, Bytes::from_static(b"v"), WriteOptions::default())
                    .await
                    .is_ok();
                outcomes.push(ok);
            }
            outcomes
        }

        assert_eq!(run(99).await, run(99).await);
    }
}
