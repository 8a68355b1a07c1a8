//! In-process counter registry.
//!
//! The registry owns every counter of the service. Each counter maps label
//! sets to atomic cells, so concurrent increments of the same cell never lose
//! updates and a snapshot reads every cell atomically.
//!
//! Locking is two-level: the list of counters sits behind one `RwLock` that
//! only [`CounterRegistry::register`] writes, and each counter has its own
//! `RwLock` around its cell map that is written only when a label set is seen
//! for the first time. Steady-state increments take two read locks and one
//! atomic add.
//!
//! Cells are never removed, so each distinct label set an ingestion client
//! sends (for example a new `serviceName`) adds one series for the lifetime
//! of the process. [`CounterRegistry::with_series_limit`] caps the number of
//! cells per counter; increments that would create a cell past the cap fail
//! with [`RegistryError::SeriesLimitExceeded`] and existing cells keep
//! counting.

use super::labels::{is_valid_metric_name, LabelSet};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Errors that can occur during registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A counter with this name exists with a different description.
    #[error("counter '{name}' is already registered with a different description")]
    DuplicateCounter {
        /// The conflicting counter name.
        name: String,
    },

    /// The name is not a valid metric name.
    #[error("invalid counter name: '{0}'")]
    InvalidName(String),

    /// The handle was not issued by this registry.
    #[error("unknown counter handle")]
    UnknownCounter,

    /// Creating a new cell would exceed the per-counter series limit.
    #[error("counter '{name}' already has {limit} series")]
    SeriesLimitExceeded {
        /// The counter that is full.
        name: String,
        /// The configured limit.
        limit: usize,
    },

    /// Failed to acquire a lock on the registry.
    #[error("failed to acquire lock on counter registry")]
    LockError,
}

/// Opaque reference to a registered counter.
///
/// Handles are cheap to copy and only valid for the registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CounterHandle {
    registry_id: u64,
    index: usize,
}

#[derive(Debug)]
struct Counter {
    name: String,
    description: String,
    cells: RwLock<HashMap<LabelSet, AtomicU64>>,
}

/// One label set and its value at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSample {
    /// The label set of the cell.
    pub labels: LabelSet,
    /// The accumulated value.
    pub value: u64,
}

/// A counter and all of its cells at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterFamily {
    /// Counter name.
    pub name: String,
    /// Counter description.
    pub description: String,
    /// Cells ordered by label set.
    pub samples: Vec<CounterSample>,
}

/// Point-in-time view of the registry.
///
/// Families appear in registration order, samples in label-set order, so two
/// snapshots of the same state are identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    /// Every registered counter.
    pub families: Vec<CounterFamily>,
}

impl RegistrySnapshot {
    /// Flattens the snapshot into `(name, description, labels, value)` rows.
    pub fn samples(&self) -> impl Iterator<Item = (&str, &str, &LabelSet, u64)> {
        self.families.iter().flat_map(|family| {
            family.samples.iter().map(move |sample| {
                (
                    family.name.as_str(),
                    family.description.as_str(),
                    &sample.labels,
                    sample.value,
                )
            })
        })
    }

    /// Returns the value of one cell, if it exists.
    #[must_use]
    pub fn value(&self, name: &str, labels: &LabelSet) -> Option<u64> {
        self.families
            .iter()
            .find(|family| family.name == name)?
            .samples
            .iter()
            .find(|sample| &sample.labels == labels)
            .map(|sample| sample.value)
    }

    /// Sum of all cells across all counters.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.samples()
            .fold(0u64, |acc, (_, _, _, value)| acc.saturating_add(value))
    }
}

/// Thread-safe registry of named counters.
///
/// # Example
///
/// ```
/// use shared::metrics::{CounterRegistry, LabelSet};
///
/// let registry = CounterRegistry::new();
/// let clicks = registry
///     .register("add_button_clicks_total", "Counts Add button clicks")
///     .unwrap();
///
/// let labels = LabelSet::service("ReactNativeApp");
/// registry.increment(clicks, &labels, 1).unwrap();
///
/// assert_eq!(registry.get(clicks, &labels).unwrap(), Some(1));
/// ```
#[derive(Debug)]
pub struct CounterRegistry {
    id: u64,
    series_limit: Option<usize>,
    counters: RwLock<Vec<Arc<Counter>>>,
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            series_limit: None,
            counters: RwLock::new(Vec::new()),
        }
    }

    /// Creates an empty registry wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Caps the number of label sets each counter may hold.
    ///
    /// `None` leaves the registry unbounded.
    #[must_use]
    pub fn with_series_limit(mut self, limit: Option<usize>) -> Self {
        self.series_limit = limit;
        self
    }

    /// Returns the per-counter series limit, if any.
    #[must_use]
    pub fn series_limit(&self) -> Option<usize> {
        self.series_limit
    }

    /// Registers a counter, or returns the existing handle if a counter with
    /// the same name and description is already registered.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is not a valid metric name
    /// - The name is registered with a different description
    pub fn register(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<CounterHandle, RegistryError> {
        let name = name.into();
        let description = description.into();

        if !is_valid_metric_name(&name) {
            return Err(RegistryError::InvalidName(name));
        }

        let mut counters = self
            .counters
            .write()
            .map_err(|_| RegistryError::LockError)?;

        if let Some(index) = counters.iter().position(|c| c.name == name) {
            if counters[index].description != description {
                return Err(RegistryError::DuplicateCounter { name });
            }
            return Ok(self.handle(index));
        }

        tracing::debug!(counter = %name, "Registering counter");
        counters.push(Arc::new(Counter {
            name,
            description,
            cells: RwLock::new(HashMap::new()),
        }));
        Ok(self.handle(counters.len() - 1))
    }

    /// Adds `delta` to the cell for `labels`, creating the cell at zero if
    /// needed. Returns the new value. Values saturate at `u64::MAX`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle belongs to another registry, a lock is
    /// poisoned, or the cell is new and the counter is at its series limit.
    pub fn increment(
        &self,
        handle: CounterHandle,
        labels: &LabelSet,
        delta: u64,
    ) -> Result<u64, RegistryError> {
        let counter = self.counter(handle)?;

        {
            let cells = counter
                .cells
                .read()
                .map_err(|_| RegistryError::LockError)?;
            if let Some(cell) = cells.get(labels) {
                return Ok(add(cell, delta));
            }
        }

        let mut cells = counter
            .cells
            .write()
            .map_err(|_| RegistryError::LockError)?;
        if let Some(limit) = self.series_limit {
            if cells.len() >= limit && !cells.contains_key(labels) {
                return Err(RegistryError::SeriesLimitExceeded {
                    name: counter.name.clone(),
                    limit,
                });
            }
        }
        let cell = cells
            .entry(labels.clone())
            .or_insert_with(|| AtomicU64::new(0));
        Ok(add(cell, delta))
    }

    /// Increments the cell for `labels` by one.
    ///
    /// # Errors
    ///
    /// See [`CounterRegistry::increment`].
    pub fn inc(&self, handle: CounterHandle, labels: &LabelSet) -> Result<u64, RegistryError> {
        self.increment(handle, labels, 1)
    }

    /// Ensures the cell for `labels` exists, leaving its value unchanged.
    ///
    /// # Errors
    ///
    /// See [`CounterRegistry::increment`].
    pub fn seed(&self, handle: CounterHandle, labels: &LabelSet) -> Result<(), RegistryError> {
        self.increment(handle, labels, 0).map(|_| ())
    }

    /// Returns the current value of one cell, or `None` if it was never
    /// touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle belongs to another registry or a lock
    /// is poisoned.
    pub fn get(
        &self,
        handle: CounterHandle,
        labels: &LabelSet,
    ) -> Result<Option<u64>, RegistryError> {
        let counter = self.counter(handle)?;
        let cells = counter
            .cells
            .read()
            .map_err(|_| RegistryError::LockError)?;
        Ok(cells.get(labels).map(|cell| cell.load(Ordering::Acquire)))
    }

    /// Returns the name of a registered counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle belongs to another registry.
    pub fn name(&self, handle: CounterHandle) -> Result<String, RegistryError> {
        Ok(self.counter(handle)?.name.clone())
    }

    /// Returns the number of registered counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize, RegistryError> {
        Ok(self
            .counters
            .read()
            .map_err(|_| RegistryError::LockError)?
            .len())
    }

    /// Returns true if no counter is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }

    /// Takes a point-in-time view of every counter.
    ///
    /// Each counter's cell map is read-locked only while its cells are copied,
    /// so increments on other counters proceed concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error if a lock is poisoned.
    pub fn snapshot(&self) -> Result<RegistrySnapshot, RegistryError> {
        let counters: Vec<Arc<Counter>> = self
            .counters
            .read()
            .map_err(|_| RegistryError::LockError)?
            .clone();

        let mut families = Vec::with_capacity(counters.len());
        for counter in counters {
            let cells = counter
                .cells
                .read()
                .map_err(|_| RegistryError::LockError)?;
            let mut samples: Vec<CounterSample> = cells
                .iter()
                .map(|(labels, cell)| CounterSample {
                    labels: labels.clone(),
                    value: cell.load(Ordering::Acquire),
                })
                .collect();
            drop(cells);
            samples.sort_by(|a, b| a.labels.cmp(&b.labels));

            families.push(CounterFamily {
                name: counter.name.clone(),
                description: counter.description.clone(),
                samples,
            });
        }

        Ok(RegistrySnapshot { families })
    }

    fn handle(&self, index: usize) -> CounterHandle {
        CounterHandle {
            registry_id: self.id,
            index,
        }
    }

    fn counter(&self, handle: CounterHandle) -> Result<Arc<Counter>, RegistryError> {
        if handle.registry_id != self.id {
            return Err(RegistryError::UnknownCounter);
        }
        self.counters
            .read()
            .map_err(|_| RegistryError::LockError)?
            .get(handle.index)
            .cloned()
            .ok_or(RegistryError::UnknownCounter)
    }
}

fn add(cell: &AtomicU64, delta: u64) -> u64 {
    let previous = cell
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
            Some(v.saturating_add(delta))
        })
        .unwrap_or_else(|v| v);
    previous.saturating_add(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_register_returns_distinct_handles() {
        let registry = CounterRegistry::new();
        let a = registry.register("a_total", "A").unwrap();
        let b = registry.register("b_total", "B").unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.len().unwrap(), 2);
        assert_eq!(registry.name(b).unwrap(), "b_total");
    }

    #[test]
    fn test_register_same_description_reuses_counter() {
        let registry = CounterRegistry::new();
        let first = registry.register("clicks_total", "Counts clicks").unwrap();
        let second = registry.register("clicks_total", "Counts clicks").unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_register_conflicting_description_fails() {
        let registry = CounterRegistry::new();
        registry.register("clicks_total", "Counts clicks").unwrap();

        let result = registry.register("clicks_total", "Something else");
        assert_eq!(
            result,
            Err(RegistryError::DuplicateCounter {
                name: "clicks_total".to_string()
            })
        );
    }

    #[test]
    fn test_register_invalid_name_fails() {
        let registry = CounterRegistry::new();
        assert!(matches!(
            registry.register("button-clicks", "x"),
            Err(RegistryError::InvalidName(_))
        ));
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn test_increment_accumulates_per_label_set() {
        let registry = CounterRegistry::new();
        let handle = registry.register("clicks_total", "Counts clicks").unwrap();
        let web = LabelSet::service("web");
        let ios = LabelSet::service("ios");

        assert_eq!(registry.inc(handle, &web).unwrap(), 1);
        assert_eq!(registry.increment(handle, &web, 4).unwrap(), 5);
        assert_eq!(registry.inc(handle, &ios).unwrap(), 1);

        assert_eq!(registry.get(handle, &web).unwrap(), Some(5));
        assert_eq!(registry.get(handle, &ios).unwrap(), Some(1));
        assert_eq!(
            registry.get(handle, &LabelSet::service("android")).unwrap(),
            None
        );
    }

    #[test]
    fn test_increment_is_order_independent_on_labels() {
        let registry = CounterRegistry::new();
        let handle = registry.register("x_total", "x").unwrap();

        let ab: LabelSet = [("a", "1"), ("b", "2")].into_iter().collect();
        let ba: LabelSet = [("b", "2"), ("a", "1")].into_iter().collect();
        registry.inc(handle, &ab).unwrap();
        registry.inc(handle, &ba).unwrap();

        let snapshot = registry.snapshot().unwrap();
        assert_eq!(snapshot.families[0].samples.len(), 1);
        assert_eq!(snapshot.value("x_total", &ab), Some(2));
    }

    #[test]
    fn test_increment_saturates() {
        let registry = CounterRegistry::new();
        let handle = registry.register("big_total", "big").unwrap();
        let labels = LabelSet::new();

        registry.increment(handle, &labels, u64::MAX - 1).unwrap();
        assert_eq!(registry.increment(handle, &labels, 5).unwrap(), u64::MAX);
        assert_eq!(registry.get(handle, &labels).unwrap(), Some(u64::MAX));
    }

    #[test]
    fn test_seed_creates_zero_cell_without_changing_value() {
        let registry = CounterRegistry::new();
        let handle = registry.register("x_total", "x").unwrap();
        let labels = LabelSet::service("web");

        registry.seed(handle, &labels).unwrap();
        assert_eq!(registry.get(handle, &labels).unwrap(), Some(0));

        registry.increment(handle, &labels, 3).unwrap();
        registry.seed(handle, &labels).unwrap();
        assert_eq!(registry.get(handle, &labels).unwrap(), Some(3));
    }

    #[test]
    fn test_handle_from_other_registry_is_rejected() {
        let one = CounterRegistry::new();
        let two = CounterRegistry::new();
        let handle = one.register("x_total", "x").unwrap();
        two.register("x_total", "x").unwrap();

        assert_eq!(
            two.inc(handle, &LabelSet::new()),
            Err(RegistryError::UnknownCounter)
        );
    }

    #[test]
    fn test_snapshot_orders_families_and_samples() {
        let registry = CounterRegistry::new();
        let b = registry.register("b_total", "B").unwrap();
        let a = registry.register("a_total", "A").unwrap();
        registry.inc(b, &LabelSet::service("zeta")).unwrap();
        registry.inc(b, &LabelSet::service("alpha")).unwrap();
        registry.inc(a, &LabelSet::service("mid")).unwrap();

        let snapshot = registry.snapshot().unwrap();
        let names: Vec<&str> = snapshot.families.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b_total", "a_total"]);

        let services: Vec<&str> = snapshot.families[0]
            .samples
            .iter()
            .filter_map(|s| s.labels.get("service"))
            .collect();
        assert_eq!(services, vec!["alpha", "zeta"]);
        assert_eq!(snapshot.samples().count(), 3);
        assert_eq!(snapshot.total(), 3);
    }

    #[test]
    fn test_snapshot_includes_counters_without_cells() {
        let registry = CounterRegistry::new();
        registry.register("idle_total", "Never touched").unwrap();

        let snapshot = registry.snapshot().unwrap();
        assert_eq!(snapshot.families.len(), 1);
        assert!(snapshot.families[0].samples.is_empty());
    }

    #[test]
    fn test_concurrent_increments_do_not_lose_updates() {
        const THREADS: u64 = 16;
        const PER_THREAD: u64 = 5_000;

        let registry = CounterRegistry::new_shared();
        let handle = registry.register("hits_total", "Hits").unwrap();
        let labels = LabelSet::service("web");

        thread::scope(|scope| {
            for _ in 0..THREADS {
                let registry = &registry;
                let labels = &labels;
                scope.spawn(move || {
                    for _ in 0..PER_THREAD {
                        registry.inc(handle, labels).unwrap();
                    }
                });
            }
        });

        assert_eq!(
            registry.get(handle, &labels).unwrap(),
            Some(THREADS * PER_THREAD)
        );
    }

    #[test]
    fn test_concurrent_first_touch_of_many_label_sets() {
        let registry = CounterRegistry::new_shared();
        let handle = registry.register("hits_total", "Hits").unwrap();

        thread::scope(|scope| {
            for t in 0..8u64 {
                let registry = &registry;
                scope.spawn(move || {
                    for i in 0..200u64 {
                        let labels = LabelSet::service(format!("svc-{}", i % 50));
                        registry.increment(handle, &labels, t + 1).unwrap();
                    }
                });
            }
        });

        let snapshot = registry.snapshot().unwrap();
        assert_eq!(snapshot.families[0].samples.len(), 50);
        // Each thread adds (t + 1) two hundred times.
        assert_eq!(snapshot.total(), (1..=8u64).sum::<u64>() * 200);
    }

    #[test]
    fn test_snapshot_is_deterministic_across_interleavings() {
        let run = |reverse: bool| {
            let registry = CounterRegistry::new();
            let a = registry.register("a_total", "A").unwrap();
            let b = registry.register("b_total", "B").unwrap();
            let mut ops = vec![
                (a, LabelSet::service("x")),
                (b, LabelSet::service("y")),
                (a, LabelSet::service("z")),
                (a, LabelSet::service("x")),
            ];
            if reverse {
                ops.reverse();
            }
            for (handle, labels) in &ops {
                registry.inc(*handle, labels).unwrap();
            }
            registry.snapshot().unwrap()
        };

        assert_eq!(run(false), run(true));
    }

    #[test]
    fn test_series_limit_rejects_new_label_sets() {
        let registry = CounterRegistry::new().with_series_limit(Some(2));
        let clicks = registry.register("clicks_total", "Counts clicks").unwrap();

        registry.inc(clicks, &LabelSet::service("a")).unwrap();
        registry.inc(clicks, &LabelSet::service("b")).unwrap();

        assert_eq!(
            registry.inc(clicks, &LabelSet::service("c")),
            Err(RegistryError::SeriesLimitExceeded {
                name: "clicks_total".to_string(),
                limit: 2,
            })
        );
        assert_eq!(registry.inc(clicks, &LabelSet::service("a")), Ok(2));
        assert_eq!(registry.get(clicks, &LabelSet::service("c")).unwrap(), None);
    }

    #[test]
    fn test_series_limit_is_per_counter() {
        let registry = CounterRegistry::new().with_series_limit(Some(1));
        let a = registry.register("a_total", "A").unwrap();
        let b = registry.register("b_total", "B").unwrap();

        registry.inc(a, &LabelSet::service("x")).unwrap();
        registry.inc(b, &LabelSet::service("y")).unwrap();

        assert_eq!(registry.snapshot().unwrap().total(), 2);
    }

    #[test]
    fn test_unbounded_by_default() {
        let registry = CounterRegistry::new();
        assert_eq!(registry.series_limit(), None);
        let clicks = registry.register("clicks_total", "Counts clicks").unwrap();

        for i in 0..100 {
            registry.inc(clicks, &LabelSet::service(format!("svc-{i}"))).unwrap();
        }

        assert_eq!(registry.snapshot().unwrap().families[0].samples.len(), 100);
    }
}
