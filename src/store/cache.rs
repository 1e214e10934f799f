//! In-memory cache holding one lookup table per supported resolution.

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, info};

use super::{StoreReader, TableSource};
use crate::config::StoreConfig;
use crate::models::ResolutionTable;

/// Fully populated table set, shared read-only between callers
type TableSet = BTreeMap<u8, Arc<ResolutionTable>>;

/// Replacement tables installed by tests
pub type TableOverrides = BTreeMap<u8, ResolutionTable>;

enum CacheState {
    Empty,
    Populating,
    Populated(Arc<TableSet>),
}

/// Lazily populated, concurrency-safe table cache.
///
/// The first `get_table` call reads every configured resolution through the
/// table source. Callers arriving while that pass runs block until it
/// finishes; nobody sees a partially populated set. After population, reads
/// only take a shared lock to clone the snapshot.
pub struct ResolutionCache<S = StoreReader> {
    source: S,
    resolutions: Vec<u8>,
    state: Mutex<CacheState>,
    populated: Condvar,
    /// Published copy of the populated set for the read fast path
    snapshot: RwLock<Option<Arc<TableSet>>>,
    overrides: RwLock<Option<Arc<TableSet>>>,
}

impl ResolutionCache<StoreReader> {
    /// Cache backed by data files described by `config`
    pub fn from_config(config: StoreConfig) -> Self {
        let resolutions = config.resolutions.clone();
        Self::new(StoreReader::new(config), resolutions)
    }
}

impl<S: TableSource> ResolutionCache<S> {
    pub fn new(source: S, resolutions: Vec<u8>) -> Self {
        Self {
            source,
            resolutions,
            state: Mutex::new(CacheState::Empty),
            populated: Condvar::new(),
            snapshot: RwLock::new(None),
            overrides: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn resolutions(&self) -> &[u8] {
        &self.resolutions
    }

    /// Table for `resolution`, populating the cache on first use.
    ///
    /// An active override for the resolution is returned without touching
    /// the cache. Resolutions outside the configured set yield an empty table.
    pub fn get_table(&self, resolution: u8, debug: bool) -> Arc<ResolutionTable> {
        if let Some(table) = self.override_table(resolution) {
            if debug {
                info!(target: "lakhua::debug", "using test override store for r{}", resolution);
            }
            return table;
        }

        let tables = self.tables(debug);

        let started = Instant::now();
        let table = tables.get(&resolution).cloned().unwrap_or_default();
        if debug {
            info!(
                target: "lakhua::debug",
                "fetched in-memory store r{} in {:.3}ms",
                resolution,
                started.elapsed().as_secs_f64() * 1000.0
            );
        }
        table
    }

    /// Run the population pass now instead of on the first lookup
    pub fn warm(&self, debug: bool) {
        self.tables(debug);
    }

    /// Replace the override set. `None` or an empty map turns overriding off.
    pub fn set_test_override(&self, overrides: Option<TableOverrides>) {
        let overrides = overrides.filter(|o| !o.is_empty()).map(|o| {
            Arc::new(
                o.into_iter()
                    .map(|(resolution, table)| (resolution, Arc::new(table)))
                    .collect::<TableSet>(),
            )
        });

        debug!(
            "Test override {}",
            if overrides.is_some() { "installed" } else { "cleared" }
        );
        *write(&self.overrides) = overrides;
    }

    /// Drop all populated tables so the next lookup reads the source again.
    ///
    /// Waits for an in-flight population pass to finish first.
    pub fn clear_cache(&self) {
        let mut state = self.wait_while_populating(lock(&self.state));
        *state = CacheState::Empty;
        *write(&self.snapshot) = None;
        debug!("Resolution cache cleared");
    }

    pub fn is_populated(&self) -> bool {
        read(&self.snapshot).is_some()
    }

    /// Resolutions currently held in the populated set
    pub fn loaded_resolutions(&self) -> Vec<u8> {
        read(&self.snapshot)
            .as_ref()
            .map(|tables| tables.keys().copied().collect())
            .unwrap_or_default()
    }

    fn override_table(&self, resolution: u8) -> Option<Arc<ResolutionTable>> {
        read(&self.overrides)
            .as_ref()
            .and_then(|o| o.get(&resolution).cloned())
    }

    fn tables(&self, debug: bool) -> Arc<TableSet> {
        if let Some(tables) = read(&self.snapshot).as_ref() {
            return Arc::clone(tables);
        }

        let mut state = self.wait_while_populating(lock(&self.state));
        if let CacheState::Populated(tables) = &*state {
            return Arc::clone(tables);
        }

        // Empty -> Populating; this caller runs the pass
        *state = CacheState::Populating;
        drop(state);

        let mut guard = PopulateGuard {
            cache: self,
            done: false,
        };
        let tables = Arc::new(self.populate(debug));
        guard.done = true;

        let mut state = lock(&self.state);
        *state = CacheState::Populated(Arc::clone(&tables));
        *write(&self.snapshot) = Some(Arc::clone(&tables));
        drop(state);
        self.populated.notify_all();

        tables
    }

    fn populate(&self, debug: bool) -> TableSet {
        let started = Instant::now();

        let tables: TableSet = self
            .resolutions
            .iter()
            .map(|&resolution| (resolution, Arc::new(self.source.read(resolution))))
            .collect();

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        if debug {
            info!(
                target: "lakhua::debug",
                "loaded all stores into memory in {:.3}ms",
                elapsed_ms
            );
        }
        for (resolution, table) in &tables {
            debug!("  r{}: {} cells", resolution, table.len());
        }
        debug!(
            "Populated {} resolution tables in {:.3}ms",
            tables.len(),
            elapsed_ms
        );

        tables
    }

    fn wait_while_populating<'a>(
        &self,
        mut state: MutexGuard<'a, CacheState>,
    ) -> MutexGuard<'a, CacheState> {
        while matches!(*state, CacheState::Populating) {
            state = self
                .populated
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state
    }
}

/// Puts the cache back to `Empty` if the population pass unwinds, so waiting
/// callers retry instead of blocking forever.
struct PopulateGuard<'a, S: TableSource> {
    cache: &'a ResolutionCache<S>,
    done: bool,
}

impl<S: TableSource> Drop for PopulateGuard<'_, S> {
    fn drop(&mut self) {
        if !self.done {
            *lock(&self.cache.state) = CacheState::Empty;
            self.cache.populated.notify_all();
        }
    }
}

// Guarded values are only ever replaced wholesale, so a poisoned lock still
// holds a consistent value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocationRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    /// Source that counts reads and serves one fixed record per resolution
    struct CountingSource {
        reads: AtomicUsize,
        delay: Duration,
    }

    impl CountingSource {
        fn new(delay: Duration) -> Self {
            Self {
                reads: AtomicUsize::new(0),
                delay,
            }
        }
    }

    impl TableSource for CountingSource {
        fn read(&self, resolution: u8) -> ResolutionTable {
            self.reads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            let mut table = ResolutionTable::new();
            table.insert(
                format!("cell-r{}", resolution),
                LocationRecord::new(format!("City{}", resolution), "State"),
            );
            table
        }
    }

    fn table_with(key: &str, city: &str) -> ResolutionTable {
        let mut table = ResolutionTable::new();
        table.insert(key.to_string(), LocationRecord::new(city, "Delhi"));
        table
    }

    #[test]
    fn test_lazy_population() {
        let cache = ResolutionCache::new(CountingSource::new(Duration::ZERO), vec![4, 5]);
        assert!(!cache.is_populated());
        assert_eq!(cache.source().reads.load(Ordering::SeqCst), 0);

        let table = cache.get_table(5, false);
        assert_eq!(table["cell-r5"].city, "City5");
        assert!(cache.is_populated());
        assert_eq!(cache.loaded_resolutions(), vec![4, 5]);

        // Both resolutions were read in the single pass
        cache.get_table(4, false);
        cache.get_table(5, true);
        assert_eq!(cache.source().reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_resolution_is_empty() {
        let cache = ResolutionCache::new(CountingSource::new(Duration::ZERO), vec![4, 5]);
        assert!(cache.get_table(7, false).is_empty());
    }

    #[test]
    fn test_concurrent_first_access_populates_once() {
        let source = CountingSource::new(Duration::from_millis(50));
        let cache = ResolutionCache::new(source, vec![4, 5]);
        let barrier = Barrier::new(16);

        let tables: Vec<Arc<ResolutionTable>> = thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let cache = &cache;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        cache.get_table(if i % 2 == 0 { 4 } else { 5 }, false)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.source().reads.load(Ordering::SeqCst), 2);
        for (i, table) in tables.iter().enumerate() {
            let resolution = if i % 2 == 0 { 4 } else { 5 };
            assert_eq!(table.len(), 1);
            assert!(table.contains_key(&format!("cell-r{}", resolution)));
        }
    }

    #[test]
    fn test_override_bypasses_population() {
        let cache = ResolutionCache::new(CountingSource::new(Duration::ZERO), vec![4, 5]);
        let mut overrides = TableOverrides::new();
        overrides.insert(5, table_with("8560145bfffffff", "New Delhi"));
        cache.set_test_override(Some(overrides));

        let table = cache.get_table(5, false);
        assert_eq!(table["8560145bfffffff"].city, "New Delhi");
        assert_eq!(cache.source().reads.load(Ordering::SeqCst), 0);
        assert!(!cache.is_populated());

        // Resolutions without an override still go through the cache
        let table = cache.get_table(4, false);
        assert!(table.contains_key("cell-r4"));
        assert_eq!(cache.source().reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_override_disables_overriding() {
        let cache = ResolutionCache::new(CountingSource::new(Duration::ZERO), vec![5]);
        let mut overrides = TableOverrides::new();
        overrides.insert(5, table_with("8560145bfffffff", "New Delhi"));
        cache.set_test_override(Some(overrides));

        cache.set_test_override(Some(TableOverrides::new()));
        assert!(cache.get_table(5, false).contains_key("cell-r5"));
    }

    #[test]
    fn test_clear_cache_repopulates() {
        let cache = ResolutionCache::new(CountingSource::new(Duration::ZERO), vec![4, 5]);
        cache.warm(false);
        assert_eq!(cache.source().reads.load(Ordering::SeqCst), 2);

        cache.clear_cache();
        assert!(!cache.is_populated());
        assert!(cache.loaded_resolutions().is_empty());

        cache.get_table(5, false);
        assert_eq!(cache.source().reads.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_clear_waits_for_running_population() {
        let source = CountingSource::new(Duration::from_millis(100));
        let cache = ResolutionCache::new(source, vec![4, 5]);

        thread::scope(|s| {
            let loader = s.spawn(|| cache.get_table(5, false));

            // First read has started, so the pass is running
            while cache.source().reads.load(Ordering::SeqCst) == 0 {
                thread::yield_now();
            }
            cache.clear_cache();
            assert_eq!(cache.source().reads.load(Ordering::SeqCst), 2);
            assert!(!cache.is_populated());

            let table = loader.join().unwrap();
            assert_eq!(table["cell-r5"].city, "City5");
        });

        cache.get_table(5, false);
        assert_eq!(cache.source().reads.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_readers_never_see_partial_state() {
        let cache = ResolutionCache::new(CountingSource::new(Duration::ZERO), vec![4, 5]);
        let stop = std::sync::atomic::AtomicBool::new(false);

        thread::scope(|s| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let cache = &cache;
                    let stop = &stop;
                    s.spawn(move || {
                        let mut seen = 0;
                        while !stop.load(Ordering::SeqCst) || seen == 0 {
                            let table = cache.get_table(5, false);
                            assert_eq!(table.len(), 1);
                            let from_source = table
                                .get("cell-r5")
                                .is_some_and(|r| r.city == "City5");
                            let from_override = table
                                .get("8560145bfffffff")
                                .is_some_and(|r| r.city == "New Delhi");
                            assert!(from_source || from_override);
                            seen += 1;
                        }
                    })
                })
                .collect();

            for i in 0..200 {
                if i % 2 == 0 {
                    let mut overrides = TableOverrides::new();
                    overrides.insert(5, table_with("8560145bfffffff", "New Delhi"));
                    cache.set_test_override(Some(overrides));
                } else {
                    cache.set_test_override(None);
                }
                cache.clear_cache();
            }
            stop.store(true, Ordering::SeqCst);

            for reader in readers {
                reader.join().unwrap();
            }
        });
    }

    #[test]
    fn test_override_then_clear_reads_real_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("reverse_geo_5.json"),
            r#"{"8560145bfffffff": {"city": "From Disk", "state": "Delhi"}}"#,
        )
        .unwrap();
        let cache = ResolutionCache::from_config(StoreConfig::with_data_dir(dir.path()));

        let mut overrides = TableOverrides::new();
        overrides.insert(5, table_with("8560145bfffffff", "Overridden"));
        cache.set_test_override(Some(overrides));
        assert_eq!(cache.get_table(5, false)["8560145bfffffff"].city, "Overridden");

        cache.set_test_override(None);
        cache.clear_cache();
        assert_eq!(cache.get_table(5, false)["8560145bfffffff"].city, "From Disk");
    }

    #[test]
    fn test_panicking_source_does_not_wedge_cache() {
        struct FlakySource {
            calls: AtomicUsize,
        }

        impl TableSource for FlakySource {
            fn read(&self, resolution: u8) -> ResolutionTable {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first read fails");
                }
                table_with(&format!("cell-r{}", resolution), "Recovered")
            }
        }

        let cache = ResolutionCache::new(
            FlakySource {
                calls: AtomicUsize::new(0),
            },
            vec![5],
        );

        let first = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.get_table(5, false)
        }));
        assert!(first.is_err());

        assert_eq!(cache.get_table(5, false)["cell-r5"].city, "Recovered");
    }
}
