use crate::core::hash::{FingerprintService, Tier};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

/// File identity used as cache key. A change in size or modification time
/// produces a different key, so stale fingerprints are never returned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

impl CacheKey {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            modified,
        }
    }

    /// Build the key from a fresh stat of `path`.
    pub fn for_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::new(path, metadata.len(), metadata.modified()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub total_accesses: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
struct CacheEntry {
    digest: String,
    access_count: u64,
    // insertion order, breaks eviction ties
    sequence: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    next_sequence: u64,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn evict_least_accessed(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.access_count, entry.sequence))
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            log::debug!("Evicting cached fingerprint for {}", key.path.display());
            self.entries.remove(&key);
        }
    }
}

/// Bounded, thread-safe memoization in front of a fingerprint strategy.
///
/// When full, inserting a new key evicts the entry with the lowest access
/// count; ties go to the oldest insertion. Failed computations are not cached.
#[derive(Debug)]
pub struct FingerprintCache {
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl FingerprintCache {
    pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Return the cached fingerprint of `path`, computing it with `strategy`
    /// on a miss. A file that cannot be stat'ed yields `None`.
    pub fn get<F>(&self, path: &Path, strategy: F) -> Option<String>
    where
        F: FnOnce(&Path) -> Option<String>,
    {
        let key = match CacheKey::for_path(path) {
            Ok(key) => key,
            Err(err) => {
                log::debug!("Cannot stat {} for fingerprint cache: {}", path.display(), err);
                return None;
            }
        };

        self.lookup(key, || strategy(path))
    }

    /// [`get`](Self::get) with one of the named sampling presets.
    pub fn get_with_tier(
        &self,
        path: &Path,
        service: &FingerprintService,
        tier: Tier,
    ) -> Option<String> {
        self.get(path, |p| service.tier(p, tier))
    }

    /// Lookup for callers that already hold the file's stat information.
    pub fn lookup<F>(&self, key: CacheKey, compute: F) -> Option<String>
    where
        F: FnOnce() -> Option<String>,
    {
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            if let Some(entry) = state.entries.get_mut(&key) {
                entry.access_count += 1;
                state.hits += 1;
                return Some(entry.digest.clone());
            }
            state.misses += 1;
        }

        // computed without holding the lock
        let digest = compute()?;

        let mut guard = self.lock();
        let state = &mut *guard;
        if let Some(entry) = state.entries.get_mut(&key) {
            // another worker filled it meanwhile
            entry.access_count += 1;
            return Some(entry.digest.clone());
        }

        if state.entries.len() >= self.max_entries {
            state.evict_least_accessed();
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key,
            CacheEntry {
                digest: digest.clone(),
                access_count: 1,
                sequence,
            },
        );

        Some(digest)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&self) {
        *self.lock() = CacheState::default();
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            max_entries: self.max_entries,
            total_accesses: state.entries.values().map(|e| e.access_count).sum(),
            hits: state.hits,
            misses: state.misses,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FingerprintCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ENTRIES)
    }
}
