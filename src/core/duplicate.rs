// Near-duplicate detection over lightweight file features:
// - inverted maps keyed by fingerprint, size, size bucket, resolution and name
// - candidate gathering limited to records sharing at least one key
// - best-match scoring and threshold classification

use crate::config::{ConfigError, IndexConfig};
use crate::core::cache::{CacheKey, FingerprintCache};
use crate::core::hash::FingerprintService;
use crate::core::record::{FeatureRecord, RecordId, RecordStatus};
use crate::core::similarity;
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to stat {path}: {source}")]
    Stat {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown record {0}")]
    UnknownRecord(RecordId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// At or above the strict threshold; suppress the file
    Duplicate,
    /// At or above the log threshold; keep it but flag for review
    Probable,
    Distinct,
}

/// Highest-scoring indexed record for a query, if any scored above zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BestMatch {
    pub score: f64,
    pub record: Option<FeatureRecord>,
}

/// Result of [`SimilarityIndex::match_and_add`].
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    pub id: RecordId,
    pub best: BestMatch,
    pub verdict: Verdict,
}

type Postings<K> = HashMap<K, BTreeSet<RecordId>>;

#[derive(Debug, Default)]
struct IndexState {
    records: Vec<FeatureRecord>,
    by_fingerprint: Postings<String>,
    by_size: Postings<u64>,
    by_size_bucket: Postings<u64>,
    by_resolution: Postings<u64>,
    by_name: Postings<String>,
}

fn size_buckets(size_bytes: u64, bucket_bytes: u64) -> impl Iterator<Item = u64> {
    let bucket = size_bytes / bucket_bytes;
    [bucket.checked_sub(1), Some(bucket), bucket.checked_add(1)]
        .into_iter()
        .flatten()
}

fn extend_from<K>(candidates: &mut BTreeSet<RecordId>, postings: &Postings<K>, key: &K)
where
    K: std::hash::Hash + Eq,
{
    if let Some(ids) = postings.get(key) {
        candidates.extend(ids.iter().copied());
    }
}

impl IndexState {
    fn get(&self, id: RecordId) -> Option<&FeatureRecord> {
        let position = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.records.get(position)
    }

    fn get_mut(&mut self, id: RecordId) -> Option<&mut FeatureRecord> {
        let position = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.records.get_mut(position)
    }

    /// Ascending identity order, which is insertion order.
    fn candidates(&self, record: &FeatureRecord, bucket_bytes: u64) -> BTreeSet<RecordId> {
        let mut candidates = BTreeSet::new();

        if let Some(fingerprint) = record.partial_fingerprint.as_ref().filter(|f| !f.is_empty()) {
            extend_from(&mut candidates, &self.by_fingerprint, fingerprint);
        }

        extend_from(&mut candidates, &self.by_size, &record.size_bytes);
        for bucket in size_buckets(record.size_bytes, bucket_bytes) {
            extend_from(&mut candidates, &self.by_size_bucket, &bucket);
        }

        if let Some(resolution) = record.resolution() {
            extend_from(&mut candidates, &self.by_resolution, &resolution);
        }

        if !record.normalized_name.is_empty() {
            extend_from(&mut candidates, &self.by_name, &record.normalized_name);
        }

        candidates
    }

    fn best_match(&self, record: &FeatureRecord, bucket_bytes: u64) -> BestMatch {
        let mut best_score = 0.0;
        let mut best: Option<&FeatureRecord> = None;

        for id in self.candidates(record, bucket_bytes) {
            let Some(candidate) = self.get(id) else {
                continue;
            };
            if candidate.source_path == record.source_path {
                continue;
            }

            let score = similarity::score(record, candidate);
            if score > best_score {
                best_score = score;
                best = Some(candidate);
            }
        }

        BestMatch {
            score: best_score,
            record: best.cloned(),
        }
    }

    fn insert(&mut self, mut record: FeatureRecord, bucket_bytes: u64) -> RecordId {
        let id = RecordId(self.records.len() as u64 + 1);
        record.identity = Some(id);

        if let Some(fingerprint) = record.partial_fingerprint.as_ref().filter(|f| !f.is_empty()) {
            self.by_fingerprint.entry(fingerprint.clone()).or_default().insert(id);
        }

        self.by_size.entry(record.size_bytes).or_default().insert(id);
        for bucket in size_buckets(record.size_bytes, bucket_bytes) {
            self.by_size_bucket.entry(bucket).or_default().insert(id);
        }

        if let Some(resolution) = record.resolution() {
            self.by_resolution.entry(resolution).or_default().insert(id);
        }

        if !record.normalized_name.is_empty() {
            self.by_name.entry(record.normalized_name.clone()).or_default().insert(id);
        }

        self.records.push(record);
        id
    }
}

/// Multi-key inverted index over every file seen during one run.
///
/// Records are owned by the index and referenced by [`RecordId`] from the
/// inverted maps. All maps live behind one lock, so a reader never observes a
/// record registered in some maps but not others.
///
/// [`find_best_match`](Self::find_best_match) followed by
/// [`add_record`](Self::add_record) is a check-then-act sequence: two workers
/// may both miss each other's near-identical file. Concurrent callers should
/// use [`match_and_add`](Self::match_and_add), which runs the whole sequence
/// under the write lock.
#[derive(Debug)]
pub struct SimilarityIndex {
    config: IndexConfig,
    fingerprints: FingerprintService,
    cache: Option<Arc<FingerprintCache>>,
    state: RwLock<IndexState>,
}

impl SimilarityIndex {
    pub fn new(config: IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;

        let cache = (config.cache_entries > 0)
            .then(|| Arc::new(FingerprintCache::new(config.cache_entries)));

        Ok(Self {
            fingerprints: FingerprintService::with_algorithm(config.digest),
            config,
            cache,
            state: RwLock::new(IndexState::default()),
        })
    }

    /// Share a fingerprint cache with other users of the same sampling budget.
    pub fn with_cache(mut self, cache: Arc<FingerprintCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn fingerprints(&self) -> &FingerprintService {
        &self.fingerprints
    }

    pub fn cache(&self) -> Option<&FingerprintCache> {
        self.cache.as_deref()
    }

    /// Stat `path` and assemble its features without registering them.
    ///
    /// Stat failure is an error; an unreadable or empty file only loses its
    /// fingerprint.
    pub fn build_record(
        &self,
        path: &Path,
        width: Option<u32>,
        height: Option<u32>,
        capture_time: Option<NaiveDateTime>,
        dest_path: Option<&str>,
    ) -> Result<FeatureRecord, IndexError> {
        let stat_error = |source| IndexError::Stat {
            path: path.display().to_string(),
            source,
        };
        let metadata = fs::metadata(path).map_err(stat_error)?;
        let modified = metadata.modified().map_err(stat_error)?;
        let size_bytes = metadata.len();

        let partial_fingerprint = if size_bytes == 0 {
            None
        } else {
            self.fingerprint(path, size_bytes, modified)
        };

        Ok(
            FeatureRecord::new(path.to_string_lossy(), size_bytes, epoch_seconds(modified))
                .with_dimensions(width, height)
                .with_capture_time(capture_time)
                .with_fingerprint(partial_fingerprint)
                .with_proposed_dest(dest_path.map(str::to_string)),
        )
    }

    fn fingerprint(&self, path: &Path, size_bytes: u64, modified: SystemTime) -> Option<String> {
        let budget = self.config.partial_fingerprint_bytes;
        let compute = || self.fingerprints.sampled_hash(path, budget);

        match &self.cache {
            Some(cache) => cache.lookup(CacheKey::new(path, size_bytes, modified), compute),
            None => compute(),
        }
    }

    /// Best-scoring indexed record for `record`, excluding any record with
    /// the same source path. Returns a zero score and no record when nothing
    /// shares a signal with the query.
    pub fn find_best_match(&self, record: &FeatureRecord) -> BestMatch {
        self.read()
            .best_match(record, self.config.effective_size_bucket_bytes())
    }

    /// Register `record` under the next identity and return it.
    pub fn add_record(&self, record: FeatureRecord) -> RecordId {
        let id = self
            .write()
            .insert(record, self.config.effective_size_bucket_bytes());
        log::debug!("Indexed record {}", id);
        id
    }

    /// Match, decide and insert as one exclusive step.
    ///
    /// `decide` sees the best match and its verdict and may update the
    /// record's bookkeeping fields before it is stored.
    pub fn match_and_add<F>(&self, mut record: FeatureRecord, decide: F) -> Insertion
    where
        F: FnOnce(&BestMatch, Verdict, &mut FeatureRecord),
    {
        let bucket_bytes = self.config.effective_size_bucket_bytes();
        let mut state = self.write();

        let best = state.best_match(&record, bucket_bytes);
        let verdict = self.classify(best.score);
        decide(&best, verdict, &mut record);
        let id = state.insert(record, bucket_bytes);

        Insertion { id, best, verdict }
    }

    pub fn classify(&self, score: f64) -> Verdict {
        self.config.classify(score)
    }

    /// Update caller-owned bookkeeping. Scoring never reads these fields.
    pub fn set_outcome(
        &self,
        id: RecordId,
        status: RecordStatus,
        final_path: Option<String>,
    ) -> Result<(), IndexError> {
        let mut state = self.write();
        let record = state.get_mut(id).ok_or(IndexError::UnknownRecord(id))?;
        record.status = status;
        record.final_path = final_path;
        Ok(())
    }

    pub fn get(&self, id: RecordId) -> Option<FeatureRecord> {
        self.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index every file under `root` whose extension is in `extensions`.
    ///
    /// Symlinks are followed when stat'ed. Files that cannot be walked or
    /// stat'ed are reported through `on_skip` and left out. Records are built in parallel but added in walk order,
    /// so identities are deterministic. Returns the number of records added.
    pub fn seed_from_directory<S>(
        &self,
        root: &Path,
        extensions: &[S],
        on_skip: Option<&(dyn Fn(&str) + Sync)>,
    ) -> usize
    where
        S: AsRef<str>,
    {
        let extensions = crate::core::scanner::normalize_extensions(extensions);
        let skip = |message: String| {
            log::warn!("{}", message);
            if let Some(callback) = on_skip {
                callback(&message);
            }
        };

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if (entry.file_type().is_file() || entry.path_is_symlink())
                        && crate::core::scanner::has_extension(path, &extensions)
                    {
                        files.push(path.to_path_buf());
                    }
                }
                Err(err) => skip(format!("Dedup seed skipped entry under {}: {}", root.display(), err)),
            }
        }

        let built: Vec<(PathBuf, Result<FeatureRecord, IndexError>)> = files
            .into_par_iter()
            .map(|path| {
                let dest = path.to_string_lossy().into_owned();
                let record = self.build_record(&path, None, None, None, Some(&dest));
                (path, record)
            })
            .collect();

        let mut added = 0;
        for (path, record) in built {
            match record {
                Ok(mut record) => {
                    record.status = RecordStatus::Seeded;
                    record.final_path = Some(record.source_path.clone());
                    self.add_record(record);
                    added += 1;
                }
                Err(err) => skip(format!("Dedup seed skipped {}: {}", path.display(), err)),
            }
        }

        log::info!("Dedup index seeded with {} existing files from {}", added, root.display());
        added
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn index() -> SimilarityIndex {
        SimilarityIndex::new(IndexConfig::default()).unwrap()
    }

    fn patterned(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| ((i * 31 + seed as usize) % 251) as u8).collect()
    }

    fn taken() -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2022, 12, 24).and_then(|d| d.and_hms_opt(18, 5, 9))
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = IndexConfig {
            strict_threshold: 150.0,
            ..IndexConfig::default()
        };
        assert!(matches!(SimilarityIndex::new(config), Err(IndexError::Config(_))));
    }

    #[test]
    fn test_empty_index_has_no_match() {
        let index = index();
        let record = FeatureRecord::new("/photos/a.jpg", 1234, 0.0);

        let best = index.find_best_match(&record);
        assert_eq!(best.score, 0.0);
        assert!(best.record.is_none());
    }

    #[test]
    fn test_build_record_collects_features() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("IMG_0001.JPG");
        fs::write(&file_path, patterned(5000, 1)).unwrap();

        let index = index();
        let record = index
            .build_record(&file_path, Some(4000), Some(3000), taken(), Some("/dest/IMG_0001.JPG"))
            .unwrap();

        assert_eq!(record.size_bytes, 5000);
        assert_eq!(record.file_name, "IMG_0001.JPG");
        assert_eq!(record.normalized_name, "img_0001");
        assert_eq!(record.resolution(), Some(12_000_000));
        assert_eq!(
            record.partial_fingerprint,
            index.fingerprints().quick(&file_path)
        );
        assert_eq!(record.proposed_dest_path.as_deref(), Some("/dest/IMG_0001.JPG"));
        assert!(record.modified_time > 0.0);
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(index.cache().map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_build_record_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = index().build_record(&temp_dir.path().join("gone.jpg"), None, None, None, None);
        assert!(matches!(result, Err(IndexError::Stat { .. })));
    }

    #[test]
    fn test_build_record_empty_file_has_no_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("empty.jpg");
        fs::write(&file_path, b"").unwrap();

        let record = index().build_record(&file_path, None, None, None, None).unwrap();
        assert!(record.partial_fingerprint.is_none());
    }

    #[test]
    fn test_add_record_assigns_sequential_ids() {
        let index = index();
        let first = index.add_record(FeatureRecord::new("/a/1.jpg", 10, 0.0));
        let second = index.add_record(FeatureRecord::new("/a/2.jpg", 20, 0.0));

        assert_eq!(first, RecordId(1));
        assert_eq!(second, RecordId(2));
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(second).and_then(|r| r.identity), Some(second));
        assert!(index.get(RecordId(0)).is_none());
    }

    #[test]
    fn test_exact_copy_matches_above_strict_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let index = index();

        let mut originals = Vec::new();
        for i in 0..5u8 {
            let path = temp_dir.path().join(format!("IMG_000{i}.jpg"));
            fs::write(&path, patterned(20_000 + i as usize * 7000, i)).unwrap();
            let record = index
                .build_record(&path, Some(4000), Some(3000), taken(), None)
                .unwrap();
            originals.push((path, index.add_record(record)));
        }

        for (path, id) in &originals {
            let name = path.file_name().unwrap().to_string_lossy().replace(".jpg", " copy.jpg");
            let copy = temp_dir.path().join(name);
            fs::copy(path, &copy).unwrap();

            let query = index
                .build_record(&copy, Some(4000), Some(3000), taken(), None)
                .unwrap();
            let best = index.find_best_match(&query);

            assert!(best.score >= index.config().strict_threshold, "score {}", best.score);
            assert_eq!(best.record.and_then(|r| r.identity), Some(*id));
            assert_eq!(index.classify(best.score), Verdict::Duplicate);
        }
    }

    #[test]
    fn test_self_match_is_excluded() {
        let index = index();
        let record = FeatureRecord::new("/photos/a.jpg", 4096, 5.0).with_fingerprint(Some("ab".into()));
        index.add_record(record.clone());

        let best = index.find_best_match(&record);
        assert_eq!(best.score, 0.0);
        assert!(best.record.is_none());
    }

    #[test]
    fn test_size_bucket_neighbours_are_candidates() {
        let index = index();
        // no shared fingerprint, name, resolution or exact size
        index.add_record(FeatureRecord::new("/a/kiwi", 65_536, 1000.0));

        let query = FeatureRecord::new("/b/plum", 131_072, 1000.0);
        let best = index.find_best_match(&query);

        assert!(best.record.is_some());
        // only the modified time matches
        assert_eq!(best.score, 5.0);

        let far = FeatureRecord::new("/b/plum", 65_536 * 4, 1000.0);
        assert!(index.find_best_match(&far).record.is_none());
    }

    #[test]
    fn test_records_sharing_no_key_are_not_candidates() {
        let index = index();
        index.add_record(FeatureRecord::new("/a/alpha.jpg", 10_000_000, 50.0));

        // same mtime would score, but nothing indexes on mtime
        let query = FeatureRecord::new("/b/omega.jpg", 100, 50.0);
        assert!(index.find_best_match(&query).record.is_none());
    }

    #[test]
    fn test_first_maximum_wins_ties() {
        let index = index();
        let first = index.add_record(FeatureRecord::new("/a/photo.jpg", 500, 0.0));
        index.add_record(FeatureRecord::new("/b/photo.jpg", 500, 0.0));

        let query = FeatureRecord::new("/c/photo.jpg", 500, 0.0);
        let best = index.find_best_match(&query);

        assert_eq!(best.score, 35.0);
        assert_eq!(best.record.and_then(|r| r.identity), Some(first));
    }

    #[test]
    fn test_match_and_add_lets_caller_decide() {
        let index = index();
        let fingerprint = Some("c".repeat(64));
        let original = FeatureRecord::new("/dest/IMG_1.jpg", 9000, 100.0)
            .with_dimensions(Some(10), Some(10))
            .with_fingerprint(fingerprint.clone());
        let first = index.match_and_add(original, |_, verdict, record| {
            assert_eq!(verdict, Verdict::Distinct);
            record.status = RecordStatus::Copied;
        });
        assert!(first.best.record.is_none());

        let candidate = FeatureRecord::new("/src/IMG_1.jpg", 9000, 100.0)
            .with_dimensions(Some(10), Some(10))
            .with_fingerprint(fingerprint);
        let second = index.match_and_add(candidate, |best, verdict, record| {
            if verdict == Verdict::Duplicate {
                record.status = RecordStatus::SkippedDuplicate;
                record.final_path = best.record.as_ref().map(|r| r.location().to_string());
            }
        });

        assert_eq!(second.verdict, Verdict::Duplicate);
        // everything but capture time
        assert_eq!(second.best.score, 95.0);
        let stored = index.get(second.id).unwrap();
        assert_eq!(stored.status, RecordStatus::SkippedDuplicate);
        assert_eq!(stored.final_path.as_deref(), Some("/dest/IMG_1.jpg"));
    }

    #[test]
    fn test_concurrent_match_and_add_finds_every_duplicate() {
        let index = index();
        let fingerprint = Some("d".repeat(64));

        let verdicts: Vec<Verdict> = (0..16)
            .into_par_iter()
            .map(|i| {
                let record = FeatureRecord::new(format!("/src/{i}/IMG_9.jpg"), 7777, 42.0)
                    .with_fingerprint(fingerprint.clone());
                index.match_and_add(record, |_, _, _| {}).verdict
            })
            .collect();

        let distinct = verdicts.iter().filter(|v| **v == Verdict::Distinct).count();
        assert_eq!(distinct, 1);
        assert_eq!(index.len(), 16);
    }

    #[test]
    fn test_set_outcome() {
        let index = index();
        let id = index.add_record(FeatureRecord::new("/a/1.jpg", 10, 0.0));

        index
            .set_outcome(id, RecordStatus::Copied, Some("/dest/1.jpg".into()))
            .unwrap();
        let stored = index.get(id).unwrap();
        assert_eq!(stored.status, RecordStatus::Copied);
        assert_eq!(stored.location(), "/dest/1.jpg");

        assert!(matches!(
            index.set_outcome(RecordId(99), RecordStatus::Error, None),
            Err(IndexError::UnknownRecord(RecordId(99)))
        ));
    }

    #[test]
    fn test_seed_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("2023").join("07");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp_dir.path().join("a.jpg"), patterned(3000, 1)).unwrap();
        fs::write(nested.join("b.JPEG"), patterned(4000, 2)).unwrap();
        fs::write(nested.join("notes.txt"), b"not a photo").unwrap();

        let index = index();
        let skipped = Mutex::new(Vec::new());
        let on_skip = |message: &str| skipped.lock().unwrap().push(message.to_string());
        let added = index.seed_from_directory(temp_dir.path(), &[".jpg", "jpeg"], Some(&on_skip));

        assert_eq!(added, 2);
        assert!(skipped.lock().unwrap().is_empty());

        let seeded = index.get(RecordId(1)).unwrap();
        assert_eq!(seeded.status, RecordStatus::Seeded);
        assert_eq!(seeded.final_path.as_deref(), Some(seeded.source_path.as_str()));
        assert_eq!(seeded.proposed_dest_path, seeded.final_path);
    }

    #[cfg(unix)]
    #[test]
    fn test_seed_skips_broken_entries() {
        let temp_dir = TempDir::new().unwrap();
        let library = temp_dir.path().join("library");
        let elsewhere = temp_dir.path().join("elsewhere");
        fs::create_dir_all(&library).unwrap();
        fs::create_dir_all(&elsewhere).unwrap();
        fs::write(elsewhere.join("real.jpg"), patterned(5000, 1)).unwrap();
        std::os::unix::fs::symlink(elsewhere.join("real.jpg"), library.join("linked.jpg")).unwrap();
        std::os::unix::fs::symlink(library.join("missing.jpg"), library.join("dangling.jpg"))
            .unwrap();

        let index = index();
        let skipped = Mutex::new(Vec::new());
        let on_skip = |message: &str| skipped.lock().unwrap().push(message.to_string());
        let added = index.seed_from_directory(&library, &["jpg"], Some(&on_skip));

        assert_eq!(added, 1);
        let record = index.get(RecordId(1)).unwrap();
        assert_eq!(record.file_name, "linked.jpg");
        assert_eq!(record.size_bytes, 5000);

        let skipped = skipped.lock().unwrap();
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].contains("dangling.jpg"), "{}", skipped[0]);
    }

    #[test]
    fn test_identical_copies_on_disk_score_full_marks() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a").join("IMG_0042.jpg");
        let second = temp_dir.path().join("b").join("IMG_0042.jpg");
        fs::create_dir_all(first.parent().unwrap()).unwrap();
        fs::create_dir_all(second.parent().unwrap()).unwrap();
        fs::write(&first, patterned(200_000, 7)).unwrap();
        fs::copy(&first, &second).unwrap();

        let taken = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let index = index();
        let mut left = index
            .build_record(&first, Some(4000), Some(3000), Some(taken), None)
            .unwrap();
        let right = index
            .build_record(&second, Some(4000), Some(3000), Some(taken), None)
            .unwrap();
        left.modified_time = right.modified_time;

        assert!(left.partial_fingerprint.is_some());
        assert_eq!(left.partial_fingerprint, right.partial_fingerprint);
        assert_eq!(similarity::score(&left, &right), 100.0);
    }

    #[test]
    fn test_seed_missing_root_reports_and_returns_zero() {
        let temp_dir = TempDir::new().unwrap();
        let index = index();
        let skipped = Mutex::new(Vec::new());
        let on_skip = |message: &str| skipped.lock().unwrap().push(message.to_string());

        let added = index.seed_from_directory(&temp_dir.path().join("nope"), &["jpg"], Some(&on_skip));

        assert_eq!(added, 0);
        assert_eq!(skipped.lock().unwrap().len(), 1);
    }
}
