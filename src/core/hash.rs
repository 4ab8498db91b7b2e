use memmap2::Mmap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Stage cutovers used by [`FingerprintService::progressive_hash`] when the
/// caller has no preference.
pub const DEFAULT_PROGRESSIVE_STAGES: [u64; 3] = [1024, 8192, 65536];

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hash computation failed: {message}")]
    ComputationFailed { message: String },
}

/// 256-bit digest used for every fingerprint produced by one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha256 => f.write_str("sha256"),
            DigestAlgorithm::Blake3 => f.write_str("blake3"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            "blake3" => Ok(DigestAlgorithm::Blake3),
            other => Err(format!("unknown digest algorithm: {other}")),
        }
    }
}

/// Named sample budgets for [`FingerprintService::sampled_hash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// 1 KiB, initial duplicate screening
    Quick,
    /// 8 KiB, most photo files
    Standard,
    /// 64 KiB, large RAW files
    Thorough,
}

impl Tier {
    pub const fn sample_bytes(self) -> u64 {
        match self {
            Tier::Quick => 1024,
            Tier::Standard => 8192,
            Tier::Thorough => 65536,
        }
    }
}

/// Digest of the first `stage` bytes of a file (or the whole file, if it
/// ended before the stage cutover).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDigest {
    pub stage: u64,
    pub digest: String,
}

#[derive(Clone)]
enum RunningDigest {
    Sha256(Sha256),
    Blake3(blake3::Hasher),
}

impl RunningDigest {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => RunningDigest::Sha256(Sha256::new()),
            DigestAlgorithm::Blake3 => RunningDigest::Blake3(blake3::Hasher::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            RunningDigest::Sha256(hasher) => hasher.update(bytes),
            RunningDigest::Blake3(hasher) => {
                hasher.update(bytes);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            RunningDigest::Sha256(hasher) => format!("{:x}", hasher.finalize()),
            RunningDigest::Blake3(hasher) => hasher.finalize().to_hex().to_string(),
        }
    }
}

/// Byte ranges hashed, in order, by a sampled fingerprint of a file of
/// `size` bytes with a budget of `max_bytes`.
///
/// Files at or below the budget are read whole. Larger files contribute the
/// first third of the budget, a middle third centred on `size / 2` once the
/// file is larger than six thirds, and the final third once it is larger than
/// two thirds.
pub fn sample_segments(size: u64, max_bytes: u64) -> Vec<Range<u64>> {
    if size <= max_bytes {
        return vec![0..size];
    }

    let third = (max_bytes / 3).max(1);
    let mut segments = vec![0..third];

    if size > third * 6 {
        let mid_start = size / 2 - third / 2;
        segments.push(mid_start..mid_start + third);
    }

    if size > third * 2 {
        segments.push(size - third..size);
    }

    segments
}

/// Content fingerprinting over bounded byte samples of a file.
///
/// Every public hashing method degrades to `None` (or an empty result) on I/O
/// failure; the `try_` variants expose the underlying error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintService {
    algorithm: DigestAlgorithm,
}

impl FingerprintService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithm(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Hash the entire content of `file_path`.
    pub fn full_read(&self, file_path: &Path) -> Option<String> {
        log_failure(file_path, self.try_full_read(file_path))
    }

    pub fn try_full_read(&self, file_path: &Path) -> Result<String, HashError> {
        let file = File::open(file_path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = RunningDigest::new(self.algorithm);
        let mut buffer = [0; 8192];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize_hex())
    }

    /// Hash a beginning/middle/end sample of at most `max_bytes` bytes.
    pub fn sampled_hash(&self, file_path: &Path, max_bytes: u64) -> Option<String> {
        log_failure(file_path, self.try_sampled_hash(file_path, max_bytes))
    }

    pub fn try_sampled_hash(&self, file_path: &Path, max_bytes: u64) -> Result<String, HashError> {
        let file = File::open(file_path)?;
        let size = file.metadata()?.len();

        if size <= max_bytes {
            return self.try_full_read(file_path);
        }

        // SAFETY: the map is read-only and dropped before returning. The length
        // is only checked once at map time; a file truncated by another process
        // while it is being sampled can still fault.
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() as u64 != size {
            return Err(HashError::ComputationFailed {
                message: format!("{} changed size while sampling", file_path.display()),
            });
        }

        let mut hasher = RunningDigest::new(self.algorithm);
        for segment in sample_segments(size, max_bytes) {
            hasher.update(&mmap[segment.start as usize..segment.end as usize]);
        }

        Ok(hasher.finalize_hex())
    }

    pub fn quick(&self, file_path: &Path) -> Option<String> {
        self.tier(file_path, Tier::Quick)
    }

    pub fn standard(&self, file_path: &Path) -> Option<String> {
        self.tier(file_path, Tier::Standard)
    }

    pub fn thorough(&self, file_path: &Path) -> Option<String> {
        self.tier(file_path, Tier::Thorough)
    }

    pub fn tier(&self, file_path: &Path, tier: Tier) -> Option<String> {
        self.sampled_hash(file_path, tier.sample_bytes())
    }

    /// One digest per stage, each covering every byte read up to that stage.
    ///
    /// Reading stops at end of file: the stage that reaches it hashes the
    /// whole file and later stages are omitted. Returns an empty list on I/O
    /// failure or when `stages` is not strictly increasing.
    pub fn progressive_hash(&self, file_path: &Path, stages: &[u64]) -> Vec<StageDigest> {
        log_failure(file_path, self.try_progressive_hash(file_path, stages)).unwrap_or_default()
    }

    pub fn try_progressive_hash(
        &self,
        file_path: &Path,
        stages: &[u64],
    ) -> Result<Vec<StageDigest>, HashError> {
        if stages.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(HashError::ComputationFailed {
                message: format!("progressive stages must be strictly increasing: {stages:?}"),
            });
        }

        let file = File::open(file_path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut hasher = RunningDigest::new(self.algorithm);
        let mut consumed = 0u64;
        let mut digests = Vec::with_capacity(stages.len());
        let mut chunk = Vec::new();

        for &stage in stages {
            chunk.clear();
            if file_size <= stage {
                reader.read_to_end(&mut chunk)?;
                hasher.update(&chunk);
                digests.push(StageDigest {
                    stage,
                    digest: hasher.clone().finalize_hex(),
                });
                break;
            }

            (&mut reader).take(stage - consumed).read_to_end(&mut chunk)?;
            hasher.update(&chunk);
            consumed = stage;
            digests.push(StageDigest {
                stage,
                digest: hasher.clone().finalize_hex(),
            });
        }

        Ok(digests)
    }

    /// Fingerprint many files in parallel, preserving input order.
    pub fn hash_batch(&self, file_paths: &[PathBuf], tier: Tier) -> Vec<(PathBuf, Option<String>)> {
        file_paths
            .par_iter()
            .map(|path| (path.clone(), self.tier(path, tier)))
            .collect()
    }
}

/// Byte-for-byte comparison that checks sizes first and compares in
/// `chunk_bytes` blocks. Any I/O failure counts as "not identical".
pub fn files_identical(first: &Path, second: &Path, chunk_bytes: usize) -> bool {
    match try_files_identical(first, second, chunk_bytes.max(1)) {
        Ok(identical) => identical,
        Err(err) => {
            log::debug!(
                "Comparison of {} and {} failed: {}",
                first.display(),
                second.display(),
                err
            );
            false
        }
    }
}

fn try_files_identical(first: &Path, second: &Path, chunk_bytes: usize) -> std::io::Result<bool> {
    let first_file = File::open(first)?;
    let second_file = File::open(second)?;
    if first_file.metadata()?.len() != second_file.metadata()?.len() {
        return Ok(false);
    }

    let mut left = BufReader::new(first_file);
    let mut right = BufReader::new(second_file);
    let mut left_buf = vec![0; chunk_bytes];
    let mut right_buf = vec![0; chunk_bytes];

    loop {
        let left_read = read_full(&mut left, &mut left_buf)?;
        let right_read = read_full(&mut right, &mut right_buf)?;
        if left_read != right_read || left_buf[..left_read] != right_buf[..right_read] {
            return Ok(false);
        }
        if left_read == 0 {
            return Ok(true);
        }
    }
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn log_failure<T>(file_path: &Path, result: Result<T, HashError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            log::debug!("No fingerprint for {}: {}", file_path.display(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn sha256_hex(parts: &[&[u8]]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        format!("{:x}", hasher.finalize())
    }

    #[test]
    fn test_sample_segments_small_file_reads_everything() {
        assert_eq!(sample_segments(0, 1024), vec![0..0]);
        assert_eq!(sample_segments(1024, 1024), vec![0..1024]);
    }

    #[test]
    fn test_sample_segments_skip_middle_until_six_thirds() {
        // third = 341; 1500 <= 6 * 341 so only beginning and end qualify
        assert_eq!(sample_segments(1500, 1024), vec![0..341, 1159..1500]);
    }

    #[test]
    fn test_sample_segments_large_file_uses_three_segments() {
        let segments = sample_segments(10_000, 1024);
        assert_eq!(segments, vec![0..341, 4830..5171, 9659..10_000]);
    }

    #[test]
    fn test_full_read_matches_sha256_of_content() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.jpg");
        fs::write(&file_path, b"Hello, World!").unwrap();

        let service = FingerprintService::new();
        let hash = service.full_read(&file_path).unwrap();

        assert_eq!(hash, sha256_hex(&[b"Hello, World!"]));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sampled_hash_hashes_segments_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("large.cr2");
        let data = patterned(10_000);
        fs::write(&file_path, &data).unwrap();

        let service = FingerprintService::new();
        let expected = sha256_hex(&[&data[0..341], &data[4830..5171], &data[9659..10_000]]);

        assert_eq!(service.quick(&file_path).unwrap(), expected);
    }

    #[test]
    fn test_sampled_hash_small_file_equals_full_read() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("small.png");
        fs::write(&file_path, patterned(900)).unwrap();

        let service = FingerprintService::new();
        assert_eq!(service.quick(&file_path), service.full_read(&file_path));
    }

    #[test]
    fn test_sampled_hash_ignores_unsampled_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let original = temp_dir.path().join("a.jpg");
        let altered = temp_dir.path().join("b.jpg");
        let data = patterned(10_000);
        let mut changed = data.clone();
        changed[2000] ^= 0xff;
        fs::write(&original, &data).unwrap();
        fs::write(&altered, &changed).unwrap();

        let service = FingerprintService::new();
        assert_eq!(service.quick(&original), service.quick(&altered));
        assert_ne!(service.thorough(&original), service.thorough(&altered));
    }

    #[test]
    fn test_missing_file_yields_no_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone.jpg");

        let service = FingerprintService::new();
        assert!(service.full_read(&missing).is_none());
        assert!(service.standard(&missing).is_none());
        assert!(service.progressive_hash(&missing, &DEFAULT_PROGRESSIVE_STAGES).is_empty());
        assert!(matches!(
            service.try_sampled_hash(&missing, 1024),
            Err(HashError::Io(_))
        ));
    }

    #[test]
    fn test_progressive_hash_stages_are_cumulative_prefixes() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("raw.nef");
        let data = patterned(100_000);
        fs::write(&file_path, &data).unwrap();

        let service = FingerprintService::new();
        let stages = service.progressive_hash(&file_path, &DEFAULT_PROGRESSIVE_STAGES);

        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].stage, 1024);
        assert_eq!(stages[0].digest, sha256_hex(&[&data[..1024]]));
        assert_eq!(stages[1].digest, sha256_hex(&[&data[..8192]]));
        assert_eq!(stages[2].digest, sha256_hex(&[&data[..65536]]));
    }

    #[test]
    fn test_progressive_hash_stops_at_end_of_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("small.jpg");
        let data = patterned(5000);
        fs::write(&file_path, &data).unwrap();

        let service = FingerprintService::new();
        let stages = service.progressive_hash(&file_path, &DEFAULT_PROGRESSIVE_STAGES);

        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].stage, 8192);
        assert_eq!(stages[1].digest, sha256_hex(&[&data]));
    }

    #[test]
    fn test_progressive_hash_rejects_unordered_stages() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("a.jpg");
        fs::write(&file_path, patterned(100)).unwrap();

        let service = FingerprintService::new();
        assert!(service.progressive_hash(&file_path, &[8192, 1024]).is_empty());
    }

    #[test]
    fn test_blake3_differs_from_sha256() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("a.jpg");
        fs::write(&file_path, patterned(3000)).unwrap();

        let sha = FingerprintService::new().quick(&file_path).unwrap();
        let blake = FingerprintService::with_algorithm(DigestAlgorithm::Blake3)
            .quick(&file_path)
            .unwrap();

        assert_eq!(blake.len(), 64);
        assert_ne!(sha, blake);
    }

    #[test]
    fn test_batch_hashing_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = temp_dir.path().join("file1.jpg");
        let file2 = temp_dir.path().join("file2.jpg");
        let missing = temp_dir.path().join("missing.jpg");
        fs::write(&file1, b"Content 1").unwrap();
        fs::write(&file2, b"Content 2").unwrap();

        let service = FingerprintService::new();
        let results = service.hash_batch(&[file1.clone(), missing.clone(), file2.clone()], Tier::Quick);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, file1);
        assert!(results[0].1.is_some());
        assert!(results[1].1.is_none());
        assert_ne!(results[0].1, results[2].1);
    }

    #[test]
    fn test_files_identical() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = temp_dir.path().join("file1.jpg");
        let file2 = temp_dir.path().join("file2.jpg");
        let file3 = temp_dir.path().join("file3.jpg");
        let data = patterned(20_000);
        let mut tail_changed = data.clone();
        tail_changed[19_999] ^= 1;
        fs::write(&file1, &data).unwrap();
        fs::write(&file2, &data).unwrap();
        fs::write(&file3, &tail_changed).unwrap();

        assert!(files_identical(&file1, &file2, 4096));
        assert!(!files_identical(&file1, &file3, 4096));
        assert!(!files_identical(&file1, &temp_dir.path().join("missing"), 4096));
    }

    #[test]
    fn test_digest_algorithm_parsing() {
        assert_eq!("SHA256".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Sha256));
        assert_eq!("blake3".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Blake3));
        assert!("md5".parse::<DigestAlgorithm>().is_err());
    }
}
