use crate::core::duplicate::Verdict;
use crate::core::hash::DigestAlgorithm;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be within [0, 100], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("strict threshold {strict} is below log threshold {log}")]
    ThresholdOrder { strict: f64, log: f64 },

    #[error("partial fingerprint sample must be at least 1 byte")]
    EmptySample,

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tunables of a [`SimilarityIndex`](crate::core::duplicate::SimilarityIndex).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Score at or above which a file is an exact duplicate
    pub strict_threshold: f64,
    /// Score at or above which a file is flagged for review
    pub log_threshold: f64,
    pub partial_fingerprint_bytes: u64,
    pub size_bucket_bytes: u64,
    pub digest: DigestAlgorithm,
    /// Fingerprint cache capacity; 0 disables the cache
    pub cache_entries: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            strict_threshold: 90.0,
            log_threshold: 70.0,
            partial_fingerprint_bytes: 1024,
            size_bucket_bytes: 65536,
            digest: DigestAlgorithm::Sha256,
            cache_entries: 10_000,
        }
    }
}

impl IndexConfig {
    pub const MIN_SIZE_BUCKET_BYTES: u64 = 1024;

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("strict_threshold", self.strict_threshold),
            ("log_threshold", self.log_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        if self.strict_threshold < self.log_threshold {
            return Err(ConfigError::ThresholdOrder {
                strict: self.strict_threshold,
                log: self.log_threshold,
            });
        }

        if self.partial_fingerprint_bytes == 0 {
            return Err(ConfigError::EmptySample);
        }

        Ok(())
    }

    /// Bucket width actually used; small values are raised to the minimum.
    pub fn effective_size_bucket_bytes(&self) -> u64 {
        self.size_bucket_bytes.max(Self::MIN_SIZE_BUCKET_BYTES)
    }

    pub fn classify(&self, score: f64) -> Verdict {
        if score >= self.strict_threshold {
            Verdict::Duplicate
        } else if score >= self.log_threshold {
            Verdict::Probable
        } else {
            Verdict::Distinct
        }
    }
}
