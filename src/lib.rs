//! Near-duplicate detection for photo collections.
//!
//! Files are reduced to cheap features (sampled content fingerprint, size,
//! resolution, name, capture and modification time), indexed under several
//! keys, and compared with a weighted similarity score.

pub mod config;
pub mod core;

pub use config::{ConfigError, IndexConfig};
pub use crate::core::cache::{CacheKey, CacheStats, FingerprintCache};
pub use crate::core::duplicate::{BestMatch, IndexError, Insertion, SimilarityIndex, Verdict};
pub use crate::core::hash::{DigestAlgorithm, FingerprintService, HashError, StageDigest, Tier};
pub use crate::core::record::{FeatureRecord, RecordId, RecordStatus};
pub use crate::core::scanner::{Decision, Organizer, ProgressSnapshot, ScanError};
