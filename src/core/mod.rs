pub mod cache;
pub mod duplicate;
pub mod hash;
pub mod record;
pub mod scanner;
pub mod similarity;

pub use cache::FingerprintCache;
pub use duplicate::{BestMatch, SimilarityIndex, Verdict};
pub use hash::FingerprintService;
pub use record::{FeatureRecord, RecordId, RecordStatus};
pub use scanner::Organizer;
