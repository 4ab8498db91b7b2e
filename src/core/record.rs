use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Sequential identity assigned when a record enters the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Caller-owned bookkeeping state. The index stores it but never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Pending,
    Seeded,
    Copied,
    SkippedDuplicate,
    Error,
}

/// Lightweight features of one file, as compared by the similarity index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub identity: Option<RecordId>,
    pub source_path: String,
    pub proposed_dest_path: Option<String>,
    pub final_path: Option<String>,
    pub file_name: String,
    pub normalized_name: String,
    pub size_bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub partial_fingerprint: Option<String>,
    /// Seconds since the Unix epoch
    pub modified_time: f64,
    pub capture_time: Option<NaiveDateTime>,
    pub status: RecordStatus,
}

impl FeatureRecord {
    pub fn new(source_path: impl Into<String>, size_bytes: u64, modified_time: f64) -> Self {
        let source_path = source_path.into();
        let file_name = Path::new(&source_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let normalized_name = normalize_name(&file_name);

        Self {
            identity: None,
            source_path,
            proposed_dest_path: None,
            final_path: None,
            file_name,
            normalized_name,
            size_bytes,
            width: None,
            height: None,
            partial_fingerprint: None,
            modified_time,
            capture_time: None,
            status: RecordStatus::Pending,
        }
    }

    pub fn with_dimensions(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.partial_fingerprint = fingerprint;
        self
    }

    pub fn with_capture_time(mut self, capture_time: Option<NaiveDateTime>) -> Self {
        self.capture_time = capture_time;
        self
    }

    pub fn with_proposed_dest(mut self, dest_path: Option<String>) -> Self {
        self.proposed_dest_path = dest_path;
        self
    }

    /// Pixel area, present only when both dimensions are known and positive.
    pub fn resolution(&self) -> Option<u64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(u64::from(w) * u64::from(h)),
            _ => None,
        }
    }

    /// Where the file ended up, falling back to where it was found.
    pub fn location(&self) -> &str {
        self.final_path.as_deref().unwrap_or(&self.source_path)
    }
}

/// Lowercased file name without its final extension.
pub fn normalize_name(file_name: &str) -> String {
    let lower = file_name.to_lowercase();
    Path::new(&lower)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or(lower)
}
