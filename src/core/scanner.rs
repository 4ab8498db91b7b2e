use crate::core::duplicate::{SimilarityIndex, Verdict};
use crate::core::record::{RecordId, RecordStatus};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use walkdir::WalkDir;

/// Photo and RAW extensions handled when the caller gives none.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "cr2", "nef", "arw", "tif", "tiff", "rw2", "orf", "dng", "heic", "heif",
];

/// Directory names never descended into during discovery.
pub const SYSTEM_FOLDERS: &[&str] = &[
    "windows",
    "program files",
    "program files (x86)",
    "appdata",
    "cache",
    "thumbnails",
    "tmp",
    "temp",
    "icons",
    "banners",
    "ads",
    "browser",
    "$recycle.bin",
    "system volume information",
];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    /// `completed` holds the decisions for files matched and indexed before
    /// the cancellation was observed.
    #[error("Operation cancelled after {} file(s)", completed.len())]
    Cancelled { completed: Vec<Decision> },
}

/// Lowercase and strip a leading dot, so `".JPG"` and `"jpg"` are the same.
pub fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// `extensions` must already be normalized.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext))
}

fn is_system_folder(name: &str) -> bool {
    let lower = name.to_lowercase();
    SYSTEM_FOLDERS.contains(&lower.as_str())
}

/// Files under `root` with a supported extension, in a stable order.
/// Subdirectories named like system folders are skipped.
pub fn discover_files<S: AsRef<str>>(root: &Path, extensions: &[S]) -> Result<Vec<PathBuf>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::InvalidPath {
            path: root.to_string_lossy().to_string(),
        });
    }

    let extensions = normalize_extensions(extensions);
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !is_system_folder(&entry.file_name().to_string_lossy())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Skipping unreadable entry under {}: {}", root.display(), err);
                continue;
            }
        };

        if (entry.file_type().is_file() || entry.path_is_symlink())
            && has_extension(entry.path(), &extensions)
        {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// What happened to one candidate file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub source_path: String,
    pub id: Option<RecordId>,
    pub verdict: Option<Verdict>,
    pub score: f64,
    pub matched_path: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub distinct: usize,
    pub probable: usize,
    pub duplicates: usize,
    pub errors: usize,
}

/// Counters shared by all workers of one batch.
#[derive(Debug, Default)]
pub struct Progress {
    processed: AtomicUsize,
    distinct: AtomicUsize,
    probable: AtomicUsize,
    duplicates: AtomicUsize,
    errors: AtomicUsize,
}

impl Progress {
    fn record(&self, decision: &Decision) {
        let counter = match decision.verdict {
            Some(Verdict::Distinct) => &self.distinct,
            Some(Verdict::Probable) => &self.probable,
            Some(Verdict::Duplicate) => &self.duplicates,
            None => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            distinct: self.distinct.load(Ordering::Relaxed),
            probable: self.probable.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

type DimensionProbe = Box<dyn Fn(&Path) -> Option<(u32, u32)> + Send + Sync>;
type DecisionCallback = Box<dyn Fn(&Decision) + Send + Sync>;

/// Parallel pipeline feeding candidate files through a shared index.
///
/// Each file is matched and inserted in one step, so near-identical files
/// processed by different workers still see each other.
pub struct Organizer<'a> {
    index: &'a SimilarityIndex,
    dimension_probe: Option<DimensionProbe>,
    on_decision: Option<DecisionCallback>,
    cancellation_token: Arc<AtomicBool>,
    progress: Progress,
}

impl<'a> Organizer<'a> {
    pub fn new(index: &'a SimilarityIndex) -> Self {
        Self {
            index,
            dimension_probe: None,
            on_decision: None,
            cancellation_token: Arc::new(AtomicBool::new(false)),
            progress: Progress::default(),
        }
    }

    /// Supply pixel dimensions from an external metadata layer.
    pub fn with_dimension_probe<F>(mut self, probe: F) -> Self
    where
        F: Fn(&Path) -> Option<(u32, u32)> + Send + Sync + 'static,
    {
        self.dimension_probe = Some(Box::new(probe));
        self
    }

    pub fn with_decision_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Decision) + Send + Sync + 'static,
    {
        self.on_decision = Some(Box::new(callback));
        self
    }

    pub fn with_cancellation_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancellation_token.clone()
    }

    pub fn cancel(&self) {
        self.cancellation_token.store(true, Ordering::Relaxed);
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Match and index every file, returning one decision per file in input
    /// order. Duplicates are stored as `skipped_duplicate` with the match's
    /// location as their final path. On cancellation the decisions made so
    /// far are carried by [`ScanError::Cancelled`].
    pub fn process(&self, files: &[PathBuf]) -> Result<Vec<Decision>, ScanError> {
        if self.is_cancelled() {
            return Err(ScanError::Cancelled { completed: Vec::new() });
        }

        let decisions: Vec<Option<Decision>> = files
            .par_iter()
            .map(|path| {
                if self.is_cancelled() {
                    return None;
                }

                let decision = self.process_single_file(path);
                self.progress.record(&decision);
                if let Some(callback) = &self.on_decision {
                    callback(&decision);
                }
                Some(decision)
            })
            .collect();

        let decisions: Vec<Decision> = decisions.into_iter().flatten().collect();
        if self.is_cancelled() {
            return Err(ScanError::Cancelled { completed: decisions });
        }

        Ok(decisions)
    }

    fn process_single_file(&self, path: &Path) -> Decision {
        let source_path = path.to_string_lossy().into_owned();
        let (width, height) = match self.dimension_probe.as_ref().and_then(|probe| probe(path)) {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };

        let record = match self.index.build_record(path, width, height, None, None) {
            Ok(record) => record,
            Err(err) => {
                log::warn!("Error processing {}: {}", path.display(), err);
                return Decision {
                    source_path,
                    id: None,
                    verdict: None,
                    score: 0.0,
                    matched_path: None,
                    error: Some(err.to_string()),
                };
            }
        };

        let insertion = self.index.match_and_add(record, |best, verdict, record| {
            if verdict == Verdict::Duplicate {
                record.status = RecordStatus::SkippedDuplicate;
                record.final_path = best.record.as_ref().map(|r| r.location().to_string());
            }
        });

        let matched_path = insertion
            .best
            .record
            .as_ref()
            .map(|r| r.location().to_string());

        match insertion.verdict {
            Verdict::Duplicate => log::info!(
                "Duplicate {} of {} (score {:.2})",
                source_path,
                matched_path.as_deref().unwrap_or("?"),
                insertion.best.score
            ),
            Verdict::Probable => log::info!(
                "Probable duplicate {} of {} (score {:.2})",
                source_path,
                matched_path.as_deref().unwrap_or("?"),
                insertion.best.score
            ),
            Verdict::Distinct => log::debug!("Distinct {}", source_path),
        }

        Decision {
            source_path,
            id: Some(insertion.id),
            verdict: Some(insertion.verdict),
            score: insertion.best.score,
            matched_path,
            error: None,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation_token.load(Ordering::Relaxed)
    }
}
