//! Weighted multi-signal similarity between two feature records.
//!
//! Each signal contributes `weight * credit`, where credit is in `0..=1`.
//! The total is capped at [`MAX_SCORE`] and rounded to two decimals. Every
//! rule depends only on absolute differences or equality, so
//! `score(a, b) == score(b, a)`.

use crate::core::record::FeatureRecord;
use chrono::SubsecRound;
use serde::Serialize;

pub const MAX_SCORE: f64 = 100.0;

const SIZE_TOLERANCE: f64 = 0.01;
const AREA_TOLERANCE: f64 = 0.05;
const CAPTURE_TOLERANCE_SECS: f64 = 300.0;
const MODIFIED_TOLERANCE_SECS: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Fingerprint,
    Size,
    Resolution,
    FileName,
    CaptureTime,
    ModifiedTime,
}

struct Rule {
    signal: Signal,
    weight: f64,
    credit: fn(&FeatureRecord, &FeatureRecord) -> Option<f64>,
}

const RULES: [Rule; 6] = [
    Rule {
        signal: Signal::Fingerprint,
        weight: 45.0,
        credit: fingerprint_credit,
    },
    Rule {
        signal: Signal::Size,
        weight: 20.0,
        credit: size_credit,
    },
    Rule {
        signal: Signal::Resolution,
        weight: 15.0,
        credit: resolution_credit,
    },
    Rule {
        signal: Signal::FileName,
        weight: 10.0,
        credit: file_name_credit,
    },
    Rule {
        signal: Signal::CaptureTime,
        weight: 5.0,
        credit: capture_time_credit,
    },
    Rule {
        signal: Signal::ModifiedTime,
        weight: 5.0,
        credit: modified_time_credit,
    },
];

/// Points one signal added to a score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contribution {
    pub signal: Signal,
    pub weight: f64,
    pub points: f64,
}

pub fn weight(signal: Signal) -> f64 {
    RULES
        .iter()
        .find(|rule| rule.signal == signal)
        .map_or(0.0, |rule| rule.weight)
}

/// Similarity of two records in `[0, 100]`.
pub fn score(left: &FeatureRecord, right: &FeatureRecord) -> f64 {
    let total: f64 = breakdown(left, right).iter().map(|c| c.points).sum();
    round2(total.min(MAX_SCORE))
}

/// Per-signal contributions, in weight-table order.
pub fn breakdown(left: &FeatureRecord, right: &FeatureRecord) -> Vec<Contribution> {
    RULES
        .iter()
        .map(|rule| Contribution {
            signal: rule.signal,
            weight: rule.weight,
            points: (rule.credit)(left, right).map_or(0.0, |credit| rule.weight * credit),
        })
        .collect()
}

/// Sequence similarity `2 * lcs / (len_a + len_b)` over characters. Two empty
/// strings are identical.
pub fn name_ratio(left: &str, right: &str) -> f64 {
    let a: Vec<char> = left.chars().collect();
    let b: Vec<char> = right.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    2.0 * previous[b.len()] as f64 / total as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn linear(difference: f64, tolerance: f64) -> Option<f64> {
    (difference < tolerance).then(|| 1.0 - difference / tolerance)
}

fn fingerprint_credit(left: &FeatureRecord, right: &FeatureRecord) -> Option<f64> {
    match (&left.partial_fingerprint, &right.partial_fingerprint) {
        (Some(a), Some(b)) if a == b => Some(1.0),
        _ => None,
    }
}

fn size_credit(left: &FeatureRecord, right: &FeatureRecord) -> Option<f64> {
    let (a, b) = (left.size_bytes, right.size_bytes);
    if a == 0 || b == 0 {
        return None;
    }
    if a == b {
        return Some(1.0);
    }
    linear(a.abs_diff(b) as f64 / a.max(b) as f64, SIZE_TOLERANCE)
}

fn resolution_credit(left: &FeatureRecord, right: &FeatureRecord) -> Option<f64> {
    let (Some(wa), Some(ha), Some(wb), Some(hb)) = (left.width, left.height, right.width, right.height)
    else {
        return None;
    };
    if wa == 0 || ha == 0 || wb == 0 || hb == 0 {
        return None;
    }
    if wa == wb && ha == hb {
        return Some(1.0);
    }

    let area_a = u64::from(wa) * u64::from(ha);
    let area_b = u64::from(wb) * u64::from(hb);
    linear(area_a.abs_diff(area_b) as f64 / area_a.max(area_b) as f64, AREA_TOLERANCE)
}

fn file_name_credit(left: &FeatureRecord, right: &FeatureRecord) -> Option<f64> {
    Some(name_ratio(
        &left.file_name.to_lowercase(),
        &right.file_name.to_lowercase(),
    ))
}

fn capture_time_credit(left: &FeatureRecord, right: &FeatureRecord) -> Option<f64> {
    let (a, b) = (left.capture_time?, right.capture_time?);
    if a.trunc_subsecs(0) == b.trunc_subsecs(0) {
        return Some(1.0);
    }
    let seconds = (a - b).num_milliseconds().unsigned_abs() as f64 / 1000.0;
    linear(seconds, CAPTURE_TOLERANCE_SECS)
}

fn modified_time_credit(left: &FeatureRecord, right: &FeatureRecord) -> Option<f64> {
    let (a, b) = (left.modified_time, right.modified_time);
    if a == b {
        return Some(1.0);
    }
    linear((a - b).abs(), MODIFIED_TOLERANCE_SECS)
}
