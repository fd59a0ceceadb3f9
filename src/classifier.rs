//! Segment classification backends.

use crate::candidate::{Label, TimeRange};
use crate::error::{Result, SupercutError};
use crate::segmenter::VideoSource;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Label and confidence assigned to one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: Label,
    pub confidence: f64,
}

impl Classification {
    /// Stand-in for a segment the classifier could not read.
    pub const DEGRADED: Classification = Classification {
        label: Label::Other,
        confidence: 0.0,
    };
}

pub trait SegmentClassifier: Send + Sync {
    fn classify(&self, source: &VideoSource, range: TimeRange) -> Result<Classification>;
}

/// Classify every boundary of a source.
///
/// Failed ranges degrade to [`Classification::DEGRADED`] instead of failing
/// the source, so the output always has one entry per boundary.
pub fn classify_boundaries(
    classifier: &dyn SegmentClassifier,
    source: &VideoSource,
    boundaries: &[TimeRange],
) -> Vec<Classification> {
    let mut degraded = 0usize;
    let classifications: Vec<Classification> = boundaries
        .iter()
        .map(|&range| match classifier.classify(source, range) {
            Ok(c) => c,
            Err(e) => {
                warn!("{}; treating segment as unclassified", e);
                degraded += 1;
                Classification::DEGRADED
            }
        })
        .collect();

    debug!(
        source = %source.id,
        segments = boundaries.len(),
        degraded,
        "classified segments"
    );
    classifications
}

/// One row of a label manifest.
#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    start: f64,
    end: f64,
    #[serde(default)]
    label: Option<Label>,
    /// Fine-grained action class, mapped onto a label when `label` is absent
    #[serde(default)]
    action: Option<String>,
    confidence: f64,
}

impl ManifestEntry {
    fn label(&self) -> Label {
        match (&self.label, &self.action) {
            (Some(label), _) => *label,
            (None, Some(action)) => Label::from_action_keyword(action),
            (None, None) => Label::Other,
        }
    }

    fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }
}

type Manifest = Arc<std::result::Result<Vec<ManifestEntry>, String>>;

/// Looks labels up in a `<stem>.labels.json` sidecar written by an external
/// action recognition model.
///
/// A queried range takes the manifest entry it overlaps most. Manifests are
/// loaded once per source.
#[derive(Debug, Default)]
pub struct ManifestClassifier {
    cache: Mutex<HashMap<String, Manifest>>,
}

impl ManifestClassifier {
    pub const EXTENSION: &'static str = "labels.json";

    pub fn new() -> Self {
        Self::default()
    }

    fn load(source: &VideoSource) -> std::result::Result<Vec<ManifestEntry>, String> {
        let path = source.sidecar(Self::EXTENSION);
        let content = fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let entries: Vec<ManifestEntry> = serde_json::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))?;
        Ok(entries)
    }

    fn manifest(&self, source: &VideoSource) -> Manifest {
        let key = source.id.to_string();
        if let Ok(cache) = self.cache.lock() {
            if let Some(manifest) = cache.get(&key) {
                return Arc::clone(manifest);
            }
        }

        let manifest = Arc::new(Self::load(source));
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, Arc::clone(&manifest));
        }
        manifest
    }
}

impl SegmentClassifier for ManifestClassifier {
    fn classify(&self, source: &VideoSource, range: TimeRange) -> Result<Classification> {
        let error = |reason: String| SupercutError::Classification {
            source_id: source.id.to_string(),
            start: range.start,
            end: range.end,
            reason,
        };

        let manifest = self.manifest(source);
        let entries = match manifest.as_ref() {
            Ok(entries) => entries,
            Err(reason) => return Err(error(reason.clone())),
        };

        let best = entries
            .iter()
            .map(|entry| (entry, entry.range().overlap(&range)))
            .filter(|(_, overlap)| *overlap > 0.0)
            .max_by(|(a, oa), (b, ob)| {
                oa.total_cmp(ob)
                    .then_with(|| a.confidence.total_cmp(&b.confidence))
                    .then_with(|| b.start.total_cmp(&a.start))
            })
            .map(|(entry, _)| entry)
            .ok_or_else(|| error("no labelled span overlaps the segment".to_string()))?;

        if !(0.0..=1.0).contains(&best.confidence) {
            return Err(error(format!("confidence {} out of range", best.confidence)));
        }

        Ok(Classification {
            label: best.label(),
            confidence: best.confidence,
        })
    }
}

/// Order used when two classifications compete for one merged segment.
pub(crate) fn stronger(a: Classification, b: Classification) -> Classification {
    match b.confidence.total_cmp(&a.confidence) {
        Ordering::Greater => b,
        _ => a,
    }
}
