//! Candidate segments and the per-run segment store.

use crate::error::{Result, SupercutError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Closed set of action categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Chase,
    Fight,
    Explosion,
    Vehicle,
    Stunt,
    Shooting,
    Other,
}

impl Label {
    pub const ALL: [Label; 7] = [
        Label::Chase,
        Label::Fight,
        Label::Explosion,
        Label::Vehicle,
        Label::Stunt,
        Label::Shooting,
        Label::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Chase => "chase",
            Label::Fight => "fight",
            Label::Explosion => "explosion",
            Label::Vehicle => "vehicle",
            Label::Stunt => "stunt",
            Label::Shooting => "shooting",
            Label::Other => "other",
        }
    }

    /// Map a fine-grained action class name (as emitted by action recognition
    /// models) onto a category.
    pub fn from_action_keyword(keyword: &str) -> Label {
        let keyword = keyword.trim().to_ascii_lowercase();
        match keyword.as_str() {
            "running" | "jogging" | "sprinting" | "chasing" => Label::Chase,
            "punching" | "kicking" | "martial_arts" | "boxing" | "wrestling" => Label::Fight,
            "explosion" | "fire" | "smoke" => Label::Explosion,
            "driving_car" | "motorcycle" | "car_racing" | "helicopter" => Label::Vehicle,
            "parkour" | "climbing" | "jumping" | "falling" => Label::Stunt,
            "shooting" | "aiming" | "gun" | "rifle" => Label::Shooting,
            _ => Label::Other,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = SupercutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chase" => Ok(Label::Chase),
            "fight" => Ok(Label::Fight),
            "explosion" => Ok(Label::Explosion),
            "vehicle" => Ok(Label::Vehicle),
            "stunt" | "stunts" => Ok(Label::Stunt),
            "shooting" => Ok(Label::Shooting),
            "other" | "unknown" => Ok(Label::Other),
            other => Err(SupercutError::ContractViolation(format!(
                "unknown action label {:?}",
                other
            ))),
        }
    }
}

/// Identifier of an originating video.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Half-open interval `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() || end <= start {
            return Err(SupercutError::ContractViolation(format!(
                "invalid time range {}-{}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Length of the intersection with `other`, zero when disjoint.
    pub fn overlap(&self, other: &TimeRange) -> f64 {
        (self.end.min(other.end) - self.start.max(other.start)).max(0.0)
    }
}

/// A scored, duration-bounded segment of one source video.
///
/// Only the candidate builder creates these, so every instance already
/// satisfies the configured duration bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    source_id: SourceId,
    start: f64,
    end: f64,
    label: Label,
    confidence: f64,
}

impl Candidate {
    pub(crate) fn new(source_id: SourceId, range: TimeRange, label: Label, confidence: f64) -> Self {
        Self {
            source_id,
            start: range.start,
            end: range.end,
            label,
            confidence,
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Candidates of one run, grouped by source.
///
/// Each source's set is inserted whole and never edited afterwards; a new
/// run builds a new store.
#[derive(Debug, Clone, Default)]
pub struct CandidateStore {
    by_source: BTreeMap<SourceId, Vec<Candidate>>,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the candidate set of `source`, replacing any earlier set.
    pub fn insert(&mut self, source: SourceId, candidates: Vec<Candidate>) {
        self.by_source.insert(source, candidates);
    }

    pub fn for_source(&self, source: &SourceId) -> &[Candidate] {
        self.by_source
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceId> {
        self.by_source.keys()
    }

    /// All candidates in `(source_id, start)` order.
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.by_source.values().flatten()
    }

    pub fn to_vec(&self) -> Vec<Candidate> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_source.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(source: &str, start: f64, end: f64) -> Candidate {
        Candidate::new(
            SourceId::from(source),
            TimeRange::new(start, end).unwrap(),
            Label::Chase,
            0.5,
        )
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!("Fight".parse::<Label>().unwrap(), Label::Fight);
        assert_eq!("stunts".parse::<Label>().unwrap(), Label::Stunt);
        assert_eq!("unknown".parse::<Label>().unwrap(), Label::Other);
        assert!("dance".parse::<Label>().is_err());
    }

    #[test]
    fn test_action_keyword_mapping() {
        assert_eq!(Label::from_action_keyword("sprinting"), Label::Chase);
        assert_eq!(Label::from_action_keyword("Martial_Arts"), Label::Fight);
        assert_eq!(Label::from_action_keyword("helicopter"), Label::Vehicle);
        assert_eq!(Label::from_action_keyword("parkour"), Label::Stunt);
        assert_eq!(Label::from_action_keyword("rifle"), Label::Shooting);
        assert_eq!(Label::from_action_keyword("knitting"), Label::Other);
    }

    #[test]
    fn test_label_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Label::Explosion).unwrap(), "\"explosion\"");
        let label: Label = serde_json::from_str("\"vehicle\"").unwrap();
        assert_eq!(label, Label::Vehicle);
    }

    #[test]
    fn test_time_range_validation() {
        assert!(TimeRange::new(1.0, 2.0).is_ok());
        assert!(TimeRange::new(2.0, 2.0).is_err());
        assert!(TimeRange::new(3.0, 2.0).is_err());
        assert!(TimeRange::new(f64::NAN, 2.0).is_err());
    }

    #[test]
    fn test_time_range_overlap() {
        let a = TimeRange::new(0.0, 10.0).unwrap();
        let b = TimeRange::new(5.0, 20.0).unwrap();
        let c = TimeRange::new(10.0, 12.0).unwrap();
        assert_eq!(a.overlap(&b), 5.0);
        assert_eq!(a.overlap(&c), 0.0);
    }

    #[test]
    fn test_store_iterates_by_source() {
        let mut store = CandidateStore::new();
        store.insert("b.mp4".into(), vec![candidate("b.mp4", 0.0, 5.0)]);
        store.insert(
            "a.mp4".into(),
            vec![candidate("a.mp4", 0.0, 4.0), candidate("a.mp4", 10.0, 14.0)],
        );

        let order: Vec<(&str, f64)> = store
            .iter()
            .map(|c| (c.source_id().as_str(), c.start()))
            .collect();
        assert_eq!(order, vec![("a.mp4", 0.0), ("a.mp4", 10.0), ("b.mp4", 0.0)]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.for_source(&"b.mp4".into()).len(), 1);
        assert!(store.for_source(&"c.mp4".into()).is_empty());
    }

    #[test]
    fn test_store_insert_replaces_source() {
        let mut store = CandidateStore::new();
        store.insert("a.mp4".into(), vec![candidate("a.mp4", 0.0, 4.0)]);
        store.insert("a.mp4".into(), vec![]);
        assert!(store.is_empty());
        assert_eq!(store.sources().count(), 1);
    }
}
