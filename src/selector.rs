//! Budgeted, diversity-aware segment selection.
//!
//! Candidates are filtered, put into a total rank order and then accepted
//! greedily against the target duration. With diversity enabled a first
//! pass takes the best candidate of every label before a second pass fills
//! the remaining budget by rank.

use crate::candidate::{Candidate, Label};
use crate::config::SelectionConstraints;
use crate::error::{Result, SupercutError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// A chosen candidate and the running total it brought the selection to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedCandidate {
    pub candidate: Candidate,
    /// Sum of durations up to and including this candidate
    pub cumulative_duration: f64,
    /// Accepted as its label's representative in the diversity pass
    pub first_of_label: bool,
}

/// Candidates in acceptance order (not time order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    entries: Vec<SelectedCandidate>,
    eligible_count: usize,
}

impl SelectionResult {
    pub fn entries(&self) -> &[SelectedCandidate] {
        &self.entries
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.iter().map(|e| &e.candidate)
    }

    pub fn total_duration(&self) -> f64 {
        self.entries
            .last()
            .map(|e| e.cumulative_duration)
            .unwrap_or(0.0)
    }

    /// Number of candidates that passed the filter.
    pub fn eligible_count(&self) -> usize {
        self.eligible_count
    }

    pub fn labels(&self) -> BTreeSet<Label> {
        self.candidates().map(Candidate::label).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Total order used for ranking: confidence desc, duration desc, start asc,
/// source asc, end asc.
pub fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.confidence()
        .total_cmp(&a.confidence())
        .then_with(|| b.duration().total_cmp(&a.duration()))
        .then_with(|| a.start().total_cmp(&b.start()))
        .then_with(|| a.source_id().cmp(b.source_id()))
        .then_with(|| a.end().total_cmp(&b.end()))
}

/// Filter and rank `candidates` without selecting.
pub fn rank<'a, I>(candidates: I, constraints: &SelectionConstraints) -> Vec<&'a Candidate>
where
    I: IntoIterator<Item = &'a Candidate>,
{
    let mut ranked: Vec<&Candidate> = candidates
        .into_iter()
        .filter(|c| is_eligible(c, constraints))
        .collect();
    ranked.sort_by(|a, b| rank_order(a, b));
    ranked
}

fn is_eligible(candidate: &Candidate, constraints: &SelectionConstraints) -> bool {
    let duration = candidate.duration();
    candidate.confidence() >= constraints.min_confidence
        && duration >= constraints.min_duration - crate::builder::TIME_EPSILON
        && duration <= constraints.max_duration + crate::builder::TIME_EPSILON
}

struct Accumulator<'a> {
    constraints: &'a SelectionConstraints,
    ranked: Vec<&'a Candidate>,
    taken: Vec<bool>,
    per_label: BTreeMap<Label, usize>,
    entries: Vec<SelectedCandidate>,
    cumulative: f64,
}

impl<'a> Accumulator<'a> {
    fn new(ranked: Vec<&'a Candidate>, constraints: &'a SelectionConstraints) -> Self {
        let taken = vec![false; ranked.len()];
        Self {
            constraints,
            ranked,
            taken,
            per_label: BTreeMap::new(),
            entries: Vec::new(),
            cumulative: 0.0,
        }
    }

    fn budget_exhausted(&self) -> bool {
        self.cumulative >= self.constraints.target_duration
    }

    fn fits(&self, candidate: &Candidate) -> bool {
        self.cumulative + candidate.duration() <= self.constraints.target_duration
    }

    fn accept(&mut self, index: usize, first_of_label: bool) {
        let candidate = self.ranked[index];
        self.taken[index] = true;
        self.cumulative += candidate.duration();
        *self.per_label.entry(candidate.label()).or_insert(0) += 1;
        debug!(
            source = %candidate.source_id(),
            start = candidate.start(),
            label = %candidate.label(),
            confidence = candidate.confidence(),
            cumulative = self.cumulative,
            first_of_label,
            "accepted candidate"
        );
        self.entries.push(SelectedCandidate {
            candidate: candidate.clone(),
            cumulative_duration: self.cumulative,
            first_of_label,
        });
    }

    /// Take the best candidate of each label while budget remains; a
    /// representative may overshoot the target by its own duration.
    fn diversity_pass(&mut self) {
        for i in 0..self.ranked.len() {
            if self.budget_exhausted() {
                break;
            }
            let label = self.ranked[i].label();
            if self.per_label.contains_key(&label) {
                continue;
            }
            self.accept(i, true);
        }
    }

    /// Accept remaining candidates in rank order whenever they fit, scanning
    /// past ones that do not.
    fn fill_pass(&mut self) {
        let cap = if self.constraints.diversity_enabled {
            self.constraints.max_per_label
        } else {
            None
        };

        for i in 0..self.ranked.len() {
            if self.budget_exhausted() {
                break;
            }
            if self.taken[i] {
                continue;
            }
            let candidate = self.ranked[i];
            if let Some(cap) = cap {
                if self.per_label.get(&candidate.label()).copied().unwrap_or(0) >= cap {
                    continue;
                }
            }
            if self.fits(candidate) {
                self.accept(i, false);
            }
        }
    }
}

/// Select a duration-budgeted subset of `candidates`.
///
/// Pure and deterministic: identical inputs give identical results. Fails
/// with [`SupercutError::NoEligibleSegments`] when nothing passes the filter
/// and [`SupercutError::NoSelectionPossible`] when nothing could be accepted.
pub fn select(candidates: &[Candidate], constraints: &SelectionConstraints) -> Result<SelectionResult> {
    let ranked = rank(candidates, constraints);
    if ranked.is_empty() {
        return Err(SupercutError::NoEligibleSegments {
            candidates: candidates.len(),
            min_confidence: constraints.min_confidence,
            min_duration: constraints.min_duration,
            max_duration: constraints.max_duration,
        });
    }
    let eligible_count = ranked.len();
    debug!(
        candidates = candidates.len(),
        eligible = eligible_count,
        "ranked candidates"
    );

    let mut acc = Accumulator::new(ranked, constraints);
    if constraints.diversity_enabled {
        acc.diversity_pass();
    }
    acc.fill_pass();

    // A lone over-long candidate still makes a (one-clip) supercut.
    if acc.entries.is_empty() && constraints.target_duration > 0.0 {
        debug!("no candidate fits the budget, falling back to the top-ranked one");
        acc.accept(0, false);
    }

    if acc.entries.is_empty() {
        return Err(SupercutError::NoSelectionPossible {
            eligible: eligible_count,
            target_duration: constraints.target_duration,
        });
    }

    let result = SelectionResult {
        entries: acc.entries,
        eligible_count,
    };
    info!(
        selected = result.len(),
        eligible = eligible_count,
        total_duration = result.total_duration(),
        target_duration = constraints.target_duration,
        labels = result.labels().len(),
        "selection complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{SourceId, TimeRange};

    fn cand(source: &str, start: f64, duration: f64, label: Label, confidence: f64) -> Candidate {
        Candidate::new(
            SourceId::from(source),
            TimeRange::new(start, start + duration).unwrap(),
            label,
            confidence,
        )
    }

    fn constraints(target: f64, diversity: bool) -> SelectionConstraints {
        SelectionConstraints {
            target_duration: target,
            min_confidence: 0.3,
            min_duration: 3.0,
            max_duration: 60.0,
            diversity_enabled: diversity,
            max_per_label: None,
        }
    }

    fn picked(result: &SelectionResult) -> Vec<(Label, f64)> {
        result
            .candidates()
            .map(|c| (c.label(), c.confidence()))
            .collect()
    }

    #[test]
    fn test_diversity_scenario() {
        let candidates = vec![
            cand("m.mp4", 0.0, 10.0, Label::Chase, 0.9),
            cand("m.mp4", 20.0, 10.0, Label::Fight, 0.8),
            cand("m.mp4", 40.0, 10.0, Label::Chase, 0.7),
        ];
        let result = select(&candidates, &constraints(15.0, true)).unwrap();

        assert_eq!(picked(&result), vec![(Label::Chase, 0.9), (Label::Fight, 0.8)]);
        assert_eq!(result.total_duration(), 20.0);
        assert!(result.entries()[1].first_of_label);
    }

    #[test]
    fn test_without_diversity_pure_rank() {
        let candidates = vec![
            cand("m.mp4", 0.0, 10.0, Label::Chase, 0.9),
            cand("m.mp4", 20.0, 10.0, Label::Fight, 0.8),
            cand("m.mp4", 40.0, 5.0, Label::Chase, 0.7),
        ];
        let result = select(&candidates, &constraints(15.0, false)).unwrap();

        // The fight clip overflows; scanning continues to the 5s chase clip.
        assert_eq!(picked(&result), vec![(Label::Chase, 0.9), (Label::Chase, 0.7)]);
        assert_eq!(result.total_duration(), 15.0);
    }

    #[test]
    fn test_all_below_confidence() {
        let candidates = vec![
            cand("m.mp4", 0.0, 10.0, Label::Chase, 0.2),
            cand("m.mp4", 20.0, 10.0, Label::Fight, 0.4),
        ];
        let mut c = constraints(60.0, true);
        c.min_confidence = 0.5;
        let err = select(&candidates, &c).unwrap_err();
        assert!(matches!(err, SupercutError::NoEligibleSegments { candidates: 2, .. }));
    }

    #[test]
    fn test_single_long_candidate_accepted() {
        let candidates = vec![cand("m.mp4", 0.0, 45.0, Label::Stunt, 0.6)];
        for diversity in [true, false] {
            let result = select(&candidates, &constraints(10.0, diversity)).unwrap();
            assert_eq!(result.len(), 1);
            assert_eq!(result.total_duration(), 45.0);
        }
    }

    #[test]
    fn test_non_positive_budget_selects_nothing() {
        let candidates = vec![cand("m.mp4", 0.0, 5.0, Label::Stunt, 0.6)];
        let err = select(&candidates, &constraints(0.0, false)).unwrap_err();
        assert!(matches!(err, SupercutError::NoSelectionPossible { eligible: 1, .. }));
    }

    #[test]
    fn test_ties_broken_deterministically() {
        let candidates = vec![
            cand("b.mp4", 0.0, 5.0, Label::Chase, 0.5),
            cand("a.mp4", 0.0, 5.0, Label::Chase, 0.5),
            cand("a.mp4", 10.0, 8.0, Label::Chase, 0.5),
            cand("a.mp4", 3.0, 5.0, Label::Chase, 0.5),
        ];
        let c = constraints(100.0, false);
        let ranked: Vec<(String, f64)> = rank(&candidates, &c)
            .iter()
            .map(|c| (c.source_id().to_string(), c.start()))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("a.mp4".to_string(), 10.0),
                ("a.mp4".to_string(), 0.0),
                ("b.mp4".to_string(), 0.0),
                ("a.mp4".to_string(), 3.0),
            ]
        );

        let mut reversed = candidates.clone();
        reversed.reverse();
        assert_eq!(select(&candidates, &c).unwrap(), select(&reversed, &c).unwrap());
    }

    #[test]
    fn test_max_per_label_caps_fill_pass() {
        let candidates = vec![
            cand("m.mp4", 0.0, 5.0, Label::Chase, 0.9),
            cand("m.mp4", 10.0, 5.0, Label::Chase, 0.85),
            cand("m.mp4", 20.0, 5.0, Label::Chase, 0.8),
            cand("m.mp4", 30.0, 5.0, Label::Fight, 0.4),
        ];
        let mut c = constraints(100.0, true);
        c.max_per_label = Some(2);
        let result = select(&candidates, &c).unwrap();
        assert_eq!(
            picked(&result),
            vec![(Label::Chase, 0.9), (Label::Fight, 0.4), (Label::Chase, 0.85)]
        );
    }

    #[test]
    fn test_out_of_bounds_duration_filtered() {
        let candidates = vec![
            cand("m.mp4", 0.0, 90.0, Label::Chase, 0.9),
            cand("m.mp4", 100.0, 6.0, Label::Fight, 0.5),
        ];
        let result = select(&candidates, &constraints(30.0, false)).unwrap();
        assert_eq!(picked(&result), vec![(Label::Fight, 0.5)]);
        assert_eq!(result.eligible_count(), 1);
    }

    #[test]
    fn test_stops_once_target_reached() {
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| cand("m.mp4", i as f64 * 10.0, 5.0, Label::Chase, 0.9 - i as f64 * 0.05))
            .collect();
        let result = select(&candidates, &constraints(20.0, false)).unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result.total_duration(), 20.0);
    }
}
