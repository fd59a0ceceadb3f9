//! Candidate builder: raw scene boundaries plus classifier output in,
//! duration-bounded candidates out.

use crate::candidate::{Candidate, SourceId, TimeRange};
use crate::classifier::{stronger, Classification};
use crate::config::SelectionConstraints;
use crate::error::{Result, SupercutError};
use tracing::{debug, info};

/// Tolerance for floating-point drift in duration comparisons, in seconds.
pub const TIME_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
struct RawSegment {
    range: TimeRange,
    class: Classification,
}

/// Build the candidate set of one source.
///
/// Segments shorter than `min_duration` are merged into their successor while
/// the merged span stays within `max_duration`, otherwise dropped. The merged
/// span runs from the short segment's start to the successor's end, so it
/// also covers any gap between the two boundaries. Segments
/// longer than `max_duration` are cut into `max_duration` chunks; a final
/// chunk below `min_duration` is dropped.
pub fn build_candidates(
    source: &SourceId,
    boundaries: &[TimeRange],
    classifications: &[Classification],
    constraints: &SelectionConstraints,
) -> Result<Vec<Candidate>> {
    if boundaries.len() != classifications.len() {
        return Err(SupercutError::ContractViolation(format!(
            "{}: {} scene boundaries but {} classifications",
            source,
            boundaries.len(),
            classifications.len()
        )));
    }
    validate_boundaries(source, boundaries)?;
    validate_classifications(source, classifications)?;

    let min = constraints.min_duration;
    let max = constraints.max_duration;

    let mut candidates = Vec::with_capacity(boundaries.len());
    let mut pending: Option<RawSegment> = None;
    let mut dropped = 0usize;

    for (&range, &class) in boundaries.iter().zip(classifications) {
        let current = RawSegment { range, class };

        let current = match pending.take() {
            Some(short) => {
                let span = TimeRange {
                    start: short.range.start,
                    end: current.range.end,
                };
                if span.duration() <= max + TIME_EPSILON {
                    RawSegment {
                        range: span,
                        class: stronger(short.class, current.class),
                    }
                } else {
                    debug!(
                        source = %source,
                        start = short.range.start,
                        end = short.range.end,
                        "dropping short segment, merge would exceed max duration"
                    );
                    dropped += 1;
                    current
                }
            }
            None => current,
        };

        let duration = current.range.duration();
        if duration < min - TIME_EPSILON {
            pending = Some(current);
        } else if duration <= max + TIME_EPSILON {
            candidates.push(to_candidate(source, current.range, current.class));
        } else {
            dropped += split_long_segment(source, current, min, max, &mut candidates);
        }
    }

    if let Some(short) = pending {
        debug!(
            source = %source,
            start = short.range.start,
            end = short.range.end,
            "dropping trailing short segment"
        );
        dropped += 1;
    }

    info!(
        source = %source,
        boundaries = boundaries.len(),
        candidates = candidates.len(),
        dropped,
        "built candidates"
    );
    Ok(candidates)
}

/// Cut a long segment into consecutive `max` chunks. Returns the number of
/// dropped remainders (0 or 1).
fn split_long_segment(
    source: &SourceId,
    segment: RawSegment,
    min: f64,
    max: f64,
    out: &mut Vec<Candidate>,
) -> usize {
    let end = segment.range.end;
    let mut cursor = segment.range.start;

    while end - cursor > max + TIME_EPSILON {
        let chunk = TimeRange {
            start: cursor,
            end: cursor + max,
        };
        out.push(to_candidate(source, chunk, segment.class));
        cursor += max;
    }

    let rest = end - cursor;
    if rest >= min - TIME_EPSILON && rest > 0.0 {
        out.push(to_candidate(
            source,
            TimeRange { start: cursor, end },
            segment.class,
        ));
        0
    } else {
        debug!(source = %source, start = cursor, end, "dropping short split remainder");
        1
    }
}

fn to_candidate(source: &SourceId, range: TimeRange, class: Classification) -> Candidate {
    Candidate::new(source.clone(), range, class.label, class.confidence)
}

fn validate_boundaries(source: &SourceId, boundaries: &[TimeRange]) -> Result<()> {
    for (i, range) in boundaries.iter().enumerate() {
        if !range.start.is_finite() || !range.end.is_finite() || range.end <= range.start {
            return Err(SupercutError::ContractViolation(format!(
                "{}: boundary {} has invalid range {}-{}",
                source, i, range.start, range.end
            )));
        }
        if i > 0 {
            let prev = boundaries[i - 1];
            if range.start <= prev.start || range.start < prev.end {
                return Err(SupercutError::ContractViolation(format!(
                    "{}: boundary {} ({}-{}) overlaps or precedes boundary {} ({}-{})",
                    source,
                    i,
                    range.start,
                    range.end,
                    i - 1,
                    prev.start,
                    prev.end
                )));
            }
        }
    }
    Ok(())
}

fn validate_classifications(source: &SourceId, classifications: &[Classification]) -> Result<()> {
    match classifications
        .iter()
        .position(|c| !(0.0..=1.0).contains(&c.confidence))
    {
        Some(i) => Err(SupercutError::ContractViolation(format!(
            "{}: classification {} has confidence {} outside [0, 1]",
            source, i, classifications[i].confidence
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Label;

    fn constraints(min: f64, max: f64) -> SelectionConstraints {
        SelectionConstraints {
            min_duration: min,
            max_duration: max,
            ..Default::default()
        }
    }

    fn ranges(spans: &[(f64, f64)]) -> Vec<TimeRange> {
        spans.iter().map(|&(s, e)| TimeRange::new(s, e).unwrap()).collect()
    }

    fn class(label: Label, confidence: f64) -> Classification {
        Classification { label, confidence }
    }

    fn spans(candidates: &[Candidate]) -> Vec<(f64, f64)> {
        candidates.iter().map(|c| (c.start(), c.end())).collect()
    }

    #[test]
    fn test_short_segment_merges_with_successor() {
        let source = SourceId::from("a.mp4");
        let out = build_candidates(
            &source,
            &ranges(&[(0.0, 2.0), (2.0, 6.0)]),
            &[class(Label::Chase, 0.4), class(Label::Fight, 0.8)],
            &constraints(3.0, 60.0),
        )
        .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].duration(), 6.0);
        assert_eq!(out[0].label(), Label::Fight);
        assert_eq!(out[0].confidence(), 0.8);
    }

    #[test]
    fn test_short_segment_dropped_when_merge_too_long() {
        let source = SourceId::from("a.mp4");
        let out = build_candidates(
            &source,
            &ranges(&[(0.0, 2.0), (2.0, 10.0)]),
            &[class(Label::Chase, 0.9), class(Label::Fight, 0.5)],
            &constraints(3.0, 9.0),
        )
        .unwrap();

        assert_eq!(spans(&out), vec![(2.0, 10.0)]);
        assert_eq!(out[0].label(), Label::Fight);
    }

    #[test]
    fn test_chain_of_short_segments_keeps_merging() {
        let source = SourceId::from("a.mp4");
        let out = build_candidates(
            &source,
            &ranges(&[(0.0, 1.0), (1.0, 2.0), (2.0, 3.5), (3.5, 10.0)]),
            &[
                class(Label::Other, 0.1),
                class(Label::Stunt, 0.6),
                class(Label::Chase, 0.3),
                class(Label::Fight, 0.5),
            ],
            &constraints(3.0, 60.0),
        )
        .unwrap();

        assert_eq!(spans(&out), vec![(0.0, 3.5), (3.5, 10.0)]);
        assert_eq!(out[0].label(), Label::Stunt);
    }

    #[test]
    fn test_trailing_short_segment_is_dropped() {
        let source = SourceId::from("a.mp4");
        let out = build_candidates(
            &source,
            &ranges(&[(0.0, 5.0), (5.0, 6.0)]),
            &[class(Label::Chase, 0.9), class(Label::Fight, 0.5)],
            &constraints(3.0, 60.0),
        )
        .unwrap();
        assert_eq!(spans(&out), vec![(0.0, 5.0)]);
    }

    #[test]
    fn test_long_segment_is_split() {
        let source = SourceId::from("a.mp4");
        let out = build_candidates(
            &source,
            &ranges(&[(0.0, 25.0)]),
            &[class(Label::Vehicle, 0.7)],
            &constraints(3.0, 10.0),
        )
        .unwrap();

        assert_eq!(spans(&out), vec![(0.0, 10.0), (10.0, 20.0), (20.0, 25.0)]);
        assert!(out
            .iter()
            .all(|c| c.label() == Label::Vehicle && c.confidence() == 0.7));
    }

    #[test]
    fn test_split_drops_short_remainder() {
        let source = SourceId::from("a.mp4");
        let out = build_candidates(
            &source,
            &ranges(&[(0.0, 21.0)]),
            &[class(Label::Vehicle, 0.7)],
            &constraints(3.0, 10.0),
        )
        .unwrap();
        assert_eq!(spans(&out), vec![(0.0, 10.0), (10.0, 20.0)]);
    }

    #[test]
    fn test_count_mismatch_is_contract_violation() {
        let source = SourceId::from("a.mp4");
        let err = build_candidates(
            &source,
            &ranges(&[(0.0, 5.0), (5.0, 10.0)]),
            &[class(Label::Chase, 0.9)],
            &constraints(3.0, 60.0),
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_overlapping_boundaries_rejected() {
        let source = SourceId::from("a.mp4");
        let err = build_candidates(
            &source,
            &ranges(&[(0.0, 5.0), (4.0, 10.0)]),
            &[class(Label::Chase, 0.9), class(Label::Chase, 0.9)],
            &constraints(3.0, 60.0),
        )
        .unwrap_err();
        assert!(matches!(err, SupercutError::ContractViolation(_)));

        let err = build_candidates(
            &source,
            &ranges(&[(5.0, 10.0), (0.0, 4.0)]),
            &[class(Label::Chase, 0.9), class(Label::Chase, 0.9)],
            &constraints(3.0, 60.0),
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let source = SourceId::from("a.mp4");
        let err = build_candidates(
            &source,
            &ranges(&[(0.0, 5.0)]),
            &[class(Label::Chase, 1.2)],
            &constraints(3.0, 60.0),
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_gap_between_boundaries_is_allowed() {
        let source = SourceId::from("a.mp4");
        let out = build_candidates(
            &source,
            &ranges(&[(0.0, 4.0), (10.0, 15.0)]),
            &[class(Label::Chase, 0.9), class(Label::Fight, 0.5)],
            &constraints(3.0, 60.0),
        )
        .unwrap();
        assert_eq!(spans(&out), vec![(0.0, 4.0), (10.0, 15.0)]);
    }

    #[test]
    fn test_merge_across_gap_covers_the_gap() {
        let source = SourceId::from("a.mp4");
        let out = build_candidates(
            &source,
            &ranges(&[(0.0, 2.0), (5.0, 9.0)]),
            &[class(Label::Chase, 0.4), class(Label::Fight, 0.7)],
            &constraints(3.0, 60.0),
        )
        .unwrap();
        assert_eq!(spans(&out), vec![(0.0, 9.0)]);
        assert_eq!(out[0].label(), Label::Fight);

        // The gap counts against max_duration too.
        let out = build_candidates(
            &source,
            &ranges(&[(0.0, 2.0), (5.0, 9.0)]),
            &[class(Label::Chase, 0.4), class(Label::Fight, 0.7)],
            &constraints(3.0, 8.0),
        )
        .unwrap();
        assert_eq!(spans(&out), vec![(5.0, 9.0)]);
    }

    #[test]
    fn test_empty_input_yields_no_candidates() {
        let source = SourceId::from("a.mp4");
        let out = build_candidates(&source, &[], &[], &constraints(3.0, 60.0)).unwrap();
        assert!(out.is_empty());
    }
}
