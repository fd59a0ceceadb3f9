//! End-to-end run: segment and classify every source in parallel, then
//! select and plan over the merged candidate set.

use crate::builder::build_candidates;
use crate::candidate::{Candidate, CandidateStore, SourceId};
use crate::classifier::{classify_boundaries, SegmentClassifier};
use crate::config::RunConfig;
use crate::error::{Result, SupercutError};
use crate::plan::{build_plan, AssemblyPlan, SourceTitles};
use crate::segmenter::{SceneSegmenter, VideoSource};
use crate::selector::{select, SelectionResult};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared flag for aborting a run between stages.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn check(&self, stage: &'static str) -> Result<()> {
        if self.is_cancelled() {
            Err(SupercutError::Cancelled(stage))
        } else {
            Ok(())
        }
    }
}

/// A source left out of the run.
#[derive(Debug, Clone)]
pub struct SkippedSource {
    pub source_id: SourceId,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub store: CandidateStore,
    pub selection: SelectionResult,
    pub plan: AssemblyPlan,
    pub skipped: Vec<SkippedSource>,
}

pub struct Pipeline {
    segmenter: Box<dyn SceneSegmenter>,
    classifier: Box<dyn SegmentClassifier>,
    config: RunConfig,
}

impl Pipeline {
    pub fn new(
        segmenter: Box<dyn SceneSegmenter>,
        classifier: Box<dyn SegmentClassifier>,
        config: RunConfig,
    ) -> Self {
        Self {
            segmenter,
            classifier,
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Segment, classify and build candidates for one source.
    pub fn candidates_for(&self, source: &VideoSource, cancel: &Cancellation) -> Result<Vec<Candidate>> {
        cancel.check("segmentation")?;
        let boundaries = self.segmenter.segment(source, &self.config.detector)?;

        cancel.check("classification")?;
        let classifications = classify_boundaries(&*self.classifier, source, &boundaries);

        build_candidates(
            &source.id,
            &boundaries,
            &classifications,
            &self.config.constraints,
        )
    }

    /// Build the candidate store for all sources.
    ///
    /// Sources are processed in parallel; a source whose segmentation fails is
    /// skipped and reported, any other error aborts.
    pub fn collect_candidates(
        &self,
        sources: &[VideoSource],
        cancel: &Cancellation,
    ) -> Result<(CandidateStore, Vec<SkippedSource>)> {
        let mut seen = HashSet::new();
        if let Some(dup) = sources.iter().find(|s| !seen.insert(&s.id)) {
            return Err(SupercutError::InvalidConfig(format!(
                "duplicate source id {}",
                dup.id
            )));
        }

        let outcomes: Vec<(SourceId, Result<Vec<Candidate>>)> = sources
            .par_iter()
            .map(|source| (source.id.clone(), self.candidates_for(source, cancel)))
            .collect();

        let mut store = CandidateStore::new();
        let mut skipped = Vec::new();
        for (source_id, outcome) in outcomes {
            match outcome {
                Ok(candidates) => store.insert(source_id, candidates),
                Err(e) if e.is_source_local() => {
                    warn!("skipping source {}: {}", source_id, e);
                    skipped.push(SkippedSource {
                        source_id,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            sources = sources.len(),
            skipped = skipped.len(),
            candidates = store.len(),
            "candidate set complete"
        );
        Ok((store, skipped))
    }

    /// Run the whole pipeline. Nothing from a cancelled run is returned.
    pub fn run(&self, sources: &[VideoSource], cancel: &Cancellation) -> Result<RunOutput> {
        self.config.validate()?;
        cancel.check("startup")?;

        let (store, skipped) = self.collect_candidates(sources, cancel)?;
        cancel.check("candidate building")?;

        let candidates = store.to_vec();
        let selection = select(&candidates, &self.config.constraints)?;
        cancel.check("selection")?;

        let titles: SourceTitles = sources
            .iter()
            .map(|s| (s.id.clone(), s.title.clone()))
            .collect();
        let plan = build_plan(&selection, &self.config.plan, &titles)?;
        cancel.check("plan building")?;

        Ok(RunOutput {
            store,
            selection,
            plan,
            skipped,
        })
    }
}
