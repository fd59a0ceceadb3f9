//! Assembly plan: the ordered, annotated segment list handed to the renderer.

use crate::candidate::{Candidate, SourceId};
use crate::config::{OrderMode, PlanOptions, TransitionStyle};
use crate::error::{Result, SupercutError};
use crate::selector::SelectionResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Supplies the overlay text for an entry when titles are enabled.
pub trait TitleProvider {
    fn title_for(&self, candidate: &Candidate) -> String;
}

impl<F> TitleProvider for F
where
    F: Fn(&Candidate) -> String,
{
    fn title_for(&self, candidate: &Candidate) -> String {
        self(candidate)
    }
}

/// Per-source titles rendered as `"<title> - <LABEL>"`.
#[derive(Debug, Clone, Default)]
pub struct SourceTitles {
    titles: HashMap<SourceId, String>,
}

impl SourceTitles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: SourceId, title: impl Into<String>) {
        self.titles.insert(source, title.into());
    }
}

impl FromIterator<(SourceId, String)> for SourceTitles {
    fn from_iter<I: IntoIterator<Item = (SourceId, String)>>(iter: I) -> Self {
        Self {
            titles: iter.into_iter().collect(),
        }
    }
}

impl TitleProvider for SourceTitles {
    fn title_for(&self, candidate: &Candidate) -> String {
        let title = self
            .titles
            .get(candidate.source_id())
            .map(String::as_str)
            .unwrap_or_else(|| candidate.source_id().as_str());
        format!("{} - {}", title, candidate.label().as_str().to_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub candidate: Candidate,
    pub transition_before: bool,
    pub title_text: Option<String>,
    /// Offset of this entry in the compiled output, in seconds
    pub timeline_start: f64,
    /// Source-time gap since the previous entry when both come from the same
    /// source and follow each other in time
    pub gap_before: Option<f64>,
}

/// Immutable once built; a new run builds a new plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyPlan {
    entries: Vec<PlanEntry>,
    order: OrderMode,
    transition: Option<TransitionStyle>,
    normalize_audio: bool,
    headline: Option<String>,
    total_duration: f64,
}

impl AssemblyPlan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn order(&self) -> OrderMode {
        self.order
    }

    /// Transition to apply where `transition_before` is set.
    pub fn transition(&self) -> Option<TransitionStyle> {
        self.transition
    }

    pub fn normalize_audio(&self) -> bool {
        self.normalize_audio
    }

    pub fn headline(&self) -> Option<&str> {
        self.headline.as_deref()
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the plan as pretty-printed JSON.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Turn a selection into an assembly plan.
pub fn build_plan(
    selection: &SelectionResult,
    options: &PlanOptions,
    titles: &dyn TitleProvider,
) -> Result<AssemblyPlan> {
    if selection.is_empty() {
        return Err(SupercutError::EmptyPlan);
    }

    let mut ordered: Vec<&Candidate> = selection.candidates().collect();
    if options.order == OrderMode::Chronological {
        ordered.sort_by(|a, b| {
            a.source_id()
                .cmp(b.source_id())
                .then_with(|| a.start().total_cmp(&b.start()))
        });
    }

    let mut entries = Vec::with_capacity(ordered.len());
    let mut timeline = 0.0;
    let mut prev: Option<&Candidate> = None;

    for (i, candidate) in ordered.into_iter().enumerate() {
        let gap_before = prev
            .filter(|p| p.source_id() == candidate.source_id() && candidate.start() >= p.end())
            .map(|p| candidate.start() - p.end());

        entries.push(PlanEntry {
            candidate: candidate.clone(),
            transition_before: options.transitions_enabled && i > 0,
            title_text: options
                .titles_enabled
                .then(|| titles.title_for(candidate)),
            timeline_start: timeline,
            gap_before,
        });

        timeline += candidate.duration();
        prev = Some(candidate);
    }

    let plan = AssemblyPlan {
        entries,
        order: options.order,
        transition: options.transitions_enabled.then_some(options.transition),
        normalize_audio: options.normalize_audio,
        headline: options.headline.clone(),
        total_duration: timeline,
    };
    info!(
        entries = plan.len(),
        order = ?plan.order,
        total_duration = plan.total_duration,
        "assembly plan built"
    );
    Ok(plan)
}
