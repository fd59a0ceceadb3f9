//! Action supercut planning.
//!
//! Source videos are cut into scenes, each scene is labelled with an action
//! category and confidence, and a duration-budgeted, category-balanced
//! subset is selected and ordered into an assembly plan for a renderer.
//!
//! ```text
//! videos -> SceneSegmenter -> boundaries -> build_candidates (+ SegmentClassifier)
//!        -> CandidateStore -> select -> build_plan -> AssemblyPlan
//! ```

pub mod builder;
pub mod candidate;
pub mod classifier;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod segmenter;
pub mod selector;

pub use builder::build_candidates;
pub use candidate::{Candidate, CandidateStore, Label, SourceId, TimeRange};
pub use classifier::{classify_boundaries, Classification, ManifestClassifier, SegmentClassifier};
pub use config::{
    DetectorKind, DetectorSettings, OrderMode, PlanOptions, RunConfig, SelectionConstraints,
    TransitionKind, TransitionStyle,
};
pub use error::{Result, SupercutError};
pub use pipeline::{Cancellation, Pipeline, RunOutput, SkippedSource};
pub use plan::{build_plan, AssemblyPlan, PlanEntry, SourceTitles, TitleProvider};
pub use segmenter::{SceneListSegmenter, SceneSegmenter, VideoSource};
pub use selector::{select, SelectedCandidate, SelectionResult};

#[cfg(feature = "ffmpeg")]
pub use segmenter::AvSceneSegmenter;
