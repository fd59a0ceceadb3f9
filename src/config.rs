//! Run configuration.
//!
//! Every stage receives its slice of [`RunConfig`] as an explicit value. The
//! whole configuration can be loaded from JSON, with missing fields falling
//! back to the defaults below.

use crate::error::{Result, SupercutError};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scene detector flavour requested from the segmenter backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Content-aware cut detection.
    Content,
    /// Fixed-threshold detection, suited to fades.
    Threshold,
    /// Adaptive detection for fast camera movement.
    Adaptive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub kind: DetectorKind,
    /// Minimum cut score; cuts scored below it are ignored
    pub threshold: f64,
    /// Minimum scene length in frames
    pub min_scene_len: usize,
    /// Frame rate of the sources. No default: frame numbers are meaningless
    /// without it.
    pub fps_num: Option<u32>,
    pub fps_den: Option<u32>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            kind: DetectorKind::Content,
            threshold: Self::DEFAULT_THRESHOLD,
            min_scene_len: 15,
            fps_num: None,
            fps_den: None,
        }
    }
}

impl DetectorSettings {
    pub const DEFAULT_THRESHOLD: f64 = 27.0;

    /// Frames per second, failing when the frame rate was never set.
    pub fn fps(&self) -> Result<f64> {
        match (self.fps_num, self.fps_den) {
            (Some(num), Some(den)) if num > 0 && den > 0 => Ok(num as f64 / den as f64),
            (None, _) | (_, None) => Err(invalid(
                "frame rate is required (fps_num and fps_den)".to_string(),
            )),
            (Some(num), Some(den)) => Err(invalid(format!(
                "frame rate {}/{} must have a non-zero numerator and denominator",
                num, den
            ))),
        }
    }
}

/// Caller-supplied constraints for one selection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConstraints {
    /// Desired total output length in seconds (soft upper bound).
    pub target_duration: f64,
    /// Inclusive lower bound on classifier confidence.
    pub min_confidence: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub diversity_enabled: bool,
    /// Optional cap on selections per label, honoured when diversity is on.
    pub max_per_label: Option<usize>,
}

impl Default for SelectionConstraints {
    fn default() -> Self {
        Self {
            target_duration: 300.0,
            min_confidence: 0.3,
            min_duration: 3.0,
            max_duration: 60.0,
            diversity_enabled: true,
            max_per_label: None,
        }
    }
}

/// Final ordering of assembly plan entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrderMode {
    /// Keep selection rank order.
    Rank,
    /// Sort by source, then start time.
    Chronological,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Fade,
    Crossfade,
    Slide,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionStyle {
    pub kind: TransitionKind,
    /// Seconds
    pub duration: f64,
}

impl Default for TransitionStyle {
    fn default() -> Self {
        Self {
            kind: TransitionKind::Fade,
            duration: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanOptions {
    pub order: OrderMode,
    pub titles_enabled: bool,
    pub transitions_enabled: bool,
    pub transition: TransitionStyle,
    pub normalize_audio: bool,
    /// Opening title card shown before the first entry.
    pub headline: Option<String>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            order: OrderMode::Chronological,
            titles_enabled: true,
            transitions_enabled: true,
            transition: TransitionStyle::default(),
            normalize_audio: true,
            headline: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub detector: DetectorSettings,
    pub constraints: SelectionConstraints,
    pub plan: PlanOptions,
}

impl RunConfig {
    /// Load a configuration file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: RunConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.constraints.validate()?;

        let d = &self.detector;
        d.fps()?;
        if !d.threshold.is_finite() || d.threshold < 0.0 {
            return Err(invalid(format!("threshold {} must be non-negative", d.threshold)));
        }

        let t = &self.plan.transition;
        if !t.duration.is_finite() || t.duration < 0.0 {
            return Err(invalid(format!(
                "transition duration {} must be non-negative",
                t.duration
            )));
        }
        Ok(())
    }
}

impl SelectionConstraints {
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("target_duration", self.target_duration),
            ("min_confidence", self.min_confidence),
            ("min_duration", self.min_duration),
            ("max_duration", self.max_duration),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{} must be finite, got {}", name, value)));
        }
        if self.target_duration <= 0.0 {
            return Err(invalid(format!(
                "target_duration must be positive, got {}",
                self.target_duration
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(invalid(format!(
                "min_confidence must lie in [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.min_duration <= 0.0 {
            return Err(invalid(format!(
                "min_duration must be positive, got {}",
                self.min_duration
            )));
        }
        if self.max_duration < self.min_duration {
            return Err(invalid(format!(
                "max_duration {} is below min_duration {}",
                self.max_duration, self.min_duration
            )));
        }
        if self.max_per_label == Some(0) {
            return Err(invalid("max_per_label must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> SupercutError {
    SupercutError::InvalidConfig(msg)
}
