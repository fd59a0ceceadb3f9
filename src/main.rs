//! Action supercut planner.
//!
//! Detects scenes in one or more source videos, scores them with an action
//! classifier and writes an assembly plan (JSON) for the renderer.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use supercut::{
    Cancellation, DetectorKind, DetectorSettings, ManifestClassifier, OrderMode, Pipeline,
    PlanOptions, RunConfig, SceneListSegmenter, SceneSegmenter, SelectionConstraints,
    SupercutError, TransitionKind, TransitionStyle, VideoSource,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "supercut")]
#[command(about = "Select and order action scenes from source videos into a supercut plan")]
#[command(version)]
struct Args {
    /// Input video file(s)
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output assembly plan (JSON)
    #[arg(short, long)]
    output: PathBuf,

    /// JSON run configuration; replaces the detection, selection and plan flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write every candidate segment to this file (JSON)
    #[arg(long)]
    candidates_out: Option<PathBuf>,

    /// Read scene starts from <stem>.scenes sidecars instead of decoding the
    /// video (always the case without the ffmpeg feature)
    #[arg(long, default_value_t = false)]
    scene_lists: bool,

    /// Scene detector type
    #[arg(long, value_enum, default_value_t = DetectorKind::Content)]
    detector: DetectorKind,

    /// Minimum cut score for scored scene lists (the ffmpeg backend ignores it)
    #[arg(long, default_value_t = DetectorSettings::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Minimum scene length in frames
    #[arg(long, default_value_t = 15)]
    min_scene_len: usize,

    /// FPS numerator
    #[arg(long, required_unless_present = "config")]
    fps_num: Option<u32>,

    /// FPS denominator
    #[arg(long, required_unless_present = "config")]
    fps_den: Option<u32>,

    /// Total number of frames of each input, in input order (0 = unknown)
    #[arg(long, num_args = 1..)]
    total_frames: Vec<usize>,

    /// Target duration of the supercut in seconds
    #[arg(long, default_value_t = 300.0)]
    target_duration: f64,

    /// Minimum classifier confidence for a scene to be eligible
    #[arg(long, default_value_t = 0.3)]
    min_confidence: f64,

    /// Minimum segment duration in seconds
    #[arg(long, default_value_t = 3.0)]
    min_duration: f64,

    /// Maximum segment duration in seconds
    #[arg(long, default_value_t = 60.0)]
    max_duration: f64,

    /// Disable action category diversity
    #[arg(long, default_value_t = false)]
    no_diversity: bool,

    /// Maximum number of segments per action category
    #[arg(long)]
    max_per_label: Option<usize>,

    /// Final order of the plan entries
    #[arg(long, value_enum, default_value_t = OrderMode::Chronological)]
    order: OrderMode,

    /// Disable title overlays
    #[arg(long, default_value_t = false)]
    no_titles: bool,

    /// Disable transitions between clips
    #[arg(long, default_value_t = false)]
    no_transitions: bool,

    /// Transition effect between clips
    #[arg(long, value_enum, default_value_t = TransitionKind::Fade)]
    transition: TransitionKind,

    /// Transition length in seconds
    #[arg(long, default_value_t = 0.5)]
    transition_duration: f64,

    /// Disable audio normalization
    #[arg(long, default_value_t = false)]
    no_audio_norm: bool,

    /// Opening title card text
    #[arg(long)]
    headline: Option<String>,

    /// Show progress output
    #[arg(long, default_value_t = false)]
    progress: bool,
}

impl Args {
    fn sources(&self) -> Result<Vec<VideoSource>> {
        if !self.total_frames.is_empty() && self.total_frames.len() != self.input.len() {
            bail!(
                "--total-frames has {} values for {} inputs",
                self.total_frames.len(),
                self.input.len()
            );
        }
        Ok(self
            .input
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let source = VideoSource::from_path(path);
                match self.total_frames.get(i) {
                    Some(&frames) => source.with_total_frames(frames),
                    None => source,
                }
            })
            .collect())
    }

    fn run_config(&self) -> Result<RunConfig> {
        if let Some(path) = &self.config {
            return RunConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {:?}", path));
        }

        let config = RunConfig {
            detector: DetectorSettings {
                kind: self.detector,
                threshold: self.threshold,
                min_scene_len: self.min_scene_len,
                fps_num: self.fps_num,
                fps_den: self.fps_den,
            },
            constraints: SelectionConstraints {
                target_duration: self.target_duration,
                min_confidence: self.min_confidence,
                min_duration: self.min_duration,
                max_duration: self.max_duration,
                diversity_enabled: !self.no_diversity,
                max_per_label: self.max_per_label,
            },
            plan: PlanOptions {
                order: self.order,
                titles_enabled: !self.no_titles,
                transitions_enabled: !self.no_transitions,
                transition: TransitionStyle {
                    kind: self.transition,
                    duration: self.transition_duration,
                },
                normalize_audio: !self.no_audio_norm,
                headline: self.headline.clone(),
            },
        };
        config.validate().context("Invalid options")?;
        Ok(config)
    }
}

#[cfg(feature = "ffmpeg")]
fn segmenter(scene_lists: bool) -> Box<dyn SceneSegmenter> {
    if scene_lists {
        Box::new(SceneListSegmenter)
    } else {
        Box::new(supercut::AvSceneSegmenter)
    }
}

#[cfg(not(feature = "ffmpeg"))]
fn segmenter(_scene_lists: bool) -> Box<dyn SceneSegmenter> {
    Box::new(SceneListSegmenter)
}

fn init_tracing(progress: bool) {
    let default_level = if progress { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.progress);

    let config = args.run_config()?;
    let sources = args.sources()?;

    if args.progress {
        eprintln!(
            "Planning supercut from {} source(s) (target {:.1}s)",
            sources.len(),
            config.constraints.target_duration
        );
    }

    let pipeline = Pipeline::new(
        segmenter(args.scene_lists),
        Box::new(ManifestClassifier::new()),
        config,
    );

    let output = match pipeline.run(&sources, &Cancellation::new()) {
        Ok(output) => output,
        Err(e) if e.is_reported_outcome() => {
            report_no_selection(&e, pipeline.config());
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("Supercut planning failed"),
    };

    for skipped in &output.skipped {
        eprintln!("Skipped {}: {}", skipped.source_id, skipped.reason);
    }

    if let Some(path) = &args.candidates_out {
        let file = File::create(path)
            .with_context(|| format!("Failed to create candidates file {:?}", path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &output.store.to_vec())?;
        writeln!(writer)?;
        writer.flush()?;
    }

    output
        .plan
        .write_json(&args.output)
        .with_context(|| format!("Failed to write plan {:?}", args.output))?;

    if args.progress {
        eprintln!(
            "Selected {} of {} eligible segments ({:.1}s)",
            output.selection.len(),
            output.selection.eligible_count(),
            output.selection.total_duration()
        );
        eprintln!(
            "Wrote {} plan entries to {:?}",
            output.plan.len(),
            args.output
        );
    }

    Ok(())
}

fn report_no_selection(err: &SupercutError, config: &RunConfig) {
    let c = &config.constraints;
    eprintln!("No scenes selected for supercut: {}", err);
    eprintln!(
        "  target_duration={} min_confidence={} min_duration={} max_duration={} diversity={}",
        c.target_duration, c.min_confidence, c.min_duration, c.max_duration, c.diversity_enabled
    );
    eprintln!("Relax the constraints (e.g. lower --min-confidence) and try again.");
}
