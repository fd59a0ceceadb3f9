//! Scene segmentation backends.
//!
//! A segmenter turns one source video into an ordered list of scene time
//! ranges. The scene-list backend reads pre-computed scene starts from a
//! sidecar file; the `ffmpeg` feature adds a backend that runs av-scenechange
//! on the video itself.

use crate::candidate::{SourceId, TimeRange};
use crate::config::DetectorSettings;
use crate::error::{Result, SupercutError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(feature = "ffmpeg")]
pub use self::ffmpeg::AvSceneSegmenter;

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "avi", "mov"];

/// Handle on a source video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSource {
    pub id: SourceId,
    pub path: PathBuf,
    /// Human readable title, used for plan title cards
    pub title: String,
    /// Caller-supplied frame count, preferred over the decoder's
    pub total_frames: Option<usize>,
}

impl VideoSource {
    /// Derive the id from the file name and the title from the file stem.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let title = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        Self {
            id: SourceId::new(id),
            path: path.to_path_buf(),
            title,
            total_frames: None,
        }
    }

    pub fn with_total_frames(mut self, total_frames: usize) -> Self {
        self.total_frames = Some(total_frames);
        self
    }

    /// The caller's frame count when known, else `detected`. Decoder frame
    /// counts are unreliable for some containers.
    pub fn frame_count_or(&self, detected: usize) -> usize {
        match self.total_frames {
            Some(n) if n > 0 => n,
            _ => detected,
        }
    }

    /// Check the file exists and has a supported container extension.
    pub fn validate(&self) -> Result<()> {
        if !self.path.is_file() {
            return Err(self.segmentation_error(format!(
                "file does not exist: {}",
                self.path.display()
            )));
        }
        let ext = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(self.segmentation_error(format!("unsupported file format: {:?}", ext)));
        }
        Ok(())
    }

    pub fn segmentation_error(&self, reason: impl Into<String>) -> SupercutError {
        SupercutError::Segmentation {
            source_id: self.id.to_string(),
            reason: reason.into(),
        }
    }

    /// Path of a sidecar file sharing this video's stem, e.g. `movie.scenes`.
    pub fn sidecar(&self, extension: &str) -> PathBuf {
        self.path.with_extension(extension)
    }
}

pub trait SceneSegmenter: Send + Sync {
    /// Produce ordered, non-overlapping scene ranges for `source`.
    fn segment(&self, source: &VideoSource, settings: &DetectorSettings) -> Result<Vec<TimeRange>>;
}

/// One scene start read from a scene list, with the detector's cut score
/// when the list carries one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneCut {
    pub frame: usize,
    pub score: Option<f64>,
}

/// Reads scene starts from a `<stem>.scenes` sidecar.
///
/// The file holds one scene-start frame number per line, optionally followed
/// by the cut's score (`240 31.5`), and an `end=<total frames>` line. Blank
/// lines and `#` comments are ignored. Scored cuts below the detector
/// threshold are dropped; unscored cuts are always kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneListSegmenter;

impl SceneListSegmenter {
    pub const EXTENSION: &'static str = "scenes";

    fn parse(content: &str) -> std::result::Result<(Vec<SceneCut>, usize), String> {
        let mut starts = Vec::new();
        let mut total_frames = None;

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(total) = line.strip_prefix("end=") {
                let total = total
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| format!("line {}: bad frame count {:?}: {}", lineno + 1, total, e))?;
                total_frames = Some(total);
                continue;
            }
            let mut fields = line.split_whitespace();
            let frame = fields.next().unwrap_or_default();
            let frame = frame
                .parse::<usize>()
                .map_err(|e| format!("line {}: bad frame number {:?}: {}", lineno + 1, frame, e))?;
            let score = match fields.next() {
                Some(score) => Some(
                    score
                        .parse::<f64>()
                        .ok()
                        .filter(|s| s.is_finite())
                        .ok_or_else(|| format!("line {}: bad cut score {:?}", lineno + 1, score))?,
                ),
                None => None,
            };
            if fields.next().is_some() {
                return Err(format!("line {}: trailing data in {:?}", lineno + 1, line));
            }
            starts.push(SceneCut { frame, score });
        }

        let total_frames = total_frames.ok_or_else(|| "missing end=<frames> line".to_string())?;
        Ok((starts, total_frames))
    }
}

impl SceneSegmenter for SceneListSegmenter {
    fn segment(&self, source: &VideoSource, settings: &DetectorSettings) -> Result<Vec<TimeRange>> {
        source.validate()?;
        let path = source.sidecar(Self::EXTENSION);
        let content = fs::read_to_string(&path).map_err(|e| {
            source.segmentation_error(format!("failed to read {}: {}", path.display(), e))
        })?;
        let (cuts, total_frames) = Self::parse(&content)
            .map_err(|e| source.segmentation_error(format!("{}: {}", path.display(), e)))?;
        let fps = settings.fps()?;

        let starts = cuts_above_threshold(&cuts, settings.threshold);
        let starts = merge_short_scenes(&starts, total_frames, settings.min_scene_len);
        let ranges = scene_starts_to_ranges(&starts, total_frames, fps);
        debug!(
            source = %source.id,
            detector = ?settings.kind,
            threshold = settings.threshold,
            cuts = cuts.len(),
            scenes = ranges.len(),
            "loaded scene list"
        );
        Ok(ranges)
    }
}

/// Frames of the cuts that pass `threshold`.
pub fn cuts_above_threshold(cuts: &[SceneCut], threshold: f64) -> Vec<usize> {
    cuts.iter()
        .filter(|c| c.score.map_or(true, |score| score >= threshold))
        .map(|c| c.frame)
        .collect()
}

/// Drop scene starts that would leave a scene shorter than `min_len` frames,
/// folding the short scene into its predecessor.
pub fn merge_short_scenes(scene_starts: &[usize], total_frames: usize, min_len: usize) -> Vec<usize> {
    let starts = normalized_starts(scene_starts, total_frames);
    let mut result: Vec<usize> = Vec::with_capacity(starts.len());

    for &start in &starts {
        match result.last() {
            Some(&prev) if start - prev < min_len => continue,
            _ => result.push(start),
        }
    }

    // A short trailing scene is folded into the one before it.
    if result.len() > 1 {
        if let Some(&last) = result.last() {
            if total_frames - last < min_len {
                result.pop();
            }
        }
    }
    result
}

/// Convert scene-start frame numbers into second-based time ranges.
///
/// Frame 0 always starts a scene; starts at or past `total_frames` are
/// ignored.
pub fn scene_starts_to_ranges(scene_starts: &[usize], total_frames: usize, fps: f64) -> Vec<TimeRange> {
    let starts = normalized_starts(scene_starts, total_frames);
    let mut result = Vec::with_capacity(starts.len());

    for i in 0..starts.len() {
        let start = starts[i];
        let end = if i + 1 < starts.len() {
            starts[i + 1]
        } else {
            total_frames
        };
        if end <= start {
            continue;
        }
        result.push(TimeRange {
            start: start as f64 / fps,
            end: end as f64 / fps,
        });
    }
    result
}

fn normalized_starts(scene_starts: &[usize], total_frames: usize) -> Vec<usize> {
    let mut starts: Vec<usize> = scene_starts
        .iter()
        .copied()
        .filter(|&s| s < total_frames)
        .collect();

    // Ensure we always have frame 0 as first scene start
    if total_frames > 0 {
        starts.push(0);
    }
    starts.sort_unstable();
    starts.dedup();
    starts
}

#[cfg(feature = "ffmpeg")]
mod ffmpeg {
    use super::{scene_starts_to_ranges, SceneSegmenter, VideoSource};
    use crate::candidate::TimeRange;
    use crate::config::{DetectorKind, DetectorSettings};
    use crate::error::Result;
    use av_scenechange::{
        decoder::Decoder, detect_scene_changes, ffmpeg::FfmpegDecoder, DetectionOptions,
        SceneDetectionSpeed,
    };
    use tracing::{info, warn};

    /// Runs av-scenechange over an FFmpeg decoder.
    ///
    /// av-scenechange has no cut-score threshold, so `threshold` does not
    /// apply here.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AvSceneSegmenter;

    pub(super) fn detection_options(settings: &DetectorSettings) -> DetectionOptions {
        let (analysis_speed, detect_flashes, lookahead_distance) = match settings.kind {
            DetectorKind::Content => (SceneDetectionSpeed::Standard, true, 5),
            DetectorKind::Threshold => (SceneDetectionSpeed::Fast, false, 5),
            DetectorKind::Adaptive => (SceneDetectionSpeed::Standard, true, 8),
        };
        DetectionOptions {
            analysis_speed,
            detect_flashes,
            lookahead_distance,
            min_scenecut_distance: Some(settings.min_scene_len),
            ..Default::default()
        }
    }

    impl SceneSegmenter for AvSceneSegmenter {
        fn segment(&self, source: &VideoSource, settings: &DetectorSettings) -> Result<Vec<TimeRange>> {
            source.validate()?;
            let fps = settings.fps()?;
            if settings.threshold != DetectorSettings::DEFAULT_THRESHOLD {
                warn!(
                    source = %source.id,
                    threshold = settings.threshold,
                    "threshold is not supported by av-scenechange; ignoring it"
                );
            }
            let ffmpeg_dec = FfmpegDecoder::new(&source.path).map_err(|e| {
                source.segmentation_error(format!("failed to create FFmpeg decoder: {}", e))
            })?;
            let mut decoder: Decoder<std::io::Empty> = Decoder::Ffmpeg(ffmpeg_dec);

            let opts = detection_options(settings);

            let bit_depth = decoder
                .get_video_details()
                .map_err(|e| source.segmentation_error(format!("failed to get video details: {}", e)))?
                .bit_depth;

            let results = if bit_depth > 8 {
                detect_scene_changes::<std::io::Empty, u16>(&mut decoder, opts, None, None)
            } else {
                detect_scene_changes::<std::io::Empty, u8>(&mut decoder, opts, None, None)
            }
            .map_err(|e| source.segmentation_error(format!("scene detection failed: {}", e)))?;

            let total_frames = source.frame_count_or(results.frame_count);
            info!(
                source = %source.id,
                scenes = results.scene_changes.len(),
                frames = total_frames,
                detected_frames = results.frame_count,
                "scene detection complete"
            );

            Ok(scene_starts_to_ranges(&results.scene_changes, total_frames, fps))
        }
    }

}
