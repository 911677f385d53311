// THEORY:
// The `pipeline` module is the top-level API of the engine. It wires the core
// modules into the per-frame chain
//
//     frame -> preprocess -> FlowEstimator -> MotionSummarizer
//           -> GestureClassifier -> ParameterController -> report
//
// and exposes it at two levels:
//
// 1.  `HandmotionPipeline::process_frame` is a plain step function. It takes the
//     previous and current grayscale frames plus the current `ControllerState` and
//     returns a `FrameReport` holding the next state. It owns no frame history and no
//     display state, so any host loop can drive it.
// 2.  `GestureSession` is the convenience wrapper for a single camera: it keeps the
//     previous frame, owns the `ControllerState`, and handles the reset/quit commands.
//
// Everything here is synchronous. One frame is fully processed before the next one
// is accepted.

use crate::core_modules::flow_estimator::{
    FarnebackParams, FlowEstimator, check_field_shape, check_frame_pair,
};
use crate::core_modules::gesture_classifier::{
    DEFAULT_SIGNIFICANCE_THRESHOLD, Gesture, GestureClassifier,
};
use crate::core_modules::motion_field::MotionField;
use crate::core_modules::motion_summarizer::{
    DEFAULT_NOISE_THRESHOLD, MotionSummarizer, MotionSummary,
};
use crate::core_modules::parameter_controller::{
    ControllerConfig, ControllerState, ParameterController,
};
use crate::error::{HandmotionError, Result};
use image::{GrayImage, Luma, RgbImage, imageops};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

// Re-export key data structures for the public API.
pub use crate::core_modules::motion_summarizer::{AggregateMotion, SignificanceMask};

const KEY_ESCAPE: i32 = 27;
const KEY_SPACE: i32 = 32;

/// Thresholds for the summarizer and classifier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Per-pixel magnitude a flow vector must exceed to count.
    pub noise_threshold: f32,
    /// Aggregate magnitude the mean vector must exceed to become a gesture.
    pub significance_threshold: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
        }
    }
}

/// How raw camera frames are turned into flow input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub camera_index: i32,
    /// Flip frames horizontally so the display behaves like a mirror.
    pub mirror: bool,
    /// Integer factor the grayscale frame is shrunk by before flow estimation.
    pub downscale: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            mirror: true,
            downscale: 2,
        }
    }
}

/// Configuration for the whole engine. Every field has a default, so an empty
/// TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub motion: MotionConfig,
    pub controller: ControllerConfig,
    pub flow: FarnebackParams,
    pub capture: CaptureConfig,
}

impl PipelineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| HandmotionError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.downscale == 0 {
            return Err(HandmotionError::InvalidConfig(
                "capture.downscale must be at least 1".into(),
            ));
        }
        if self.motion.noise_threshold < 0.0 || self.motion.significance_threshold < 0.0 {
            return Err(HandmotionError::InvalidConfig(
                "motion thresholds must not be negative".into(),
            ));
        }
        if self.controller.brightness_step <= 0.0 || self.controller.contrast_step <= 0.0 {
            return Err(HandmotionError::InvalidConfig(
                "controller steps must be positive".into(),
            ));
        }
        if self.controller.contrast_min >= self.controller.contrast_max {
            return Err(HandmotionError::InvalidConfig(
                "controller.contrast_min must be below contrast_max".into(),
            ));
        }
        Ok(())
    }
}

/// A raw frame after preprocessing.
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    /// The (possibly mirrored) full-resolution frame to render onto.
    pub display: RgbImage,
    /// Downscaled grayscale frame for flow estimation.
    pub gray: GrayImage,
}

/// Mirrors, converts to grayscale and downscales a raw frame.
pub fn preprocess(frame: &RgbImage, capture: &CaptureConfig) -> PreparedFrame {
    let display = if capture.mirror {
        imageops::flip_horizontal(frame)
    } else {
        frame.clone()
    };
    let gray = downscale_area(&to_gray(&display), capture.downscale);
    PreparedFrame { display, gray }
}

/// Rec. 601 luma, the weighting camera pipelines use for BGR/RGB to gray.
pub fn to_gray(frame: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(frame.width(), frame.height());
    for (out, pixel) in gray.pixels_mut().zip(frame.pixels()) {
        let [r, g, b] = pixel.0;
        let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        *out = Luma([luma.round().clamp(0.0, 255.0) as u8]);
    }
    gray
}

/// Shrinks an image by an integer factor, averaging each `factor x factor` block.
/// Trailing rows and columns that do not fill a block are dropped.
pub fn downscale_area(gray: &GrayImage, factor: u32) -> GrayImage {
    if factor <= 1 {
        return gray.clone();
    }
    let (width, height) = (gray.width() / factor, gray.height() / factor);
    let area = factor * factor;
    GrayImage::from_fn(width, height, |x, y| {
        let mut sum = 0u32;
        for dy in 0..factor {
            for dx in 0..factor {
                sum += gray.get_pixel(x * factor + dx, y * factor + dy).0[0] as u32;
            }
        }
        Luma([((sum + area / 2) / area) as u8])
    })
}

/// The outcome of one step.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub field: MotionField,
    pub summary: MotionSummary,
    pub gesture: Gesture,
    /// The state after this frame's gesture was applied.
    pub state: ControllerState,
    /// Whether the gesture actually moved an offset.
    pub state_changed: bool,
}

impl FrameReport {
    pub fn aggregate(&self) -> &AggregateMotion {
        &self.summary.aggregate
    }
}

/// The per-frame motion-to-gesture decision chain.
pub struct HandmotionPipeline<E> {
    estimator: E,
    summarizer: MotionSummarizer,
    classifier: GestureClassifier,
    controller: ParameterController,
    config: PipelineConfig,
}

impl<E: FlowEstimator> HandmotionPipeline<E> {
    pub fn new(config: PipelineConfig, estimator: E) -> Self {
        Self {
            estimator,
            summarizer: MotionSummarizer::new(config.motion.noise_threshold),
            classifier: GestureClassifier::new(config.motion.significance_threshold),
            controller: ParameterController::new(config.controller.clone()),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Estimates flow between two frames and runs the decision chain on it.
    pub fn process_frame(
        &mut self,
        previous: &GrayImage,
        current: &GrayImage,
        state: ControllerState,
    ) -> Result<FrameReport> {
        check_frame_pair(previous, current)?;
        let field = self.estimator.estimate(previous, current)?;
        check_field_shape(current, &field)?;
        Ok(self.analyze(field, state))
    }

    /// Runs summarizer, classifier and controller on an already estimated field.
    pub fn analyze(&self, field: MotionField, state: ControllerState) -> FrameReport {
        let summary = self.summarizer.summarize(&field);
        let gesture = self.classifier.classify(&summary.aggregate);
        let mut next = state;
        let state_changed = self.controller.apply(&mut next, gesture);
        if !gesture.is_none() {
            debug!(
                %gesture,
                magnitude = summary.aggregate.magnitude,
                angle = summary.aggregate.angle,
                significant_cells = summary.mask.count(),
                "gesture classified"
            );
        }
        FrameReport {
            field,
            summary,
            gesture,
            state: next,
            state_changed,
        }
    }
}

/// Discrete user input understood by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Continue,
    Reset,
    Quit,
}

impl Command {
    /// Maps a key code as returned by GUI toolkits: ESC quits, SPACE resets.
    pub fn from_key(key: i32) -> Self {
        match key {
            KEY_ESCAPE => Command::Quit,
            KEY_SPACE => Command::Reset,
            _ => Command::Continue,
        }
    }
}

/// A processed camera frame, ready to render.
#[derive(Debug, Clone)]
pub struct SessionFrame {
    pub display: RgbImage,
    pub report: FrameReport,
}

/// Single-camera driver state: previous frame plus the display offsets.
pub struct GestureSession<E> {
    pipeline: HandmotionPipeline<E>,
    previous: Option<GrayImage>,
    state: ControllerState,
    frames_processed: u64,
}

impl<E: FlowEstimator> GestureSession<E> {
    pub fn new(config: PipelineConfig, estimator: E) -> Self {
        info!(
            downscale = config.capture.downscale,
            mirror = config.capture.mirror,
            "starting gesture session"
        );
        Self {
            pipeline: HandmotionPipeline::new(config, estimator),
            previous: None,
            state: ControllerState::default(),
            frames_processed: 0,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn pipeline(&self) -> &HandmotionPipeline<E> {
        &self.pipeline
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Applies a user command. Returns `false` once the session should stop.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Continue => true,
            Command::Reset => {
                self.reset();
                true
            }
            Command::Quit => {
                info!(frames = self.frames_processed, "quit requested");
                false
            }
        }
    }

    /// Feeds one raw frame. The first frame only primes the session and yields
    /// `None`; every later frame is compared against its predecessor.
    pub fn feed(&mut self, frame: &RgbImage) -> Result<Option<SessionFrame>> {
        let prepared = preprocess(frame, &self.pipeline.config.capture);
        let Some(previous) = self.previous.take() else {
            self.previous = Some(prepared.gray);
            return Ok(None);
        };

        let result = self.pipeline.process_frame(&previous, &prepared.gray, self.state);
        self.previous = Some(prepared.gray);
        let report = result?;

        self.state = report.state;
        self.frames_processed += 1;
        Ok(Some(SessionFrame {
            display: prepared.display,
            report,
        }))
    }
}
