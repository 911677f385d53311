// THEORY:
// This file is the entry point for the `handmotion` library crate.
//
// The public API is the `pipeline` module: `HandmotionPipeline` as a per-frame step
// function, `GestureSession` as a ready-made single-camera driver, and
// `PipelineConfig` for tuning. The `core_modules` hold the individual stages
// (motion field, summarizer, classifier, controller, renderer) and the
// `FlowEstimator` seam through which a host plugs in dense optical flow.
//
// The crate does no camera or window I/O of its own; see `handmotion_tester` for an
// OpenCV host.

pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use error::{HandmotionError, Result};
