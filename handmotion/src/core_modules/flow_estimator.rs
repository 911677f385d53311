// THEORY:
// Dense optical flow is not computed by this crate. It is a capability supplied by
// the host (in practice OpenCV's Farneback implementation). This module only pins
// down the contract the rest of the engine relies on:
//
// - both inputs are single-channel frames of identical, non-zero size;
// - the output field has exactly the same width and height;
// - identical inputs always give identical output.
//
// The Farneback numeric parameters are fixed constants; they are collected in
// `FarnebackParams` so every host that wraps a Farneback implementation uses the
// same values.

use crate::core_modules::motion_field::MotionField;
use crate::error::{HandmotionError, Result};
use image::GrayImage;
use serde::Deserialize;

/// Computes a dense motion field between two consecutive grayscale frames.
pub trait FlowEstimator {
    fn estimate(&mut self, previous: &GrayImage, current: &GrayImage) -> Result<MotionField>;
}

impl<F> FlowEstimator for F
where
    F: FnMut(&GrayImage, &GrayImage) -> Result<MotionField>,
{
    fn estimate(&mut self, previous: &GrayImage, current: &GrayImage) -> Result<MotionField> {
        self(previous, current)
    }
}

/// Parameters for a Farneback dense flow estimator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FarnebackParams {
    /// Image scale between pyramid levels (< 1).
    pub pyramid_scale: f64,
    pub levels: i32,
    pub window_size: i32,
    pub iterations: i32,
    /// Pixel neighbourhood used for the polynomial expansion.
    pub poly_n: i32,
    /// Gaussian sigma for smoothing the polynomial expansion derivatives.
    pub poly_sigma: f64,
    pub flags: i32,
}

impl Default for FarnebackParams {
    fn default() -> Self {
        Self {
            pyramid_scale: 0.5,
            levels: 3,
            window_size: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.1,
            flags: 0,
        }
    }
}

/// Rejects frame pairs a flow estimator cannot work on.
pub fn check_frame_pair(previous: &GrayImage, current: &GrayImage) -> Result<()> {
    let (pw, ph) = previous.dimensions();
    if pw == 0 || ph == 0 {
        return Err(HandmotionError::EmptyField {
            width: pw,
            height: ph,
        });
    }
    if previous.dimensions() != current.dimensions() {
        return Err(HandmotionError::FrameMismatch {
            previous: previous.dimensions(),
            current: current.dimensions(),
        });
    }
    Ok(())
}

/// Rejects an estimator result whose shape does not match its input frames.
pub fn check_field_shape(frames: &GrayImage, field: &MotionField) -> Result<()> {
    if frames.dimensions() != field.dimensions() {
        return Err(HandmotionError::FlowShapeMismatch {
            expected: frames.dimensions(),
            actual: field.dimensions(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::motion_field::FlowVector;

    #[test]
    fn default_params_match_fixed_constants() {
        let p = FarnebackParams::default();
        assert_eq!(p.pyramid_scale, 0.5);
        assert_eq!(p.levels, 3);
        assert_eq!(p.window_size, 15);
        assert_eq!(p.iterations, 3);
        assert_eq!(p.poly_n, 5);
        assert_eq!(p.poly_sigma, 1.1);
        assert_eq!(p.flags, 0);
    }

    #[test]
    fn frame_pair_checks() {
        let a = GrayImage::new(4, 3);
        let b = GrayImage::new(4, 3);
        let c = GrayImage::new(3, 4);
        assert!(check_frame_pair(&a, &b).is_ok());
        assert!(matches!(
            check_frame_pair(&a, &c),
            Err(HandmotionError::FrameMismatch { .. })
        ));
        assert!(matches!(
            check_frame_pair(&GrayImage::new(0, 0), &GrayImage::new(0, 0)),
            Err(HandmotionError::EmptyField { .. })
        ));
    }

    #[test]
    fn closures_are_estimators() {
        let mut calls = 0;
        let mut estimator = |prev: &GrayImage, _: &GrayImage| {
            calls += 1;
            let (w, h) = prev.dimensions();
            MotionField::uniform(w, h, FlowVector::new(1.0, 0.0))
        };
        let frame = GrayImage::new(2, 2);
        let field = estimator.estimate(&frame, &frame).unwrap();
        assert_eq!(field.dimensions(), (2, 2));
        assert!(check_field_shape(&frame, &field).is_ok());
        assert!(check_field_shape(&GrayImage::new(3, 3), &field).is_err());
        drop(estimator);
        assert_eq!(calls, 1);
    }
}
