// THEORY:
// The `MotionField` is the raw output of dense optical flow: one (vx, vy) vector for
// every pixel of the downscaled frame. Like the old `Chunk`, it is a "dumb" data
// container. It knows its own shape and how to compute per-cell magnitudes and
// angles, but it does not know what counts as significant motion. That decision
// belongs to the `MotionSummarizer`.
//
// A field is only ever constructed through `new` or `from_interleaved`, which check
// the shape once. Everything downstream can therefore assume a non-empty grid whose
// vector count equals width * height.

use crate::error::{HandmotionError, Result};

/// A single flow vector, in pixels of displacement between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowVector {
    pub vx: f32,
    pub vy: f32,
}

impl FlowVector {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    /// Euclidean length of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    /// Direction in radians, in [0, 2π), measured the way image coordinates run
    /// (x right, y down).
    pub fn angle(&self) -> f32 {
        let angle = self.vy.atan2(self.vx);
        if angle < 0.0 {
            angle + std::f32::consts::TAU
        } else {
            angle
        }
    }
}

/// A dense, row-major grid of flow vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionField {
    width: u32,
    height: u32,
    vectors: Vec<FlowVector>,
}

impl MotionField {
    pub fn new(width: u32, height: u32, vectors: Vec<FlowVector>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(HandmotionError::EmptyField { width, height });
        }
        let expected = width as usize * height as usize;
        if vectors.len() != expected {
            return Err(HandmotionError::FieldSizeMismatch {
                width,
                height,
                expected,
                actual: vectors.len(),
            });
        }
        Ok(Self {
            width,
            height,
            vectors,
        })
    }

    /// Builds a field from the `[vx0, vy0, vx1, vy1, ...]` layout that two-channel
    /// float images (e.g. an OpenCV `CV_32FC2` matrix) use.
    pub fn from_interleaved(width: u32, height: u32, data: &[f32]) -> Result<Self> {
        if data.len() % 2 != 0 {
            return Err(HandmotionError::FieldSizeMismatch {
                width,
                height,
                expected: width as usize * height as usize,
                actual: data.len() / 2,
            });
        }
        let vectors = data
            .chunks_exact(2)
            .map(|pair| FlowVector::new(pair[0], pair[1]))
            .collect();
        Self::new(width, height, vectors)
    }

    /// A field with the same vector in every cell.
    pub fn uniform(width: u32, height: u32, vector: FlowVector) -> Result<Self> {
        Self::new(width, height, vec![vector; width as usize * height as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn vectors(&self) -> &[FlowVector] {
        &self.vectors
    }

    pub fn get(&self, x: u32, y: u32) -> Option<FlowVector> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.vectors
            .get((y as usize * self.width as usize) + x as usize)
            .copied()
    }

    /// Per-cell magnitudes in row-major order.
    pub fn magnitudes(&self) -> impl Iterator<Item = f32> + '_ {
        self.vectors.iter().map(FlowVector::magnitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_dimensions() {
        let err = MotionField::new(0, 4, Vec::new()).unwrap_err();
        assert!(matches!(err, HandmotionError::EmptyField { width: 0, height: 4 }));
    }

    #[test]
    fn rejects_wrong_vector_count() {
        let err = MotionField::new(2, 2, vec![FlowVector::default(); 3]).unwrap_err();
        assert!(matches!(
            err,
            HandmotionError::FieldSizeMismatch { expected: 4, actual: 3, .. }
        ));
    }

    #[test]
    fn interleaved_layout_is_vx_then_vy() {
        let field = MotionField::from_interleaved(2, 1, &[1.0, 2.0, -3.0, 4.0]).unwrap();
        assert_eq!(field.get(0, 0), Some(FlowVector::new(1.0, 2.0)));
        assert_eq!(field.get(1, 0), Some(FlowVector::new(-3.0, 4.0)));
        assert_eq!(field.get(2, 0), None);
    }

    #[test]
    fn interleaved_rejects_odd_length() {
        assert!(MotionField::from_interleaved(1, 1, &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn magnitude_and_angle() {
        let v = FlowVector::new(3.0, 4.0);
        assert_eq!(v.magnitude(), 5.0);

        let down = FlowVector::new(0.0, 1.0);
        assert!((down.angle() - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        let up = FlowVector::new(0.0, -1.0);
        assert!((up.angle() - 3.0 * std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }
}
