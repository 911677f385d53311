// THEORY:
// The `MotionSummarizer` collapses a whole `MotionField` into a single direction.
// Dense flow is noisy: sensor grain, compression artifacts and lighting flicker
// all produce small vectors everywhere. The summarizer therefore works in two
// passes:
//
// 1.  **Masking**: every cell whose magnitude is strictly above the noise floor is
//     marked significant. Everything else is ignored entirely, not just weighted down.
// 2.  **Aggregation**: the mean vx and mean vy of the significant cells form one
//     representative vector. Its length and direction are the `AggregateMotion`.
//
// The angle convention is the one the gesture sectors are defined against:
// `atan2(my, mx)` in degrees, shifted by +180 so it lands in [0, 360). A hand moving
// toward negative x therefore reads as ~0/360 degrees, positive x as ~180 degrees.
//
// The summarizer holds no state between frames.

use crate::core_modules::motion_field::MotionField;

/// Default per-pixel noise floor, in flow units.
pub const DEFAULT_NOISE_THRESHOLD: f32 = 2.0;

/// Per-cell flags marking which vectors rose above the noise floor.
#[derive(Debug, Clone, PartialEq)]
pub struct SignificanceMask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl SignificanceMask {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.cells[(y as usize * self.width as usize) + x as usize]
    }

    /// Number of significant cells.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|&c| c)
    }
}

/// The single representative motion for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregateMotion {
    /// Length of the mean significant vector.
    pub magnitude: f64,
    /// Direction of the mean significant vector in degrees, in [0, 360).
    pub angle: f64,
}

impl AggregateMotion {
    /// Builds the aggregate from a mean vector, applying the +180 degree shift.
    pub fn from_mean(mx: f64, my: f64) -> Self {
        Self {
            magnitude: (mx * mx + my * my).sqrt(),
            angle: normalize_degrees(my.atan2(mx).to_degrees() + 180.0),
        }
    }
}

/// Everything the summarizer learned about one field.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionSummary {
    pub mask: SignificanceMask,
    pub mean_vx: f64,
    pub mean_vy: f64,
    pub aggregate: AggregateMotion,
}

#[derive(Debug, Clone)]
pub struct MotionSummarizer {
    noise_threshold: f32,
}

impl Default for MotionSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_THRESHOLD)
    }
}

impl MotionSummarizer {
    pub fn new(noise_threshold: f32) -> Self {
        Self { noise_threshold }
    }

    pub fn noise_threshold(&self) -> f32 {
        self.noise_threshold
    }

    pub fn significance_mask(&self, field: &MotionField) -> SignificanceMask {
        SignificanceMask {
            width: field.width(),
            height: field.height(),
            cells: field.magnitudes().map(|m| m > self.noise_threshold).collect(),
        }
    }

    /// Masks the field and averages the significant vectors.
    pub fn summarize(&self, field: &MotionField) -> MotionSummary {
        let mask = self.significance_mask(field);

        let mut sum_vx = 0.0f64;
        let mut sum_vy = 0.0f64;
        let mut count = 0usize;
        for (vector, _) in field
            .vectors()
            .iter()
            .zip(mask.cells())
            .filter(|(_, significant)| **significant)
        {
            sum_vx += vector.vx as f64;
            sum_vy += vector.vy as f64;
            count += 1;
        }

        if count == 0 {
            // No direction exists; the magnitude gate downstream rejects it anyway.
            return MotionSummary {
                mask,
                mean_vx: 0.0,
                mean_vy: 0.0,
                aggregate: AggregateMotion::default(),
            };
        }

        let mean_vx = sum_vx / count as f64;
        let mean_vy = sum_vy / count as f64;
        MotionSummary {
            mask,
            mean_vx,
            mean_vy,
            aggregate: AggregateMotion::from_mean(mean_vx, mean_vy),
        }
    }
}

/// Folds an angle in degrees into [0, 360).
fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees % 360.0;
    let wrapped = if wrapped < 0.0 { wrapped + 360.0 } else { wrapped };
    // `-tiny + 360.0` can round up to exactly 360.0.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
