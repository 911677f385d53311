// THEORY:
// The `GestureClassifier` turns one `AggregateMotion` into a discrete decision.
// It applies two rules, in order:
//
// 1.  **Significance gate**: unless the aggregate magnitude is strictly above the
//     significance threshold, nothing happened (`Gesture::None`). Slow drifts and the
//     empty-mask case both stop here.
// 2.  **Angular sectors**: the angle is bucketed into four 90 degree sectors rotated by
//     45 degrees, so each cardinal gesture owns the quadrant centred on its axis.
//     Sectors are half-open: the lower edge belongs to the sector, the upper edge
//     to the next one.
//
//     [ 45, 135) -> Up
//     [135, 225) -> Right
//     [225, 315) -> Down
//     [315, 360) and [0, 45) -> Left
//
// Remember the +180 shift from the summarizer: flow toward negative x lands near 0,
// which is why it reads as Left, and flow toward negative y (up the image) lands
// near 90.

use crate::core_modules::motion_summarizer::AggregateMotion;
use std::fmt;

/// Default minimum aggregate magnitude for a gesture to register.
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 4.0;

/// Length, in pixels, of the feedback arrow drawn for a gesture.
pub const ARROW_LENGTH: i32 = 50;

/// The discrete outcome of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Gesture {
    Up,
    Right,
    Down,
    Left,
    /// The motion was too weak to count as a gesture.
    #[default]
    None,
}

impl Gesture {
    pub fn is_none(&self) -> bool {
        matches!(self, Gesture::None)
    }

    /// Offset from the arrow anchor to the arrow tip in image coordinates, or `None`
    /// when no arrow should be drawn.
    pub fn arrow_offset(&self) -> Option<(i32, i32)> {
        match self {
            Gesture::Up => Some((0, -ARROW_LENGTH)),
            Gesture::Right => Some((ARROW_LENGTH, 0)),
            Gesture::Down => Some((0, ARROW_LENGTH)),
            Gesture::Left => Some((-ARROW_LENGTH, 0)),
            Gesture::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::Up => "up",
            Gesture::Right => "right",
            Gesture::Down => "down",
            Gesture::Left => "left",
            Gesture::None => "none",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct GestureClassifier {
    significance_threshold: f64,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNIFICANCE_THRESHOLD)
    }
}

impl GestureClassifier {
    pub fn new(significance_threshold: f64) -> Self {
        Self {
            significance_threshold,
        }
    }

    pub fn significance_threshold(&self) -> f64 {
        self.significance_threshold
    }

    pub fn classify(&self, motion: &AggregateMotion) -> Gesture {
        if motion.magnitude <= self.significance_threshold {
            return Gesture::None;
        }
        Self::sector(motion.angle)
    }

    /// Maps an angle in degrees onto its sector, ignoring magnitude.
    pub fn sector(angle: f64) -> Gesture {
        if (45.0..135.0).contains(&angle) {
            Gesture::Up
        } else if (135.0..225.0).contains(&angle) {
            Gesture::Right
        } else if (225.0..315.0).contains(&angle) {
            Gesture::Down
        } else {
            Gesture::Left
        }
    }
}
