// THEORY:
// The `ParameterController` is the only part of the engine that remembers anything
// across frames, and even then the memory is not its own: the `ControllerState` is
// owned by whoever runs the loop and is passed in by reference. The controller only
// holds the policy (step sizes and limits).
//
// The policy is a step accumulator with a guard, not a clamp:
//
// - Each gesture moves exactly one offset by exactly one step.
// - The guard looks at the value BEFORE the step. If the value is still inside the
//   limit the full step is applied, even if that carries it past the limit.
// - Once at or past the limit, further steps in that direction are dropped until
//   the opposite gesture brings the value back inside.
//
// With the default contrast step of 0.2, a contrast of 4.9 therefore goes to 5.1,
// while a contrast of exactly 5.0 stays put.

use crate::core_modules::gesture_classifier::Gesture;
use serde::Deserialize;
use tracing::{debug, info};

/// The two display offsets driven by gestures.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    /// Added to every channel before the contrast stretch.
    pub brightness_offset: f64,
    /// Contrast gain minus one, pivoting around mid-grey.
    pub contrast_offset: f64,
}

impl ControllerState {
    pub fn new(brightness_offset: f64, contrast_offset: f64) -> Self {
        Self {
            brightness_offset,
            contrast_offset,
        }
    }

    /// Puts both offsets back to zero, whatever they were.
    pub fn reset(&mut self) {
        info!(
            brightness = self.brightness_offset,
            contrast = self.contrast_offset,
            "resetting display offsets"
        );
        *self = Self::default();
    }

    pub fn brightness_label(&self) -> String {
        format!("Brightness: {:.2}", self.brightness_offset)
    }

    pub fn contrast_label(&self) -> String {
        format!("Contrast: {:.2}", self.contrast_offset)
    }
}

/// Step sizes and limits for the accumulator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub brightness_step: f64,
    /// Brightness may only be stepped up while below `+limit` and down while above `-limit`.
    pub brightness_limit: f64,
    pub contrast_step: f64,
    pub contrast_min: f64,
    pub contrast_max: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            brightness_step: 10.0,
            brightness_limit: 200.0,
            contrast_step: 0.2,
            contrast_min: -1.0,
            contrast_max: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterController {
    config: ControllerConfig,
}

impl ParameterController {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Returns the state that follows `state` under `gesture`.
    pub fn step(&self, state: ControllerState, gesture: Gesture) -> ControllerState {
        let mut next = state;
        self.apply(&mut next, gesture);
        next
    }

    /// Applies `gesture` to `state` in place. Returns whether anything changed.
    pub fn apply(&self, state: &mut ControllerState, gesture: Gesture) -> bool {
        let cfg = &self.config;
        let changed = match gesture {
            Gesture::Up if state.contrast_offset < cfg.contrast_max => {
                state.contrast_offset += cfg.contrast_step;
                true
            }
            Gesture::Down if state.contrast_offset > cfg.contrast_min => {
                state.contrast_offset -= cfg.contrast_step;
                true
            }
            Gesture::Right if state.brightness_offset < cfg.brightness_limit => {
                state.brightness_offset += cfg.brightness_step;
                true
            }
            Gesture::Left if state.brightness_offset > -cfg.brightness_limit => {
                state.brightness_offset -= cfg.brightness_step;
                true
            }
            _ => false,
        };

        if changed {
            debug!(
                %gesture,
                brightness = state.brightness_offset,
                contrast = state.contrast_offset,
                "display offsets stepped"
            );
        } else if !gesture.is_none() {
            debug!(%gesture, "offset at limit, step dropped");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn controller() -> ParameterController {
        ParameterController::default()
    }

    #[test]
    fn each_gesture_moves_one_offset() {
        let c = controller();
        let start = ControllerState::default();
        assert_eq!(c.step(start, Gesture::Up), ControllerState::new(0.0, 0.2));
        assert_eq!(c.step(start, Gesture::Down), ControllerState::new(0.0, -0.2));
        assert_eq!(c.step(start, Gesture::Right), ControllerState::new(10.0, 0.0));
        assert_eq!(c.step(start, Gesture::Left), ControllerState::new(-10.0, 0.0));
    }

    #[test]
    fn step_applies_before_limit_without_clamping() {
        let c = controller();
        let next = c.step(ControllerState::new(0.0, 4.9), Gesture::Up);
        assert!((next.contrast_offset - 5.1).abs() < EPS);

        let next = c.step(ControllerState::new(195.0, 0.0), Gesture::Right);
        assert_eq!(next.brightness_offset, 205.0);

        let next = c.step(ControllerState::new(0.0, -0.9), Gesture::Down);
        assert!((next.contrast_offset + 1.1).abs() < EPS);
    }

    #[test]
    fn step_dropped_at_limit() {
        let c = controller();
        let at_cap = ControllerState::new(200.0, 5.0);
        assert_eq!(c.step(at_cap, Gesture::Up), at_cap);
        assert_eq!(c.step(at_cap, Gesture::Right), at_cap);

        let at_floor = ControllerState::new(-200.0, -1.0);
        assert_eq!(c.step(at_floor, Gesture::Down), at_floor);
        assert_eq!(c.step(at_floor, Gesture::Left), at_floor);
    }

    #[test]
    fn opposite_gesture_unlocks_the_limit() {
        let c = controller();
        let mut state = ControllerState::new(210.0, 0.0);
        assert!(!c.apply(&mut state, Gesture::Right));
        assert!(c.apply(&mut state, Gesture::Left));
        assert!(!c.apply(&mut state, Gesture::Right));
        assert_eq!(state.brightness_offset, 200.0);
        assert!(c.apply(&mut state, Gesture::Left));
        assert!(c.apply(&mut state, Gesture::Right));
        assert_eq!(state.brightness_offset, 200.0);
    }

    #[test]
    fn brightness_saturates_after_twenty_steps() {
        let c = controller();
        let mut state = ControllerState::default();
        for _ in 0..50 {
            c.apply(&mut state, Gesture::Right);
        }
        assert_eq!(state.brightness_offset, 200.0);
        for _ in 0..100 {
            c.apply(&mut state, Gesture::Left);
        }
        assert_eq!(state.brightness_offset, -200.0);
    }

    #[test]
    fn contrast_saturates_from_zero() {
        let c = controller();
        let mut state = ControllerState::default();
        for _ in 0..25 {
            assert!(c.apply(&mut state, Gesture::Up));
        }
        // Twenty-five additions of 0.2 overshoot 5.0 by float rounding, which also
        // stops further steps.
        assert_eq!(state.contrast_offset, 5.000000000000002);
        assert!(!c.apply(&mut state, Gesture::Up));
        assert_eq!(state.contrast_offset, 5.000000000000002);

        let mut state = ControllerState::default();
        for _ in 0..5 {
            assert!(c.apply(&mut state, Gesture::Down));
        }
        assert_eq!(state.contrast_offset, -1.0);
        for _ in 0..5 {
            assert!(!c.apply(&mut state, Gesture::Down));
        }
        assert_eq!(state.contrast_offset, -1.0);
    }

    #[test]
    fn repeated_none_is_idempotent() {
        let c = controller();
        let mut state = ControllerState::new(-30.0, 1.4);
        for _ in 0..10 {
            assert!(!c.apply(&mut state, Gesture::None));
        }
        assert_eq!(state, ControllerState::new(-30.0, 1.4));
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut state = ControllerState::new(150.0, -0.8);
        state.reset();
        assert_eq!(state, ControllerState::default());
        assert_eq!(state.brightness_offset, 0.0);
        assert_eq!(state.contrast_offset, 0.0);
    }

    #[test]
    fn labels_use_two_decimals() {
        let state = ControllerState::new(-20.0, 0.6000000000000001);
        assert_eq!(state.brightness_label(), "Brightness: -20.00");
        assert_eq!(state.contrast_label(), "Contrast: 0.60");
    }

    #[test]
    fn custom_config() {
        let c = ParameterController::new(ControllerConfig {
            brightness_step: 25.0,
            brightness_limit: 50.0,
            ..ControllerConfig::default()
        });
        let mut state = ControllerState::default();
        for _ in 0..5 {
            c.apply(&mut state, Gesture::Right);
        }
        assert_eq!(state.brightness_offset, 50.0);
    }
}
