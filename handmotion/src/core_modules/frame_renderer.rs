// THEORY:
// Rendering is feedback, not decision-making. A `FrameRenderer` reads the current
// `ControllerState` and the frame's `Gesture` and produces an annotated copy of the
// display frame. It never mutates the state it is given.
//
// The trait is generic over the frame type so that hosts can render with whatever
// imaging stack they already use (an OpenCV `Mat`, a GPU texture, ...). This module
// ships one pure-Rust implementation on `image::RgbImage`, plus the two auxiliary
// views: the colour-coded flow field and the significance mask.
//
// Pixel policy, per channel, in this order:
//     p'  = clip(p + brightness)
//     p'' = clip((1 + contrast) * p' - 128 * contrast)
// with clip to [0, 255] and truncation back to u8.

use crate::core_modules::gesture_classifier::Gesture;
use crate::core_modules::motion_field::MotionField;
use crate::core_modules::motion_summarizer::SignificanceMask;
use crate::core_modules::parameter_controller::ControllerState;
use crate::error::HandmotionError;
use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut};
use std::path::Path;

/// Feedback colour for the arrow and labels (a magenta-pink).
pub const FEEDBACK_COLOR: [u8; 3] = [255, 0, 150];
/// Distance of the arrow anchor from the right edge of the frame.
pub const ARROW_ANCHOR_RIGHT: i32 = 100;
/// Distance of the arrow anchor from the bottom edge of the frame.
pub const ARROW_ANCHOR_BOTTOM: i32 = 70;
pub const ARROW_THICKNESS: i32 = 5;
/// Arrow head length as a fraction of the arrow length.
pub const ARROW_TIP_LENGTH: f64 = 0.7;
/// Pixel height of the status lines.
pub const LABEL_PX: f32 = 24.0;
/// Where Debian-family systems install DejaVu Sans.
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Draws the current display state onto a frame.
pub trait FrameRenderer {
    type Frame;
    type Error;

    fn render(
        &mut self,
        frame: &Self::Frame,
        state: &ControllerState,
        gesture: Gesture,
    ) -> Result<Self::Frame, Self::Error>;
}

/// Where the text labels go for a frame of the given height.
pub fn label_positions(height: u32) -> [(i32, i32); 2] {
    let h = height as i32;
    [(30, h - 60), (30, h - 30)]
}

/// Start and end of the feedback arrow, or `None` when there is no gesture.
pub fn arrow_endpoints(
    width: u32,
    height: u32,
    gesture: Gesture,
) -> Option<((i32, i32), (i32, i32))> {
    let (dx, dy) = gesture.arrow_offset()?;
    let anchor = (
        width as i32 - ARROW_ANCHOR_RIGHT,
        height as i32 - ARROW_ANCHOR_BOTTOM,
    );
    Some((anchor, (anchor.0 + dx, anchor.1 + dy)))
}

/// Applies the brightness offset then the contrast stretch to one channel value.
pub fn adjust_channel(value: u8, state: &ControllerState) -> u8 {
    let brightened = (value as f64 + state.brightness_offset).clamp(0.0, 255.0).trunc();
    let contrast = state.contrast_offset;
    ((1.0 + contrast) * brightened - 128.0 * contrast).clamp(0.0, 255.0) as u8
}

pub fn adjust_frame(frame: &RgbImage, state: &ControllerState) -> RgbImage {
    // One lookup table per frame instead of float math per channel.
    let lut: Vec<u8> = (0..=255u8).map(|v| adjust_channel(v, state)).collect();
    let mut out = frame.clone();
    for channel in out.iter_mut() {
        *channel = lut[*channel as usize];
    }
    out
}

/// Pure-Rust renderer on RGB images. Draws the adjustment, the two status lines
/// and the arrow. Without a font the status lines are skipped.
#[derive(Debug, Clone)]
pub struct ImageRenderer {
    color: Rgb<u8>,
    font: Option<FontArc>,
    label_scale: PxScale,
}

impl Default for ImageRenderer {
    fn default() -> Self {
        Self {
            color: Rgb(FEEDBACK_COLOR),
            font: None,
            label_scale: PxScale::from(LABEL_PX),
        }
    }
}

impl ImageRenderer {
    pub fn with_font(font: FontArc) -> Self {
        Self {
            font: Some(font),
            ..Self::default()
        }
    }

    fn draw_labels(&self, image: &mut RgbImage, state: &ControllerState) {
        let Some(font) = &self.font else {
            return;
        };
        // `label_positions` are baselines; imageproc places text by its top edge.
        let ascent = font.as_scaled(self.label_scale).ascent().round() as i32;
        let [bright_at, contrast_at] = label_positions(image.height());
        for (text, (x, y)) in [
            (state.brightness_label(), bright_at),
            (state.contrast_label(), contrast_at),
        ] {
            draw_text_mut(image, self.color, x, y - ascent, self.label_scale, font, &text);
        }
    }
}

impl FrameRenderer for ImageRenderer {
    type Frame = RgbImage;
    type Error = std::convert::Infallible;

    fn render(
        &mut self,
        frame: &RgbImage,
        state: &ControllerState,
        gesture: Gesture,
    ) -> Result<RgbImage, Self::Error> {
        let mut out = adjust_frame(frame, state);
        self.draw_labels(&mut out, state);
        if let Some((from, to)) = arrow_endpoints(out.width(), out.height(), gesture) {
            draw_arrow(&mut out, from, to, self.color);
        }
        Ok(out)
    }
}

/// Reads a TrueType/OpenType font for the status lines.
pub fn load_font(path: impl AsRef<Path>) -> crate::Result<FontArc> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| HandmotionError::FontRead {
        path: path.to_path_buf(),
        source,
    })?;
    FontArc::try_from_vec(bytes).map_err(|_| HandmotionError::FontParse(path.to_path_buf()))
}

/// Draws a thick arrow from `from` to `to`, head at `to`. Pixels outside the image
/// are skipped.
pub fn draw_arrow(image: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    draw_thick_segment(image, from, to, color);

    let (dx, dy) = ((from.0 - to.0) as f64, (from.1 - to.1) as f64);
    let tip = (dx * dx + dy * dy).sqrt() * ARROW_TIP_LENGTH;
    if tip < 1.0 {
        return;
    }
    let angle = dy.atan2(dx);
    for side in [std::f64::consts::FRAC_PI_4, -std::f64::consts::FRAC_PI_4] {
        let head = (
            (to.0 as f64 + tip * (angle + side).cos()).round() as i32,
            (to.1 as f64 + tip * (angle + side).sin()).round() as i32,
        );
        draw_thick_segment(image, head, to, color);
    }
}

/// One segment per offset inside the pen disc, plus round caps.
fn draw_thick_segment(image: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    let radius = ARROW_THICKNESS / 2;
    for oy in -radius..=radius {
        for ox in -radius..=radius {
            if ox * ox + oy * oy > radius * radius {
                continue;
            }
            draw_line_segment_mut(
                image,
                ((from.0 + ox) as f32, (from.1 + oy) as f32),
                ((to.0 + ox) as f32, (to.1 + oy) as f32),
                color,
            );
        }
    }
    draw_filled_circle_mut(image, from, radius, color);
    draw_filled_circle_mut(image, to, radius, color);
}

/// Colour-codes a flow field: hue follows direction, brightness follows magnitude
/// (min-max normalized over the field), saturation is full.
pub fn flow_visualization(field: &MotionField) -> RgbImage {
    let magnitudes: Vec<f32> = field.magnitudes().collect();
    let (min, max) = magnitudes
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &m| (lo.min(m), hi.max(m)));
    let range = max - min;

    let mut out = RgbImage::new(field.width(), field.height());
    for ((_, _, pixel), (vector, magnitude)) in out
        .enumerate_pixels_mut()
        .zip(field.vectors().iter().zip(&magnitudes))
    {
        // Hue on the 0..180 half-degree scale, as 8-bit HSV images store it.
        let hue = (vector.angle().to_degrees() / 2.0) as u8;
        let value = if range > 0.0 {
            ((magnitude - min) / range * 255.0) as u8
        } else {
            0
        };
        *pixel = hsv_to_rgb(hue, value);
    }
    out
}

/// Significant cells white, the rest black.
pub fn mask_visualization(mask: &SignificanceMask) -> GrayImage {
    let mut out = GrayImage::new(mask.width(), mask.height());
    for (pixel, &significant) in out.pixels_mut().zip(mask.cells()) {
        *pixel = Luma([if significant { 255 } else { 0 }]);
    }
    out
}

/// Full-saturation HSV to RGB, with `hue` in half-degrees (0..180).
fn hsv_to_rgb(hue: u8, value: u8) -> Rgb<u8> {
    let h = (hue as f32 * 2.0) / 60.0;
    let v = value as f32;
    let x = v * (1.0 - ((h % 2.0) - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (v, x, 0.0),
        1 => (x, v, 0.0),
        2 => (0.0, v, x),
        3 => (0.0, x, v),
        4 => (x, 0.0, v),
        _ => (v, 0.0, x),
    };
    Rgb([r.round() as u8, g.round() as u8, b.round() as u8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::motion_field::FlowVector;
    use crate::core_modules::motion_summarizer::MotionSummarizer;

    #[test]
    fn neutral_state_is_identity() {
        let state = ControllerState::default();
        for v in [0u8, 1, 127, 128, 254, 255] {
            assert_eq!(adjust_channel(v, &state), v);
        }
    }

    #[test]
    fn brightness_clips_before_contrast() {
        let state = ControllerState::new(100.0, 0.0);
        assert_eq!(adjust_channel(100, &state), 200);
        assert_eq!(adjust_channel(200, &state), 255);

        // 200 + 100 clips to 255 first; 2 * 255 - 128 = 382 clips again.
        let state = ControllerState::new(100.0, 1.0);
        assert_eq!(adjust_channel(200, &state), 255);
        // 20 - 100 clips to 0; 2 * 0 - 128 clips to 0.
        let state = ControllerState::new(-100.0, 1.0);
        assert_eq!(adjust_channel(20, &state), 0);
    }

    #[test]
    fn contrast_pivots_on_mid_grey() {
        let state = ControllerState::new(0.0, 1.0);
        assert_eq!(adjust_channel(128, &state), 128);
        assert_eq!(adjust_channel(138, &state), 148);
        assert_eq!(adjust_channel(118, &state), 108);

        // Contrast -1 flattens everything to 128.
        let state = ControllerState::new(0.0, -1.0);
        assert_eq!(adjust_channel(0, &state), 128);
        assert_eq!(adjust_channel(255, &state), 128);
    }

    #[test]
    fn renderer_leaves_input_untouched() {
        let frame = RgbImage::from_pixel(200, 150, Rgb([100, 100, 100]));
        let mut renderer = ImageRenderer::default();
        let out = renderer
            .render(&frame, &ControllerState::new(50.0, 0.0), Gesture::None)
            .unwrap();
        assert_eq!(frame.get_pixel(0, 0), &Rgb([100, 100, 100]));
        assert_eq!(out.get_pixel(0, 0), &Rgb([150, 150, 150]));
    }

    #[test]
    fn arrow_geometry() {
        assert_eq!(arrow_endpoints(640, 480, Gesture::None), None);
        assert_eq!(
            arrow_endpoints(640, 480, Gesture::Up),
            Some(((540, 410), (540, 360)))
        );
        assert_eq!(
            arrow_endpoints(640, 480, Gesture::Left),
            Some(((540, 410), (490, 410)))
        );
        assert_eq!(label_positions(480), [(30, 420), (30, 450)]);
    }

    #[test]
    fn arrow_is_drawn_only_for_gestures() {
        let frame = RgbImage::new(320, 240);
        let mut renderer = ImageRenderer::default();
        let state = ControllerState::default();

        let plain = renderer.render(&frame, &state, Gesture::None).unwrap();
        assert!(plain.pixels().all(|p| p.0 == [0, 0, 0]));

        let right = renderer.render(&frame, &state, Gesture::Right).unwrap();
        // Shaft runs from the anchor (220, 170) to (270, 170).
        assert_eq!(right.get_pixel(220, 170).0, FEEDBACK_COLOR);
        assert_eq!(right.get_pixel(245, 170).0, FEEDBACK_COLOR);
        assert_eq!(right.get_pixel(270, 170).0, FEEDBACK_COLOR);
        assert_eq!(right.get_pixel(10, 10).0, [0, 0, 0]);
    }

    #[test]
    fn status_lines_are_drawn_with_a_font() {
        let Ok(font) = load_font(DEFAULT_FONT_PATH) else {
            eprintln!("skipping: no font at {DEFAULT_FONT_PATH}");
            return;
        };
        let frame = RgbImage::new(320, 240);
        let state = ControllerState::new(30.0, 0.4);
        // Black stays black under this state, so any lit pixel in the band is text.
        assert_eq!(adjust_channel(0, &state), 0);

        let lit_in_label_band = |image: &RgbImage| {
            let mut lit = 0;
            for y in 150..215 {
                for x in 30..150 {
                    if image.get_pixel(x, y).0 != [0, 0, 0] {
                        lit += 1;
                    }
                }
            }
            lit
        };

        let bare = ImageRenderer::default()
            .render(&frame, &state, Gesture::Left)
            .unwrap();
        assert_eq!(lit_in_label_band(&bare), 0);

        let labelled = ImageRenderer::with_font(font)
            .render(&frame, &state, Gesture::Left)
            .unwrap();
        assert!(lit_in_label_band(&labelled) > 0);
        // The arrow is still there, right of the text band.
        assert_eq!(labelled.get_pixel(200, 170).0, FEEDBACK_COLOR);
    }

    #[test]
    fn missing_font_is_reported() {
        let err = load_font("/nonexistent/handmotion.ttf").unwrap_err();
        assert!(matches!(err, HandmotionError::FontRead { .. }));
    }

    #[test]
    fn arrow_near_edge_does_not_panic() {
        let mut tiny = RgbImage::new(20, 20);
        draw_arrow(&mut tiny, (-80, -50), (-30, -50), Rgb(FEEDBACK_COLOR));
        draw_arrow(&mut tiny, (10, 10), (60, 10), Rgb(FEEDBACK_COLOR));
        assert_eq!(tiny.get_pixel(15, 10).0, FEEDBACK_COLOR);
    }

    #[test]
    fn flow_visualization_encodes_direction_and_strength() {
        let field = MotionField::new(
            2,
            1,
            vec![FlowVector::new(4.0, 0.0), FlowVector::new(0.0, 0.0)],
        )
        .unwrap();
        let vis = flow_visualization(&field);
        // Angle 0 is red at full brightness; the still cell is black.
        assert_eq!(vis.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(vis.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn flow_visualization_of_uniform_field_is_black() {
        let field = MotionField::uniform(3, 3, FlowVector::new(5.0, 5.0)).unwrap();
        let vis = flow_visualization(&field);
        assert!(vis.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn mask_visualization_is_binary() {
        let field = MotionField::new(
            2,
            1,
            vec![FlowVector::new(3.0, 0.0), FlowVector::new(1.0, 0.0)],
        )
        .unwrap();
        let mask = MotionSummarizer::default().significance_mask(&field);
        let vis = mask_visualization(&mask);
        assert_eq!(vis.get_pixel(0, 0).0, [255]);
        assert_eq!(vis.get_pixel(1, 0).0, [0]);
    }
}
