// OpenCV side of the tester: the Farneback flow estimator, the annotated-frame
// renderer, and conversions between `Mat` and `image` buffers.

use anyhow::{Context, Result};
use handmotion::HandmotionError;
use handmotion::core_modules::flow_estimator::{FarnebackParams, FlowEstimator};
use handmotion::core_modules::frame_renderer::{
    ARROW_THICKNESS, ARROW_TIP_LENGTH, FrameRenderer, adjust_channel, arrow_endpoints,
    label_positions,
};
use handmotion::core_modules::gesture_classifier::Gesture;
use handmotion::core_modules::motion_field::MotionField;
use handmotion::core_modules::parameter_controller::ControllerState;
use image::{GrayImage, RgbImage};
use opencv::{
    core::{self, Mat, Point, Scalar, Vec2f},
    imgproc,
    prelude::*,
    video,
};

/// Feedback colour in BGR order.
const FEEDBACK_BGR: (f64, f64, f64) = (150.0, 0.0, 255.0);

/// Dense flow via OpenCV's Farneback implementation.
pub struct OpencvFarneback {
    params: FarnebackParams,
    flow: Mat,
}

impl OpencvFarneback {
    pub fn new(params: FarnebackParams) -> Self {
        Self {
            params,
            flow: Mat::default(),
        }
    }

    fn estimate_cv(
        &mut self,
        previous: &GrayImage,
        current: &GrayImage,
    ) -> opencv::Result<MotionField> {
        let prev = gray_to_mat(previous)?;
        let next = gray_to_mat(current)?;
        let p = &self.params;
        video::calc_optical_flow_farneback(
            &prev,
            &next,
            &mut self.flow,
            p.pyramid_scale,
            p.levels,
            p.window_size,
            p.iterations,
            p.poly_n,
            p.poly_sigma,
            p.flags,
        )?;

        let vectors: &[Vec2f] = self.flow.data_typed()?;
        let interleaved: Vec<f32> = vectors.iter().flat_map(|v| [v[0], v[1]]).collect();
        let (width, height) = current.dimensions();
        MotionField::from_interleaved(width, height, &interleaved)
            .map_err(|e| opencv::Error::new(core::StsUnmatchedSizes, e.to_string()))
    }
}

impl FlowEstimator for OpencvFarneback {
    fn estimate(
        &mut self,
        previous: &GrayImage,
        current: &GrayImage,
    ) -> handmotion::Result<MotionField> {
        self.estimate_cv(previous, current)
            .map_err(|e| HandmotionError::Flow(e.to_string()))
    }
}

/// Renders onto BGR `Mat`s: adjustment, two status lines, gesture arrow.
#[derive(Default)]
pub struct OpencvRenderer;

impl FrameRenderer for OpencvRenderer {
    type Frame = Mat;
    type Error = opencv::Error;

    fn render(
        &mut self,
        frame: &Mat,
        state: &ControllerState,
        gesture: Gesture,
    ) -> opencv::Result<Mat> {
        let table: Vec<u8> = (0..=255u8).map(|v| adjust_channel(v, state)).collect();
        let mut lut = Mat::new_rows_cols_with_default(1, 256, core::CV_8UC1, Scalar::all(0.0))?;
        lut.data_bytes_mut()?.copy_from_slice(&table);

        let mut out = Mat::default();
        core::lut(frame, &lut, &mut out)?;

        let color = Scalar::new(FEEDBACK_BGR.0, FEEDBACK_BGR.1, FEEDBACK_BGR.2, 0.0);
        let size = out.size()?;
        let [bright_at, contrast_at] = label_positions(size.height as u32);
        for (text, (x, y)) in [
            (state.brightness_label(), bright_at),
            (state.contrast_label(), contrast_at),
        ] {
            imgproc::put_text(
                &mut out,
                &text,
                Point::new(x, y),
                imgproc::FONT_HERSHEY_SIMPLEX,
                1.0,
                color,
                2,
                imgproc::LINE_AA,
                false,
            )?;
        }

        if let Some((from, to)) = arrow_endpoints(size.width as u32, size.height as u32, gesture) {
            imgproc::arrowed_line(
                &mut out,
                Point::new(from.0, from.1),
                Point::new(to.0, to.1),
                color,
                ARROW_THICKNESS,
                imgproc::LINE_AA,
                0,
                ARROW_TIP_LENGTH,
            )?;
        }
        Ok(out)
    }
}

pub fn gray_to_mat(gray: &GrayImage) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        gray.height() as i32,
        gray.width() as i32,
        core::CV_8UC1,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(gray.as_raw());
    Ok(mat)
}

/// RGB buffer to a BGR `Mat` ready for display or encoding.
pub fn rgb_to_bgr_mat(rgb: &RgbImage) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        rgb.height() as i32,
        rgb.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(rgb.as_raw());
    let mut bgr = Mat::default();
    imgproc::cvt_color(&mat, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

/// Captured BGR frame to an RGB buffer for the engine.
pub fn bgr_mat_to_rgb(frame: &Mat) -> Result<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    RgbImage::from_raw(width, height, rgb.data_bytes()?.to_vec())
        .with_context(|| format!("captured frame is not a {width}x{height} 3-channel image"))
}
