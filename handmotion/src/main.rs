// Example runner for the `handmotion` library. It skips the camera and flow
// estimation entirely and feeds hand-made motion fields through the decision chain,
// printing what a live session would do with them.

use handmotion::core_modules::motion_field::{FlowVector, MotionField};
use handmotion::core_modules::parameter_controller::ControllerState;
use handmotion::pipeline::{HandmotionPipeline, PipelineConfig};
use image::GrayImage;

const FIELD_WIDTH: u32 = 32;
const FIELD_HEIGHT: u32 = 24;

fn main() -> handmotion::Result<()> {
    println!("Handmotion - Example Runner");

    let config = PipelineConfig::default();
    // No frames are estimated here, so the estimator is never called.
    let unused = |_: &GrayImage, _: &GrayImage| MotionField::uniform(1, 1, FlowVector::default());
    let pipeline = HandmotionPipeline::new(config, unused);

    let swipes = [
        ("still hand", FlowVector::new(0.5, -0.3)),
        ("slow drift right", FlowVector::new(3.0, 0.0)),
        ("swipe right", FlowVector::new(9.0, 1.0)),
        ("swipe right", FlowVector::new(8.0, -1.5)),
        ("swipe up", FlowVector::new(0.5, -7.0)),
        ("swipe left", FlowVector::new(-6.0, 0.0)),
        ("swipe down", FlowVector::new(-1.0, 10.0)),
    ];

    let mut state = ControllerState::default();
    for (label, vector) in swipes {
        let field = MotionField::uniform(FIELD_WIDTH, FIELD_HEIGHT, vector)?;
        let report = pipeline.analyze(field, state);
        state = report.state;
        println!(
            "{label:>16}: |m| = {:5.2}, angle = {:6.1} -> {:<5} | {} | {}",
            report.aggregate().magnitude,
            report.aggregate().angle,
            report.gesture,
            state.brightness_label(),
            state.contrast_label(),
        );
    }

    state.reset();
    println!("after reset: {} | {}", state.brightness_label(), state.contrast_label());
    Ok(())
}
