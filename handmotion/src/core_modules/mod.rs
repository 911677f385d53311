pub mod flow_estimator;
pub mod frame_renderer;
pub mod gesture_classifier;
pub mod motion_field;
pub mod motion_summarizer;
pub mod parameter_controller;
