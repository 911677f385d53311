mod cv;

use anyhow::{Context, bail};
use clap::Parser;
use cv::{OpencvFarneback, OpencvRenderer, bgr_mat_to_rgb, gray_to_mat, rgb_to_bgr_mat};
use handmotion::core_modules::frame_renderer::{
    FrameRenderer, flow_visualization, mask_visualization,
};
use handmotion::pipeline::{Command, GestureSession, PipelineConfig};
use opencv::{
    core::{self, Mat},
    highgui,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONTROL_WINDOW: &str = "Handmotion Control";
const FLOW_WINDOW: &str = "Optical Flow";
const MASK_WINDOW: &str = "Motion Mask";
const FALLBACK_FPS: f64 = 30.0;

/// Swipe a hand in front of the camera to change brightness (left/right) and
/// contrast (up/down). SPACE resets, ESC quits.
#[derive(Parser, Debug)]
#[command(name = "handmotion_tester", version)]
struct Args {
    /// Camera index (overrides the config file).
    #[arg(long)]
    camera: Option<i32>,

    /// Read frames from a video file instead of a camera.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Write annotated frames to this video file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// TOML file with pipeline settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not open any windows.
    #[arg(long)]
    headless: bool,

    /// Do not flip frames horizontally.
    #[arg(long)]
    no_mirror: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- 1. Argument Parsing & Config ---
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(index) = args.camera {
        config.capture.camera_index = index;
    }
    if args.no_mirror {
        config.capture.mirror = false;
    }

    // --- 2. Video I/O Initialization ---
    let mut cap = open_capture(&args, &config)?;
    let frame_width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
    let frame_height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
    let fps = match cap.get(videoio::CAP_PROP_FPS)? {
        fps if fps > 0.0 => fps,
        _ => FALLBACK_FPS,
    };
    info!(frame_width, frame_height, fps, "capture opened");

    let mut writer = match &args.output {
        Some(path) => {
            let path = path.to_str().context("output path is not valid UTF-8")?;
            let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
            let writer = VideoWriter::new(
                path,
                fourcc,
                fps,
                core::Size::new(frame_width, frame_height),
                true,
            )?;
            if !writer.is_opened()? {
                bail!("failed to open video writer for {path}");
            }
            Some(writer)
        }
        None => None,
    };

    // --- 3. Session Initialization ---
    let estimator = OpencvFarneback::new(config.flow.clone());
    let mut session = GestureSession::new(config, estimator);
    let mut renderer = OpencvRenderer;

    let mut frame = Mat::default();
    if !cap.read(&mut frame)? || frame.empty() {
        bail!("failed to read the first frame");
    }
    session.feed(&bgr_mat_to_rgb(&frame)?)?;

    if !args.headless {
        for window in [CONTROL_WINDOW, FLOW_WINDOW, MASK_WINDOW] {
            highgui::named_window(window, highgui::WINDOW_AUTOSIZE)?;
        }
    }

    // --- 4. Main Processing Loop ---
    loop {
        match cap.read(&mut frame) {
            Ok(true) if !frame.empty() => {}
            Ok(_) => {
                info!("no more frames");
                break;
            }
            Err(e) => {
                warn!(error = %e, "frame read failed");
                break;
            }
        }

        let Some(processed) = session.feed(&bgr_mat_to_rgb(&frame)?)? else {
            continue;
        };
        let report = &processed.report;

        // --- 5. Rendering ---
        let display = rgb_to_bgr_mat(&processed.display)?;
        let annotated = renderer.render(&display, &report.state, report.gesture)?;
        if let Some(writer) = writer.as_mut() {
            writer.write(&annotated)?;
        }

        if args.headless {
            continue;
        }
        highgui::imshow(CONTROL_WINDOW, &annotated)?;
        let flow_view = rgb_to_bgr_mat(&flow_visualization(&report.field))?;
        let mask_view = gray_to_mat(&mask_visualization(&report.summary.mask))?;
        highgui::imshow(FLOW_WINDOW, &flow_view)?;
        highgui::imshow(MASK_WINDOW, &mask_view)?;

        // --- 6. Input ---
        let key = highgui::wait_key(1)?;
        if !session.handle(Command::from_key(key)) {
            break;
        }
    }

    info!(frames = session.frames_processed(), "session finished");
    if !args.headless {
        highgui::destroy_all_windows()?;
    }
    Ok(())
}

fn open_capture(args: &Args, config: &PipelineConfig) -> anyhow::Result<VideoCapture> {
    let cap = match &args.input {
        Some(path) => {
            let path = path.to_str().context("input path is not valid UTF-8")?;
            VideoCapture::from_file(path, videoio::CAP_ANY)?
        }
        None => VideoCapture::new(config.capture.camera_index, videoio::CAP_ANY)?,
    };
    if !cap.is_opened()? {
        match &args.input {
            Some(path) => bail!("failed to open video file {}", path.display()),
            None => bail!("failed to open camera {}", config.capture.camera_index),
        }
    }
    Ok(cap)
}
