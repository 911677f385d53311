// THEORY:
// The core of the engine is made of total functions over well-formed numeric grids.
// The only things that can go wrong happen at the boundary: a flow field or frame
// pair with the wrong shape, a config file that cannot be read, or an external flow
// estimator that fails. All of those funnel into a single error type so callers
// only ever match on one enum.

use std::path::PathBuf;

/// Everything that can fail at the boundary of the handmotion engine.
#[derive(Debug, thiserror::Error)]
pub enum HandmotionError {
    #[error("motion field is empty ({width}x{height})")]
    EmptyField { width: u32, height: u32 },

    #[error("motion field expects {expected} vectors for {width}x{height}, got {actual}")]
    FieldSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("frame dimensions differ: previous {previous:?}, current {current:?}")]
    FrameMismatch {
        previous: (u32, u32),
        current: (u32, u32),
    },

    #[error("flow estimator returned a {actual:?} field for {expected:?} frames")]
    FlowShapeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("flow estimation failed: {0}")]
    Flow(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read font {}: {source}", path.display())]
    FontRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a usable font: {}", .0.display())]
    FontParse(PathBuf),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, HandmotionError>;
