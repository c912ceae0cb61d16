//! Error types for the audio session core.
//!
//! Nothing here is fatal to the process: playback errors are contained to the
//! affected track and surface as session events, platform errors stay inside
//! the component that hit them.

use thiserror::Error;

use crate::platform::ElementId;

/// Failures of the browser-side resources behind the platform seams.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The element is already wired into an audio graph.
    #[error("media element is already connected to an audio graph")]
    AlreadyConnected,

    #[error("unsupported by this platform: {0}")]
    Unsupported(String),

    #[error("platform call failed: {0}")]
    Js(String),
}

/// Playback failures as seen by rendering collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Playback blocked until the user interacts with the page.
    #[error("playback not allowed before a user gesture")]
    PermissionDenied,

    /// A load interrupted an in-flight play request. Retried once metadata arrives.
    #[error("play request superseded by a new load")]
    RequestSuperseded,

    #[error("analysis graph could not attach to element {element}: {reason}")]
    GraphConnectionFailure { element: ElementId, reason: String },

    #[error("playback error: {0}")]
    UnknownPlaybackError(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("fft size {0} must be a power of two between 32 and 32768")]
    FftSize(u32),

    #[error("analyser smoothing {0} must lie in [0, 1)")]
    Smoothing(f64),

    #[error("default volume {0} must lie in [0, 1]")]
    Volume(f64),

    #[error("{0} must be positive")]
    NonPositive(&'static str),

    #[error("{field} = {value} is out of range")]
    SignalProfile { field: &'static str, value: f64 },
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid catalog JSON: {0}")]
    Catalog(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
