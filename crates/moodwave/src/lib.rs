//! Audio session core for a browser music player.
//!
//! One media element, one shared analysis graph, a play queue and any number
//! of visualization samplers. Browser specifics live behind the traits in
//! [`platform`]; `moodwave-web` provides the `web-sys` implementation.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod platform;
pub mod queue;
pub mod sampler;
pub mod session;

pub use catalog::{format_time, Catalog, Mood, QueuePolicy, Track};
pub use config::{AnalyserSettings, SamplerConfig, SessionConfig, SignalProfile};
pub use engine::{PlayState, PlaybackEngine, PlaybackSession, SessionEvent};
pub use error::{ConfigError, Error, PlatformError, PlaybackError, Result};
pub use graph::{ConsumerId, SharedGraph};
pub use queue::{Queue, QueueController, QueueStep};
pub use sampler::{FrequencySnapshot, SnapshotStrategy, SyntheticSignal, VisualizationSampler};
pub use session::AudioSession;
