//! Seams to the media element and the Web Audio graph.
//!
//! The session logic never touches browser objects directly. `moodwave-web`
//! implements these traits with `web-sys`; tests use [`fake`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

#[cfg(test)]
pub(crate) mod fake;

/// Identity of a physical media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// Tag for one play request. Outcomes carrying a stale tag are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PlayRequestId(pub u64);

/// How a play request settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// No prior user gesture (`NotAllowedError`).
    NotAllowed,
    /// Interrupted by a new load (`AbortError`).
    Aborted,
    Failed(String),
}

/// Everything the media element reports back asynchronously.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    TimeUpdate(f64),
    LoadedMetadata { duration: f64 },
    Ended,
    Error(String),
    PlaySettled {
        request: PlayRequestId,
        outcome: PlayOutcome,
    },
}

/// The single streaming audio element.
pub trait MediaElement {
    fn element_id(&self) -> ElementId;
    fn set_src(&self, uri: &str);
    fn load(&self);
    /// Starts playback. The outcome must be reported as
    /// [`MediaEvent::PlaySettled`] carrying `request`.
    fn play(&self, request: PlayRequestId);
    fn pause(&self);
    fn is_paused(&self) -> bool;
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    /// Duration in seconds; NaN while unknown.
    fn duration(&self) -> f64;
    fn set_volume(&self, volume: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyHint {
    Interactive,
    Balanced,
    #[default]
    Playback,
}

impl LatencyHint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Balanced => "balanced",
            Self::Playback => "playback",
        }
    }
}

pub trait AudioContextHandle {
    fn state(&self) -> ContextState;
    /// Asks the context to leave the suspended state. Completion is not awaited.
    fn resume(&self);
}

pub trait AnalyserHandle {
    fn frequency_bin_count(&self) -> usize;
    /// Fills `out` with the current spectrum, one byte per bin.
    fn byte_frequency_data(&self, out: &mut [u8]);
}

/// Factory and wiring for analysis graph nodes.
pub trait AudioPlatform {
    type Element: MediaElement;
    type Context: AudioContextHandle;
    type Analyser: AnalyserHandle;
    type Source;

    fn create_context(&self, latency: LatencyHint) -> Result<Self::Context, PlatformError>;

    fn create_analyser(
        &self,
        context: &Self::Context,
        fft_size: u32,
        smoothing: f64,
    ) -> Result<Self::Analyser, PlatformError>;

    /// Must fail with [`PlatformError::AlreadyConnected`] when the element
    /// already feeds a source node.
    fn create_media_element_source(
        &self,
        context: &Self::Context,
        element: &Self::Element,
    ) -> Result<Self::Source, PlatformError>;

    fn connect_source(
        &self,
        source: &Self::Source,
        analyser: &Self::Analyser,
    ) -> Result<(), PlatformError>;

    fn connect_destination(
        &self,
        context: &Self::Context,
        analyser: &Self::Analyser,
    ) -> Result<(), PlatformError>;

    fn disconnect_source(&self, source: &Self::Source);
}
