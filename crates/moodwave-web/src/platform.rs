//! Web Audio implementation of the analysis graph seams.

use log::debug;
use moodwave::platform::{
    AnalyserHandle, AudioContextHandle, AudioPlatform, ContextState, LatencyHint,
};
use moodwave::PlatformError;
use wasm_bindgen::JsValue;
use web_sys::{AnalyserNode, AudioContext, AudioContextOptions, AudioContextState, MediaElementAudioSourceNode};

use crate::element::{js_error_message, WebMediaElement};

pub struct WebContext(AudioContext);

impl WebContext {
    pub fn inner(&self) -> &AudioContext {
        &self.0
    }
}

impl AudioContextHandle for WebContext {
    fn state(&self) -> ContextState {
        match self.0.state() {
            AudioContextState::Running => ContextState::Running,
            AudioContextState::Closed => ContextState::Closed,
            _ => ContextState::Suspended,
        }
    }

    fn resume(&self) {
        if let Err(error) = self.0.resume() {
            debug!("WebContext: resume rejected: {}", js_error_message(&error));
        }
    }
}

pub struct WebAnalyser(AnalyserNode);

impl AnalyserHandle for WebAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.0.frequency_bin_count() as usize
    }

    fn byte_frequency_data(&self, out: &mut [u8]) {
        self.0.get_byte_frequency_data(out);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebAudioPlatform;

impl AudioPlatform for WebAudioPlatform {
    type Element = WebMediaElement;
    type Context = WebContext;
    type Analyser = WebAnalyser;
    type Source = MediaElementAudioSourceNode;

    fn create_context(&self, latency: LatencyHint) -> Result<WebContext, PlatformError> {
        let options = AudioContextOptions::new();
        options.set_latency_hint(&JsValue::from_str(latency.as_str()));
        AudioContext::new_with_context_options(&options)
            .map(WebContext)
            .map_err(|error| PlatformError::Unsupported(js_error_message(&error)))
    }

    fn create_analyser(
        &self,
        context: &WebContext,
        fft_size: u32,
        smoothing: f64,
    ) -> Result<WebAnalyser, PlatformError> {
        let analyser = context.0.create_analyser().map_err(js_failure)?;
        analyser.set_fft_size(fft_size);
        analyser.set_smoothing_time_constant(smoothing);
        Ok(WebAnalyser(analyser))
    }

    fn create_media_element_source(
        &self,
        context: &WebContext,
        element: &WebMediaElement,
    ) -> Result<MediaElementAudioSourceNode, PlatformError> {
        context
            .0
            .create_media_element_source(element.html())
            .map_err(|error| source_failure(&js_error_message(&error)))
    }

    fn connect_source(
        &self,
        source: &MediaElementAudioSourceNode,
        analyser: &WebAnalyser,
    ) -> Result<(), PlatformError> {
        source
            .connect_with_audio_node(&analyser.0)
            .map(drop)
            .map_err(js_failure)
    }

    fn connect_destination(&self, context: &WebContext, analyser: &WebAnalyser) -> Result<(), PlatformError> {
        analyser
            .0
            .connect_with_audio_node(&context.0.destination())
            .map(drop)
            .map_err(js_failure)
    }

    fn disconnect_source(&self, source: &MediaElementAudioSourceNode) {
        source.disconnect().ok();
    }
}

#[allow(clippy::needless_pass_by_value)]
fn js_failure(error: JsValue) -> PlatformError {
    PlatformError::Js(js_error_message(&error))
}

/// Browsers refuse a second source node per element with an
/// `InvalidStateError` mentioning the existing connection.
pub(crate) fn source_failure(message: &str) -> PlatformError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("already connected") || lowered.contains("already been connected") {
        PlatformError::AlreadyConnected
    } else {
        PlatformError::Js(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_rebind_message_is_already_connected() {
        let message = "InvalidStateError: Failed to execute 'createMediaElementSource' on \
                       'AudioContext': HTMLMediaElement already connected previously to a \
                       different MediaElementSourceNode.";
        assert!(matches!(source_failure(message), PlatformError::AlreadyConnected));
    }

    #[test]
    fn firefox_rebind_message_is_already_connected() {
        let message = "InvalidStateError: The HTMLMediaElement passed to createMediaElementSource \
                       has already been connected";
        assert!(matches!(source_failure(message), PlatformError::AlreadyConnected));
    }

    #[test]
    fn other_source_errors_pass_through() {
        assert!(matches!(
            source_failure("NotSupportedError: cross-origin"),
            PlatformError::Js(message) if message == "NotSupportedError: cross-origin"
        ));
    }
}
