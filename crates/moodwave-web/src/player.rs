//! JavaScript-facing player API.
//!
//! Every command borrows the session, runs, releases the borrow, and only then
//! hands the drained [`SessionEvent`]s to the registered listener. Listeners
//! may therefore call straight back into the player.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{info, warn};
use moodwave::platform::MediaEvent;
use moodwave::{
    format_time, AudioSession, Catalog, PlaybackError, SessionConfig, SessionEvent, Track,
    VisualizationSampler,
};
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::element::WebMediaElement;
use crate::frame_loop::FrameLoop;
use crate::platform::WebAudioPlatform;

type WebSession = AudioSession<WebAudioPlatform>;
type Listener = Rc<RefCell<Option<js_sys::Function>>>;

#[wasm_bindgen]
pub struct MoodPlayer {
    session: Rc<RefCell<WebSession>>,
    listener: Listener,
}

#[wasm_bindgen]
impl MoodPlayer {
    /// `config_json` may be omitted for the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(catalog_json: &str, config_json: Option<String>) -> Result<MoodPlayer, JsValue> {
        let catalog = Catalog::from_json(catalog_json).map_err(to_js_error)?;
        let config = match config_json.as_deref() {
            Some(json) if !json.trim().is_empty() => SessionConfig::from_json(json).map_err(to_js_error)?,
            _ => SessionConfig::default(),
        };
        let element = Rc::new(WebMediaElement::new()?);
        let track_count = catalog.len();
        let session = Rc::new(RefCell::new(AudioSession::new(
            WebAudioPlatform,
            Rc::clone(&element),
            catalog,
            config,
        )));
        let listener: Listener = Rc::new(RefCell::new(None));

        let weak = Rc::downgrade(&session);
        let sink_listener = Rc::clone(&listener);
        element.set_event_sink(Rc::new(move |event: MediaEvent| {
            deliver_media_event(&weak, &sink_listener, event);
        }))?;

        info!("MoodPlayer: ready with {track_count} tracks");
        Ok(Self { session, listener })
    }

    /// Registers the single event listener. Replaces any earlier one.
    #[wasm_bindgen(js_name = onEvent)]
    pub fn on_event(&self, callback: &js_sys::Function) {
        *self.listener.borrow_mut() = Some(callback.clone());
    }

    /// Returns false when `id` is not in the catalog.
    #[wasm_bindgen(js_name = playTrack)]
    pub fn play_track(&self, id: &str, create_new_queue: Option<bool>) -> bool {
        self.command(|s| s.play_track_by_id(id, create_new_queue.unwrap_or(true)))
    }

    #[wasm_bindgen(js_name = togglePlayPause)]
    pub fn toggle_play_pause(&self) {
        self.command(WebSession::toggle_play_pause);
    }

    pub fn seek(&self, seconds: f64) {
        self.command(|s| s.seek(seconds));
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f64) {
        self.command(|s| s.set_volume(volume));
    }

    pub fn next(&self) {
        self.command(WebSession::next);
    }

    pub fn previous(&self) {
        self.command(WebSession::previous);
    }

    /// Call from a click or key handler so the audio context may start.
    #[wasm_bindgen(js_name = userGesture)]
    pub fn user_gesture(&self) {
        self.command(WebSession::on_user_gesture);
    }

    /// Current [`moodwave::PlaybackSession`] as a plain object.
    pub fn state(&self) -> Result<JsValue, JsValue> {
        let snapshot = self.session.borrow().snapshot();
        to_js_value(&serde_json::to_value(snapshot).map_err(to_js_error)?)
    }

    pub fn queue(&self) -> Result<JsValue, JsValue> {
        let value = queue_json(&self.session.borrow());
        to_js_value(&value)
    }

    pub fn tracks(&self) -> Result<JsValue, JsValue> {
        let value = serde_json::to_value(self.session.borrow().catalog().tracks()).map_err(to_js_error)?;
        to_js_value(&value)
    }

    /// Up to `limit` other tracks sharing the mood of `id`.
    pub fn recommendations(&self, id: &str, limit: Option<u32>) -> Result<JsValue, JsValue> {
        let session = self.session.borrow();
        let picks: Vec<Track> = session
            .catalog()
            .find(id)
            .map(|track| session.catalog().recommended_for(track, limit.map_or(3, |l| l as usize)))
            .unwrap_or_default();
        to_js_value(&serde_json::to_value(picks).map_err(to_js_error)?)
    }

    /// Starts a visualization consumer that calls `callback(Uint8Array)` once per sampled frame.
    #[wasm_bindgen(js_name = attachVisualizer)]
    pub fn attach_visualizer(&self, callback: &js_sys::Function) -> Result<VisualizerHandle, JsValue> {
        let sampler = Rc::new(RefCell::new(self.session.borrow().spawn_sampler()));
        let frame_sampler = Rc::clone(&sampler);
        let callback = callback.clone();
        let frame_loop = FrameLoop::start(move |timestamp| {
            let bins = match frame_sampler.try_borrow_mut() {
                Ok(mut sampler) => sampler.tick(timestamp).map(|snapshot| js_sys::Uint8Array::from(snapshot.bins())),
                Err(_) => None,
            };
            if let Some(bins) = bins {
                if let Err(error) = callback.call1(&JsValue::NULL, &bins) {
                    warn!("MoodPlayer: visualizer callback threw: {error:?}");
                }
            }
        })?;
        Ok(VisualizerHandle {
            frame_loop: Some(frame_loop),
            sampler,
        })
    }

    #[wasm_bindgen(js_name = formatTime)]
    pub fn format_time(seconds: f64) -> String {
        format_time(seconds)
    }

    #[wasm_bindgen(js_name = setLogLevel)]
    pub fn set_log_level(level: &str) {
        crate::logger::init(crate::logger::parse_level(level));
    }
}

impl MoodPlayer {
    fn command<R>(&self, run: impl FnOnce(&mut WebSession) -> R) -> R {
        let (result, events) = {
            let mut session = self.session.borrow_mut();
            let result = run(&mut session);
            (result, session.drain_events())
        };
        dispatch(&self.listener, &events);
        result
    }
}

/// Handle for one visualization consumer.
#[wasm_bindgen]
pub struct VisualizerHandle {
    frame_loop: Option<FrameLoop>,
    sampler: Rc<RefCell<VisualizationSampler<WebAudioPlatform>>>,
}

#[wasm_bindgen]
impl VisualizerHandle {
    /// Stops sampling. With `full_disconnect` and no other consumer left, the
    /// element's source node is disconnected too.
    pub fn detach(&mut self, full_disconnect: Option<bool>) {
        if let Some(frame_loop) = self.frame_loop.take() {
            frame_loop.stop();
        }
        if let Ok(mut sampler) = self.sampler.try_borrow_mut() {
            sampler.cancel(full_disconnect.unwrap_or(false));
        }
    }

    #[wasm_bindgen(js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.frame_loop.as_ref().is_some_and(FrameLoop::is_running)
    }

    /// `"real"` or `"synthetic"`.
    pub fn strategy(&self) -> String {
        match self.sampler.borrow().strategy() {
            moodwave::SnapshotStrategy::RealAnalysis => "real".to_owned(),
            moodwave::SnapshotStrategy::SyntheticFallback => "synthetic".to_owned(),
        }
    }
}

fn deliver_media_event(session: &Weak<RefCell<WebSession>>, listener: &Listener, event: MediaEvent) {
    let Some(strong) = session.upgrade() else { return };
    let events = match strong.try_borrow_mut() {
        Ok(mut session) => {
            session.handle_media_event(&event);
            session.drain_events()
        }
        Err(_) => {
            // A command is mid-flight; retry once it has returned.
            let session = session.clone();
            let listener = Rc::clone(listener);
            spawn_local(async move { deliver_media_event(&session, &listener, event) });
            return;
        }
    };
    dispatch(listener, &events);
}

fn dispatch(listener: &Listener, events: &[SessionEvent]) {
    if events.is_empty() {
        return;
    }
    let Some(callback) = listener.borrow().clone() else { return };
    for event in events {
        let payload = match to_js_value(&event_json(event)) {
            Ok(payload) => payload,
            Err(error) => {
                warn!("MoodPlayer: could not encode event: {error:?}");
                continue;
            }
        };
        if let Err(error) = callback.call1(&JsValue::NULL, &payload) {
            warn!("MoodPlayer: event listener threw: {error:?}");
        }
    }
}

pub(crate) fn event_json(event: &SessionEvent) -> Value {
    match event {
        SessionEvent::TrackChanged { track_id, version } => json!({
            "type": "trackChanged",
            "trackId": track_id,
            "version": version,
        }),
        SessionEvent::PlayIntentChanged { playing, version } => json!({
            "type": "playIntentChanged",
            "playing": playing,
            "version": version,
        }),
        SessionEvent::PlaybackFailed(error) => json!({
            "type": "playbackFailed",
            "kind": error_kind(error),
            "message": error.to_string(),
        }),
    }
}

fn error_kind(error: &PlaybackError) -> &'static str {
    match error {
        PlaybackError::PermissionDenied => "permissionDenied",
        PlaybackError::RequestSuperseded => "requestSuperseded",
        PlaybackError::GraphConnectionFailure { .. } => "graphConnectionFailure",
        PlaybackError::UnknownPlaybackError(_) => "unknown",
    }
}

fn queue_json(session: &WebSession) -> Value {
    let queue = session.queue();
    json!({
        "index": queue.index(),
        "trackIds": queue.tracks().iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
        "hasNext": queue.has_next(),
    })
}

fn to_js_value(value: &Value) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(&value.to_string())
}

#[allow(clippy::needless_pass_by_value)]
fn to_js_error(error: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&error.to_string()).into()
}
