//! `HtmlAudioElement` behind the [`MediaElement`] seam.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use moodwave::platform::{ElementId, MediaElement, MediaEvent, PlayOutcome, PlayRequestId};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{EventTarget, HtmlAudioElement};

pub type EventSink = Rc<dyn Fn(MediaEvent)>;

static NEXT_ELEMENT: AtomicU64 = AtomicU64::new(1);

struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

pub struct WebMediaElement {
    id: ElementId,
    audio: HtmlAudioElement,
    sink: Rc<RefCell<Option<EventSink>>>,
    listeners: RefCell<Vec<Listener>>,
}

impl WebMediaElement {
    /// Creates a detached audio element configured for streaming.
    pub fn new() -> Result<Self, JsValue> {
        let audio = HtmlAudioElement::new()?;
        let id = ElementId(NEXT_ELEMENT.fetch_add(1, Ordering::Relaxed));
        audio.set_id(&format!("moodwave-audio-{}", id.0));
        audio.set_cross_origin(Some("anonymous"));
        audio.set_preload("metadata");
        audio.set_autoplay(false);
        audio.set_attribute("playsinline", "true")?;
        Ok(Self {
            id,
            audio,
            sink: Rc::new(RefCell::new(None)),
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn html(&self) -> &HtmlAudioElement {
        &self.audio
    }

    /// Routes the element's DOM events to `sink`. Replaces any previous sink.
    pub fn set_event_sink(&self, sink: EventSink) -> Result<(), JsValue> {
        *self.sink.borrow_mut() = Some(sink);
        if !self.listeners.borrow().is_empty() {
            return Ok(());
        }

        let target: EventTarget = self.audio.clone().into();
        let audio = self.audio.clone();
        self.listen(&target, "timeupdate", move || MediaEvent::TimeUpdate(audio.current_time()))?;
        let audio = self.audio.clone();
        self.listen(&target, "loadedmetadata", move || MediaEvent::LoadedMetadata {
            duration: audio.duration(),
        })?;
        self.listen(&target, "ended", || MediaEvent::Ended)?;
        let audio = self.audio.clone();
        self.listen(&target, "error", move || MediaEvent::Error(describe_media_error(&audio)))?;

        if let Some(window) = web_sys::window() {
            let audio = self.audio.clone();
            let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
                // Stop any stream before the page goes away.
                audio.pause().ok();
                audio.set_src("");
            });
            let target: EventTarget = window.into();
            target.add_event_listener_with_callback("beforeunload", closure.as_ref().unchecked_ref())?;
            self.listeners.borrow_mut().push(Listener {
                target,
                kind: "beforeunload",
                closure,
            });
        }
        Ok(())
    }

    fn listen(
        &self,
        target: &EventTarget,
        kind: &'static str,
        make_event: impl Fn() -> MediaEvent + 'static,
    ) -> Result<(), JsValue> {
        let sink = Rc::clone(&self.sink);
        let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
            let current = sink.borrow().clone();
            if let Some(deliver) = current {
                deliver(make_event());
            }
        });
        target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
        self.listeners.borrow_mut().push(Listener {
            target: target.clone(),
            kind,
            closure,
        });
        Ok(())
    }

    fn settle(&self, request: PlayRequestId, promise: Result<js_sys::Promise, JsValue>) {
        let sink = Rc::clone(&self.sink);
        // Settlement always arrives on a later microtask, never inside the caller's borrow.
        spawn_local(async move {
            let outcome = match promise {
                Ok(promise) => match JsFuture::from(promise).await {
                    Ok(_) => PlayOutcome::Started,
                    Err(error) => outcome_from_js(&error),
                },
                Err(error) => outcome_from_js(&error),
            };
            let current = sink.borrow().clone();
            match current {
                Some(deliver) => deliver(MediaEvent::PlaySettled { request, outcome }),
                None => debug!("WebMediaElement: play settled with no sink attached"),
            }
        });
    }
}

impl MediaElement for WebMediaElement {
    fn element_id(&self) -> ElementId {
        self.id
    }

    fn set_src(&self, uri: &str) {
        self.audio.set_src(uri);
    }

    fn load(&self) {
        self.audio.load();
    }

    fn play(&self, request: PlayRequestId) {
        self.settle(request, self.audio.play());
    }

    fn pause(&self) {
        if let Err(error) = self.audio.pause() {
            warn!("WebMediaElement: pause failed: {}", js_error_message(&error));
        }
    }

    fn is_paused(&self) -> bool {
        self.audio.paused()
    }

    fn current_time(&self) -> f64 {
        self.audio.current_time()
    }

    fn set_current_time(&self, seconds: f64) {
        self.audio.set_current_time(seconds);
    }

    fn duration(&self) -> f64 {
        self.audio.duration()
    }

    fn set_volume(&self, volume: f64) {
        self.audio.set_volume(volume);
    }
}

impl Drop for WebMediaElement {
    fn drop(&mut self) {
        for listener in self.listeners.get_mut().drain(..) {
            listener
                .target
                .remove_event_listener_with_callback(listener.kind, listener.closure.as_ref().unchecked_ref())
                .ok();
        }
        self.audio.pause().ok();
    }
}

fn describe_media_error(audio: &HtmlAudioElement) -> String {
    match audio.error() {
        Some(error) => format!("media error code {}: {}", error.code(), error.message()),
        None => "media error".to_owned(),
    }
}

fn outcome_from_js(error: &JsValue) -> PlayOutcome {
    match error.dyn_ref::<web_sys::DomException>() {
        Some(exception) => play_outcome(&exception.name(), &exception.message()),
        None => PlayOutcome::Failed(js_error_message(error)),
    }
}

/// Maps a rejected `play()` promise onto an outcome by DOM exception name.
pub(crate) fn play_outcome(name: &str, message: &str) -> PlayOutcome {
    match name {
        "NotAllowedError" => PlayOutcome::NotAllowed,
        "AbortError" => PlayOutcome::Aborted,
        _ if message.is_empty() => PlayOutcome::Failed(name.to_owned()),
        _ => PlayOutcome::Failed(format!("{name}: {message}")),
    }
}

pub(crate) fn js_error_message(error: &JsValue) -> String {
    if let Some(exception) = error.dyn_ref::<web_sys::DomException>() {
        return format!("{}: {}", exception.name(), exception.message());
    }
    if let Some(error) = error.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    error.as_string().unwrap_or_else(|| format!("{error:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autoplay_block_maps_to_not_allowed() {
        assert_eq!(play_outcome("NotAllowedError", "play() failed"), PlayOutcome::NotAllowed);
    }

    #[test]
    fn interrupted_load_maps_to_aborted() {
        assert_eq!(play_outcome("AbortError", ""), PlayOutcome::Aborted);
    }

    #[test]
    fn other_exceptions_keep_their_name() {
        assert_eq!(
            play_outcome("NotSupportedError", "no supported source"),
            PlayOutcome::Failed("NotSupportedError: no supported source".into())
        );
        assert_eq!(play_outcome("NetworkError", ""), PlayOutcome::Failed("NetworkError".into()));
    }
}
