//! Playback engine: sole owner of the media element.
//!
//! A track change is committed in two phases. `commit_track` swaps the source
//! and emits [`SessionEvent::TrackChanged`]; only then does
//! `commit_play_intent` flip the play flag and emit
//! [`SessionEvent::PlayIntentChanged`] tagged with the same track version.
//! Events queue up in order and the owner drains them after each command, so
//! observers never run while the engine is mid-update.

use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::catalog::Track;
use crate::error::PlaybackError;
use crate::graph::SharedGraph;
use crate::platform::{AudioPlatform, MediaElement, MediaEvent, PlayOutcome, PlayRequestId};

/// Lifecycle of the play request for the loaded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Idle,
    /// One request in flight; only its settlement is honoured.
    Requested(PlayRequestId),
    Playing,
    /// Blocked by autoplay policy. Waits for an explicit user command.
    Rejected,
    /// Superseded by a load; replayed once when metadata arrives.
    Deferred,
}

/// Observable state of the session, as handed to rendering collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSession {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub context_ready: bool,
    pub pending_play_request: bool,
    pub track_version: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TrackChanged { track_id: String, version: u64 },
    PlayIntentChanged { playing: bool, version: u64 },
    PlaybackFailed(PlaybackError),
}

pub struct PlaybackEngine<P: AudioPlatform> {
    element: Rc<P::Element>,
    graph: SharedGraph<P>,
    current_track: Option<Track>,
    is_playing: bool,
    current_time: f64,
    duration: f64,
    volume: f64,
    context_ready: bool,
    play_state: PlayState,
    last_request: u64,
    track_version: u64,
    events: VecDeque<SessionEvent>,
}

impl<P: AudioPlatform> PlaybackEngine<P> {
    pub fn new(element: Rc<P::Element>, graph: SharedGraph<P>, volume: f64) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        element.set_volume(volume);
        Self {
            element,
            graph,
            current_track: None,
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume,
            context_ready: false,
            play_state: PlayState::Idle,
            last_request: 0,
            track_version: 0,
            events: VecDeque::new(),
        }
    }

    pub fn element(&self) -> &Rc<P::Element> {
        &self.element
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn snapshot(&self) -> PlaybackSession {
        PlaybackSession {
            current_track: self.current_track.clone(),
            is_playing: self.is_playing,
            current_time: self.current_time,
            duration: self.duration,
            volume: self.volume,
            context_ready: self.context_ready,
            pending_play_request: self.play_state == PlayState::Deferred,
            track_version: self.track_version,
        }
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    /// Creates or resumes the audio context. Safe to call repeatedly.
    pub fn initialize_context(&mut self) {
        match self.graph.ensure_context() {
            Ok(()) => {
                if !self.context_ready {
                    info!("PlaybackEngine: audio context ready");
                }
                self.context_ready = true;
            }
            Err(e) => warn!("PlaybackEngine: audio context unavailable: {e}"),
        }
    }

    /// Loads `track` and starts it. Replaying the current track toggles instead.
    pub fn load_and_play(&mut self, track: Track) {
        self.initialize_context();
        if self.is_current(&track) {
            self.toggle_play_pause();
            return;
        }
        self.commit_track(track);
        self.commit_play_intent(true);
    }

    /// Queue navigation entry point: landing on the current track restarts it.
    pub fn play_from_queue(&mut self, track: Track) {
        self.initialize_context();
        if self.is_current(&track) {
            self.seek(0.0);
            if !self.is_playing {
                self.commit_play_intent(true);
            }
            return;
        }
        self.commit_track(track);
        self.commit_play_intent(true);
    }

    pub fn toggle_play_pause(&mut self) {
        self.initialize_context();
        if self.current_track.is_none() {
            debug!("PlaybackEngine: toggle ignored, nothing loaded");
            return;
        }
        self.commit_play_intent(!self.is_playing);
    }

    /// Pauses and rewinds to the start.
    pub fn stop(&mut self) {
        if self.is_playing {
            self.commit_play_intent(false);
        } else {
            self.element.pause();
            self.play_state = PlayState::Idle;
        }
        self.element.set_current_time(0.0);
        self.current_time = 0.0;
    }

    pub fn seek(&mut self, seconds: f64) {
        let upper = if self.duration.is_finite() {
            self.duration.max(0.0)
        } else {
            0.0
        };
        let target = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, upper)
        };
        self.element.set_current_time(target);
        self.current_time = target;
    }

    pub fn set_volume(&mut self, volume: f64) {
        let volume = if volume.is_nan() {
            self.volume
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.volume = volume;
        self.element.set_volume(volume);
        debug!("PlaybackEngine: volume set to {volume:.2}");
    }

    pub fn handle_media_event(&mut self, event: &MediaEvent) {
        match event {
            MediaEvent::TimeUpdate(t) => {
                if t.is_finite() {
                    self.current_time = *t;
                }
            }
            MediaEvent::LoadedMetadata { duration } => self.on_loaded_metadata(*duration),
            MediaEvent::PlaySettled { request, outcome } => self.on_play_settled(*request, outcome),
            MediaEvent::Error(message) => {
                error!("PlaybackEngine: media error: {message}");
                self.fail(PlaybackError::UnknownPlaybackError(message.clone()));
            }
            // Queue-level concern, handled by the session.
            MediaEvent::Ended => {}
        }
    }

    fn is_current(&self, track: &Track) -> bool {
        self.current_track.as_ref().is_some_and(|t| t.id == track.id)
    }

    fn commit_track(&mut self, track: Track) {
        self.element.pause();
        // Any request still in flight now settles against a stale id.
        self.play_state = PlayState::Idle;
        self.element.set_src(&track.source_uri);
        self.element.load();
        self.current_time = 0.0;
        self.duration = track.duration_hint;
        self.track_version += 1;
        info!("PlaybackEngine: loading '{}' ({})", track.title, track.source_uri);
        self.events.push_back(SessionEvent::TrackChanged {
            track_id: track.id.clone(),
            version: self.track_version,
        });
        self.current_track = Some(track);
    }

    fn commit_play_intent(&mut self, playing: bool) {
        self.is_playing = playing;
        self.events.push_back(SessionEvent::PlayIntentChanged {
            playing,
            version: self.track_version,
        });
        if playing {
            self.issue_play();
        } else {
            self.element.pause();
            self.play_state = PlayState::Idle;
        }
    }

    fn issue_play(&mut self) {
        self.last_request += 1;
        let request = PlayRequestId(self.last_request);
        self.play_state = PlayState::Requested(request);
        self.element.play(request);
    }

    fn on_loaded_metadata(&mut self, duration: f64) {
        if duration.is_finite() {
            self.duration = duration;
        }
        debug!("PlaybackEngine: metadata loaded, duration {duration:.1}s");
        if self.play_state == PlayState::Deferred {
            if self.is_playing {
                info!("PlaybackEngine: replaying deferred play request");
                self.issue_play();
            } else {
                self.play_state = PlayState::Idle;
            }
        }
    }

    fn on_play_settled(&mut self, request: PlayRequestId, outcome: &PlayOutcome) {
        if self.play_state != PlayState::Requested(request) {
            debug!("PlaybackEngine: ignoring stale settlement of {request:?}");
            return;
        }
        match outcome {
            PlayOutcome::Started => {
                self.play_state = PlayState::Playing;
                debug!("PlaybackEngine: playback started");
            }
            PlayOutcome::Aborted => {
                debug!("PlaybackEngine: {}; waiting for metadata", PlaybackError::RequestSuperseded);
                self.play_state = PlayState::Deferred;
            }
            PlayOutcome::NotAllowed => {
                warn!("PlaybackEngine: play not allowed, user interaction required");
                self.set_stopped_intent();
                self.play_state = PlayState::Rejected;
                self.events
                    .push_back(SessionEvent::PlaybackFailed(PlaybackError::PermissionDenied));
            }
            PlayOutcome::Failed(message) => {
                error!("PlaybackEngine: play failed: {message}");
                self.fail(PlaybackError::UnknownPlaybackError(message.clone()));
            }
        }
    }

    fn fail(&mut self, error: PlaybackError) {
        self.set_stopped_intent();
        self.play_state = PlayState::Idle;
        self.events.push_back(SessionEvent::PlaybackFailed(error));
    }

    fn set_stopped_intent(&mut self) {
        if self.is_playing {
            self.is_playing = false;
            self.events.push_back(SessionEvent::PlayIntentChanged {
                playing: false,
                version: self.track_version,
            });
        }
    }
}
