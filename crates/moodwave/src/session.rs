//! Composition root: wires catalog, engine, queue and the shared graph.

use std::rc::Rc;

use log::debug;

use crate::catalog::{Catalog, Track};
use crate::config::SessionConfig;
use crate::engine::{PlaybackEngine, PlaybackSession, SessionEvent};
use crate::graph::SharedGraph;
use crate::platform::{AudioPlatform, MediaEvent};
use crate::queue::{Queue, QueueController, QueueStep};
use crate::sampler::VisualizationSampler;

pub struct AudioSession<P: AudioPlatform> {
    config: SessionConfig,
    catalog: Catalog,
    graph: SharedGraph<P>,
    engine: PlaybackEngine<P>,
    queue: QueueController,
}

impl<P: AudioPlatform> AudioSession<P> {
    pub fn new(platform: P, element: Rc<P::Element>, catalog: Catalog, config: SessionConfig) -> Self {
        let graph = SharedGraph::new(platform, config.analyser.clone());
        let engine = PlaybackEngine::new(element, graph.clone(), config.default_volume);
        let queue = QueueController::new(config.queue_policy, config.scrub_tolerance_secs);
        Self {
            config,
            catalog,
            graph,
            engine,
            queue,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn graph(&self) -> &SharedGraph<P> {
        &self.graph
    }

    pub fn engine(&self) -> &PlaybackEngine<P> {
        &self.engine
    }

    pub fn queue(&self) -> &Queue {
        self.queue.queue()
    }

    pub fn snapshot(&self) -> PlaybackSession {
        self.engine.snapshot()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.engine.drain_events()
    }

    /// Plays `track`. With `create_new_queue` the queue is rebuilt from the
    /// track's group; otherwise the current queue is left alone.
    pub fn play_track(&mut self, track: &Track, create_new_queue: bool) {
        if self.engine.current_track().is_some_and(|t| t.id == track.id) {
            self.engine.toggle_play_pause();
            return;
        }
        if create_new_queue {
            self.queue.play_with_new_queue(&self.catalog, track);
        }
        self.engine.load_and_play(track.clone());
    }

    /// Returns `false` when the id is not in the catalog.
    pub fn play_track_by_id(&mut self, id: &str, create_new_queue: bool) -> bool {
        let Some(track) = self.catalog.find(id).cloned() else {
            debug!("AudioSession: unknown track id '{id}'");
            return false;
        };
        self.play_track(&track, create_new_queue);
        true
    }

    pub fn toggle_play_pause(&mut self) {
        self.engine.toggle_play_pause();
    }

    pub fn seek(&mut self, seconds: f64) {
        self.engine.seek(seconds);
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.engine.set_volume(volume);
    }

    pub fn next(&mut self) {
        let current = self.engine.current_track().cloned();
        if let Some(track) = self.queue.next(&self.catalog, current.as_ref()) {
            self.engine.play_from_queue(track);
        }
    }

    pub fn previous(&mut self) {
        let current = self.engine.current_track().cloned();
        let step = self
            .queue
            .previous(&self.catalog, current.as_ref(), self.engine.current_time());
        match step {
            QueueStep::Load(track) => self.engine.play_from_queue(track),
            QueueStep::Restart => self.engine.seek(0.0),
            QueueStep::Nothing => {}
        }
    }

    /// Re-arms the audio context from a click or key handler.
    pub fn on_user_gesture(&mut self) {
        self.engine.initialize_context();
    }

    pub fn handle_media_event(&mut self, event: &MediaEvent) {
        if *event == MediaEvent::Ended {
            if self.queue.queue().has_next() {
                self.next();
            } else {
                debug!("AudioSession: end of queue");
                self.engine.stop();
            }
            return;
        }
        self.engine.handle_media_event(event);
    }

    /// Starts a new visualization consumer bound to the session's element.
    pub fn spawn_sampler(&self) -> VisualizationSampler<P> {
        VisualizationSampler::new(
            self.graph.clone(),
            Rc::clone(self.engine.element()),
            &self.config.sampler,
        )
    }
}
