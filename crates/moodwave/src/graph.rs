//! Shared analysis graph: source → analyser → destination.
//!
//! One graph per application, created by the composition root and handed to
//! the engine and to every sampler through [`SharedGraph`]. It is the only
//! place where audio nodes are created or disconnected.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::config::AnalyserSettings;
use crate::error::{PlatformError, PlaybackError};
use crate::platform::{AnalyserHandle, AudioContextHandle, AudioPlatform, ContextState, ElementId, MediaElement};

/// Handle of one attached visualization consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumerId(u64);

pub struct AnalysisGraph<P: AudioPlatform> {
    platform: P,
    settings: AnalyserSettings,
    context: Option<P::Context>,
    analyser: Option<P::Analyser>,
    /// A source node exists at most once per element, for the life of the graph.
    sources: HashMap<ElementId, P::Source>,
    bound: Option<ElementId>,
    connected: bool,
    failed: HashMap<ElementId, String>,
    consumers: BTreeSet<ConsumerId>,
    next_consumer: u64,
}

impl<P: AudioPlatform> AnalysisGraph<P> {
    fn new(platform: P, settings: AnalyserSettings) -> Self {
        Self {
            platform,
            settings,
            context: None,
            analyser: None,
            sources: HashMap::new(),
            bound: None,
            connected: false,
            failed: HashMap::new(),
            consumers: BTreeSet::new(),
            next_consumer: 0,
        }
    }

    fn ensure_context(&mut self) -> Result<&P::Context, PlatformError> {
        if self.context.is_none() {
            let context = self.platform.create_context(self.settings.latency)?;
            info!("AnalysisGraph: audio context created");
            self.context = Some(context);
        }
        let Some(context) = self.context.as_ref() else {
            return Err(PlatformError::Unsupported("AudioContext".into()));
        };
        if context.state() == ContextState::Suspended {
            debug!("AnalysisGraph: resuming suspended context");
            context.resume();
        }
        Ok(context)
    }

    fn ensure_analyser(&mut self) -> Result<(), PlatformError> {
        if self.analyser.is_some() {
            return Ok(());
        }
        self.ensure_context()?;
        let Some(context) = self.context.as_ref() else {
            return Err(PlatformError::Unsupported("AudioContext".into()));
        };
        let analyser =
            self.platform
                .create_analyser(context, self.settings.fft_size, self.settings.smoothing)?;
        debug!(
            "AnalysisGraph: analyser created ({} bins)",
            analyser.frequency_bin_count()
        );
        self.analyser = Some(analyser);
        Ok(())
    }

    fn release_bound_source(&mut self) {
        if let Some(previous) = self.bound.take() {
            if let Some(source) = self.sources.get(&previous) {
                self.platform.disconnect_source(source);
                debug!("AnalysisGraph: disconnected source of {previous}");
            }
        }
        self.connected = false;
    }

    fn ensure_connected(&mut self, element: &P::Element) -> Result<(), PlaybackError> {
        let id = element.element_id();
        if let Some(reason) = self.failed.get(&id) {
            return Err(PlaybackError::GraphConnectionFailure {
                element: id,
                reason: reason.clone(),
            });
        }
        let failure = |e: PlatformError| PlaybackError::GraphConnectionFailure {
            element: id,
            reason: e.to_string(),
        };
        self.ensure_context().map_err(failure)?;
        self.ensure_analyser().map_err(failure)?;

        if self.connected && self.bound == Some(id) {
            return Ok(());
        }
        // Old node must be fully detached before the new one is wired.
        self.release_bound_source();

        if !self.sources.contains_key(&id) {
            let Some(context) = self.context.as_ref() else {
                return Err(failure(PlatformError::Unsupported("AudioContext".into())));
            };
            match self.platform.create_media_element_source(context, element) {
                Ok(source) => {
                    self.sources.insert(id, source);
                }
                Err(PlatformError::AlreadyConnected) => {
                    info!("AnalysisGraph: {id} already connected, reusing existing wiring");
                    self.bound = Some(id);
                    self.connected = true;
                    return Ok(());
                }
                Err(e) => return Err(self.mark_failed(id, &e)),
            }
        }

        if let (Some(source), Some(analyser), Some(context)) = (
            self.sources.get(&id),
            self.analyser.as_ref(),
            self.context.as_ref(),
        ) {
            let wired = self
                .platform
                .connect_source(source, analyser)
                .and_then(|()| self.platform.connect_destination(context, analyser));
            if let Err(e) = wired {
                return Err(self.mark_failed(id, &e));
            }
        }

        self.bound = Some(id);
        self.connected = true;
        info!("AnalysisGraph: connected {id}");
        Ok(())
    }

    fn mark_failed(&mut self, id: ElementId, error: &PlatformError) -> PlaybackError {
        warn!("AnalysisGraph: connecting {id} failed: {error}");
        self.failed.insert(id, error.to_string());
        PlaybackError::GraphConnectionFailure {
            element: id,
            reason: error.to_string(),
        }
    }

    fn attach(&mut self) -> ConsumerId {
        self.next_consumer += 1;
        let id = ConsumerId(self.next_consumer);
        self.consumers.insert(id);
        id
    }

    fn detach(&mut self, consumer: ConsumerId, full_disconnect: bool) {
        if !self.consumers.remove(&consumer) {
            return;
        }
        if self.consumers.is_empty() && full_disconnect && self.connected {
            self.release_bound_source();
            info!("AnalysisGraph: last consumer left, graph disconnected");
        }
    }
}

/// Reference-counted handle to the application's single analysis graph.
pub struct SharedGraph<P: AudioPlatform> {
    inner: Rc<RefCell<AnalysisGraph<P>>>,
}

impl<P: AudioPlatform> Clone for SharedGraph<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: AudioPlatform> SharedGraph<P> {
    pub fn new(platform: P, settings: AnalyserSettings) -> Self {
        Self {
            inner: Rc::new(RefCell::new(AnalysisGraph::new(platform, settings))),
        }
    }

    /// Creates the audio context on first use and resumes it when suspended.
    /// Call from a user-gesture handler; browsers keep the context suspended otherwise.
    pub fn ensure_context(&self) -> Result<(), PlatformError> {
        self.inner.borrow_mut().ensure_context().map(|_| ())
    }

    pub fn context_state(&self) -> Option<ContextState> {
        self.inner.borrow().context.as_ref().map(AudioContextHandle::state)
    }

    /// Idempotently routes `element` through the analyser.
    pub fn ensure_connected(&self, element: &P::Element) -> Result<(), PlaybackError> {
        self.inner.borrow_mut().ensure_connected(element)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.borrow().connected
    }

    pub fn is_connected_to(&self, element: ElementId) -> bool {
        let g = self.inner.borrow();
        g.connected && g.bound == Some(element)
    }

    pub fn bound_element(&self) -> Option<ElementId> {
        self.inner.borrow().bound
    }

    pub fn has_failed(&self, element: ElementId) -> bool {
        self.inner.borrow().failed.contains_key(&element)
    }

    pub fn attach(&self) -> ConsumerId {
        self.inner.borrow_mut().attach()
    }

    /// Releases `consumer`. The graph is disconnected only when it was the last
    /// one and `full_disconnect` is set.
    pub fn detach(&self, consumer: ConsumerId, full_disconnect: bool) {
        self.inner.borrow_mut().detach(consumer, full_disconnect);
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.borrow().consumers.len()
    }

    /// Copies the analyser spectrum into `out`, resizing it to the bin count.
    /// Returns `false` when there is nothing connected to read from.
    pub fn read_frequency_data(&self, out: &mut Vec<u8>) -> bool {
        let g = self.inner.borrow();
        match (&g.analyser, g.connected) {
            (Some(analyser), true) => {
                out.resize(analyser.frequency_bin_count(), 0);
                analyser.byte_frequency_data(out);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::{FakeElement, FakePlatform};

    fn graph() -> (SharedGraph<FakePlatform>, FakePlatform) {
        let platform = FakePlatform::new();
        (
            SharedGraph::new(platform.clone(), AnalyserSettings::default()),
            platform,
        )
    }

    #[test]
    fn ensure_connected_is_idempotent() {
        let (graph, platform) = graph();
        let a = FakeElement::new(1);
        graph.ensure_connected(&a).unwrap();
        graph.ensure_connected(&a).unwrap();
        assert!(graph.is_connected());
        assert_eq!(platform.log.sources.borrow().len(), 1);
        assert_eq!(platform.log.analysers.get(), 1);
        assert_eq!(platform.log.contexts.get(), 1);
    }

    #[test]
    fn rebinding_disconnects_previous_source() {
        let (graph, platform) = graph();
        let a = FakeElement::new(1);
        let b = FakeElement::new(2);
        graph.ensure_connected(&a).unwrap();
        graph.ensure_connected(&b).unwrap();
        assert_eq!(*platform.log.disconnects.borrow(), vec![1]);
        assert_eq!(platform.log.active_sources(), vec![2]);
        assert!(graph.is_connected_to(ElementId(2)));
        assert_eq!(platform.log.analysers.get(), 1);
    }

    #[test]
    fn rebinding_back_reuses_the_element_source() {
        let (graph, platform) = graph();
        let a = FakeElement::new(1);
        let b = FakeElement::new(2);
        graph.ensure_connected(&a).unwrap();
        graph.ensure_connected(&b).unwrap();
        graph.ensure_connected(&a).unwrap();
        assert_eq!(platform.log.sources.borrow().len(), 2);
        assert_eq!(platform.log.active_sources(), vec![1]);
    }

    #[test]
    fn already_connected_counts_as_success() {
        let (graph, platform) = graph();
        let a = FakeElement::new(1);
        platform.log.already_connected.borrow_mut().insert(ElementId(1));
        assert!(graph.ensure_connected(&a).is_ok());
        assert!(graph.is_connected_to(ElementId(1)));
    }

    #[test]
    fn failed_element_stays_failed() {
        let (graph, platform) = graph();
        let a = FakeElement::new(1);
        platform.log.reject_elements.borrow_mut().insert(ElementId(1));
        let err = graph.ensure_connected(&a).unwrap_err();
        assert!(matches!(err, PlaybackError::GraphConnectionFailure { .. }));
        platform.log.reject_elements.borrow_mut().clear();
        assert!(graph.ensure_connected(&a).is_err());
        assert!(graph.has_failed(ElementId(1)));
        assert!(!graph.is_connected());
    }

    #[test]
    fn context_failure_is_reported() {
        let (graph, platform) = graph();
        platform.log.fail_context.set(true);
        assert!(graph.ensure_context().is_err());
        assert!(graph.ensure_connected(&FakeElement::new(1)).is_err());
        assert!(!graph.has_failed(ElementId(1)));
    }

    #[test]
    fn suspended_context_is_resumed() {
        let (graph, platform) = graph();
        graph.ensure_context().unwrap();
        assert_eq!(platform.log.resumes.get(), 1);
        assert_eq!(graph.context_state(), Some(ContextState::Running));
        graph.ensure_context().unwrap();
        assert_eq!(platform.log.resumes.get(), 1);
    }

    #[test]
    fn teardown_waits_for_last_consumer_and_explicit_request() {
        let (graph, platform) = graph();
        let a = FakeElement::new(1);
        let first = graph.attach();
        let second = graph.attach();
        graph.ensure_connected(&a).unwrap();

        graph.detach(first, true);
        assert!(graph.is_connected());
        graph.detach(second, false);
        assert!(graph.is_connected());
        assert_eq!(graph.consumer_count(), 0);

        let third = graph.attach();
        graph.detach(third, true);
        assert!(!graph.is_connected());
        assert_eq!(platform.log.active_sources(), Vec::<u32>::new());

        // Reconnecting reuses the node that already exists for the element.
        graph.ensure_connected(&a).unwrap();
        assert_eq!(platform.log.sources.borrow().len(), 1);
        assert!(graph.is_connected());
    }

    #[test]
    fn reads_spectrum_only_when_connected() {
        let (graph, platform) = graph();
        let mut out = Vec::new();
        assert!(!graph.read_frequency_data(&mut out));
        *platform.log.spectrum.borrow_mut() = vec![9; 128];
        graph.ensure_connected(&FakeElement::new(1)).unwrap();
        assert!(graph.read_frequency_data(&mut out));
        assert_eq!(out.len(), 128);
        assert!(out.iter().all(|&v| v == 9));
    }
}
