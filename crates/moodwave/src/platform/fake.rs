//! In-memory platform used by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use super::{
    AnalyserHandle, AudioContextHandle, AudioPlatform, ContextState, ElementId, LatencyHint,
    MediaElement, PlayRequestId,
};
use crate::error::PlatformError;

#[derive(Debug)]
pub struct FakeElement {
    id: ElementId,
    pub src: RefCell<String>,
    pub loads: Cell<u32>,
    pub plays: RefCell<Vec<PlayRequestId>>,
    pub pauses: Cell<u32>,
    pub paused: Cell<bool>,
    pub position: Cell<f64>,
    pub length: Cell<f64>,
    pub volume: Cell<f64>,
}

impl FakeElement {
    pub fn new(id: u64) -> Self {
        Self {
            id: ElementId(id),
            src: RefCell::new(String::new()),
            loads: Cell::new(0),
            plays: RefCell::new(Vec::new()),
            pauses: Cell::new(0),
            paused: Cell::new(true),
            position: Cell::new(0.0),
            length: Cell::new(f64::NAN),
            volume: Cell::new(1.0),
        }
    }

    pub fn last_play(&self) -> Option<PlayRequestId> {
        self.plays.borrow().last().copied()
    }
}

impl MediaElement for FakeElement {
    fn element_id(&self) -> ElementId {
        self.id
    }

    fn set_src(&self, uri: &str) {
        *self.src.borrow_mut() = uri.to_string();
    }

    fn load(&self) {
        self.loads.set(self.loads.get() + 1);
        self.position.set(0.0);
    }

    fn play(&self, request: PlayRequestId) {
        self.plays.borrow_mut().push(request);
        self.paused.set(false);
    }

    fn pause(&self) {
        self.pauses.set(self.pauses.get() + 1);
        self.paused.set(true);
    }

    fn is_paused(&self) -> bool {
        self.paused.get()
    }

    fn current_time(&self) -> f64 {
        self.position.get()
    }

    fn set_current_time(&self, seconds: f64) {
        self.position.set(seconds);
    }

    fn duration(&self) -> f64 {
        self.length.get()
    }

    fn set_volume(&self, volume: f64) {
        self.volume.set(volume);
    }
}

/// Shared record of everything the fake platform was asked to do.
#[derive(Debug, Default)]
pub struct FakeLog {
    pub contexts: Cell<u32>,
    pub resumes: Cell<u32>,
    pub analysers: Cell<u32>,
    /// `(source id, element)` for every created source node.
    pub sources: RefCell<Vec<(u32, ElementId)>>,
    pub connected: RefCell<HashSet<u32>>,
    pub disconnects: RefCell<Vec<u32>>,
    pub start_running: Cell<bool>,
    pub fail_context: Cell<bool>,
    pub reject_elements: RefCell<HashSet<ElementId>>,
    pub already_connected: RefCell<HashSet<ElementId>>,
    pub spectrum: RefCell<Vec<u8>>,
}

impl FakeLog {
    pub fn active_sources(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.connected.borrow().iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[derive(Debug)]
pub struct FakeContext {
    log: Rc<FakeLog>,
    state: Cell<ContextState>,
}

impl AudioContextHandle for FakeContext {
    fn state(&self) -> ContextState {
        self.state.get()
    }

    fn resume(&self) {
        self.log.resumes.set(self.log.resumes.get() + 1);
        self.state.set(ContextState::Running);
    }
}

#[derive(Debug)]
pub struct FakeAnalyser {
    log: Rc<FakeLog>,
    bins: usize,
}

impl AnalyserHandle for FakeAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.bins
    }

    fn byte_frequency_data(&self, out: &mut [u8]) {
        let spectrum = self.log.spectrum.borrow();
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = spectrum.get(i).copied().unwrap_or(0);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePlatform {
    pub log: Rc<FakeLog>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioPlatform for FakePlatform {
    type Element = FakeElement;
    type Context = FakeContext;
    type Analyser = FakeAnalyser;
    type Source = u32;

    fn create_context(&self, _latency: LatencyHint) -> Result<FakeContext, PlatformError> {
        if self.log.fail_context.get() {
            return Err(PlatformError::Unsupported("AudioContext".into()));
        }
        self.log.contexts.set(self.log.contexts.get() + 1);
        let state = if self.log.start_running.get() {
            ContextState::Running
        } else {
            ContextState::Suspended
        };
        Ok(FakeContext {
            log: Rc::clone(&self.log),
            state: Cell::new(state),
        })
    }

    fn create_analyser(
        &self,
        _context: &FakeContext,
        fft_size: u32,
        _smoothing: f64,
    ) -> Result<FakeAnalyser, PlatformError> {
        self.log.analysers.set(self.log.analysers.get() + 1);
        Ok(FakeAnalyser {
            log: Rc::clone(&self.log),
            bins: fft_size as usize / 2,
        })
    }

    fn create_media_element_source(
        &self,
        _context: &FakeContext,
        element: &FakeElement,
    ) -> Result<u32, PlatformError> {
        let id = element.element_id();
        if self.log.already_connected.borrow().contains(&id) {
            return Err(PlatformError::AlreadyConnected);
        }
        if self.log.reject_elements.borrow().contains(&id) {
            return Err(PlatformError::Js("InvalidStateError".into()));
        }
        let mut sources = self.log.sources.borrow_mut();
        if sources.iter().any(|(_, bound)| *bound == id) {
            return Err(PlatformError::AlreadyConnected);
        }
        let source = sources.len() as u32 + 1;
        sources.push((source, id));
        Ok(source)
    }

    fn connect_source(&self, source: &u32, _analyser: &FakeAnalyser) -> Result<(), PlatformError> {
        self.log.connected.borrow_mut().insert(*source);
        Ok(())
    }

    fn connect_destination(
        &self,
        _context: &FakeContext,
        _analyser: &FakeAnalyser,
    ) -> Result<(), PlatformError> {
        Ok(())
    }

    fn disconnect_source(&self, source: &u32) {
        self.log.connected.borrow_mut().remove(source);
        self.log.disconnects.borrow_mut().push(*source);
    }
}
