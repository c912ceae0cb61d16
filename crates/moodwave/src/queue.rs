//! Play queue derived from the catalog, with wrap-around navigation.

use log::debug;

use crate::catalog::{Catalog, QueuePolicy, Track};

/// What `previous()` asks of the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueStep {
    Load(Track),
    /// Past the scrub tolerance: rewind the current track in place.
    Restart,
    Nothing,
}

/// Ordered tracks plus a cursor. `index < tracks.len()` whenever non-empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Queue {
    tracks: Vec<Track>,
    index: usize,
}

impl Queue {
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.index)
    }

    /// True when the cursor is not on the last entry.
    pub fn has_next(&self) -> bool {
        !self.tracks.is_empty() && self.index + 1 < self.tracks.len()
    }

    fn replace(&mut self, tracks: Vec<Track>, index: usize) {
        debug_assert!(tracks.is_empty() || index < tracks.len());
        self.tracks = tracks;
        self.index = index;
    }
}

pub struct QueueController {
    queue: Queue,
    policy: QueuePolicy,
    scrub_tolerance_secs: f64,
}

impl QueueController {
    pub fn new(policy: QueuePolicy, scrub_tolerance_secs: f64) -> Self {
        Self {
            queue: Queue::default(),
            policy,
            scrub_tolerance_secs,
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Rebuilds the queue as every catalog track grouped with `track`.
    ///
    /// A track missing from its own group (one not drawn from this catalog)
    /// is put at the front so the cursor still points at what is playing.
    pub fn play_with_new_queue(&mut self, catalog: &Catalog, track: &Track) {
        let mut tracks = catalog.grouped_with(track, self.policy);
        let index = match tracks.iter().position(|t| t.id == track.id) {
            Some(index) => index,
            None => {
                debug!("QueueController: '{}' not in its own group, prepending", track.id);
                tracks.insert(0, track.clone());
                0
            }
        };
        debug!(
            "QueueController: new {:?} queue of {} tracks at {}",
            self.policy,
            tracks.len(),
            index
        );
        self.queue.replace(tracks, index);
    }

    /// Moves the cursor forward, wrapping to the start. Returns the track to play.
    pub fn next(&mut self, catalog: &Catalog, current: Option<&Track>) -> Option<Track> {
        if self.queue.len() <= 1 {
            if catalog.is_empty() {
                return None;
            }
            let index = current
                .and_then(|t| catalog.position_of(&t.id))
                .map_or(0, |i| (i + 1) % catalog.len());
            self.queue.replace(catalog.tracks().to_vec(), index);
        } else {
            let index = (self.queue.index + 1) % self.queue.len();
            self.queue.index = index;
        }
        self.queue.current().cloned()
    }

    /// Restarts the current track when past the scrub tolerance, otherwise
    /// moves the cursor back, wrapping to the end.
    pub fn previous(&mut self, catalog: &Catalog, current: Option<&Track>, current_time: f64) -> QueueStep {
        if current_time > self.scrub_tolerance_secs && current.is_some() {
            return QueueStep::Restart;
        }
        if self.queue.len() <= 1 {
            if catalog.is_empty() {
                return QueueStep::Nothing;
            }
            let index = match current.and_then(|t| catalog.position_of(&t.id)) {
                Some(i) if i > 0 => i - 1,
                _ => catalog.len() - 1,
            };
            self.queue.replace(catalog.tracks().to_vec(), index);
        } else {
            let len = self.queue.len();
            self.queue.index = (self.queue.index + len - 1) % len;
        }
        self.queue
            .current()
            .cloned()
            .map_or(QueueStep::Nothing, QueueStep::Load)
    }
}
