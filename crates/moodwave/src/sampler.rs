//! Frame-driven frequency sampler.
//!
//! Each tick picks a [`SnapshotStrategy`]: the analyser spectrum while the
//! graph is connected and the element is playing, otherwise a synthetic
//! spectrum that keeps the visuals alive (slow shimmer when idle, livelier
//! motion when playing).

use std::f64::consts::PI;
use std::rc::Rc;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use web_time::{SystemTime, UNIX_EPOCH};

use crate::config::{SamplerConfig, SignalProfile};
use crate::graph::{ConsumerId, SharedGraph};
use crate::platform::{AudioPlatform, MediaElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStrategy {
    RealAnalysis,
    SyntheticFallback,
}

/// One spectrum, one byte per bin. Valid until the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencySnapshot {
    bins: Vec<u8>,
    strategy: SnapshotStrategy,
}

impl FrequencySnapshot {
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn strategy(&self) -> SnapshotStrategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Bell-shaped spectrum built from three drifting sine waves.
pub struct SyntheticSignal {
    values: Vec<u8>,
    playing: SignalProfile,
    idle: SignalProfile,
    rng: StdRng,
}

impl SyntheticSignal {
    pub fn new(config: &SamplerConfig) -> Self {
        let len = config.bins;
        let half = len as f64 / 2.0;
        let values = (0..len)
            .map(|i| {
                let dist = (i as f64 - half).abs() / half;
                (255.0 * (1.0 - dist).powi(2) * 0.5) as u8
            })
            .collect();
        let seed = config.seed.unwrap_or_else(clock_seed);
        Self {
            values,
            playing: config.playing.clone(),
            idle: config.idle.clone(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    /// Moves every bin toward the target shape at `time` seconds.
    pub fn step(&mut self, time: f64, playing: bool) -> &[u8] {
        let profile = if playing { &self.playing } else { &self.idle };
        let len = self.values.len() as f64;
        let phase = time * profile.phase_rate;
        let half_jitter = profile.jitter / 2.0;

        for (i, slot) in self.values.iter_mut().enumerate() {
            let x = i as f64 / len;
            let wave1 = (x * 5.0 + phase).sin() * 0.5;
            let wave2 = (x * 10.0 + phase * 0.7).sin() * 0.3;
            let wave3 = (x * 3.0 - phase * 0.5).sin() * 0.2;
            let bell = (x * PI).sin().max(0.0).sqrt();
            let composite = (wave1 + wave2 + wave3) * bell;
            let value = profile.base + profile.amplitude * (composite + 1.0) / 2.0;
            let jitter = if half_jitter > 0.0 {
                self.rng.random_range(-half_jitter..half_jitter)
            } else {
                0.0
            };
            let target = (value + jitter).floor().clamp(0.0, 255.0);
            let current = f64::from(*slot);
            let next = current * (1.0 - profile.speed) + target * profile.speed;
            *slot = next.floor().clamp(0.0, 255.0) as u8;
        }
        &self.values
    }
}

/// Sampling loop state for one visualization consumer.
///
/// The host calls [`tick`](Self::tick) from its per-frame callback; samples are
/// taken at most once per `frame_interval_ms`.
pub struct VisualizationSampler<P: AudioPlatform> {
    graph: SharedGraph<P>,
    element: Rc<P::Element>,
    consumer: Option<ConsumerId>,
    interval_ms: f64,
    last_sample_ms: Option<f64>,
    synthetic: SyntheticSignal,
    /// Raw analyser output, sized to the analyser's bin count.
    spectrum: Vec<u8>,
    snapshot: FrequencySnapshot,
}

impl<P: AudioPlatform> VisualizationSampler<P> {
    /// Registers as a graph consumer and tries to route `element` through the
    /// analyser. A failed connection leaves the sampler on synthetic output.
    pub fn new(graph: SharedGraph<P>, element: Rc<P::Element>, config: &SamplerConfig) -> Self {
        let consumer = graph.attach();
        if let Err(e) = graph.ensure_connected(&element) {
            warn!("VisualizationSampler: falling back to synthetic spectrum: {e}");
        }
        debug!("VisualizationSampler: attached as {consumer:?}");
        Self {
            graph,
            element,
            consumer: Some(consumer),
            interval_ms: config.frame_interval_ms,
            last_sample_ms: None,
            synthetic: SyntheticSignal::new(config),
            spectrum: Vec::new(),
            snapshot: FrequencySnapshot {
                bins: vec![0; config.bins],
                strategy: SnapshotStrategy::SyntheticFallback,
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.consumer.is_some()
    }

    pub fn strategy(&self) -> SnapshotStrategy {
        if self.graph.is_connected_to(self.element.element_id()) && !self.element.is_paused() {
            SnapshotStrategy::RealAnalysis
        } else {
            SnapshotStrategy::SyntheticFallback
        }
    }

    /// Frame callback entry; `frame_ms` is the host's frame timestamp.
    pub fn tick(&mut self, frame_ms: f64) -> Option<&FrequencySnapshot> {
        self.tick_at(frame_ms, wall_clock_secs())
    }

    pub fn tick_at(&mut self, frame_ms: f64, wall_secs: f64) -> Option<&FrequencySnapshot> {
        if self.consumer.is_none() {
            return None;
        }
        if let Some(last) = self.last_sample_ms {
            if frame_ms - last <= self.interval_ms {
                return None;
            }
        }
        self.last_sample_ms = Some(frame_ms);

        let playing = !self.element.is_paused();
        let mut strategy = self.strategy();
        if strategy == SnapshotStrategy::RealAnalysis {
            if self.graph.read_frequency_data(&mut self.spectrum) {
                fit_bins(&self.spectrum, &mut self.snapshot.bins);
            } else {
                strategy = SnapshotStrategy::SyntheticFallback;
            }
        }
        if strategy == SnapshotStrategy::SyntheticFallback {
            let values = self.synthetic.step(wall_secs, playing);
            fit_bins(values, &mut self.snapshot.bins);
        }
        self.snapshot.strategy = strategy;
        Some(&self.snapshot)
    }

    /// Stops sampling and releases this consumer's share of the graph.
    pub fn cancel(&mut self, full_disconnect: bool) {
        if let Some(consumer) = self.consumer.take() {
            self.graph.detach(consumer, full_disconnect);
            debug!("VisualizationSampler: detached {consumer:?}");
        }
    }
}

impl<P: AudioPlatform> Drop for VisualizationSampler<P> {
    fn drop(&mut self) {
        self.cancel(false);
    }
}

/// Copies `source` into `out` without changing its length: extra bins are
/// dropped, missing ones read as silence.
fn fit_bins(source: &[u8], out: &mut [u8]) {
    let n = source.len().min(out.len());
    out[..n].copy_from_slice(&source[..n]);
    out[n..].fill(0);
}

fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0x5eed, |d| d.as_nanos() as u64)
}
