//! Session configuration.
//!
//! Every field has a default; a JSON document only needs the keys it changes.

use serde::Deserialize;

use crate::catalog::QueuePolicy;
use crate::error::ConfigError;
use crate::platform::LatencyHint;

/// Analyser node parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyserSettings {
    pub fft_size: u32,
    /// Smoothing time constant in `[0, 1)`.
    pub smoothing: f64,
    pub latency: LatencyHint,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.7,
            latency: LatencyHint::Playback,
        }
    }
}

/// Shape of the synthetic spectrum for one phase (playing or idle).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SignalProfile {
    /// Phase advance per wall-clock second.
    pub phase_rate: f64,
    pub base: f64,
    pub amplitude: f64,
    /// Total jitter span; samples move by up to half of it either way.
    pub jitter: f64,
    /// Interpolation factor toward the new target per sample.
    pub speed: f64,
}

impl SignalProfile {
    pub fn playing() -> Self {
        Self {
            phase_rate: 1.2,
            base: 70.0,
            amplitude: 120.0,
            jitter: 15.0,
            speed: 0.15,
        }
    }

    pub fn idle() -> Self {
        Self {
            phase_rate: 0.2,
            base: 40.0,
            amplitude: 60.0,
            jitter: 0.0,
            speed: 0.05,
        }
    }

    /// `speed` must lie in `[0, 1]`; the other fields must be finite and
    /// `base`, `amplitude` and `jitter` non-negative. `fields` names them in
    /// that order for error reporting.
    fn validate(&self, fields: [&'static str; 5]) -> Result<(), ConfigError> {
        let [speed, jitter, amplitude, base, phase_rate] = fields;
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        let checks = [
            (speed, self.speed, (0.0..=1.0).contains(&self.speed)),
            (jitter, self.jitter, non_negative(self.jitter)),
            (amplitude, self.amplitude, non_negative(self.amplitude)),
            (base, self.base, non_negative(self.base)),
            (phase_rate, self.phase_rate, self.phase_rate.is_finite()),
        ];
        match checks.into_iter().find(|&(_, _, ok)| !ok) {
            Some((field, value, _)) => Err(ConfigError::SignalProfile { field, value }),
            None => Ok(()),
        }
    }
}

impl Default for SignalProfile {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Length of every synthetic snapshot.
    pub bins: usize,
    /// Minimum spacing between two samples, in frame-timestamp milliseconds.
    pub frame_interval_ms: f64,
    pub playing: SignalProfile,
    pub idle: SignalProfile,
    /// Fixed jitter seed; taken from the clock when absent.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            bins: 128,
            frame_interval_ms: 16.0,
            playing: SignalProfile::playing(),
            idle: SignalProfile::idle(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub default_volume: f64,
    /// `previous()` restarts the current track once playback is past this point.
    pub scrub_tolerance_secs: f64,
    pub queue_policy: QueuePolicy,
    pub analyser: AnalyserSettings,
    pub sampler: SamplerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.7,
            scrub_tolerance_secs: 3.0,
            queue_policy: QueuePolicy::Mood,
            analyser: AnalyserSettings::default(),
            sampler: SamplerConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Preset with a calmer, slower synthetic signal for ambient layouts.
    pub fn preset_ambient() -> Self {
        let mut c = Self::default();
        c.analyser.smoothing = 0.85;
        c.sampler.playing.phase_rate = 0.6;
        c.sampler.playing.jitter = 6.0;
        c.sampler.playing.speed = 0.08;
        c
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fft = self.analyser.fft_size;
        if !fft.is_power_of_two() || !(32..=32768).contains(&fft) {
            return Err(ConfigError::FftSize(fft));
        }
        if !(0.0..1.0).contains(&self.analyser.smoothing) {
            return Err(ConfigError::Smoothing(self.analyser.smoothing));
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(ConfigError::Volume(self.default_volume));
        }
        if self.sampler.bins == 0 {
            return Err(ConfigError::NonPositive("sampler.bins"));
        }
        if self.sampler.frame_interval_ms <= 0.0 {
            return Err(ConfigError::NonPositive("sampler.frame_interval_ms"));
        }
        self.sampler.playing.validate([
            "sampler.playing.speed",
            "sampler.playing.jitter",
            "sampler.playing.amplitude",
            "sampler.playing.base",
            "sampler.playing.phase_rate",
        ])?;
        self.sampler.idle.validate([
            "sampler.idle.speed",
            "sampler.idle.jitter",
            "sampler.idle.amplitude",
            "sampler.idle.base",
            "sampler.idle.phase_rate",
        ])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = SessionConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.analyser.fft_size, 256);
        assert_eq!(c.sampler.bins, 128);
        assert!(SessionConfig::preset_ambient().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = SessionConfig::from_json(r#"{"default_volume":0.5,"sampler":{"seed":7}}"#).unwrap();
        assert_eq!(c.default_volume, 0.5);
        assert_eq!(c.sampler.seed, Some(7));
        assert_eq!(c.sampler.frame_interval_ms, 16.0);
        assert_eq!(c.sampler.playing, SignalProfile::playing());
        assert_eq!(c.queue_policy, QueuePolicy::Mood);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            SessionConfig::from_json(r#"{"analyser":{"fft_size":300}}"#),
            Err(ConfigError::FftSize(300))
        ));
        assert!(matches!(
            SessionConfig::from_json(r#"{"analyser":{"smoothing":1.0}}"#),
            Err(ConfigError::Smoothing(_))
        ));
        assert!(matches!(
            SessionConfig::from_json(r#"{"default_volume":1.5}"#),
            Err(ConfigError::Volume(_))
        ));
        assert!(matches!(
            SessionConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_signal_profiles_outside_their_ranges() {
        assert!(matches!(
            SessionConfig::from_json(r#"{"sampler":{"playing":{"speed":1.5}}}"#),
            Err(ConfigError::SignalProfile { field: "sampler.playing.speed", .. })
        ));
        assert!(matches!(
            SessionConfig::from_json(r#"{"sampler":{"idle":{"jitter":-2.0}}}"#),
            Err(ConfigError::SignalProfile { field: "sampler.idle.jitter", value }) if value == -2.0
        ));
        assert!(matches!(
            SessionConfig::from_json(r#"{"sampler":{"idle":{"speed":-0.1}}}"#),
            Err(ConfigError::SignalProfile { field: "sampler.idle.speed", .. })
        ));
        assert!(SessionConfig::from_json(r#"{"sampler":{"playing":{"speed":1.0,"jitter":0.0}}}"#).is_ok());
    }

    #[test]
    fn large_fft_size_is_accepted() {
        let c = SessionConfig::from_json(r#"{"analyser":{"fft_size":2048}}"#).unwrap();
        assert_eq!(c.analyser.fft_size, 2048);
        assert_eq!(c.sampler.bins, 128);
    }
}
