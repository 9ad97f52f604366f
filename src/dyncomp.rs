//! The dynamics engine: an RMS keyed compressor with automatic make-up gain around -10 dBFS.
//!
//! The engine is configured once per block through the setters and then transforms the channel
//! buffers in place. Nothing in here allocates, locks or logs after construction.

use nih_plug::prelude::*;

use crate::envelope::Envelope;
use crate::error::EngineError;
use crate::smoother::{ramp_coefficient, Ramp};

/// `20 / ln(10)`, converts the natural log gain exponent to decibels.
pub const NATS_TO_DB: f32 = 8.68589;

/// Corner frequency of the slow RMS used for loudness reporting, in Hz.
const RMS_CORNER_HZ: f32 = 5.0;
/// Ceiling for the reporting RMS, in power. About +20 dBFS.
const RMS_CEILING: f32 = 10.0;
/// Added to the reporting RMS after every block to keep it out of denormal range.
const RMS_DENORMAL_OFFSET: f32 = 1e-12;
/// Below this power the reported loudness is pinned to [`RMS_FLOOR_DB`].
const RMS_REPORT_THRESHOLD: f32 = 1e-8;
pub const RMS_FLOOR_DB: f32 = -80.0;

/// Above unity the input gain ramp may snap from a coarser distance.
const INPUT_GAIN_SNAP_ABOVE_UNITY: f32 = 1e-3;

/// Sentinels the extrema tracker starts a fresh window with, in nats.
const WINDOW_START_MAX: f32 = -100.0;
const WINDOW_START_MIN: f32 = 100.0;

const DEFAULT_THRESHOLD_DB: f32 = -10.0;
const DEFAULT_ATTACK_SECONDS: f32 = 0.01;
const DEFAULT_RELEASE_SECONDS: f32 = 0.03;

/// Applied gain and input loudness over one reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GainReport {
    /// Lowest gain applied during the window, in dB.
    pub gain_min_db: f32,
    /// Highest gain applied during the window, in dB.
    pub gain_max_db: f32,
    /// Smoothed loudness of the gained input, in dB relative to a full scale sine.
    pub rms_db: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicsEngine {
    sample_rate: f64,
    channel_count: usize,
    /// `1 / channel_count`
    norm_input: f32,

    /// Linear input gain.
    input_gain: Ramp,
    last_input_gain_db: f32,
    /// Internal ratio, half of the user facing one.
    ratio: Ramp,
    /// Threshold in the power domain, `0.5 * 10^(dB / 10)`.
    threshold_power: f32,
    last_threshold_db: f32,
    hold: bool,

    envelope: Envelope,

    rms: f32,
    w_rms: f32,

    /// Set when the next processed sample should open a new extrema window.
    new_window: bool,
    /// Extrema of the gain exponent in nats.
    gain_min: f32,
    gain_max: f32,
}

impl DynamicsEngine {
    /// Create an engine for a fixed sample rate and channel count.
    ///
    /// The engine starts out neutral: 0 dB input gain, ratio 0, threshold -10 dB, no hold,
    /// 10 ms attack and 30 ms release.
    pub fn new(sample_rate: f64, channel_count: u32) -> Result<Self, EngineError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        if channel_count == 0 {
            return Err(EngineError::NoChannels);
        }

        let rate = sample_rate as f32;
        let w_lpf = ramp_coefficient(rate);

        let mut engine = Self {
            sample_rate,
            channel_count: channel_count as usize,
            norm_input: 1.0 / channel_count as f32,

            input_gain: Ramp::new(1.0, w_lpf)
                .with_above_unity_tolerance(INPUT_GAIN_SNAP_ABOVE_UNITY),
            last_input_gain_db: 0.0,
            ratio: Ramp::new(0.0, w_lpf),
            threshold_power: threshold_to_power(DEFAULT_THRESHOLD_DB),
            last_threshold_db: DEFAULT_THRESHOLD_DB,
            hold: false,

            envelope: Envelope::new(rate),

            rms: 0.0,
            w_rms: RMS_CORNER_HZ / rate,

            new_window: true,
            gain_min: 0.0,
            gain_max: 0.0,
        };
        engine.envelope.set_attack(DEFAULT_ATTACK_SECONDS);
        engine.envelope.set_release(DEFAULT_RELEASE_SECONDS);

        Ok(engine)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Clear the detector and envelope state. Input gain and ratio keep their current values.
    pub fn reset(&mut self) {
        self.envelope.reset();
        self.rms = 0.0;
        self.gain_min = 0.0;
        self.gain_max = 0.0;
        self.new_window = true;
    }

    /// Gain applied before detection and to the output, ramped to avoid clicks.
    pub fn set_input_gain_db(&mut self, db: f32) {
        if db == self.last_input_gain_db {
            return;
        }
        nih_debug_assert!(db.is_finite());
        if !db.is_finite() {
            return;
        }

        self.last_input_gain_db = db;
        self.input_gain.set_target(10f32.powf(0.05 * db));
    }

    pub fn set_threshold_db(&mut self, db: f32) {
        if db == self.last_threshold_db {
            return;
        }
        nih_debug_assert!(db.is_finite());
        if !db.is_finite() {
            return;
        }

        self.last_threshold_db = db;
        self.threshold_power = threshold_to_power(db);
    }

    /// Ratio in `[0, 1]`. At 1 the output level above threshold stays constant.
    pub fn set_ratio(&mut self, ratio: f32) {
        nih_debug_assert!((0.0..=1.0).contains(&ratio));
        if ratio.is_nan() {
            return;
        }

        self.ratio.set_target(0.5 * ratio.clamp(0.0, 1.0));
    }

    pub fn set_hold(&mut self, hold: bool) {
        self.hold = hold;
    }

    pub fn set_attack_seconds(&mut self, seconds: f32) {
        self.envelope.set_attack(seconds);
    }

    pub fn set_release_seconds(&mut self, seconds: f32) {
        self.envelope.set_release(seconds);
    }

    /// Compress `n_samples` samples of every channel buffer in place.
    ///
    /// `channels` should hold exactly `channel_count` buffers of at least `n_samples` samples.
    /// Extra buffers are left untouched and the sample count is bounded by the shortest buffer.
    pub fn process(&mut self, n_samples: usize, channels: &mut [&mut [f32]]) {
        nih_debug_assert_eq!(channels.len(), self.channel_count);
        let num_channels = channels.len().min(self.channel_count);
        let channels = &mut channels[..num_channels];
        let n_samples = channels
            .iter()
            .fold(n_samples, |n, channel| n.min(channel.len()));
        if n_samples == 0 {
            return;
        }

        let (mut gain_min, mut gain_max) = if self.new_window {
            self.new_window = false;
            (WINDOW_START_MIN, WINDOW_START_MAX)
        } else {
            (self.gain_min, self.gain_max)
        };

        let threshold_power = self.threshold_power;
        let hold = self.hold;
        let norm_input = self.norm_input;
        let w_rms = self.w_rms;
        let mut rms = self.rms;

        for sample_idx in 0..n_samples {
            let g = self.input_gain.next();

            // Mean key power over all channels
            let mut power = 0.0;
            for channel in channels.iter() {
                let x = g * channel[sample_idx];
                power += x * x;
            }
            power *= norm_input;

            rms += w_rms * (power - rms);

            let control = self.envelope.next(power, threshold_power, hold);
            let ratio = self.ratio.next();

            // Effective gain is control^(-ratio), with the control power offset by the
            // threshold so unity sits at -10 dBFS.
            let gain_exponent = -ratio * (20.0 * control).ln();

            gain_max = gain_max.max(gain_exponent);
            gain_min = gain_min.min(gain_exponent);

            let factor = g * gain_exponent.exp();
            for channel in channels.iter_mut() {
                channel[sample_idx] *= factor;
            }
        }

        if self.envelope.is_finite() {
            self.gain_min = gain_min;
            self.gain_max = gain_max;
        } else {
            self.envelope.reset();
            self.new_window = true;
        }

        self.rms = if !rms.is_finite() {
            0.0
        } else if rms > RMS_CEILING {
            RMS_CEILING
        } else {
            rms + RMS_DENORMAL_OFFSET
        };
    }

    /// Read the gain extrema and loudness accumulated since the previous call, and start a new
    /// window.
    pub fn report(&mut self) -> GainReport {
        let rms_db = if self.rms > RMS_REPORT_THRESHOLD {
            10.0 * (2.0 * self.rms).log10()
        } else {
            RMS_FLOOR_DB
        };
        self.new_window = true;

        GainReport {
            gain_min_db: self.gain_min * NATS_TO_DB,
            gain_max_db: self.gain_max * NATS_TO_DB,
            rms_db,
        }
    }
}

/// Threshold as signal power, hence `0.5 * 10^(dB / 10)`.
fn threshold_to_power(db: f32) -> f32 {
    0.5 * 10f32.powf(0.1 * db)
}

/// Steady state output level for a constant input level, both in dB RMS relative to a full scale
/// sine. `ratio` is the user facing `[0, 1]` ratio.
///
/// Hold mode has no static curve: the held gain depends on where the release stages were frozen.
pub fn static_curve_db(input_db: f32, threshold_db: f32, ratio: f32) -> f32 {
    let control = 10f32.powf(1.0 + 0.1 * threshold_db) + 10f32.powf(1.0 + 0.1 * input_db);

    input_db - 0.5 * NATS_TO_DB * ratio * control.ln()
}
