//! Gain reduction and loudness metering.
//!
//! The audio thread pulls a [`GainReport`] from the engine on a fixed cadence and publishes the
//! display values through [`Meters`], which the editor or host can read from any thread.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::dyncomp::{GainReport, RMS_FLOOR_DB};

/// Time between two reports, in seconds.
pub const REPORT_INTERVAL_SECONDS: f32 = 0.05;

pub const DISPLAY_GAIN_MIN_DB: f32 = -20.0;
pub const DISPLAY_GAIN_MAX_DB: f32 = 40.0;
pub const DISPLAY_RMS_MAX_DB: f32 = 10.0;

/// Counts samples and signals when the next report is due, independently of the host's block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportClock {
    period: usize,
    elapsed: usize,
}

impl ReportClock {
    pub fn new(sample_rate: f32) -> Self {
        let period = ((sample_rate * REPORT_INTERVAL_SECONDS).ceil() as usize).max(1);
        Self {
            period,
            // Primed, so the first block after a reset reports right away
            elapsed: period,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn reset(&mut self) {
        self.elapsed = self.period;
    }

    /// Account for `num_samples` processed samples. Returns `true` when at least one period has
    /// elapsed. A block spanning several periods still yields a single report.
    pub fn advance(&mut self, num_samples: usize) -> bool {
        self.elapsed += num_samples;
        if self.elapsed < self.period {
            return false;
        }

        self.elapsed %= self.period;
        true
    }
}

impl GainReport {
    /// Clamp to the ranges the meters can display.
    pub fn clamped_for_display(self) -> Self {
        Self {
            gain_min_db: self.gain_min_db.clamp(DISPLAY_GAIN_MIN_DB, DISPLAY_GAIN_MAX_DB),
            gain_max_db: self.gain_max_db.clamp(DISPLAY_GAIN_MIN_DB, DISPLAY_GAIN_MAX_DB),
            rms_db: self.rms_db.clamp(RMS_FLOOR_DB, DISPLAY_RMS_MAX_DB),
        }
    }
}

/// The last published report, stored as raw `f32` bits so it can be shared without locking. There
/// is a single writer on the audio thread.
#[derive(Debug)]
pub struct Meters {
    gain_min_db: AtomicU32,
    gain_max_db: AtomicU32,
    rms_db: AtomicU32,
}

impl Meters {
    pub fn new() -> Self {
        Self {
            gain_min_db: AtomicU32::new(0f32.to_bits()),
            gain_max_db: AtomicU32::new(0f32.to_bits()),
            rms_db: AtomicU32::new(RMS_FLOOR_DB.to_bits()),
        }
    }

    pub fn publish(&self, report: &GainReport) {
        self.gain_min_db.store(report.gain_min_db.to_bits(), Ordering::Relaxed);
        self.gain_max_db.store(report.gain_max_db.to_bits(), Ordering::Relaxed);
        self.rms_db.store(report.rms_db.to_bits(), Ordering::Relaxed);
    }

    /// Copy of the last published values. The three fields may straddle two reports.
    pub fn snapshot(&self) -> GainReport {
        GainReport {
            gain_min_db: f32::from_bits(self.gain_min_db.load(Ordering::Relaxed)),
            gain_max_db: f32::from_bits(self.gain_max_db.load(Ordering::Relaxed)),
            rms_db: f32::from_bits(self.rms_db.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        self.publish(&GainReport {
            gain_min_db: 0.0,
            gain_max_db: 0.0,
            rms_db: RMS_FLOOR_DB,
        });
    }
}

impl Default for Meters {
    fn default() -> Self {
        Self::new()
    }
}
