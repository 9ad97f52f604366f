use nih_plug::prelude::*;

/// Scale of the attack coefficient, `w_att = ATTACK_SCALE / (sample_rate * seconds)`.
pub const ATTACK_SCALE: f32 = 0.5;
/// Scale of the release coefficient. Larger than the attack scale because the release runs through
/// two cascaded stages.
pub const RELEASE_SCALE: f32 = 3.5;

/// Attack filter followed by a two-stage release cascade.
///
/// The attack stage low-passes the key power offset by the threshold power, so with a positive
/// threshold all three states stay strictly positive and the gain computer can take their log
/// without further checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    sample_rate: f32,

    attack_seconds: f32,
    release_seconds: f32,
    w_att: f32,
    w_rel: f32,

    /// Attack filtered key power, including the threshold offset.
    za1: f32,
    /// First release stage, decays toward zero.
    zr1: f32,
    /// Second release stage, decays toward `zr1`. This is the control signal.
    zr2: f32,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            attack_seconds: 0.0,
            release_seconds: 0.0,
            w_att: 0.0,
            w_rel: 0.0,
            za1: 0.0,
            zr1: 0.0,
            zr2: 0.0,
        }
    }

    /// Set the attack time. Repeating the last value is a no-op, invalid times are ignored.
    pub fn set_attack(&mut self, seconds: f32) {
        if seconds == self.attack_seconds {
            return;
        }
        nih_debug_assert!(seconds.is_finite() && seconds > 0.0);
        if !(seconds.is_finite() && seconds > 0.0) {
            return;
        }

        self.attack_seconds = seconds;
        self.w_att = ATTACK_SCALE / (self.sample_rate * seconds);
    }

    /// Set the release time. Repeating the last value is a no-op, invalid times are ignored.
    pub fn set_release(&mut self, seconds: f32) {
        if seconds == self.release_seconds {
            return;
        }
        nih_debug_assert!(seconds.is_finite() && seconds > 0.0);
        if !(seconds.is_finite() && seconds > 0.0) {
            return;
        }

        self.release_seconds = seconds;
        self.w_rel = RELEASE_SCALE / (self.sample_rate * seconds);
    }

    pub fn attack_coefficient(&self) -> f32 {
        self.w_att
    }

    pub fn release_coefficient(&self) -> f32 {
        self.w_rel
    }

    /// Feed one sample of mean key power and return the release-smoothed control power.
    ///
    /// When `hold` is set and the attack stage sits below twice the threshold power, both release
    /// stages freeze instead of decaying. Rising input still passes straight through.
    #[inline]
    pub fn next(&mut self, power: f32, threshold_power: f32, hold: bool) -> f32 {
        self.za1 += self.w_att * (threshold_power + power - self.za1);

        let holding = hold && self.za1 < 2.0 * threshold_power;

        if self.za1 > self.zr1 {
            self.zr1 = self.za1;
        } else if !holding {
            self.zr1 -= self.w_rel * self.zr1;
        }

        if self.za1 > self.zr2 {
            self.zr2 = self.za1;
        } else if !holding {
            self.zr2 += self.w_rel * (self.zr1 - self.zr2);
        }

        self.zr2
    }

    /// Whether all filter states are finite. Non-finite input is the only way to break this.
    pub fn is_finite(&self) -> bool {
        self.za1.is_finite() && self.zr1.is_finite() && self.zr2.is_finite()
    }

    /// Clear the filter states. Coefficients are kept.
    pub fn reset(&mut self) {
        self.za1 = 0.0;
        self.zr1 = 0.0;
        self.zr2 = 0.0;
    }

    /// Filter states as `(za1, zr1, zr2)`.
    pub fn state(&self) -> (f32, f32, f32) {
        (self.za1, self.zr1, self.zr2)
    }
}
