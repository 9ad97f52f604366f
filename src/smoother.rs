//! One-pole parameter ramp used to de-click input gain and ratio changes.
//!
//! The ramp moves a fixed fraction of the remaining distance every sample and snaps onto the
//! target once it gets close enough, so it never creeps asymptotically into denormal territory.

/// Distance below which the ramp snaps onto its target.
pub const SNAP_EPSILON: f32 = 1e-5;

/// Corner frequency of the de-click low-pass, in Hz.
pub const RAMP_CORNER_HZ: f32 = 160.0;

/// Per-sample coefficient of the de-click low-pass at the given sample rate.
pub fn ramp_coefficient(sample_rate: f32) -> f32 {
    RAMP_CORNER_HZ / sample_rate
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    current: f32,
    target: f32,
    coeff: f32,
    /// Snap tolerance used while `current > 1`. Gains above unity can afford a coarser snap.
    above_unity_tolerance: f32,
}

impl Ramp {
    pub fn new(initial: f32, coeff: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff,
            above_unity_tolerance: SNAP_EPSILON,
        }
    }

    pub fn with_above_unity_tolerance(mut self, tolerance: f32) -> Self {
        self.above_unity_tolerance = tolerance.max(SNAP_EPSILON);
        self
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Current value without advancing.
    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let delta = self.target - self.current;
        let tolerance = if self.current > 1.0 {
            self.above_unity_tolerance
        } else {
            SNAP_EPSILON
        };

        if delta.abs() < tolerance {
            self.current = self.target;
        } else {
            self.current += self.coeff * delta;
        }

        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_moves_toward_target() {
        let mut ramp = Ramp::new(0.0, ramp_coefficient(48000.0));
        ramp.set_target(1.0);
        let first = ramp.next();
        let second = ramp.next();
        assert!(first > 0.0 && first < 1.0);
        assert!(second > first && second < 1.0);
    }

    #[test]
    fn test_ramp_settles_exactly() {
        let mut ramp = Ramp::new(0.0, ramp_coefficient(48000.0));
        ramp.set_target(0.5);
        // Roughly 300 samples per time constant, the snap must kick in well before a second.
        for _ in 0..48000 {
            ramp.next();
        }
        assert!(ramp.is_settled());
        assert_eq!(ramp.value(), 0.5);
    }

    #[test]
    fn test_ramp_snaps_within_epsilon() {
        let mut ramp = Ramp::new(0.25, 0.01);
        ramp.set_target(0.25 + SNAP_EPSILON * 0.5);
        assert_eq!(ramp.next(), ramp.target());
    }

    #[test]
    fn test_above_unity_tolerance() {
        // 5e-4 away: too far for the fine tolerance, close enough for the coarse one.
        let mut fine = Ramp::new(2.0, 0.01);
        fine.set_target(2.0005);
        assert_ne!(fine.next(), 2.0005);

        let mut coarse = Ramp::new(2.0, 0.01).with_above_unity_tolerance(1e-3);
        coarse.set_target(2.0005);
        assert_eq!(coarse.next(), 2.0005);

        // Below unity the coarse tolerance does not apply.
        let mut below = Ramp::new(0.5, 0.01).with_above_unity_tolerance(1e-3);
        below.set_target(0.5005);
        assert_ne!(below.next(), 0.5005);
    }
}
