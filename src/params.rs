use nih_plug::prelude::*;

use crate::dyncomp::DynamicsEngine;

/// Range and default of a knob. Only the host facing parameters read these, the engine never does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    /// Skew exponent for [`FloatRange::skew_factor`], `0.0` for a linear knob.
    pub skew: f32,
}

impl ControlRange {
    fn float_range(&self) -> FloatRange {
        if self.skew == 0.0 {
            FloatRange::Linear {
                min: self.min,
                max: self.max,
            }
        } else {
            FloatRange::Skewed {
                min: self.min,
                max: self.max,
                factor: FloatRange::skew_factor(self.skew),
            }
        }
    }
}

pub const INPUT_GAIN: ControlRange = ControlRange {
    min: -10.0,
    max: 30.0,
    default: 0.0,
    skew: 0.0,
};
pub const THRESHOLD: ControlRange = ControlRange {
    min: -50.0,
    max: -10.0,
    default: -30.0,
    skew: 0.0,
};
pub const RATIO: ControlRange = ControlRange {
    min: 0.0,
    max: 1.0,
    default: 0.0,
    skew: -1.0,
};
pub const ATTACK: ControlRange = ControlRange {
    min: 0.001,
    max: 0.1,
    default: 0.01,
    skew: -2.0,
};
pub const RELEASE: ControlRange = ControlRange {
    min: 0.03,
    max: 3.0,
    default: 0.3,
    skew: -2.0,
};

/// Controls the engine falls back to while bypassed. Attack and release keep following the knobs.
const BYPASS_INPUT_GAIN_DB: f32 = 0.0;
const BYPASS_THRESHOLD_DB: f32 = -10.0;
const BYPASS_RATIO: f32 = 0.0;

#[derive(Params)]
pub struct DarcParams {
    /// When disabled the engine keeps running with neutral settings, so toggling never clicks.
    #[id = "enable"]
    pub enable: BoolParam,

    /// Retain the current attenuation while the signal stays below the threshold.
    #[id = "hold"]
    pub hold: BoolParam,

    /// Gain applied before level detection and to the output.
    #[id = "input_gain"]
    pub input_gain: FloatParam,

    /// Signal level (RMS) at which compression engages.
    #[id = "threshold"]
    pub threshold: FloatParam,

    /// dB of attenuation per dB above threshold, with unity retained at -10 dBFS.
    #[id = "ratio"]
    pub ratio: FloatParam,

    #[id = "attack"]
    pub attack: FloatParam,

    /// Minimum recovery time after the signal falls below threshold.
    #[id = "release"]
    pub release: FloatParam,
}

impl Default for DarcParams {
    fn default() -> Self {
        Self {
            enable: BoolParam::new("Enable", true),
            hold: BoolParam::new("Hold", false),
            input_gain: FloatParam::new(
                "Input Gain",
                INPUT_GAIN.default,
                INPUT_GAIN.float_range(),
            )
            .with_step_size(0.2)
            .with_unit(" dB")
            .with_value_to_string(formatters::v2s_f32_rounded(1)),
            threshold: FloatParam::new("Threshold", THRESHOLD.default, THRESHOLD.float_range())
                .with_step_size(0.1)
                .with_unit(" dB")
                .with_value_to_string(formatters::v2s_f32_rounded(1)),
            ratio: FloatParam::new("Ratio", RATIO.default, RATIO.float_range())
                .with_value_to_string(formatters::v2s_f32_rounded(2)),
            attack: FloatParam::new("Attack", ATTACK.default, ATTACK.float_range())
                .with_unit(" s")
                .with_value_to_string(formatters::v2s_f32_rounded(3)),
            release: FloatParam::new("Release", RELEASE.default, RELEASE.float_range())
                .with_unit(" s")
                .with_value_to_string(formatters::v2s_f32_rounded(3)),
        }
    }
}

impl DarcParams {
    /// Current parameter values.
    pub fn controls(&self) -> ControlValues {
        ControlValues {
            enable: self.enable.value(),
            hold: self.hold.value(),
            input_gain_db: self.input_gain.value(),
            threshold_db: self.threshold.value(),
            ratio: self.ratio.value(),
            attack_seconds: self.attack.value(),
            release_seconds: self.release.value(),
        }
    }
}

/// Plain copy of the parameter values for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlValues {
    pub enable: bool,
    pub hold: bool,
    pub input_gain_db: f32,
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_seconds: f32,
    pub release_seconds: f32,
}

impl ControlValues {
    /// Configure the engine for the next block.
    pub fn apply(&self, engine: &mut DynamicsEngine) {
        if self.enable {
            engine.set_input_gain_db(self.input_gain_db);
            engine.set_threshold_db(self.threshold_db);
            engine.set_ratio(self.ratio);
            engine.set_hold(self.hold);
        } else {
            engine.set_input_gain_db(BYPASS_INPUT_GAIN_DB);
            engine.set_threshold_db(BYPASS_THRESHOLD_DB);
            engine.set_ratio(BYPASS_RATIO);
            engine.set_hold(false);
        }

        engine.set_attack_seconds(self.attack_seconds);
        engine.set_release_seconds(self.release_seconds);
    }
}
