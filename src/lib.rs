use nih_plug::prelude::*;
use std::sync::Arc;

pub mod dyncomp;
pub use dyncomp::{static_curve_db, DynamicsEngine, GainReport};
pub mod envelope;
pub mod error;
pub use error::EngineError;
pub mod meter;
pub use meter::{Meters, ReportClock};
pub mod params;
use params::DarcParams;
pub mod smoother;

pub struct Darc {
    params: Arc<DarcParams>,
    meters: Arc<Meters>,
    /// Created in `initialize()` once the sample rate and channel layout are known.
    engine: Option<DynamicsEngine>,
    report_clock: ReportClock,
}

impl Default for Darc {
    fn default() -> Self {
        Self {
            params: Arc::new(DarcParams::default()),
            meters: Arc::new(Meters::new()),
            engine: None,
            report_clock: ReportClock::new(44100.0),
        }
    }
}

impl Darc {
    /// Gain reduction and loudness meters, safe to read from any thread. This is the handoff point
    /// for an editor or host side display, the audio thread only ever writes to it.
    pub fn meters(&self) -> Arc<Meters> {
        self.meters.clone()
    }
}

impl Plugin for Darc {
    const NAME: &'static str = "Darc Rs";
    const VENDOR: &'static str = "Daishi Suzuki";
    const URL: &'static str = env!("CARGO_PKG_HOMEPAGE");
    const EMAIL: &'static str = "zukky.rikugame@gmail.com";

    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo is the default, mono mirrors the dedicated mono variant of the compressor.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),

            aux_input_ports: &[],
            aux_output_ports: &[],

            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            ..AudioIOLayout::const_default()
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const MIDI_OUTPUT: MidiConfig = MidiConfig::None;

    // Controls are read once per block, the engine interpolates gain and ratio itself.
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let num_channels = audio_io_layout
            .main_output_channels
            .map(NonZeroU32::get)
            .unwrap_or(0);

        match DynamicsEngine::new(buffer_config.sample_rate as f64, num_channels) {
            Ok(engine) => {
                nih_log!(
                    "Initialized for {} channel(s) at {} Hz",
                    num_channels,
                    buffer_config.sample_rate
                );
                self.engine = Some(engine);
                self.report_clock = ReportClock::new(buffer_config.sample_rate);
                true
            }
            Err(err) => {
                nih_error!("Refusing audio configuration: {}", err);
                false
            }
        }
    }

    fn reset(&mut self) {
        // Called right after `initialize()` and on every reactivation, may run on the audio thread.
        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
        self.report_clock.reset();
        self.meters.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        let Some(engine) = self.engine.as_mut() else {
            return ProcessStatus::Normal;
        };

        let num_samples = buffer.samples();
        if num_samples == 0 {
            return ProcessStatus::Normal;
        }

        self.params.controls().apply(engine);
        engine.process(num_samples, buffer.as_slice());

        if self.report_clock.advance(num_samples) {
            self.meters.publish(&engine.report().clamped_for_display());
        }

        ProcessStatus::Normal
    }
}

impl ClapPlugin for Darc {
    const CLAP_ID: &'static str = "com.zukky.darc-rs";
    const CLAP_DESCRIPTION: Option<&'static str> = Some("Dynamic range compressor with hold");
    const CLAP_MANUAL_URL: Option<&'static str> = Some(Self::URL);
    const CLAP_SUPPORT_URL: Option<&'static str> = None;

    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Compressor,
    ];
}

impl Vst3Plugin for Darc {
    const VST3_CLASS_ID: [u8; 16] = *b"DarcRsDynComp!!!";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Dynamics];
}

nih_export_clap!(Darc);
nih_export_vst3!(Darc);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dyncomp::RMS_FLOOR_DB;

    struct DummyContext;

    impl ProcessContext<Darc> for DummyContext {
        fn plugin_api(&self) -> PluginApi { PluginApi::Vst3 }
        fn execute_background(&self, _task: ()) {}
        fn execute_gui(&self, _task: ()) {}
        fn transport(&self) -> &Transport { unreachable!("transport unused") }
        fn next_event(&mut self) -> Option<PluginNoteEvent<Darc>> { None }
        fn send_event(&mut self, _event: PluginNoteEvent<Darc>) {}
        fn set_latency_samples(&self, _samples: u32) {}
        fn set_current_voice_capacity(&self, _capacity: u32) {}
    }

    fn initialized_plugin(num_channels: u32) -> Darc {
        let mut plugin = Darc::default();
        plugin.engine = Some(DynamicsEngine::new(48000.0, num_channels).unwrap());
        plugin.report_clock = ReportClock::new(48000.0);
        plugin.reset();
        plugin
    }

    fn process_stereo(plugin: &mut Darc, left: &mut [f32], right: &mut [f32]) {
        let num_samples = left.len();
        let mut buffer = Buffer::default();
        unsafe { buffer.set_slices(num_samples, |out| *out = vec![left, right]) };
        let mut aux = AuxiliaryBuffers { inputs: &mut [], outputs: &mut [] };
        let mut ctx = DummyContext;
        plugin.process(&mut buffer, &mut aux, &mut ctx);
    }

    #[test]
    fn test_process_before_initialize_is_passthrough() {
        let mut plugin = Darc::default();
        let mut left = vec![0.5_f32; 64];
        let mut right = vec![-0.5_f32; 64];
        process_stereo(&mut plugin, &mut left, &mut right);
        assert!(left.iter().all(|&s| s == 0.5));
        assert!(right.iter().all(|&s| s == -0.5));
    }

    #[test]
    fn test_process_silence() {
        let mut plugin = initialized_plugin(2);
        let mut left = vec![0.0_f32; 64];
        let mut right = vec![0.0_f32; 64];
        process_stereo(&mut plugin, &mut left, &mut right);
        assert!(left.iter().all(|&s| s == 0.0));
        assert!(right.iter().all(|&s| s == 0.0));

        // The first block after a reset publishes right away
        let meters = plugin.meters().snapshot();
        assert_eq!(meters.rms_db, RMS_FLOOR_DB);
        assert_eq!(meters.gain_min_db, 0.0);
        assert_eq!(meters.gain_max_db, 0.0);
    }

    #[test]
    fn test_default_settings_are_transparent() {
        // The default ratio is zero, so nothing but the (unity) input gain is applied.
        let mut plugin = initialized_plugin(2);
        let input: Vec<f32> = (0..512).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut left = input.clone();
        let mut right: Vec<f32> = input.iter().map(|s| -s).collect();
        process_stereo(&mut plugin, &mut left, &mut right);
        assert_eq!(left, input);
        assert!(right.iter().zip(&input).all(|(r, i)| *r == -*i));
    }

    #[test]
    fn test_meters_follow_loudness() {
        let mut plugin = initialized_plugin(2);
        let mut phase = 0.0_f32;
        // One second of a full scale 1 kHz sine in 480 sample blocks
        for _ in 0..100 {
            let mut left: Vec<f32> = (0..480)
                .map(|_| {
                    phase += 2.0 * std::f32::consts::PI * 1000.0 / 48000.0;
                    phase.sin()
                })
                .collect();
            let mut right = left.clone();
            process_stereo(&mut plugin, &mut left, &mut right);
        }

        let meters = plugin.meters().snapshot();
        assert!(meters.rms_db > -1.0 && meters.rms_db < 1.0, "{meters:?}");
    }

    #[test]
    fn test_reset_clears_meters() {
        let mut plugin = initialized_plugin(2);
        let mut left = vec![0.9_f32; 4800];
        let mut right = vec![0.9_f32; 4800];
        process_stereo(&mut plugin, &mut left, &mut right);
        assert!(plugin.meters().snapshot().rms_db > RMS_FLOOR_DB);

        plugin.reset();
        assert_eq!(plugin.meters().snapshot().rms_db, RMS_FLOOR_DB);
    }
}
