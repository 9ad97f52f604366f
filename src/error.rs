use thiserror::Error;

/// Reasons a [`DynamicsEngine`](crate::DynamicsEngine) refuses to be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum EngineError {
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),

    #[error("channel count must be at least one")]
    NoChannels,
}
