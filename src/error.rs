//! Crate-wide error type. Library code returns `Result<_, SimError>`;
//! `anyhow` is reserved for the demo binary, never used inside the crate
//! itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    #[error("failed to initialize a compute device: {0}")]
    DeviceInitFailure(String),

    #[error("the compute device was lost mid-simulation: {0}")]
    DeviceLost(String),

    #[error("a readback buffer was dropped before its contents were read")]
    ReadbackDropped,
}
