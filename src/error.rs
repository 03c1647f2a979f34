//! Failure modes the engine surfaces through `Result`.
//!
//! Most of what the engine does when things go wrong is *not* an error:
//! dropped frames, exhausted f64 resolution and resize are all steady-state
//! conditions handled in place (§7) rather than propagated. `ZoomerError` is
//! reserved for the handful of conditions a caller must be told about before
//! the engine can do anything useful at all.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZoomerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("surface has zero area")]
    ZeroSurface,

    #[error("no render worker is available to accept this frame")]
    WorkerUnavailable,
}
