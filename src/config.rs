//! Tunables for the scheduler loop (§6).
//!
//! Every field has a default drawn from the original design; callers only
//! need to override the ones that matter for their embedding (e.g. a
//! battery-constrained target lowering `frame_rate`).

use crate::error::ZoomerError;
use serde::Deserialize;

/// Scheduler tunables. All durations are in milliseconds unless noted.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ZoomerConfig {
    /// Target frames per second for the COPY/PAINT cadence.
    pub frame_rate: f64,
    /// Milliseconds of UPDATE work to run per scheduler tick.
    pub update_slice: f64,
    /// Milliseconds of UPDATE work to run when the view is otherwise idle
    /// (no pending navigation), to burn down remaining error faster.
    pub update_idle_burst: f64,
    /// How long the scheduler will block waiting for a render worker to
    /// become available before giving up on a tick.
    pub wake_timeout: f64,
    /// Smoothing coefficient for the adaptive frame-rate throttle, in `(0, 1]`.
    pub coef: f64,
    /// Disable the render-worker pair ("ww", the source's shorthand for web
    /// worker) and run the Renderer inline on the main context instead
    /// (§4.5 RENDER state, §6). Useful on targets with no background
    /// thread, or to keep render timing in lock-step with UPDATE for
    /// debugging.
    pub disable_ww: bool,
}

impl Default for ZoomerConfig {
    fn default() -> Self {
        Self {
            frame_rate: 20.0,
            update_slice: 5.0,
            update_idle_burst: 500.0,
            wake_timeout: 500.0,
            coef: 0.10,
            disable_ww: false,
        }
    }
}

impl ZoomerConfig {
    /// Reject configurations the scheduler has no sane way to run with.
    pub fn validate(&self) -> Result<(), ZoomerError> {
        if !(self.frame_rate > 0.0) {
            return Err(ZoomerError::InvalidConfig(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if !(self.update_slice > 0.0) {
            return Err(ZoomerError::InvalidConfig(format!(
                "update_slice must be positive, got {}",
                self.update_slice
            )));
        }
        if !(self.coef > 0.0 && self.coef <= 1.0) {
            return Err(ZoomerError::InvalidConfig(format!(
                "coef must be in (0, 1], got {}",
                self.coef
            )));
        }
        Ok(())
    }
}
