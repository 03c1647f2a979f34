//! Per-axis coordinate tables that map a new frame's sample points back onto
//! a previous frame's samples.
//!
//! A [`Ruler`] is built once per axis per frame (`xRuler`/`yRuler` on
//! [`crate::view::View`]) and records, for every new coordinate stop, the
//! nearest sample the previous frame already computed. [`View`] uses this to
//! warp a previous frame's pixels into a new frame without recomputation; the
//! error left over from the nearest-sample approximation tells
//! `update_lines` which row or column is worth spending a compute budget on.
//!
//! [`View`]: crate::view::View

use serde::{Deserialize, Serialize};

/// Where a Ruler stop's sample came from.
///
/// `Inherited(i)` means the stop reuses the previous axis's sample at index
/// `i`. `Stale` is the "-1" sentinel from the original design: a stop that
/// shares its inherited index with a neighbor and lost the tie-break, or a
/// stop built with no previous axis at all. `update_lines` always prefers to
/// recompute `Stale` stops over ones with merely nonzero error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Inherited(u32),
    Stale,
}

impl Source {
    pub fn is_stale(self) -> bool {
        matches!(self, Source::Stale)
    }
}

/// A per-axis table of new coordinate stops and the inheritance bookkeeping
/// for each one.
///
/// `coord`, `nearest`, `error` and `from` all have the same length — the
/// pixel dimension of the axis they belong to — and are indexed in lockstep.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ruler {
    /// Logical target coordinate of each stop. Strictly monotonic.
    pub coord: Vec<f64>,
    /// The inherited sample's coordinate (from the previous axis).
    pub nearest: Vec<f64>,
    /// `|coord[i] - nearest[i]|`.
    pub error: Vec<f64>,
    /// Index back into the previous axis, or `Stale`.
    pub from: Vec<Source>,
}

impl Ruler {
    pub fn len(&self) -> usize {
        self.coord.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coord.is_empty()
    }

    /// Build a Ruler with no previous axis to inherit from: coordinates are
    /// tiled linearly across `[start, end]` and every stop is `Stale` so the
    /// first `update_lines` pass is forced to compute it.
    ///
    /// This is the "no previous view" initialization path from §4.2. Each
    /// axis calls this independently with its own `start`/`end`/`n`, which
    /// sidesteps the historical bug where both axes were tiled using the
    /// same loop variable.
    pub fn linear(start: f64, end: f64, n: usize) -> Self {
        let mut coord = Vec::with_capacity(n);
        let mut nearest = Vec::with_capacity(n);
        let mut error = Vec::with_capacity(n);
        let mut from = Vec::with_capacity(n);
        for i in 0..n {
            let c = stop(start, end, i, n);
            coord.push(c);
            nearest.push(c);
            error.push(0.0);
            from.push(Source::Stale);
        }
        Ruler {
            coord,
            nearest,
            error,
            from,
        }
    }

    /// After a warp, mark stale duplicates: within any maximal run of
    /// consecutive stops inherited from the same previous-axis index, keep
    /// only the one with the lowest error and mark the rest `Stale`.
    ///
    /// A literal two-pass adjacent-swap (scan forward, then backward,
    /// flipping whichever neighbor has the larger error) can strand more
    /// than one survivor in a run of three or more when the error sequence
    /// isn't monotonic, since once a middle entry flips to `Stale` it breaks
    /// the adjacency check on both sides of it. Finding the true run minimum
    /// directly avoids that.
    pub fn mark_duplicates(&mut self) {
        let n = self.from.len();
        let mut i = 0;
        while i < n {
            let run_start = i;
            let mut run_end = i + 1;
            if let Source::Inherited(v) = self.from[i] {
                while run_end < n && self.from[run_end] == Source::Inherited(v) {
                    run_end += 1;
                }
            }
            if run_end - run_start > 1 {
                let mut best = run_start;
                for k in (run_start + 1)..run_end {
                    if self.error[k] < self.error[best] {
                        best = k;
                    }
                }
                for k in run_start..run_end {
                    if k != best {
                        self.from[k] = Source::Stale;
                    }
                }
            }
            i = run_end;
        }
    }

    /// Worst (largest) error across all stops, and its index.
    pub fn worst(&self) -> (f64, usize) {
        let mut best_i = 0;
        let mut best_e = self.error.first().copied().unwrap_or(0.0);
        for (i, &e) in self.error.iter().enumerate() {
            if e > best_e {
                best_e = e;
                best_i = i;
            }
        }
        (best_e, best_i)
    }
}

fn stop(start: f64, end: f64, i: usize, n: usize) -> f64 {
    if n > 1 {
        start + (end - start) * (i as f64) / ((n - 1) as f64)
    } else {
        start
    }
}

/// Build a new axis Ruler against a previous axis's inherited samples.
///
/// `old_nearest` is the previous axis's `nearest[]` (length `m >= 1`,
/// monotonically non-decreasing); `old_error` is accepted for contract
/// symmetry with the previous axis but, per the original design, does not
/// participate in stop selection — only `old_nearest` does.
///
/// Returns the built Ruler and the count of stops whose error is exactly
/// zero (an exact match), which the caller accumulates into the new frame's
/// `cnt_h_lines`/`cnt_v_lines`.
///
/// Runs in O(n + m): `i_old` only ever advances, so the inner `while` sums to
/// at most `m` iterations across the whole outer loop.
pub fn make_ruler(
    start: f64,
    end: f64,
    n: usize,
    old_nearest: &[f64],
    _old_error: &[f64],
) -> (Ruler, usize) {
    let m = old_nearest.len();
    assert!(m > 0, "make_ruler requires a non-empty previous axis");

    let mut coord = Vec::with_capacity(n);
    let mut nearest = Vec::with_capacity(n);
    let mut error = Vec::with_capacity(n);
    let mut from = Vec::with_capacity(n);
    let mut exact = 0usize;
    let mut i_old = 0usize;

    for i_new in 0..n {
        let curr = stop(start, end, i_new, n);
        while i_old < m - 1
            && (curr - old_nearest[i_old + 1]).abs() <= (curr - old_nearest[i_old]).abs()
        {
            i_old += 1;
        }
        let near = old_nearest[i_old];
        let err = (curr - near).abs();
        if err == 0.0 {
            exact += 1;
        }
        coord.push(curr);
        nearest.push(near);
        error.push(err);
        from.push(Source::Inherited(i_old as u32));
    }

    (
        Ruler {
            coord,
            nearest,
            error,
            from,
        },
        exact,
    )
}
