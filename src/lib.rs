//! A progressive reprojection engine for interactive real-time fractal
//! zooming.
//!
//! A user navigates a 2D complex-plane view at high frame rates while
//! per-pixel values are progressively computed, reprojected across frames,
//! and painted to a display surface. Exhaustive recomputation per frame is
//! impossible, so this crate salvages work from the previous frame and
//! spends a bounded time budget improving the worst-approximated regions
//! before each display refresh.
//!
//! The pieces, leaves first:
//! - [`Ruler`]: a per-axis table mapping a new frame's coordinate stops to
//!   the previous frame's nearest inherited samples.
//! - [`Frame`]/[`FramePool`]: the pixel/RGBA buffer pair for one instant in
//!   time, pool-allocated by dimensions.
//! - [`View`]: a center-and-radius window pairing two `Ruler`s with a bound
//!   `Frame`; knows how to inherit pixels from a previous view
//!   ([`View::set_position`]) and recompute the single worst row or column
//!   ([`View::update_lines`]).
//! - [`render_frame`]: the pure `Frame -> RGBA` pass, with axis-aligned fast
//!   paths and a fixed-point rotated path.
//! - [`Zoomer`]: the scheduler that drives COPY -> (RENDER+UPDATE in
//!   parallel) -> PAINT against a display clock using two alternating
//!   `View`s and an off-thread [`WorkerPool`].
//!
//! The pixel formula, palette generator, and display surface are external
//! collaborators, supplied by an embedder through [`ZoomerCallbacks`] and
//! [`Surface`] — this crate owns only the reprojection machinery.

pub mod callbacks;
pub mod config;
pub mod error;
pub mod frame;
pub mod render;
pub mod ruler;
pub mod view;
pub mod worker;
pub mod zoomer;

pub use callbacks::{Surface, ZoomerCallbacks};
pub use config::ZoomerConfig;
pub use error::ZoomerError;
pub use frame::{Frame, FramePool, FrameStats, TRANSPARENT_INDEX};
pub use render::render_frame;
pub use ruler::{make_ruler, Ruler, Source};
pub use view::View;
pub use worker::{MainToWorker, WorkerHandle, WorkerPool, WorkerToMain};
pub use zoomer::{State, Zoomer, ZoomerStats};
