//! The declared interfaces to everything §1 calls out as an external
//! collaborator: the pixel formula, the palette generator, and the display
//! surface. The scheduler invokes these but owns none of their state (§6).

use crate::frame::Frame;
use crate::view::View;

/// The display surface: reports its current size and accepts painted RGBA.
/// A resize is observed by the scheduler polling `view_dims()` at COPY, not
/// pushed — this mirrors how the source learns of canvas resizes only when
/// it next looks.
pub trait Surface {
    fn view_dims(&self) -> (u32, u32);
}

/// All scheduler callbacks. Every method has a no-op default so an embedder
/// only overrides what it needs (§6: "all optional").
#[allow(unused_variables)]
pub trait ZoomerCallbacks {
    /// The surface's size changed; `pixel_w`/`pixel_h` are the recomputed
    /// storage dimensions for the new size.
    fn on_resize(&mut self, view_w: u32, view_h: u32, pixel_w: u32, pixel_h: u32) {}

    /// A fresh Frame was just allocated from the pool. Last chance to bind a
    /// palette before it's used.
    fn on_init_frame(&mut self, frame: &mut Frame) {}

    /// Authoritative place to call `calc_view.set_position(..)`: the
    /// scheduler has already allocated the calc-view's frame and swapped
    /// calc/disp, but has not yet warped any pixels.
    fn on_begin_frame(&mut self, calc_view: &mut View, disp_view: &View);

    /// The pixel formula: `(x, y) -> code`. Called from `update_lines` and
    /// `fill`, potentially many times per tick — keep this cheap.
    ///
    /// Takes only the coordinate, not the frame being filled: the frame's
    /// pixel buffer is mid-mutation for the whole duration of the `fill`/
    /// `update_lines` call that invokes this, so handing back a `&Frame`
    /// into the same buffer would alias it. Implementers that need frame
    /// context (palette range, iteration cap) should close over it instead.
    fn on_update_pixel(&mut self, x: f64, y: f64) -> u32;

    /// About to render `frame`. Last chance to populate `frame.palette`.
    fn on_render_frame(&mut self, frame: &mut Frame) {}

    /// Deliver `frame.rgba` to the surface.
    fn on_put_image_data(&mut self, frame: &Frame) {}

    /// Statistics sink: called once a frame's PAINT has completed, whether
    /// or not it was dropped.
    fn on_end_frame(&mut self, frame: &Frame) {}
}
