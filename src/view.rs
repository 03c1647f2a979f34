//! A logical window into the plane: a center-and-radius paired with a
//! storage-resolution pixel buffer and the two [`Ruler`]s that let a new
//! [`View`] inherit as much of a previous one's work as geometry allows.

use crate::frame::Frame;
use crate::ruler::{make_ruler, Ruler, Source};

fn is_canonical(ruler: &Ruler, idx: usize) -> bool {
    ruler.error[idx] == 0.0 || ruler.from[idx].is_stale()
}

fn has_adjacent_equal(coord: &[f64]) -> bool {
    coord.windows(2).any(|w| w[0] == w[1])
}

/// A view binds exactly one [`Frame`] at a time (§3: "exactly one Frame
/// bound at a time"). It owns its Rulers outright; the scheduler owns the
/// pair of Views and swaps which one is "calc" vs "disp" at each COPY.
pub struct View {
    pub view_w: u32,
    pub view_h: u32,
    pub pixel_w: u32,
    pub pixel_h: u32,
    pub enable_angle: bool,

    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
    pub angle: f64,

    pub radius_view_hor: f64,
    pub radius_view_ver: f64,
    pub radius_pixel_hor: f64,
    pub radius_pixel_ver: f64,

    pub x_ruler: Ruler,
    pub y_ruler: Ruler,
    frame: Option<Frame>,
}

impl View {
    pub fn new(view_w: u32, view_h: u32, enable_angle: bool) -> Self {
        let (pixel_w, pixel_h) = Frame::pixel_dims(view_w, view_h, enable_angle);
        Self {
            view_w,
            view_h,
            pixel_w,
            pixel_h,
            enable_angle,
            center_x: 0.0,
            center_y: 0.0,
            radius: 1.0,
            angle: 0.0,
            radius_view_hor: 0.0,
            radius_view_ver: 0.0,
            radius_pixel_hor: 0.0,
            radius_pixel_ver: 0.0,
            x_ruler: Ruler::linear(-1.0, 1.0, pixel_w as usize),
            y_ruler: Ruler::linear(-1.0, 1.0, pixel_h as usize),
            frame: None,
        }
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.frame.as_mut()
    }

    /// Remove the bound frame, e.g. to hand it to a render worker. The view
    /// holds no frame until `bind_frame`/`set_position` gives it a new one.
    pub fn take_frame(&mut self) -> Option<Frame> {
        self.frame.take()
    }

    pub fn bind_frame(&mut self, frame: Frame) {
        self.frame = Some(frame);
    }

    /// Position this view at the given center/radius/angle, building both
    /// Rulers against `previous` and warping `previous`'s pixels in when one
    /// is given (§4.2).
    ///
    /// The frame to fill must already be bound via [`View::bind_frame`] —
    /// this is what lets an embedder's `on_begin_frame` callback be "the
    /// authoritative place to call `set_position`" (§6) while the scheduler
    /// keeps ownership of frame allocation: the scheduler stages the frame,
    /// hands the view to the callback, and the callback supplies the
    /// center/radius/angle this call needs without ever touching the frame
    /// itself.
    ///
    /// With `previous = None` the Rulers are tiled linearly with every stop
    /// `Stale` and the pixel buffer is left untouched — the caller must
    /// follow up with [`View::fill`].
    pub fn set_position(
        &mut self,
        previous: Option<&View>,
        center_x: f64,
        center_y: f64,
        radius: f64,
        angle: f64,
    ) {
        self.center_x = center_x;
        self.center_y = center_y;
        self.radius = radius;
        self.angle = angle;
        if let Some(frame) = self.frame.as_mut() {
            frame.angle = angle;
        }

        let max_dim = self.view_w.max(self.view_h) as f64;
        self.radius_view_hor = radius * self.view_w as f64 / max_dim;
        self.radius_view_ver = radius * self.view_h as f64 / max_dim;
        self.radius_pixel_hor = radius * self.pixel_w as f64 / max_dim;
        self.radius_pixel_ver = radius * self.pixel_h as f64 / max_dim;

        let x_range = (
            center_x - self.radius_pixel_hor,
            center_x + self.radius_pixel_hor,
        );
        let y_range = (
            center_y - self.radius_pixel_ver,
            center_y + self.radius_pixel_ver,
        );

        match previous {
            None => {
                self.x_ruler = Ruler::linear(x_range.0, x_range.1, self.pixel_w as usize);
                self.y_ruler = Ruler::linear(y_range.0, y_range.1, self.pixel_h as usize);
            }
            Some(prev) => {
                let prev_frame = prev
                    .frame
                    .as_ref()
                    .expect("previous view has no bound frame to inherit from");

                let (x_ruler, exact_x) = make_ruler(
                    x_range.0,
                    x_range.1,
                    self.pixel_w as usize,
                    &prev.x_ruler.nearest,
                    &prev.x_ruler.error,
                );
                let (y_ruler, exact_y) = make_ruler(
                    y_range.0,
                    y_range.1,
                    self.pixel_h as usize,
                    &prev.y_ruler.nearest,
                    &prev.y_ruler.error,
                );
                self.x_ruler = x_ruler;
                self.y_ruler = y_ruler;
                if let Some(frame) = self.frame.as_mut() {
                    frame.stats.cnt_v_lines = exact_x as u64;
                    frame.stats.cnt_h_lines = exact_y as u64;
                }

                self.warp(prev_frame);
                self.x_ruler.mark_duplicates();
                self.y_ruler.mark_duplicates();

                let total = self.pixel_w as u64 * self.pixel_h as u64;
                if let Some(frame) = self.frame.as_mut() {
                    frame.stats.cnt_pixels = exact_x as u64 * exact_y as u64;
                    frame.stats.quality = if total > 0 {
                        (frame.stats.cnt_pixels as f64 / total as f64).min(1.0)
                    } else {
                        1.0
                    };
                }
            }
        }
    }

    /// Warp `prev_frame`'s pixels into the just-bound frame through the
    /// freshly built Rulers (§4.2 steps 1-2). Must run before
    /// `mark_duplicates`, while every `from[]` entry is still `Inherited`.
    fn warp(&mut self, prev_frame: &Frame) {
        let pixel_w = self.pixel_w as usize;
        let pixel_h = self.pixel_h as usize;
        let prev_pixel_w = prev_frame.pixel_w as usize;

        let x_from: Vec<usize> = self
            .x_ruler
            .from
            .iter()
            .map(|f| match f {
                Source::Inherited(i) => *i as usize,
                Source::Stale => 0,
            })
            .collect();

        let row_source = |from: Source| -> usize {
            match from {
                Source::Inherited(i) => i as usize,
                Source::Stale => 0,
            }
        };

        let frame = self.frame.as_mut().expect("frame must be bound before warp");

        let j0_from = row_source(self.y_ruler.from[0]);
        for (i, dst) in frame.pixels[0..pixel_w].iter_mut().enumerate() {
            *dst = prev_frame.pixels[j0_from * prev_pixel_w + x_from[i]];
        }

        for j in 1..pixel_h {
            if self.y_ruler.from[j] == self.y_ruler.from[j - 1] {
                let (head, tail) = frame.pixels.split_at_mut(j * pixel_w);
                let src = (j - 1) * pixel_w;
                tail[0..pixel_w].copy_from_slice(&head[src..src + pixel_w]);
            } else {
                let j_from = row_source(self.y_ruler.from[j]);
                let row = &mut frame.pixels[j * pixel_w..(j + 1) * pixel_w];
                for (i, dst) in row.iter_mut().enumerate() {
                    *dst = prev_frame.pixels[j_from * prev_pixel_w + x_from[i]];
                }
            }
        }
    }

    /// Brute-force compute every pixel via `calc(x, y)`. Used on the first
    /// frame of a session (no previous view to inherit from) or whenever the
    /// caller wants a ground-truth fill.
    pub fn fill(&mut self, calc: &mut dyn FnMut(f64, f64) -> u32) {
        let pixel_w = self.pixel_w as usize;
        let pixel_h = self.pixel_h as usize;
        let x_coord = self.x_ruler.coord.clone();
        let y_coord = self.y_ruler.coord.clone();

        {
            let frame = self
                .frame
                .as_mut()
                .expect("View has no bound frame to fill");
            for j in 0..pixel_h {
                let y = y_coord[j];
                let row = &mut frame.pixels[j * pixel_w..(j + 1) * pixel_w];
                for (i, dst) in row.iter_mut().enumerate() {
                    *dst = calc(x_coord[i], y);
                }
            }
            frame.stats.cnt_pixels = (pixel_w * pixel_h) as u64;
            frame.stats.quality = 1.0;
        }

        self.x_ruler.nearest = self.x_ruler.coord.clone();
        self.x_ruler.error = vec![0.0; pixel_w];
        self.y_ruler.nearest = self.y_ruler.coord.clone();
        self.y_ruler.error = vec![0.0; pixel_h];
    }

    /// Recompute exactly one row or column — whichever has the larger
    /// remaining error — using `calc`. Returns `false` (and does nothing)
    /// once every stop is exact, so callers can loop until this returns
    /// `false` without overshooting (§4.3).
    pub fn update_lines(&mut self, calc: &mut dyn FnMut(f64, f64) -> u32) -> bool {
        let (worst_x, worst_xi) = self.x_ruler.worst();
        let (worst_y, worst_yj) = self.y_ruler.worst();
        if worst_x == 0.0 && worst_y == 0.0 {
            return false;
        }
        if worst_x > worst_y {
            self.update_column(worst_xi, calc);
        } else {
            self.update_row(worst_yj, calc);
        }
        true
    }

    fn update_column(&mut self, i: usize, calc: &mut dyn FnMut(f64, f64) -> u32) {
        let x = self.x_ruler.coord[i];
        let pixel_w = self.pixel_w as usize;
        let pixel_h = self.pixel_h as usize;

        let mut last = 0u32;
        {
            let frame = self.frame.as_mut().expect("View has no bound frame");
            for j in 0..pixel_h {
                let canonical = j == 0 || is_canonical(&self.y_ruler, j);
                let v = if canonical {
                    last = calc(x, self.y_ruler.coord[j]);
                    last
                } else {
                    last
                };
                frame.pixels[j * pixel_w + i] = v;
            }
        }

        // Propagate the freshly computed column rightward into any stale
        // duplicate columns, stopping at the first non-duplicate.
        let mut u = i + 1;
        while u < pixel_w && self.x_ruler.error[u] != 0.0 && self.x_ruler.from[u].is_stale() {
            let frame = self.frame.as_mut().expect("View has no bound frame");
            for j in 0..pixel_h {
                frame.pixels[j * pixel_w + u] = frame.pixels[j * pixel_w + i];
            }
            u += 1;
        }

        self.x_ruler.nearest[i] = x;
        self.x_ruler.error[i] = 0.0;
        let frame = self.frame.as_mut().expect("View has no bound frame");
        frame.stats.cnt_v_lines += 1;
        frame.stats.cnt_pixels += pixel_h as u64;
        self.refresh_quality();
    }

    fn update_row(&mut self, j: usize, calc: &mut dyn FnMut(f64, f64) -> u32) {
        let y = self.y_ruler.coord[j];
        let pixel_w = self.pixel_w as usize;
        let pixel_h = self.pixel_h as usize;

        let mut last = 0u32;
        {
            let frame = self.frame.as_mut().expect("View has no bound frame");
            for i in 0..pixel_w {
                let canonical = i == 0 || is_canonical(&self.x_ruler, i);
                let v = if canonical {
                    last = calc(self.x_ruler.coord[i], y);
                    last
                } else {
                    last
                };
                frame.pixels[j * pixel_w + i] = v;
            }
        }

        // Propagate the freshly computed row downward into any stale
        // duplicate rows, stopping at the first non-duplicate.
        let mut v = j + 1;
        while v < pixel_h && self.y_ruler.error[v] != 0.0 && self.y_ruler.from[v].is_stale() {
            let frame = self.frame.as_mut().expect("View has no bound frame");
            let (head, tail) = frame.pixels.split_at_mut(v * pixel_w);
            let src = j * pixel_w;
            tail[0..pixel_w].copy_from_slice(&head[src..src + pixel_w]);
            v += 1;
        }

        self.y_ruler.nearest[j] = y;
        self.y_ruler.error[j] = 0.0;
        let frame = self.frame.as_mut().expect("View has no bound frame");
        frame.stats.cnt_h_lines += 1;
        frame.stats.cnt_pixels += pixel_w as u64;
        self.refresh_quality();
    }

    fn refresh_quality(&mut self) {
        let total = self.pixel_w as u64 * self.pixel_h as u64;
        if total == 0 {
            return;
        }
        let frame = self.frame.as_mut().expect("View has no bound frame");
        frame.stats.quality = (frame.stats.cnt_pixels as f64 / total as f64).min(1.0);
    }

    /// True once the zoom step has collapsed below `f64` precision: two
    /// adjacent coordinate stops on either axis have become numerically
    /// equal. The caller should stop zooming in further.
    pub fn reached_limits(&self) -> bool {
        has_adjacent_equal(&self.x_ruler.coord) || has_adjacent_equal(&self.y_ruler.coord)
    }
}
