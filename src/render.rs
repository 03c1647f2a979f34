//! Pure `Frame -> RGBA buffer` rendering (§4.4).
//!
//! `render_frame` never mutates `frame.pixels`; it only ever reads the
//! storage-resolution grid and writes the display-resolution `rgba` grid.
//! That purity is what lets the scheduler hand a frame to an off-thread
//! worker with no synchronization beyond the channel transfer itself.

use crate::frame::Frame;
use std::time::Instant;

/// Fill `frame.rgba` from `frame.pixels`, honoring `frame.angle` and
/// whether a palette is bound. Returns `false` (and leaves `rgba`
/// untouched, `duration_render` at `0.0`) if `now` is already past
/// `frame.time_expire` — the scheduler reads that as a dropped frame.
pub fn render_frame(frame: &mut Frame, now: Instant) -> bool {
    if frame.expired(now) {
        frame.stats.duration_render = 0.0;
        return false;
    }

    let start = Instant::now();
    if frame.angle == 0.0 {
        if frame.palette.is_some() {
            render_axis_aligned_palette(frame);
        } else if frame.pixel_w == frame.view_w && frame.pixel_h == frame.view_h {
            render_axis_aligned_direct_contiguous(frame);
        } else {
            render_axis_aligned_direct_cropped(frame);
        }
    } else {
        render_rotated(frame);
    }
    frame.stats.duration_render = start.elapsed().as_secs_f64() * 1000.0;
    true
}

fn render_axis_aligned_palette(frame: &mut Frame) {
    let i0 = ((frame.pixel_w - frame.view_w) / 2) as usize;
    let j0 = ((frame.pixel_h - frame.view_h) / 2) as usize;
    let pixel_w = frame.pixel_w as usize;
    let view_w = frame.view_w as usize;
    let view_h = frame.view_h as usize;

    let Frame { pixels, rgba, palette, .. } = frame;
    let palette = palette.as_ref().expect("palette must be bound for this path");

    for v in 0..view_h {
        let src = (j0 + v) * pixel_w + i0;
        let dst = v * view_w;
        for u in 0..view_w {
            let code = pixels[src + u] as usize & 0xFFFF;
            rgba[dst + u] = palette[code];
        }
    }
}

fn render_axis_aligned_direct_contiguous(frame: &mut Frame) {
    frame.rgba.copy_from_slice(&frame.pixels);
}

fn render_axis_aligned_direct_cropped(frame: &mut Frame) {
    let i0 = ((frame.pixel_w - frame.view_w) / 2) as usize;
    let j0 = ((frame.pixel_h - frame.view_h) / 2) as usize;
    let pixel_w = frame.pixel_w as usize;
    let view_w = frame.view_w as usize;
    let view_h = frame.view_h as usize;

    let Frame { pixels, rgba, .. } = frame;
    for v in 0..view_h {
        let src = (j0 + v) * pixel_w + i0;
        let dst = v * view_w;
        rgba[dst..dst + view_w].copy_from_slice(&pixels[src..src + view_w]);
    }
}

/// Nearest-neighbour rotation using fixed-point 16.16 deltas. The constants
/// here preserve the source's coordinate system bit-for-bit (§4.4); the
/// `32768` bias in `x_start`/`y_start` is a half-scale relative to the
/// `65536`-scaled per-step deltas, which may or may not be an intentional
/// half-pixel centering convention (§9 Open Question) — preserved as
/// specified rather than "fixed".
fn render_rotated(frame: &mut Frame) {
    let radians = frame.angle.to_radians();
    let sin_a = radians.sin();
    let cos_a = radians.cos();

    let view_w_f = frame.view_w as f64;
    let view_h_f = frame.view_h as f64;
    let pixel_w_f = frame.pixel_w as f64;
    let pixel_h_f = frame.pixel_h as f64;

    let x_start = ((pixel_w_f - view_h_f * sin_a - view_w_f * cos_a) * 32768.0).floor() as i64;
    let y_start = ((pixel_h_f - view_h_f * cos_a + view_w_f * sin_a) * 32768.0).floor() as i64;
    let ix_step = (cos_a * 65536.0).floor() as i64;
    let iy_step = (-sin_a * 65536.0).floor() as i64;
    let jx_step = (sin_a * 65536.0).floor() as i64;
    let jy_step = (cos_a * 65536.0).floor() as i64;

    let pixel_w = frame.pixel_w as i64;
    let pixel_h = frame.pixel_h as i64;
    let view_w = frame.view_w as usize;
    let view_h = frame.view_h as usize;

    let Frame { pixels, rgba, palette, .. } = frame;

    for v in 0..view_h {
        let vf = v as i64;
        let row_ix = x_start + vf * jx_step;
        let row_iy = y_start + vf * jy_step;
        for u in 0..view_w {
            let uf = u as i64;
            let ix = row_ix + uf * ix_step;
            let iy = row_iy + uf * iy_step;
            let src_x = ix >> 16;
            let src_y = iy >> 16;
            let value = if src_x >= 0 && src_x < pixel_w && src_y >= 0 && src_y < pixel_h {
                pixels[(src_y * pixel_w + src_x) as usize]
            } else {
                0
            };
            let out = match palette {
                Some(p) => p[value as usize & 0xFFFF],
                None => value,
            };
            rgba[v * view_w + u] = out;
        }
    }
}
