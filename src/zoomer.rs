//! The state machine that drives COPY -> (RENDER+UPDATE in parallel) ->
//! PAINT against a display clock (§4.5, §5).
//!
//! A [`Zoomer`] owns the pair of [`View`]s (calc/disp), the [`FramePool`],
//! and — unless [`ZoomerConfig::disable_ww`] opts out — the two render
//! [`WorkerPool`] threads. It knows nothing about fractal math, palettes, or
//! input handling: those all arrive through [`ZoomerCallbacks`], keeping the
//! worker/scheduler boundary free of any UI or canvas concerns.

use std::time::{Duration, Instant};

use crate::callbacks::{Surface, ZoomerCallbacks};
use crate::config::ZoomerConfig;
use crate::error::ZoomerError;
use crate::frame::{Frame, FramePool};
use crate::render::render_frame;
use crate::view::View;
use crate::worker::WorkerPool;

/// Scheduler phase (§4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Stop,
    Copy,
    Update,
    Render,
    Paint,
}

/// A point-in-time snapshot of scheduler statistics, analogous to how
/// `RenderProgress` hands callers a plain immutable struct rather than a
/// handle into live scheduler state (§11).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ZoomerStats {
    pub frame_rate: f64,
    pub cnt_frames: u64,
    pub cnt_dropped: u64,
    pub avg_copy_ms: f64,
    pub avg_update_ms: f64,
    pub avg_render_ms: f64,
    pub avg_paint_ms: f64,
}

fn lowpass(avg: &mut f64, sample: f64, coef: f64) {
    *avg += (sample - *avg) * coef;
}

/// Split a 2-element view array into (calc, disp) regardless of which index
/// is currently playing which role, so both can be borrowed at once — one
/// mutably, one not — the way `on_begin_frame` needs them.
fn split_views_mut(views: &mut [View; 2], calc_idx: usize) -> (&mut View, &View) {
    let disp_idx = 1 - calc_idx;
    if calc_idx < disp_idx {
        let (left, right) = views.split_at_mut(disp_idx);
        (&mut left[calc_idx], &right[0])
    } else {
        let (left, right) = views.split_at_mut(calc_idx);
        (&mut right[0], &left[disp_idx])
    }
}

/// The `Zoomer` scheduler (§4.5, §5, §6).
///
/// Drive it by calling [`Zoomer::tick`] repeatedly — once per animation
/// frame, timer pop, or whatever cooperative-yield primitive the embedding
/// runtime offers (§5: "any cooperative-yield primitive the target runtime
/// provides"). Each `tick` does at most `update_slice` milliseconds of new
/// UPDATE work before returning, so the caller's own event loop stays
/// responsive.
pub struct Zoomer<C: ZoomerCallbacks> {
    config: ZoomerConfig,
    callbacks: C,
    enable_angle: bool,
    pool: FramePool,
    workers: Option<WorkerPool>,

    views: [View; 2],
    calc_idx: usize,
    view_w: u32,
    view_h: u32,

    state: State,
    frame_nr: u64,
    stats: ZoomerStats,

    copy_start: Instant,
    /// Holds the previous disp-frame between COPY and RENDER/PAINT when
    /// workers are disabled; `None` in worker mode, where the frame instead
    /// travels through the worker channel.
    pending_render: Option<Box<Frame>>,

    time_last_wake: Instant,
    time_last_drop: Option<Instant>,
    time_last_activity: Instant,
}

impl<C: ZoomerCallbacks> Zoomer<C> {
    /// Build a scheduler bound to `surface`'s current size, running the
    /// first full `fill` synchronously so there is always a complete disp
    /// frame to inherit from by the first `tick`.
    pub fn new(
        surface: &dyn Surface,
        enable_angle: bool,
        config: ZoomerConfig,
        mut callbacks: C,
    ) -> Result<Self, ZoomerError> {
        config.validate()?;
        let (view_w, view_h) = surface.view_dims();
        if view_w == 0 || view_h == 0 {
            return Err(ZoomerError::ZeroSurface);
        }
        log::info!(
            "zoomer: starting at {view_w}x{view_h} (angle {})",
            if enable_angle { "enabled" } else { "disabled" }
        );

        let workers = if config.disable_ww {
            None
        } else {
            Some(WorkerPool::new())
        };
        let frame_rate = config.frame_rate;
        let now = Instant::now();

        let mut pool = FramePool::new();
        let mut frame0 = pool.alloc(view_w, view_h, enable_angle);
        callbacks.on_init_frame(&mut frame0);

        let mut views = [
            View::new(view_w, view_h, enable_angle),
            View::new(view_w, view_h, enable_angle),
        ];
        views[0].bind_frame(frame0);
        {
            let (calc, rest) = views.split_at_mut(1);
            callbacks.on_begin_frame(&mut calc[0], &rest[0]);
        }
        views[0].fill(&mut |x, y| callbacks.on_update_pixel(x, y));

        Ok(Self {
            config,
            callbacks,
            enable_angle,
            pool,
            workers,
            views,
            calc_idx: 0,
            view_w,
            view_h,
            state: State::Copy,
            frame_nr: 0,
            stats: ZoomerStats {
                frame_rate,
                ..ZoomerStats::default()
            },
            copy_start: now,
            pending_render: None,
            time_last_wake: now,
            time_last_drop: None,
            time_last_activity: now,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn frame_nr(&self) -> u64 {
        self.frame_nr
    }

    pub fn stats(&self) -> ZoomerStats {
        self.stats
    }

    pub fn calc_view(&self) -> &View {
        &self.views[self.calc_idx]
    }

    pub fn disp_view(&self) -> &View {
        &self.views[self.disp_idx()]
    }

    /// Let the scheduler know the view has moved, so `UPDATE`'s idle-burst
    /// budget (§6 `update_idle_burst`/`wake_timeout`) doesn't kick in while
    /// the user is actively navigating. The pixel formula, palette, and
    /// input handling are all out of scope (§1), so this is the one hook
    /// the embedder's input layer is expected to call directly rather than
    /// through [`ZoomerCallbacks`].
    pub fn notify_activity(&mut self, now: Instant) {
        self.time_last_activity = now;
    }

    /// Permanently stop the scheduler. A stopped `Zoomer` does not reschedule
    /// itself; subsequent `tick` calls are no-ops (§4.5 STOP).
    pub fn stop(&mut self) {
        self.state = State::Stop;
    }

    /// Join both render-worker threads and fall back to inline rendering for
    /// the remainder of the session (§11 "graceful worker shutdown"). Safe to
    /// call when workers are already disabled.
    pub fn shutdown(&mut self) {
        if self.workers.take().is_some() {
            log::warn!("zoomer: shut down render workers");
        }
    }

    fn disp_idx(&self) -> usize {
        1 - self.calc_idx
    }

    /// Advance the state machine. Polls for worker results unconditionally
    /// (§5's worker-return path runs "parallel to UPDATE", i.e. independent
    /// of whatever phase the main context is currently in), then does one
    /// phase's worth of work for the current `state`.
    pub fn tick(&mut self, surface: &dyn Surface, now: Instant) {
        self.poll_workers(now);

        if self.state == State::Stop {
            return;
        }

        // Vsync-loss recovery (§7): a >2s gap since the scheduler was last
        // woken means the host likely suspended us (backgrounded tab,
        // laptop lid) rather than that we're merely behind; resync instead
        // of trying to burn through a backlog of stale deadlines.
        if now.saturating_duration_since(self.time_last_wake) > Duration::from_secs(2)
            && self.time_last_wake != now
        {
            log::debug!("zoomer: resyncing clock after a vsync gap");
            self.copy_start = now;
            self.state = State::Copy;
        }
        self.time_last_wake = now;

        match self.state {
            State::Stop => {}
            State::Copy => self.do_copy(surface, now),
            State::Update => self.do_update(now),
            State::Render => self.do_render(now),
            State::Paint => self.do_paint(now),
        }
    }

    fn poll_workers(&mut self, now: Instant) {
        let Some(workers) = self.workers.as_ref() else {
            return;
        };
        for frame in workers.try_recv_any() {
            if frame.stats.duration_render == 0.0 {
                self.note_drop(now);
                self.pool.release(*frame);
            } else {
                lowpass(
                    &mut self.stats.avg_render_ms,
                    frame.stats.duration_render,
                    self.config.coef,
                );
                self.finish_paint(frame, now);
            }
        }
    }

    fn note_drop(&mut self, now: Instant) {
        self.stats.cnt_dropped += 1;
        if let Some(last) = self.time_last_drop {
            if now.saturating_duration_since(last) > Duration::from_millis(2000) {
                self.stats.frame_rate *= 0.95;
                log::warn!(
                    "zoomer: dropped frames >2s apart, throttling frame_rate to {:.2}",
                    self.stats.frame_rate
                );
            }
        }
        self.time_last_drop = Some(now);
    }

    /// §4.5 COPY.
    fn do_copy(&mut self, surface: &dyn Surface, now: Instant) {
        self.copy_start = now;
        let (new_w, new_h) = surface.view_dims();
        if new_w == 0 || new_h == 0 {
            // Surface not ready yet (e.g. a hidden tab); try again next tick.
            return;
        }

        if (new_w, new_h) != (self.view_w, self.view_h) {
            self.resize(new_w, new_h, now);
            lowpass(
                &mut self.stats.avg_copy_ms,
                now.elapsed().as_secs_f64() * 1000.0,
                self.config.coef,
            );
            self.state = State::Update;
            return;
        }

        self.calc_idx = self.disp_idx();

        let mut frame = self.pool.alloc(self.view_w, self.view_h, self.enable_angle);
        self.callbacks.on_init_frame(&mut frame);
        self.views[self.calc_idx].bind_frame(frame);

        let calc_idx = self.calc_idx;
        {
            let Self {
                views, callbacks, ..
            } = self;
            let (calc_view, disp_view) = split_views_mut(views, calc_idx);
            callbacks.on_begin_frame(calc_view, disp_view);
        }

        let disp_idx = self.disp_idx();
        let mut prev_frame = self.views[disp_idx].take_frame();
        if let Some(pf) = prev_frame.as_mut() {
            let period = Duration::from_secs_f64(2.0 / self.stats.frame_rate.max(1e-6));
            pf.time_expire = Some(now + period);
        }

        match self.workers.as_ref() {
            Some(workers) => {
                let mut worker_unavailable = false;
                if let Some(mut pf) = prev_frame {
                    self.callbacks.on_render_frame(&mut pf);
                    if workers.submit(self.frame_nr, Box::new(pf)).is_err() {
                        worker_unavailable = true;
                    }
                }
                if worker_unavailable {
                    log::error!(
                        "zoomer: render worker channel closed, falling back to inline rendering"
                    );
                    self.workers = None;
                    self.note_drop(now);
                }
                self.state = State::Update;
            }
            None => {
                self.pending_render = prev_frame.map(Box::new);
                self.state = State::Render;
            }
        }

        self.frame_nr += 1;
        lowpass(
            &mut self.stats.avg_copy_ms,
            now.elapsed().as_secs_f64() * 1000.0,
            self.config.coef,
        );
    }

    /// Recreate both views at the new size and give the new calc-view a
    /// fresh full `fill` (§4.5 COPY, resize branch; §7 "resize mid-flight").
    /// Any frame the old disp-view was holding is simply dropped — its
    /// dimensions no longer match anything the pool can reuse, so there is
    /// nothing useful left to do with it (the pool's own `alloc` already
    /// discards dimension-mismatched entries on the normal path).
    fn resize(&mut self, new_w: u32, new_h: u32, now: Instant) {
        log::info!(
            "zoomer: resize {}x{} -> {new_w}x{new_h}",
            self.view_w,
            self.view_h
        );

        self.views = [
            View::new(new_w, new_h, self.enable_angle),
            View::new(new_w, new_h, self.enable_angle),
        ];
        self.view_w = new_w;
        self.view_h = new_h;
        self.calc_idx = 0;
        self.pending_render = None;

        let (pixel_w, pixel_h) = Frame::pixel_dims(new_w, new_h, self.enable_angle);
        self.callbacks.on_resize(new_w, new_h, pixel_w, pixel_h);

        let mut frame = self.pool.alloc(new_w, new_h, self.enable_angle);
        self.callbacks.on_init_frame(&mut frame);
        self.views[0].bind_frame(frame);
        {
            let Self {
                views, callbacks, ..
            } = self;
            let (calc, rest) = views.split_at_mut(1);
            callbacks.on_begin_frame(&mut calc[0], &rest[0]);
        }
        {
            let Self {
                views, callbacks, ..
            } = self;
            views[0].fill(&mut |x, y| callbacks.on_update_pixel(x, y));
        }

        self.time_last_activity = now;
    }

    /// §4.5 UPDATE: spend a bounded slice recomputing worst-error lines.
    fn do_update(&mut self, now: Instant) {
        let frame_rate = self.stats.frame_rate.max(1e-6);
        let period_ms = 1000.0 / frame_rate;
        let inline_render = self.workers.is_none();
        let budget_ms = (period_ms
            - self.stats.avg_copy_ms
            - self.stats.avg_paint_ms
            - if inline_render {
                self.stats.avg_render_ms
            } else {
                0.0
            })
        .max(0.0);
        let mut nextsync = self.copy_start + Duration::from_secs_f64(budget_ms / 1000.0);

        let idle = now.saturating_duration_since(self.time_last_activity)
            > Duration::from_secs_f64(self.config.wake_timeout / 1000.0);
        if idle {
            nextsync =
                self.copy_start + Duration::from_secs_f64(self.config.update_idle_burst / 1000.0);
        }

        let end = (now + Duration::from_secs_f64(self.config.update_slice / 1000.0)).min(nextsync);

        {
            let Self {
                views,
                callbacks,
                calc_idx,
                ..
            } = self;
            let calc_view = &mut views[*calc_idx];
            while Instant::now() < end {
                if !calc_view.update_lines(&mut |x, y| callbacks.on_update_pixel(x, y)) {
                    break;
                }
            }
        }

        let now2 = Instant::now();
        if now2 >= nextsync {
            let overshoot = now2.saturating_duration_since(nextsync);
            if overshoot > Duration::from_millis(1) {
                log::debug!("zoomer: UPDATE overshot nextsync by {overshoot:?}");
                // A slow calculator can blow straight through the whole UPDATE
                // budget in a single `update_lines` call (that call isn't
                // preemptible), at which point the COPY/RENDER expiry check
                // never gets a chance to see a stale frame go by. Counting the
                // overshoot itself as a drop is what actually lets a
                // pathologically slow pixel formula engage the throttle.
                self.note_drop(now2);
            }
            lowpass(
                &mut self.stats.avg_update_ms,
                now2.saturating_duration_since(now).as_secs_f64() * 1000.0,
                self.config.coef,
            );
            self.state = State::Copy;
        }
        // else: stay in Update, the next tick continues the same phase.
    }

    /// §4.5 RENDER (inline mode only).
    fn do_render(&mut self, now: Instant) {
        let Some(mut frame) = self.pending_render.take() else {
            self.state = State::Copy;
            return;
        };
        self.callbacks.on_render_frame(&mut frame);
        if render_frame(&mut frame, now) {
            lowpass(
                &mut self.stats.avg_render_ms,
                frame.stats.duration_render,
                self.config.coef,
            );
            self.pending_render = Some(frame);
            self.state = State::Paint;
        } else {
            self.note_drop(now);
            self.pool.release(*frame);
            self.state = State::Copy;
        }
    }

    /// §4.5 PAINT.
    fn do_paint(&mut self, now: Instant) {
        if let Some(frame) = self.pending_render.take() {
            let start = Instant::now();
            self.finish_paint(frame, now);
            lowpass(
                &mut self.stats.avg_paint_ms,
                start.elapsed().as_secs_f64() * 1000.0,
                self.config.coef,
            );
        }
        self.state = State::Update;
    }

    /// Deliver a rendered frame and return its buffer to the pool. Shared by
    /// the inline PAINT path and the worker-return path, since both end the
    /// same way once a frame has `rgba` filled in (§4.5 PAINT, §5
    /// worker-return).
    fn finish_paint(&mut self, frame: Box<Frame>, now: Instant) {
        self.callbacks.on_put_image_data(&frame);
        self.callbacks.on_end_frame(&frame);
        self.stats.cnt_frames += 1;
        let _ = now;
        self.pool.release(*frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FixedSurface {
        dims: Cell<(u32, u32)>,
    }

    impl FixedSurface {
        fn new(w: u32, h: u32) -> Self {
            Self {
                dims: Cell::new((w, h)),
            }
        }
    }

    impl Surface for FixedSurface {
        fn view_dims(&self) -> (u32, u32) {
            self.dims.get()
        }
    }

    #[derive(Default)]
    struct RecordingCallbacks {
        painted: std::cell::RefCell<Vec<u64>>,
    }

    impl ZoomerCallbacks for RecordingCallbacks {
        fn on_begin_frame(&mut self, calc_view: &mut View, disp_view: &View) {
            if disp_view.frame().is_none() {
                calc_view.set_position(None, 0.0, 0.0, 2.0, 0.0);
            } else {
                calc_view.set_position(Some(disp_view), 0.1, 0.0, 1.9, 0.0);
            }
        }

        fn on_update_pixel(&mut self, x: f64, y: f64) -> u32 {
            ((x.abs() * 1000.0) as u32).wrapping_add((y.abs() * 1000.0) as u32)
        }

        fn on_put_image_data(&mut self, frame: &Frame) {
            self.painted.borrow_mut().push(frame.id);
        }
    }

    #[test]
    fn new_scheduler_starts_in_copy_with_a_full_disp_frame() {
        let surface = FixedSurface::new(16, 16);
        let zoomer = Zoomer::new(&surface, false, ZoomerConfig::default(), RecordingCallbacks::default())
            .expect("valid surface and config");
        assert_eq!(zoomer.state(), State::Copy);
        assert_eq!(zoomer.calc_view().frame().unwrap().stats.quality, 1.0);
    }

    #[test]
    fn zero_area_surface_is_rejected() {
        let surface = FixedSurface::new(0, 0);
        let result = Zoomer::new(&surface, false, ZoomerConfig::default(), RecordingCallbacks::default());
        assert!(matches!(result, Err(ZoomerError::ZeroSurface)));
    }

    #[test]
    fn invalid_config_is_rejected_before_any_allocation() {
        let surface = FixedSurface::new(16, 16);
        let config = ZoomerConfig {
            frame_rate: -1.0,
            ..ZoomerConfig::default()
        };
        let result = Zoomer::new(&surface, false, config, RecordingCallbacks::default());
        assert!(matches!(result, Err(ZoomerError::InvalidConfig(_))));
    }

    #[test]
    fn inline_mode_cycles_through_copy_render_paint_back_to_update() {
        let surface = FixedSurface::new(8, 8);
        let config = ZoomerConfig {
            disable_ww: true,
            update_slice: 50.0,
            ..ZoomerConfig::default()
        };
        let mut zoomer =
            Zoomer::new(&surface, false, config, RecordingCallbacks::default()).unwrap();

        zoomer.tick(&surface, Instant::now());
        assert_eq!(zoomer.state(), State::Render);
        zoomer.tick(&surface, Instant::now());
        assert_eq!(zoomer.state(), State::Paint);
        zoomer.tick(&surface, Instant::now());
        assert_eq!(zoomer.state(), State::Update);
        assert_eq!(zoomer.stats().cnt_frames, 1);
    }

    #[test]
    fn worker_mode_goes_straight_from_copy_to_update() {
        let surface = FixedSurface::new(8, 8);
        let config = ZoomerConfig {
            update_slice: 50.0,
            ..ZoomerConfig::default()
        };
        let mut zoomer =
            Zoomer::new(&surface, false, config, RecordingCallbacks::default()).unwrap();

        zoomer.tick(&surface, Instant::now());
        assert_eq!(zoomer.state(), State::Update);
    }

    #[test]
    fn resize_mid_session_rebuilds_both_views_at_the_new_size() {
        let surface = FixedSurface::new(8, 8);
        let config = ZoomerConfig {
            disable_ww: true,
            ..ZoomerConfig::default()
        };
        let mut zoomer =
            Zoomer::new(&surface, false, config, RecordingCallbacks::default()).unwrap();
        surface.dims.set((20, 12));

        zoomer.tick(&surface, Instant::now());

        assert_eq!(zoomer.calc_view().frame().unwrap().view_w, 20);
        assert_eq!(zoomer.calc_view().frame().unwrap().view_h, 12);
        assert_eq!(zoomer.calc_view().frame().unwrap().stats.quality, 1.0);
        assert_eq!(zoomer.state(), State::Update);
    }

    #[test]
    fn stop_freezes_the_state_machine() {
        let surface = FixedSurface::new(8, 8);
        let mut zoomer = Zoomer::new(
            &surface,
            false,
            ZoomerConfig::default(),
            RecordingCallbacks::default(),
        )
        .unwrap();
        zoomer.stop();
        let state_before = zoomer.state();
        zoomer.tick(&surface, Instant::now());
        assert_eq!(zoomer.state(), state_before);
        assert_eq!(zoomer.state(), State::Stop);
    }

    #[test]
    fn shutdown_is_idempotent_and_falls_back_to_inline_rendering() {
        let surface = FixedSurface::new(8, 8);
        let mut zoomer = Zoomer::new(
            &surface,
            false,
            ZoomerConfig::default(),
            RecordingCallbacks::default(),
        )
        .unwrap();
        zoomer.shutdown();
        zoomer.shutdown();
        zoomer.tick(&surface, Instant::now());
        // With workers gone, COPY must route through RENDER rather than
        // straight to UPDATE.
        assert_eq!(zoomer.state(), State::Render);
    }
}
