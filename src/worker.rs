//! Off-thread render workers.
//!
//! §5 calls for two render workers that receive a [`Frame`] by
//! exclusive-transfer message and hand it back once `render_frame` has
//! filled in `rgba`. In a native build that transfer is just moving a
//! `Box<Frame>` across a channel rather than a structured-clone/postMessage
//! round trip, so there is no wire format to define here — ownership moves,
//! nothing is serialized.

use crate::frame::Frame;
use crate::render::render_frame;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Sent from the scheduler to a worker.
pub enum MainToWorker {
    Render(Box<Frame>),
    Terminate,
}

/// Sent from a worker back to the scheduler.
pub enum WorkerToMain {
    Rendered(Box<Frame>),
}

/// One render worker: a thread plus the channel pair used to hand it frames
/// and get them back.
pub struct WorkerHandle {
    to_worker: Sender<MainToWorker>,
    from_worker: Receiver<WorkerToMain>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    fn spawn() -> Self {
        let (to_worker_tx, to_worker_rx) = bounded::<MainToWorker>(1);
        let (from_worker_tx, from_worker_rx) = bounded::<WorkerToMain>(1);

        let thread = thread::spawn(move || {
            for msg in to_worker_rx.iter() {
                match msg {
                    MainToWorker::Render(mut frame) => {
                        render_frame(&mut frame, Instant::now());
                        if from_worker_tx.send(WorkerToMain::Rendered(frame)).is_err() {
                            break;
                        }
                    }
                    MainToWorker::Terminate => break,
                }
            }
        });

        WorkerHandle {
            to_worker: to_worker_tx,
            from_worker: from_worker_rx,
            thread: Some(thread),
        }
    }

    /// Hand a frame to this worker. Never blocks past the channel's single
    /// slot: the scheduler is expected to have already drained this
    /// worker's previous result before submitting a new one (§5: a frame's
    /// render completes before its successor's transfer is received).
    pub fn submit(&self, frame: Box<Frame>) -> Result<(), crate::error::ZoomerError> {
        self.to_worker
            .send(MainToWorker::Render(frame))
            .map_err(|_| crate::error::ZoomerError::WorkerUnavailable)
    }

    /// Non-blocking poll for a completed frame.
    pub fn try_recv(&self) -> Option<Box<Frame>> {
        match self.from_worker.try_recv() {
            Ok(WorkerToMain::Rendered(frame)) => Some(frame),
            Err(_) => None,
        }
    }

    /// Block until this worker returns a frame, up to `timeout`.
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Box<Frame>> {
        match self.from_worker.recv_timeout(timeout) {
            Ok(WorkerToMain::Rendered(frame)) => Some(frame),
            Err(_) => None,
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.to_worker.send(MainToWorker::Terminate);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The fixed pair of render workers the scheduler alternates between,
/// assigning frame `N` to worker `N & 1` (§5).
pub struct WorkerPool {
    workers: [WorkerHandle; 2],
}

impl WorkerPool {
    pub fn new() -> Self {
        WorkerPool {
            workers: [WorkerHandle::spawn(), WorkerHandle::spawn()],
        }
    }

    pub fn submit(&self, frame_nr: u64, frame: Box<Frame>) -> Result<(), crate::error::ZoomerError> {
        self.workers[(frame_nr & 1) as usize].submit(frame)
    }

    pub fn try_recv(&self, frame_nr: u64) -> Option<Box<Frame>> {
        self.workers[(frame_nr & 1) as usize].try_recv()
    }

    pub fn recv_timeout(&self, frame_nr: u64, timeout: std::time::Duration) -> Option<Box<Frame>> {
        self.workers[(frame_nr & 1) as usize].recv_timeout(timeout)
    }

    /// Drain whatever either worker has finished without blocking. The
    /// scheduler's worker-return path polls this every tick, independent of
    /// whatever state it's currently in (§5).
    pub fn try_recv_any(&self) -> Vec<Box<Frame>> {
        self.workers
            .iter()
            .filter_map(|w| w.try_recv())
            .collect()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}
