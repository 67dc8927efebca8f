//! Background export worker
//!
//! The UI thread starts a job with a snapshot of the render settings and
//! polls it once per frame. Progress and cancellation cross threads through
//! atomics; the result comes back through the join handle.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use super::{export_video, ExportError, ExportSummary, EXPORT_FRAMES};
use crate::render::FontBook;
use crate::settings::RenderSettings;

type JobResult = Result<ExportSummary, ExportError>;

/// A running (or finished, not yet collected) export
pub struct ExportJob {
    path: PathBuf,
    cancel: Arc<AtomicBool>,
    frames_done: Arc<AtomicUsize>,
    handle: Option<thread::JoinHandle<JobResult>>,
}

impl ExportJob {
    /// Start exporting `settings` to `path` on a worker thread.
    ///
    /// `settings` is moved into the worker, so later UI edits do not reach
    /// the export in flight.
    pub fn start(path: PathBuf, settings: RenderSettings, fonts: Arc<FontBook>) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let frames_done = Arc::new(AtomicUsize::new(0));

        let worker_path = path.clone();
        let worker_cancel = Arc::clone(&cancel);
        let worker_frames = Arc::clone(&frames_done);

        let handle = thread::spawn(move || {
            let result = export_video(&worker_path, &settings, &fonts, &worker_cancel, |n| {
                worker_frames.store(n, Ordering::Relaxed);
            });
            if let Err(e) = &result {
                if !matches!(e, ExportError::Cancelled) {
                    log::error!("Export failed: {}", e);
                }
            }
            result
        });

        Self {
            path,
            cancel,
            frames_done,
            handle: Some(handle),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_done(&self) -> usize {
        self.frames_done.load(Ordering::Relaxed)
    }

    /// Fraction of frames written, 0.0 - 1.0
    pub fn progress(&self) -> f32 {
        self.frames_done() as f32 / EXPORT_FRAMES as f32
    }

    /// Ask the worker to stop before its next frame
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelling(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// The outcome, once the worker has finished. Returns `None` while it
    /// is still running and after the outcome was collected.
    pub fn poll(&mut self) -> Option<JobResult> {
        if !self.handle.as_ref()?.is_finished() {
            return None;
        }
        self.handle.take().map(join)
    }

    /// Block until the worker is done.
    #[cfg(test)]
    pub fn wait(mut self) -> JobResult {
        match self.handle.take() {
            Some(handle) => join(handle),
            None => Err(ExportError::WorkerPanicked),
        }
    }
}

impl Drop for ExportJob {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel();
            let _ = handle.join();
        }
    }
}

fn join(handle: thread::JoinHandle<JobResult>) -> JobResult {
    handle.join().unwrap_or(Err(ExportError::WorkerPanicked))
}
