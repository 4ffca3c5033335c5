//! Progress and session engine shared by packing and unpacking.
//!
//! One [`Session`] drives exactly one operation: totals are set once the
//! entries are enumerated, counters advance per entry (and per chunk for
//! large files), and the session is finalized exactly once. Emission is a
//! synchronous callback invocation: the operation blocks until the consumer
//! returns, so updates are strictly ordered and backpressured.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ArchiverError;

/// Lifecycle of one progress session. There is no transition out of a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressStatus {
    Running,
    Completed,
    Cancelled,
}

/// Why a session was cancelled. Readable on every emission, not only the
/// final one; stays `None` unless cancellation actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CancelReason {
    None,
    UserCancelled,
}

/// One session's liveness snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub start_time: DateTime<Utc>,
    pub latest_sent_time: DateTime<Utc>,
    /// The file currently being transferred: source path while packing,
    /// destination path while unpacking.
    pub current_filepath: String,
    pub total_files: u64,
    pub total_size: u64,
    pub sent_files_count: u64,
    pub sent_files_count_percentage: f64,
    pub sent_size: u64,
    pub sent_size_progress_percentage: f64,
    pub current_file_size: u64,
    pub current_file_sent_size: u64,
    pub current_file_progress_size_percentage: f64,
    /// Derived transfer speed in MB/s.
    pub speed_mbps: f64,
    pub status: ProgressStatus,
    pub cancel_reason: CancelReason,
}

impl Progress {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            latest_sent_time: now,
            current_filepath: String::new(),
            total_files: 0,
            total_size: 0,
            sent_files_count: 0,
            sent_files_count_percentage: 0.0,
            sent_size: 0,
            sent_size_progress_percentage: 0.0,
            current_file_size: 0,
            current_file_sent_size: 0,
            current_file_progress_size_percentage: 0.0,
            speed_mbps: 0.0,
            status: ProgressStatus::Running,
            cancel_reason: CancelReason::None,
        }
    }
}

/// Percentage of `partial` against `total`, clamped to `[0, 100]`.
/// A zero total reports 0 while running; completion forces 100 explicitly.
pub fn percent(partial: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((partial as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}

/// Cloneable cancellation signal shared between the session and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Synchronous progress consumer.
pub type ProgressFn = Box<dyn Fn(&Progress) + Send>;

/// The mutable execution context of one pack/unpack call.
pub struct Session {
    progress: Progress,
    cancel: CancelToken,
    cancel_enabled: bool,
    debounce: Duration,
    started: Instant,
    last_emit: Option<Instant>,
    on_received: Option<ProgressFn>,
    on_ended: Option<ProgressFn>,
    ended: bool,
}

impl Session {
    pub fn new(debounce: Duration) -> Self {
        Self {
            progress: Progress::new(),
            cancel: CancelToken::new(),
            cancel_enabled: false,
            debounce,
            started: Instant::now(),
            last_emit: None,
            on_received: None,
            on_ended: None,
            ended: false,
        }
    }

    /// Register the callback pair. `on_received` fires on every emission,
    /// `on_ended` once with the final snapshot.
    pub fn with_callbacks(debounce: Duration, on_received: ProgressFn, on_ended: ProgressFn) -> Self {
        let mut session = Self::new(debounce);
        session.on_received = Some(on_received);
        session.on_ended = Some(on_ended);
        session
    }

    /// A handle the owner can use to request cancellation from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Apply the per-operation debounce interval. Engines call this with the
    /// operation's configured value before the first emission.
    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Arm cancellation. Until this is called, a pending cancel request is
    /// not honored; engines arm it once they start touching the filesystem.
    pub fn enable_ctx_cancel(&mut self) {
        self.cancel_enabled = true;
    }

    /// Cooperative cancellation checkpoint, hit at least once per entry.
    pub fn check_cancel(&self) -> Result<(), ArchiverError> {
        if self.cancel_enabled && self.cancel.is_cancelled() {
            return Err(ArchiverError::CancelledFileOperation);
        }
        Ok(())
    }

    /// Set the totals once enumeration is done and emit the first snapshot.
    pub fn initialize_progress(&mut self, total_files: u64, total_size: u64) {
        self.progress.total_files = total_files;
        self.progress.total_size = total_size;
        self.recompute();
        self.emit(true);
    }

    /// Begin transferring one file. Resets the per-file counters; the
    /// session-wide counters are untouched.
    pub fn begin_file(&mut self, path: &str, size: u64) {
        self.progress.current_filepath = path.to_string();
        self.progress.current_file_size = size;
        self.progress.current_file_sent_size = 0;
        self.recompute();
        self.emit(false);
    }

    /// Account `delta` transferred bytes for the current file.
    pub fn advance_bytes(&mut self, delta: u64) {
        self.progress.sent_size = self.progress.sent_size.saturating_add(delta);
        self.progress.current_file_sent_size =
            self.progress.current_file_sent_size.saturating_add(delta);
        self.recompute();
        self.emit(false);
    }

    /// Mark the current file as fully transferred. Directories never call
    /// this; they do not count toward the file total.
    pub fn end_file(&mut self) {
        self.progress.sent_files_count += 1;
        self.progress.current_file_sent_size = self.progress.current_file_size;
        self.recompute();
        self.emit(false);
    }

    /// Finalize the session. The sole finalization path; calling it twice is
    /// a caller bug. `Completed` forces every counter to its total and every
    /// percentage to exactly 100; `Cancelled` freezes whatever was
    /// transferred and records the reason.
    pub fn end_progress(&mut self, status: ProgressStatus) {
        debug_assert!(!self.ended, "end_progress called twice");
        match status {
            ProgressStatus::Completed => {
                // Counters never decrease: a decompression that outgrew its
                // compressed-size total keeps the larger figure.
                self.progress.sent_files_count =
                    self.progress.sent_files_count.max(self.progress.total_files);
                self.progress.sent_size = self.progress.sent_size.max(self.progress.total_size);
                self.progress.current_file_sent_size = self
                    .progress
                    .current_file_sent_size
                    .max(self.progress.current_file_size);
                self.recompute();
                self.progress.sent_files_count_percentage = 100.0;
                self.progress.sent_size_progress_percentage = 100.0;
                self.progress.current_file_progress_size_percentage = 100.0;
            }
            ProgressStatus::Cancelled => {
                self.progress.cancel_reason = CancelReason::UserCancelled;
                self.recompute();
            }
            ProgressStatus::Running => {
                self.recompute();
            }
        }
        self.progress.status = status;
        self.ended = true;
        self.emit(true);
        if let Some(on_ended) = &self.on_ended {
            on_ended(&self.progress);
        }
    }

    fn recompute(&mut self) {
        let p = &mut self.progress;
        p.sent_files_count_percentage = percent(p.sent_files_count, p.total_files);
        p.sent_size_progress_percentage = percent(p.sent_size, p.total_size);
        p.current_file_progress_size_percentage =
            percent(p.current_file_sent_size, p.current_file_size);
        let elapsed = self.started.elapsed().as_secs_f64();
        p.speed_mbps = if elapsed > 0.0 {
            (p.sent_size as f64 / (1024.0 * 1024.0)) / elapsed
        } else {
            0.0
        };
    }

    /// Emit the current snapshot, debounced unless forced. Wall-clock
    /// observations never run backwards even if the clock does.
    fn emit(&mut self, force: bool) {
        let now = Instant::now();
        if !force {
            if let Some(last) = self.last_emit {
                if now.duration_since(last) < self.debounce {
                    return;
                }
            }
        }
        self.last_emit = Some(now);
        let wall = Utc::now();
        if wall > self.progress.latest_sent_time {
            self.progress.latest_sent_time = wall;
        }
        if let Some(on_received) = &self.on_received {
            on_received(&self.progress);
        }
    }
}

/// A reader decorator that observes the cancellation signal before every
/// underlying read and reports cumulative bytes as they flow, so even a
/// single huge file cannot outrun a cancel request.
pub struct CancelableReader<R> {
    inner: R,
    cancel: CancelToken,
    bytes_read: u64,
}

impl<R: Read> CancelableReader<R> {
    pub fn new(inner: R, cancel: CancelToken) -> Self {
        Self {
            inner,
            cancel,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Read for CancelableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            // Not `Interrupted`: io::copy retries that kind, which would spin
            // forever on a cancelled stream.
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "file operation was cancelled",
            ));
        }
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Copy `reader` into `writer` through the session: a cancellation check per
/// chunk and byte-accurate progress as the copy proceeds. Partially written
/// bytes of a cancelled file are left to the caller's cleanup policy.
pub(crate) fn copy_with_session<R: Read + ?Sized, W: io::Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    session: &mut Session,
) -> Result<u64, ArchiverError> {
    let mut buf = [0u8; 64 * 1024];
    let mut written = 0u64;
    loop {
        session.check_cancel()?;
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        written += n as u64;
        session.advance_bytes(n as u64);
    }
    Ok(written)
}
