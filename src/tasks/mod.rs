//! Background task tracking for long-running catalog scans.
//!
//! A scan runs on its own thread and reports through a channel; the
//! types here carry the bookkeeping the foreground side needs to poll
//! progress, request cancellation, and notice completion.

pub mod manager;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::scanner::ScanEvent;

pub use manager::ScanTaskManager;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier handed out when a task is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::SeqCst))
    }
}

/// State of a background task. A task stays `Running` until its
/// terminal event has been observed through polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
}

/// A scan running in the background, with its cancellation flag and the
/// receiving end of its event channel.
pub struct ScanTask {
    pub id: TaskId,
    pub state: TaskState,
    pub cancel_flag: Arc<AtomicBool>,
    pub receiver: mpsc::Receiver<ScanEvent>,
    pub started_at: Instant,
}

impl ScanTask {
    pub fn new(cancel_flag: Arc<AtomicBool>, receiver: mpsc::Receiver<ScanEvent>) -> Self {
        Self {
            id: TaskId::next(),
            state: TaskState::Running,
            cancel_flag,
            receiver,
            started_at: Instant::now(),
        }
    }

    /// Request cancellation. The worker checks the flag between files,
    /// so the task keeps running until the current file is done.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_running(&self) -> bool {
        self.state == TaskState::Running
    }
}
