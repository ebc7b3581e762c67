//! Single-slot manager for the background scan task.

use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ScanTask, TaskId, TaskState};
use crate::scanner::ScanEvent;

/// Tracks the one scan allowed to run at a time. Registering a new task
/// is only valid once the previous one has been polled to completion.
pub struct ScanTaskManager {
    current: Option<ScanTask>,
}

impl ScanTaskManager {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Register a new scan task.
    /// Returns the TaskId, a sender for the worker, and the shared
    /// cancellation flag.
    pub fn register_task(&mut self) -> (TaskId, mpsc::Sender<ScanEvent>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let task = ScanTask::new(cancel_flag.clone(), rx);
        let id = task.id;

        self.current = Some(task);

        (id, tx, cancel_flag)
    }

    /// Check if a scan is still running.
    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|t| t.is_running())
    }

    /// Cancel the current scan. Returns true if there was one to cancel.
    pub fn cancel_current(&mut self) -> bool {
        match self.current {
            Some(ref task) if task.is_running() => {
                task.cancel();
                true
            }
            _ => false,
        }
    }

    /// Drain every pending event from the current task, updating its
    /// state along the way. A finished task is dropped from tracking
    /// once its terminal event has been seen.
    pub fn poll_updates(&mut self) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        let mut finished = false;

        if let Some(ref mut task) = self.current {
            loop {
                match task.receiver.try_recv() {
                    Ok(event) => {
                        if let ScanEvent::Completed { ingested } = event {
                            task.state = TaskState::Completed;
                            finished = true;
                            info!(
                                task = task.id.0,
                                ingested,
                                elapsed_ms = task.elapsed().as_millis() as u64,
                                "scan task finished"
                            );
                        }
                        events.push(event);
                    }
                    Err(mpsc::TryRecvError::Disconnected) => {
                        // A dropped sender without a terminal event means
                        // the worker died; stop tracking it.
                        if !finished {
                            warn!(task = task.id.0, "scan task ended without completing");
                        }
                        finished = true;
                        break;
                    }
                    Err(mpsc::TryRecvError::Empty) => break,
                }
            }
        }

        if finished {
            self.current = None;
        }

        events
    }
}

impl Default for ScanTaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_task_runs_until_completion_is_polled() {
        let mut manager = ScanTaskManager::new();
        assert!(!manager.is_running());

        let (_id, tx, _cancel) = manager.register_task();
        assert!(manager.is_running());

        tx.send(ScanEvent::Progress {
            current: 1,
            total: 3,
        })
        .unwrap();
        let events = manager.poll_updates();
        assert_eq!(events.len(), 1);
        assert!(manager.is_running());

        tx.send(ScanEvent::Completed { ingested: 3 }).unwrap();
        let events = manager.poll_updates();
        assert!(matches!(
            events.as_slice(),
            [ScanEvent::Completed { ingested: 3 }]
        ));
        assert!(!manager.is_running());
    }

    #[test]
    fn test_cancel_current_sets_shared_flag() {
        let mut manager = ScanTaskManager::new();
        assert!(!manager.cancel_current());

        let (_id, _tx, cancel) = manager.register_task();
        assert!(manager.cancel_current());
        assert!(cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dead_worker_is_pruned() {
        let mut manager = ScanTaskManager::new();
        let (_id, tx, _cancel) = manager.register_task();

        tx.send(ScanEvent::Progress {
            current: 1,
            total: 2,
        })
        .unwrap();
        drop(tx);

        let events = manager.poll_updates();
        assert_eq!(events.len(), 1, "buffered events still drain");
        assert!(!manager.is_running());
    }

    #[test]
    fn test_poll_with_no_task_is_empty() {
        let mut manager = ScanTaskManager::new();
        assert!(manager.poll_updates().is_empty());
    }
}
