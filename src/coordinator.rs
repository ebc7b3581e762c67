//! Foreground handle for background catalog scans.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::db::Store;
use crate::scanner::{ScanEvent, Scanner};
use crate::tasks::{ScanTaskManager, TaskId};

/// What a scan run should cover.
#[derive(Debug, Clone)]
pub enum ScanTarget {
    /// Every active directory in the catalog.
    ActiveDirectories,
    /// One directory, registered on the fly when unknown.
    Path(PathBuf),
}

/// Owns the scan lifecycle: at most one scan runs at a time, the worker
/// thread writes through its own store handle, and the caller polls
/// events off the channel.
pub struct ScanCoordinator {
    config: Config,
    tasks: ScanTaskManager,
}

impl ScanCoordinator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tasks: ScanTaskManager::new(),
        }
    }

    /// Spawn a background scan over the given target. Rejected while a
    /// previous scan is still running.
    pub fn start_scan(&mut self, target: ScanTarget) -> Result<TaskId> {
        if self.tasks.is_running() {
            bail!("a scan is already running");
        }

        let (id, tx, cancel_flag) = self.tasks.register_task();
        let config = self.config.clone();

        std::thread::spawn(move || {
            scan_worker(config, target, tx, cancel_flag);
        });

        info!(task = id.0, "scan task started");
        Ok(id)
    }

    pub fn is_scanning(&self) -> bool {
        self.tasks.is_running()
    }

    /// Ask the running scan to stop after its current file.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.tasks.cancel_current();
        if cancelled {
            info!("scan cancellation requested");
        }
        cancelled
    }

    /// Drain pending scan events without blocking.
    pub fn poll_events(&mut self) -> Vec<ScanEvent> {
        self.tasks.poll_updates()
    }
}

fn scan_worker(
    config: Config,
    target: ScanTarget,
    tx: mpsc::Sender<ScanEvent>,
    cancel_flag: Arc<AtomicBool>,
) {
    let mut store = match Store::open(&config.db_path) {
        Ok(store) => store,
        Err(e) => return abort_scan(&tx, &config.db_path.display().to_string(), e),
    };
    if let Err(e) = store.initialize() {
        return abort_scan(&tx, &config.db_path.display().to_string(), e);
    }

    let directories = match target {
        ScanTarget::ActiveDirectories => store.list_directories(false),
        ScanTarget::Path(ref path) => store.find_or_create_directory(path).map(|d| vec![d]),
    };
    let directories = match directories {
        Ok(d) => d,
        Err(e) => {
            let context = match target {
                ScanTarget::Path(ref path) => path.display().to_string(),
                ScanTarget::ActiveDirectories => config.db_path.display().to_string(),
            };
            return abort_scan(&tx, &context, e);
        }
    };

    let scanner = Scanner::new(&config);
    if let Err(e) = scanner.scan_directories(&mut store, &directories, Some(tx.clone()), &cancel_flag)
    {
        error!(error = %e, "scan aborted");
        let _ = tx.send(ScanEvent::Error {
            path: config.db_path.display().to_string(),
            message: e.to_string(),
        });
        let _ = tx.send(ScanEvent::Completed { ingested: 0 });
    }
}

/// The scan never got going; report why and still close out with the
/// terminal event pollers wait for.
fn abort_scan(tx: &mpsc::Sender<ScanEvent>, context: &str, err: anyhow::Error) {
    error!(error = %err, "scan could not start");
    let _ = tx.send(ScanEvent::Error {
        path: context.to_string(),
        message: err.to_string(),
    });
    let _ = tx.send(ScanEvent::Completed { ingested: 0 });
}
