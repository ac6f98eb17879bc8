//! Background index jobs.
//!
//! [`IndexJobs::start`] returns as soon as the job is registered. The run
//! itself happens on a spawned task that publishes its state through a
//! `watch` channel, so callers can poll, await completion, or cancel.
//!
//! ```text
//! pending ─► running{processed, total, indexed} ─► succeeded | failed | cancelled
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::indexer::{IndexReport, Indexer};
use crate::progress::{IndexProgress, IndexProgressEvent};

/// Observable state of an index job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum JobStatus {
    Pending,
    Running {
        processed: u64,
        total: u64,
        indexed: u64,
    },
    Succeeded {
        count: u64,
        report: IndexReport,
    },
    Failed {
        error: String,
    },
    Cancelled {
        count: u64,
        report: IndexReport,
    },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded { .. } | JobStatus::Failed { .. } | JobStatus::Cancelled { .. }
        )
    }
}

/// Caller-side handle to a started job.
pub struct JobHandle {
    pub id: String,
    pub status: watch::Receiver<JobStatus>,
    pub cancel: CancellationToken,
}

impl JobHandle {
    /// Wait until the job reaches a terminal state.
    pub async fn wait(&mut self) -> JobStatus {
        if let Ok(status) = self.status.wait_for(JobStatus::is_terminal).await {
            return status.clone();
        }
        self.status.borrow().clone()
    }
}

/// Finished jobs kept for polling before the oldest are evicted.
pub const DEFAULT_RETAINED_FINISHED_JOBS: usize = 64;

struct JobEntry {
    seq: u64,
    status: watch::Receiver<JobStatus>,
    cancel: CancellationToken,
}

/// Publishes indexer progress into the job's status channel.
struct ChannelProgress {
    tx: Arc<watch::Sender<JobStatus>>,
}

impl IndexProgress for ChannelProgress {
    fn report(&self, event: IndexProgressEvent) {
        let running = match event {
            IndexProgressEvent::Discovering { .. } => JobStatus::Running {
                processed: 0,
                total: 0,
                indexed: 0,
            },
            IndexProgressEvent::Processing {
                processed,
                total,
                indexed,
                ..
            } => JobStatus::Running {
                processed,
                total,
                indexed,
            },
        };
        self.tx.send_replace(running);
    }
}

#[derive(Default)]
struct Registry {
    next_seq: u64,
    entries: HashMap<String, JobEntry>,
}

impl Registry {
    /// Drop the oldest finished jobs until at most `keep` remain.
    /// Jobs still pending or running are never evicted.
    fn evict_finished(&mut self, keep: usize) {
        let mut finished: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.status.borrow().is_terminal())
            .map(|(id, entry)| (entry.seq, id.clone()))
            .collect();
        if finished.len() <= keep {
            return;
        }
        finished.sort();
        let excess = finished.len() - keep;
        for (_, id) in finished.into_iter().take(excess) {
            self.entries.remove(&id);
        }
    }
}

/// Registry of index jobs started by this process.
///
/// Finished jobs stay visible to [`status`](Self::status) until more than
/// `retained_finished` of them accumulate; the oldest are evicted when the
/// next job starts.
pub struct IndexJobs {
    indexer: Arc<Indexer>,
    retained_finished: usize,
    jobs: Mutex<Registry>,
}

impl IndexJobs {
    pub fn new(indexer: Arc<Indexer>) -> Self {
        Self::with_retention(indexer, DEFAULT_RETAINED_FINISHED_JOBS)
    }

    pub fn with_retention(indexer: Arc<Indexer>, retained_finished: usize) -> Self {
        Self {
            indexer,
            retained_finished,
            jobs: Mutex::new(Registry::default()),
        }
    }

    /// Number of jobs currently tracked.
    pub fn len(&self) -> usize {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start indexing `root` in the background.
    ///
    /// With `reindex`, every stored document is deleted before the walk.
    pub fn start(&self, root: PathBuf, reindex: bool) -> JobHandle {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = watch::channel(JobStatus::Pending);
        let tx = Arc::new(tx);
        let cancel = CancellationToken::new();

        {
            let mut registry = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            registry.evict_finished(self.retained_finished);
            let seq = registry.next_seq;
            registry.next_seq += 1;
            registry.entries.insert(
                id.clone(),
                JobEntry {
                    seq,
                    status: rx.clone(),
                    cancel: cancel.clone(),
                },
            );
        }

        let indexer = self.indexer.clone();
        let run_tx = tx.clone();
        let run_cancel = cancel.clone();
        let job_id = id.clone();
        info!(job = %job_id, root = %root.display(), reindex, "index job started");

        let run =
            tokio::spawn(async move { run_job(indexer, root, reindex, run_tx, run_cancel).await });

        tokio::spawn(async move {
            let final_status = match run.await {
                Ok(status) => status,
                Err(e) => {
                    error!(job = %job_id, error = %e, "index job aborted");
                    JobStatus::Failed {
                        error: format!("indexing task aborted: {}", e),
                    }
                }
            };
            info!(job = %job_id, status = ?final_status, "index job finished");
            tx.send_replace(final_status);
        });

        JobHandle {
            id,
            status: rx,
            cancel,
        }
    }

    /// Current status of job `id`, if known.
    pub fn status(&self, id: &str) -> Option<JobStatus> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(id)
            .map(|entry| entry.status.borrow().clone())
    }

    /// Request cancellation of job `id`. Returns whether the job exists.
    pub fn cancel(&self, id: &str) -> bool {
        match self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(id)
        {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

async fn run_job(
    indexer: Arc<Indexer>,
    root: PathBuf,
    reindex: bool,
    tx: Arc<watch::Sender<JobStatus>>,
    cancel: CancellationToken,
) -> JobStatus {
    if reindex {
        match indexer.store().delete_all().await {
            Ok(removed) => info!(removed, "cleared documents before reindex"),
            Err(e) => {
                return JobStatus::Failed {
                    error: format!("failed to clear documents: {}", e),
                }
            }
        }
    }

    let progress = ChannelProgress { tx };
    match indexer.index_directory(&root, &progress, &cancel).await {
        Ok(report) if report.cancelled => JobStatus::Cancelled {
            count: report.indexed,
            report,
        },
        Ok(report) => JobStatus::Succeeded {
            count: report.indexed,
            report,
        },
        Err(e) => JobStatus::Failed {
            error: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running {
            processed: 1,
            total: 2,
            indexed: 1
        }
        .is_terminal());
        assert!(JobStatus::Failed {
            error: "x".to_string()
        }
        .is_terminal());
        assert!(JobStatus::Succeeded {
            count: 0,
            report: IndexReport::default()
        }
        .is_terminal());
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let json = serde_json::to_value(JobStatus::Running {
            processed: 3,
            total: 10,
            indexed: 2,
        })
        .unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["total"], 10);
    }

    fn entry(seq: u64, status: JobStatus) -> (JobEntry, watch::Sender<JobStatus>) {
        let (tx, rx) = watch::channel(status);
        let entry = JobEntry {
            seq,
            status: rx,
            cancel: CancellationToken::new(),
        };
        (entry, tx)
    }

    #[test]
    fn eviction_drops_oldest_finished_and_keeps_running() {
        let done = || JobStatus::Failed {
            error: "x".to_string(),
        };
        let mut registry = Registry::default();
        let mut senders = Vec::new();
        for (seq, status) in [
            (0, done()),
            (1, JobStatus::Pending),
            (2, done()),
            (3, done()),
        ] {
            let (e, tx) = entry(seq, status);
            registry.entries.insert(format!("job-{seq}"), e);
            senders.push(tx);
        }

        registry.evict_finished(1);

        let mut left: Vec<&str> = registry.entries.keys().map(String::as_str).collect();
        left.sort();
        assert_eq!(left, vec!["job-1", "job-3"]);
    }
}
