//! Indexing progress reporting.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts. Background jobs implement [`IndexProgress`] themselves to
//! publish live counts to pollers.

use std::io::Write;

/// A single progress event for an indexing run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexProgressEvent {
    /// Walking the tree. Total unknown.
    Discovering { root: String },
    /// `processed` of `total` supported files handled, `indexed` of them stored.
    Processing {
        root: String,
        processed: u64,
        total: u64,
        indexed: u64,
    },
}

/// Receives progress events from the indexer.
pub trait IndexProgress: Send + Sync {
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress on stderr:
/// `index ./docs  processing  1,234 / 5,000 files (1,200 indexed)`.
pub struct StderrProgress;

impl IndexProgress for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = match &event {
            IndexProgressEvent::Discovering { root } => {
                format!("index {}  discovering...\n", root)
            }
            IndexProgressEvent::Processing {
                root,
                processed,
                total,
                indexed,
            } => format!(
                "index {}  processing  {} / {} files ({} indexed)\n",
                root,
                format_number(*processed),
                format_number(*total),
                format_number(*indexed)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgress for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = match &event {
            IndexProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "root": root,
                "phase": "discovering"
            }),
            IndexProgressEvent::Processing {
                root,
                processed,
                total,
                indexed,
            } => serde_json::json!({
                "event": "progress",
                "root": root,
                "phase": "processing",
                "processed": processed,
                "total": total,
                "indexed": indexed
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IndexProgress for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IndexProgress> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
