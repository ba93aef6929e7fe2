//! Browser event bridge.
//!
//! The extension side appends one JSON object per line to the events file;
//! this module tails that file incrementally (truncation-safe) and turns
//! each line into a typed [`TrackerEvent`] for the engine. The file is the
//! entire boundary to the browser's tab/idle APIs.

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use focuslog_core::tracker::{IdleState, TabSnapshot, TrackerEvent};

/// One line of the events file.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BrowserEvent {
    /// Navigation completed in the active tab.
    Navigated { url: String, title: String },
    /// A different tab became active.
    Activated { url: String, title: String },
    /// System idle state changed.
    Idle { state: IdleState },
}

impl BrowserEvent {
    pub fn into_tracker_event(self) -> TrackerEvent {
        match self {
            BrowserEvent::Navigated { url, title } => {
                TrackerEvent::Navigated(TabSnapshot { url, title })
            }
            BrowserEvent::Activated { url, title } => {
                TrackerEvent::Activated(TabSnapshot { url, title })
            }
            BrowserEvent::Idle { state } => TrackerEvent::IdleChanged(state),
        }
    }
}

/// Parse one JSONL line; malformed lines are logged and dropped so a bad
/// write from the extension never stalls tracking.
pub fn parse_line(line: &str) -> Option<TrackerEvent> {
    match serde_json::from_str::<BrowserEvent>(line) {
        Ok(event) => Some(event.into_tracker_event()),
        Err(e) => {
            warn!("Ignoring malformed bridge line: {e}");
            None
        }
    }
}

/// Incremental single-file tailer tracking the consumed byte offset.
pub struct FileTailer {
    path: PathBuf,
    offset: u64,
}

impl FileTailer {
    /// Tail `path`, skipping everything already present: stale events from
    /// a previous run must not be replayed into fresh observations.
    pub fn new(path: &Path) -> Self {
        let offset = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Self {
            path: path.to_path_buf(),
            offset,
        }
    }

    /// Read lines appended since the last call.
    pub fn read_new_lines(&mut self) -> Result<Vec<String>> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            // Not created yet: nothing to read.
            Err(_) => return Ok(Vec::new()),
        };
        let file_size = metadata.len();

        // Detect file truncation (e.g., file was replaced)
        if file_size < self.offset {
            tracing::info!(
                "Bridge file truncated ({}B < {}B offset), resetting: {}",
                file_size,
                self.offset,
                self.path.display()
            );
            self.offset = 0;
        }

        if file_size == self.offset {
            return Ok(Vec::new());
        }

        let mut file = std::fs::File::open(&self.path)
            .with_context(|| format!("Cannot open {}", self.path.display()))?;
        file.seek(SeekFrom::Start(self.offset))
            .with_context(|| format!("Cannot seek in {}", self.path.display()))?;

        let reader = BufReader::new(&file);
        let mut lines = Vec::new();
        let mut bytes_read = 0u64;

        for line_result in reader.lines() {
            match line_result {
                Ok(line) => {
                    // +1 for the newline character
                    bytes_read += line.len() as u64 + 1;
                    if !line.is_empty() {
                        lines.push(line);
                    }
                }
                Err(e) => {
                    warn!("Error reading line from {}: {}", self.path.display(), e);
                    break;
                }
            }
        }

        self.offset += bytes_read;
        Ok(lines)
    }
}

/// Run the bridge: forward every new event line to the engine channel.
///
/// A filesystem watcher wakes the loop on writes; a slow fallback tick
/// covers watcher gaps (e.g. network filesystems).
pub async fn run_bridge(
    events_file: PathBuf,
    tx: mpsc::UnboundedSender<TrackerEvent>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut tailer = FileTailer::new(&events_file);

    let (wake_tx, mut wake_rx) = mpsc::unbounded_channel::<()>();
    let _watcher = match start_watcher(&events_file, wake_tx) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("Bridge watcher unavailable, polling only: {e}");
            None
        }
    };

    let mut fallback = tokio::time::interval(Duration::from_secs(2));

    loop {
        tokio::select! {
            Some(()) = wake_rx.recv() => {
                drain(&mut tailer, &tx);
            }
            _ = fallback.tick() => {
                drain(&mut tailer, &tx);
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("Bridge shutting down");
                    break;
                }
            }
        }
    }
}

fn drain(tailer: &mut FileTailer, tx: &mpsc::UnboundedSender<TrackerEvent>) {
    match tailer.read_new_lines() {
        Ok(lines) => {
            for line in lines {
                if let Some(event) = parse_line(&line) {
                    let _ = tx.send(event);
                }
            }
        }
        Err(e) => error!("Bridge read failed: {e:#}"),
    }
}

/// Watch the events file's directory; returns the handle that must be kept
/// alive.
fn start_watcher(
    events_file: &Path,
    wake: mpsc::UnboundedSender<()>,
) -> Result<RecommendedWatcher> {
    let dir = events_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;

    let file = events_file.to_path_buf();
    let mut watcher = notify::recommended_watcher(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if event.paths.iter().any(|p| p == &file) {
                    let _ = wake.send(());
                }
            }
            Err(e) => error!("Watcher error: {e}"),
        },
    )
    .context("Failed to create bridge watcher")?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
