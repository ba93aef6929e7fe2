//! Notification delivery boundary.
//!
//! Rendering a desktop notification belongs to the extension; the daemon
//! only appends notification requests to an outbox JSONL file the extension
//! consumes. Failures are logged and swallowed: alerting must never break
//! the tracking loop.

use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Appends one JSON object per notification to the outbox file.
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Notifier for OutboxNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::json!({
            "ts": chrono::Utc::now().timestamp_millis(),
            "title": title,
            "message": message,
        });
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.jsonl");
        let outbox = OutboxNotifier::new(path.clone());

        outbox.notify("Focus Alert", "Time to refocus!").unwrap();
        outbox.notify("Focus Alert", "Still distracted").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["title"], "Focus Alert");
        assert_eq!(first["message"], "Time to refocus!");
    }
}
