//! The machine-readable progress channel: an append-only JSONL stream plus a
//! summary file holding the latest event.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::snapshot::atomic_write;

/// One progress event, serialized as a single JSON object per line with an
/// `event` discriminator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress {
        run: u32,
        seed: u64,
        placed: u32,
        best_depth: u32,
        total: u32,
        attempts: u64,
        attempts_per_sec: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    Paused {
        run: u32,
        seed: u64,
        ts: f64,
    },
    Resumed {
        run: u32,
        seed: u64,
        ts: f64,
    },
    Stopped {
        run: u32,
        seed: u64,
        ts: f64,
    },
}

/// Appends events to `progress.jsonl` and mirrors the latest one into
/// `progress.json`. Both writes are best-effort; the caller logs failures
/// and keeps searching.
pub struct ProgressWriter {
    stream_path: PathBuf,
    summary_path: PathBuf,
    stream: Option<File>,
}

impl ProgressWriter {
    pub fn new(logs_dir: &Path) -> io::Result<ProgressWriter> {
        fs::create_dir_all(logs_dir)?;
        Ok(ProgressWriter {
            stream_path: logs_dir.join("progress.jsonl"),
            summary_path: logs_dir.join("progress.json"),
            stream: None,
        })
    }

    pub fn stream_path(&self) -> &Path {
        &self.stream_path
    }

    pub fn emit(&mut self, event: &ProgressEvent) -> io::Result<()> {
        let line = serde_json::to_string(event).expect("progress event serializes");

        if self.stream.is_none() {
            self.stream = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.stream_path)?,
            );
        }
        let stream = self.stream.as_mut().expect("stream opened above");
        writeln!(stream, "{}", line)?;
        stream.flush()?;

        atomic_write(&self.summary_path, line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;

    #[test]
    fn progress_event_shape() {
        let event = ProgressEvent::Progress {
            run: 3,
            seed: 1337,
            placed: 7,
            best_depth: 9,
            total: 25,
            attempts: 12345,
            attempts_per_sec: 678,
            status: None,
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(value["event"], "progress");
        assert_eq!(value["run"], 3);
        assert_eq!(value["placed"], 7);
        assert_eq!(value["best_depth"], 9);
        assert_eq!(value["attempts_per_sec"], 678);
        assert!(value.get("status").is_none());
    }

    #[test]
    fn status_appears_when_set() {
        let event = ProgressEvent::Progress {
            run: 1,
            seed: 1,
            placed: 25,
            best_depth: 25,
            total: 25,
            attempts: 10,
            attempts_per_sec: 1,
            status: Some("solved".to_owned()),
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(value["status"], "solved");
    }

    #[test]
    fn control_event_shape() {
        let event = ProgressEvent::Stopped {
            run: 2,
            seed: 9,
            ts: 12.0,
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(value["event"], "stopped");
        assert_eq!(value["ts"], 12.0);
    }

    #[test]
    fn writer_appends_and_summarizes() {
        let dir = scratch_dir("progress-writer");
        let mut writer = ProgressWriter::new(&dir).unwrap();

        for n in 0..3 {
            writer
                .emit(&ProgressEvent::Progress {
                    run: n,
                    seed: 0,
                    placed: n,
                    best_depth: n,
                    total: 2,
                    attempts: n as u64,
                    attempts_per_sec: 0,
                    status: None,
                })
                .unwrap();
        }

        let stream = fs::read_to_string(dir.join("progress.jsonl")).unwrap();
        assert_eq!(stream.lines().count(), 3);

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("progress.json")).unwrap()).unwrap();
        assert_eq!(summary["run"], 2);
    }
}
