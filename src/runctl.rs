// Copyright 2024 Sean Gillespie.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Cooperative run control: pause, resume and stop the solver from outside
//! the process.
//!
//! The solver and its UI are separate processes by design, so control flows
//! through a small JSON state file rather than an in-process channel. The
//! file's schema is the contract; an external controller is the only writer,
//! the driver the only reader. Polling is cheap: the JSON is re-parsed only
//! when the file's modification time changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Environment variable overriding the run-control file path.
pub const RUNCTL_ENV: &str = "TETRA_RUNCTL";
const RUNCTL_FILE: &str = "runctl.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Run,
    Pause,
    Stop,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunControlFile {
    state: RunState,
    ts: f64,
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Poller for the run-control file.
pub struct RunControl {
    path: PathBuf,
    cached_mtime: Option<SystemTime>,
    state: RunState,
}

impl RunControl {
    /// Resolves the control file path (environment override, else inside the
    /// logs directory) and creates it with state `run` if absent.
    pub fn open(logs_dir: &Path) -> RunControl {
        let path = match std::env::var_os(RUNCTL_ENV) {
            Some(path) => PathBuf::from(path),
            None => logs_dir.join(RUNCTL_FILE),
        };
        Self::at_path(path)
    }

    /// Opens run control at an explicit path; used by tests and embedders.
    pub fn at_path(path: PathBuf) -> RunControl {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let initial = RunControlFile {
                state: RunState::Run,
                ts: unix_now(),
            };
            let _ = fs::write(
                &path,
                serde_json::to_vec(&initial).expect("run control serializes"),
            );
        }

        RunControl {
            path,
            cached_mtime: None,
            state: RunState::Run,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state. Re-parses the file only when its mtime changed;
    /// unreadable or malformed content keeps the previous state.
    pub fn poll(&mut self) -> RunState {
        let mtime = fs::metadata(&self.path).and_then(|m| m.modified()).ok();
        if mtime.is_some() && mtime == self.cached_mtime {
            return self.state;
        }
        self.cached_mtime = mtime;

        if let Ok(text) = fs::read_to_string(&self.path) {
            if let Ok(parsed) = serde_json::from_str::<RunControlFile>(&text) {
                self.state = parsed.state;
            }
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;

    fn write_state(path: &Path, state: &str) {
        fs::write(path, format!(r#"{{"state":"{}","ts":1.0}}"#, state)).unwrap();
    }

    #[test]
    fn creates_file_with_run_state() {
        let dir = scratch_dir("runctl-create");
        let mut ctl = RunControl::at_path(dir.join("runctl.json"));
        assert!(ctl.path().exists());
        assert_eq!(ctl.poll(), RunState::Run);

        let text = fs::read_to_string(ctl.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["state"], "run");
        assert!(value["ts"].as_f64().is_some());
    }

    #[test]
    fn observes_state_changes() {
        let dir = scratch_dir("runctl-change");
        let path = dir.join("runctl.json");
        let mut ctl = RunControl::at_path(path.clone());
        assert_eq!(ctl.poll(), RunState::Run);

        write_state(&path, "pause");
        ctl.cached_mtime = None; // defeat mtime granularity in this test
        assert_eq!(ctl.poll(), RunState::Pause);

        write_state(&path, "stop");
        ctl.cached_mtime = None;
        assert_eq!(ctl.poll(), RunState::Stop);
    }

    #[test]
    fn malformed_content_keeps_last_state() {
        let dir = scratch_dir("runctl-bad");
        let path = dir.join("runctl.json");
        let mut ctl = RunControl::at_path(path.clone());

        write_state(&path, "pause");
        ctl.cached_mtime = None;
        assert_eq!(ctl.poll(), RunState::Pause);

        fs::write(&path, "{broken").unwrap();
        ctl.cached_mtime = None;
        assert_eq!(ctl.poll(), RunState::Pause);
    }

    #[test]
    fn missing_file_keeps_last_state() {
        let dir = scratch_dir("runctl-missing");
        let path = dir.join("runctl.json");
        let mut ctl = RunControl::at_path(path.clone());
        assert_eq!(ctl.poll(), RunState::Run);
        fs::remove_file(&path).unwrap();
        assert_eq!(ctl.poll(), RunState::Run);
    }
}
