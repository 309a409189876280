//! Append-only JSON-lines audit trail.
//!
//! One JSON object per snapshot per line, mirroring the snapshot shape. The
//! relational store is authoritative; this file is a best-effort secondary
//! record, so callers log write failures and move on.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::telemetry::DeviceSnapshot;

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, snapshots: &[DeviceSnapshot]) -> io::Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        for snapshot in snapshots {
            let line = serde_json::to_string(snapshot).map_err(io::Error::from)?;
            writeln!(file, "{line}")?;
        }

        Ok(())
    }
}
