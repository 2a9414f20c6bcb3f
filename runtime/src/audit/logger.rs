//! Append-only JSONL log of discovery attempts.
//!
//! One line per recorded [`StrategyAttempt`], tagged with the request it
//! belongs to, plus one summary line per request. The file rotates to
//! `.1`, `.2`, ... once it passes [`MAX_LOG_SIZE`].

use crate::resolver::StrategyAttempt;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Rotate once the log passes 10 MB.
pub const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

const MAX_ROTATIONS: u32 = 3;

/// A single audit line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditRecord {
    Attempt {
        request_id: String,
        page_url: String,
        strategy: String,
        succeeded: bool,
        origin_url: Option<String>,
        chars: Option<usize>,
        error: Option<String>,
        started_at: String,
        duration_ms: u64,
    },
    Outcome {
        request_id: String,
        page_url: String,
        timestamp: String,
        strategy_used: Option<String>,
        origin_url: Option<String>,
        error: Option<String>,
    },
}

/// Append-only JSONL audit logger with size-based rotation.
pub struct AuditLogger {
    file: File,
    path: PathBuf,
    max_size: u64,
    current_size: u64,
}

impl AuditLogger {
    /// Open or create the audit log file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open audit log: {}", path.display()))?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            max_size: MAX_LOG_SIZE,
            current_size,
        })
    }

    /// The default log at `~/.policyscope/audit.jsonl`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".policyscope")
            .join("audit.jsonl")
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, record: &AuditRecord) -> Result<()> {
        if self.current_size >= self.max_size {
            self.rotate()?;
        }
        let json = serde_json::to_string(record)?;
        writeln!(self.file, "{json}")?;
        self.current_size += json.len() as u64 + 1;
        Ok(())
    }

    /// Log every attempt of one request, in order.
    pub fn log_attempts(
        &mut self,
        request_id: &str,
        page_url: &str,
        attempts: &[StrategyAttempt],
    ) -> Result<()> {
        for attempt in attempts {
            self.write(&AuditRecord::Attempt {
                request_id: request_id.to_string(),
                page_url: page_url.to_string(),
                strategy: attempt.strategy_name.clone(),
                succeeded: attempt.succeeded,
                origin_url: attempt.result_document.as_ref().map(|d| d.origin_url.clone()),
                chars: attempt.result_document.as_ref().map(|d| d.length_chars),
                error: attempt.error.clone(),
                started_at: attempt.started_at.to_rfc3339(),
                duration_ms: attempt.duration_ms,
            })?;
        }
        Ok(())
    }

    /// Log the final outcome of one request.
    pub fn log_outcome(
        &mut self,
        request_id: &str,
        page_url: &str,
        outcome: std::result::Result<(&str, &str), &str>,
    ) -> Result<()> {
        let (strategy_used, origin_url, error) = match outcome {
            Ok((strategy, origin)) => (Some(strategy.to_string()), Some(origin.to_string()), None),
            Err(e) => (None, None, Some(e.to_string())),
        };
        self.write(&AuditRecord::Outcome {
            request_id: request_id.to_string(),
            page_url: page_url.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            strategy_used,
            origin_url,
            error,
        })
    }

    /// Shift `audit.jsonl` to `.1`, `.1` to `.2`, and so on, dropping the oldest.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }
        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                let _ = std::fs::rename(&from, rotation_path(&self.path, i + 1));
            }
        }
        let _ = std::fs::rename(&self.path, rotation_path(&self.path, 1));

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("failed to reopen audit log after rotation")?;
        self.current_size = 0;
        Ok(())
    }
}

fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audit.jsonl")
    );
    base.with_file_name(name)
}
