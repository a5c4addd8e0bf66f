// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable storage
//!
//! One JSON entry per line, each carrying a sequence number, timestamp and
//! CRC32 of its operation. Replay stops at the first truncated or corrupt
//! line; a line whose operation no longer decodes is skipped so one bad row
//! never hides the rest.

use rota_core::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct WalEntry {
    seq: u64,
    timestamp_ms: u64,
    op: Value,
    checksum: u32,
}

impl WalEntry {
    fn new(seq: u64, op: &Operation) -> Result<Self, WalError> {
        let op = serde_json::to_value(op)?;
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(Self {
            seq,
            timestamp_ms,
            checksum: checksum(&op),
            op,
        })
    }

    fn verify(&self) -> bool {
        self.checksum == checksum(&self.op)
    }
}

fn checksum(op: &Value) -> u32 {
    crc32fast::hash(op.to_string().as_bytes())
}

/// Result of scanning a log file
struct Scan {
    entries: Vec<WalEntry>,
    /// Byte length of the valid prefix
    valid_len: u64,
    corrupt: bool,
}

fn scan(path: &Path) -> Result<Scan, WalError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Scan {
                entries: Vec::new(),
                valid_len: 0,
                corrupt: false,
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut entries = Vec::new();
    let mut valid_len = 0u64;
    let mut line = String::new();

    loop {
        line.clear();
        let read = match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => {
                return Ok(Scan {
                    entries,
                    valid_len,
                    corrupt: true,
                })
            }
        };

        let trimmed = line.trim_end_matches('\n');
        if trimmed.is_empty() {
            valid_len += read as u64;
            continue;
        }
        // A line without its newline is a torn write
        let complete = line.ends_with('\n');
        match serde_json::from_str::<WalEntry>(trimmed) {
            Ok(entry) if complete && entry.verify() => {
                valid_len += read as u64;
                entries.push(entry);
            }
            _ => {
                return Ok(Scan {
                    entries,
                    valid_len,
                    corrupt: true,
                })
            }
        }
    }

    Ok(Scan {
        entries,
        valid_len,
        corrupt: false,
    })
}

/// Write-ahead log for durable operation storage
pub struct Wal {
    path: PathBuf,
    file: File,
    sequence: u64,
}

impl Wal {
    /// Open or create a WAL at the given path
    ///
    /// A corrupt tail left by a crash is truncated so new entries stay readable.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let scan = scan(path)?;
        let sequence = scan.entries.last().map(|e| e.seq).unwrap_or(0);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        if scan.corrupt {
            tracing::warn!(
                path = %path.display(),
                valid_len = scan.valid_len,
                "truncating corrupt WAL tail"
            );
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sequence,
        })
    }

    /// Append an operation to the log, fsync'd before returning
    pub fn append(&mut self, op: &Operation) -> Result<u64, WalError> {
        let entry = WalEntry::new(self.sequence + 1, op)?;
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_all()?;
        self.sequence = entry.seq;
        Ok(self.sequence)
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the log with `ops`, renumbered from 1
    ///
    /// Written to a sibling file and renamed over the log so a crash leaves
    /// either the old log or the new one.
    pub fn rewrite(path: &Path, ops: &[Operation]) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("compact");
        {
            let mut file = File::create(&tmp)?;
            for (i, op) in ops.iter().enumerate() {
                let entry = WalEntry::new(i as u64 + 1, op)?;
                writeln!(file, "{}", serde_json::to_string(&entry)?)?;
            }
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Self::open(path)
    }

    /// Replay all decodable operations from the log
    pub fn replay(path: &Path) -> Result<Vec<Operation>, WalError> {
        let scan = scan(path)?;
        if scan.corrupt {
            tracing::warn!(
                path = %path.display(),
                entries = scan.entries.len(),
                "WAL replay stopped at corrupt entry"
            );
        }

        let mut ops = Vec::with_capacity(scan.entries.len());
        for entry in scan.entries {
            match serde_json::from_value::<Operation>(entry.op) {
                Ok(op) => ops.push(op),
                Err(e) => tracing::warn!(seq = entry.seq, error = %e, "skipping undecodable WAL entry"),
            }
        }
        Ok(ops)
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
