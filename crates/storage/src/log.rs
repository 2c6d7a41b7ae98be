// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL event log with group commit support.
//!
//! One event per line, in the external wire shape
//! (`{"id":N,"ts":...,"type":...,"instance":...,"data":{...}}`). The file
//! is the schema other tooling reads, so lines are never rewritten; ids are
//! strictly monotonic and gap-free within one store generation, and rows
//! are only ever removed by `reset`, which archives the whole file.
//!
//! Group commit batches appends (~10ms) for performance: events are
//! buffered in memory and flushed to disk with a single fsync.

use chrono::{DateTime, Utc};
use hcom_core::{Event, EventData};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Flush interval for group commit (~10ms batches)
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum entries to buffer before forcing flush
const FLUSH_THRESHOLD: usize = 100;

/// Errors that can occur in event log operations
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only JSONL event log.
///
/// Events are buffered in memory and flushed to disk either when
/// `needs_flush()` reports the interval elapsed / buffer full, or
/// explicitly via `flush()`.
pub struct EventLog {
    file: File,
    path: PathBuf,
    /// Highest id assigned (buffered or durable)
    last_id: i64,
    /// Buffered JSON lines waiting to be flushed (without trailing newline)
    write_buffer: Vec<Vec<u8>>,
    /// Events appended but not yet flushed, readable by queries
    pending: Vec<Event>,
    /// Last flush timestamp for interval checking
    last_flush: Instant,
}

impl EventLog {
    /// Open or create the log at the given path, scanning for the highest
    /// id. A corrupt tail is rotated to `.bak`, preserving the valid
    /// prefix, so one bad write never takes the store down.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (mut last_id, corrupt) = Self::scan(&file)?;

        if corrupt {
            let valid_lines = Self::read_valid_lines(&file)?;
            drop(file);

            let bak_path = crate::snapshot::rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_entries = valid_lines.len(),
                "Corrupt event log detected, rotating to .bak and preserving valid entries",
            );
            std::fs::rename(path, &bak_path)?;

            {
                let mut new_file = File::create(path)?;
                for line in &valid_lines {
                    new_file.write_all(line.as_bytes())?;
                    new_file.write_all(b"\n")?;
                }
                new_file.sync_all()?;
            }

            file = OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(path)?;
            last_id = Self::scan(&file)?.0;
        }

        Ok(Self {
            file,
            path: path.to_owned(),
            last_id,
            write_buffer: Vec::new(),
            pending: Vec::new(),
            last_flush: Instant::now(),
        })
    }

    /// Scan the log for the maximum event id.
    ///
    /// Returns `(max_id, corrupt)` where `corrupt` is true if a parse error
    /// was encountered (not just EOF).
    fn scan(file: &File) -> Result<(i64, bool), LogError> {
        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut max_id = 0i64;
        let mut corrupt = false;
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    corrupt = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let event: Event = match serde_json::from_str(trimmed) {
                Ok(e) => e,
                Err(_) => {
                    corrupt = true;
                    break;
                }
            };
            max_id = max_id.max(event.id);
        }

        Ok((max_id, corrupt))
    }

    /// Read all valid lines, stopping at the first corrupt entry.
    fn read_valid_lines(file: &File) -> Result<Vec<String>, LogError> {
        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut valid_lines = Vec::new();
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if serde_json::from_str::<Event>(trimmed).is_err() {
                break;
            }
            valid_lines.push(trimmed.to_string());
        }

        Ok(valid_lines)
    }

    /// Append an event payload, assigning the next id.
    ///
    /// `ts` defaults to now; callers may pass a retrodated timestamp to
    /// preserve transcript-derived event times (the id is still fresh).
    /// The event is NOT durable until `flush()`.
    pub fn append(
        &mut self,
        instance: &str,
        data: EventData,
        ts: Option<DateTime<Utc>>,
    ) -> Result<Event, LogError> {
        self.last_id += 1;
        let event = Event {
            id: self.last_id,
            ts: ts.unwrap_or_else(Utc::now),
            instance: instance.to_string(),
            data,
        };
        let json_bytes = serde_json::to_vec(&event)?;
        self.write_buffer.push(json_bytes);
        self.pending.push(event.clone());
        Ok(event)
    }

    /// Highest id assigned so far (0 for an empty log).
    pub fn last_event_id(&self) -> i64 {
        self.last_id
    }

    /// Check if flush is needed (interval elapsed or buffer full).
    pub fn needs_flush(&self) -> bool {
        !self.write_buffer.is_empty()
            && (self.last_flush.elapsed() >= FLUSH_INTERVAL
                || self.write_buffer.len() >= FLUSH_THRESHOLD)
    }

    /// Flush all buffered entries to disk with a single fsync.
    ///
    /// This is the durability point.
    pub fn flush(&mut self) -> Result<(), LogError> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }

        for mut json_bytes in self.write_buffer.drain(..) {
            json_bytes.push(b'\n');
            self.file.write_all(&json_bytes)?;
        }

        self.file.sync_all()?;
        self.pending.clear();
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Read events with `id > after`, oldest first, up to `limit`
    /// (`usize::MAX` for all). Sees buffered events too, so readers in the
    /// same process never miss an append.
    pub fn events_after(&self, after: i64, limit: usize) -> Result<Vec<Event>, LogError> {
        let mut events = self.read_durable(after)?;
        for event in &self.pending {
            if event.id > after {
                events.push(event.clone());
            }
        }
        events.truncate(limit);
        Ok(events)
    }

    /// Read events with `id > after` matching `keep`, oldest first.
    pub fn events_after_matching<F>(
        &self,
        after: i64,
        limit: usize,
        mut keep: F,
    ) -> Result<Vec<Event>, LogError>
    where
        F: FnMut(&Event) -> bool,
    {
        let mut events: Vec<Event> = self
            .read_durable(after)?
            .into_iter()
            .filter(|e| keep(e))
            .collect();
        for event in &self.pending {
            if event.id > after && keep(event) {
                events.push(event.clone());
            }
        }
        events.truncate(limit);
        Ok(events)
    }

    /// Read the most recent `count` events (for `events --last N`).
    pub fn tail(&self, count: usize) -> Result<Vec<Event>, LogError> {
        let after = self.last_id.saturating_sub(count as i64);
        self.events_after(after, usize::MAX)
    }

    fn read_durable(&self, after: i64) -> Result<Vec<Event>, LogError> {
        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut events = Vec::new();
        let mut line = String::new();
        let mut offset = 0u64;

        loop {
            line.clear();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                offset += bytes_read as u64;
                continue;
            }

            let event: Event = match serde_json::from_str(trimmed) {
                Ok(e) => e,
                Err(e) => {
                    warn!(offset, error = %e, "Corrupt event log entry during read, stopping");
                    break;
                }
            };
            offset += bytes_read as u64;

            if event.id > after {
                events.push(event);
            }
        }

        Ok(events)
    }

    /// Path of the backing file (used by reset archiving).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
