//! Append-only attendance log.
//!
//! One record per line: `name,YYYY-MM-DD HH:MM:SS.ffffff`.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_HISTORY_LIMIT: usize = 25;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
// Fraction optional: older logs carry second precision.
const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("attendance log unavailable at {path}: {source}")]
    StorageUnavailable {
        path: String,
        source: std::io::Error,
    },
    #[error("attendance name must be non-empty and single-line")]
    InvalidName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub name: String,
    pub timestamp: NaiveDateTime,
}

impl AttendanceRecord {
    fn to_line(&self) -> String {
        format!("{},{}\n", self.name, self.timestamp.format(TIMESTAMP_FORMAT))
    }

    /// Parse one log line; `None` for anything malformed.
    fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let (name, ts) = line.rsplit_once(',')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let timestamp = NaiveDateTime::parse_from_str(ts.trim(), PARSE_FORMAT).ok()?;
        Some(Self {
            name: name.to_string(),
            timestamp,
        })
    }
}

/// File-backed attendance log. Records are only ever appended.
#[derive(Debug, Clone)]
pub struct AttendanceLog {
    path: PathBuf,
}

impl AttendanceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record stamped with the current local time.
    pub fn record_now(&self, name: &str) -> Result<AttendanceRecord, AttendanceError> {
        self.append(name, Local::now().naive_local())
    }

    pub fn append(&self, name: &str, timestamp: NaiveDateTime) -> Result<AttendanceRecord, AttendanceError> {
        if name.trim().is_empty() || name.contains(|c| c == '\n' || c == '\r') {
            return Err(AttendanceError::InvalidName);
        }
        let record = AttendanceRecord {
            name: name.to_string(),
            timestamp,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.unavailable(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.unavailable(e))?;
        file.write_all(record.to_line().as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| self.unavailable(e))?;

        tracing::info!(name = %record.name, timestamp = %record.timestamp, "attendance recorded");
        Ok(record)
    }

    /// Up to `limit` most recent well-formed records, newest first.
    ///
    /// Malformed lines are skipped. A missing log reads as empty.
    pub fn recent_history(&self, limit: usize) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.unavailable(e)),
        };

        let mut malformed = 0usize;
        let records: Vec<AttendanceRecord> = contents
            .lines()
            .rev()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                let parsed = AttendanceRecord::parse_line(line);
                if parsed.is_none() {
                    malformed += 1;
                }
                parsed
            })
            .take(limit)
            .collect();

        if malformed > 0 {
            tracing::debug!(malformed, path = %self.path.display(), "skipped malformed attendance lines");
        }
        Ok(records)
    }

    fn unavailable(&self, source: std::io::Error) -> AttendanceError {
        AttendanceError::StorageUnavailable {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_micro_opt(9, 0, sec, 123_456)
            .unwrap()
    }

    #[test]
    fn test_recent_history_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = AttendanceLog::new(dir.path().join("log.txt"));
        log.append("A", ts(1)).unwrap();
        log.append("B", ts(2)).unwrap();
        log.append("C", ts(3)).unwrap();

        let names: Vec<String> = log.recent_history(2).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["C", "B"]);
    }

    #[test]
    fn test_line_format_has_microseconds() {
        let dir = tempfile::tempdir().unwrap();
        let log = AttendanceLog::new(dir.path().join("log.txt"));
        log.append("Alice", ts(5)).unwrap();
        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents, "Alice,2026-10-16 09:00:05.123456\n");
    }

    #[test]
    fn test_append_never_rewrites_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "legacy line without comma\n").unwrap();
        let log = AttendanceLog::new(&path);
        log.append("Bob", ts(1)).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("legacy line without comma\nBob,"));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(
            &path,
            "Alice,2026-10-16 08:00:00.000001\n\
             garbage\n\
             ,2026-10-16 08:00:00.000001\n\
             Bob,not a time\n\
             \n\
             Carol,2026-10-16 08:30:00\n",
        )
        .unwrap();
        let history = AttendanceLog::new(&path).recent_history(DEFAULT_HISTORY_LIMIT).unwrap();
        let names: Vec<&str> = history.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Carol", "Alice"]);
    }

    #[test]
    fn test_name_with_comma_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let log = AttendanceLog::new(dir.path().join("log.txt"));
        log.append("Doe, Jane", ts(1)).unwrap();
        let history = log.recent_history(1).unwrap();
        assert_eq!(history[0].name, "Doe, Jane");
        assert_eq!(history[0].timestamp, ts(1));
    }

    #[test]
    fn test_missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = AttendanceLog::new(dir.path().join("nope.txt"));
        assert!(log.recent_history(25).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_empty_or_multiline_names() {
        let dir = tempfile::tempdir().unwrap();
        let log = AttendanceLog::new(dir.path().join("log.txt"));
        assert!(matches!(log.append("  ", ts(1)), Err(AttendanceError::InvalidName)));
        assert!(matches!(log.append("a\nb", ts(1)), Err(AttendanceError::InvalidName)));
    }

    #[test]
    fn test_record_now_is_not_before_call() {
        let dir = tempfile::tempdir().unwrap();
        let log = AttendanceLog::new(dir.path().join("log.txt"));
        let before = Local::now().naive_local();
        let record = log.record_now("Bob").unwrap();
        assert!(record.timestamp >= before);
    }
}
