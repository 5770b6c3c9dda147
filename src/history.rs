//! Append-only log of previously published texts.
//!
//! One entry per line, UTF-8. The log only ever steers future prompts away
//! from repeats, so reading it is best-effort.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::HistoryError;

#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
    limit: usize,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last `limit` non-blank entries, oldest first.
    pub fn try_read_recent(&self) -> Result<Vec<String>, HistoryError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HistoryError::Read(e)),
        };

        let lines: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let skip = lines.len().saturating_sub(self.limit);
        Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
    }

    /// Like [`try_read_recent`](Self::try_read_recent) but never fails: an
    /// unreadable log counts as an empty history.
    pub fn read_recent(&self) -> Vec<String> {
        self.try_read_recent().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Ignoring unreadable history log");
            Vec::new()
        })
    }

    /// Append one entry. Embedded newlines are collapsed so the entry stays
    /// on a single line.
    pub fn append(&self, text: &str) -> Result<(), HistoryError> {
        let entry = text.split_whitespace().collect::<Vec<_>>().join(" ");

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(HistoryError::Write)?;

        let needs_separator = ends_without_newline(&mut file).map_err(HistoryError::Write)?;
        let mut line = String::with_capacity(entry.len() + 2);
        if needs_separator {
            line.push('\n');
        }
        line.push_str(&entry);
        line.push('\n');

        file.write_all(line.as_bytes()).map_err(HistoryError::Write)?;
        file.flush().map_err(HistoryError::Write)
    }
}

fn ends_without_newline(file: &mut std::fs::File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
