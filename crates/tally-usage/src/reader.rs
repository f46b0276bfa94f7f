//! Lazy line-delimited JSON reader for session logs.
//!
//! [`LogReader`] yields one [`LogEntry`] per non-blank line, in file order.
//! Lines that fail to decode are skipped with a warning carrying the file path
//! and 1-based line number; they never end the stream. Only the current line
//! is held in memory, so logs of any size can be read.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tally_core::{Result, TallyError};
use tracing::{trace, warn};

use crate::entry::LogEntry;

/// Iterator over the entries of one session log file.
///
/// The file handle is owned by the reader and closed when it is dropped, so a
/// consumer may stop early without cleanup. Open the path again to restart.
#[derive(Debug)]
pub struct LogReader {
    path: PathBuf,
    reader: BufReader<File>,
    buf: Vec<u8>,
    line_number: usize,
    malformed: usize,
    finished: bool,
}

impl LogReader {
    /// Open a log file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TallyError::io("opening log", path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            buf: Vec::new(),
            line_number: 0,
            malformed: 0,
            finished: false,
        })
    }

    /// Start a fresh pass over the same file.
    pub fn reopen(&self) -> Result<Self> {
        Self::open(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines (blank ones included) consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line_number
    }

    /// Number of lines skipped because they were not valid JSON.
    pub fn malformed_lines(&self) -> usize {
        self.malformed
    }
}

impl Iterator for LogReader {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        while !self.finished {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        file = %self.path.display(),
                        line = self.line_number + 1,
                        error = %e,
                        "Failed to read log, stopping early"
                    );
                    self.finished = true;
                    return None;
                }
            }

            self.line_number += 1;
            let line = self.buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_slice::<Value>(line) {
                Ok(value) => return Some(LogEntry::from_value(&value)),
                Err(e) => {
                    self.malformed += 1;
                    let err = TallyError::LogParse {
                        path: self.path.clone(),
                        line_number: self.line_number,
                        message: e.to_string(),
                    };
                    warn!("{err}");
                }
            }
        }

        None
    }
}

/// Read the first decodable entry of a file.
///
/// Used to peek at a candidate's `sessionId` without reading the whole log.
pub fn read_first_entry<P: AsRef<Path>>(path: P) -> Result<Option<LogEntry>> {
    let mut reader = LogReader::open(path)?;
    let first = reader.next();
    trace!(file = %reader.path().display(), found = first.is_some(), "Peeked first entry");
    Ok(first)
}
