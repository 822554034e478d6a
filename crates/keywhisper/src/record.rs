// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-oriented record files with an in-band consumption marker.
//!
//! Each non-blank line is one record. A line starting with [`CONSUMED_MARKER`]
//! has already been handled; the marker is stripped to obtain the value.
//! Blank lines carry no record but are kept in the file projection so an
//! untouched store serializes back byte-for-byte.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Error;

/// Prefix marking a record as consumed.
pub const CONSUMED_MARKER: char = '#';

/// One record (a username or a redemption code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    value: String,
    consumed: bool,
    line: usize,
}

impl MessageRecord {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// 1-based line number in the backing file.
    pub fn line(&self) -> usize {
        self.line
    }
}

#[derive(Debug, Clone)]
enum LineContent {
    Blank(String),
    Record(usize),
}

#[derive(Debug, Clone)]
struct FileLine {
    content: LineContent,
    terminator: &'static str,
}

/// In-memory view of a record file. The records are the source of truth;
/// the file is rewritten from them whenever one is marked consumed.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    records: Vec<MessageRecord>,
    lines: Vec<FileLine>,
}

impl RecordStore {
    /// Read and parse the file at `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => return Err(Error::file_unavailable(path, e)),
        };
        let store = Self::parse(path, &contents);
        debug!(
            path = %store.path.display(),
            records = store.len(),
            consumed = store.consumed_count(),
            "loaded record file"
        );
        Ok(store)
    }

    /// Parse file contents without touching the filesystem.
    pub fn parse(path: impl Into<PathBuf>, contents: &str) -> Self {
        let mut records = Vec::new();
        let mut lines = Vec::new();

        for (idx, chunk) in contents.split_inclusive('\n').enumerate() {
            let (text, terminator) = split_terminator(chunk);
            let (value, consumed) = match text.strip_prefix(CONSUMED_MARKER) {
                Some(rest) => (rest, true),
                None => (text, false),
            };

            let content = if value.trim().is_empty() {
                LineContent::Blank(text.to_owned())
            } else {
                records.push(MessageRecord { value: value.to_owned(), consumed, line: idx + 1 });
                LineContent::Record(records.len() - 1)
            };
            lines.push(FileLine { content, terminator });
        }

        Self { path: path.into(), records, lines }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in file order, consumed or not.
    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    /// Indices of unconsumed records, in file order.
    pub fn unconsumed(&self) -> Vec<usize> {
        self.records.iter().enumerate().filter(|(_, r)| !r.consumed).map(|(i, _)| i).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn consumed_count(&self) -> usize {
        self.records.iter().filter(|r| r.consumed).count()
    }

    pub fn get(&self, index: usize) -> Option<&MessageRecord> {
        self.records.get(index)
    }

    /// Flag the record at `index` as consumed and rewrite the backing file.
    ///
    /// A record that is already consumed is left alone and the file is not touched.
    /// If the rewrite fails the record stays unconsumed, matching the file.
    pub fn mark_consumed(&mut self, index: usize) -> Result<(), Error> {
        let record = self.records.get_mut(index).ok_or(Error::UnknownRecord { index })?;
        if record.consumed {
            return Ok(());
        }
        record.consumed = true;
        let line = record.line;

        if let Err(source) = self.persist() {
            if let Some(record) = self.records.get_mut(index) {
                record.consumed = false;
            }
            return Err(Error::Persist { path: self.path.clone(), source });
        }
        debug!(path = %self.path.display(), line, "marked record consumed");
        Ok(())
    }

    /// Render the file projection of the current records.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match &line.content {
                LineContent::Blank(text) => out.push_str(text),
                LineContent::Record(i) => {
                    let record = &self.records[*i];
                    if record.consumed {
                        out.push(CONSUMED_MARKER);
                    }
                    out.push_str(&record.value);
                }
            }
            out.push_str(line.terminator);
        }
        out
    }

    /// Atomic rewrite: fsynced sibling temp file renamed over the original.
    fn persist(&self) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(self.serialize().as_bytes())?;
        // Temp files are created 0600; keep the original's mode.
        if let Ok(meta) = std::fs::metadata(&self.path) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn split_terminator(chunk: &str) -> (&str, &'static str) {
    if let Some(text) = chunk.strip_suffix("\r\n") {
        (text, "\r\n")
    } else if let Some(text) = chunk.strip_suffix('\n') {
        (text, "\n")
    } else {
        (chunk, "")
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
