//! Persisted record stream
//!
//! One CSV file, append-only, header first. The header is the timestamp
//! column followed by every [`Channel`] column in table order. Absent values
//! are empty cells.
//!
//! Opening a file whose header differs from the current channel set moves it
//! aside to `<stem>_<YYYYmmdd_HHMMSS>.csv` and starts a fresh file. Existing
//! records are never rewritten.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::model::{Channel, Reading};
use crate::time::{format_timestamp, now_local, parse_timestamp, rotation_suffix};
use crate::{Error, Result};

pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Destination for flushed records
pub trait RecordSink {
    /// Persist one complete record
    fn append(&mut self, reading: &Reading) -> Result<()>;
}

impl RecordSink for Vec<Reading> {
    fn append(&mut self, reading: &Reading) -> Result<()> {
        self.push(reading.clone());
        Ok(())
    }
}

/// Header line for the current channel set, without line terminator
pub fn header_line() -> String {
    std::iter::once(TIMESTAMP_COLUMN)
        .chain(Channel::ALL.iter().map(|c| c.column()))
        .collect::<Vec<_>>()
        .join(",")
}

/// One record as a complete CSV line including the terminator
pub fn format_record(reading: &Reading) -> String {
    let mut line = format_timestamp(&reading.timestamp);
    for channel in Channel::ALL {
        line.push(',');
        if let Some(value) = reading.get(channel) {
            line.push_str(&value.to_string());
        }
    }
    line.push('\n');
    line
}

/// What [`CsvRecordStore::open`] found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// No usable file existed; a new one was started
    Created,
    /// Header matched; new records go after the existing ones
    Appending,
    /// Header differed; the old file now lives at the contained path
    Rotated(PathBuf),
}

/// Append-mode handle on the record stream
#[derive(Debug)]
pub struct CsvRecordStore {
    path: PathBuf,
    file: File,
}

impl CsvRecordStore {
    pub fn open(path: &Path) -> Result<(Self, OpenOutcome)> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut outcome = OpenOutcome::Created;
        if path.exists() {
            let existing = read_header(path)?;
            match existing {
                Some(header) if header == header_line() => {
                    outcome = OpenOutcome::Appending;
                }
                Some(header) => {
                    let rotated = rotated_path(path);
                    fs::rename(path, &rotated)?;
                    warn!(
                        "Column change detected, rotated {} to {}",
                        path.display(),
                        rotated.display()
                    );
                    debug!("Previous header: {}", header);
                    outcome = OpenOutcome::Rotated(rotated);
                }
                None => {
                    // Empty file: treat as new
                }
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        match outcome {
            OpenOutcome::Appending => {
                if !ends_with_newline(path)? {
                    // An interrupted write left a partial line; terminate it
                    file.write_all(b"\n")?;
                }
                info!("Appending to {}", path.display());
            }
            _ => {
                file.write_all(format!("{}\n", header_line()).as_bytes())?;
                file.flush()?;
                info!("Created {}", path.display());
            }
        }

        Ok((
            Self {
                path: path.to_path_buf(),
                file,
            },
            outcome,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvRecordStore {
    /// One `write_all` of a complete line on an append-mode handle
    fn append(&mut self, reading: &Reading) -> Result<()> {
        let line = format_record(reading);
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

/// First line of an existing file, `None` if the file is empty
fn read_header(path: &Path) -> Result<Option<String>> {
    let mut first = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first)?;
    let header = first.trim_end_matches(['\r', '\n']);
    Ok((!header.is_empty()).then(|| header.to_string()))
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// `<stem>_<YYYYmmdd_HHMMSS>.csv` next to the original, never clobbering
fn rotated_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ecodan_log".to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    let suffix = rotation_suffix(&now_local());

    let mut candidate = path.with_file_name(format!("{}_{}.{}", stem, suffix, ext));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}_{}_{}.{}", stem, suffix, n, ext));
        n += 1;
    }
    candidate
}

/// Raw records read back from a stream file
#[derive(Debug, Clone, Default)]
pub struct LoadedStream {
    /// Records in file order, not yet normalised
    pub records: Vec<Reading>,
    /// Rows dropped because the timestamp did not parse
    pub skipped_rows: usize,
    /// Header columns that match no known channel
    pub unknown_columns: Vec<String>,
}

/// Load a stream file written by this or an older channel set
///
/// Unknown columns are ignored. Unparseable cells are absent. Rows with an
/// unparseable timestamp are skipped and counted.
pub fn load_records(path: &Path) -> Result<LoadedStream> {
    let text = fs::read_to_string(path)?;
    parse_records(&text)
}

pub fn parse_records(text: &str) -> Result<LoadedStream> {
    let mut lines = text.lines();
    let header = match lines.next() {
        Some(h) => h.trim_end_matches('\r'),
        None => return Ok(LoadedStream::default()),
    };

    let names: Vec<&str> = split_cells(header);
    let ts_index = names
        .iter()
        .position(|n| *n == TIMESTAMP_COLUMN)
        .ok_or_else(|| Error::Schema("missing timestamp column".to_string()))?;

    let mut loaded = LoadedStream::default();
    let columns: Vec<Option<Channel>> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if i == ts_index {
                return None;
            }
            let channel = Channel::from_column(name);
            if channel.is_none() {
                loaded.unknown_columns.push(name.to_string());
            }
            channel
        })
        .collect();

    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let cells = split_cells(line);
        let timestamp = match cells.get(ts_index).map(|c| parse_timestamp(c)) {
            Some(Ok(ts)) => ts,
            _ => {
                loaded.skipped_rows += 1;
                continue;
            }
        };

        let mut reading = Reading::new(timestamp);
        for (cell, channel) in cells.iter().zip(&columns) {
            if let Some(channel) = channel {
                if !cell.is_empty() {
                    reading.set(*channel, channel.kind().parse_payload(cell));
                }
            }
        }
        loaded.records.push(reading);
    }

    if loaded.skipped_rows > 0 {
        warn!("Skipped {} rows with unparseable timestamps", loaded.skipped_rows);
    }
    Ok(loaded)
}

fn split_cells(line: &str) -> Vec<&str> {
    line.split(',').map(|c| c.trim().trim_matches('"')).collect()
}
