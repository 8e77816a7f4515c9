//! Resume points recovered from earlier runs' progress logs.
//!
//! Each run writes one progress log per input file,
//! `<log dir>/<file name>_<timestamp>.log`, with one
//! `<time> Processing line <N> of <file name>` line per emitted batch. The
//! newest earlier log for a file is the ledger the next run resumes from: the
//! last such line in the file wins, even when an earlier line holds a larger
//! number. Lines that do not parse are ignored, so a torn write under-counts.

use std::{
    fmt::Display,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::debug;
use regex::Regex;

const LOG_FILE_STAMP: &str = "%Y%m%d%H%M%S%3f";
const LOG_LINE_STAMP: &str = "%Y/%m/%d %H:%M:%S";

fn progress_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Processing line\s+(\d+)\s+of ").expect("progress pattern is valid")
    })
}

/// Returns the line count recorded by the newest earlier log for `file_name`,
/// or 0 when there is none.
pub fn last_processed_line(log_dir: &Path, file_name: &str, current: Option<&Path>) -> usize {
    let Some(log_path) = find_latest_log(log_dir, file_name, current) else {
        debug!("No earlier progress log for {file_name} in {log_dir:?}");
        return 0;
    };
    debug!("Recovering checkpoint for {file_name} from {log_path:?}");
    match File::open(&log_path) {
        Ok(file) => scan_checkpoint(BufReader::new(file)),
        Err(err) => {
            debug!("Cannot open {log_path:?}: {err}");
            0
        }
    }
}

/// Picks the most recently modified log under `log_dir` whose file name
/// contains `file_name`, skipping `current`.
pub fn find_latest_log(log_dir: &Path, file_name: &str, current: Option<&Path>) -> Option<PathBuf> {
    let root = glob::Pattern::escape(log_dir.to_str()?);
    let pattern = Path::new(&root).join("**").join("*");
    let pattern = pattern.to_str()?;
    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("Invalid log search pattern {pattern}: {err}");
            return None;
        }
    };
    let current_canonical = current.and_then(|path| fs::canonicalize(path).ok());

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for path in entries.flatten() {
        let is_current = current.is_some_and(|current| current == path.as_path())
            || current_canonical
                .as_ref()
                .is_some_and(|canonical| fs::canonicalize(&path).ok().as_ref() == Some(canonical));
        if is_current {
            continue;
        }
        let matches_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.contains(file_name));
        if !matches_name {
            continue;
        }
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        // Equal mtimes fall back to the name, whose stamp sorts by time.
        let newer = latest.as_ref().is_none_or(|(best, best_path)| {
            modified > *best || (modified == *best && path > *best_path)
        });
        if newer {
            latest = Some((modified, path));
        }
    }
    latest.map(|(_, path)| path)
}

/// Scans a progress log and returns the value of the last parseable
/// `Processing line N` entry.
pub fn scan_checkpoint<R: BufRead>(reader: R) -> usize {
    let mut last = 0;
    for line in reader.split(b'\n') {
        let Ok(bytes) = line else {
            break;
        };
        let text = String::from_utf8_lossy(&bytes);
        if let Some(value) = progress_pattern()
            .captures(&text)
            .and_then(|caps| caps[1].parse::<usize>().ok())
        {
            last = value;
        }
    }
    last
}

/// Append-only progress log for one input file in one run.
pub struct ProgressLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ProgressLog {
    pub fn create(log_dir: &Path, file_name: &str, started: DateTime<Local>) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Creating log directory {log_dir:?}"))?;
        let path = log_dir.join(format!(
            "{file_name}_{}.log",
            started.format(LOG_FILE_STAMP)
        ));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Creating progress log {path:?}"))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn progress(&mut self, line: usize, file_name: &str) -> io::Result<()> {
        self.write_line(format_args!("Processing line {line} of {file_name}"))
    }

    pub fn failure(&mut self, table: &str, err: &dyn Display) -> io::Result<()> {
        self.write_line(format_args!("Error inserting batch to {table}: {err}"))
    }

    fn write_line(&mut self, message: std::fmt::Arguments<'_>) -> io::Result<()> {
        writeln!(
            self.writer,
            "{} {message}",
            Local::now().format(LOG_LINE_STAMP)
        )?;
        self.writer.flush()
    }
}
