//! Turns a row source into batches of mapped records.
//!
//! The assembler is the single producer for a file. It skips the rows a
//! previous run already handled, maps every following row, drops records with
//! nothing in them, and hands full batches to `emit`. Each emitted batch is
//! followed by a progress line carrying the file's cumulative line count.

use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::{
    checkpoint::ProgressLog,
    error::SourceError,
    mapping::{Batch, ColumnMapping},
    source::{RowRead, RowSource},
};

/// Per-file cursor. The line count and the progress log share one lock so a
/// logged count always matches the rows consumed when it was written.
pub struct ProcessState {
    file_name: String,
    inner: Mutex<Cursor>,
}

struct Cursor {
    line: usize,
    log: ProgressLog,
    logged: bool,
}

impl ProcessState {
    pub fn new(file_name: impl Into<String>, line: usize, log: ProgressLog) -> Self {
        Self {
            file_name: file_name.into(),
            inner: Mutex::new(Cursor {
                line,
                log,
                logged: false,
            }),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn line(&self) -> usize {
        self.lock().line
    }

    /// Advances the cursor by one row and returns the new line number.
    pub fn advance(&self) -> usize {
        let mut cursor = self.lock();
        cursor.line += 1;
        cursor.line
    }

    /// Writes the current line count to the progress log, returning it.
    pub fn log_progress(&self) -> Result<usize> {
        let mut cursor = self.lock();
        let line = cursor.line;
        cursor
            .log
            .progress(line, &self.file_name)
            .with_context(|| format!("Writing progress for {}", self.file_name))?;
        cursor.logged = true;
        Ok(line)
    }

    /// Records `line` when this run has not logged any progress yet, so a
    /// failed run still leaves the checkpoint it started from.
    pub fn keep_checkpoint(&self, line: usize) -> Result<()> {
        let mut cursor = self.lock();
        if cursor.logged {
            return Ok(());
        }
        cursor
            .log
            .progress(line, &self.file_name)
            .with_context(|| format!("Writing progress for {}", self.file_name))?;
        cursor.logged = true;
        Ok(())
    }

    pub fn log_failure(&self, table: &str, err: &dyn std::fmt::Display) {
        let mut cursor = self.lock();
        if let Err(io_err) = cursor.log.failure(table, err) {
            warn!("Cannot record failed batch for {}: {io_err}", self.file_name);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Cursor> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub rows_skipped: usize,
    pub rows_read: usize,
    pub malformed_rows: usize,
    pub blank_records: usize,
    pub records_emitted: usize,
    pub batches_emitted: usize,
    pub final_line: usize,
}

pub struct BatchAssembler<'a> {
    mapping: &'a ColumnMapping,
    batch_size: usize,
}

impl<'a> BatchAssembler<'a> {
    pub fn new(mapping: &'a ColumnMapping, batch_size: usize) -> Self {
        Self {
            mapping,
            batch_size: batch_size.max(1),
        }
    }

    /// Discards `resume_from` rows, then batches the rest of `source`.
    ///
    /// Reaching end-of-stream while skipping means the file was already
    /// loaded; that is a success with nothing emitted.
    pub fn run<F>(
        &self,
        source: &mut RowSource,
        resume_from: usize,
        state: &ProcessState,
        mut emit: F,
    ) -> Result<AssemblyReport>
    where
        F: FnMut(Batch) -> Result<()>,
    {
        let mut report = AssemblyReport::default();

        while report.rows_skipped < resume_from {
            match source.read().map_err(fatal(state))? {
                RowRead::End => {
                    debug!(
                        "{} ended after {} row(s) while skipping to {resume_from}",
                        state.file_name(),
                        report.rows_skipped
                    );
                    // Carry the position into this run's log so the next run
                    // still finds it.
                    state.log_progress()?;
                    report.final_line = state.line();
                    return Ok(report);
                }
                RowRead::Row(_) | RowRead::Malformed { .. } => report.rows_skipped += 1,
            }
        }

        let mut batch: Batch = Vec::with_capacity(self.batch_size);
        let mut last_logged = None;
        loop {
            let fields = match source.read().map_err(fatal(state))? {
                RowRead::End => break,
                RowRead::Row(fields) => fields,
                RowRead::Malformed { fields, reason } => {
                    warn!("{}: {reason}; keeping salvaged fields", state.file_name());
                    report.malformed_rows += 1;
                    fields
                }
            };
            report.rows_read += 1;
            let line = state.advance();

            let record = self.mapping.apply(&fields, line);
            if record.is_blank() {
                report.blank_records += 1;
                continue;
            }
            batch.push(record);

            if batch.len() >= self.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                report.records_emitted += full.len();
                report.batches_emitted += 1;
                emit(full)?;
                last_logged = Some(state.log_progress()?);
            }
        }

        if !batch.is_empty() {
            report.records_emitted += batch.len();
            report.batches_emitted += 1;
            emit(batch)?;
            last_logged = Some(state.log_progress()?);
        }
        // Trailing blank rows, or a run with nothing new, still leave a line.
        if last_logged != Some(state.line()) {
            state.log_progress()?;
        }
        report.final_line = state.line();
        Ok(report)
    }
}

fn fatal(state: &ProcessState) -> impl Fn(SourceError) -> anyhow::Error + '_ {
    move |err| anyhow::Error::new(err).context(format!("Reading {}", state.file_name()))
}
