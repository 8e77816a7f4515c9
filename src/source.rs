//! Row sources: one sequential reader per supported input format.
//!
//! Every variant hands back rows through [`RowSource::read`], which separates
//! a clean row, a malformed row that still carries fields, and end-of-stream.
//! Errors that leave nothing to salvage come back as [`SourceError`].
//!
//! Sources are forward-only. Resuming part-way through a file means opening a
//! fresh source and discarding rows from the start.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use encoding_rs::Encoding;

use crate::{
    error::SourceError,
    io_utils::{self, FileFormat},
};

pub const DEFAULT_SHEET: &str = "Sheet1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRead {
    Row(Vec<String>),
    /// The row could not be read cleanly; `fields` is whatever survived and
    /// is never empty. A row with nothing to salvage is a [`SourceError`].
    Malformed { fields: Vec<String>, reason: String },
    End,
}

#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub delimiter: String,
    pub encoding: &'static Encoding,
    pub sheet: String,
}

pub enum RowSource {
    Delimited(DelimitedSource),
    Lines(LineSource),
    Sheet(SheetSource),
}

impl RowSource {
    pub fn open(
        path: &Path,
        format: FileFormat,
        options: &SourceOptions,
    ) -> Result<Self, SourceError> {
        match format {
            FileFormat::Csv => {
                let delimiter = options.delimiter.as_bytes().first().copied().unwrap_or(b',');
                let reader = io_utils::open_input(path)?;
                Ok(RowSource::Delimited(DelimitedSource::new(
                    reader,
                    delimiter,
                    options.encoding,
                )))
            }
            FileFormat::Text => {
                let reader = io_utils::open_input(path)?;
                Ok(RowSource::Lines(LineSource::new(
                    reader,
                    &options.delimiter,
                    options.encoding,
                )))
            }
            FileFormat::Xlsx => Ok(RowSource::Sheet(SheetSource::open(path, &options.sheet)?)),
        }
    }

    pub fn read(&mut self) -> Result<RowRead, SourceError> {
        match self {
            RowSource::Delimited(source) => source.read(),
            RowSource::Lines(source) => source.read(),
            RowSource::Sheet(source) => Ok(source.read()),
        }
    }
}

/// Quoted, single-character-delimited text.
pub struct DelimitedSource {
    reader: csv::Reader<Box<dyn Read + Send>>,
    record: csv::ByteRecord,
    encoding: &'static Encoding,
    expected_fields: Option<usize>,
    rows_read: usize,
}

impl DelimitedSource {
    pub fn new(reader: Box<dyn Read + Send>, delimiter: u8, encoding: &'static Encoding) -> Self {
        Self {
            reader: io_utils::open_csv_reader(reader, delimiter),
            record: csv::ByteRecord::new(),
            encoding,
            expected_fields: None,
            rows_read: 0,
        }
    }

    fn read(&mut self) -> Result<RowRead, SourceError> {
        let more = self
            .reader
            .read_byte_record(&mut self.record)
            .map_err(|err| SourceError::Read {
                row: self.rows_read + 1,
                message: err.to_string(),
            })?;
        if !more {
            return Ok(RowRead::End);
        }
        self.rows_read += 1;

        let mut undecodable = false;
        let fields = self
            .record
            .iter()
            .map(|field| {
                let (text, had_errors) = io_utils::decode_lossy(field, self.encoding);
                undecodable |= had_errors;
                text.into_owned()
            })
            .collect::<Vec<_>>();

        let expected = *self.expected_fields.get_or_insert(fields.len());
        if fields.len() != expected {
            let reason = format!(
                "row {} has {} field(s), expected {expected}",
                self.rows_read,
                fields.len()
            );
            return Ok(RowRead::Malformed { fields, reason });
        }
        if undecodable {
            let reason = format!(
                "row {} is not valid {}",
                self.rows_read,
                self.encoding.name()
            );
            return Ok(RowRead::Malformed { fields, reason });
        }
        Ok(RowRead::Row(fields))
    }
}

/// Unquoted text split on a delimiter string, one row per line.
pub struct LineSource {
    reader: BufReader<Box<dyn Read + Send>>,
    delimiter: String,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
    rows_read: usize,
}

impl LineSource {
    pub fn new(reader: Box<dyn Read + Send>, delimiter: &str, encoding: &'static Encoding) -> Self {
        Self {
            reader: BufReader::new(reader),
            delimiter: delimiter.to_string(),
            encoding,
            buffer: Vec::new(),
            rows_read: 0,
        }
    }

    fn read(&mut self) -> Result<RowRead, SourceError> {
        self.buffer.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buffer)
            .map_err(|err| SourceError::Read {
                row: self.rows_read + 1,
                message: err.to_string(),
            })?;
        if read == 0 {
            return Ok(RowRead::End);
        }
        self.rows_read += 1;

        let mut line = self.buffer.as_slice();
        if let Some(stripped) = line.strip_suffix(b"\n") {
            line = stripped;
        }
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        let (text, had_errors) = io_utils::decode_lossy(line, self.encoding);
        let fields = split_line(&text, &self.delimiter);
        if had_errors {
            let reason = format!(
                "line {} is not valid {}",
                self.rows_read,
                self.encoding.name()
            );
            return Ok(RowRead::Malformed { fields, reason });
        }
        Ok(RowRead::Row(fields))
    }
}

fn split_line(line: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        return vec![line.to_string()];
    }
    line.split(delimiter).map(str::to_string).collect()
}

/// One worksheet, walked top to bottom.
///
/// The sheet's used range may start below or right of `A1`; the leading rows
/// and columns are replayed as empty so positions line up with the sheet.
pub struct SheetSource {
    range: Range<Data>,
    leading_rows: usize,
    leading_cols: usize,
    cursor: usize,
}

impl SheetSource {
    pub fn open(path: &Path, sheet: &str) -> Result<Self, SourceError> {
        let mut workbook: Xlsx<BufReader<File>> =
            open_workbook(path).map_err(|err: calamine::XlsxError| SourceError::Workbook {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        if !workbook.sheet_names().iter().any(|name| name == sheet) {
            return Err(SourceError::MissingSheet {
                path: path.to_path_buf(),
                sheet: sheet.to_string(),
            });
        }
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|err| SourceError::Workbook {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        Ok(Self::from_range(range))
    }

    pub fn from_range(range: Range<Data>) -> Self {
        let (leading_rows, leading_cols) = range
            .start()
            .map(|(row, col)| (row as usize, col as usize))
            .unwrap_or((0, 0));
        Self {
            range,
            leading_rows,
            leading_cols,
            cursor: 0,
        }
    }

    fn read(&mut self) -> RowRead {
        let position = self.cursor;
        let (height, width) = self.range.get_size();
        if position >= self.leading_rows + height {
            return RowRead::End;
        }
        self.cursor += 1;
        if position < self.leading_rows {
            return RowRead::Row(Vec::new());
        }

        let row = position - self.leading_rows;
        let mut fields = vec![String::new(); self.leading_cols];
        let mut errors = Vec::new();
        for col in 0..width {
            match self.range.get((row, col)) {
                Some(Data::Error(err)) => {
                    errors.push(self.leading_cols + col + 1);
                    fields.push(err.to_string());
                }
                Some(cell) => fields.push(cell.to_string()),
                None => fields.push(String::new()),
            }
        }
        while fields.last().is_some_and(|field| field.is_empty()) {
            fields.pop();
        }

        if errors.is_empty() {
            RowRead::Row(fields)
        } else {
            let reason = format!(
                "row {} has error cell(s) in column(s) {:?}",
                position + 1,
                errors
            );
            RowRead::Malformed { fields, reason }
        }
    }
}
