//! I/O helpers shared by the row sources and the loader.
//!
//! - **Format detection**: the file extension picks the row source
//!   (`.csv`, `.txt`, `.xlsx`, case-insensitive).
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Reader construction**: `open_csv_reader` and `open_input` build the
//!   buffered readers the delimited and line sources consume.

use std::{
    borrow::Cow,
    fmt,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::error::SourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Text,
    Xlsx,
}

impl FileFormat {
    /// Returns `None` for extensions the loader does not handle.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|ext| ext.to_str())?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(FileFormat::Csv)
        } else if ext.eq_ignore_ascii_case("txt") {
            Some(FileFormat::Text)
        } else if ext.eq_ignore_ascii_case("xlsx") {
            Some(FileFormat::Xlsx)
        } else {
            None
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileFormat::Csv => "csv",
            FileFormat::Text => "txt",
            FileFormat::Xlsx => "xlsx",
        };
        f.write_str(label)
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Decodes `bytes`, reporting whether any sequence had to be replaced.
pub fn decode_lossy<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> (Cow<'a, str>, bool) {
    let (text, _, had_errors) = encoding.decode(bytes);
    (text, had_errors)
}

pub fn open_input(path: &Path) -> Result<Box<dyn Read + Send>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(BufReader::new(file)))
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub(crate) fn printable_delimiter(delimiter: &str) -> String {
    match delimiter {
        "\t" => "\\t".to_string(),
        "\n" => "\\n".to_string(),
        other => other.to_string(),
    }
}
