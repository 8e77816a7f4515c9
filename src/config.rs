//! Run configuration loaded from YAML.
//!
//! ```yaml
//! store:
//!   path: ingest.db
//! task:
//!   table_name: users
//!   columns: [name, phone, addr]
//!   data_columns: [1, 2, 3]
//!   batch_size: 1000
//!   delimiter: ","
//!   csv_begin_line: 1
//!   multiple_table: true
//!   table_size: 1000000
//!   table_names: [users_0, users_1]
//! ```
//!
//! Everything is validated up front so a bad file fails before any input is
//! touched.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::{
    io_utils::{self, FileFormat},
    mapping::ColumnMapping,
    router::TableRouter,
    source::{DEFAULT_SHEET, SourceOptions},
    store::SQLITE_MAX_VARIABLES,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    pub task: TaskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("ingest.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub table_name: String,
    pub columns: Vec<String>,
    /// 1-based source field positions, one per entry in `columns`.
    pub data_columns: Vec<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub csv_begin_line: usize,
    #[serde(default)]
    pub txt_begin_line: usize,
    #[serde(default)]
    pub xlsx_begin_line: usize,
    #[serde(default = "default_sheet")]
    pub sheet: String,
    #[serde(default)]
    pub multiple_table: bool,
    #[serde(default)]
    pub table_size: u64,
    #[serde(default)]
    pub table_names: Vec<String>,
    #[serde(default)]
    pub create_tables: bool,
}

fn default_batch_size() -> usize {
    1000
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_sheet() -> String {
    DEFAULT_SHEET.to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: Config = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config
            .validate()
            .with_context(|| format!("Validating config {path:?}"))?;
        Ok(config)
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(input).context("Parsing config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.task.validate()
    }
}

impl TaskConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.table_name.trim().is_empty(),
            "task.table_name must not be empty"
        );
        ensure!(!self.columns.is_empty(), "task.columns must not be empty");
        ensure!(
            self.columns.iter().all(|c| !c.trim().is_empty()),
            "task.columns must not contain empty names"
        );
        ColumnMapping::from_positions(&self.columns, &self.data_columns)?;
        ensure!(self.batch_size > 0, "task.batch_size must be positive");
        let parameters = self.batch_size.saturating_mul(self.columns.len());
        ensure!(
            parameters <= SQLITE_MAX_VARIABLES,
            "task.batch_size {} x {} column(s) needs {parameters} statement parameters; the limit is {SQLITE_MAX_VARIABLES}",
            self.batch_size,
            self.columns.len()
        );
        ensure!(!self.delimiter.is_empty(), "task.delimiter must not be empty");
        ensure!(
            self.delimiter.as_bytes()[0].is_ascii(),
            "task.delimiter must start with an ASCII character for csv input"
        );
        self.encoding()?;
        if self.multiple_table {
            ensure!(
                !self.table_names.is_empty(),
                "task.table_names must list at least one table when multiple_table is set"
            );
            ensure!(
                self.table_size > 0,
                "task.table_size must be positive when multiple_table is set"
            );
        }
        Ok(())
    }

    pub fn mapping(&self) -> Result<ColumnMapping> {
        ColumnMapping::from_positions(&self.columns, &self.data_columns)
    }

    pub fn encoding(&self) -> Result<&'static Encoding> {
        io_utils::resolve_encoding(self.encoding.as_deref())
    }

    pub fn router(&self) -> Result<TableRouter> {
        if self.multiple_table {
            TableRouter::sharded(
                self.table_name.clone(),
                self.table_names.clone(),
                self.table_size,
            )
        } else {
            Ok(TableRouter::single(self.table_name.clone()))
        }
    }

    /// Every table a run may write to.
    pub fn destination_tables(&self) -> Vec<String> {
        if self.multiple_table {
            self.table_names.clone()
        } else {
            vec![self.table_name.clone()]
        }
    }

    pub fn begin_line(&self, format: FileFormat) -> usize {
        match format {
            FileFormat::Csv => self.csv_begin_line,
            FileFormat::Text => self.txt_begin_line,
            FileFormat::Xlsx => self.xlsx_begin_line,
        }
    }

    pub fn source_options(&self) -> Result<SourceOptions> {
        Ok(SourceOptions {
            delimiter: self.delimiter.clone(),
            encoding: self.encoding()?,
            sheet: self.sheet.clone(),
        })
    }
}
