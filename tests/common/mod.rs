#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::{TempDir, tempdir};

/// Scratch directory holding input files, logs, config and the database.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` to a path relative to the workspace, creating parents.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Writes a one-sheet workbook of string cells starting at `A1`.
    pub fn write_xlsx(&self, name: &str, sheet: &str, rows: &[&[&str]]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet).expect("sheet name");
        for (row, values) in rows.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                worksheet
                    .write_string(row as u32, col as u16, *value)
                    .expect("write cell");
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }

    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.path().join("logs")
    }

    pub fn database(&self) -> PathBuf {
        self.path().join("ingest.db")
    }

    /// Writes `config.yml` pointing at the workspace database with the given
    /// `task:` body (indented two spaces).
    pub fn config(&self, task: &str) -> PathBuf {
        let body = format!(
            "store:\n  path: {}\ntask:\n{task}",
            self.database().display()
        );
        self.write("config.yml", &body)
    }

    /// Rows of `table` in insertion order.
    pub fn rows(&self, table: &str, columns: &[&str]) -> Vec<Vec<String>> {
        let conn = Connection::open(self.database()).expect("open database");
        let select = columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn
            .prepare(&format!("SELECT {select} FROM \"{table}\" ORDER BY rowid"))
            .expect("prepare select");
        let rows = stmt
            .query_map([], |row| {
                (0..columns.len())
                    .map(|idx| row.get::<_, String>(idx))
                    .collect::<Result<Vec<_>, _>>()
            })
            .expect("query rows")
            .collect::<Result<Vec<_>, _>>()
            .expect("read rows");
        rows
    }

    /// Log files written for `file_name`, oldest name first.
    pub fn logs_for(&self, file_name: &str) -> Vec<PathBuf> {
        let mut logs = fs::read_dir(self.log_dir())
            .map(|entries| {
                entries
                    .flatten()
                    .map(|entry| entry.path())
                    .filter(|path| {
                        path.file_name()
                            .and_then(|name| name.to_str())
                            .is_some_and(|name| name.starts_with(file_name))
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        logs.sort();
        logs
    }
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
