//! Per-file orchestration: checkpoint recovery, the producer/worker run for
//! one file, and the walk over an input directory.
//!
//! Files are loaded one at a time in path order. A file whose rows cannot be
//! read stops the run; batches already inserted for it stay inserted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use log::{debug, info, warn};

use crate::{
    assembler::{AssemblyReport, BatchAssembler, ProcessState},
    checkpoint::{self, ProgressLog},
    config::TaskConfig,
    io_utils::{self, FileFormat},
    mapping::ColumnMapping,
    pool::{PoolReport, WorkerPool},
    router::TableRouter,
    source::{RowSource, SourceOptions},
    store::Store,
    writer::IngestionWriter,
};

#[derive(Debug, Clone)]
pub struct FileSummary {
    pub path: PathBuf,
    pub format: FileFormat,
    pub resume_from: usize,
    pub progress_log: PathBuf,
    pub assembly: AssemblyReport,
    pub inserts: PoolReport,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files: Vec<FileSummary>,
    pub skipped: Vec<PathBuf>,
}

impl RunSummary {
    pub fn rows_inserted(&self) -> usize {
        self.files.iter().map(|f| f.inserts.rows_inserted).sum()
    }

    pub fn rows_dropped(&self) -> usize {
        self.files.iter().map(|f| f.inserts.rows_dropped).sum()
    }

    pub fn batches_failed(&self) -> usize {
        self.files.iter().map(|f| f.inserts.batches_failed).sum()
    }
}

pub struct Loader {
    task: TaskConfig,
    store: Box<dyn Store>,
    router: TableRouter,
    mapping: ColumnMapping,
    columns: Vec<String>,
    options: SourceOptions,
    log_dir: PathBuf,
}

impl Loader {
    pub fn new(task: TaskConfig, store: Box<dyn Store>, log_dir: impl Into<PathBuf>) -> Result<Self> {
        task.validate()?;
        let mapping = task.mapping()?;
        let columns = mapping.columns();
        let router = task.router()?;
        let options = task.source_options()?;
        Ok(Self {
            task,
            store,
            router,
            mapping,
            columns,
            options,
            log_dir: log_dir.into(),
        })
    }

    pub fn router(&self) -> &TableRouter {
        &self.router
    }

    /// Creates every destination table when the task asks for it.
    pub fn prepare_tables(&self) -> Result<()> {
        if !self.task.create_tables {
            return Ok(());
        }
        for table in self.task.destination_tables() {
            self.store
                .ensure_table(&table, &self.columns)
                .with_context(|| format!("Creating table {table}"))?;
            debug!("Ensured table {table}");
        }
        Ok(())
    }

    /// Loads a single file, or every supported file below a directory.
    pub fn load_path(&self, path: &Path) -> Result<RunSummary> {
        if !path.exists() {
            bail!("Input path {path:?} does not exist");
        }
        let files = if path.is_dir() {
            discover_files(path)?
        } else {
            vec![path.to_path_buf()]
        };

        let mut summary = RunSummary::default();
        for file in files {
            let Some(format) = FileFormat::from_path(&file) else {
                info!("Skipping {file:?}: unsupported file type");
                summary.skipped.push(file);
                continue;
            };
            let file_summary = self
                .load_file(&file, format)
                .with_context(|| format!("Loading {file:?}"))?;
            summary.files.push(file_summary);
        }
        Ok(summary)
    }

    pub fn load_file(&self, path: &Path, format: FileFormat) -> Result<FileSummary> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("{path:?} has no file name"))?;

        // A file that cannot be opened must not leave an empty log behind; it
        // would shadow the previous run's checkpoint.
        let mut source = RowSource::open(path, format, &self.options)?;
        let log = ProgressLog::create(&self.log_dir, &file_name, Local::now())?;
        let progress_log = log.path().to_path_buf();
        let begin_line = self.task.begin_line(format);
        let recovered = checkpoint::last_processed_line(&self.log_dir, &file_name, Some(log.path()));
        let resume_from = begin_line.max(recovered);
        info!(
            "Loading {} ({format}, delimiter '{}'): begin line {begin_line}, checkpoint {recovered}, resuming after row {resume_from}",
            path.display(),
            io_utils::printable_delimiter(&self.options.delimiter)
        );

        let state = ProcessState::new(file_name, resume_from, log);
        let writer = IngestionWriter::new(self.store.as_ref(), &self.columns);
        let pool = WorkerPool::new(&self.router, &writer);
        let assembler = BatchAssembler::new(&self.mapping, self.task.batch_size);

        let outcome = pool.run(&state, |queue| {
            assembler.run(&mut source, resume_from, &state, |batch| queue.send(batch))
        });
        let (assembly, inserts) = match outcome {
            Ok(reports) => reports,
            Err(err) => {
                if let Err(log_err) = state.keep_checkpoint(resume_from) {
                    warn!("Cannot carry checkpoint for {}: {log_err:#}", path.display());
                }
                return Err(err);
            }
        };

        info!(
            "Finished {}: {} row(s) read, {} inserted, {} dropped in {} failed batch(es), now at line {}",
            path.display(),
            assembly.rows_read,
            inserts.rows_inserted,
            inserts.rows_dropped,
            inserts.batches_failed,
            assembly.final_line
        );
        Ok(FileSummary {
            path: path.to_path_buf(),
            format,
            resume_from,
            progress_log,
            assembly,
            inserts,
        })
    }
}

/// Every regular file below `root`, sorted by path.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>> {
    let root_str = root
        .to_str()
        .ok_or_else(|| anyhow!("Input directory {root:?} is not valid UTF-8"))?;
    let pattern = Path::new(&glob::Pattern::escape(root_str))
        .join("**")
        .join("*");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow!("Input directory {root:?} is not valid UTF-8"))?;
    let mut files = Vec::new();
    for entry in glob::glob(pattern).with_context(|| format!("Scanning {root:?}"))? {
        let path = entry.with_context(|| format!("Scanning {root:?}"))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
