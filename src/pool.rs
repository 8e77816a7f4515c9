//! Fixed-size worker pool draining a bounded batch queue.
//!
//! The queue holds as many batches as there are workers, so the producer
//! blocks once every worker is busy and the buffer is full. A batch whose
//! insert fails is logged and dropped; the worker moves on to the next one.

use std::{
    sync::{
        Mutex, PoisonError,
        mpsc::{self, Receiver, SyncSender},
    },
    thread,
};

use anyhow::{Context, Result, anyhow};
use log::{debug, error};

use crate::{
    assembler::ProcessState, mapping::Batch, router::TableRouter, writer::IngestionWriter,
};

pub const SINGLE_TABLE_WORKERS: usize = 4;
pub const SHARDED_WORKERS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub batches_inserted: usize,
    pub rows_inserted: usize,
    pub batches_failed: usize,
    pub rows_dropped: usize,
}

impl PoolReport {
    fn merge(&mut self, other: PoolReport) {
        self.batches_inserted += other.batches_inserted;
        self.rows_inserted += other.rows_inserted;
        self.batches_failed += other.batches_failed;
        self.rows_dropped += other.rows_dropped;
    }
}

pub struct WorkerPool<'a> {
    workers: usize,
    router: &'a TableRouter,
    writer: &'a IngestionWriter<'a>,
}

impl<'a> WorkerPool<'a> {
    /// Four workers for a single table, ten when sharding.
    pub fn new(router: &'a TableRouter, writer: &'a IngestionWriter<'a>) -> Self {
        let workers = if router.is_sharded() {
            SHARDED_WORKERS
        } else {
            SINGLE_TABLE_WORKERS
        };
        Self::with_workers(workers, router, writer)
    }

    pub fn with_workers(
        workers: usize,
        router: &'a TableRouter,
        writer: &'a IngestionWriter<'a>,
    ) -> Self {
        Self {
            workers: workers.max(1),
            router,
            writer,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Starts the workers, runs `produce` on the calling thread with the
    /// queue's sending side, then closes the queue and waits for every worker
    /// to drain it and exit.
    pub fn run<T, P>(&self, state: &ProcessState, produce: P) -> Result<(T, PoolReport)>
    where
        P: FnOnce(&BatchQueue) -> Result<T>,
    {
        let (tx, rx) = mpsc::sync_channel::<Batch>(self.workers);
        let rx = Mutex::new(rx);

        thread::scope(|scope| {
            let queue = BatchQueue { tx };
            let mut handles = Vec::with_capacity(self.workers);
            for id in 0..self.workers {
                let rx = &rx;
                let handle = thread::Builder::new()
                    .name(format!("tabload-worker-{id}"))
                    .spawn_scoped(scope, move || self.work(id, rx, state))
                    .context("Failed to spawn insert worker")?;
                handles.push(handle);
            }

            let produced = produce(&queue);
            drop(queue);

            let mut report = PoolReport::default();
            let mut panicked = 0usize;
            for handle in handles {
                match handle.join() {
                    Ok(worker_report) => report.merge(worker_report),
                    Err(_) => panicked += 1,
                }
            }
            let value = produced?;
            if panicked > 0 {
                return Err(anyhow!("{panicked} insert worker(s) panicked"));
            }
            Ok((value, report))
        })
    }

    fn work(&self, id: usize, rx: &Mutex<Receiver<Batch>>, state: &ProcessState) -> PoolReport {
        let mut report = PoolReport::default();
        loop {
            let next = rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
            let Ok(batch) = next else {
                break;
            };
            let table = self.router.route(batch.len());
            match self.writer.write(&table, &batch) {
                Ok(rows) => {
                    debug!("worker {id}: {rows} row(s) into {table}");
                    report.batches_inserted += 1;
                    report.rows_inserted += rows;
                }
                Err(err) => {
                    error!(
                        "worker {id}: dropping batch of {} row(s) for {table}: {err}",
                        batch.len()
                    );
                    state.log_failure(&table, &err);
                    report.batches_failed += 1;
                    report.rows_dropped += batch.len();
                }
            }
        }
        report
    }
}

/// Sending side of the batch queue handed to the producer.
pub struct BatchQueue {
    tx: SyncSender<Batch>,
}

impl BatchQueue {
    /// Blocks while the queue is full.
    pub fn send(&self, batch: Batch) -> Result<()> {
        self.tx
            .send(batch)
            .map_err(|_| anyhow!("All insert workers have exited"))
    }
}
