//! Destination table selection.
//!
//! In sharded mode the router walks forward through the configured table
//! names, moving to the next one when a batch would push the current table past
//! its row budget. It never goes back, and once it reaches the last name every
//! further batch lands there regardless of budget.

use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

use anyhow::{Result, ensure};
use log::info;

#[derive(Debug)]
pub enum TableRouter {
    Single(String),
    Sharded(ShardRouter),
}

impl TableRouter {
    pub fn single(table: impl Into<String>) -> Self {
        TableRouter::Single(table.into())
    }

    pub fn sharded(base: impl Into<String>, tables: Vec<String>, budget: u64) -> Result<Self> {
        Ok(TableRouter::Sharded(ShardRouter::new(base, tables, budget)?))
    }

    /// Table that receives a batch of `rows` records.
    pub fn route(&self, rows: usize) -> String {
        match self {
            TableRouter::Single(table) => table.clone(),
            TableRouter::Sharded(router) => router.route(rows as u64),
        }
    }

    pub fn is_sharded(&self) -> bool {
        matches!(self, TableRouter::Sharded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSnapshot {
    pub index: usize,
    pub counters: BTreeMap<(String, usize), u64>,
}

#[derive(Debug)]
pub struct ShardRouter {
    base: String,
    tables: Vec<String>,
    budget: u64,
    state: Mutex<ShardSnapshot>,
}

impl ShardRouter {
    pub fn new(base: impl Into<String>, tables: Vec<String>, budget: u64) -> Result<Self> {
        ensure!(!tables.is_empty(), "Sharded mode needs at least one table name");
        ensure!(budget > 0, "Sharded mode needs a positive per-table row budget");
        Ok(Self {
            base: base.into(),
            tables,
            budget,
            state: Mutex::new(ShardSnapshot {
                index: 0,
                counters: BTreeMap::new(),
            }),
        })
    }

    pub fn route(&self, rows: u64) -> String {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let current = state
            .counters
            .get(&(self.base.clone(), state.index))
            .copied()
            .unwrap_or(0);

        if current + rows > self.budget {
            let next = (state.index + 1).min(self.tables.len() - 1);
            if next != state.index {
                info!(
                    "Table {} reached {current} of {} rows; switching to {}",
                    self.tables[state.index], self.budget, self.tables[next]
                );
                state.index = next;
                state.counters.insert((self.base.clone(), next), 0);
            }
        }

        let index = state.index;
        *state.counters.entry((self.base.clone(), index)).or_insert(0) += rows;
        self.tables[index].clone()
    }

    pub fn snapshot(&self) -> ShardSnapshot {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
