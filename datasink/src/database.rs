pub mod memory;
pub mod redis;


use crate::config::DatasinkConfig;
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

/// label name -> label value, ordered so that every write renders identically
pub type Labels = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("RedisTimeSeries error: {0}")]
    Redis(::redis::RedisError),
    #[error("Failed to acquire a pooled connection: {0}")]
    Pool(r2d2::Error),
    #[error("Invalid connection config: {0}")]
    ConfigError(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// The three writes issued per benchmark record, in the order they are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    CreateSeries,
    AddSample,
    AddBenchmarkName,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateSeries => "create series",
            Self::AddSample => "add sample",
            Self::AddBenchmarkName => "add benchmark name",
        })
    }
}

/// All storage backends.
/// Dispatch is done over the enum, the set of adapters is closed.
#[derive(Debug)]
pub enum StorageAdapters {
    RedisTimeSeries(redis::RedisTimeSeries),
    Memory(memory::MemoryStore),
}

impl StorageAdapters {
    pub fn load(config: &DatasinkConfig, dry_run: bool) -> Result<Self, ConnectionError> {
        if dry_run {
            Ok(Self::Memory(memory::MemoryStore::new()))
        } else {
            redis::RedisTimeSeries::load(config).map(Self::RedisTimeSeries)
        }
    }

    /// create the series at `key`, or replace its labels if it already exists
    pub fn create_series(&mut self, key: &str, labels: &Labels) -> Result<(), ConnectionError> {
        match self {
            Self::RedisTimeSeries(store) => store.create_series(key, labels),
            Self::Memory(store) => store.create_series(key, labels),
        }
    }

    /// append a single sample to the series at `key`
    pub fn add_sample(
        &mut self,
        key: &str,
        timestamp: i64,
        value: f64,
    ) -> Result<(), ConnectionError> {
        match self {
            Self::RedisTimeSeries(store) => store.add_sample(key, timestamp, value),
            Self::Memory(store) => store.add_sample(key, timestamp, value),
        }
    }

    /// record `name` in the set at `key`
    pub fn add_benchmark_name(&mut self, key: &str, name: &str) -> Result<(), ConnectionError> {
        match self {
            Self::RedisTimeSeries(store) => store.add_benchmark_name(key, name),
            Self::Memory(store) => store.add_benchmark_name(key, name),
        }
    }
}
