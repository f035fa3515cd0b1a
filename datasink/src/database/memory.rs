use super::{ConnectionError, Labels};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// A single write as it reached the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    CreateSeries { key: String, labels: Labels },
    AddSample { key: String, timestamp: i64, value: f64 },
    AddBenchmarkName { key: String, name: String },
}

/// renders the call as the redis command it stands in for
impl fmt::Display for StoreCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateSeries { key, labels } => {
                write!(f, "TS.CREATE {key} LABELS")?;
                for (name, value) in labels {
                    write!(f, " {name} {value}")?;
                }

                Ok(())
            }
            Self::AddSample {
                key,
                timestamp,
                value,
            } => write!(f, "TS.ADD {key} {timestamp} {value}"),
            Self::AddBenchmarkName { key, name } => write!(f, "SADD {key} {name}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub labels: Labels,
    pub samples: BTreeMap<i64, f64>,
}

/// In-process stand-in for RedisTimeSeries.
/// Keeps every call in order next to the resulting state, used for dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub calls: Vec<StoreCall>,
    pub series: BTreeMap<String, Series>,
    pub sets: BTreeMap<String, BTreeSet<String>>,
    // writes to these keys fail, lets callers exercise error paths
    failing: BTreeSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// every write touching `key` will fail from now on
    #[cfg(test)]
    pub fn fail_key(&mut self, key: impl Into<String>) {
        self.failing.insert(key.into());
    }

    fn check(&self, key: &str) -> Result<(), ConnectionError> {
        if self.failing.contains(key) {
            Err(ConnectionError::Unavailable(format!(
                "writes to {key} are configured to fail"
            )))
        } else {
            Ok(())
        }
    }

    pub fn create_series(&mut self, key: &str, labels: &Labels) -> Result<(), ConnectionError> {
        self.calls.push(StoreCall::CreateSeries {
            key: key.to_string(),
            labels: labels.clone(),
        });
        self.check(key)?;

        self.series.entry(key.to_string()).or_default().labels = labels.clone();

        Ok(())
    }

    pub fn add_sample(
        &mut self,
        key: &str,
        timestamp: i64,
        value: f64,
    ) -> Result<(), ConnectionError> {
        self.calls.push(StoreCall::AddSample {
            key: key.to_string(),
            timestamp,
            value,
        });
        self.check(key)?;

        // same as TS.ADD with ON_DUPLICATE LAST
        self.series
            .entry(key.to_string())
            .or_default()
            .samples
            .insert(timestamp, value);

        Ok(())
    }

    pub fn add_benchmark_name(&mut self, key: &str, name: &str) -> Result<(), ConnectionError> {
        self.calls.push(StoreCall::AddBenchmarkName {
            key: key.to_string(),
            name: name.to_string(),
        });
        self.check(key)?;

        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(name.to_string());

        Ok(())
    }
}
