use crate::{
    config::DatasinkConfig,
    database::{ConnectionError, Labels, StorageAdapters, StoreOperation},
    ingest::RunMetadata,
};
use go_bench_ingest::{Benchmark, Measured};
use itertools::Itertools;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

pub const FIELD_NAME: &str = "name";
pub const FIELD_PKG: &str = "pkg";
pub const FIELD_GO_VERSION: &str = "go_version";
pub const FIELD_GOOS: &str = "goos";
pub const FIELD_GOARCH: &str = "goarch";
pub const FIELD_GIT_REF: &str = "git_ref";
pub const FIELD_MEASUREMENT: &str = "measurement";

/// metric token of the series key and value of the `measurement` label
pub const NS_PER_OP: &str = "ns_per_op";

/// labels every series carries, these take precedence over user tags
pub const FIXED_LABELS: [&str; 7] = [
    FIELD_NAME,
    FIELD_PKG,
    FIELD_GO_VERSION,
    FIELD_GOOS,
    FIELD_GOARCH,
    FIELD_GIT_REF,
    FIELD_MEASUREMENT,
];

#[derive(Error, Debug)]
#[error("Failed to {operation} for {key}: {error}")]
pub struct StoreFailure {
    pub operation: StoreOperation,
    pub key: String,
    pub error: ConnectionError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// attempt every write and report failures afterwards
    #[default]
    BestEffort,
    /// stop at the first failed write
    Strict,
}

/// What happened to a single benchmark record
#[derive(Debug)]
pub enum Encoded {
    /// the record carried no ns/op value, nothing was written
    MissingNsPerOp,
    Written {
        key: String,
        failures: Vec<StoreFailure>,
    },
}

/// `{suffix}{goos}:{goarch}:{go_version}:{pkg}:{name}:{git_ref}:ns_per_op`
///
/// Input lines are decoded lossily, so a name or package holding invalid
/// UTF-8 shows up here with U+FFFD in place of the raw bytes.
pub fn series_key(key_suffix: &str, metadata: &RunMetadata, name: &str) -> String {
    format!(
        "{key_suffix}{}:{}:{}:{}:{name}:{}:{NS_PER_OP}",
        metadata.goos, metadata.goarch, metadata.go_version, metadata.package, metadata.git_ref
    )
}

/// key of the set holding every benchmark name seen for a package
pub fn benchmark_set_key(key_suffix: &str, package: &str) -> String {
    format!("{key_suffix}{package}:benchmarks")
}

/// Label set of a series, user tags first so the fixed labels win on conflict
pub fn labels(metadata: &RunMetadata, name: &str, tags: &BTreeMap<String, String>) -> Labels {
    let mut labels = tags.clone();

    for (field, value) in [
        (FIELD_NAME, name),
        (FIELD_PKG, metadata.package.as_str()),
        (FIELD_GO_VERSION, metadata.go_version.as_str()),
        (FIELD_GOOS, metadata.goos.as_str()),
        (FIELD_GOARCH, metadata.goarch.as_str()),
        (FIELD_GIT_REF, metadata.git_ref.as_str()),
        (FIELD_MEASUREMENT, NS_PER_OP),
    ] {
        labels.insert(field.to_string(), value.to_string());
    }

    labels
}

#[derive(Debug, Clone)]
pub struct MetricEncoder {
    key_suffix: String,
    tags: BTreeMap<String, String>,
    mode: WriteMode,
}

impl MetricEncoder {
    pub fn new(
        key_suffix: impl Into<String>,
        tags: BTreeMap<String, String>,
        mode: WriteMode,
    ) -> Self {
        Self {
            key_suffix: key_suffix.into(),
            tags,
            mode,
        }
    }

    pub fn load(config: &DatasinkConfig) -> Self {
        Self::new(
            config.key_suffix.clone(),
            config.tags.clone(),
            if config.strict {
                WriteMode::Strict
            } else {
                WriteMode::BestEffort
            },
        )
    }

    /// Write the ns/op value of `benchmark` as one sample.
    ///
    /// Issues, in order, create-or-update of the series, the sample itself and
    /// the addition of the name to the package's benchmark set. In
    /// [`WriteMode::Strict`] the first failure is returned as error, otherwise
    /// all three writes are attempted and failures are reported in the result.
    #[tracing::instrument(level = "debug", skip_all, fields(benchmark = %benchmark.name))]
    pub fn encode(
        &self,
        store: &mut StorageAdapters,
        benchmark: &Benchmark,
        metadata: &RunMetadata,
    ) -> Result<Encoded, StoreFailure> {
        if !benchmark.measured.contains(Measured::NS_PER_OP) {
            debug!("No ns/op measured, skipping");

            return Ok(Encoded::MissingNsPerOp);
        }

        let key = series_key(&self.key_suffix, metadata, &benchmark.name);
        let set_key = benchmark_set_key(&self.key_suffix, &metadata.package);
        let labels = labels(metadata, &benchmark.name, &self.tags);

        debug!(
            timestamp = metadata.timestamp,
            labels = %labels.iter().map(|(name, value)| format!("{name}:{value}")).join(" "),
            "Encoding {key}"
        );

        let mut failures = Vec::new();

        self.record(
            StoreOperation::CreateSeries,
            &key,
            store.create_series(&key, &labels),
            &mut failures,
        )?;
        self.record(
            StoreOperation::AddSample,
            &key,
            store.add_sample(&key, metadata.timestamp, benchmark.ns_per_op),
            &mut failures,
        )?;
        self.record(
            StoreOperation::AddBenchmarkName,
            &set_key,
            store.add_benchmark_name(&set_key, &benchmark.name),
            &mut failures,
        )?;

        Ok(Encoded::Written { key, failures })
    }

    fn record(
        &self,
        operation: StoreOperation,
        key: &str,
        result: Result<(), ConnectionError>,
        failures: &mut Vec<StoreFailure>,
    ) -> Result<(), StoreFailure> {
        if let Err(error) = result {
            let failure = StoreFailure {
                operation,
                key: key.to_string(),
                error,
            };

            if self.mode == WriteMode::Strict {
                return Err(failure);
            }

            warn!("{failure}");
            failures.push(failure);
        }

        Ok(())
    }
}
