use crate::{
    database::StorageAdapters,
    encoder::{Encoded, MetricEncoder, StoreFailure},
    report::ScanReport,
};
use go_bench_ingest::Benchmark;
use std::{borrow::Cow, io::BufRead};
use thiserror::Error;
use tracing::{debug, trace};

const PKG_PREFIX: &str = "pkg:";
const GOOS_PREFIX: &str = "goos:";
const GOARCH_PREFIX: &str = "goarch:";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read benchmark output: {0}")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
/// everything known about the benchmarks currently being read
/// package, goos and goarch follow the metadata lines of the input, the rest is
/// fixed for the whole run
pub struct RunMetadata {
    pub package: String,
    pub goos: String,
    pub goarch: String,
    pub go_version: String,
    pub git_ref: String,
    /// milliseconds since the unix epoch, shared by every sample of the run
    pub timestamp: i64,
}

impl RunMetadata {
    pub fn new(go_version: impl Into<String>, git_ref: impl Into<String>, timestamp: i64) -> Self {
        Self {
            go_version: go_version.into(),
            git_ref: git_ref.into(),
            timestamp,
            ..Default::default()
        }
    }
}

/// Classification of a single line of `go test -bench` output
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Package(String),
    Os(String),
    Arch(String),
    Benchmark(Benchmark),
    Ignored,
}

impl Line {
    pub fn classify(line: &str) -> Self {
        if let Some(package) = line.strip_prefix(PKG_PREFIX) {
            Self::Package(package.trim().to_string())
        } else if let Some(os) = line.strip_prefix(GOOS_PREFIX) {
            Self::Os(os.trim().to_string())
        } else if let Some(arch) = line.strip_prefix(GOARCH_PREFIX) {
            Self::Arch(arch.trim().to_string())
        } else {
            match Benchmark::parse_line(line) {
                Ok(benchmark) => Self::Benchmark(benchmark),
                Err(error) => {
                    trace!(line, "Not a benchmark line: {error}");

                    Self::Ignored
                }
            }
        }
    }
}

/// Drives the encoder over a stream of benchmark output
#[derive(Debug)]
pub struct Scanner<'a> {
    pub metadata: RunMetadata,
    pub report: ScanReport,
    encoder: &'a MetricEncoder,
    store: &'a mut StorageAdapters,
}

impl<'a> Scanner<'a> {
    pub fn new(
        metadata: RunMetadata,
        encoder: &'a MetricEncoder,
        store: &'a mut StorageAdapters,
    ) -> Self {
        Self {
            metadata,
            report: ScanReport::default(),
            encoder,
            store,
        }
    }

    /// handle one line of input, only fails on a write error in strict mode
    pub fn process_line(&mut self, line: &str) -> Result<(), StoreFailure> {
        self.report.lines += 1;

        match Line::classify(line) {
            Line::Package(package) => {
                self.report.metadata_lines += 1;
                self.metadata.package = package;
            }
            Line::Os(os) => {
                self.report.metadata_lines += 1;
                self.metadata.goos = os;
            }
            Line::Arch(arch) => {
                self.report.metadata_lines += 1;
                self.metadata.goarch = arch;
            }
            Line::Benchmark(benchmark) => {
                self.report.benchmarks += 1;

                match self.encoder.encode(&mut *self.store, &benchmark, &self.metadata)? {
                    Encoded::MissingNsPerOp => self.report.missing_ns_per_op += 1,
                    Encoded::Written { failures, .. } => {
                        self.report.encoded += 1;
                        self.report.failed_writes += failures.len() as u64;
                    }
                }
            }
            Line::Ignored => self.report.ignored_lines += 1,
        }

        Ok(())
    }

    /// Read `reader` to the end, one line at a time.
    ///
    /// Lines are split on `\n` with a single trailing `\r` removed, invalid
    /// UTF-8 is replaced instead of failing the line.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run<R: BufRead>(&mut self, mut reader: R) -> Result<(), IngestError> {
        let mut buffer = Vec::new();

        loop {
            buffer.clear();

            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }

            let line = frame_line(&buffer);
            self.process_line(&line)?;
        }

        debug!(lines = self.report.lines, "Reached end of input");

        Ok(())
    }
}

fn frame_line(buffer: &[u8]) -> Cow<'_, str> {
    let line = buffer.strip_suffix(b"\n").unwrap_or(buffer);
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    String::from_utf8_lossy(line)
}
