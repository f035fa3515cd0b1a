//! Reader for the text format `go test -bench` prints for every finished
//! benchmark, e.g.
//!
//! ```text
//! BenchmarkDecode-8   	  500000	      2405 ns/op	  54.42 MB/s	     416 B/op	       7 allocs/op
//! ```
//!
//! Only single result lines are handled here. Everything else `go test` prints
//! (`pkg:` headers, `PASS`, `ok ...`) is left to the caller.

use bitflags::bitflags;
use std::{fmt, str::FromStr};
use thiserror::Error;

bitflags! {
    /// set of metrics a benchmark line actually reported
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Measured: u8 {
        const NS_PER_OP = 1 << 0;
        const MB_PER_S = 1 << 1;
        const ALLOCATED_BYTES_PER_OP = 1 << 2;
        const ALLOCS_PER_OP = 1 << 3;
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("two fields required, have {0}")]
    TooFewFields(usize),
    #[error("first field does not start with \"Benchmark\"")]
    NotABenchmark,
    #[error("iteration count {0:?} is not an integer")]
    Iterations(String),
}

/// A single parsed benchmark result
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Benchmark {
    /// full benchmark name, including the `-GOMAXPROCS` suffix
    pub name: String,
    /// number of iterations
    pub n: i64,
    pub ns_per_op: f64,
    pub mb_per_s: f64,
    pub allocated_bytes_per_op: u64,
    pub allocs_per_op: u64,
    /// which of the metrics above were present on the line
    pub measured: Measured,
}

impl Benchmark {
    /// Parse a single line of benchmark output.
    ///
    /// The first two fields (name and iteration count) are mandatory. All
    /// remaining fields are read as `value unit` pairs; unknown units and
    /// values that fail to parse are skipped without failing the line.
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.len() < 2 {
            return Err(ParseError::TooFewFields(fields.len()));
        }
        if !fields[0].starts_with("Benchmark") {
            return Err(ParseError::NotABenchmark);
        }

        let n = fields[1]
            .parse::<i64>()
            .map_err(|_| ParseError::Iterations(fields[1].to_string()))?;

        let mut benchmark = Self {
            name: fields[0].to_string(),
            n,
            ..Default::default()
        };

        // a trailing value without a unit is dropped
        for pair in fields[2..].chunks_exact(2) {
            benchmark.parse_measurement(pair[0], pair[1]);
        }

        Ok(benchmark)
    }

    fn parse_measurement(&mut self, quantity: &str, unit: &str) {
        match unit {
            "ns/op" => {
                if let Ok(value) = quantity.parse::<f64>() {
                    self.ns_per_op = value;
                    self.measured |= Measured::NS_PER_OP;
                }
            }
            "MB/s" => {
                if let Ok(value) = quantity.parse::<f64>() {
                    self.mb_per_s = value;
                    self.measured |= Measured::MB_PER_S;
                }
            }
            "B/op" => {
                if let Some(value) = parse_unsigned(quantity) {
                    self.allocated_bytes_per_op = value;
                    self.measured |= Measured::ALLOCATED_BYTES_PER_OP;
                }
            }
            "allocs/op" => {
                if let Some(value) = parse_unsigned(quantity) {
                    self.allocs_per_op = value;
                    self.measured |= Measured::ALLOCS_PER_OP;
                }
            }
            _ => {}
        }
    }
}

// `u64::from_str` tolerates a leading '+', go's output never contains one
fn parse_unsigned(quantity: &str) -> Option<u64> {
    if quantity.starts_with('+') {
        None
    } else {
        quantity.parse().ok()
    }
}

impl FromStr for Benchmark {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Self::parse_line(line)
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.n)?;

        if self.measured.contains(Measured::NS_PER_OP) {
            write!(f, " {:.2} ns/op", self.ns_per_op)?;
        }
        if self.measured.contains(Measured::MB_PER_S) {
            write!(f, " {:.2} MB/s", self.mb_per_s)?;
        }
        if self.measured.contains(Measured::ALLOCATED_BYTES_PER_OP) {
            write!(f, " {} B/op", self.allocated_bytes_per_op)?;
        }
        if self.measured.contains(Measured::ALLOCS_PER_OP) {
            write!(f, " {} allocs/op", self.allocs_per_op)?;
        }

        Ok(())
    }
}
