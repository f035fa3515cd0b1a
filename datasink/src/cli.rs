use crate::config::{ConfigErrors, DatasinkConfig};
use clap::{ArgAction, CommandFactory, Parser};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    path::PathBuf,
    str::FromStr,
};
use tracing_unwrap::ResultExt;

/// Store `go test -bench` output read from stdin in RedisTimeSeries
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Cli {
    /// comma-separated list of key=value pairs to add as labels to each series
    #[clap(long)]
    pub tag: Option<CliKeyValues>,
    /// RedisTimeSeries host:port into which the benchmark data should be inserted
    #[clap(long, env = "REDISTIMESERIES_ENDPOINT")]
    pub redistimeseries_endpoint: Option<String>,
    /// RedisTimeSeries password
    #[clap(long, env = "REDISTIMESERIES_AUTH", hide_env_values = true)]
    pub redistimeseries_auth: Option<String>,
    /// git ref the benchmarks ran against (branch is a good one)
    #[clap(long)]
    pub git_ref: Option<String>,
    /// prefix of every key written [default: go-bench-datasink:]
    #[clap(long)]
    pub key_suffix: Option<String>,
    /// be verbose
    #[clap(short, long)]
    pub verbose: bool,
    /// yaml config file, flags take precedence over its values
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Go toolchain version for keys and labels, detected with `go env` if unset
    #[clap(long)]
    pub go_version: Option<String>,
    /// sample timestamp in milliseconds since the epoch [default: now]
    #[clap(long)]
    pub timestamp: Option<i64>,
    /// duplicate policy for samples at an existing timestamp, e.g. LAST
    #[clap(long)]
    pub on_duplicate: Option<String>,
    /// abort on the first failed write
    #[clap(long)]
    pub strict: bool,
    /// parse and encode as usual, but keep all writes in memory
    #[clap(long)]
    pub dry_run: bool,
    /// maximum time to wait for a connection to RedisTimeSeries
    #[clap(long)]
    pub connection_timeout_ms: Option<u64>,
}

impl Cli {
    /// parse the process arguments, accepting single dash long flags
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_args(std::env::args()))
    }

    /// Build the effective config: defaults, then the config file, then flags
    pub fn config(&self) -> Result<DatasinkConfig, ConfigErrors> {
        let mut config = match &self.config {
            Some(path) => DatasinkConfig::load(path)?,
            None => DatasinkConfig::default(),
        };

        if let Some(endpoint) = &self.redistimeseries_endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(auth) = &self.redistimeseries_auth {
            config.auth = Some(auth.clone());
        }
        if let Some(git_ref) = &self.git_ref {
            config.git_ref = Some(git_ref.clone());
        }
        if let Some(key_suffix) = &self.key_suffix {
            config.key_suffix = key_suffix.clone();
        }
        if let Some(go_version) = &self.go_version {
            config.go_version = Some(go_version.clone());
        }
        if let Some(policy) = &self.on_duplicate {
            config.on_duplicate = Some(policy.clone());
        }
        if let Some(timeout) = self.connection_timeout_ms {
            config.connection_timeout_ms = timeout;
        }
        if let Some(tags) = &self.tag {
            config.tags.extend(tags.inner.clone());
        }
        config.strict |= self.strict;

        Ok(config)
    }
}

/// Rewrite `-flag` and `-flag=value` spellings of long flags to `--flag`.
/// Switches given as `-v=true` or `--strict=false` become the bare flag or
/// are dropped. Short flags and positional values are left alone, as is
/// everything after `--`.
pub fn normalize_args<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    let mut command = Cli::command();
    // adds the generated help and version flags
    command.build();

    let long_flags: Vec<&str> = command
        .get_arguments()
        .filter_map(|argument| argument.get_long())
        .collect();
    let switches: Vec<(Option<char>, &str)> = command
        .get_arguments()
        .filter(|argument| matches!(argument.get_action(), ArgAction::SetTrue))
        .filter_map(|argument| Some((argument.get_short(), argument.get_long()?)))
        .collect();

    let mut normalized = Vec::new();
    let mut terminated = false;

    for arg in args {
        if arg == "--" {
            terminated = true;
        }

        if terminated {
            normalized.push(arg);
            continue;
        }

        let is_single_dash_long = arg.starts_with('-')
            && !arg.starts_with("--")
            && long_flags.contains(&arg[1..].split('=').next().unwrap_or_default());

        let arg = if is_single_dash_long {
            format!("-{arg}")
        } else {
            arg
        };

        match switch_value(&arg, &switches) {
            Some((long, true)) => normalized.push(format!("--{long}")),
            Some((_, false)) => {}
            None => normalized.push(arg),
        }
    }

    normalized
}

/// `--flag=<bool>` or `-f=<bool>` for a switch, with the bool spellings Go accepts
fn switch_value<'a>(
    arg: &str,
    switches: &[(Option<char>, &'a str)],
) -> Option<(&'a str, bool)> {
    let (flag, value) = arg.split_once('=')?;
    let enabled = match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => true,
        "0" | "f" | "F" | "false" | "FALSE" | "False" => false,
        _ => return None,
    };

    let &(_, long) = match flag.strip_prefix("--") {
        Some(name) => switches.iter().find(|(_, long)| *long == name)?,
        None => {
            let mut short = flag.strip_prefix('-')?.chars();
            let name = short.next()?;
            if short.next().is_some() {
                return None;
            }

            switches.iter().find(|(switch, _)| *switch == Some(name))?
        }
    };

    Some((long, enabled))
}

/// `KEY=VAL,KEY2=VAL` pairs given on the command line
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct CliKeyValues {
    pub inner: BTreeMap<String, String>,
}

impl CliKeyValues {
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(|s| s.as_str())
    }
}

impl Display for CliKeyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        for (k, v) in self.inner.iter() {
            write!(f, "{k}={v},")?;
        }
        Ok(())
    }
}

impl FromStr for CliKeyValues {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        // ',' may appear inside a value, so pairs are found by their keys:
        // a `key=` at the start or right after a ',' starts a pair and the
        // value runs up to the next such key
        static RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?:^|,)([[:alpha:]_][[:alnum:]_.-]*)=")
                .expect_or_log("Invalid tag pattern")
        });

        if input.trim().is_empty() {
            return Ok(Self::default());
        }

        match RE.find(input) {
            Some(first) if first.start() == 0 => {}
            _ => return Err(format!("{input:?} does not start with a key=value pair")),
        }

        let mut labels = BTreeMap::new();

        for cap in RE.captures_iter(input) {
            let key = cap[1].to_string();
            let start = match cap.get(0) {
                Some(whole) => whole.end(),
                None => continue,
            };

            let end = RE.find_at(input, start).map_or(input.len(), |m| m.start());
            let value = input[start..end].trim_end_matches(',').to_string();

            labels.insert(key, value);
        }

        Ok(Self { inner: labels })
    }
}
