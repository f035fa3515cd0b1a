use crate::encoder::FIXED_LABELS;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::Error,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, error, warn};

/// duplicate policies accepted by TS.ADD ON_DUPLICATE
pub const DUPLICATE_POLICIES: [&str; 6] = ["BLOCK", "FIRST", "LAST", "MIN", "MAX", "SUM"];

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Config file {0:?} not found")]
    FileNotFound(PathBuf),
    #[error("Failed to read config file")]
    ReadFailed(#[from] Error),
    #[error("Config file is invalid: {0}")]
    InvalidConfig(#[from] serde_yaml::Error),
    #[error("Preflight checks failed")]
    PreflightFailed,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatasinkConfig {
    // host:port of the RedisTimeSeries instance (or a redis:// url)
    #[serde(default = "default_endpoint", alias = "redistimeseries_endpoint")]
    pub endpoint: String,
    #[serde(default, alias = "redistimeseries_auth")]
    pub auth: Option<String>,

    // branch or commit the benchmark numbers belong to, required
    #[serde(default)]
    pub git_ref: Option<String>,
    // prefix for every key written, including the trailing separator
    #[serde(default = "default_key_suffix")]
    pub key_suffix: String,
    // falls back to `go env GOVERSION` if unset
    #[serde(default)]
    pub go_version: Option<String>,
    // extra labels for every series
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    #[serde(default)]
    pub on_duplicate: Option<String>,
    // abort on the first failed write instead of counting it
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

impl Default for DatasinkConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth: None,
            git_ref: None,
            key_suffix: default_key_suffix(),
            go_version: None,
            tags: BTreeMap::new(),
            on_duplicate: None,
            strict: false,
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }
}

impl DatasinkConfig {
    /// read a yaml config file, unset fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        if !path.is_file() {
            return Err(ConfigErrors::FileNotFound(path.to_path_buf()));
        }

        debug!("Loading config from {}", path.to_string_lossy());

        let file = File::open(path)?;

        match serde_yaml::from_reader(file) {
            Ok(config) => Ok(config),
            Err(error) => {
                error!(error = ?error, "Failed to deserialize config: {error}");

                Err(ConfigErrors::InvalidConfig(error))
            }
        }
    }

    /// the git ref, empty if none was given
    pub fn git_ref(&self) -> &str {
        self.git_ref.as_deref().unwrap_or_default()
    }

    /// Check and normalize the config.
    /// Reports every problem before giving up, returns whether any was found.
    pub fn preflight_checks(&mut self) -> bool {
        let mut contains_error = false;

        if self.git_ref().trim().is_empty() {
            error!("git-ref is required");
            contains_error = true;
        }

        if self.endpoint.trim().is_empty() {
            error!("redistimeseries-endpoint must not be empty");
            contains_error = true;
        }

        if self.key_suffix.is_empty() {
            warn!("key-suffix is empty, keys will start with the OS name");
        }

        if self.connection_timeout_ms == 0 {
            error!("connection-timeout-ms cannot be 0");
            contains_error = true;
        }

        // an empty override means "detect"
        if self
            .go_version
            .as_ref()
            .is_some_and(|version| version.trim().is_empty())
        {
            self.go_version = None;
        }

        if let Some(policy) = self.on_duplicate.as_mut() {
            *policy = policy.to_uppercase();

            if !DUPLICATE_POLICIES.contains(&policy.as_str()) {
                error!(
                    "on-duplicate ({policy}) is not supported, use one of {}",
                    DUPLICATE_POLICIES.join(", ")
                );
                contains_error = true;
            }
        }

        for name in self.tags.keys() {
            if FIXED_LABELS.contains(&name.as_str()) {
                warn!("Tag {name} is shadowed by the label of the same name and will be ignored");
            }
        }

        contains_error
    }
}

fn default_endpoint() -> String {
    "localhost:6379".to_string()
}

fn default_key_suffix() -> String {
    "go-bench-datasink:".to_string()
}

fn default_connection_timeout_ms() -> u64 {
    5000
}
