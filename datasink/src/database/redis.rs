use super::{ConnectionError, Labels};
use crate::config::DatasinkConfig;
use ::redis::{cmd, Client, Cmd, IntoConnectionInfo, RedisError};
use r2d2::{Pool, PooledConnection};
use std::{fmt, time::Duration};
use tracing::{debug, trace};

// RedisTimeSeries reply for TS.CREATE on an existing key
const KEY_EXISTS: &str = "key already exists";

impl From<RedisError> for ConnectionError {
    fn from(error: RedisError) -> Self {
        ConnectionError::Redis(error)
    }
}

impl From<r2d2::Error> for ConnectionError {
    fn from(error: r2d2::Error) -> Self {
        ConnectionError::Pool(error)
    }
}

/// RedisTimeSeries adapter over a lazily connecting connection pool
pub struct RedisTimeSeries {
    pool: Pool<Client>,
    on_duplicate: Option<String>,
}

impl fmt::Debug for RedisTimeSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisTimeSeries")
            .field("state", &self.pool.state())
            .field("on_duplicate", &self.on_duplicate)
            .finish()
    }
}

/// turn `host:port` (or a full `redis://` url) into a url the client understands
pub fn endpoint_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("redis://{endpoint}/")
    }
}

impl RedisTimeSeries {
    pub fn load(config: &DatasinkConfig) -> Result<Self, ConnectionError> {
        let mut info = endpoint_url(&config.endpoint)
            .as_str()
            .into_connection_info()
            .map_err(|error| {
                ConnectionError::ConfigError(format!(
                    "endpoint {:?} is not valid: {error}",
                    config.endpoint
                ))
            })?;

        if let Some(auth) = config.auth.as_ref().filter(|auth| !auth.is_empty()) {
            info.redis.password = Some(auth.clone());
        }

        debug!(endpoint = %config.endpoint, "Connecting to RedisTimeSeries");

        let client = Client::open(info)?;
        // connections are only dialed once the first write needs one
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build_unchecked(client);

        Ok(Self {
            pool,
            on_duplicate: config.on_duplicate.clone(),
        })
    }

    fn connection(&self) -> Result<PooledConnection<Client>, ConnectionError> {
        Ok(self.pool.get()?)
    }

    pub fn create_series(&mut self, key: &str, labels: &Labels) -> Result<(), ConnectionError> {
        let mut connection = self.connection()?;

        match create_command(key, labels).query::<()>(&mut *connection) {
            Ok(()) => {
                trace!(key, "Created series");

                Ok(())
            }
            Err(error) if is_key_exists(&error) => {
                trace!(key, "Series exists, updating labels");

                alter_command(key, labels).query::<()>(&mut *connection)?;

                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn add_sample(
        &mut self,
        key: &str,
        timestamp: i64,
        value: f64,
    ) -> Result<(), ConnectionError> {
        let mut connection = self.connection()?;

        add_command(key, timestamp, value, self.on_duplicate.as_deref())
            .query::<i64>(&mut *connection)?;

        Ok(())
    }

    pub fn add_benchmark_name(&mut self, key: &str, name: &str) -> Result<(), ConnectionError> {
        let mut connection = self.connection()?;

        sadd_command(key, name).query::<i64>(&mut *connection)?;

        Ok(())
    }
}

/// `TS.CREATE key LABELS name value ...`
pub fn create_command(key: &str, labels: &Labels) -> Cmd {
    with_labels(cmd("TS.CREATE"), key, labels)
}

/// `TS.ALTER key LABELS name value ...`, replaces the labels of an existing series
pub fn alter_command(key: &str, labels: &Labels) -> Cmd {
    with_labels(cmd("TS.ALTER"), key, labels)
}

/// `TS.ADD key timestamp value [ON_DUPLICATE policy]`
pub fn add_command(key: &str, timestamp: i64, value: f64, on_duplicate: Option<&str>) -> Cmd {
    let mut command = cmd("TS.ADD");

    command.arg(key).arg(timestamp).arg(value);
    if let Some(policy) = on_duplicate {
        command.arg("ON_DUPLICATE").arg(policy);
    }

    command
}

pub fn sadd_command(key: &str, name: &str) -> Cmd {
    let mut command = cmd("SADD");
    command.arg(key).arg(name);

    command
}

/// whether TS.CREATE failed because the series is already there
pub fn is_key_exists(error: &RedisError) -> bool {
    error.to_string().contains(KEY_EXISTS)
}

fn with_labels(mut command: Cmd, key: &str, labels: &Labels) -> Cmd {
    command.arg(key).arg("LABELS");

    for (name, value) in labels {
        command.arg(name).arg(value);
    }

    command
}
