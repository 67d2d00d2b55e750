use std::fs;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use lookup_common::handlers::HandlerConfig;
use lookup_common::redis::{CustomRedisError, RedisClient};
use lookup_common::result::OutputFilter;
use lookup_common::store::{DedupStore, MergeStrategy};
use lookup_common::timestamp::TimeFormat;
use serde::Serialize;

use crate::error::WorkerError;

const RESOLV_CONF_PATH: &str = "/etc/resolv.conf";
const DEFAULT_DNS_PORT: u16 = 53;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3302")]
    pub port: u16,

    #[envconfig(default = "false")]
    pub export_prometheus: bool,

    #[envconfig(default = "1000")]
    pub threads: usize,

    #[envconfig(default = "system")]
    pub module: NonEmptyString,

    #[envconfig(default = "file")]
    pub input_handler: NonEmptyString,

    #[envconfig(default = "file")]
    pub output_handler: NonEmptyString,

    #[envconfig(default = "-")]
    pub input_file: String,

    #[envconfig(default = "-")]
    pub output_file: String,

    pub metadata_file: Option<String>,

    #[envconfig(default = "false")]
    pub zonefile_input: bool,

    #[envconfig(default = "false")]
    pub alexa: bool,

    #[envconfig(default = "")]
    pub name_prefix: String,

    #[envconfig(default = "IN")]
    pub class: String,

    #[envconfig(default = "RFC3339")]
    pub time_format: TimeFormat,

    #[envconfig(default = "")]
    pub output_filter: OutputFilter,

    #[envconfig(default = "")]
    pub name_servers: NameServers,

    #[envconfig(default = "1")]
    pub retries: u32,

    #[envconfig(default = "15000")]
    pub timeout: EnvMsDuration,

    #[envconfig(nested = true)]
    pub store: StoreConfig,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve everything a run needs, reading the system resolver configuration when no
    /// name servers were given.
    pub fn run_config(&self) -> Result<RunConfig, WorkerError> {
        if self.threads == 0 {
            return Err(WorkerError::InvalidConfig(
                "THREADS must be at least 1".to_owned(),
            ));
        }

        let name_servers = if self.name_servers.0.is_empty() {
            let resolv_conf = fs::read_to_string(RESOLV_CONF_PATH).map_err(|error| {
                WorkerError::InvalidConfig(format!(
                    "no name servers configured and {RESOLV_CONF_PATH} is unreadable: {error}"
                ))
            })?;
            parse_resolv_conf(&resolv_conf)
        } else {
            self.name_servers.0.clone()
        };

        Ok(RunConfig {
            threads: self.threads,
            module: self.module.as_str().to_owned(),
            input_handler: self.input_handler.as_str().to_owned(),
            output_handler: self.output_handler.as_str().to_owned(),
            input_file: self.input_file.clone(),
            output_file: self.output_file.clone(),
            metadata_file: self.metadata_file.clone().filter(|path| !path.is_empty()),
            zonefile_input: self.zonefile_input,
            alexa: self.alexa,
            name_prefix: self.name_prefix.clone(),
            class: self.class.clone(),
            time_format: self.time_format.clone(),
            output_filter: self.output_filter.clone(),
            name_servers,
            retries: self.retries,
            timeout: self.timeout.0,
            store_enabled: self.store.enabled(),
        })
    }
}

#[derive(Envconfig, Clone)]
pub struct StoreConfig {
    /// Unset disables the store sink.
    pub redis_url: Option<String>,

    pub redis_password: Option<String>,

    #[envconfig(default = "0")]
    pub redis_db: i64,

    #[envconfig(default = "1000")]
    pub redis_timeout: EnvMsDuration,

    #[envconfig(default = "true")]
    pub store_atomic_merge: bool,
}

impl StoreConfig {
    pub fn enabled(&self) -> bool {
        self.redis_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    pub fn merge_strategy(&self) -> MergeStrategy {
        if self.store_atomic_merge {
            MergeStrategy::Atomic
        } else {
            MergeStrategy::ReadModifyWrite
        }
    }
}

/// Store settings of the standalone tools, which cannot run without redis.
#[derive(Envconfig, Clone)]
pub struct ToolConfig {
    #[envconfig(default = "127.0.0.1:6379")]
    pub redis_url: String,

    pub redis_password: Option<String>,

    #[envconfig(default = "0")]
    pub redis_db: i64,

    #[envconfig(default = "1000")]
    pub redis_timeout: EnvMsDuration,

    #[envconfig(default = "true")]
    pub store_atomic_merge: bool,
}

impl ToolConfig {
    pub fn store(&self) -> Result<DedupStore, CustomRedisError> {
        let client = RedisClient::with_credentials(
            &self.redis_url,
            self.redis_password.clone().filter(|password| !password.is_empty()),
            self.redis_db,
            self.redis_timeout.0,
        )?;

        Ok(DedupStore::new(std::sync::Arc::new(client)))
    }

    pub fn merge_strategy(&self) -> MergeStrategy {
        if self.store_atomic_merge {
            MergeStrategy::Atomic
        } else {
            MergeStrategy::ReadModifyWrite
        }
    }
}

/// Settings of one run. Echoed into the metadata record.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub threads: usize,
    pub module: String,
    pub input_handler: String,
    pub output_handler: String,
    pub input_file: String,
    pub output_file: String,
    pub metadata_file: Option<String>,
    pub zonefile_input: bool,
    pub alexa: bool,
    pub name_prefix: String,
    pub class: String,
    #[serde(skip)]
    pub time_format: TimeFormat,
    pub output_filter: OutputFilter,
    pub name_servers: Vec<String>,
    pub retries: u32,
    #[serde(serialize_with = "serialize_seconds")]
    pub timeout: time::Duration,
    pub store_enabled: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            module: "system".to_owned(),
            input_handler: "file".to_owned(),
            output_handler: "file".to_owned(),
            input_file: "-".to_owned(),
            output_file: "-".to_owned(),
            metadata_file: None,
            zonefile_input: false,
            alexa: false,
            name_prefix: String::new(),
            class: "IN".to_owned(),
            time_format: TimeFormat::Rfc3339,
            output_filter: OutputFilter::default(),
            name_servers: Vec::new(),
            retries: 1,
            timeout: time::Duration::from_secs(15),
            store_enabled: false,
        }
    }
}

impl RunConfig {
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            input_file: self.input_file.clone(),
            output_file: self.output_file.clone(),
        }
    }
}

fn serialize_seconds<S>(duration: &time::Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

/// Extract `nameserver` entries from resolv.conf contents as `address:53`.
pub fn parse_resolv_conf(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(address)) => Some(with_dns_port(address)),
                _ => None,
            }
        })
        .collect()
}

fn with_dns_port(address: &str) -> String {
    if !address.starts_with('[') && address.contains(':') {
        format!("[{}]:{}", address, DEFAULT_DNS_PORT)
    } else {
        format!("{}:{}", address, DEFAULT_DNS_PORT)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}

/// Comma separated name server addresses.
#[derive(Debug, Clone, Default)]
pub struct NameServers(pub Vec<String>);

impl FromStr for NameServers {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NameServers(
            s.split(',')
                .map(str::trim)
                .filter(|server| !server.is_empty())
                .map(|server| {
                    if server.parse::<std::net::IpAddr>().is_ok() {
                        with_dns_port(server)
                    } else {
                        server.to_owned()
                    }
                })
                .collect(),
        ))
    }
}
