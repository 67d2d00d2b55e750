use lookup_common::handlers::HandlerError;
use lookup_common::lookup::LookupError;
use lookup_common::redis::CustomRedisError;
use lookup_common::registry::RegistryError;
use thiserror::Error;

/// Enumeration of errors that end a lookup run.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error("unable to connect to the store: {0}")]
    Store(#[from] CustomRedisError),
    #[error("malformed ranked input line {line:?}: {reason}")]
    MalformedRankedLine { line: String, reason: String },
    #[error("unable to marshal JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unable to format timestamp: {0}")]
    TimeFormat(#[from] time::error::Format),
    #[error("unable to write metadata to {path}: {error}")]
    MetadataWrite {
        path: String,
        error: std::io::Error,
    },
    #[error("the {0} channel was closed while a worker was still sending")]
    ChannelClosed(&'static str),
    #[error("a pipeline task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Enumeration of errors that end one of the store tools.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid url {url}: {error}")]
    InvalidUrl {
        url: String,
        error: url::ParseError,
    },
    #[error("url {0} has no host")]
    MissingHost(String),
    #[error("store operation failed: {0}")]
    Store(#[from] CustomRedisError),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}
