use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::input::InputItem;
use crate::redis::CustomRedisError;

/// Enumeration of errors raised by input and output handlers. All of them end the run.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("unable to open {path}: {error}")]
    Open { path: String, error: io::Error },
    #[error("unable to read input: {0}")]
    Read(io::Error),
    #[error("unable to write output: {0}")]
    Write(io::Error),
    #[error("malformed input at {0}")]
    MalformedInput(String),
    #[error("store operation failed: {0}")]
    Store(#[from] CustomRedisError),
    #[error("the {0} channel was closed before the handler finished")]
    ChannelClosed(&'static str),
}

/// Settings handlers are initialized from.
#[derive(Debug, Clone, Default)]
pub struct HandlerConfig {
    pub input_file: String,
    pub output_file: String,
}

#[async_trait]
pub trait InputHandler: Send {
    /// Push items onto `items` until the source is exhausted: zone-file records when
    /// `zonefile_input` is set, raw lines otherwise.
    ///
    /// The channel is closed when `items` is dropped, which happens exactly once, on return.
    async fn feed_channel(
        &mut self,
        items: mpsc::Sender<InputItem>,
        zonefile_input: bool,
    ) -> Result<(), HandlerError>;
}

#[async_trait]
pub trait OutputHandler: Send + Sync {
    /// Write every line received on `results` until the channel is closed.
    /// `raw` selects the filtered single-value stream rather than the primary one.
    async fn write_results(
        &self,
        results: mpsc::Receiver<String>,
        raw: bool,
    ) -> Result<(), HandlerError>;
}
