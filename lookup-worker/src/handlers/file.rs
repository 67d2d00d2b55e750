use std::sync::Arc;

use async_trait::async_trait;
use lookup_common::handlers::{HandlerConfig, HandlerError, InputHandler, OutputHandler};
use lookup_common::input::InputItem;
use tokio::fs::File;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};
use tokio::sync::mpsc;
use tracing::debug;

use super::zone::ZoneReader;

/// `-` or an empty path selects the standard streams.
fn is_std_stream(path: &str) -> bool {
    path.is_empty() || path == "-"
}

/// Reads names, one per line, or zone-file records from a file or stdin.
pub struct FileInputHandler {
    path: String,
}

impl FileInputHandler {
    pub fn new(config: &HandlerConfig) -> Result<Box<dyn InputHandler>, HandlerError> {
        Ok(Box::new(Self {
            path: config.input_file.clone(),
        }))
    }
}

#[async_trait]
impl InputHandler for FileInputHandler {
    async fn feed_channel(
        &mut self,
        items: mpsc::Sender<InputItem>,
        zonefile_input: bool,
    ) -> Result<(), HandlerError> {
        if is_std_stream(&self.path) {
            return feed_from(BufReader::new(tokio::io::stdin()), items, zonefile_input).await;
        }

        let file = File::open(&self.path)
            .await
            .map_err(|error| HandlerError::Open {
                path: self.path.clone(),
                error,
            })?;
        feed_from(BufReader::new(file), items, zonefile_input).await
    }
}

/// Push every line of `reader` onto `items`, or every record when the input is a zone file.
pub async fn feed_from<R>(
    reader: R,
    items: mpsc::Sender<InputItem>,
    zonefile_input: bool,
) -> Result<(), HandlerError>
where
    R: AsyncBufRead + Unpin + Send,
{
    if zonefile_input {
        return feed_zone(reader, items).await;
    }

    let mut lines = reader.lines();
    let mut fed = 0usize;

    while let Some(line) = lines.next_line().await.map_err(HandlerError::Read)? {
        send(&items, InputItem::Line(line)).await?;
        fed += 1;
    }

    debug!(items = fed, "input exhausted");
    Ok(())
}

async fn feed_zone<R>(mut reader: R, items: mpsc::Sender<InputItem>) -> Result<(), HandlerError>
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .await
        .map_err(HandlerError::Read)?;

    let mut zone = ZoneReader::new(&data);
    let mut fed = 0usize;

    while let Some(record) = zone.next_record()? {
        send(&items, InputItem::Zone(record)).await?;
        fed += 1;
    }

    debug!(bytes = data.len(), records = fed, "zone exhausted");
    Ok(())
}

async fn send(items: &mpsc::Sender<InputItem>, item: InputItem) -> Result<(), HandlerError> {
    items
        .send(item)
        .await
        .map_err(|_| HandlerError::ChannelClosed("input"))
}

/// Writes one item per line to a file or stdout. The filtered stream always goes to stdout.
pub struct FileOutputHandler {
    path: String,
}

impl FileOutputHandler {
    pub fn new(config: &HandlerConfig) -> Result<Arc<dyn OutputHandler>, HandlerError> {
        Ok(Arc::new(Self {
            path: config.output_file.clone(),
        }))
    }
}

#[async_trait]
impl OutputHandler for FileOutputHandler {
    async fn write_results(
        &self,
        results: mpsc::Receiver<String>,
        raw: bool,
    ) -> Result<(), HandlerError> {
        if raw || is_std_stream(&self.path) {
            return write_to(tokio::io::stdout(), results).await;
        }

        let file = File::create(&self.path)
            .await
            .map_err(|error| HandlerError::Open {
                path: self.path.clone(),
                error,
            })?;
        write_to(file, results).await
    }
}

/// Drain `results` into `writer`, one newline-terminated item at a time.
///
/// Each line goes out in a single write, so buffer flushes only happen between whole
/// lines and two sinks sharing stdout never split each other's lines.
pub async fn write_to<W>(writer: W, mut results: mpsc::Receiver<String>) -> Result<(), HandlerError>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut writer = BufWriter::new(writer);

    while let Some(item) = results.recv().await {
        let line = format!("{item}\n");
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(HandlerError::Write)?;
    }

    writer.flush().await.map_err(HandlerError::Write)
}
