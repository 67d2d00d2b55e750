//! Record URLs under the name of the host serving them.
use lookup_common::store::{DedupStore, MergeStrategy};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;
use url::{Host, Url};

use crate::error::ToolError;

/// Prefix `http://` unless the URL already names an HTTP scheme.
pub fn normalize_url(raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_owned()
    } else {
        format!("http://{}", raw)
    }
}

/// The host of `url`, without IPv6 brackets.
pub fn url_fqdn(url: &str) -> Result<String, ToolError> {
    let parsed = Url::parse(url).map_err(|error| ToolError::InvalidUrl {
        url: url.to_owned(),
        error,
    })?;

    match parsed.host() {
        Some(Host::Domain(domain)) => Ok(domain.to_owned()),
        Some(Host::Ipv4(address)) => Ok(address.to_string()),
        Some(Host::Ipv6(address)) => Ok(address.to_string()),
        None => Err(ToolError::MissingHost(url.to_owned())),
    }
}

/// Merge every URL read from `reader` into the set stored under its host, writing each
/// host to `writer`. Returns the number of URLs stored.
pub async fn store_urls<R, W>(
    store: &DedupStore,
    strategy: MergeStrategy,
    reader: R,
    writer: W,
) -> Result<usize, ToolError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut writer = tokio::io::BufWriter::new(writer);
    let mut stored = 0;

    while let Some(line) = lines.next_line().await? {
        let url = normalize_url(&line);
        let fqdn = url_fqdn(&url)?;

        let added = store.merge_with(strategy, &fqdn, &url).await?;
        debug!(%fqdn, %url, added, "stored url");

        writer.write_all(fqdn.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        stored += 1;
    }

    writer.flush().await?;
    Ok(stored)
}
