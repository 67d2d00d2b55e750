//! Join open addresses with the URLs served by the names resolving to them.
//!
//! The store maps addresses to names (written by the lookup worker's store sink) and
//! names to URLs (written by `store-urls`).
use std::collections::HashSet;

use lookup_common::store::DedupStore;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ToolError;

/// Marks an address reported closed. It is only joined if it was reported open before.
const CLOSED_PREFIX: char = '#';

pub struct IpJoiner {
    store: DedupStore,
    open: HashSet<String>,
    sent_urls: HashSet<String>,
}

impl IpJoiner {
    pub fn new(store: DedupStore) -> Self {
        Self {
            store,
            open: HashSet::new(),
            sent_urls: HashSet::new(),
        }
    }

    /// Echo `line`, then write an `address,url` line for every URL of the address not
    /// written before.
    pub async fn process_line<W>(&mut self, line: &str, writer: &mut W) -> Result<(), ToolError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        let address = match line.strip_prefix(CLOSED_PREFIX) {
            Some(address) if self.open.contains(address) => address,
            Some(_) => return Ok(()),
            None if line.is_empty() => return Ok(()),
            None => {
                self.open.insert(line.to_owned());
                line
            }
        };

        for domain in self.store.members(address).await? {
            for url in self.store.members(&domain).await? {
                if self.sent_urls.insert(url.clone()) {
                    writer
                        .write_all(format!("{},{}\n", address, url).as_bytes())
                        .await?;
                }
            }
        }

        writer.flush().await?;
        Ok(())
    }
}

pub async fn join_ips<R, W>(store: DedupStore, reader: R, writer: W) -> Result<(), ToolError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut joiner = IpJoiner::new(store);
    let mut lines = reader.lines();
    let mut writer = tokio::io::BufWriter::new(writer);

    while let Some(line) = lines.next_line().await? {
        joiner.process_line(&line, &mut writer).await?;
    }

    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lookup_common::redis::{CustomRedisError, MockRedisClient};

    use super::*;

    fn store() -> DedupStore {
        let client = MockRedisClient::new()
            .with_value("192.0.2.1", "[\"a.com\",\"b.com\"]")
            .with_value("192.0.2.2", "[\"b.com\"]")
            .with_value("a.com", "[\"http://a.com/\"]")
            .with_value("b.com", "[\"http://b.com/\",\"http://b.com/x\"]");
        DedupStore::new(Arc::new(client))
    }

    async fn run(store: DedupStore, input: &str) -> Result<String, ToolError> {
        let mut out = Vec::new();
        join_ips(store, input.as_bytes(), &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_joins_open_addresses() {
        let out = run(store(), "192.0.2.1\n\n192.0.2.2\n").await.unwrap();
        assert_eq!(
            out,
            "192.0.2.1\n\
             192.0.2.1,http://a.com/\n\
             192.0.2.1,http://b.com/\n\
             192.0.2.1,http://b.com/x\n\
             \n\
             192.0.2.2\n"
        );
    }

    #[tokio::test]
    async fn test_closed_marker_needs_prior_open() {
        let out = run(store(), "#192.0.2.2\n192.0.2.9\n#192.0.2.9\n")
            .await
            .unwrap();
        assert_eq!(out, "#192.0.2.2\n192.0.2.9\n#192.0.2.9\n");

        let out = run(store(), "#192.0.2.1\n").await.unwrap();
        assert_eq!(out, "#192.0.2.1\n");
    }

    #[tokio::test]
    async fn test_closed_after_open_is_joined() {
        let mut joiner = IpJoiner::new(store());
        let mut out = Vec::new();
        joiner.process_line("192.0.2.2", &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "192.0.2.2\n192.0.2.2,http://b.com/\n192.0.2.2,http://b.com/x\n"
        );

        let mut joiner = IpJoiner::new(store());
        joiner.open.insert("192.0.2.1".to_owned());
        let mut out = Vec::new();
        joiner.process_line("#192.0.2.1", &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#192.0.2.1\n\
             192.0.2.1,http://a.com/\n\
             192.0.2.1,http://b.com/\n\
             192.0.2.1,http://b.com/x\n"
        );
    }

    #[tokio::test]
    async fn test_malformed_stored_value_is_fatal() {
        let client = MockRedisClient::new().with_value("192.0.2.1", "not json");
        let result = run(DedupStore::new(Arc::new(client)), "192.0.2.1\n").await;
        assert!(matches!(
            result,
            Err(ToolError::Store(CustomRedisError::ParseError(_)))
        ));
    }
}
