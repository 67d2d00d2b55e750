use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, IntoConnectionInfo};
use thiserror::Error;
use tokio::time::timeout;

const DEFAULT_REDIS_TIMEOUT_MILLISECS: u64 = 1000;

/// Appends ARGV[1] to the JSON array stored at KEYS[1] unless it is already present.
/// Returns 1 when the member was added and 0 when it was already there.
const ADD_JSON_MEMBER_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
local members = {}
if raw then
    members = cjson.decode(raw)
end
for _, member in ipairs(members) do
    if member == ARGV[1] then
        return 0
    end
end
table.insert(members, ARGV[1])
redis.call('SET', KEYS[1], cjson.encode(members))
return 1
"#;

#[derive(Error, Debug)]
pub enum CustomRedisError {
    #[error("Not found in redis")]
    NotFound,
    #[error("Timeout error")]
    Timeout(#[from] tokio::time::error::Elapsed),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

/// A simple redis wrapper.
/// Only the commands the store needs are exposed, which keeps it easy to mock.
#[async_trait]
pub trait Client {
    async fn get(&self, k: String) -> Result<String, CustomRedisError>;
    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError>;
    /// Add `member` to the JSON array stored at `k` in one server-side step.
    /// Returns whether the member was new.
    async fn add_json_member(&self, k: String, member: String) -> Result<bool, CustomRedisError>;
}

pub struct RedisClient {
    client: redis::Client,
    timeout: Duration,
    add_member_script: redis::Script,
}

impl RedisClient {
    pub fn new(addr: String) -> Result<RedisClient, CustomRedisError> {
        Self::with_credentials(
            &addr,
            None,
            0,
            Duration::from_millis(DEFAULT_REDIS_TIMEOUT_MILLISECS),
        )
    }

    /// Connect to `addr`, which may be a bare `host:port` or a `redis://` URL.
    pub fn with_credentials(
        addr: &str,
        password: Option<String>,
        db: i64,
        timeout: Duration,
    ) -> Result<RedisClient, CustomRedisError> {
        let url = if addr.contains("://") {
            addr.to_owned()
        } else {
            format!("redis://{}", addr)
        };

        let mut info = url.as_str().into_connection_info()?;
        if password.is_some() {
            info.redis.password = password;
        }
        info.redis.db = db;

        let client = redis::Client::open(info)?;

        Ok(RedisClient {
            client,
            timeout,
            add_member_script: redis::Script::new(ADD_JSON_MEMBER_SCRIPT),
        })
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        let value: Option<String> = timeout(self.timeout, async {
            let mut conn = self.client.get_async_connection().await?;
            conn.get::<_, Option<String>>(k).await
        })
        .await??;

        value.ok_or(CustomRedisError::NotFound)
    }

    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError> {
        timeout(self.timeout, async {
            let mut conn = self.client.get_async_connection().await?;
            conn.set::<_, _, ()>(k, v).await
        })
        .await??;

        Ok(())
    }

    async fn add_json_member(&self, k: String, member: String) -> Result<bool, CustomRedisError> {
        let added: i64 = timeout(self.timeout, async {
            let mut conn = self.client.get_async_connection().await?;
            self.add_member_script
                .key(k)
                .arg(member)
                .invoke_async::<_, i64>(&mut conn)
                .await
        })
        .await??;

        Ok(added == 1)
    }
}

// An in-memory stand-in for redis. Clones share the same keyspace.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MockRedisClient {
    pub fn new() -> MockRedisClient {
        MockRedisClient::default()
    }

    pub fn with_value(&mut self, k: &str, v: &str) -> Self {
        self.keyspace().insert(k.to_owned(), v.to_owned());
        self.clone()
    }

    pub fn fail_reads(&mut self) -> Self {
        self.fail_reads = true;
        self.clone()
    }

    pub fn fail_writes(&mut self) -> Self {
        self.fail_writes = true;
        self.clone()
    }

    pub fn value(&self, k: &str) -> Option<String> {
        self.keyspace().get(k).cloned()
    }

    fn keyspace(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn unavailable() -> CustomRedisError {
        CustomRedisError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "mock redis is unavailable",
        )))
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        self.keyspace().get(&k).cloned().ok_or(CustomRedisError::NotFound)
    }

    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError> {
        if self.fail_writes {
            return Err(Self::unavailable());
        }
        self.keyspace().insert(k, v);
        Ok(())
    }

    async fn add_json_member(&self, k: String, member: String) -> Result<bool, CustomRedisError> {
        if self.fail_reads || self.fail_writes {
            return Err(Self::unavailable());
        }

        let mut keyspace = self.keyspace();
        let mut members: Vec<String> = match keyspace.get(&k) {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| CustomRedisError::ParseError(e.to_string()))?,
            None => Vec::new(),
        };
        if members.contains(&member) {
            return Ok(false);
        }
        members.push(member);
        let raw = serde_json::to_string(&members)
            .map_err(|e| CustomRedisError::ParseError(e.to_string()))?;
        keyspace.insert(k, raw);

        Ok(true)
    }
}
