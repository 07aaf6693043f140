/// Accounting sink - share and block candidate persistence
///
/// Handles:
/// - Proof-of-work dedup set (prefix:pow, scored by height)
/// - Round shares (prefix:shares:roundCurrent) and hashrate samples
/// - Miner stats (prefix:miners:login) and block finders
/// - Block candidates (prefix:blocks:candidates)
///
/// Uses redis::aio::ConnectionManager for async operations

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use num_bigint::BigUint;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use etc_core::consensus;

/// Dedup entries this many heights below the current one are dropped.
const POW_WINDOW: u64 = 8;

/// An accepted pool share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRecord {
    pub login: String,
    pub worker: String,
    /// Raw `[nonce, header, mix_digest]`, only forwarded to the node.
    pub params: Vec<String>,
    pub nonce: u64,
    pub hash_no_nonce: [u8; 32],
    pub mix_digest: [u8; 32],
    pub share_difficulty: u64,
    pub height: u64,
    /// Retention hint for hashrate samples.
    pub expiration: Duration,
}

impl ShareRecord {
    fn param(&self, i: usize) -> &str {
        self.params.get(i).map(String::as_str).unwrap_or("")
    }

    /// Fixed-width `0x` nonce, independent of how the miner encoded it.
    pub fn nonce_hex(&self) -> String {
        format!("{:#018x}", self.nonce)
    }

    /// Dedup identity: miner plus the decoded solution.
    pub fn pow_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.login,
            self.nonce_hex(),
            consensus::hash_hex(&self.hash_no_nonce),
            consensus::hash_hex(&self.mix_digest)
        )
    }
}

/// A block the node accepted, carrying the share it also counts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub share: ShareRecord,
    pub network_difficulty: BigUint,
}

/// Idempotent accounting writes. `Ok(true)` means the record already
/// existed and nothing was written.
#[async_trait]
pub trait AccountingSink: Send + Sync {
    async fn record_share(&self, record: &ShareRecord) -> Result<bool>;

    async fn record_block(&self, record: &BlockRecord) -> Result<bool>;
}

/// Redis storage manager
pub struct RedisStorage {
    client: redis::Client,
    connection: Arc<RwLock<Option<redis::aio::ConnectionManager>>>,
    prefix: String,
}

impl RedisStorage {
    /// Create new Redis storage; the connection is opened on first use.
    pub fn new(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| anyhow!("Failed to create Redis client: {}", e))?;

        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            prefix: prefix.to_string(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::ConnectionManager> {
        let mut conn_guard = self.connection.write().await;

        if let Some(conn) = conn_guard.as_ref() {
            return Ok(conn.clone());
        }

        let manager = self
            .client
            .get_connection_manager()
            .await
            .map_err(|e| anyhow!("Failed to get connection manager: {}", e))?;
        *conn_guard = Some(manager.clone());
        Ok(manager)
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }

    /// Atomic conditional insert into the dedup set; true if already present.
    async fn check_pow_exist(
        &self,
        conn: &mut redis::aio::ConnectionManager,
        record: &ShareRecord,
    ) -> Result<bool> {
        let pow_key = self.key("pow");

        redis::cmd("ZREMRANGEBYSCORE")
            .arg(&pow_key)
            .arg("-inf")
            .arg(format!("({}", record.height.saturating_sub(POW_WINDOW)))
            .query_async::<_, ()>(conn)
            .await
            .map_err(|e| anyhow!("Failed to trim pow set: {}", e))?;

        let added: i64 = redis::cmd("ZADD")
            .arg(&pow_key)
            .arg("NX")
            .arg(record.height)
            .arg(record.pow_key())
            .query_async(conn)
            .await
            .map_err(|e| anyhow!("Failed to insert pow entry: {}", e))?;

        Ok(added == 0)
    }

    fn queue_share(&self, pipe: &mut redis::Pipeline, record: &ShareRecord, ts: i64, ms: i64) {
        let miner_key = self.key(&format!("miners:{}", record.login));
        let hashrate_key = self.key(&format!("hashrate:{}", record.login));

        pipe.cmd("HINCRBY")
            .arg(self.key("shares:roundCurrent"))
            .arg(&record.login)
            .arg(record.share_difficulty)
            .ignore()
            .cmd("ZADD")
            .arg(self.key("hashrate"))
            .arg(ts)
            .arg(hashrate_member(record, ms))
            .ignore()
            .cmd("ZADD")
            .arg(&hashrate_key)
            .arg(ts)
            .arg(miner_hashrate_member(record, ms))
            .ignore()
            .cmd("EXPIRE")
            .arg(&hashrate_key)
            .arg(record.expiration.as_secs())
            .ignore()
            .cmd("HSET")
            .arg(&miner_key)
            .arg("lastShare")
            .arg(ts)
            .ignore();
    }

    async fn write_share(&self, record: &ShareRecord) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        if self.check_pow_exist(&mut conn, record).await? {
            return Ok(true);
        }

        let now = Utc::now();
        let mut pipe = redis::pipe();
        pipe.atomic();
        self.queue_share(&mut pipe, record, now.timestamp(), now.timestamp_millis());

        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow!("Failed to write share: {}", e))?;
        Ok(false)
    }

    async fn write_block(&self, record: &BlockRecord) -> Result<bool> {
        let share = &record.share;
        let mut conn = self.get_connection().await?;
        if self.check_pow_exist(&mut conn, share).await? {
            return Ok(true);
        }

        let now = Utc::now();
        let ts = now.timestamp();
        let round_key = self.key(&format!("shares:round{}:{}", share.height, share.nonce_hex()));

        let mut pipe = redis::pipe();
        pipe.atomic();
        self.queue_share(&mut pipe, share, ts, now.timestamp_millis());
        pipe.cmd("HSET")
            .arg(self.key("stats"))
            .arg("lastBlockFound")
            .arg(ts)
            .ignore()
            .cmd("HDEL")
            .arg(self.key("stats"))
            .arg("roundShares")
            .ignore()
            .cmd("ZINCRBY")
            .arg(self.key("finders"))
            .arg(1)
            .arg(&share.login)
            .ignore()
            .cmd("HINCRBY")
            .arg(self.key(&format!("miners:{}", share.login)))
            .arg("blocksFound")
            .arg(1)
            .ignore()
            .cmd("RENAME")
            .arg(self.key("shares:roundCurrent"))
            .arg(&round_key)
            .ignore()
            .cmd("HGETALL")
            .arg(&round_key);

        let (round,): (HashMap<String, i64>,) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow!("Failed to write block: {}", e))?;
        let total_shares: i64 = round.values().sum();

        redis::cmd("ZADD")
            .arg(self.key("blocks:candidates"))
            .arg(share.height)
            .arg(candidate_member(record, ts, total_shares))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| anyhow!("Failed to add block candidate: {}", e))?;

        Ok(false)
    }

    /// Health check
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow!("Redis PING failed: {}", e))?;

        if pong != "PONG" {
            return Err(anyhow!("Redis health check failed: got {}", pong));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountingSink for RedisStorage {
    async fn record_share(&self, record: &ShareRecord) -> Result<bool> {
        self.write_share(record).await
    }

    async fn record_block(&self, record: &BlockRecord) -> Result<bool> {
        self.write_block(record).await
    }
}

fn hashrate_member(record: &ShareRecord, ms: i64) -> String {
    format!("{}:{}:{}:{}", record.share_difficulty, record.login, record.worker, ms)
}

fn miner_hashrate_member(record: &ShareRecord, ms: i64) -> String {
    format!("{}:{}:{}", record.share_difficulty, record.worker, ms)
}

/// `nonce:header:mix:ts:network_difficulty:round_shares`
fn candidate_member(record: &BlockRecord, ts: i64, total_shares: i64) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}",
        record.share.param(0),
        record.share.param(1),
        record.share.param(2),
        ts,
        record.network_difficulty,
        total_shares
    )
}
