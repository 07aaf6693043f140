/// Block Template Manager - fetch and cache work from the ETC node
///
/// The active jobs live in a [`TemplateCache`] as one immutable
/// [`TemplateSet`] snapshot. A refresh builds a complete new set and swaps
/// it in, so a concurrent lookup sees either the old or the new set.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use num_bigint::BigUint;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time;

use etc_core::consensus;

use super::rpc_client::{NodeClient, PendingBlock, Work};
use crate::metrics::prometheus as metrics;

/// Jobs from this many most recent heights stay valid after a new job.
pub const MAX_BACKLOG: u64 = 3;

/// Callback type for template changes
pub type TemplateChangeCallback = Arc<dyn Fn(Arc<TemplateSet>) + Send + Sync>;

/// One unit of assigned work, keyed by its header fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkTemplate {
    pub height: u64,
    pub difficulty: BigUint,
    pub header: [u8; 32],
}

#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    /// Canonical fingerprint of the newest job.
    pub header: String,
    pub seed: String,
    /// Node boundary for the newest job.
    pub target: String,
    /// Boundary handed to miners, derived from the pool share difficulty.
    pub share_target: String,
    pub height: u64,
    pub difficulty: BigUint,
    pub headers: HashMap<String, WorkTemplate>,
}

impl TemplateSet {
    pub fn get(&self, fingerprint: &str) -> Option<&WorkTemplate> {
        self.headers.get(fingerprint)
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// `eth_getWork` reply for miners: header, seed and share target.
    pub fn work_reply(&self) -> Option<[String; 3]> {
        if self.is_empty() {
            return None;
        }
        Some([
            self.header.clone(),
            self.seed.clone(),
            self.share_target.clone(),
        ])
    }

    /// Successor set for fresh node work, or `None` when the header is unchanged.
    ///
    /// Entries from the previous set whose height is above
    /// `height - MAX_BACKLOG` are carried forward.
    pub fn next(
        &self,
        work: &Work,
        pending: &PendingBlock,
        share_target: &str,
    ) -> Result<Option<TemplateSet>> {
        let header = consensus::parse_hash32(&work.header)
            .ok_or_else(|| anyhow!("invalid header hash {:?}", work.header))?;
        let key = consensus::hash_hex(&header);
        if key == self.header {
            return Ok(None);
        }

        let difficulty = consensus::difficulty_from_target_hex(&work.target)
            .ok_or_else(|| anyhow!("invalid work target {:?}", work.target))?;

        let height = pending.number;
        let floor = height.saturating_sub(MAX_BACKLOG);
        let mut headers: HashMap<String, WorkTemplate> = self
            .headers
            .iter()
            .filter(|(_, t)| t.height > floor)
            .map(|(k, t)| (k.clone(), t.clone()))
            .collect();
        headers.insert(
            key.clone(),
            WorkTemplate {
                height,
                difficulty,
                header,
            },
        );

        Ok(Some(TemplateSet {
            header: key,
            seed: work.seed.clone(),
            target: work.target.clone(),
            share_target: share_target.to_string(),
            height,
            difficulty: pending.difficulty.clone(),
            headers,
        }))
    }
}

/// Holder of the active [`TemplateSet`].
pub struct TemplateCache {
    current: RwLock<Arc<TemplateSet>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(TemplateSet::default())),
        }
    }

    /// `None` means the fingerprint is not (or no longer) active.
    pub async fn lookup(&self, fingerprint: &str) -> Option<WorkTemplate> {
        self.current.read().await.get(fingerprint).cloned()
    }

    pub async fn replace(&self, set: TemplateSet) {
        *self.current.write().await = Arc::new(set);
    }

    pub async fn current(&self) -> Arc<TemplateSet> {
        self.current.read().await.clone()
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Forces a template fetch; called after the node accepts a block.
#[async_trait]
pub trait TemplateRefresher: Send + Sync {
    /// `Ok(true)` when a new job was installed.
    async fn refresh(&self) -> Result<bool>;
}

pub struct BlockTemplateManager {
    node: Arc<dyn NodeClient>,
    cache: Arc<TemplateCache>,
    share_target: String,
    update_interval: Duration,
    refresh_lock: Mutex<()>,
    on_change: Option<TemplateChangeCallback>,
}

impl BlockTemplateManager {
    pub fn new(
        node: Arc<dyn NodeClient>,
        cache: Arc<TemplateCache>,
        share_difficulty: u64,
        update_interval: Duration,
    ) -> Self {
        tracing::info!(
            "BlockTemplateManager: share_difficulty={}, interval={}ms",
            share_difficulty,
            update_interval.as_millis()
        );

        Self {
            node,
            cache,
            share_target: consensus::target_hex_from_difficulty(share_difficulty),
            update_interval,
            refresh_lock: Mutex::new(()),
            on_change: None,
        }
    }

    /// Register callback for template changes
    pub fn on_template_change<F>(&mut self, callback: F)
    where
        F: Fn(Arc<TemplateSet>) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(callback));
    }

    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    /// Start the polling loop
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(manager.update_interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if let Err(e) = manager.refresh().await {
                    tracing::error!("Failed to fetch block template: {:#}", e);
                }
            }
        })
    }

    async fn fetch(&self) -> Result<bool> {
        // Refreshes are serialised so two fetches never race on the swap.
        let _guard = self.refresh_lock.lock().await;

        let work = self.node.get_work().await?;
        let pending = self.node.get_pending_block().await?;

        let previous = self.cache.current().await;
        let next = match previous.next(&work, &pending, &self.share_target)? {
            Some(next) => next,
            None => return Ok(false),
        };

        tracing::info!(
            "New block to mine at height {} / {} (difficulty {}, {} active jobs)",
            next.height,
            next.header,
            next.difficulty,
            next.headers.len()
        );

        self.cache.replace(next).await;
        let installed = self.cache.current().await;

        metrics::set_template_height(installed.height);
        metrics::inc_template_updates();

        if let Some(callback) = &self.on_change {
            callback(installed);
        }
        Ok(true)
    }
}

#[async_trait]
impl TemplateRefresher for BlockTemplateManager {
    async fn refresh(&self) -> Result<bool> {
        let res = self.fetch().await;
        if res.is_err() {
            metrics::inc_template_fetch_errors();
        }
        res
    }
}
