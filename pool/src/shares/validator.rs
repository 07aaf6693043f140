/// Share Validator - dual-threshold check of one submitted solution
///
/// A solution is verified at the pool share difficulty first. Only when
/// that passes is the same solution checked at the template's network
/// difficulty; a pass there makes it a block candidate for the
/// [`BlockSubmitter`], otherwise it is recorded as a pool share.

use num_bigint::BigUint;
use std::sync::Arc;
use std::time::Duration;

use etc_core::algorithms::{PowHasher, WorkCandidate};
use etc_core::consensus;

use super::hasher::HasherRegistry;
use super::outcome::Outcome;
use super::storage::{AccountingSink, BlockRecord, ShareRecord};
use super::submitter::BlockSubmitter;
use super::types::SubmittedWork;
use crate::blockchain::TemplateCache;
use crate::metrics::prometheus as metrics;

pub struct ShareValidator {
    chain_id: String,
    registry: Arc<HasherRegistry>,
    templates: Arc<TemplateCache>,
    submitter: Arc<BlockSubmitter>,
    accounting: Arc<dyn AccountingSink>,
    share_difficulty: u64,
    hashrate_expiration: Duration,
}

impl ShareValidator {
    pub fn new(
        chain_id: impl Into<String>,
        registry: Arc<HasherRegistry>,
        templates: Arc<TemplateCache>,
        submitter: Arc<BlockSubmitter>,
        accounting: Arc<dyn AccountingSink>,
        share_difficulty: u64,
        hashrate_expiration: Duration,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            registry,
            templates,
            submitter,
            accounting,
            share_difficulty,
            hashrate_expiration,
        }
    }

    pub fn share_difficulty(&self) -> u64 {
        self.share_difficulty
    }

    /// Entry point for raw `eth_submitWork` params.
    pub async fn validate_params(
        &self,
        login: &str,
        worker: &str,
        ip: &str,
        params: &[String],
    ) -> Outcome {
        match SubmittedWork::from_params(params) {
            Ok(work) => self.validate(login, worker, ip, &work).await,
            Err(e) => {
                tracing::warn!("Malformed submission from {}@{}: {}", login, ip, e);
                record_outcome(&Outcome::MalformedRequest);
                Outcome::MalformedRequest
            }
        }
    }

    pub async fn validate(
        &self,
        login: &str,
        worker: &str,
        ip: &str,
        work: &SubmittedWork,
    ) -> Outcome {
        let outcome = self.process(login, worker, ip, work).await;
        record_outcome(&outcome);
        outcome
    }

    async fn process(&self, login: &str, worker: &str, ip: &str, work: &SubmittedWork) -> Outcome {
        let hasher = match self.registry.get_hasher(&self.chain_id) {
            Ok(hasher) => hasher,
            Err(e) => {
                tracing::error!("Cannot verify share from {}@{}: {}", login, ip, e);
                return Outcome::ConfigError(e);
            }
        };

        let nonce = match work.parse_nonce() {
            Some(nonce) => nonce,
            None => {
                tracing::warn!("Malformed nonce {:?} from {}@{}", work.nonce, login, ip);
                return Outcome::MalformedNonce;
            }
        };

        // An undecodable fingerprint can never be a cache key.
        let template = match consensus::parse_hash32(&work.hash_no_nonce) {
            Some(hash) => self
                .templates
                .lookup(&consensus::hash_hex(&hash))
                .await
                .map(|t| (hash, t)),
            None => None,
        };
        let (hash_no_nonce, template) = match template {
            Some(found) => found,
            None => {
                tracing::debug!("Stale share from {}@{} ({})", login, ip, work.hash_no_nonce);
                return Outcome::Stale;
            }
        };

        let mix_digest = match consensus::parse_hash32(&work.mix_digest) {
            Some(mix) => mix,
            None => {
                tracing::warn!(
                    "Invalid share from {}@{} at height {}: bad mix digest",
                    login, ip, template.height
                );
                return Outcome::Invalid;
            }
        };

        // Never judge the share more strictly than the block itself.
        let share_difficulty = BigUint::from(self.share_difficulty).min(template.difficulty.clone());
        let share = WorkCandidate {
            height: template.height,
            hash_no_nonce,
            difficulty: share_difficulty,
            nonce,
            mix_digest,
        };

        if !verify(&hasher, share.clone()).await {
            tracing::warn!(
                "Invalid share from {}@{} ({}) at height {}",
                login, ip, worker, template.height
            );
            return Outcome::Invalid;
        }

        let record = ShareRecord {
            login: login.to_string(),
            worker: worker.to_string(),
            params: work.params(),
            nonce,
            hash_no_nonce,
            mix_digest,
            share_difficulty: self.share_difficulty,
            height: template.height,
            expiration: self.hashrate_expiration,
        };

        let block = share.with_difficulty(template.difficulty.clone());
        if verify(&hasher, block).await {
            let record = BlockRecord {
                share: record,
                network_difficulty: template.difficulty,
            };
            return self.submit_block(record, ip).await;
        }

        match self.accounting.record_share(&record).await {
            Ok(true) => {
                tracing::warn!(
                    "Duplicate share from {}@{} at height {}",
                    login, ip, template.height
                );
                Outcome::DuplicateShare
            }
            Ok(false) => {
                tracing::debug!(
                    "Valid share from {}@{} ({}) at height {}",
                    login, ip, worker, template.height
                );
                Outcome::ValidShare
            }
            Err(e) => {
                metrics::inc_redis_errors();
                tracing::error!(
                    "Valid share from {}@{} at height {} not recorded: {:#}",
                    login, ip, template.height, e
                );
                Outcome::ValidShare
            }
        }
    }

    /// Runs on its own task so a dropped request cannot abort a node
    /// submission halfway.
    async fn submit_block(&self, record: BlockRecord, ip: &str) -> Outcome {
        let submitter = self.submitter.clone();
        let ip = ip.to_string();
        let height = record.share.height;

        match tokio::spawn(async move { submitter.submit(&record, &ip).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Block submission task at height {} failed: {}", height, e);
                Outcome::SubmissionError
            }
        }
    }
}

/// Verification is CPU-bound (and the first call per epoch builds the
/// light cache), so it runs off the async workers.
async fn verify(hasher: &Arc<dyn PowHasher>, candidate: WorkCandidate) -> bool {
    let hasher = hasher.clone();
    match tokio::task::spawn_blocking(move || hasher.verify(&candidate)).await {
        Ok(valid) => valid,
        Err(e) => {
            tracing::error!("PoW verification task failed: {}", e);
            false
        }
    }
}

fn record_outcome(outcome: &Outcome) {
    if outcome.is_accepted() {
        metrics::inc_accepted();
    } else {
        metrics::inc_rejected(outcome.label());
    }
}
