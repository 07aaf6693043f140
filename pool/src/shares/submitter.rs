/// Block submitter
///
/// Hands network-valid solutions to the node, refreshes work after an
/// accepted block and writes the block candidate exactly once.

use std::sync::Arc;

use super::outcome::{Outcome, RejectReason};
use super::storage::{AccountingSink, BlockRecord};
use crate::blockchain::{NodeClient, TemplateRefresher};
use crate::metrics::prometheus as metrics;

pub struct BlockSubmitter {
    node: Arc<dyn NodeClient>,
    refresher: Arc<dyn TemplateRefresher>,
    accounting: Arc<dyn AccountingSink>,
}

impl BlockSubmitter {
    pub fn new(
        node: Arc<dyn NodeClient>,
        refresher: Arc<dyn TemplateRefresher>,
        accounting: Arc<dyn AccountingSink>,
    ) -> Self {
        Self {
            node,
            refresher,
            accounting,
        }
    }

    pub async fn submit(&self, record: &BlockRecord, ip: &str) -> Outcome {
        let share = &record.share;
        let height = share.height;
        metrics::inc_block_submit_attempts();

        match self.node.submit_work(&share.params).await {
            Ok(true) => {}
            Ok(false) => {
                metrics::inc_block_submit_rejected();
                tracing::warn!(
                    "Block rejected by node at height {} from {}@{} ({})",
                    height, share.login, ip, share.worker
                );
                return Outcome::BlockRejected {
                    height,
                    reason: RejectReason::NodeRejected,
                };
            }
            Err(e) => {
                tracing::error!(
                    "Block submission failure at height {} from {}@{}: {:#}",
                    height, share.login, ip, e
                );
                return Outcome::SubmissionError;
            }
        }

        // The tip moved; miners need new work before the record is written.
        if let Err(e) = self.refresher.refresh().await {
            tracing::error!("Template refresh after block {} failed: {:#}", height, e);
        }

        match self.accounting.record_block(record).await {
            Ok(true) => {
                metrics::inc_block_submit_rejected();
                tracing::warn!(
                    "Duplicate block candidate at height {} from {}@{}, not credited",
                    height, share.login, ip
                );
                Outcome::BlockRejected {
                    height,
                    reason: RejectReason::DuplicateCredit,
                }
            }
            Ok(false) => {
                metrics::inc_blocks_found();
                tracing::info!(
                    "Block found by miner {}@{} ({}) at height {}",
                    share.login, ip, share.worker, height
                );
                Outcome::BlockFound { height }
            }
            Err(e) => {
                metrics::inc_redis_errors();
                metrics::inc_blocks_found();
                tracing::error!(
                    "Block found by miner {}@{} at height {} but backend insert failed: {:#}",
                    share.login, ip, height, e
                );
                Outcome::BlockFound { height }
            }
        }
    }
}
