//! Network hasher registry.
//!
//! Maps the configured chain id to its fork schedule and builds the
//! proof-of-work verifier for it exactly once.

use etc_core::algorithms::{Etchash, PowHasher};
use etc_core::network::ForkSchedule;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown network configuration: {0}")]
    UnknownNetwork(String),
    #[error("hasher already initialised for {initialised}, cannot serve {requested}")]
    ChainMismatch {
        initialised: String,
        requested: String,
    },
}

/// Builds the verifier for a fork schedule.
pub type HasherFactory = Box<dyn Fn(&ForkSchedule) -> Arc<dyn PowHasher> + Send + Sync>;

pub struct HasherRegistry {
    schedules: Vec<ForkSchedule>,
    factory: HasherFactory,
    hasher: OnceCell<(String, Arc<dyn PowHasher>)>,
}

impl HasherRegistry {
    pub fn new(schedules: Vec<ForkSchedule>, factory: HasherFactory) -> Self {
        Self {
            schedules,
            factory,
            hasher: OnceCell::new(),
        }
    }

    /// Etchash for every known chain.
    pub fn etchash() -> Self {
        Self::new(
            ForkSchedule::defaults(),
            Box::new(|schedule: &ForkSchedule| -> Arc<dyn PowHasher> {
                Arc::new(Etchash::new(schedule.ecip1099_block))
            }),
        )
    }

    /// Case-sensitive lookup of a chain's schedule.
    pub fn schedule(&self, chain_id: &str) -> Option<&ForkSchedule> {
        self.schedules.iter().find(|s| s.chain == chain_id)
    }

    /// The process-wide verifier. A failed lookup is not memoised and
    /// builds nothing; concurrent first callers share one construction.
    pub fn get_hasher(&self, chain_id: &str) -> Result<Arc<dyn PowHasher>, RegistryError> {
        let (chain, hasher) = self.hasher.get_or_try_init(|| -> Result<_, RegistryError> {
            let schedule = self
                .schedule(chain_id)
                .ok_or_else(|| RegistryError::UnknownNetwork(chain_id.to_string()))?;
            let hasher = (self.factory)(schedule);
            tracing::info!(
                "Initialised {} verifier for {} (ECIP-1099 at block {})",
                hasher.name(),
                schedule.chain,
                schedule.ecip1099_block
            );
            Ok((schedule.chain.clone(), hasher))
        })?;

        if chain != chain_id {
            return Err(RegistryError::ChainMismatch {
                initialised: chain.clone(),
                requested: chain_id.to_string(),
            });
        }
        Ok(hasher.clone())
    }
}
