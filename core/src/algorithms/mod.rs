/// Proof-of-work verification
///
/// The pool never mines; it only checks solutions submitted by miners.
/// A solution is checked as a [`WorkCandidate`] against one difficulty at
/// a time, so the same solution can be evaluated at the pool's share
/// difficulty and at the network difficulty without re-parsing it.

pub mod etchash;

use num_bigint::BigUint;

pub use etchash::Etchash;

/// A miner's solution paired with the difficulty it is judged against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkCandidate {
    pub height: u64,
    pub hash_no_nonce: [u8; 32],
    pub difficulty: BigUint,
    pub nonce: u64,
    pub mix_digest: [u8; 32],
}

impl WorkCandidate {
    /// Same solution, different threshold.
    pub fn with_difficulty(&self, difficulty: BigUint) -> Self {
        Self {
            difficulty,
            ..self.clone()
        }
    }
}

/// Deterministic, side-effect free solution check.
pub trait PowHasher: Send + Sync {
    fn name(&self) -> &'static str;

    fn verify(&self, candidate: &WorkCandidate) -> bool;
}
