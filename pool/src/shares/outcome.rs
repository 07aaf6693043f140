//! Terminal result of one submission.

use std::fmt;

use super::hasher::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `eth_submitWork` returned false.
    NodeRejected,
    /// The node took the block but the pool already credited it.
    DuplicateCredit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    ValidShare,
    DuplicateShare,
    BlockFound { height: u64 },
    BlockRejected { height: u64, reason: RejectReason },
    SubmissionError,
    Stale,
    Invalid,
    MalformedNonce,
    MalformedRequest,
    ConfigError(RegistryError),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::ValidShare | Outcome::BlockFound { .. })
    }

    /// Stratum-style `(code, message)` for a miner-visible rejection.
    pub fn stratum_error(&self) -> Option<(i32, &'static str)> {
        match self {
            Outcome::ValidShare | Outcome::BlockFound { .. } => None,
            Outcome::Stale => Some((21, "Stale share")),
            Outcome::DuplicateShare => Some((22, "Duplicate share")),
            Outcome::BlockRejected {
                reason: RejectReason::DuplicateCredit,
                ..
            } => Some((22, "Duplicate share")),
            Outcome::Invalid => Some((23, "Invalid share")),
            Outcome::BlockRejected {
                reason: RejectReason::NodeRejected,
                ..
            } => Some((20, "Block rejected")),
            Outcome::SubmissionError => Some((20, "Block submission failed")),
            Outcome::MalformedNonce => Some((20, "Malformed nonce")),
            Outcome::MalformedRequest => Some((20, "Malformed request")),
            Outcome::ConfigError(_) => Some((20, "Pool misconfigured")),
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::ValidShare => "valid",
            Outcome::DuplicateShare => "duplicate",
            Outcome::BlockFound { .. } => "block",
            Outcome::BlockRejected { .. } => "block_rejected",
            Outcome::SubmissionError => "submission_error",
            Outcome::Stale => "stale",
            Outcome::Invalid => "invalid",
            Outcome::MalformedNonce => "malformed_nonce",
            Outcome::MalformedRequest => "malformed_request",
            Outcome::ConfigError(_) => "config_error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::BlockFound { height } => write!(f, "block found at height {}", height),
            Outcome::BlockRejected { height, reason } => {
                write!(f, "block rejected at height {} ({:?})", height, reason)
            }
            Outcome::ConfigError(e) => write!(f, "config error: {}", e),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_valid_and_blocks_are_accepted() {
        assert!(Outcome::ValidShare.is_accepted());
        assert!(Outcome::BlockFound { height: 1 }.is_accepted());
        assert!(!Outcome::DuplicateShare.is_accepted());
        assert!(!Outcome::SubmissionError.is_accepted());
        assert!(!Outcome::BlockRejected { height: 1, reason: RejectReason::DuplicateCredit }.is_accepted());
    }

    #[test]
    fn test_stratum_codes() {
        assert_eq!(Outcome::ValidShare.stratum_error(), None);
        assert_eq!(Outcome::Stale.stratum_error().unwrap().0, 21);
        assert_eq!(Outcome::DuplicateShare.stratum_error().unwrap().0, 22);
        assert_eq!(Outcome::Invalid.stratum_error().unwrap().0, 23);
        assert_eq!(Outcome::MalformedNonce.stratum_error().unwrap().0, 20);
        assert_eq!(
            Outcome::BlockRejected { height: 5, reason: RejectReason::DuplicateCredit }
                .stratum_error()
                .unwrap()
                .0,
            22
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Outcome::Stale.to_string(), "stale");
        assert_eq!(Outcome::BlockFound { height: 7 }.to_string(), "block found at height 7");
        assert_eq!(
            Outcome::ConfigError(RegistryError::UnknownNetwork("x".into())).to_string(),
            "config error: unknown network configuration: x"
        );
    }
}
