//! Inbound submission fields.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionParseError {
    #[error("expected [nonce, header, mix_digest], got {0} params")]
    MissingParams(usize),
}

/// `eth_submitWork` params as the miner sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedWork {
    pub nonce: String,
    pub hash_no_nonce: String,
    pub mix_digest: String,
}

impl SubmittedWork {
    pub fn new(
        nonce: impl Into<String>,
        hash_no_nonce: impl Into<String>,
        mix_digest: impl Into<String>,
    ) -> Self {
        Self {
            nonce: nonce.into(),
            hash_no_nonce: hash_no_nonce.into(),
            mix_digest: mix_digest.into(),
        }
    }

    /// The first three positional params; extra params are ignored.
    pub fn from_params(params: &[String]) -> Result<Self, SubmissionParseError> {
        match params {
            [nonce, hash, mix, ..] => Ok(Self::new(nonce.as_str(), hash.as_str(), mix.as_str())),
            _ => Err(SubmissionParseError::MissingParams(params.len())),
        }
    }

    /// Raw params, forwarded verbatim to the node.
    pub fn params(&self) -> Vec<String> {
        vec![
            self.nonce.clone(),
            self.hash_no_nonce.clone(),
            self.mix_digest.clone(),
        ]
    }

    pub fn parse_nonce(&self) -> Option<u64> {
        parse_nonce(&self.nonce)
    }
}

/// Every `0x` occurrence is removed before parsing base-16. Only hex
/// digits are accepted, so a leading sign is rejected.
pub fn parse_nonce(s: &str) -> Option<u64> {
    let clean = s.replace("0x", "");
    if clean.is_empty() || !clean.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(&clean, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_params() {
        let params = vec!["0x1".to_string(), "0x2".to_string(), "0x3".to_string()];
        let work = SubmittedWork::from_params(&params).unwrap();
        assert_eq!(work, SubmittedWork::new("0x1", "0x2", "0x3"));
        assert_eq!(work.params(), params);

        assert_eq!(
            SubmittedWork::from_params(&params[..2]),
            Err(SubmissionParseError::MissingParams(2))
        );
    }

    #[test]
    fn test_parse_nonce() {
        assert_eq!(parse_nonce("0x00000000000000ff"), Some(255));
        assert_eq!(parse_nonce("ff"), Some(255));
        assert_eq!(parse_nonce("0xffffffffffffffff"), Some(u64::MAX));
        assert_eq!(parse_nonce("0x"), None);
        assert_eq!(parse_nonce("0xnothex"), None);
        assert_eq!(parse_nonce("0x1ffffffffffffffff"), None);
        assert_eq!(parse_nonce("+ff"), None);
        assert_eq!(parse_nonce("0x+ff"), None);
        assert_eq!(parse_nonce("-1"), None);
    }
}
