//! Difficulty and target arithmetic.
//!
//! Ethash targets are `2^256 / difficulty`; a PoW result (big-endian,
//! 32 bytes) satisfies a difficulty when it is not above the target.

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// 2^256.
pub fn pow256() -> BigUint {
    BigUint::one() << 256u32
}

/// Target for `difficulty`, or `None` for a zero difficulty.
pub fn target_from_difficulty(difficulty: &BigUint) -> Option<BigUint> {
    if difficulty.is_zero() {
        return None;
    }
    Some(pow256() / difficulty)
}

/// Difficulty encoded by a hex target (as returned by `eth_getWork`).
pub fn difficulty_from_target_hex(target: &str) -> Option<BigUint> {
    let t = parse_hex_biguint(target)?;
    if t.is_zero() {
        return None;
    }
    Some(pow256() / t)
}

/// `0x`-prefixed, 64 hex digit target for a pool share difficulty.
pub fn target_hex_from_difficulty(difficulty: u64) -> String {
    let d = BigUint::from(difficulty.max(1));
    // d >= 1, so the target always exists.
    let target = pow256() / d;
    let mut hex = target.to_str_radix(16);
    if hex.len() > 64 {
        // difficulty 1 yields 2^256, which does not fit in 32 bytes
        hex = "f".repeat(64);
    }
    format!("0x{:0>64}", hex)
}

/// Whether a big-endian PoW result meets `difficulty`.
pub fn meets_difficulty(result: &[u8; 32], difficulty: &BigUint) -> bool {
    match target_from_difficulty(difficulty) {
        Some(target) => BigUint::from_bytes_be(result) <= target,
        None => false,
    }
}

/// Parse a hex quantity with optional `0x` prefix.
pub fn parse_hex_biguint(s: &str) -> Option<BigUint> {
    let clean = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    if clean.is_empty() || !clean.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    BigUint::parse_bytes(clean.as_bytes(), 16)
}

/// Parse a hex quantity that must fit in a `u64`.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let clean = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    if clean.is_empty() || !clean.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(clean, 16).ok()
}

/// Decode a fixed-width chain hash. Shorter input is left-padded with
/// zeros; more than 64 hex digits or a non-hex digit is rejected.
pub fn parse_hash32(s: &str) -> Option<[u8; 32]> {
    let clean = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    if clean.len() > 64 {
        return None;
    }
    let padded = format!("{:0>64}", clean);
    let mut out = [0u8; 32];
    hex::decode_to_slice(padded, &mut out).ok()?;
    Some(out)
}

/// Canonical `0x`-prefixed lowercase form of a 32-byte hash.
pub fn hash_hex(hash: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(hash))
}
