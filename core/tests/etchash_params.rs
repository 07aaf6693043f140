/// Etchash parameter and verifier tests
///
/// Epoch arithmetic across the ECIP-1099 boundary, cache/dataset sizes
/// and seed hashes for known epochs, and the light verifier on a small
/// synthetic cache.

use etc_core::algorithms::etchash::{
    self, check_solution, hashimoto_light, Epoch, LightCache, EPOCH_LENGTH_DEFAULT,
    EPOCH_LENGTH_ECIP1099,
};
use etc_core::algorithms::{Etchash, PowHasher, WorkCandidate};
use etc_core::network::{Chain, CLASSIC_ECIP1099_BLOCK, MORDOR_ECIP1099_BLOCK};
use num_bigint::BigUint;

// ═══════════════════════════════════════════════════════════════════════════
// 1. Epochs
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_epoch_length_switches_at_activation() {
    let before = Epoch::for_block(CLASSIC_ECIP1099_BLOCK - 1, CLASSIC_ECIP1099_BLOCK);
    let after = Epoch::for_block(CLASSIC_ECIP1099_BLOCK, CLASSIC_ECIP1099_BLOCK);
    assert_eq!(before.length, EPOCH_LENGTH_DEFAULT);
    assert_eq!(after.length, EPOCH_LENGTH_ECIP1099);
}

#[test]
fn test_legacy_epoch_continuous_across_fork() {
    // Last pre-fork block is in legacy epoch 389, the first post-fork
    // block jumps to legacy epoch 390 (post-fork epoch 195).
    let before = Epoch::for_block(CLASSIC_ECIP1099_BLOCK - 1, CLASSIC_ECIP1099_BLOCK);
    let after = Epoch::for_block(CLASSIC_ECIP1099_BLOCK, CLASSIC_ECIP1099_BLOCK);
    assert_eq!(before.legacy_number(), 389);
    assert_eq!(after.number, 195);
    assert_eq!(after.legacy_number(), 390);
}

#[test]
fn test_mordor_uses_its_own_activation() {
    let mordor = Chain::Mordor.ecip1099_block();
    assert_eq!(mordor, MORDOR_ECIP1099_BLOCK);
    assert_eq!(Epoch::for_block(mordor, mordor).length, EPOCH_LENGTH_ECIP1099);
    // Same height is still pre-fork on classic.
    assert_eq!(
        Epoch::for_block(mordor, CLASSIC_ECIP1099_BLOCK).length,
        EPOCH_LENGTH_DEFAULT
    );
}

#[test]
fn test_post_fork_epoch_shares_parameters_with_legacy_epoch() {
    let post = Epoch { number: 200, length: EPOCH_LENGTH_ECIP1099 };
    let legacy = Epoch { number: 400, length: EPOCH_LENGTH_DEFAULT };
    assert_eq!(post.cache_size(), legacy.cache_size());
    assert_eq!(post.dataset_size(), legacy.dataset_size());
    assert_eq!(post.seed_hash(), legacy.seed_hash());
}

// ═══════════════════════════════════════════════════════════════════════════
// 2. Sizes and seeds
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_known_cache_sizes() {
    assert_eq!(etchash::cache_size(0), 16_776_896);
    assert_eq!(etchash::cache_size(1), 16_907_456);
}

#[test]
fn test_known_dataset_sizes() {
    assert_eq!(etchash::dataset_size(0), 1_073_739_904);
    assert_eq!(etchash::dataset_size(1), 1_082_130_304);
}

#[test]
fn test_sizes_grow_with_epoch() {
    for epoch in 0..32 {
        assert!(etchash::cache_size(epoch + 1) > etchash::cache_size(epoch));
        assert!(etchash::dataset_size(epoch + 1) > etchash::dataset_size(epoch));
        assert_eq!(etchash::cache_size(epoch) % 64, 0);
        assert_eq!(etchash::dataset_size(epoch) % 128, 0);
    }
}

#[test]
fn test_known_seed_hashes() {
    assert_eq!(etchash::seed_hash(0), [0u8; 32]);
    assert_eq!(
        hex::encode(etchash::seed_hash(1)),
        "290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// 3. Verifier on a synthetic cache
// ═══════════════════════════════════════════════════════════════════════════

const SMALL_CACHE: usize = 61 * 64;
const SMALL_DATASET: u64 = 127 * 128;

fn solution(cache: &LightCache, nonce: u64) -> WorkCandidate {
    let header = [0x5au8; 32];
    let (mix, _) = hashimoto_light(SMALL_DATASET, cache, &header, nonce);
    WorkCandidate {
        height: 100,
        hash_no_nonce: header,
        difficulty: BigUint::from(1u32),
        nonce,
        mix_digest: mix,
    }
}

#[test]
fn test_solution_passes_at_difficulty_one() {
    let cache = LightCache::generate(SMALL_CACHE, &[1u8; 32]);
    let candidate = solution(&cache, 42);
    assert!(check_solution(SMALL_DATASET, &cache, &candidate));
}

#[test]
fn test_solution_fails_with_other_nonce() {
    let cache = LightCache::generate(SMALL_CACHE, &[1u8; 32]);
    let mut candidate = solution(&cache, 42);
    candidate.nonce = 43;
    assert!(!check_solution(SMALL_DATASET, &cache, &candidate));
}

#[test]
fn test_result_decides_difficulty() {
    let cache = LightCache::generate(SMALL_CACHE, &[1u8; 32]);
    let candidate = solution(&cache, 7);
    let (_, result) = hashimoto_light(SMALL_DATASET, &cache, &candidate.hash_no_nonce, 7);

    // The largest difficulty the result satisfies is floor(2^256 / result).
    let value = BigUint::from_bytes_be(&result);
    let max_difficulty = etc_core::consensus::pow256() / &value;
    assert!(check_solution(
        SMALL_DATASET,
        &cache,
        &candidate.with_difficulty(max_difficulty.clone())
    ));
    assert!(!check_solution(
        SMALL_DATASET,
        &cache,
        &candidate.with_difficulty(max_difficulty + 1u32)
    ));
}

#[test]
fn test_etchash_name_and_activation() {
    let hasher = Etchash::new(CLASSIC_ECIP1099_BLOCK);
    assert_eq!(hasher.name(), "etchash");
    assert_eq!(hasher.ecip1099_block(), CLASSIC_ECIP1099_BLOCK);
    assert_eq!(hasher.epoch(CLASSIC_ECIP1099_BLOCK).legacy_number(), 390);
}

// ═══════════════════════════════════════════════════════════════════════════
// 4. Known-answer vectors (go-ethereum light client)
// ═══════════════════════════════════════════════════════════════════════════

const KAT_HEADER: &str = "c9149cc0386e689d789a1c2f3d5d169a61a6218ed30e74414dc736e442ef3d1f";
const KAT_DIGEST: &str = "e4073cffaef931d37117cefd9afd27ea0f1cad6a981dd2605c4a1ac97c519800";
const KAT_RESULT: &str = "d3539235ee2e6f8db665c0a72169f55b7f6c605712330b778ec3944f0eb5a557";
const KAT_DATASET: u64 = 32 * 1024;

fn kat_header() -> [u8; 32] {
    let mut header = [0u8; 32];
    hex::decode_to_slice(KAT_HEADER, &mut header).unwrap();
    header
}

#[test]
fn test_hashimoto_light_known_answer() {
    let cache = LightCache::generate(1024, &[0u8; 32]);
    let (digest, result) = hashimoto_light(KAT_DATASET, &cache, &kat_header(), 0);
    assert_eq!(hex::encode(digest), KAT_DIGEST);
    assert_eq!(hex::encode(result), KAT_RESULT);
}

#[test]
fn test_check_solution_known_answer() {
    let cache = LightCache::generate(1024, &[0u8; 32]);
    let mut mix = [0u8; 32];
    hex::decode_to_slice(KAT_DIGEST, &mut mix).unwrap();
    let candidate = WorkCandidate {
        height: 0,
        hash_no_nonce: kat_header(),
        difficulty: BigUint::from(1u32),
        nonce: 0,
        mix_digest: mix,
    };
    assert!(check_solution(KAT_DATASET, &cache, &candidate));

    // Result 0xd353... is above 2^256 / 2, so difficulty 2 already fails.
    assert!(!check_solution(KAT_DATASET, &cache, &candidate.with_difficulty(BigUint::from(2u32))));
}
