//! Etchash light verification
//!
//! Ethash as run on Ethereum Classic. From the ECIP-1099 activation block
//! onwards the epoch length doubles from 30 000 to 60 000 blocks. Cache
//! and dataset sizes and the seed hash keep the legacy 30 000-block
//! numbering, so post-fork epoch `n` uses the parameters of legacy epoch
//! `2n`.
//!
//! Verification needs only the light cache (16 MiB at genesis, growing
//! each epoch). It is generated once per epoch and the few most recent
//! caches are kept in memory.

use super::{PowHasher, WorkCandidate};
use crate::consensus;
use num_traits::Zero;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use sha3::{Digest, Keccak256, Keccak512};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

pub const EPOCH_LENGTH_DEFAULT: u64 = 30_000;
pub const EPOCH_LENGTH_ECIP1099: u64 = 60_000;

/// Heights at or beyond `EPOCH_LENGTH_DEFAULT * MAX_EPOCH` are rejected.
const MAX_EPOCH: u64 = 2048;

const HASH_BYTES: usize = 64;
const HASH_WORDS: usize = 16;
const MIX_BYTES: usize = 128;
const MIX_WORDS: usize = 32;
const CACHE_BYTES_INIT: u64 = 1 << 24;
const CACHE_BYTES_GROWTH: u64 = 1 << 17;
const DATASET_BYTES_INIT: u64 = 1 << 30;
const DATASET_BYTES_GROWTH: u64 = 1 << 23;
const CACHE_ROUNDS: usize = 3;
const DATASET_PARENTS: u32 = 256;
const LOOP_ACCESSES: usize = 64;
const FNV_PRIME: u32 = 0x0100_0193;

/// Light caches kept in memory: the current epoch plus its neighbours.
const CACHES_KEPT: usize = 3;

/// Epoch a block height belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    pub number: u64,
    pub length: u64,
}

impl Epoch {
    pub fn for_block(height: u64, ecip1099_block: u64) -> Self {
        let length = if height >= ecip1099_block {
            EPOCH_LENGTH_ECIP1099
        } else {
            EPOCH_LENGTH_DEFAULT
        };
        Self {
            number: height / length,
            length,
        }
    }

    /// Epoch number under the 30 000-block rule; drives sizes and seed.
    pub fn legacy_number(&self) -> u64 {
        (self.number * self.length + 1) / EPOCH_LENGTH_DEFAULT
    }

    pub fn cache_size(&self) -> usize {
        cache_size(self.legacy_number())
    }

    pub fn dataset_size(&self) -> u64 {
        dataset_size(self.legacy_number())
    }

    pub fn seed_hash(&self) -> [u8; 32] {
        seed_hash(self.legacy_number())
    }
}

/// Light cache size in bytes for a legacy epoch.
pub fn cache_size(legacy_epoch: u64) -> usize {
    let mut size = CACHE_BYTES_INIT + CACHE_BYTES_GROWTH * legacy_epoch - HASH_BYTES as u64;
    while !is_prime(size / HASH_BYTES as u64) {
        size -= 2 * HASH_BYTES as u64;
    }
    size as usize
}

/// Full dataset size in bytes for a legacy epoch.
pub fn dataset_size(legacy_epoch: u64) -> u64 {
    let mut size = DATASET_BYTES_INIT + DATASET_BYTES_GROWTH * legacy_epoch - MIX_BYTES as u64;
    while !is_prime(size / MIX_BYTES as u64) {
        size -= 2 * MIX_BYTES as u64;
    }
    size
}

/// Keccak-256 applied `legacy_epoch` times to 32 zero bytes.
pub fn seed_hash(legacy_epoch: u64) -> [u8; 32] {
    let mut seed = [0u8; 32];
    for _ in 0..legacy_epoch {
        seed = keccak256(&seed);
    }
    seed
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut i = 3u64;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

fn keccak512(data: &[u8]) -> [u8; HASH_BYTES] {
    let mut out = [0u8; HASH_BYTES];
    out.copy_from_slice(&Keccak512::digest(data));
    out
}

#[inline]
fn fnv(a: u32, b: u32) -> u32 {
    a.wrapping_mul(FNV_PRIME) ^ b
}

fn fnv_hash(mix: &mut [u32], data: &[u32]) {
    for (m, d) in mix.iter_mut().zip(data) {
        *m = fnv(*m, *d);
    }
}

fn words_le(bytes: &[u8; HASH_BYTES]) -> [u32; HASH_WORDS] {
    let mut words = [0u32; HASH_WORDS];
    for (w, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *w = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

fn bytes_le(words: &[u32; HASH_WORDS]) -> [u8; HASH_BYTES] {
    let mut bytes = [0u8; HASH_BYTES];
    for (chunk, w) in bytes.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&w.to_le_bytes());
    }
    bytes
}

/// Ethash light cache, stored as little-endian 32-bit words.
pub struct LightCache {
    words: Vec<u32>,
}

impl LightCache {
    /// Sequential Keccak-512 fill followed by `CACHE_ROUNDS` of RandMemoHash.
    pub fn generate(size: usize, seed: &[u8; 32]) -> Self {
        let rows = (size / HASH_BYTES).max(1);
        let mut items: Vec<[u8; HASH_BYTES]> = Vec::with_capacity(rows);

        let mut item = keccak512(seed);
        items.push(item);
        for _ in 1..rows {
            item = keccak512(&item);
            items.push(item);
        }

        for _ in 0..CACHE_ROUNDS {
            for i in 0..rows {
                let src = (i + rows - 1) % rows;
                let head = u32::from_le_bytes([items[i][0], items[i][1], items[i][2], items[i][3]]);
                let xor = head as usize % rows;

                let mut temp = [0u8; HASH_BYTES];
                for (k, t) in temp.iter_mut().enumerate() {
                    *t = items[src][k] ^ items[xor][k];
                }
                items[i] = keccak512(&temp);
            }
        }

        let words = items.iter().flat_map(|row| words_le(row)).collect();
        Self { words }
    }

    pub fn size_bytes(&self) -> usize {
        self.words.len() * 4
    }

    fn rows(&self) -> u32 {
        (self.words.len() / HASH_WORDS) as u32
    }

    /// One 64-byte dataset node derived from the cache.
    fn dataset_item(&self, index: u32) -> [u32; HASH_WORDS] {
        let rows = self.rows();
        let base = (index % rows) as usize * HASH_WORDS;

        let mut seed = [0u32; HASH_WORDS];
        seed.copy_from_slice(&self.words[base..base + HASH_WORDS]);
        seed[0] ^= index;
        let mut mix = words_le(&keccak512(&bytes_le(&seed)));

        for j in 0..DATASET_PARENTS {
            let parent = (fnv(index ^ j, mix[(j % HASH_WORDS as u32) as usize]) % rows) as usize;
            let offset = parent * HASH_WORDS;
            fnv_hash(&mut mix, &self.words[offset..offset + HASH_WORDS]);
        }

        words_le(&keccak512(&bytes_le(&mix)))
    }
}

/// Hashimoto over dataset nodes computed on demand from the light cache.
///
/// Returns `(mix_digest, result)`.
pub fn hashimoto_light(
    dataset_size: u64,
    cache: &LightCache,
    hash_no_nonce: &[u8; 32],
    nonce: u64,
) -> ([u8; 32], [u8; 32]) {
    let rows = ((dataset_size / MIX_BYTES as u64) as u32).max(1);

    let mut seed_input = [0u8; 40];
    seed_input[..32].copy_from_slice(hash_no_nonce);
    seed_input[32..].copy_from_slice(&nonce.to_le_bytes());
    let seed = keccak512(&seed_input);
    let seed_words = words_le(&seed);
    let seed_head = seed_words[0];

    let mut mix = [0u32; MIX_WORDS];
    for (i, m) in mix.iter_mut().enumerate() {
        *m = seed_words[i % HASH_WORDS];
    }

    let mut temp = [0u32; MIX_WORDS];
    for i in 0..LOOP_ACCESSES {
        let parent = fnv(i as u32 ^ seed_head, mix[i % MIX_WORDS]) % rows;
        for j in 0..(MIX_BYTES / HASH_BYTES) {
            let item = cache.dataset_item(2 * parent + j as u32);
            temp[j * HASH_WORDS..(j + 1) * HASH_WORDS].copy_from_slice(&item);
        }
        fnv_hash(&mut mix, &temp);
    }

    let mut digest = [0u8; 32];
    for (i, chunk) in digest.chunks_exact_mut(4).enumerate() {
        let w = fnv(fnv(fnv(mix[4 * i], mix[4 * i + 1]), mix[4 * i + 2]), mix[4 * i + 3]);
        chunk.copy_from_slice(&w.to_le_bytes());
    }

    let mut result_input = [0u8; HASH_BYTES + 32];
    result_input[..HASH_BYTES].copy_from_slice(&seed);
    result_input[HASH_BYTES..].copy_from_slice(&digest);

    (digest, keccak256(&result_input))
}

/// Mix digest must match and the result must meet the candidate's difficulty.
pub fn check_solution(dataset_size: u64, cache: &LightCache, candidate: &WorkCandidate) -> bool {
    if candidate.difficulty.is_zero() {
        return false;
    }
    let (digest, result) = hashimoto_light(
        dataset_size,
        cache,
        &candidate.hash_no_nonce,
        candidate.nonce,
    );
    if digest != candidate.mix_digest {
        return false;
    }
    consensus::meets_difficulty(&result, &candidate.difficulty)
}

struct CacheSlots<T> {
    slots: HashMap<u64, Arc<OnceCell<Arc<T>>>>,
    order: VecDeque<u64>,
}

/// Bounded per-epoch memo. Concurrent callers for the same epoch block on
/// a single generation; different epochs generate independently.
pub struct EpochCaches<T> {
    inner: Mutex<CacheSlots<T>>,
    capacity: usize,
}

impl<T> EpochCaches<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheSlots {
                slots: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_generate<F>(&self, key: u64, generate: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        let cell = {
            let mut inner = self.inner.lock();
            let existing = inner.slots.get(&key).cloned();
            match existing {
                Some(cell) => cell,
                None => {
                    let cell = Arc::new(OnceCell::new());
                    inner.slots.insert(key, cell.clone());
                    inner.order.push_back(key);
                    while inner.order.len() > self.capacity {
                        if let Some(oldest) = inner.order.pop_front() {
                            inner.slots.remove(&oldest);
                        }
                    }
                    cell
                }
            }
        };

        // Generation runs outside the map lock.
        cell.get_or_init(|| Arc::new(generate())).clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Etchash verifier for one chain's fork schedule.
pub struct Etchash {
    ecip1099_block: u64,
    caches: EpochCaches<LightCache>,
}

impl Etchash {
    pub fn new(ecip1099_block: u64) -> Self {
        log::info!("Etchash verifier: ECIP-1099 activation at block {}", ecip1099_block);
        Self {
            ecip1099_block,
            caches: EpochCaches::new(CACHES_KEPT),
        }
    }

    pub fn ecip1099_block(&self) -> u64 {
        self.ecip1099_block
    }

    pub fn epoch(&self, height: u64) -> Epoch {
        Epoch::for_block(height, self.ecip1099_block)
    }

    pub fn light_cache(&self, epoch: Epoch) -> Arc<LightCache> {
        self.caches.get_or_generate(epoch.legacy_number(), || {
            let started = Instant::now();
            log::info!(
                "Generating etchash light cache: epoch={} length={} legacy_epoch={} size={}",
                epoch.number,
                epoch.length,
                epoch.legacy_number(),
                epoch.cache_size()
            );
            let cache = LightCache::generate(epoch.cache_size(), &epoch.seed_hash());
            log::info!(
                "Etchash light cache for epoch {} ready in {:.1}s",
                epoch.number,
                started.elapsed().as_secs_f64()
            );
            cache
        })
    }
}

impl PowHasher for Etchash {
    fn name(&self) -> &'static str {
        "etchash"
    }

    fn verify(&self, candidate: &WorkCandidate) -> bool {
        if candidate.height >= EPOCH_LENGTH_DEFAULT * MAX_EPOCH {
            return false;
        }
        if candidate.difficulty.is_zero() {
            return false;
        }
        let epoch = self.epoch(candidate.height);
        let cache = self.light_cache(epoch);
        check_solution(epoch.dataset_size(), &cache, candidate)
    }
}
