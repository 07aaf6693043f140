use anyhow::Result;
use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use num_bigint::BigUint;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use etc_core::algorithms::etchash::{hashimoto_light, LightCache};
use etc_core::algorithms::{PowHasher, WorkCandidate};
use etc_core::consensus;
use etc_core::network::ForkSchedule;
use etc_pool::blockchain::{NodeClient, PendingBlock, TemplateCache, TemplateRefresher, TemplateSet, Work, WorkTemplate};
use etc_pool::shares::{
    AccountingSink, BlockRecord, BlockSubmitter, HasherRegistry, ShareRecord, ShareValidator,
    SubmittedWork,
};

// Small synthetic epoch so the bench measures hashing, not cache generation.
const CACHE_BYTES: usize = 61 * 64;
const DATASET_BYTES: u64 = 127 * 128;

fn bench_hashimoto_light(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashimoto_light");
    let cache = LightCache::generate(CACHE_BYTES, &[0u8; 32]);
    let header = [0x42u8; 32];

    for nonce in [0u64, 1 << 32, u64::MAX] {
        group.bench_with_input(BenchmarkId::new("verify", nonce), &nonce, |b, &nonce| {
            b.iter(|| {
                black_box(hashimoto_light(
                    black_box(DATASET_BYTES),
                    &cache,
                    black_box(&header),
                    black_box(nonce),
                ))
            });
        });
    }

    group.finish();
}

fn bench_light_cache_generation(c: &mut Criterion) {
    c.bench_function("light_cache_generate", |b| {
        b.iter(|| black_box(LightCache::generate(black_box(CACHE_BYTES), &[7u8; 32])));
    });
}

/// Accepts everything up to the share difficulty, never a block.
struct ShareOnly;

impl PowHasher for ShareOnly {
    fn name(&self) -> &'static str {
        "share-only"
    }

    fn verify(&self, candidate: &WorkCandidate) -> bool {
        candidate.difficulty <= BigUint::from(10u32)
    }
}

struct IdleNode;

#[async_trait]
impl NodeClient for IdleNode {
    async fn get_work(&self) -> Result<Work> {
        anyhow::bail!("idle")
    }

    async fn get_pending_block(&self) -> Result<PendingBlock> {
        anyhow::bail!("idle")
    }

    async fn submit_work(&self, _params: &[String]) -> Result<bool> {
        Ok(false)
    }
}

#[async_trait]
impl TemplateRefresher for IdleNode {
    async fn refresh(&self) -> Result<bool> {
        Ok(false)
    }
}

struct NullSink;

#[async_trait]
impl AccountingSink for NullSink {
    async fn record_share(&self, _record: &ShareRecord) -> Result<bool> {
        Ok(false)
    }

    async fn record_block(&self, _record: &BlockRecord) -> Result<bool> {
        Ok(false)
    }
}

fn validator(templates: Arc<TemplateCache>) -> ShareValidator {
    let registry = Arc::new(HasherRegistry::new(
        ForkSchedule::defaults(),
        Box::new(|_: &ForkSchedule| -> Arc<dyn PowHasher> { Arc::new(ShareOnly) }),
    ));
    let node = Arc::new(IdleNode);
    let sink = Arc::new(NullSink);
    let submitter = Arc::new(BlockSubmitter::new(node.clone(), node, sink.clone()));
    ShareValidator::new(
        "classic",
        registry,
        templates,
        submitter,
        sink,
        10,
        Duration::from_secs(10_800),
    )
}

fn bench_validator_pipeline(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let header = consensus::hash_hex(&[7u8; 32]);
    let mut headers = HashMap::new();
    headers.insert(
        header.clone(),
        WorkTemplate {
            height: 100,
            difficulty: BigUint::from(1000u32),
            header: [7u8; 32],
        },
    );
    let set = TemplateSet {
        header: header.clone(),
        height: 100,
        difficulty: BigUint::from(1000u32),
        headers,
        ..TemplateSet::default()
    };
    let templates = Arc::new(TemplateCache::new());
    rt.block_on(templates.replace(set));

    let validator = validator(templates);
    let share = SubmittedWork::new("0x01", header.clone(), consensus::hash_hex(&[0x11u8; 32]));
    let stale = SubmittedWork::new("0x01", consensus::hash_hex(&[9u8; 32]), consensus::hash_hex(&[0x11u8; 32]));
    let login = format!("0x{}", "ab".repeat(20));

    let mut group = c.benchmark_group("validator");
    group.bench_function("valid_share", |b| {
        b.to_async(&rt)
            .iter(|| validator.validate(&login, "rig1", "10.0.0.1", black_box(&share)));
    });
    group.bench_function("stale_share", |b| {
        b.to_async(&rt)
            .iter(|| validator.validate(&login, "rig1", "10.0.0.1", black_box(&stale)));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_hashimoto_light,
    bench_light_cache_generation,
    bench_validator_pipeline
);
criterion_main!(benches);
