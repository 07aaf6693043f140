use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};
use prometheus::core::Collector;
use std::sync::OnceLock;

static ACCEPTED: OnceLock<IntCounter> = OnceLock::new();
static REJECTED: OnceLock<IntCounterVec> = OnceLock::new();
static BLOCKS_FOUND: OnceLock<IntCounter> = OnceLock::new();

static RPC_REQUESTS: OnceLock<IntCounter> = OnceLock::new();
static RPC_ERRORS: OnceLock<IntCounter> = OnceLock::new();
static TEMPLATE_UPDATES: OnceLock<IntCounter> = OnceLock::new();
static TEMPLATE_FETCH_ERRORS: OnceLock<IntCounter> = OnceLock::new();
static BLOCK_SUBMIT_ATTEMPTS: OnceLock<IntCounter> = OnceLock::new();
static BLOCK_SUBMIT_REJECTED: OnceLock<IntCounter> = OnceLock::new();

static REDIS_ERRORS: OnceLock<IntCounter> = OnceLock::new();
static REDIS_UP: OnceLock<IntGauge> = OnceLock::new();
static TEMPLATE_HEIGHT: OnceLock<IntGauge> = OnceLock::new();

fn accepted() -> &'static IntCounter {
    ACCEPTED.get_or_init(|| IntCounter::new("shares_accepted_total", "Total accepted shares").unwrap())
}

fn rejected() -> &'static IntCounterVec {
    REJECTED.get_or_init(|| {
        IntCounterVec::new(
            Opts::new("shares_rejected_total", "Total rejected shares by reason"),
            &["reason"],
        )
        .unwrap()
    })
}

fn blocks_found() -> &'static IntCounter {
    BLOCKS_FOUND.get_or_init(|| IntCounter::new("blocks_found_total", "Total blocks accepted by the node").unwrap())
}

fn rpc_requests() -> &'static IntCounter {
    RPC_REQUESTS
        .get_or_init(|| IntCounter::new("rpc_requests_total", "Total RPC requests to the node").unwrap())
}

fn rpc_errors() -> &'static IntCounter {
    RPC_ERRORS.get_or_init(|| IntCounter::new("rpc_errors_total", "Total RPC errors").unwrap())
}

fn template_updates() -> &'static IntCounter {
    TEMPLATE_UPDATES
        .get_or_init(|| IntCounter::new("block_template_updates_total", "Total template updates").unwrap())
}

fn template_fetch_errors() -> &'static IntCounter {
    TEMPLATE_FETCH_ERRORS.get_or_init(|| {
        IntCounter::new(
            "block_template_fetch_errors_total",
            "Total template fetch errors",
        )
        .unwrap()
    })
}

fn block_submit_attempts() -> &'static IntCounter {
    BLOCK_SUBMIT_ATTEMPTS.get_or_init(|| {
        IntCounter::new(
            "block_submit_attempts_total",
            "Total eth_submitWork calls for block candidates",
        )
        .unwrap()
    })
}

fn block_submit_rejected() -> &'static IntCounter {
    BLOCK_SUBMIT_REJECTED.get_or_init(|| {
        IntCounter::new(
            "block_submit_rejected_total",
            "Total block candidates rejected by the node or as duplicates",
        )
        .unwrap()
    })
}

fn redis_errors() -> &'static IntCounter {
    REDIS_ERRORS.get_or_init(|| IntCounter::new("redis_errors_total", "Total accounting write failures").unwrap())
}

fn redis_up() -> &'static IntGauge {
    REDIS_UP.get_or_init(|| IntGauge::new("redis_up", "Redis reachable (1/0)").unwrap())
}

fn template_height() -> &'static IntGauge {
    TEMPLATE_HEIGHT.get_or_init(|| IntGauge::new("block_template_height", "Current block template height").unwrap())
}

pub fn inc_accepted() {
    accepted().inc();
}

pub fn inc_rejected(reason: &str) {
    rejected().with_label_values(&[reason]).inc();
}

pub fn inc_blocks_found() {
    blocks_found().inc();
}

pub fn inc_rpc_requests() {
    rpc_requests().inc();
}

pub fn inc_rpc_errors() {
    rpc_errors().inc();
}

pub fn inc_template_updates() {
    template_updates().inc();
}

pub fn inc_template_fetch_errors() {
    template_fetch_errors().inc();
}

pub fn inc_block_submit_attempts() {
    block_submit_attempts().inc();
}

pub fn inc_block_submit_rejected() {
    block_submit_rejected().inc();
}

pub fn inc_redis_errors() {
    redis_errors().inc();
}

pub fn set_redis_up(up: bool) {
    redis_up().set(if up { 1 } else { 0 });
}

pub fn set_template_height(height: u64) {
    template_height().set(height as i64);
}

pub fn render() -> String {
    let enc = TextEncoder::new();
    let mut mfs = Vec::new();

    mfs.extend(accepted().collect());
    mfs.extend(rejected().collect());
    mfs.extend(blocks_found().collect());
    mfs.extend(rpc_requests().collect());
    mfs.extend(rpc_errors().collect());
    mfs.extend(template_updates().collect());
    mfs.extend(template_fetch_errors().collect());
    mfs.extend(block_submit_attempts().collect());
    mfs.extend(block_submit_rejected().collect());
    mfs.extend(redis_errors().collect());
    mfs.extend(redis_up().collect());
    mfs.extend(template_height().collect());

    let mut buf = Vec::new();
    let _ = enc.encode(&mfs, &mut buf);
    String::from_utf8_lossy(&buf).to_string()
}
