// ETC Pool - share validation, block submission and accounting
//
// Core: getwork endpoint, Etchash verification, block templates, Redis accounting

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use etc_pool::api::{self, ApiState};
use etc_pool::blockchain::{BlockTemplateManager, EtcRpcClient, TemplateCache, TemplateRefresher};
use etc_pool::config::Config;
use etc_pool::metrics::prometheus as metrics;
use etc_pool::shares::{BlockSubmitter, HasherRegistry, RedisStorage, ShareValidator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cfg = Config::load().context("loading configuration")?;
    tracing::info!(
        "ETC pool starting: network={}, listen={}, share_difficulty={}",
        cfg.network,
        cfg.listen,
        cfg.share_difficulty
    );

    // Resolve the verifier up front so an unknown network fails at startup.
    let registry = Arc::new(HasherRegistry::etchash());
    let hasher = registry.get_hasher(&cfg.network)?;
    tracing::info!("Verifying shares with {} for {}", hasher.name(), cfg.network);

    let node = Arc::new(EtcRpcClient::new(cfg.node_rpc_url.clone(), cfg.rpc_timeout()));
    let templates = Arc::new(TemplateCache::new());
    let mut template_manager = BlockTemplateManager::new(
        node.clone(),
        templates.clone(),
        cfg.share_difficulty,
        cfg.refresh_interval(),
    );
    template_manager.on_template_change(|set| {
        tracing::debug!(
            "Serving job {} at height {} (network target {}, {} active jobs)",
            set.header,
            set.height,
            set.target,
            set.headers.len()
        );
    });
    let template_manager = Arc::new(template_manager);
    if let Err(e) = template_manager.refresh().await {
        tracing::warn!("Initial block template fetch failed: {:#}", e);
    }
    let _template_poller = template_manager.start();

    let storage = Arc::new(RedisStorage::new(&cfg.redis_url, &cfg.redis_prefix)?);
    let submitter = Arc::new(BlockSubmitter::new(
        node.clone(),
        template_manager.clone(),
        storage.clone(),
    ));
    let validator = Arc::new(ShareValidator::new(
        cfg.network.clone(),
        registry,
        templates.clone(),
        submitter,
        storage.clone(),
        cfg.share_difficulty,
        cfg.hashrate_expiration(),
    ));

    // Background health sampler
    {
        let storage = storage.clone();
        let node = node.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            loop {
                interval.tick().await;
                metrics::set_redis_up(storage.ping().await.is_ok());
                if !node.health_check().await {
                    tracing::warn!("Node at {} is not responding", node.url());
                }
            }
        });
    }

    let app = api::router(ApiState {
        validator,
        templates,
        storage: Some(storage),
    });

    let listen = cfg.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding {}", listen))?;

    tracing::info!("ETC pool getwork API listening on {}", listen);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("ETC pool shut down cleanly");
    Ok(())
}

/// Graceful shutdown (ctrl_c + SIGTERM on Unix)
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("SIGTERM - shutting down"),
                    _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT - shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("SIGINT - shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Ctrl+C - shutting down");
    }
}
