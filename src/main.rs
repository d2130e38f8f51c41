//! Composition root: parses CLI flags, loads configuration, wires the
//! shared process-global state once, binds the listener, then starts
//! background services only after the bind succeeds.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vidtagger::cache::CacheLayer;
use vidtagger::clients::{build_http_client, HttpBookmarkStoreClient, HttpLlmClient, HttpVideoSourceClient};
use vidtagger::config::Config;
use vidtagger::gateway::BookmarkStoreGateway;
use vidtagger::orchestrator::TaggingOrchestrator;
use vidtagger::resilience::ResilienceEnvelope;
use vidtagger::scheduler::Scheduler;
use vidtagger::selector::CollectionSelector;
use vidtagger::sweeper::UnsortedSweeper;
use vidtagger::tagging::TagGenerator;
use vidtagger::web::{build_router, AppState};

#[derive(Parser)]
#[command(name = "vidtagger")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tags video bookmarks with AI-generated metadata")]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening host (overrides config)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Listening port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Tracing log level filter, e.g. "info" or "vidtagger=debug"
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Upstream video source base URL
    #[arg(long, env = "VIDTAGGER_VIDEO_SOURCE_URL", default_value = "http://localhost:9001")]
    video_source_url: String,

    /// Bookmark store base URL
    #[arg(long, env = "VIDTAGGER_BOOKMARK_STORE_URL", default_value = "http://localhost:9002")]
    bookmark_store_url: String,

    /// LLM completion base URL
    #[arg(long, env = "VIDTAGGER_LLM_URL", default_value = "http://localhost:9003")]
    llm_url: String,

    /// LLM model identifier
    #[arg(long, env = "VIDTAGGER_LLM_MODEL", default_value = "default")]
    llm_model: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load_from_file(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    info!("configuration loaded");

    let http = build_http_client(std::time::Duration::from_secs(30));
    let video_source = Arc::new(HttpVideoSourceClient::new(http.clone(), cli.video_source_url));
    let bookmark_store = Arc::new(HttpBookmarkStoreClient::new(http.clone(), cli.bookmark_store_url));
    let llm = Arc::new(HttpLlmClient::new(http, cli.llm_url, cli.llm_model));

    let resilience = Arc::new(ResilienceEnvelope::new(&config.breaker, &config.retry));
    let cache = Arc::new(CacheLayer::new(&config.bookmark_store));
    let gateway = Arc::new(BookmarkStoreGateway::new(
        bookmark_store,
        resilience.clone(),
        cache.clone(),
    ));

    let selector = Arc::new(CollectionSelector::new(
        gateway.clone(),
        video_source.clone(),
        llm.clone(),
        resilience.clone(),
        cache.clone(),
        config.bookmark_store.fallback_container.clone(),
    ));
    let tag_generator = Arc::new(TagGenerator::new(
        llm,
        resilience.clone(),
        &config.tagging.blocked_tags,
    ));
    let orchestrator = Arc::new(TaggingOrchestrator::new(
        video_source.clone(),
        gateway.clone(),
        resilience.clone(),
        selector.clone(),
        tag_generator.clone(),
    ));
    let sweeper = Arc::new(UnsortedSweeper::new(
        video_source,
        gateway,
        selector,
        tag_generator,
    ));
    let scheduler = Scheduler::new(orchestrator.clone(), config.scheduler.clone());

    let router = build_router(AppState {
        orchestrator: orchestrator.clone(),
        run_deadline: config.orchestrator.run_deadline,
    });

    let bind_addr = format!("{}:{}", config.web.host, config.web.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "listening");

    let shutdown = CancellationToken::new();

    let scheduler_cancel = shutdown.clone();
    let scheduler_unsorted_config = config.unsorted_processor.clone();
    tokio::spawn(async move { scheduler.run(scheduler_cancel).await });

    let sweeper_cancel = shutdown.clone();
    tokio::spawn(async move {
        sweeper.run_periodic(&scheduler_unsorted_config, sweeper_cancel).await;
    });

    info!("background services started");

    let shutdown_signal = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            shutdown_signal.cancel();
        })
        .await?;

    Ok(())
}
