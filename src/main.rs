// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use zonesync::config::{Config, LogFormat};
use zonesync::gate::ConcurrencyGate;
use zonesync::ingest::http::{router, IngestState};
use zonesync::ingest::rate_limit::RateLimiter;
use zonesync::orchestrator::FullSyncOrchestrator;
use zonesync::reconciler::ZoneReconciler;
use zonesync::replica::PdnsReplicaClient;
use zonesync::scheduler::PeriodicScheduler;
use zonesync::source::{NetboxSourceClient, SourceClient};
use zonesync::state::ApplicationState;

const HTTP_PORT: u16 = 8000;
const HTTP_CLIENT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("zonesync")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    initialize_logging(config.log_level.as_filter_str(), config.log_format);
    info!("starting netbox-pdns zone sync engine");

    let http_client = reqwest::Client::builder()
        .timeout(HTTP_CLIENT_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let source = Arc::new(NetboxSourceClient::new(
        http_client.clone(),
        config.nb_url.clone(),
        config.nb_token.clone(),
    ));
    let replica = Arc::new(PdnsReplicaClient::new(
        http_client,
        config.pdns_url.clone(),
        config.pdns_server_id.clone(),
        config.pdns_token.clone(),
    ));

    let nameserver_fqdn = source
        .get_nameserver_fqdn(config.nb_ns_id)
        .await
        .context("failed to resolve configured nameserver id against the source inventory")?
        .with_context(|| {
            format!("source inventory has no nameserver with id {}", config.nb_ns_id)
        })?;
    info!(%nameserver_fqdn, nameserver_id = config.nb_ns_id, "resolved nameserver identity");

    let reconciler = Arc::new(ZoneReconciler::new(
        source.clone(),
        replica.clone(),
        nameserver_fqdn.clone(),
        config.managed_types.clone(),
    ));
    let gate = ConcurrencyGate::new();
    let orchestrator = Arc::new(FullSyncOrchestrator::new(
        source,
        replica,
        reconciler.clone(),
        gate.clone(),
        config.nb_ns_id,
        nameserver_fqdn,
    ));

    let app_state = Arc::new(ApplicationState::new());

    let ingest_state = IngestState {
        reconciler: reconciler.clone(),
        orchestrator: orchestrator.clone(),
        gate: gate.clone(),
        app_state: app_state.clone(),
        api_key: config.api_key.clone(),
        webhook_secret: config.webhook_secret.clone(),
        rate_limiter: Arc::new(RateLimiter::new()),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], HTTP_PORT));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;
    info!(%addr, "HTTP server listening");

    let app = router(ingest_state).into_make_service_with_connect_info::<SocketAddr>();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let server_shutdown_rx = shutdown_rx.clone();
    let server_handle = tokio::spawn(async move {
        let mut rx = server_shutdown_rx;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.changed().await;
            })
            .await
    });

    // Background initial sync: the HTTP server above is already serving
    // /health before this task is spawned, satisfying the startup-order
    // requirement that health checks never block on the first sync.
    let initial_sync_state = app_state.clone();
    let initial_sync_orchestrator = orchestrator.clone();
    tokio::spawn(async move {
        initial_sync_state.mark_initial_sync_started();
        match initial_sync_orchestrator.full_sync("startup").await {
            Ok(summary) => {
                info!(reconciled = summary.reconciled, pruned = summary.pruned, "initial sync completed");
                initial_sync_state.mark_initial_sync_completed();
            }
            Err(e) => {
                error!(error = %e, "initial sync failed");
                initial_sync_state.record_initial_sync_error(e.to_string());
            }
        }
    });

    let scheduler = PeriodicScheduler::new(&config.sync_crontab, orchestrator, app_state.clone())
        .context("failed to build periodic scheduler")?;
    let scheduler_shutdown_rx = shutdown_rx.clone();
    let scheduler_handle = tokio::spawn(scheduler.run(scheduler_shutdown_rx));

    let bus_handle = if config.mqtt.enabled {
        let bus_shutdown_rx = shutdown_rx.clone();
        let bus_reconciler = reconciler.clone();
        let bus_gate = gate.clone();
        let bus_state = app_state.clone();
        let mqtt_config = config.mqtt.clone();
        Some(tokio::spawn(async move {
            zonesync::ingest::mqtt::run(mqtt_config, bus_reconciler, bus_gate, bus_state, bus_shutdown_rx).await;
        }))
    } else {
        None
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping gracefully");
    let _ = shutdown_tx.send(true);

    let _ = scheduler_handle.await;
    if let Some(handle) = bus_handle {
        let _ = handle.await;
    }
    if let Err(e) = server_handle.await.context("server task panicked")? {
        error!(error = %e, "HTTP server exited with an error");
    }

    Ok(())
}

fn initialize_logging(filter: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .compact()
                .init();
        }
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
