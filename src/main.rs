use std::process::ExitCode;
use std::sync::Arc;

use cost_netmon::config::{ConfigBuilder, ServiceConfig};
use cost_netmon::observability::{LOG_LEVEL_ENV, init_tracing};
use cost_netmon::{CostExplorerClient, CycleOrchestrator, Publisher, RestProxyBus, Scheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let level = std::env::var(LOG_LEVEL_ENV).ok();
    if let Err(e) = init_tracing(level.as_deref()) {
        eprintln!("{}", e);
    }

    let provider = ConfigBuilder::new().env().build();
    let config = match ServiceConfig::load(&provider).await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        interval_secs = config.interval.as_secs(),
        lookback_days = config.lookback_days,
        granularity = %config.granularity,
        group_by = %config.group_by,
        emission_mode = %config.emission_mode,
        aws_region = %config.aws_region,
        rest_url = %config.bus.rest_url,
        topic = %config.bus.topic,
        "Starting AWS Cost to NETMON service"
    );

    let billing = match CostExplorerClient::from_env(config.aws_region.clone()).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to initialise AWS Cost Explorer client");
            return ExitCode::FAILURE;
        }
    };
    let bus = RestProxyBus::from_config(&config.bus);
    let publisher = Publisher::new(
        Arc::new(bus),
        config.bus.topic.clone(),
        config.publish_timeout,
    );

    let orchestrator = CycleOrchestrator::builder(config, Arc::new(billing), publisher).build();
    let scheduler = Scheduler::from_config(Arc::new(orchestrator));

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let abandoned = scheduler.run(shutdown).await;
    if abandoned > 0 {
        warn!(abandoned, "Service stopped with an unfinished cycle");
    }
    info!("Service stopped");
    ExitCode::SUCCESS
}

#[cfg(unix)]
async fn wait_for_signal(shutdown: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "Failed to register SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
    }
    shutdown.cancel();
}

#[cfg(not(unix))]
async fn wait_for_signal(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C");
    }
    shutdown.cancel();
}
