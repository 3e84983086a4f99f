use std::time::Duration;

use anyhow::Result;
use bridge_service::{
    config::AppConfig,
    metrics_server, observability,
    pipeline::Pipeline,
    sinks::DsmrReaderSink,
    sources::SlimmelezerSource,
    transform::ReadingAccumulator,
};
use dsmr_client::ApiClient;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics exposition if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let adapter = &cfg.adapter;
    let source = SlimmelezerSource::new(
        adapter.host.clone(),
        adapter.port,
        adapter.password.clone(),
        Duration::from_secs(adapter.attempt_timeout_secs),
        Duration::from_secs(adapter.subscribe_timeout_secs),
        adapter.max_attempts,
        adapter.channel_capacity,
    );

    let datalogger = &cfg.datalogger;
    let client = ApiClient::new(
        &datalogger.base_url,
        &datalogger.auth_key,
        Duration::from_secs(datalogger.request_timeout_secs),
        datalogger.accept_invalid_certs,
    )?;

    let pipeline = Pipeline {
        source,
        aggregate: ReadingAccumulator::default(),
        sink: DsmrReaderSink::new(client),
    };
    pipeline.run().await?;

    Ok(())
}
