use std::net::SocketAddr;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Installs the Prometheus recorder and serves `/metrics` on `bind_addr`.
///
/// Must run inside the tokio runtime; the exporter spawns its own listener
/// task.
pub fn init(bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr.parse().context("invalid metrics bind address")?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install the Prometheus metrics exporter")?;
    Ok(())
}
