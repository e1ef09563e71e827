// src/telemetry.rs
use anyhow::{anyhow, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "watchdog_agent=info,warn";
const VERBOSE_FILTER: &str = "watchdog_agent=debug,info";

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(verbose: bool, json: bool) {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json().with_target(false)).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watchdog_checks_total", "Topic checks started.");
        describe_counter!(
            "watchdog_updates_total",
            "Checks whose verdict reported an update."
        );
        describe_counter!(
            "watchdog_oracle_errors_total",
            "Oracle calls that failed or timed out."
        );
        describe_counter!(
            "watchdog_parse_failures_total",
            "Oracle replies without a usable JSON verdict."
        );
        describe_counter!(
            "watchdog_gather_empty_total",
            "Checks that gathered no content."
        );
        describe_counter!(
            "watchdog_gather_errors_total",
            "Search or page fetch failures."
        );
        describe_counter!(
            "watchdog_gate_blocked_total",
            "Ticks skipped by the power/idle gate."
        );
        describe_histogram!("watchdog_gather_fragments", "Fragments gathered per check.");
        describe_histogram!(
            "watchdog_search_parse_ms",
            "Search result page parse time in milliseconds."
        );
        describe_gauge!("watchdog_last_tick_ts", "Unix ts of the last scheduler tick.");
    });
}

/// Prometheus recorder with its own HTTP listener serving `/metrics`.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow!("prometheus exporter on {addr}: {e}"))?;
    describe_metrics();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
