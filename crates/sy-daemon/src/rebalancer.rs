use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::info;

use sy_dispatch::orchestrator::Orchestrator;
use sy_dispatch::rebalance::RebalanceReport;
use sy_telemetry::metrics::collector;

use crate::shutdown::ShutdownSignal;

// ---------------------------------------------------------------------------
// Rebalancer loop
// ---------------------------------------------------------------------------

/// Spawn the rebalancer as a background tokio task.
///
/// The loop runs one redistribution sweep per `rebalancer.interval_secs` tick
/// of the orchestrator's own configuration and exits when `shutdown` fires.
/// Each sweep publishes its outcome to the process metrics collector. The
/// returned handle resolves once the loop has drained; the shutdown signal's
/// drain flag flips at the same moment.
pub fn spawn_rebalancer(orchestrator: Orchestrator, shutdown: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _drained = shutdown.drain_guard();

        if !orchestrator.config().rebalancer.enabled {
            info!("rebalancer disabled by configuration, loop not started");
            return;
        }

        run_loop(orchestrator, shutdown).await;
    })
}

async fn run_loop(orchestrator: Orchestrator, shutdown: ShutdownSignal) {
    let rebalancer_cfg = orchestrator.config().rebalancer.clone();
    let mut sweep_interval = tokio::time::interval(rebalancer_cfg.interval());
    // Consume the first immediate tick so the loop doesn't sweep at t=0.
    sweep_interval.tick().await;

    let mut shutdown_rx = shutdown.subscribe();

    info!(
        interval_secs = rebalancer_cfg.interval_secs,
        overload_threshold_pct = rebalancer_cfg.overload_threshold_pct,
        "rebalancer loop started"
    );

    loop {
        tokio::select! {
            _ = sweep_interval.tick() => {
                let started = Instant::now();
                let report = orchestrator.rebalance_once().await;
                publish_sweep(&orchestrator, &report, started.elapsed().as_secs_f64()).await;
            }
            _ = shutdown_rx.recv() => {
                info!("shutdown signal received, stopping rebalancer loop");
                break;
            }
        }
    }
}

/// Push one sweep's outcome into the process metrics collector.
///
/// The sweep itself logs what it did; this layer only feeds the counters,
/// the utilization gauges, and the sweep-duration histogram.
async fn publish_sweep(orchestrator: &Orchestrator, report: &RebalanceReport, elapsed_secs: f64) {
    let metrics = collector();
    metrics.increment_counter("rebalance_sweeps_total", &[]);
    metrics.increment_counter_by(
        "rebalance_migrations_total",
        &[],
        report.migrations.len() as u64,
    );
    metrics.increment_counter_by("rebalance_stranded_total", &[], report.stranded as u64);
    metrics.record_histogram("rebalance_sweep_duration_seconds", elapsed_secs);

    let snapshot = orchestrator.system_metrics().await;
    metrics.set_gauge(
        "agent_utilization_pct",
        snapshot.average_utilization_pct.round() as i64,
    );
    metrics.set_gauge("tasks_in_flight", snapshot.active_assignments as i64);
    metrics.set_gauge("agents_online", snapshot.agents_online as i64);
}
