//! # processor
//!
//! The two long-running tasks that drive the engine:
//! - the measurement processor, fed by UDP ingress and Socket.IO clients
//! - the 1 Hz performance tick that publishes targets against the active table
//!
//! Both publish their output as Signal K deltas on the Socket.IO `delta` event.

use std::time::Duration;

use chrono::Utc;
use polar_engine::Measurement;
use socketioxide::SocketIo;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::delta::{epoch_seconds, DeltaMessage};
use crate::state::AppContext;

pub const DELTA_EVENT: &str = "delta";
const PERFORMANCE_PERIOD: Duration = Duration::from_secs(1);

fn emit_delta(io: &SocketIo, label: &str, values: &[(&str, f64)], timestamp: f64) {
    if values.is_empty() {
        return;
    }
    let delta = DeltaMessage::outbound(label, values, timestamp);
    if let Err(e) = io.emit(DELTA_EVENT, &delta) {
        debug!("Delta broadcast failed: {e}");
    }
}

// ── Measurement processor ─────────────────────────────────────────────────────

/// Runs until every sender of `rx` is gone.
pub async fn run_measurement_processor(ctx: AppContext, io: SocketIo, mut rx: mpsc::Receiver<Measurement>) {
    while let Some(m) = rx.recv().await {
        let (processed, label) = {
            let mut state = ctx.state.write().await;
            let processed = state.engine.on_measurement(&m);
            (processed, state.engine.source_label().to_string())
        };

        emit_delta(&io, &label, &processed.deltas, processed.timestamp);
        if let Some(table) = processed.improved {
            ctx.persister.persist(table);
        }
    }
    info!("Measurement processor stopped");
}

// ── Performance tick ──────────────────────────────────────────────────────────

pub async fn run_performance_tick(ctx: AppContext, io: SocketIo, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(PERFORMANCE_PERIOD);
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = interval.tick() => {}
        }

        let (output, label) = {
            let mut state = ctx.state.write().await;
            let output = state.engine.performance();
            state.latest = output;
            (output, state.engine.source_label().to_string())
        };

        if let Some(output) = output {
            emit_delta(&io, &label, &output.deltas(), epoch_seconds(Utc::now()));
        }
    }
}
