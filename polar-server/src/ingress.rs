//! # ingress
//!
//! UDP listener for Signal K deltas (one JSON delta per datagram).
//!
//! Runs as its own task. Malformed datagrams and receive errors are logged and skipped;
//! the listener only stops when shutdown is signalled. Parsed measurements are handed to
//! the processor over an mpsc channel.

use std::net::SocketAddr;

use chrono::Utc;
use polar_engine::Measurement;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::delta::DeltaMessage;

pub struct IngressConfig {
    pub udp_port: u16,
    /// Only deltas for this context are accepted; `None` accepts every context.
    pub self_context: Option<String>,
}

pub async fn run_udp_ingress(
    config: IngressConfig,
    tx: mpsc::Sender<Measurement>,
    mut shutdown: watch::Receiver<bool>,
) {
    let addr = format!("0.0.0.0:{}", config.udp_port);
    let socket = match UdpSocket::bind(&addr).await {
        Ok(s) => {
            info!("📡 Listening for deltas on UDP {addr}");
            s
        }
        Err(e) => {
            warn!("Could not bind UDP {addr}: {e} (delta ingress disabled)");
            return;
        }
    };

    let mut buf = vec![0u8; 65_536];
    loop {
        let received = tokio::select! {
            _ = shutdown.changed() => {
                info!("UDP ingress stopping");
                return;
            }
            received = socket.recv_from(&mut buf) => received,
        };

        match received {
            Ok((len, src)) => {
                for m in parse_datagram(&buf[..len], src, config.self_context.as_deref()) {
                    if tx.send(m).await.is_err() {
                        return;
                    }
                }
            }
            // Never crash, log and continue
            Err(e) => warn!("UDP recv error: {e}"),
        }
    }
}

fn parse_datagram(data: &[u8], src: SocketAddr, self_context: Option<&str>) -> Vec<Measurement> {
    let delta: DeltaMessage = match serde_json::from_slice(data) {
        Ok(d) => d,
        Err(e) => {
            debug!("Malformed delta from {src}: {e}");
            return Vec::new();
        }
    };
    if !accepts_context(delta.context.as_deref(), self_context) {
        return Vec::new();
    }
    delta.into_measurements(Utc::now())
}

/// A delta without a context is about our own vessel.
pub fn accepts_context(context: Option<&str>, self_context: Option<&str>) -> bool {
    match (context, self_context) {
        (_, None) | (None, _) => true,
        (Some(c), Some(own)) => c == own || c == "vessels.self",
    }
}
