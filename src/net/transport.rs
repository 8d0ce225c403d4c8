//! UDP network lane
//!
//! One task receives datagrams, strips compression framing, checks the
//! envelope magic and pushes the packet onto the inbound queue. A second
//! task drains the outbound channel and resolves each target through the
//! shared connection table. Neither task touches gameplay state.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec::compression::{decompress, is_framed, CompressionError};
use crate::metrics::Metrics;
use crate::net::connection::ConnectionTable;
use crate::net::inbound::{InboundError, InboundPacket, InboundSender};
use crate::net::outbox::OutboundPacket;
use crate::net::protocol::has_magic;

/// Largest datagram accepted
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// How often a blocked receive wakes to check the shutdown flag
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Reasons a datagram is dropped before it reaches the inbound queue
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatagramError {
    #[error("Empty datagram")]
    Empty,
    #[error("Bad envelope magic")]
    BadMagic,
    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),
}

/// Strip compression framing when present and check the envelope magic
///
/// Raw packets start with the magic (`0x42`), which is never a framing
/// flag, so the two forms cannot be confused.
pub fn unwrap_datagram(data: &[u8]) -> Result<Vec<u8>, DatagramError> {
    if data.is_empty() {
        return Err(DatagramError::Empty);
    }
    if has_magic(data) {
        return Ok(data.to_vec());
    }
    if !is_framed(data) {
        return Err(DatagramError::BadMagic);
    }
    let payload = decompress(data)?;
    if !has_magic(&payload) {
        return Err(DatagramError::BadMagic);
    }
    Ok(payload)
}

/// Receive loop; returns when `shutdown` is set or the simulation lane is gone
pub async fn receive_loop(
    socket: Arc<UdpSocket>,
    connections: Arc<Mutex<ConnectionTable>>,
    inbound: InboundSender,
    metrics: Arc<Metrics>,
    shutdown: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    while !shutdown.load(Ordering::Relaxed) {
        let (len, addr) = match tokio::time::timeout(SHUTDOWN_POLL, socket.recv_from(&mut buf)).await
        {
            Err(_) => continue,
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                // ICMP port-unreachable from a vanished client surfaces here on some platforms
                debug!("Receive error: {}", e);
                continue;
            }
        };
        metrics.record_received(len);

        let data = match unwrap_datagram(&buf[..len]) {
            Ok(data) => data,
            Err(e) => {
                debug!("Dropping datagram from {}: {}", addr, e);
                metrics.record_decode_error();
                continue;
            }
        };

        let (client_id, is_new) = connections.lock().record_packet(addr, len);
        if is_new {
            info!("New client {} from {}", client_id, addr);
        }

        match inbound.try_push(InboundPacket { client_id, data }) {
            Ok(()) => {}
            Err(InboundError::Full) => {
                warn!("Inbound queue full, dropping packet from client {}", client_id);
                metrics.record_overflow();
            }
            Err(InboundError::Disconnected) => {
                debug!("Inbound queue closed, stopping receive loop");
                break;
            }
        }
    }
    info!("Receive loop stopped");
}

/// Send loop; returns once every outbound sender is dropped
pub async fn send_loop(
    socket: Arc<UdpSocket>,
    connections: Arc<Mutex<ConnectionTable>>,
    mut outbound: mpsc::Receiver<OutboundPacket>,
    metrics: Arc<Metrics>,
) {
    while let Some(packet) = outbound.recv().await {
        // Resolve first so the table lock is never held across an await
        let addrs: SmallVec<[SocketAddr; 4]> = {
            let table = connections.lock();
            packet
                .targets
                .iter()
                .filter_map(|&id| table.addr_of(id))
                .collect()
        };

        for addr in addrs {
            match socket.send_to(&packet.data, addr).await {
                Ok(sent) => metrics.record_sent(sent),
                Err(e) => {
                    debug!("Send to {} failed: {}", addr, e);
                    metrics.record_dropped();
                }
            }
        }
    }
    info!("Send loop stopped");
}
