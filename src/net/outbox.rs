//! Outbound packet collection for one tick
//!
//! Simulation code never touches the socket. It queues fully built packets
//! here; the simulation lane hands them to the send task after the tick.
//! Broadcast-style packets go through the compression layer, direct
//! replies are sent as-is.

use smallvec::SmallVec;

use crate::codec::compression::{decompress, CompressionConfig, CompressionError, Compressor};

/// Recipients of one packet (lobbies hold at most a handful of clients)
pub type Targets = SmallVec<[u32; 4]>;

/// Wire-ready datagram and its recipients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    pub targets: Targets,
    pub data: Vec<u8>,
    /// `data` carries the compression flag byte
    pub framed: bool,
}

impl OutboundPacket {
    /// Packet bytes with any compression framing removed
    pub fn payload(&self) -> Result<Vec<u8>, CompressionError> {
        if self.framed {
            decompress(&self.data)
        } else {
            Ok(self.data.clone())
        }
    }

    /// Opcode byte of the payload, when it decodes
    pub fn opcode(&self) -> Option<u8> {
        self.payload().ok().and_then(|p| p.get(2).copied())
    }
}

/// Per-tick send buffer
#[derive(Debug, Default)]
pub struct Outbox {
    packets: Vec<OutboundPacket>,
    compressor: Compressor,
}

impl Outbox {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            packets: Vec::new(),
            compressor: Compressor::new(config),
        }
    }

    /// Direct reply, not compressed
    pub fn send(&mut self, client_id: u32, data: Vec<u8>) {
        self.packets.push(OutboundPacket {
            targets: SmallVec::from_slice(&[client_id]),
            data,
            framed: false,
        });
    }

    /// Single-recipient packet that still goes through compression
    pub fn send_compressed(&mut self, client_id: u32, data: &[u8]) {
        self.broadcast(&[client_id], data);
    }

    /// Compressed packet to every client in `clients`
    ///
    /// Empty target lists are ignored.
    pub fn broadcast(&mut self, clients: &[u32], data: &[u8]) {
        if clients.is_empty() {
            return;
        }
        let framed = self.compressor.compress(data);
        self.packets.push(OutboundPacket {
            targets: SmallVec::from_slice(clients),
            data: framed,
            framed: true,
        });
    }

    /// Take everything queued so far
    pub fn drain(&mut self) -> Vec<OutboundPacket> {
        std::mem::take(&mut self.packets)
    }

    pub fn packets(&self) -> &[OutboundPacket] {
        &self.packets
    }

    /// Decoded payloads addressed to `client_id`, oldest first
    pub fn payloads_for(&self, client_id: u32) -> Vec<Vec<u8>> {
        self.packets
            .iter()
            .filter(|p| p.targets.contains(&client_id))
            .filter_map(|p| p.payload().ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::compression::FLAG_UNCOMPRESSED;

    #[test]
    fn test_direct_send_is_raw() {
        let mut outbox = Outbox::default();
        outbox.send(3, vec![0x42, 0xB5, 0x02, 3, 0, 0, 0]);

        let p = &outbox.packets()[0];
        assert!(!p.framed);
        assert_eq!(p.data[2], 0x02);
        assert_eq!(p.opcode(), Some(0x02));
    }

    #[test]
    fn test_broadcast_is_framed() {
        let mut outbox = Outbox::default();
        outbox.broadcast(&[1, 2], &[0x42, 0xB5, 0x21, 2, 1]);

        let p = &outbox.packets()[0];
        assert!(p.framed);
        assert_eq!(p.data[0], FLAG_UNCOMPRESSED);
        assert_eq!(p.targets.as_slice(), &[1, 2]);
        assert_eq!(outbox.payloads_for(2), vec![vec![0x42, 0xB5, 0x21, 2, 1]]);
        assert!(outbox.payloads_for(9).is_empty());
    }

    #[test]
    fn test_broadcast_to_nobody_is_dropped() {
        let mut outbox = Outbox::default();
        outbox.broadcast(&[], &[1, 2, 3]);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_drain_empties() {
        let mut outbox = Outbox::default();
        outbox.send(1, vec![1]);
        outbox.send_compressed(1, &[2]);
        assert_eq!(outbox.drain().len(), 2);
        assert!(outbox.is_empty());
        assert_eq!(outbox.compressor().stats().total_uncompressed, 1);
    }
}
