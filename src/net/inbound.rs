//! Bounded inbound queue between the receive lane and the simulation lane
//!
//! Uses crossbeam-channel so the receive task can push without locking and
//! the tick drains everything pending without blocking. When the queue is
//! full the newest packet is dropped and the caller is told so.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// A validated datagram from a known client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    pub client_id: u32,
    /// Full packet, envelope included, compression framing removed
    pub data: Vec<u8>,
}

/// Inbound queue errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InboundError {
    /// Queue is full, packet dropped
    #[error("Inbound queue full")]
    Full,
    /// Simulation lane is gone
    #[error("Inbound queue disconnected")]
    Disconnected,
}

/// Receiving end, owned by the simulation lane
pub struct InboundQueue {
    sender: Sender<InboundPacket>,
    receiver: Receiver<InboundPacket>,
    capacity: usize,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            capacity: capacity.max(1),
        }
    }

    /// Producer handle for the receive lane
    pub fn sender(&self) -> InboundSender {
        InboundSender {
            sender: self.sender.clone(),
        }
    }

    /// Take every packet queued so far
    pub fn drain(&self) -> Vec<InboundPacket> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Clonable producer handle
#[derive(Clone)]
pub struct InboundSender {
    sender: Sender<InboundPacket>,
}

impl InboundSender {
    /// Non-blocking push; a full queue rejects the new packet
    #[inline]
    pub fn try_push(&self, packet: InboundPacket) -> Result<(), InboundError> {
        self.sender.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => InboundError::Full,
            TrySendError::Disconnected(_) => InboundError::Disconnected,
        })
    }
}
