use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A client known by its transport address
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: u32,
    pub remote_addr: SocketAddr,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub bytes_received: u64,
    pub packets_received: u64,
}

impl Connection {
    pub fn new(id: u32, remote_addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            remote_addr,
            created_at: now,
            last_activity: now,
            bytes_received: 0,
            packets_received: 0,
        }
    }

    /// Update last activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
        self.packets_received += 1;
    }

    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Address to client-id mapping shared by both lanes
///
/// Ids start at 1 and are never reused within a process.
pub struct ConnectionTable {
    connections: HashMap<u32, Connection>,
    by_addr: HashMap<SocketAddr, u32>,
    next_id: u32,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            by_addr: HashMap::new(),
            next_id: 1,
        }
    }

    /// Id for `addr`, allocating one on first contact
    ///
    /// Returns `(client_id, is_new)` and refreshes activity either way.
    pub fn register(&mut self, addr: SocketAddr) -> (u32, bool) {
        if let Some(&id) = self.by_addr.get(&addr) {
            if let Some(conn) = self.connections.get_mut(&id) {
                conn.touch();
            }
            return (id, false);
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.connections.insert(id, Connection::new(id, addr));
        self.by_addr.insert(addr, id);
        (id, true)
    }

    /// Record an inbound datagram from `addr`
    pub fn record_packet(&mut self, addr: SocketAddr, bytes: usize) -> (u32, bool) {
        let (id, is_new) = self.register(addr);
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.record_received(bytes);
        }
        (id, is_new)
    }

    pub fn touch(&mut self, id: u32) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.touch();
        }
    }

    pub fn get(&self, id: u32) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn addr_of(&self, id: u32) -> Option<SocketAddr> {
        self.connections.get(&id).map(|c| c.remote_addr)
    }

    pub fn id_of(&self, addr: &SocketAddr) -> Option<u32> {
        self.by_addr.get(addr).copied()
    }

    pub fn remove(&mut self, id: u32) -> Option<Connection> {
        let conn = self.connections.remove(&id)?;
        self.by_addr.remove(&conn.remote_addr);
        Some(conn)
    }

    /// Drop clients idle longer than `timeout`, returning their ids
    pub fn remove_inactive(&mut self, timeout: Duration) -> Vec<u32> {
        let stale: Vec<u32> = self
            .connections
            .values()
            .filter(|conn| conn.idle_time() > timeout)
            .map(|conn| conn.id)
            .collect();

        for id in &stale {
            self.remove(*id);
        }
        stale
    }

    pub fn ids(&self) -> Vec<u32> {
        self.connections.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}
