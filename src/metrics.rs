//! Server counters
//!
//! Lock-free counters shared by both lanes, plus a rolling tick-time window
//! for percentiles. The simulation lane logs a summary periodically and the
//! admin `status` command reports a [`MetricsSnapshot`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

/// Tick samples kept for percentiles
const TICK_HISTORY: usize = 1000;

#[derive(Debug)]
pub struct Metrics {
    // Network lane
    pub packets_received: AtomicU64,
    pub packets_dropped: AtomicU64,
    pub packets_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub inbound_overflows: AtomicU64,
    pub decode_errors: AtomicU64,

    // Simulation lane
    pub tick_count: AtomicU64,
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub lobbies: AtomicU64,
    pub clients: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub packets_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub inbound_overflows: u64,
    pub decode_errors: u64,
    pub tick_count: u64,
    pub tick_time_us: u64,
    pub tick_time_p95_us: u64,
    pub tick_time_p99_us: u64,
    pub tick_time_max_us: u64,
    pub lobbies: u64,
    pub clients: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            packets_received: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            inbound_overflows: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            lobbies: AtomicU64::new(0),
            clients: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    #[inline]
    pub fn record_received(&self, bytes: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_overflow(&self) {
        self.inbound_overflows.fetch_add(1, Ordering::Relaxed);
        self.record_dropped();
    }

    #[inline]
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        self.record_dropped();
    }

    pub fn set_population(&self, lobbies: usize, clients: usize) {
        self.lobbies.store(lobbies as u64, Ordering::Relaxed);
        self.clients.store(clients as u64, Ordering::Relaxed);
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();
            let at = |q: f32| sorted[((sorted.len() as f32 * q) as usize).min(sorted.len() - 1)];

            self.tick_time_p95_us.store(at(0.95), Ordering::Relaxed);
            self.tick_time_p99_us.store(at(0.99), Ordering::Relaxed);
            self.tick_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            uptime_seconds: self.uptime_seconds(),
            packets_received: load(&self.packets_received),
            packets_dropped: load(&self.packets_dropped),
            packets_sent: load(&self.packets_sent),
            bytes_received: load(&self.bytes_received),
            bytes_sent: load(&self.bytes_sent),
            inbound_overflows: load(&self.inbound_overflows),
            decode_errors: load(&self.decode_errors),
            tick_count: load(&self.tick_count),
            tick_time_us: load(&self.tick_time_us),
            tick_time_p95_us: load(&self.tick_time_p95_us),
            tick_time_p99_us: load(&self.tick_time_p99_us),
            tick_time_max_us: load(&self.tick_time_max_us),
            lobbies: load(&self.lobbies),
            clients: load(&self.clients),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            "Metrics: {} clients, {} lobbies, tick p95 {}us p99 {}us, rx {} pkts / {} B, tx {} pkts / {} B, dropped {} (overflow {}, decode {})",
            s.clients,
            s.lobbies,
            s.tick_time_p95_us,
            s.tick_time_p99_us,
            s.packets_received,
            s.bytes_received,
            s.packets_sent,
            s.bytes_sent,
            s.packets_dropped,
            s.inbound_overflows,
            s.decode_errors
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
