//! Host statistics
//!
//! Per-host counters for connections, handshakes and invocations. A host owns
//! one [`HostStats`] behind an `Arc` and hands it to each connection worker;
//! there is no process-wide instance.
//!
//! Uses atomic counters for thread-safe collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug)]
pub struct HostStats {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently active connections
    pub connections_active: AtomicU64,
    /// Authentication handshakes started
    pub handshakes_total: AtomicU64,
    /// Authentication handshakes rejected
    pub handshakes_failed: AtomicU64,
    /// Interface sync requests served
    pub syncs_total: AtomicU64,
    /// Method invocations dispatched
    pub invocations_total: AtomicU64,
    /// Invocations that replied ThrowException
    pub invocations_faulted: AtomicU64,
    /// Requests for unknown services or methods
    pub unknown_methods: AtomicU64,
    /// Connections terminated by a framing or transport error
    pub protocol_errors: AtomicU64,
    start_time: Instant,
}

impl HostStats {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            handshakes_total: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            syncs_total: AtomicU64::new(0),
            invocations_total: AtomicU64::new(0),
            invocations_faulted: AtomicU64::new(0),
            unknown_methods: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn handshake_attempt(&self) {
        self.handshakes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sync_served(&self) {
        self.syncs_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invocation(&self) {
        self.invocations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invocation_faulted(&self) {
        self.invocations_faulted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_method(&self) {
        self.unknown_methods.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            handshakes_total: self.handshakes_total.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            syncs_total: self.syncs_total.load(Ordering::Relaxed),
            invocations_total: self.invocations_total.load(Ordering::Relaxed),
            invocations_faulted: self.invocations_faulted.load(Ordering::Relaxed),
            unknown_methods: self.unknown_methods.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn log_stats(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            handshakes_total = snapshot.handshakes_total,
            handshakes_failed = snapshot.handshakes_failed,
            syncs_total = snapshot.syncs_total,
            invocations_total = snapshot.invocations_total,
            invocations_faulted = snapshot.invocations_faulted,
            unknown_methods = snapshot.unknown_methods,
            protocol_errors = snapshot.protocol_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Host stats snapshot"
        );
    }
}

impl Default for HostStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of host statistics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub handshakes_total: u64,
    pub handshakes_failed: u64,
    pub syncs_total: u64,
    pub invocations_total: u64,
    pub invocations_faulted: u64,
    pub unknown_methods: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

/// Logs the elapsed time of an operation when dropped
pub struct Timer {
    start: Instant,
    operation: &'static str,
    detail: String,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self::with_detail(operation, String::new())
    }

    /// Start timing with a per-call label (e.g. the method name)
    pub fn with_detail(operation: &'static str, detail: String) -> Self {
        Self {
            start: Instant::now(),
            operation,
            detail,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            detail = %self.detail,
            duration_ms = self.elapsed_ms(),
            "Operation completed"
        );
    }
}
