//! Observability and Metrics
//!
//! This module provides metrics collection for monitoring protocol
//! performance and health.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for one processor or the whole server; counters are
/// cheap enough to share globally.
#[derive(Debug)]
pub struct Metrics {
    /// Total handshake attempts
    pub handshakes_total: AtomicU64,
    /// Successful handshakes
    pub handshakes_success: AtomicU64,
    /// Frames sent on the stream path
    pub stream_frames_sent: AtomicU64,
    /// Frames sent on the datagram path
    pub datagram_frames_sent: AtomicU64,
    /// Datagram frames rerouted over the stream path
    pub datagram_fallbacks: AtomicU64,
    /// Frames received and dispatched
    pub frames_received: AtomicU64,
    /// Frames dropped by the precondition gate
    pub frames_gated: AtomicU64,
    /// Frames rejected for a bad checksum
    pub checksum_failures: AtomicU64,
    /// Handler dispatches that returned an error
    pub handler_errors: AtomicU64,
    /// Total bytes sent
    pub bytes_sent: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            handshakes_total: AtomicU64::new(0),
            handshakes_success: AtomicU64::new(0),
            stream_frames_sent: AtomicU64::new(0),
            datagram_frames_sent: AtomicU64::new(0),
            datagram_fallbacks: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            frames_gated: AtomicU64::new(0),
            checksum_failures: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a handshake attempt
    pub fn handshake_attempt(&self) {
        self.handshakes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful handshake
    pub fn handshake_success(&self) {
        self.handshakes_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame sent on the stream path
    pub fn stream_frame_sent(&self, byte_count: u64) {
        self.stream_frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a frame sent on the datagram path
    pub fn datagram_frame_sent(&self, byte_count: u64) {
        self.datagram_frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a datagram rerouted over the stream path
    pub fn datagram_fallback(&self) {
        self.datagram_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame received and dispatched
    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a frame dropped by the precondition gate
    pub fn frame_gated(&self) {
        self.frames_gated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a checksum rejection
    pub fn checksum_failure(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a handler error
    pub fn handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Log a summary of all counters at info level
    pub fn log_summary(&self) {
        info!(
            uptime_secs = self.uptime_secs(),
            handshakes = self.handshakes_total.load(Ordering::Relaxed),
            stream_sent = self.stream_frames_sent.load(Ordering::Relaxed),
            datagram_sent = self.datagram_frames_sent.load(Ordering::Relaxed),
            fallbacks = self.datagram_fallbacks.load(Ordering::Relaxed),
            received = self.frames_received.load(Ordering::Relaxed),
            gated = self.frames_gated.load(Ordering::Relaxed),
            checksum_failures = self.checksum_failures.load(Ordering::Relaxed),
            handler_errors = self.handler_errors.load(Ordering::Relaxed),
            bytes_sent = self.bytes_sent.load(Ordering::Relaxed),
            bytes_received = self.bytes_received.load(Ordering::Relaxed),
            "protocol metrics"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
