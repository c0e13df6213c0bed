//! Observability and Metrics
//!
//! Counters for encode and decode sessions, shared by every writer and reader in the process.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Global metrics collector for archive operations
#[derive(Debug)]
pub struct ArchiveMetrics {
    /// Archives finalized
    pub archives_written: AtomicU64,
    /// Archives opened for reading
    pub archives_read: AtomicU64,
    /// Object bodies written
    pub objects_written: AtomicU64,
    /// References written in place of a repeated body
    pub references_written: AtomicU64,
    /// Object bodies decoded
    pub objects_decoded: AtomicU64,
    /// References resolved to a finished object
    pub references_resolved: AtomicU64,
    /// References resolved to an object still being decoded
    pub forward_placeholders: AtomicU64,
    /// Sub-archives closed by writers
    pub sub_archives: AtomicU64,
    /// Total bytes of finalized archives
    pub bytes_written: AtomicU64,
    /// Total bytes of opened archives
    pub bytes_read: AtomicU64,
    /// Failed object encodes
    pub encode_errors: AtomicU64,
    /// Rejected buffers and failed object decodes
    pub decode_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl ArchiveMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            archives_written: AtomicU64::new(0),
            archives_read: AtomicU64::new(0),
            objects_written: AtomicU64::new(0),
            references_written: AtomicU64::new(0),
            objects_decoded: AtomicU64::new(0),
            references_resolved: AtomicU64::new(0),
            forward_placeholders: AtomicU64::new(0),
            sub_archives: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            encode_errors: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a finalized archive
    pub fn archive_written(&self, byte_count: u64) {
        self.archives_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record an archive accepted by a reader
    pub fn archive_read(&self, byte_count: u64) {
        self.archives_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record an object body written
    pub fn object_written(&self) {
        self.objects_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reference written
    pub fn reference_written(&self) {
        self.references_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an object body decoded
    pub fn object_decoded(&self) {
        self.objects_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reference resolved to a finished object
    pub fn reference_resolved(&self) {
        self.references_resolved.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reference resolved to an in-progress placeholder
    pub fn forward_placeholder(&self) {
        self.forward_placeholders.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed sub-archive
    pub fn sub_archive_written(&self) {
        self.sub_archives.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed encode
    pub fn encode_error(&self) {
        self.encode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed decode
    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            archives_written: self.archives_written.load(Ordering::Relaxed),
            archives_read: self.archives_read.load(Ordering::Relaxed),
            objects_written: self.objects_written.load(Ordering::Relaxed),
            references_written: self.references_written.load(Ordering::Relaxed),
            objects_decoded: self.objects_decoded.load(Ordering::Relaxed),
            references_resolved: self.references_resolved.load(Ordering::Relaxed),
            forward_placeholders: self.forward_placeholders.load(Ordering::Relaxed),
            sub_archives: self.sub_archives.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            archives_written = snapshot.archives_written,
            archives_read = snapshot.archives_read,
            objects_written = snapshot.objects_written,
            references_written = snapshot.references_written,
            objects_decoded = snapshot.objects_decoded,
            references_resolved = snapshot.references_resolved,
            forward_placeholders = snapshot.forward_placeholders,
            sub_archives = snapshot.sub_archives,
            bytes_written = snapshot.bytes_written,
            bytes_read = snapshot.bytes_read,
            encode_errors = snapshot.encode_errors,
            decode_errors = snapshot.decode_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Archive metrics snapshot"
        );
    }
}

impl Default for ArchiveMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub archives_written: u64,
    pub archives_read: u64,
    pub objects_written: u64,
    pub references_written: u64,
    pub objects_decoded: u64,
    pub references_resolved: u64,
    pub forward_placeholders: u64,
    pub sub_archives: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub encode_errors: u64,
    pub decode_errors: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<ArchiveMetrics> =
    once_cell::sync::Lazy::new(ArchiveMetrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static ArchiveMetrics {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
