//! # Utility Modules
//!
//! Supporting services shared by writers and readers.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{global_metrics, ArchiveMetrics, MetricsSnapshot};
