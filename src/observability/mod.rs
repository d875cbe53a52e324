//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, component spans)
//!     → metrics.rs (request/packet counters)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or configured level)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Each component carries its own span (`listener = "HTTP"` etc.) instead of a
//!   global default logger
//! - Metrics recording is a no-op until an exporter is installed

pub mod logging;
pub mod metrics;
