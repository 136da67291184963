//! Data model for the lazyload visibility scheduler
//!
//! This crate provides:
//! - Node, container and watch handles
//! - Rectangles and four-sided offset margins (with legacy offset resolution)
//! - Timing and grouping policies
//! - Per-element options and scheduler configuration (TOML)
//! - The scheduler error taxonomy

pub mod config;
pub mod error;
pub mod geometry;
pub mod handle;
pub mod policy;

// Re-exports
pub use config::{LazyLoadOptions, SchedulerConfig};
pub use error::SchedulerError;
pub use geometry::{resolve_offsets, OffsetProps, Offsets, Rect};
pub use handle::{Container, EventTarget, NodeId, WatchId};
pub use policy::{GroupingPolicy, TimingPolicy};

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;
