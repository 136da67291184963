//! Visibility-polling scheduler for lazyload
//!
//! This crate provides:
//! - Throttle/debounce rate limiting for event triggers
//! - Listener groups shared per scroll container and timing policy
//! - One-shot visibility notification per watched element
//! - Explicit attach/props-changed/detach lifecycle hooks
//! - An in-memory layout host for tests and headless embedding
//!
//! Flow: a scroll/resize/touchmove/transitionend event on a container fires
//! the group's rate-limited trigger, which probes every pending member. Each
//! member that probes visible is notified and leaves the group; the group
//! detaches its listeners once empty.

pub mod element;
pub mod host;
pub mod memory;
pub mod probe;
pub mod ratelimit;
pub mod registry;
pub mod scheduler;

// Re-exports
pub use element::{VisibleCallback, WatchedElement};
pub use host::{EventHost, Handler, HostEvent, ListenerId, ListenerSet};
pub use memory::{MemoryHost, Overflow};
pub use probe::{GeometryProbe, ProbeError};
pub use ratelimit::RateLimiter;
pub use registry::{GroupKey, ListenerGroup, Registry};
pub use scheduler::Scheduler;

pub use lazyload_core::{
    Container, EventTarget, GroupingPolicy, LazyLoadOptions, NodeId, Offsets, Rect,
    SchedulerConfig, SchedulerError, TimingPolicy, WatchId,
};
