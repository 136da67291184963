//! Opaque handles for nodes, scroll containers and watched elements

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to a measurable node owned by the host
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Scroll container against which visibility is measured
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    /// The global viewport (window)
    #[default]
    Viewport,
    /// A scrollable node
    Node(NodeId),
}

impl Container {
    /// Target that receives this container's scroll-like events
    pub fn event_target(&self) -> EventTarget {
        match self {
            Container::Viewport => EventTarget::Window,
            Container::Node(node) => EventTarget::Node(*node),
        }
    }
}

impl From<Option<NodeId>> for Container {
    fn from(node: Option<NodeId>) -> Self {
        node.map_or(Container::Viewport, Container::Node)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Container::Viewport => write!(f, "viewport"),
            Container::Node(node) => write!(f, "{}", node),
        }
    }
}

/// Where the host dispatches events
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum EventTarget {
    /// The global window
    Window,
    /// A node
    Node(NodeId),
}

/// Process-unique identity of a watched element
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct WatchId(u64);

static NEXT_WATCH_ID: AtomicU64 = AtomicU64::new(1);

impl WatchId {
    /// Allocate the next id
    pub fn next() -> Self {
        Self(NEXT_WATCH_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}
