//! In-memory layout host
//!
//! Implements both [`GeometryProbe`] and [`EventHost`] over a small layout
//! tree held in memory. Used by the test suite and by embedders that compute
//! layout themselves (headless renderers, terminal UIs).
//!
//! Every node's rect is relative to its parent's content box; a node's
//! on-screen position subtracts the scroll offset of each ancestor and of
//! the window.

use crate::host::{EventHost, Handler, HostEvent, ListenerId};
use crate::probe::{GeometryProbe, ProbeError};
use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use lazyload_core::{Container, EventTarget, NodeId, Offsets, Rect};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::watch;

/// CSS overflow of a node
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
    Auto,
    Scroll,
}

impl Overflow {
    fn scrolls(&self) -> bool {
        matches!(self, Overflow::Auto | Overflow::Scroll)
    }
}

#[derive(Clone, Debug)]
struct LayoutNode {
    parent: Option<NodeId>,
    rect: Rect,
    overflow: Overflow,
    scroll_x: f64,
    scroll_y: f64,
    attached: bool,
}

#[derive(Debug)]
struct Layout {
    width: f64,
    height: f64,
    scroll_x: f64,
    scroll_y: f64,
    nodes: AHashMap<NodeId, LayoutNode>,
}

impl Layout {
    /// On-screen rect, or None if the node or an ancestor is not attached
    fn client_rect(&self, node: NodeId) -> Option<Rect> {
        let mut current = self.nodes.get(&node)?;
        if !current.attached {
            return None;
        }

        let mut rect = current.rect;
        while let Some(parent_id) = current.parent {
            let parent = self.nodes.get(&parent_id)?;
            if !parent.attached {
                return None;
            }
            rect = rect.translate(
                parent.rect.x - parent.scroll_x,
                parent.rect.y - parent.scroll_y,
            );
            current = parent;
        }

        Some(rect.translate(-self.scroll_x, -self.scroll_y))
    }

    /// Visible rect of a container
    fn container_rect(&self, container: Container) -> Option<Rect> {
        match container {
            Container::Viewport => Some(Rect::new(0.0, 0.0, self.width, self.height)),
            Container::Node(node) => self.client_rect(node),
        }
    }
}

struct Listener {
    target: EventTarget,
    event: HostEvent,
    handler: Handler,
}

/// Layout tree plus listener table
pub struct MemoryHost {
    layout: RwLock<Layout>,
    listeners: Mutex<BTreeMap<ListenerId, Listener>>,
    next_listener: AtomicU64,
    probe_calls: AtomicUsize,
    failing: RwLock<AHashSet<NodeId>>,
    /// Open (true) lets probes resolve; closed holds them in flight
    gate: watch::Sender<bool>,
}

impl MemoryHost {
    /// Create a host with a window of the given size
    pub fn new(width: f64, height: f64) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            layout: RwLock::new(Layout {
                width,
                height,
                scroll_x: 0.0,
                scroll_y: 0.0,
                nodes: AHashMap::new(),
            }),
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(1),
            probe_calls: AtomicUsize::new(0),
            failing: RwLock::new(AHashSet::new()),
            gate,
        }
    }

    /// Add (or replace) an attached node
    pub fn insert(&self, node: NodeId, parent: Option<NodeId>, rect: Rect) {
        self.layout.write().nodes.insert(
            node,
            LayoutNode {
                parent,
                rect,
                overflow: Overflow::Visible,
                scroll_x: 0.0,
                scroll_y: 0.0,
                attached: true,
            },
        );
    }

    /// Add a scrollable node
    pub fn insert_scroller(&self, node: NodeId, parent: Option<NodeId>, rect: Rect) {
        self.insert(node, parent, rect);
        self.set_overflow(node, Overflow::Auto);
    }

    pub fn set_overflow(&self, node: NodeId, overflow: Overflow) {
        if let Some(entry) = self.layout.write().nodes.get_mut(&node) {
            entry.overflow = overflow;
        }
    }

    /// Move a node without dispatching events
    pub fn set_rect(&self, node: NodeId, rect: Rect) {
        if let Some(entry) = self.layout.write().nodes.get_mut(&node) {
            entry.rect = rect;
        }
    }

    /// Attach or detach a node from the renderable tree
    pub fn set_attached(&self, node: NodeId, attached: bool) {
        if let Some(entry) = self.layout.write().nodes.get_mut(&node) {
            entry.attached = attached;
        }
    }

    /// On-screen rect of a node
    pub fn client_rect(&self, node: NodeId) -> Option<Rect> {
        self.layout.read().client_rect(node)
    }

    /// Nearest scrollable ancestor, or the viewport
    pub fn scroll_parent(&self, node: NodeId) -> Container {
        let layout = self.layout.read();
        let mut parent = layout.nodes.get(&node).and_then(|n| n.parent);

        while let Some(id) = parent {
            let Some(entry) = layout.nodes.get(&id) else {
                break;
            };
            if entry.overflow.scrolls() {
                return Container::Node(id);
            }
            parent = entry.parent;
        }

        Container::Viewport
    }

    /// Set a container's scroll position and dispatch `scroll`
    pub fn scroll_to(&self, container: Container, x: f64, y: f64) {
        {
            let mut layout = self.layout.write();
            match container {
                Container::Viewport => {
                    layout.scroll_x = x;
                    layout.scroll_y = y;
                }
                Container::Node(node) => {
                    if let Some(entry) = layout.nodes.get_mut(&node) {
                        entry.scroll_x = x;
                        entry.scroll_y = y;
                    }
                }
            }
        }
        self.dispatch(container.event_target(), HostEvent::Scroll);
    }

    /// Scroll a container by a delta and dispatch `scroll`
    pub fn scroll_by(&self, container: Container, dx: f64, dy: f64) {
        let (x, y) = {
            let layout = self.layout.read();
            match container {
                Container::Viewport => (layout.scroll_x, layout.scroll_y),
                Container::Node(node) => layout
                    .nodes
                    .get(&node)
                    .map_or((0.0, 0.0), |n| (n.scroll_x, n.scroll_y)),
            }
        };
        self.scroll_to(container, x + dx, y + dy);
    }

    /// Scroll the window and dispatch `scroll` on it
    pub fn scroll_window(&self, x: f64, y: f64) {
        self.scroll_to(Container::Viewport, x, y);
    }

    /// Resize the window and dispatch `resize`
    pub fn resize_window(&self, width: f64, height: f64) {
        {
            let mut layout = self.layout.write();
            layout.width = width;
            layout.height = height;
        }
        self.dispatch(EventTarget::Window, HostEvent::Resize);
    }

    pub fn touch_move(&self, container: Container) {
        self.dispatch(container.event_target(), HostEvent::TouchMove);
    }

    pub fn transition_end(&self, container: Container) {
        self.dispatch(container.event_target(), HostEvent::TransitionEnd);
    }

    /// Run every handler registered for `event` on `target`
    pub fn dispatch(&self, target: EventTarget, event: HostEvent) {
        let handlers: Vec<Handler> = self
            .listeners
            .lock()
            .values()
            .filter(|l| l.target == target && l.event == event)
            .map(|l| l.handler.clone())
            .collect();

        for handler in handlers {
            handler();
        }
    }

    /// Listeners registered on `target`
    pub fn listener_count(&self, target: EventTarget) -> usize {
        self.listeners
            .lock()
            .values()
            .filter(|l| l.target == target)
            .count()
    }

    pub fn total_listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Probes started so far
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Make probes for `node` fail (or stop failing)
    pub fn fail_probes(&self, node: NodeId, fail: bool) {
        let mut failing = self.failing.write();
        if fail {
            failing.insert(node);
        } else {
            failing.remove(&node);
        }
    }

    /// Hold every probe in flight until [`release_probes`](Self::release_probes)
    pub fn hold_probes(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_probes(&self) {
        self.gate.send_replace(true);
    }
}

#[async_trait]
impl GeometryProbe for MemoryHost {
    async fn probe(
        &self,
        node: NodeId,
        container: Container,
        offsets: Offsets,
    ) -> Result<bool, ProbeError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(ProbeError::Failed("layout host shut down".to_string()));
        }

        if self.failing.read().contains(&node) {
            return Err(ProbeError::Unavailable(node));
        }

        let layout = self.layout.read();
        let (Some(element), Some(view)) = (layout.client_rect(node), layout.container_rect(container))
        else {
            return Ok(false);
        };

        Ok(element.overlaps(&view.expand(&offsets)))
    }
}

impl EventHost for MemoryHost {
    fn add_listener(&self, target: EventTarget, event: HostEvent, handler: Handler) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(
            id,
            Listener {
                target,
                event,
                handler,
            },
        );
        id
    }

    fn remove_listener(&self, listener: ListenerId) -> bool {
        self.listeners.lock().remove(&listener).is_some()
    }
}
