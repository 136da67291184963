//! Host event-listener seam

use lazyload_core::{Container, EventTarget};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Event handler registered with the host
pub type Handler = Arc<dyn Fn() + Send + Sync>;

/// Events that can change an element's visibility
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HostEvent {
    Resize,
    Scroll,
    TouchMove,
    TransitionEnd,
}

impl HostEvent {
    /// DOM event name
    pub fn as_str(&self) -> &'static str {
        match self {
            HostEvent::Resize => "resize",
            HostEvent::Scroll => "scroll",
            HostEvent::TouchMove => "touchmove",
            HostEvent::TransitionEnd => "transitionend",
        }
    }
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events observed on the scroll container itself
pub const CONTAINER_EVENTS: [HostEvent; 3] =
    [HostEvent::Scroll, HostEvent::TouchMove, HostEvent::TransitionEnd];

/// Token identifying one listener registration
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ListenerId(pub u64);

/// Host event-listener API
pub trait EventHost: Send + Sync {
    /// Register `handler` for `event` on `target`
    fn add_listener(&self, target: EventTarget, event: HostEvent, handler: Handler) -> ListenerId;

    /// Remove a registration; false if it was not present
    fn remove_listener(&self, listener: ListenerId) -> bool;
}

/// The four listeners serving one group
///
/// `resize` always goes on the window: any container may resize as a side
/// effect of a window resize.
pub struct ListenerSet {
    ids: SmallVec<[ListenerId; 4]>,
}

impl ListenerSet {
    /// Attach `handler` for resize, scroll, touchmove and transitionend
    pub fn attach(host: &dyn EventHost, container: Container, handler: &Handler) -> Self {
        let mut ids = SmallVec::new();
        ids.push(host.add_listener(EventTarget::Window, HostEvent::Resize, Arc::clone(handler)));

        let target = container.event_target();
        for event in CONTAINER_EVENTS {
            ids.push(host.add_listener(target, event, Arc::clone(handler)));
        }

        Self { ids }
    }

    /// Remove every listener in the set
    pub fn detach(self, host: &dyn EventHost) {
        for id in self.ids {
            if !host.remove_listener(id) {
                warn!("Listener {:?} was already removed", id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
