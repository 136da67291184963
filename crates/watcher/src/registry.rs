//! Listener-group registry
//!
//! Watched elements that share a scroll container (and, by default, a timing
//! policy) share one group: one rate-limited "probe every member" trigger and
//! one set of four host listeners. Groups are created by the first register
//! for their key and torn down the moment their last member leaves.
//!
//! Locking order is registry map, then group members, then an element's
//! limiter slot. No lock is held across an await, while a limiter runs or
//! while user callbacks run.

use crate::element::WatchedElement;
use crate::host::{EventHost, Handler, ListenerSet};
use crate::probe::GeometryProbe;
use crate::ratelimit::{Callback, RateLimiter};
use ahash::AHashMap;
use dashmap::DashMap;
use lazyload_core::{Container, GroupingPolicy, Result, SchedulerError, TimingPolicy, WatchId};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};

/// Identity of a listener group
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct GroupKey {
    pub container: Container,
    /// `None` when grouping by container alone
    pub policy: Option<TimingPolicy>,
}

impl GroupKey {
    pub fn for_element(element: &WatchedElement, grouping: GroupingPolicy) -> Self {
        let policy = match grouping {
            GroupingPolicy::ByContainerAndPolicy => Some(element.policy()),
            GroupingPolicy::ByContainer => None,
        };
        Self {
            container: element.container(),
            policy,
        }
    }
}

/// Elements polling under one key, plus their shared trigger and listeners
pub struct ListenerGroup {
    key: GroupKey,
    members: Mutex<AHashMap<WatchId, Arc<WatchedElement>>>,
    trigger: RateLimiter,
    listeners: Mutex<Option<ListenerSet>>,
}

impl ListenerGroup {
    pub fn key(&self) -> GroupKey {
        self.key
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    fn is_member(&self, element: &Arc<WatchedElement>) -> bool {
        self.members
            .lock()
            .get(&element.id())
            .is_some_and(|member| Arc::ptr_eq(member, element))
    }

    fn snapshot(&self) -> Vec<Arc<WatchedElement>> {
        self.members.lock().values().cloned().collect()
    }
}

/// Registry of listener groups
///
/// Cheap to clone; clones share the same groups.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    groups: DashMap<GroupKey, Arc<ListenerGroup>>,
    probe: Arc<dyn GeometryProbe>,
    host: Arc<dyn EventHost>,
    grouping: GroupingPolicy,
    runtime: Handle,
}

impl Registry {
    pub fn new(
        probe: Arc<dyn GeometryProbe>,
        host: Arc<dyn EventHost>,
        grouping: GroupingPolicy,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                groups: DashMap::new(),
                probe,
                host,
                grouping,
                runtime,
            }),
        }
    }

    pub fn grouping(&self) -> GroupingPolicy {
        self.inner.grouping
    }

    /// Add an element to its group, creating the group if needed, then run
    /// the eager first check
    pub fn register(&self, element: &Arc<WatchedElement>) -> Result<()> {
        let key = GroupKey::for_element(element, self.inner.grouping);

        // Group creation, listener attachment and membership happen under the
        // map entry lock, so no event can observe a half-built group
        let (group, replaced) = {
            let entry = self.inner.groups.entry(key);

            // Retirement flips `pending` under this same lock
            if !element.is_pending() {
                return Err(SchedulerError::AlreadyVisible(element.id()));
            }

            let entry = entry.or_insert_with(|| self.inner.create_group(key));
            let group = Arc::clone(entry.value());

            let mut members = group.members.lock();
            if members.contains_key(&element.id()) {
                return Err(SchedulerError::AlreadyRegistered(element.id()));
            }

            let replaced = match self.inner.grouping {
                GroupingPolicy::ByContainer => {
                    element.install_limiter(self.inner.element_limiter(&group, element))
                }
                GroupingPolicy::ByContainerAndPolicy => None,
            };
            members.insert(element.id(), Arc::clone(element));
            drop(members);

            (group, replaced)
        };
        drop(replaced);

        debug!(
            "Registered {} ({}) in group {} / {:?} ({} members)",
            element.id(),
            element.node(),
            key.container,
            key.policy,
            group.len()
        );

        // Eager first check, bypassing the limiter
        self.inner.probe_element(&group, element);
        group.trigger.flush();

        Ok(())
    }

    /// Remove an element from its group, tearing the group down if it empties
    pub fn unregister(&self, element: &Arc<WatchedElement>) -> Result<()> {
        if self.inner.remove_member(element, false) {
            Ok(())
        } else {
            Err(SchedulerError::NotRegistered(element.id()))
        }
    }

    /// Whether the element is currently a member of a group
    pub fn contains(&self, element: &Arc<WatchedElement>) -> bool {
        self.group_for(element)
            .is_some_and(|group| group.is_member(element))
    }

    /// Probe one element now if it is still pending and registered
    ///
    /// Returns whether a probe was started; false while one is in flight.
    pub fn recheck(&self, element: &Arc<WatchedElement>) -> bool {
        self.group_for(element)
            .is_some_and(|group| self.inner.probe_element(&group, element))
    }

    /// Number of live groups
    pub fn group_count(&self) -> usize {
        self.inner.groups.len()
    }

    /// Number of members in the group for `key`, 0 if there is none
    pub fn member_count(&self, key: &GroupKey) -> usize {
        self.inner
            .groups
            .get(key)
            .map_or(0, |group| group.len())
    }

    pub fn has_group(&self, key: &GroupKey) -> bool {
        self.inner.groups.contains_key(key)
    }

    fn group_for(&self, element: &WatchedElement) -> Option<Arc<ListenerGroup>> {
        let key = GroupKey::for_element(element, self.inner.grouping);
        self.inner
            .groups
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
    }
}

impl RegistryInner {
    /// Build a group and attach its listeners
    fn create_group(self: &Arc<Self>, key: GroupKey) -> Arc<ListenerGroup> {
        let group_policy = match self.grouping {
            GroupingPolicy::ByContainerAndPolicy => key.policy.unwrap_or(TimingPolicy::NoLimit),
            // Elements carry their own limiters
            GroupingPolicy::ByContainer => TimingPolicy::NoLimit,
        };

        let group = Arc::new_cyclic(|weak_group: &Weak<ListenerGroup>| {
            let registry = Arc::downgrade(self);
            let weak_group = weak_group.clone();
            let probe_all: Callback = Arc::new(move || {
                if let (Some(registry), Some(group)) = (registry.upgrade(), weak_group.upgrade()) {
                    registry.probe_members(&group);
                }
            });

            ListenerGroup {
                key,
                members: Mutex::new(AHashMap::new()),
                trigger: RateLimiter::new(group_policy, probe_all, self.runtime.clone()),
                listeners: Mutex::new(None),
            }
        });

        let weak_group = Arc::downgrade(&group);
        let handler: Handler = Arc::new(move || {
            if let Some(group) = weak_group.upgrade() {
                group.trigger.call();
            }
        });
        let listeners = ListenerSet::attach(self.host.as_ref(), key.container, &handler);
        *group.listeners.lock() = Some(listeners);

        debug!(
            "Created listener group for {} ({})",
            key.container, group_policy
        );
        group
    }

    /// Limiter that probes a single element, for container-only grouping
    fn element_limiter(
        self: &Arc<Self>,
        group: &Arc<ListenerGroup>,
        element: &Arc<WatchedElement>,
    ) -> RateLimiter {
        let registry = Arc::downgrade(self);
        let weak_group = Arc::downgrade(group);
        let weak_element = Arc::downgrade(element);

        let probe_one: Callback = Arc::new(move || {
            if let (Some(registry), Some(group), Some(element)) =
                (registry.upgrade(), weak_group.upgrade(), weak_element.upgrade())
            {
                registry.probe_element(&group, &element);
            }
        });

        RateLimiter::new(element.policy(), probe_one, self.runtime.clone())
    }

    /// Probe every pending member of a group
    fn probe_members(self: &Arc<Self>, group: &Arc<ListenerGroup>) {
        let members = group.snapshot();
        trace!("Probing {} members of {}", members.len(), group.key.container);

        for element in &members {
            if self.grouping == GroupingPolicy::ByContainer && element.call_limiter() {
                continue;
            }
            self.probe_element(group, element);
        }
    }

    /// Start one probe for one element unless it is retired or already in flight
    ///
    /// Returns whether a probe was started.
    fn probe_element(self: &Arc<Self>, group: &Arc<ListenerGroup>, element: &Arc<WatchedElement>) -> bool {
        if !group.is_member(element) {
            trace!("Skipping probe for unregistered {}", element.id());
            return false;
        }
        let Some(check) = element.begin_check() else {
            trace!("Skipping probe for {}", element.id());
            return false;
        };

        let registry = Arc::clone(self);
        let element = Arc::clone(element);
        let probe = Arc::clone(&self.probe);

        // `check` is released on completion and when the probe panics
        self.runtime.spawn(async move {
            let result = probe
                .probe(element.node(), element.container(), element.offsets())
                .await;
            drop(check);

            match result {
                Ok(true) => registry.resolve_visible(&element),
                Ok(false) => trace!("{} not visible yet", element.id()),
                Err(e) => warn!("Probe for {} failed: {}", element.id(), e),
            }
        });
        true
    }

    /// Retire an element after a positive probe
    ///
    /// Membership is the arbiter: if the element was unregistered while the
    /// probe was in flight, the result is dropped.
    fn resolve_visible(&self, element: &Arc<WatchedElement>) {
        if !element.is_pending() {
            return;
        }

        if !self.remove_member(element, true) {
            debug!("Ignoring probe result for unregistered {}", element.id());
            return;
        }

        info!("{} ({}) became visible", element.id(), element.node());
        element.notify();
    }

    /// Remove an element; true if it was a member
    ///
    /// With `retire`, the element also leaves the pending state while the
    /// map entry is locked, and the result is true only for the first retirer.
    fn remove_member(&self, element: &Arc<WatchedElement>, retire: bool) -> bool {
        let key = GroupKey::for_element(element, self.grouping);
        let mut removed = false;
        let mut retired = false;

        let emptied = self.groups.remove_if(&key, |_, group| {
            let mut members = group.members.lock();
            if members
                .get(&element.id())
                .is_some_and(|member| Arc::ptr_eq(member, element))
            {
                members.remove(&element.id());
                removed = true;
                retired = retire && element.mark_visible();
            }
            members.is_empty()
        });

        if removed {
            element.clear_limiter();
            debug!("Unregistered {} from {}", element.id(), key.container);
        }

        if let Some((key, group)) = emptied {
            self.teardown(key, &group);
        }

        removed && (retired || !retire)
    }

    /// Cancel the trigger and detach listeners of an emptied group
    fn teardown(&self, key: GroupKey, group: &ListenerGroup) {
        group.trigger.cancel();
        let listeners = group.listeners.lock().take();
        if let Some(listeners) = listeners {
            listeners.detach(self.host.as_ref());
        }
        debug!("Tore down listener group for {} / {:?}", key.container, key.policy);
    }
}
