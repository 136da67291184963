//! Scheduler façade and explicit lifecycle hooks
//!
//! A host constructs one [`Scheduler`] per window (or per isolated viewport)
//! and drives it from its own element lifecycle:
//! - `on_attach` when the element is mounted
//! - `on_props_changed` when its configuration is touched
//! - `on_detach` when it is unmounted

use crate::element::{VisibleCallback, WatchedElement};
use crate::host::EventHost;
use crate::probe::GeometryProbe;
use crate::registry::{GroupKey, Registry};
use lazyload_core::{LazyLoadOptions, NodeId, Result, SchedulerConfig, SchedulerError};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Visibility-polling scheduler
#[derive(Clone)]
pub struct Scheduler {
    registry: Registry,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler on the current tokio runtime
    ///
    /// Fails with [`SchedulerError::NoRuntime`] outside a runtime.
    pub fn new(
        probe: Arc<dyn GeometryProbe>,
        host: Arc<dyn EventHost>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        Ok(Self::with_runtime(probe, host, config, runtime))
    }

    /// Create a scheduler that spawns probes and timers on `runtime`
    pub fn with_runtime(
        probe: Arc<dyn GeometryProbe>,
        host: Arc<dyn EventHost>,
        config: SchedulerConfig,
        runtime: Handle,
    ) -> Self {
        debug!("Creating scheduler with {:?} grouping", config.grouping);
        Self {
            registry: Registry::new(probe, host, config.grouping, runtime),
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Build a watched element for `node` from its options
    pub fn watch<F>(&self, node: NodeId, options: &LazyLoadOptions, on_visible: F) -> Arc<WatchedElement>
    where
        F: FnOnce() + Send + 'static,
    {
        let callback: VisibleCallback = Box::new(on_visible);
        Arc::new(WatchedElement::from_options(node, options, Some(callback)))
    }

    /// Start polling an element
    pub fn register(&self, element: &Arc<WatchedElement>) -> Result<()> {
        self.registry.register(element)
    }

    /// Stop polling an element
    pub fn unregister(&self, element: &Arc<WatchedElement>) -> Result<()> {
        self.registry.unregister(element)
    }

    /// Element was mounted
    pub fn on_attach(&self, element: &Arc<WatchedElement>) -> Result<()> {
        self.register(element)
    }

    /// Element configuration changed; re-check if still pending
    ///
    /// Returns whether a check was started.
    pub fn on_props_changed(&self, element: &Arc<WatchedElement>) -> bool {
        self.registry.recheck(element)
    }

    /// Element was unmounted
    ///
    /// Idempotent: detaching an element that already became visible or was
    /// never attached does nothing. Any probe still in flight is ignored.
    pub fn on_detach(&self, element: &Arc<WatchedElement>) {
        match self.registry.unregister(element) {
            Ok(()) => debug!("Detached {} while pending", element.id()),
            Err(_) => debug!("Detached {} (not registered)", element.id()),
        }
    }

    /// Whether the element is currently polling
    pub fn is_registered(&self, element: &Arc<WatchedElement>) -> bool {
        self.registry.contains(element)
    }

    /// Group key the element polls under
    pub fn group_key(&self, element: &WatchedElement) -> GroupKey {
        GroupKey::for_element(element, self.config.grouping)
    }

    /// Number of live listener groups
    pub fn group_count(&self) -> usize {
        self.registry.group_count()
    }

    /// Members of the group for `key`
    pub fn member_count(&self, key: &GroupKey) -> usize {
        self.registry.member_count(key)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
