//! Asynchronous geometry test consumed by the scheduler

use async_trait::async_trait;
use lazyload_core::{Container, NodeId, Offsets};
use thiserror::Error;

/// Probe failure
///
/// Never fatal: the scheduler treats it as "not visible this round".
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("geometry unavailable for {0}")]
    Unavailable(NodeId),

    #[error("probe failed: {0}")]
    Failed(String),
}

/// Decides whether a node currently intersects a container's viewport
#[async_trait]
pub trait GeometryProbe: Send + Sync {
    /// True iff the node's bounding rectangle overlaps the container's visible
    /// rectangle expanded outward by `offsets`
    ///
    /// Nodes that are not attached to a renderable tree resolve `Ok(false)`.
    async fn probe(
        &self,
        node: NodeId,
        container: Container,
        offsets: Offsets,
    ) -> Result<bool, ProbeError>;
}
