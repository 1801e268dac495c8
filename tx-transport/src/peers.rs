//! Peer identity and the peer-registry collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque peer identity assigned by the surrounding node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a node-assigned peer identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Peer reputation collaborator
///
/// Scoring internals live in the surrounding node; the transport only
/// reports misbehavior.
#[async_trait]
pub trait PeerRegistry: Send + Sync {
    /// Report a misbehaving peer with a reason string
    async fn penalize(&self, peer: &PeerId, reason: &str);
}

/// Ignores all reports, for nodes without peer scoring
#[derive(Debug, Default)]
pub struct NoopPeerRegistry;

#[async_trait]
impl PeerRegistry for NoopPeerRegistry {
    async fn penalize(&self, _peer: &PeerId, _reason: &str) {}
}
