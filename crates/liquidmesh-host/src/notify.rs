//! Lifecycle notifiee bundle: `peerConnected`/`peerDisconnected`/
//! `peerProtocolSupported`/`peerProtocolUnsupported`, per spec.md §6's
//! "Lifecycle events" and grounded in
//! `original_source/host/host_quic_test.go`'s `connectC`/`disconnectC`/
//! `protocolSupportC`/`protocolUnsupportC` channel bundle — expressed here
//! as callbacks rather than channels since the host can call them
//! directly rather than requiring every subscriber to run its own select
//! loop.

use std::sync::Arc;

use liquidmesh_types::{PeerId, ProtocolId};

type PeerCallback = Arc<dyn Fn(PeerId) + Send + Sync>;
type ProtocolCallback = Arc<dyn Fn(ProtocolId, PeerId) + Send + Sync>;

/// One subscriber's lifecycle callbacks. Any field left `None` is simply
/// not invoked for that event; a bundle with every field `None` is valid
/// but useless.
#[derive(Clone, Default)]
pub struct NotifieeBundle {
    pub peer_connected: Option<PeerCallback>,
    pub peer_disconnected: Option<PeerCallback>,
    pub peer_protocol_supported: Option<ProtocolCallback>,
    pub peer_protocol_unsupported: Option<ProtocolCallback>,
}

impl NotifieeBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_peer_connected(mut self, f: impl Fn(PeerId) + Send + Sync + 'static) -> Self {
        self.peer_connected = Some(Arc::new(f));
        self
    }

    pub fn on_peer_disconnected(mut self, f: impl Fn(PeerId) + Send + Sync + 'static) -> Self {
        self.peer_disconnected = Some(Arc::new(f));
        self
    }

    pub fn on_peer_protocol_supported(
        mut self,
        f: impl Fn(ProtocolId, PeerId) + Send + Sync + 'static,
    ) -> Self {
        self.peer_protocol_supported = Some(Arc::new(f));
        self
    }

    pub fn on_peer_protocol_unsupported(
        mut self,
        f: impl Fn(ProtocolId, PeerId) + Send + Sync + 'static,
    ) -> Self {
        self.peer_protocol_unsupported = Some(Arc::new(f));
        self
    }
}
