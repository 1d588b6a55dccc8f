//! The `Connection` trait: the per-peer handle a driver hands to the host
//! after a successful handshake, able to open outbound send streams and
//! report its own identity/liveness.

use async_trait::async_trait;
use liquidmesh_types::{Direction, PeerId, ProtocolId};

use crate::error::NetworkError;
use crate::stream::{ConnectionId, SendStream};

/// A single admitted, handshake-verified connection to a remote peer.
/// Construction (the TLS handshake and identity derivation) happens inside
/// the driver before the connection handler ever sees this trait object.
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;
    fn direction(&self) -> Direction;
    fn local_peer_id(&self) -> &PeerId;
    fn remote_peer_id(&self) -> &PeerId;

    /// Opens a new outbound stream, writing `protocol_id` as the first
    /// length-delimited frame.
    async fn open_send_stream(
        &self,
        protocol_id: &ProtocolId,
    ) -> Result<Box<dyn SendStream>, NetworkError>;

    fn is_closed(&self) -> bool;
    async fn close(&self) -> Result<(), NetworkError>;

    /// Resolves once the connection has died, whether torn down locally
    /// via [`Connection::close`] or because the remote end dropped it.
    /// Lets callers that only hold `Arc<dyn Connection>` watch a live
    /// connection for transport-initiated close without polling
    /// `is_closed`.
    async fn closed(&self);
}
