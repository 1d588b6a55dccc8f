//! Stream abstractions shared by every transport: a send side, a receive
//! side, and the `Stat` triple (direction, owning connection, liveness)
//! every stream reports.
//!
//! Shape follows `original_source/core/network/stream.go`'s
//! `SendStream`/`ReceiveStream`/`Stream` interfaces; Rust expresses the
//! `io.Writer`/`io.Reader`/`io.Closer` embedding as three narrow traits
//! instead of Go's interface embedding.

use async_trait::async_trait;
use liquidmesh_types::{Direction, PeerId};

use crate::error::NetworkError;

/// Opaque identifier for a connection, unique within one driver instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Snapshot of a stream's direction, owning connection, and liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub direction: Direction,
    pub connection_id: ConnectionId,
    pub closed: bool,
}

/// Initiator-side half of a stream.
#[async_trait]
pub trait SendStream: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), NetworkError>;
    async fn close(&mut self) -> Result<(), NetworkError>;
    fn stat(&self) -> Stat;
    fn remote_peer_id(&self) -> &PeerId;
}

/// Receiver-side half of a stream.
#[async_trait]
pub trait ReceiveStream: Send {
    /// Reads one frame's worth of bytes into `buf`, returning the number of
    /// bytes written. Mirrors Go's `io.Reader`, not a raw socket read.
    async fn read(&mut self, buf: &mut Vec<u8>) -> Result<usize, NetworkError>;
    async fn close(&mut self) -> Result<(), NetworkError>;
    fn stat(&self) -> Stat;
    fn remote_peer_id(&self) -> &PeerId;
}
