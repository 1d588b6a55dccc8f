//! `NetworkDriver`: the shared contract both the TCP and QUIC transports
//! implement, per spec.md §4.5. The host is transport-agnostic above this
//! trait.

use std::sync::Arc;

use async_trait::async_trait;
use liquidmesh_addr::MultiAddress;
use liquidmesh_types::PeerId;

use crate::connection::Connection;
use crate::error::NetworkError;

/// Callback invoked for each admitted connection; returning `false` rejects
/// it (the driver closes it immediately and silently).
pub type ConnHandler = Arc<dyn Fn(Arc<dyn Connection>) -> bool + Send + Sync>;

#[async_trait]
pub trait NetworkDriver: Send + Sync {
    /// Idempotently starts listeners on each address, expanding wildcard
    /// addresses per `liquidmesh_addr::enumerate_usable_local` and spawning
    /// one accept loop per concrete listener. Fails if none are listenable.
    async fn listen(&self, addrs: &[MultiAddress]) -> Result<(), NetworkError>;

    /// Dials `remote_addr`, trying each local listen address as a source in
    /// turn before falling back to an ephemeral source. If `remote_addr`
    /// carries a `/p2p/` suffix and the handshake-derived identity differs,
    /// the connection is closed and `PidMismatch` is returned.
    async fn dial(&self, remote_addr: &MultiAddress) -> Result<Arc<dyn Connection>, NetworkError>;

    fn set_new_conn_handler(&self, handler: ConnHandler);

    /// Closes `conn`; fails with `NotTheSameNetwork` if `conn` was not
    /// produced by this driver.
    async fn disconnect(&self, conn: &dyn Connection) -> Result<(), NetworkError>;

    /// Shuts all listeners, signals all loops to exit, and transitions to
    /// closed. A subsequent `listen` resets the driver back to listening.
    async fn close(&self) -> Result<(), NetworkError>;

    fn local_peer_id(&self) -> &PeerId;

    fn listen_addresses(&self) -> Vec<MultiAddress>;
}
