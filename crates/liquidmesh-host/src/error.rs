//! Error taxonomy for the host layer, matching spec.md §7's *Policy*/
//! *Transport*/*Configuration* categories that originate above the driver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host requires at least one network driver (tcp, quic, or both)")]
    NoDriverConfigured,
    #[error("insecure mode requires an explicit local peer id")]
    InsecureRequiresLocalPeerId,
    #[error("peer not connected: {0}")]
    PeerNotConnected(String),
    #[error("no handler registered for protocol {0}")]
    NoHandlerForProtocol(String),
    #[error("network error: {0}")]
    Network(#[from] liquidmesh_network::NetworkError),
    #[error("codec error: {0}")]
    Codec(#[from] liquidmesh_codec::CodecError),
    #[error("address error: {0}")]
    Addr(#[from] liquidmesh_addr::AddrError),
    #[error("control message malformed: {0}")]
    ControlMessageMalformed(String),
}
