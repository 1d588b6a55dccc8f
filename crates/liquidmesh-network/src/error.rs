//! Error taxonomy for the network layer. Names follow
//! `production/crates/network/src/error.rs`'s `NetworkError` shape, with
//! the driver-lifecycle variants renamed after
//! `original_source/host/tcp/network.go`'s sentinel errors
//! (`ErrPidMismatch`, `ErrNotTheSameNetwork`, `ErrNoUsableLocalAddress`,
//! `ErrListenerRequired`, ...).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("tls config missing or carries no certificates")]
    TlsConfigMissing,
    #[error("local peer id not configured")]
    LocalPeerIdNotSet,
    #[error("address cannot be listened on by this driver: {0}")]
    UnlistenableAddress(String),
    #[error("address cannot be dialed by this driver: {0}")]
    UndialableAddress(String),
    #[error("no address is listenable")]
    NoListenableAddress,
    #[error("no usable local address found")]
    NoUsableLocalAddress,
    #[error("listener required: call listen() before dial()")]
    ListenerRequired,
    #[error("all dial attempts failed: {0}")]
    AllDialsFailed(String),
    #[error("pid mismatch: expected {expected}, got {got}")]
    PidMismatch { expected: String, got: String },
    #[error("connection does not belong to this driver")]
    NotTheSameNetwork,
    #[error("connection rejected by connection handler")]
    ConnectionRejected,
    #[error("tls handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("identity derivation failed: {0}")]
    IdentityFailed(#[from] liquidmesh_identity::IdentityError),
    #[error("bind failed: {0}")]
    BindFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] liquidmesh_codec::CodecError),
    #[error("address error: {0}")]
    Addr(#[from] liquidmesh_addr::AddrError),
    #[error("send stream pool exhausted for peer {0}")]
    PoolExhausted(String),
    #[error("peer not found: {0}")]
    PeerNotFound(String),
    #[error("stream closed")]
    StreamClosed,
    #[error("driver closed")]
    Closed,
    #[error("insecurity mode requires a /p2p/<peerId> suffix on the dialed address: {0}")]
    InsecurityRemotePeerIdRequired(String),
}
