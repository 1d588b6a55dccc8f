//! `HostConfig`: every option of spec.md §6's configuration table as a
//! typed field, built with the teacher's `AppConfig`-style defaults-plus-
//! override shape (`crates/liquidmesh-host` has no file/env loading of its
//! own — that ambient concern lives in the demo binary's `config.rs`,
//! which builds a `HostConfig` from `config::Config` + environment
//! overrides the way the teacher's `AppConfig::load` does).

use std::collections::HashMap;
use std::sync::Arc;

use liquidmesh_addr::MultiAddress;
use liquidmesh_identity::CertValidator;
use liquidmesh_types::PeerId;

/// TLS material for one transport variant. `None` models "this transport
/// is not enabled"; per-variant rather than shared since TCP and QUIC use
/// distinct `rustls`/`quinn` config types.
pub struct TcpTlsConfig {
    pub server_config: Option<Arc<rustls::ServerConfig>>,
    pub client_config: Option<Arc<rustls::ClientConfig>>,
}

pub struct QuicTlsConfig {
    pub server_config: Option<quinn::ServerConfig>,
    pub client_config: Option<quinn::ClientConfig>,
}

/// Every option of spec.md §6's host configuration table.
pub struct HostConfig {
    /// Derives the local peer id and TLS identity when TLS is enabled.
    /// Unused directly when `insecurity` is set; `local_peer_id` then
    /// carries the identity instead.
    pub local_peer_id: PeerId,

    /// `TlsCfg`: TCP transport TLS configuration.
    pub tcp_tls: Option<TcpTlsConfig>,
    /// `QTlsCfg`: QUIC transport TLS configuration.
    pub quic_tls: Option<QuicTlsConfig>,

    /// `LoadPidFunc`/`LoadPidFuncQ`: shared across both transports since
    /// the derivation (verify chain, hash SPKI, extract cert-id extension)
    /// does not differ between them.
    pub identity: Arc<CertValidator>,

    /// `Insecurity`: disables TLS. When set, both `tcp_tls`/`quic_tls` must
    /// be `None` and `local_peer_id` is taken as-is rather than derived.
    pub insecurity: bool,

    /// `ListenAddresses`: driver listen endpoints, split by transport via
    /// `liquidmesh_addr::{can_listen_tcp,can_listen_quic}`.
    pub listen_addresses: Vec<MultiAddress>,

    /// `DirectPeers`: dialed at `start()`.
    pub direct_peers: HashMap<PeerId, MultiAddress>,

    /// `SendStreamPoolInitSize`.
    pub send_stream_pool_init_size: usize,
    /// `SendStreamPoolCap`.
    pub send_stream_pool_cap: usize,
    /// `PeerReceiveStreamMaxCount`.
    pub peer_receive_stream_max_count: usize,
    /// `MsgCompress`.
    pub msg_compress: bool,
}
