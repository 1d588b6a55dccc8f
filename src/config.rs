//! Application configuration: defaults, then an optional `config/default.toml`
//! file source, then environment variable overrides — the same three-layer
//! shape as the teacher's `AppConfig::load`, rebuilt around the fields a
//! `liquidmesh_host::HostConfig` actually needs.

use std::collections::HashMap;
use std::path::Path;

use liquidmesh_addr::MultiAddress;
use liquidmesh_types::PeerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    Load(String),
    #[error("invalid listen address {0:?}: {1}")]
    InvalidListenAddress(String, liquidmesh_addr::AddrError),
    #[error("invalid direct peer address {0:?}: {1}")]
    InvalidDirectPeer(String, liquidmesh_addr::AddrError),
    #[error("direct peer address {0:?} carries no /p2p/<peerId> component")]
    DirectPeerMissingPeerId(String),
    #[error("invalid environment variable {0}: {1}")]
    InvalidEnvVar(&'static str, String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub node: NodeConfig,
    pub tls: TlsConfig,
    pub host: HostTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub peer_id: String,
    pub listen_addresses: Vec<String>,
    pub direct_peers: Vec<String>,
    pub enable_quic: bool,
    pub insecurity: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub ca_cert_path: String,
    pub node_cert_path: String,
    pub node_key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostTuning {
    pub send_stream_pool_init_size: usize,
    pub send_stream_pool_cap: usize,
    pub peer_receive_stream_max_count: usize,
    pub msg_compress: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut app_config = AppConfig {
            node: NodeConfig {
                peer_id: String::new(),
                listen_addresses: vec!["/ip4/0.0.0.0/tcp/9000".to_string()],
                direct_peers: vec![],
                enable_quic: false,
                insecurity: false,
            },
            tls: TlsConfig {
                ca_cert_path: "certs/ca.crt".to_string(),
                node_cert_path: "certs/node.crt".to_string(),
                node_key_path: "certs/node.key".to_string(),
            },
            host: HostTuning {
                send_stream_pool_init_size: 2,
                send_stream_pool_cap: 8,
                peer_receive_stream_max_count: 32,
                msg_compress: false,
            },
        };

        if Path::new("config/default.toml").exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name("config/default"))
                .build()
                .map_err(|e| ConfigError::Load(e.to_string()))?;

            if let Ok(file_config) = settings.try_deserialize::<AppConfig>() {
                app_config = file_config;
            }
        }

        Self::override_from_env(&mut app_config)?;
        Ok(app_config)
    }

    fn override_from_env(config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Ok(peer_id) = std::env::var("LIQUIDMESH_PEER_ID") {
            config.node.peer_id = peer_id;
        }
        if let Ok(listen) = std::env::var("LIQUIDMESH_LISTEN_ADDRESSES") {
            config.node.listen_addresses =
                listen.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(peers) = std::env::var("LIQUIDMESH_DIRECT_PEERS") {
            config.node.direct_peers =
                peers.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = std::env::var("LIQUIDMESH_ENABLE_QUIC") {
            config.node.enable_quic = v.parse().map_err(|e| {
                ConfigError::InvalidEnvVar("LIQUIDMESH_ENABLE_QUIC", format!("{e}"))
            })?;
        }
        if let Ok(v) = std::env::var("LIQUIDMESH_INSECURITY") {
            config.node.insecurity = v
                .parse()
                .map_err(|e| ConfigError::InvalidEnvVar("LIQUIDMESH_INSECURITY", format!("{e}")))?;
        }
        if let Ok(path) = std::env::var("LIQUIDMESH_CA_CERT_PATH") {
            config.tls.ca_cert_path = path;
        }
        if let Ok(path) = std::env::var("LIQUIDMESH_NODE_CERT_PATH") {
            config.tls.node_cert_path = path;
        }
        if let Ok(path) = std::env::var("LIQUIDMESH_NODE_KEY_PATH") {
            config.tls.node_key_path = path;
        }
        if let Ok(v) = std::env::var("LIQUIDMESH_MSG_COMPRESS") {
            config.host.msg_compress = v
                .parse()
                .map_err(|e| ConfigError::InvalidEnvVar("LIQUIDMESH_MSG_COMPRESS", format!("{e}")))?;
        }
        Ok(())
    }

    pub fn local_peer_id(&self) -> PeerId {
        PeerId::new(self.node.peer_id.clone())
    }

    pub fn listen_addresses(&self) -> Result<Vec<MultiAddress>, ConfigError> {
        self.node
            .listen_addresses
            .iter()
            .map(|s| {
                s.parse::<MultiAddress>()
                    .map_err(|e| ConfigError::InvalidListenAddress(s.clone(), e))
            })
            .collect()
    }

    pub fn direct_peers(&self) -> Result<HashMap<PeerId, MultiAddress>, ConfigError> {
        let mut out = HashMap::new();
        for s in &self.node.direct_peers {
            let addr: MultiAddress =
                s.parse().map_err(|e| ConfigError::InvalidDirectPeer(s.clone(), e))?;
            let peer_id = addr
                .peer_id
                .clone()
                .ok_or_else(|| ConfigError::DirectPeerMissingPeerId(s.clone()))?;
            out.insert(peer_id, addr);
        }
        Ok(out)
    }
}
