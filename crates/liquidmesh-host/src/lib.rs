//! The host layer: composes one or more `liquidmesh_network` drivers into
//! a single transport-agnostic peer, protocol-handler registry, and
//! lifecycle-notification point, per spec.md §4.8.

pub mod config;
pub mod control;
pub mod error;
pub mod host;
pub mod notify;

pub use config::{HostConfig, QuicTlsConfig, TcpTlsConfig};
pub use error::HostError;
pub use host::Host;
pub use notify::NotifieeBundle;
