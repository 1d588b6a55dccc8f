//! Transport substrate for the liquidmesh host: multi-address parsing,
//! TLS-handshake-bound peer identity, framed packages, and bounded stream
//! pools are carried by the sibling crates; this crate owns the two
//! concrete `NetworkDriver` implementations and the connection/stream
//! abstractions they share.
//!
//! ```text
//!                 +-------------------+
//!                 |   NetworkDriver   |  (listen / dial / disconnect / close)
//!                 +---------+---------+
//!                           |
//!              +------------+------------+
//!              |                         |
//!       +------+------+          +-------+------+
//!       |  TcpDriver  |          |  QuicDriver  |
//!       +------+------+          +-------+------+
//!              |                         |
//!       mux.rs (hand-rolled)      quinn native streams
//!              |                         |
//!              +------------+------------+
//!                           |
//!                 +---------+---------+
//!                 |     Connection    |  (open_send_stream)
//!                 +---------+---------+
//!                           |
//!              +------------+------------+
//!              |                         |
//!       SendStreamPool            ReceiveStreamSet
//!     (bounded, warm-started)   (admission + receive loop)
//! ```
//!
//! Both drivers derive peer identity from the TLS handshake via
//! [`liquidmesh_identity::CertValidator`] before a connection is ever handed
//! to the connection-accept callback, and both expose the same
//! [`driver::NetworkDriver`] contract so the host above this crate is
//! transport-agnostic.

pub mod connection;
pub mod driver;
pub mod error;
pub mod mux;
pub mod pool;
pub mod quic;
pub mod recv_set;
pub mod stream;
pub mod tcp;
pub mod tls_stream;

pub use connection::Connection;
pub use driver::{ConnHandler, NetworkDriver};
pub use error::NetworkError;
pub use pool::{SendStreamPool, SendStreamPoolConfig};
pub use quic::{QuicDriver, QuicDriverConfig, QUIC_NEGOTIATED_PROTOCOL};
pub use recv_set::ReceiveStreamSet;
pub use stream::{ConnectionId, ReceiveStream, SendStream, Stat};
pub use tcp::{TcpDriver, TcpDriverConfig, TCP_NEGOTIATED_PROTOCOL};
