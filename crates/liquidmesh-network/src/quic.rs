//! QUIC network driver.
//!
//! Grounded in the production variant's `QuicEngine`/`QuicListener`
//! (`production/crates/network/src/{quic_engine,quic_listener}.rs`): one
//! `quinn::Endpoint` per driver, an accept loop spawning a handler task per
//! incoming connection, and per-connection `accept_bi` loop for inbound
//! streams. Unlike TCP, QUIC gives native multiplexed streams, so no
//! hand-rolled mux is needed here — each logical stream is a `quinn`
//! bidirectional stream whose first frame carries the protocol tag.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};

use async_trait::async_trait;
use liquidmesh_addr::{can_dial_quic, can_listen_quic, enumerate_usable_local, MultiAddress};
use liquidmesh_codec::Package;
use liquidmesh_identity::CertValidator;
use liquidmesh_types::{Direction, PeerId, ProtocolId};
use quinn::{ClientConfig, Endpoint, ServerConfig};
use rustls::pki_types::CertificateDer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::driver::{ConnHandler, NetworkDriver};
use crate::error::NetworkError;
use crate::recv_set::{run_receive_loop, ReceiveStreamSet};
use crate::stream::{ConnectionId, ReceiveStream, SendStream, Stat};

pub const QUIC_NEGOTIATED_PROTOCOL: &str = "liquid-network-quic-1";

pub struct QuicDriverConfig {
    pub local_peer_id: PeerId,
    pub server_config: Option<ServerConfig>,
    pub client_config: Option<ClientConfig>,
    pub identity: Arc<CertValidator>,
    pub recv_max_inbound_streams: usize,
    pub dispatch: Arc<dyn Fn(PeerId, Package) + Send + Sync>,
}

struct EndpointHandle {
    addr: MultiAddress,
    endpoint: Endpoint,
    task: tokio::task::JoinHandle<()>,
}

pub struct QuicDriver {
    self_weak: Weak<QuicDriver>,
    local_peer_id: PeerId,
    server_config: Option<ServerConfig>,
    client_config: Option<ClientConfig>,
    identity: Arc<CertValidator>,
    recv_set: Arc<ReceiveStreamSet>,
    dispatch: Arc<dyn Fn(PeerId, Package) + Send + Sync>,
    conn_handler: StdMutex<Option<ConnHandler>>,
    endpoints: Mutex<Vec<EndpointHandle>>,
    connections: Mutex<HashMap<ConnectionId, Arc<QuicConnection>>>,
    next_conn_id: AtomicU64,
    listening: AtomicBool,
}

impl QuicDriver {
    pub fn new(config: QuicDriverConfig) -> Result<Arc<Self>, NetworkError> {
        if config.server_config.is_none() && config.client_config.is_none() {
            return Err(NetworkError::LocalPeerIdNotSet);
        }
        Ok(Arc::new_cyclic(|weak| Self {
            self_weak: weak.clone(),
            local_peer_id: config.local_peer_id,
            server_config: config.server_config,
            client_config: config.client_config,
            identity: config.identity,
            recv_set: Arc::new(ReceiveStreamSet::new(config.recv_max_inbound_streams)),
            dispatch: config.dispatch,
            conn_handler: StdMutex::new(None),
            endpoints: Mutex::new(Vec::new()),
            connections: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            listening: AtomicBool::new(false),
        }))
    }

    async fn admit(self: &Arc<Self>, conn: Arc<QuicConnection>) -> bool {
        let handler = self.conn_handler.lock().unwrap().clone();
        let accepted = match handler {
            Some(h) => h(conn.clone() as Arc<dyn Connection>),
            None => true,
        };
        if accepted {
            self.connections.lock().await.insert(conn.id, Arc::clone(&conn));
            let recv_set = Arc::clone(&self.recv_set);
            let dispatch = Arc::clone(&self.dispatch);
            let inner = conn.inner.clone();
            let conn_id = conn.id;
            let remote = conn.remote_peer_id.clone();
            tokio::spawn(async move {
                run_inbound_stream_loop(inner, recv_set, dispatch, conn_id, remote).await;
            });
        }
        accepted
    }

    async fn spawn_accept_loop(self: &Arc<Self>, endpoint: Endpoint) {
        loop {
            let incoming = match endpoint.accept().await {
                Some(incoming) => incoming,
                None => {
                    info!("quic endpoint closed, accept loop exiting");
                    break;
                }
            };
            let driver = Arc::clone(self);
            tokio::spawn(async move {
                let remote_addr = incoming.remote_address();
                match incoming.await {
                    Ok(connection) => {
                        if let Err(e) = driver.handle_incoming(connection).await {
                            debug!(peer = %remote_addr, error = %e, "quic handshake rejected");
                        }
                    }
                    Err(e) => warn!(peer = %remote_addr, error = %e, "quic handshake failed"),
                }
            });
        }
    }

    async fn handle_incoming(self: &Arc<Self>, connection: quinn::Connection) -> Result<(), NetworkError> {
        let peer_certs = peer_certificates(&connection);
        let derived = self.identity.verify_and_derive(&peer_certs).await?;

        let conn = Arc::new(QuicConnection {
            id: ConnectionId(self.next_conn_id.fetch_add(1, Ordering::SeqCst)),
            direction: Direction::Inbound,
            local_peer_id: self.local_peer_id.clone(),
            remote_peer_id: derived.peer_id,
            inner: connection.clone(),
            closed: AtomicBool::new(false),
        });

        if !self.admit(conn).await {
            connection.close(0u32.into(), b"rejected by connection handler");
            return Err(NetworkError::ConnectionRejected);
        }
        Ok(())
    }
}

fn peer_certificates(connection: &quinn::Connection) -> Vec<CertificateDer<'static>> {
    connection
        .peer_identity()
        .and_then(|identity| identity.downcast::<Vec<CertificateDer<'static>>>().ok())
        .map(|certs| *certs)
        .unwrap_or_default()
}

async fn run_inbound_stream_loop(
    connection: quinn::Connection,
    recv_set: Arc<ReceiveStreamSet>,
    dispatch: Arc<dyn Fn(PeerId, Package) + Send + Sync>,
    conn_id: ConnectionId,
    remote_peer_id: PeerId,
) {
    loop {
        let (send, mut recv) = match connection.accept_bi().await {
            Ok(pair) => pair,
            Err(_) => break,
        };
        drop(send); // inbound streams here only ever carry data back toward the dialer via their own open_bi
        let recv_set = Arc::clone(&recv_set);
        let dispatch = Arc::clone(&dispatch);
        let remote = remote_peer_id.clone();
        tokio::spawn(async move {
            let protocol_tag = match read_length_prefixed(&mut recv).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => return,
            };
            if !recv_set.try_admit(&remote).await {
                warn!(peer = %remote, "inbound quic stream rejected, max inbound streams exceeded");
                return;
            }
            let stream = QuicReceiveStream {
                recv,
                remote_peer_id: remote,
                connection_id: conn_id,
                protocol_tag,
            };
            run_receive_loop(recv_set, Box::new(stream), dispatch).await;
        });
    }
}

async fn read_length_prefixed(recv: &mut quinn::RecvStream) -> Result<Vec<u8>, NetworkError> {
    let mut len_buf = [0u8; 4];
    recv.read_exact(&mut len_buf)
        .await
        .map_err(|e| NetworkError::Io(std::io::Error::other(e.to_string())))?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut data = vec![0u8; len];
    recv.read_exact(&mut data)
        .await
        .map_err(|e| NetworkError::Io(std::io::Error::other(e.to_string())))?;
    Ok(data)
}

pub struct QuicConnection {
    id: ConnectionId,
    direction: Direction,
    local_peer_id: PeerId,
    remote_peer_id: PeerId,
    inner: quinn::Connection,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for QuicConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }
    fn direction(&self) -> Direction {
        self.direction
    }
    fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }
    fn remote_peer_id(&self) -> &PeerId {
        &self.remote_peer_id
    }

    async fn open_send_stream(
        &self,
        protocol_id: &ProtocolId,
    ) -> Result<Box<dyn SendStream>, NetworkError> {
        let (mut send, _recv) = self
            .inner
            .open_bi()
            .await
            .map_err(|e| NetworkError::HandshakeFailed(e.to_string()))?;
        let tag = protocol_id.as_str().as_bytes();
        send.write_all(&(tag.len() as u32).to_be_bytes())
            .await
            .map_err(|e| NetworkError::Io(std::io::Error::other(e.to_string())))?;
        send.write_all(tag)
            .await
            .map_err(|e| NetworkError::Io(std::io::Error::other(e.to_string())))?;
        Ok(Box::new(QuicSendStream {
            send,
            remote_peer_id: self.remote_peer_id.clone(),
            connection_id: self.id,
        }))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), NetworkError> {
        self.closed.store(true, Ordering::SeqCst);
        self.inner.close(0u32.into(), b"closed");
        Ok(())
    }

    async fn closed(&self) {
        // `quinn::Connection::closed` resolves on either a locally-issued
        // `close()` or the remote end closing/timing out, so it doubles
        // as the liveness signal without any extra bookkeeping.
        self.inner.closed().await;
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct QuicSendStream {
    send: quinn::SendStream,
    remote_peer_id: PeerId,
    connection_id: ConnectionId,
}

#[async_trait]
impl SendStream for QuicSendStream {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), NetworkError> {
        self.send
            .write_all(&(bytes.len() as u32).to_be_bytes())
            .await
            .map_err(|e| NetworkError::Io(std::io::Error::other(e.to_string())))?;
        self.send
            .write_all(bytes)
            .await
            .map_err(|e| NetworkError::Io(std::io::Error::other(e.to_string())))
    }

    async fn close(&mut self) -> Result<(), NetworkError> {
        self.send
            .finish()
            .map_err(|e| NetworkError::Io(std::io::Error::other(e.to_string())))
    }

    fn stat(&self) -> Stat {
        Stat {
            direction: Direction::Outbound,
            connection_id: self.connection_id,
            closed: false,
        }
    }

    fn remote_peer_id(&self) -> &PeerId {
        &self.remote_peer_id
    }
}

struct QuicReceiveStream {
    recv: quinn::RecvStream,
    remote_peer_id: PeerId,
    connection_id: ConnectionId,
    protocol_tag: String,
}

#[async_trait]
impl ReceiveStream for QuicReceiveStream {
    async fn read(&mut self, buf: &mut Vec<u8>) -> Result<usize, NetworkError> {
        match read_length_prefixed(&mut self.recv).await {
            Ok(data) => {
                let n = data.len();
                *buf = data;
                Ok(n)
            }
            Err(_) => Ok(0),
        }
    }

    async fn close(&mut self) -> Result<(), NetworkError> {
        self.recv.stop(0u32.into()).ok();
        Ok(())
    }

    fn stat(&self) -> Stat {
        Stat {
            direction: Direction::Inbound,
            connection_id: self.connection_id,
            closed: false,
        }
    }

    fn remote_peer_id(&self) -> &PeerId {
        &self.remote_peer_id
    }
}

impl QuicReceiveStream {
    pub fn protocol_tag(&self) -> &str {
        &self.protocol_tag
    }
}

#[async_trait]
impl NetworkDriver for QuicDriver {
    async fn listen(&self, addrs: &[MultiAddress]) -> Result<(), NetworkError> {
        if addrs.is_empty() {
            return Err(NetworkError::NoListenableAddress);
        }
        let driver = self.self_weak.upgrade().ok_or(NetworkError::Closed)?;
        let server_config = self
            .server_config
            .clone()
            .ok_or(NetworkError::TlsConfigMissing)?;

        let mut bound_any = false;
        let mut endpoints = self.endpoints.lock().await;
        for addr in addrs {
            if !can_listen_quic(addr) {
                continue;
            }
            let expanded = match enumerate_usable_local(addr) {
                Ok(list) => list,
                Err(_) => continue,
            };
            for concrete in expanded {
                let socket_addr: SocketAddr = match concrete.net_addr.to_socket_string().parse() {
                    Ok(a) => a,
                    Err(_) => continue,
                };
                let endpoint = match Endpoint::server(server_config.clone(), socket_addr) {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(addr = %concrete, error = %e, "quic bind failed");
                        continue;
                    }
                };
                bound_any = true;
                info!(addr = %concrete, "listening");
                let driver = Arc::clone(&driver);
                let endpoint_clone = endpoint.clone();
                let task = tokio::spawn(async move {
                    driver.spawn_accept_loop(endpoint_clone).await;
                });
                endpoints.push(EndpointHandle {
                    addr: concrete,
                    endpoint,
                    task,
                });
            }
        }
        if !bound_any {
            return Err(NetworkError::NoListenableAddress);
        }
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn dial(&self, remote_addr: &MultiAddress) -> Result<Arc<dyn Connection>, NetworkError> {
        if !self.listening.load(Ordering::SeqCst) {
            return Err(NetworkError::ListenerRequired);
        }
        if !can_dial_quic(remote_addr) {
            return Err(NetworkError::UndialableAddress(remote_addr.to_string()));
        }
        let client_config = self
            .client_config
            .clone()
            .ok_or(NetworkError::TlsConfigMissing)?;

        let endpoints = self.endpoints.lock().await;
        let dial_endpoint = endpoints
            .first()
            .map(|h| h.endpoint.clone())
            .ok_or(NetworkError::ListenerRequired)?;
        drop(endpoints);

        let socket_addr: SocketAddr = remote_addr
            .net_addr
            .to_socket_string()
            .parse()
            .map_err(|_| NetworkError::UndialableAddress(remote_addr.to_string()))?;

        let connecting = dial_endpoint
            .connect_with(client_config, socket_addr, "liquidmesh-peer")
            .map_err(|e| NetworkError::AllDialsFailed(e.to_string()))?;
        let connection = connecting
            .await
            .map_err(|e| NetworkError::AllDialsFailed(e.to_string()))?;

        let peer_certs = peer_certificates(&connection);
        let derived = self.identity.verify_and_derive(&peer_certs).await?;

        if let Some(expected) = &remote_addr.peer_id {
            if expected != &derived.peer_id {
                connection.close(0u32.into(), b"pid mismatch");
                return Err(NetworkError::PidMismatch {
                    expected: expected.to_string(),
                    got: derived.peer_id.to_string(),
                });
            }
        }

        let conn = Arc::new(QuicConnection {
            id: ConnectionId(self.next_conn_id.fetch_add(1, Ordering::SeqCst)),
            direction: Direction::Outbound,
            local_peer_id: self.local_peer_id.clone(),
            remote_peer_id: derived.peer_id,
            inner: connection,
            closed: AtomicBool::new(false),
        });

        let handler = self.conn_handler.lock().unwrap().clone();
        let accepted = match handler {
            Some(h) => h(conn.clone() as Arc<dyn Connection>),
            None => true,
        };
        if !accepted {
            return Err(NetworkError::ConnectionRejected);
        }
        self.connections.lock().await.insert(conn.id, Arc::clone(&conn));

        let recv_set = Arc::clone(&self.recv_set);
        let dispatch = Arc::clone(&self.dispatch);
        let inner = conn.inner.clone();
        let conn_id = conn.id;
        let remote = conn.remote_peer_id.clone();
        tokio::spawn(async move {
            run_inbound_stream_loop(inner, recv_set, dispatch, conn_id, remote).await;
        });

        Ok(conn as Arc<dyn Connection>)
    }

    fn set_new_conn_handler(&self, handler: ConnHandler) {
        *self.conn_handler.lock().unwrap() = Some(handler);
    }

    async fn disconnect(&self, conn: &dyn Connection) -> Result<(), NetworkError> {
        let mut connections = self.connections.lock().await;
        if connections.remove(&conn.id()).is_none() {
            return Err(NetworkError::NotTheSameNetwork);
        }
        conn.close().await
    }

    async fn close(&self) -> Result<(), NetworkError> {
        self.listening.store(false, Ordering::SeqCst);
        let mut endpoints = self.endpoints.lock().await;
        for handle in endpoints.drain(..) {
            handle.endpoint.close(0u32.into(), b"driver closed");
            handle.task.abort();
        }
        let mut connections = self.connections.lock().await;
        for (_, conn) in connections.drain() {
            let _ = Connection::close(conn.as_ref()).await;
        }
        Ok(())
    }

    fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    fn listen_addresses(&self) -> Vec<MultiAddress> {
        self.endpoints
            .try_lock()
            .map(|endpoints| endpoints.iter().map(|h| h.addr.clone()).collect())
            .unwrap_or_default()
    }
}
