//! `Host`: the composition point owning the network drivers, peer table,
//! protocol handler registry, and notifiee list, per spec.md §4.8.
//!
//! Grounded in `original_source/host/host_quic_test.go`'s notifiee-bundle
//! shape (`connectC`/`disconnectC`/`protocolSupportC`/`protocolUnsupportC`
//! channels, translated here to callback bundles) and in the teacher's
//! `ThresholdVotingApp`/`MtlsNode` composition (`src/app.rs`,
//! `crates/network/src/mtls_node.rs`) for the overall "one struct owns the
//! driver, the peer map, and the background tasks" shape.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};

use liquidmesh_addr::{can_dial_tcp, can_listen_quic, can_listen_tcp, MultiAddress};
use liquidmesh_codec::Package;
use liquidmesh_identity::CertValidator;
use liquidmesh_network::{
    Connection, ConnHandler, ConnectionId, NetworkDriver, QuicDriver, QuicDriverConfig,
    SendStreamPool, SendStreamPoolConfig, TcpDriver, TcpDriverConfig,
};
use liquidmesh_types::{Direction, PeerId, ProtocolId};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::control::{ControlMessage, CONTROL_PROTOCOL_ID};
use crate::error::HostError;
use crate::notify::NotifieeBundle;

type ProtocolHandler = Arc<dyn Fn(PeerId, Vec<u8>) + Send + Sync>;

struct PeerEntry {
    connection: Arc<dyn Connection>,
    protocols: HashSet<ProtocolId>,
}

pub struct Host {
    local_peer_id: PeerId,
    tcp_driver: Option<Arc<TcpDriver>>,
    quic_driver: Option<Arc<QuicDriver>>,
    identity: Arc<CertValidator>,
    peer_table: StdRwLock<HashMap<PeerId, PeerEntry>>,
    protocol_handlers: StdRwLock<HashMap<ProtocolId, ProtocolHandler>>,
    pools: TokioMutex<HashMap<(PeerId, ProtocolId), Arc<SendStreamPool>>>,
    notifiees: StdRwLock<Vec<NotifieeBundle>>,
    listen_addresses: Vec<MultiAddress>,
    direct_peers: HashMap<PeerId, MultiAddress>,
    send_pool_init: usize,
    send_pool_cap: usize,
    msg_compress: bool,
}

impl Host {
    pub fn new(config: HostConfig) -> Result<Arc<Self>, HostError> {
        if config.insecurity && config.local_peer_id.as_str().is_empty() {
            return Err(HostError::InsecureRequiresLocalPeerId);
        }

        // The dispatch closure needs a way back into `Host` before `Host`
        // exists; a shared cell filled in immediately after construction
        // sidesteps `Arc::new_cyclic`'s "closure must return `Self`
        // infallibly" restriction, which doesn't fit the fallible driver
        // construction below.
        let weak_cell: Arc<StdMutex<Option<std::sync::Weak<Host>>>> = Arc::new(StdMutex::new(None));
        let dispatch_cell = Arc::clone(&weak_cell);
        let dispatch: Arc<dyn Fn(PeerId, Package) + Send + Sync> = Arc::new(move |peer_id, pkg| {
            let weak = dispatch_cell.lock().unwrap().clone();
            if let Some(host) = weak.and_then(|w| w.upgrade()) {
                tokio::spawn(async move { host.handle_inbound_package(peer_id, pkg).await });
            }
        });

        // Insecurity mode still brings up a TCP driver — just one with no
        // TLS configs, so it falls back to the plaintext peer-id handshake.
        // QUIC has no such fallback (the protocol mandates TLS), so it stays
        // disabled whenever `quic_tls` is absent.
        let tcp_driver = match config.tcp_tls {
            Some(tls) => Some(TcpDriver::new(TcpDriverConfig {
                local_peer_id: config.local_peer_id.clone(),
                server_config: tls.server_config,
                client_config: tls.client_config,
                identity: Arc::clone(&config.identity),
                recv_max_inbound_streams: config.peer_receive_stream_max_count,
                dispatch: Arc::clone(&dispatch),
            })?),
            None if config.insecurity => Some(TcpDriver::new(TcpDriverConfig {
                local_peer_id: config.local_peer_id.clone(),
                server_config: None,
                client_config: None,
                identity: Arc::clone(&config.identity),
                recv_max_inbound_streams: config.peer_receive_stream_max_count,
                dispatch: Arc::clone(&dispatch),
            })?),
            None => None,
        };
        let quic_driver = match config.quic_tls {
            Some(tls) => Some(QuicDriver::new(QuicDriverConfig {
                local_peer_id: config.local_peer_id.clone(),
                server_config: tls.server_config,
                client_config: tls.client_config,
                identity: Arc::clone(&config.identity),
                recv_max_inbound_streams: config.peer_receive_stream_max_count,
                dispatch: Arc::clone(&dispatch),
            })?),
            None => None,
        };
        if tcp_driver.is_none() && quic_driver.is_none() {
            return Err(HostError::NoDriverConfigured);
        }

        let host = Arc::new(Host {
            local_peer_id: config.local_peer_id,
            tcp_driver,
            quic_driver,
            identity: config.identity,
            peer_table: StdRwLock::new(HashMap::new()),
            protocol_handlers: StdRwLock::new(HashMap::new()),
            pools: TokioMutex::new(HashMap::new()),
            notifiees: StdRwLock::new(Vec::new()),
            listen_addresses: config.listen_addresses,
            direct_peers: config.direct_peers,
            send_pool_init: config.send_stream_pool_init_size,
            send_pool_cap: config.send_stream_pool_cap,
            msg_compress: config.msg_compress,
        });
        *weak_cell.lock().unwrap() = Some(Arc::downgrade(&host));

        let handler_host = Arc::clone(&host);
        let conn_handler: ConnHandler = Arc::new(move |conn| handler_host.on_new_connection(conn));
        if let Some(driver) = &host.tcp_driver {
            driver.set_new_conn_handler(Arc::clone(&conn_handler));
        }
        if let Some(driver) = &host.quic_driver {
            driver.set_new_conn_handler(Arc::clone(&conn_handler));
        }

        Ok(host)
    }

    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    /// Brings every configured driver to `listen` and dials every direct
    /// peer. Per spec.md §4.8's `start()`.
    pub async fn start(self: &Arc<Self>) -> Result<(), HostError> {
        let tcp_addrs: Vec<MultiAddress> = self.listen_addresses.iter().filter(|a| can_listen_tcp(a)).cloned().collect();
        let quic_addrs: Vec<MultiAddress> = self.listen_addresses.iter().filter(|a| can_listen_quic(a)).cloned().collect();

        if let Some(driver) = &self.tcp_driver {
            if !tcp_addrs.is_empty() {
                driver.listen(&tcp_addrs).await?;
            }
        }
        if let Some(driver) = &self.quic_driver {
            if !quic_addrs.is_empty() {
                driver.listen(&quic_addrs).await?;
            }
        }

        for (peer_id, addr) in self.direct_peers.clone() {
            let host = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = host.dial_direct_peer(&peer_id, &addr).await {
                    warn!(peer = %peer_id, addr = %addr, error = %e, "direct peer dial failed");
                }
            });
        }
        Ok(())
    }

    async fn dial_direct_peer(self: &Arc<Self>, peer_id: &PeerId, addr: &MultiAddress) -> Result<(), HostError> {
        let conn = if can_dial_tcp(addr) {
            self.tcp_driver.as_ref().ok_or(HostError::NoDriverConfigured)?.dial(addr).await?
        } else {
            self.quic_driver.as_ref().ok_or(HostError::NoDriverConfigured)?.dial(addr).await?
        };
        debug!(peer = %peer_id, remote = %conn.remote_peer_id(), "dialed direct peer");
        Ok(())
    }

    /// Closes every driver, drains every pool, and notifies subscribers of
    /// disconnections. Per spec.md §4.8's `stop()`.
    pub async fn stop(&self) -> Result<(), HostError> {
        let disconnected: Vec<PeerId> = {
            let mut table = self.peer_table.write().unwrap();
            table.drain().map(|(peer_id, _)| peer_id).collect()
        };

        if let Some(driver) = &self.tcp_driver {
            driver.close().await?;
        }
        if let Some(driver) = &self.quic_driver {
            driver.close().await?;
        }

        let mut pools = self.pools.lock().await;
        for (_, pool) in pools.drain() {
            pool.close().await;
        }

        for peer_id in disconnected {
            self.identity.evict_by_peer(&peer_id).await;
            self.notify_peer_disconnected(&peer_id);
        }
        Ok(())
    }

    /// `sendMsg`: borrows a pooled stream for `(peerId, protocolId)`,
    /// writes an encoded package, and returns the stream to the pool on
    /// success or discards it on failure.
    pub async fn send_msg(
        self: &Arc<Self>,
        protocol_id: &ProtocolId,
        peer_id: &PeerId,
        payload: Vec<u8>,
    ) -> Result<(), HostError> {
        let pool = self.get_or_create_pool(protocol_id, peer_id).await?;
        let mut stream = pool.borrow().await?;
        let pkg = Package::new(protocol_id.as_str(), payload);
        let bytes = liquidmesh_codec::encode(&pkg, self.msg_compress)?;
        match stream.write(&bytes).await {
            Ok(()) => {
                pool.give_back(stream, true).await;
                Ok(())
            }
            Err(e) => {
                pool.give_back(stream, false).await;
                Err(e.into())
            }
        }
    }

    async fn get_or_create_pool(
        self: &Arc<Self>,
        protocol_id: &ProtocolId,
        peer_id: &PeerId,
    ) -> Result<Arc<SendStreamPool>, HostError> {
        let key = (peer_id.clone(), protocol_id.clone());
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&key) {
            return Ok(Arc::clone(pool));
        }
        let connection = self
            .peer_table
            .read()
            .unwrap()
            .get(peer_id)
            .map(|entry| Arc::clone(&entry.connection))
            .ok_or_else(|| HostError::PeerNotConnected(peer_id.to_string()))?;
        let pool = SendStreamPool::new(
            connection,
            protocol_id.clone(),
            SendStreamPoolConfig {
                init: self.send_pool_init,
                cap: self.send_pool_cap,
            },
        );
        pools.insert(key, Arc::clone(&pool));
        Ok(pool)
    }

    /// `registerMsgPayloadHandler`: installs the handler, then broadcasts a
    /// protocol-supported control message to every currently connected
    /// peer.
    pub async fn register_msg_payload_handler(
        self: &Arc<Self>,
        protocol_id: ProtocolId,
        handler: ProtocolHandler,
    ) {
        self.protocol_handlers.write().unwrap().insert(protocol_id.clone(), handler);
        self.broadcast_control(ControlMessage::ProtocolSupported(protocol_id.as_str().to_string())).await;
    }

    /// `unregisterMsgPayloadHandler`: removes the handler, then broadcasts
    /// symmetrically.
    pub async fn unregister_msg_payload_handler(self: &Arc<Self>, protocol_id: &ProtocolId) {
        self.protocol_handlers.write().unwrap().remove(protocol_id);
        self.broadcast_control(ControlMessage::ProtocolUnsupported(protocol_id.as_str().to_string())).await;
    }

    async fn broadcast_control(self: &Arc<Self>, msg: ControlMessage) {
        let peers: Vec<PeerId> = self.peer_table.read().unwrap().keys().cloned().collect();
        let payload = match bincode::serialize(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to serialize control message");
                return;
            }
        };
        let control_protocol = ProtocolId::new(CONTROL_PROTOCOL_ID);
        for peer_id in peers {
            if let Err(e) = self.send_msg(&control_protocol, &peer_id, payload.clone()).await {
                debug!(peer = %peer_id, error = %e, "control broadcast failed for peer");
            }
        }
    }

    /// `isPeerSupportProtocol`: consults the per-peer protocol set
    /// populated from inbound control messages.
    pub fn is_peer_support_protocol(&self, peer_id: &PeerId, protocol_id: &ProtocolId) -> bool {
        self.peer_table
            .read()
            .unwrap()
            .get(peer_id)
            .map(|entry| entry.protocols.contains(protocol_id))
            .unwrap_or(false)
    }

    pub fn notify(&self, bundle: NotifieeBundle) {
        self.notifiees.write().unwrap().push(bundle);
    }

    /// Connection-admission callback wired into both drivers. Synchronous,
    /// per `liquidmesh_network::ConnHandler`'s signature; peer-table
    /// updates are a plain in-memory map operation, never held across
    /// I/O, so a `std::sync::RwLock` is sufficient here (spec.md §5's
    /// locking discipline).
    fn on_new_connection(self: &Arc<Self>, conn: Arc<dyn Connection>) -> bool {
        let remote = conn.remote_peer_id().clone();
        let mut table = self.peer_table.write().unwrap();
        match table.get(&remote) {
            None => {
                table.insert(
                    remote.clone(),
                    PeerEntry {
                        connection: Arc::clone(&conn),
                        protocols: HashSet::new(),
                    },
                );
                drop(table);
                self.spawn_liveness_watcher(remote.clone(), conn);
                self.notify_peer_connected(&remote);
                true
            }
            Some(existing) => {
                // Simultaneous-open: both sides dialed each other. Exactly
                // one connection per side must survive, and both sides
                // must agree on which — so the decision is a pure
                // function of (localPID, remotePID), never of arrival
                // order.
                if existing.connection.direction() == conn.direction() {
                    // Same direction twice for the same peer is just a
                    // redundant attempt; keep the one already admitted.
                    return false;
                }
                let keep_existing = Self::wins(existing.connection.direction(), &self.local_peer_id, &remote);
                if keep_existing {
                    false
                } else {
                    let old = table.insert(
                        remote.clone(),
                        PeerEntry {
                            connection: Arc::clone(&conn),
                            protocols: HashSet::new(),
                        },
                    );
                    drop(table);
                    if let Some(old) = old {
                        tokio::spawn(async move {
                            let _ = old.connection.close().await;
                        });
                    }
                    self.spawn_liveness_watcher(remote.clone(), conn);
                    true
                }
            }
        }
    }

    /// Spawns a task that waits for `conn` to die (locally closed or
    /// remote-dropped) and then retires it from `peer_table`, evicts its
    /// derived identity, and fires `peerDisconnected` — the only path
    /// besides `stop()` that does so, covering the case where the remote
    /// side closes first.
    fn spawn_liveness_watcher(self: &Arc<Self>, peer_id: PeerId, conn: Arc<dyn Connection>) {
        let host = Arc::clone(self);
        let conn_id = conn.id();
        tokio::spawn(async move {
            conn.closed().await;
            host.handle_connection_death(&peer_id, conn_id).await;
        });
    }

    /// Removes `peer_id` from `peer_table` only if it still maps to
    /// `conn_id` — a simultaneous-open tie-break may have already replaced
    /// this entry with a newer connection, in which case this dying
    /// connection's death must not evict or disconnect the replacement.
    async fn handle_connection_death(&self, peer_id: &PeerId, conn_id: ConnectionId) {
        let removed = {
            let mut table = self.peer_table.write().unwrap();
            match table.get(peer_id) {
                Some(entry) if entry.connection.id() == conn_id => {
                    table.remove(peer_id);
                    true
                }
                _ => false,
            }
        };
        if removed {
            self.identity.evict_by_peer(peer_id).await;
            self.notify_peer_disconnected(peer_id);
        }
    }

    /// Deterministic simultaneous-open tie-break: the connection in
    /// `direction` wins iff the local peer is the "heavier" one (per
    /// `PeerId::weight_compare`) and it dialed, or the local peer is the
    /// "lighter" one and it accepted. Both sides of a simultaneous-open
    /// pair compute this from the same `(local, remote)` input and so
    /// reach the same answer about which of their two connections to
    /// that peer to keep.
    fn wins(direction: Direction, local: &PeerId, remote: &PeerId) -> bool {
        let local_is_heavier = local.outweighs(remote);
        match direction {
            Direction::Outbound => local_is_heavier,
            Direction::Inbound => !local_is_heavier,
        }
    }

    async fn handle_inbound_package(self: Arc<Self>, peer_id: PeerId, pkg: Package) {
        if pkg.protocol_tag == CONTROL_PROTOCOL_ID {
            match bincode::deserialize::<ControlMessage>(&pkg.payload) {
                Ok(msg) => self.apply_control_message(&peer_id, msg),
                Err(e) => warn!(peer = %peer_id, error = %e, "malformed control message"),
            }
            return;
        }

        let protocol_id = ProtocolId::new(pkg.protocol_tag);
        let handler = self.protocol_handlers.read().unwrap().get(&protocol_id).cloned();
        match handler {
            // A panicking handler only aborts this spawned task, per
            // spec.md §7: "Handler exceptions must not crash a loop."
            Some(handler) => handler(peer_id, pkg.payload),
            None => debug!(peer = %peer_id, protocol = %protocol_id, "no handler registered, dropping package"),
        }
    }

    fn apply_control_message(&self, peer_id: &PeerId, msg: ControlMessage) {
        let protocol_id = msg.protocol_id();
        let supported = matches!(msg, ControlMessage::ProtocolSupported(_));
        {
            let mut table = self.peer_table.write().unwrap();
            if let Some(entry) = table.get_mut(peer_id) {
                if supported {
                    entry.protocols.insert(protocol_id.clone());
                } else {
                    entry.protocols.remove(&protocol_id);
                }
            }
        }
        if supported {
            self.notify_peer_protocol_supported(&protocol_id, peer_id);
        } else {
            self.notify_peer_protocol_unsupported(&protocol_id, peer_id);
        }
    }

    fn notify_peer_connected(&self, peer_id: &PeerId) {
        for bundle in self.notifiees.read().unwrap().iter() {
            if let Some(cb) = &bundle.peer_connected {
                cb(peer_id.clone());
            }
        }
    }

    fn notify_peer_disconnected(&self, peer_id: &PeerId) {
        for bundle in self.notifiees.read().unwrap().iter() {
            if let Some(cb) = &bundle.peer_disconnected {
                cb(peer_id.clone());
            }
        }
    }

    fn notify_peer_protocol_supported(&self, protocol_id: &ProtocolId, peer_id: &PeerId) {
        for bundle in self.notifiees.read().unwrap().iter() {
            if let Some(cb) = &bundle.peer_protocol_supported {
                cb(protocol_id.clone(), peer_id.clone());
            }
        }
    }

    fn notify_peer_protocol_unsupported(&self, protocol_id: &ProtocolId, peer_id: &PeerId) {
        for bundle in self.notifiees.read().unwrap().iter() {
            if let Some(cb) = &bundle.peer_protocol_unsupported {
                cb(protocol_id.clone(), peer_id.clone());
            }
        }
    }
}

/// Two-host loopback tests grounded in
/// `original_source/host/host_quic_test.go`'s `TestHostQUIC`: create two
/// hosts pointed at each other as direct peers, wait for the notifiee
/// channels to fire, exercise `SendMsg`/protocol (un)registration, then
/// shut down. Run over insecurity mode rather than TLS so the tests need
/// no certificate fixtures; the TCP driver's accept/dial paths are
/// otherwise identical between the two modes.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HostConfig, QuicTlsConfig, TcpTlsConfig};
    use liquidmesh_identity::{CertValidator, ChainTrustRoots, NoRevocations};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn test_identity() -> Arc<CertValidator> {
        Arc::new(CertValidator::new(ChainTrustRoots::new(), Arc::new(NoRevocations)))
    }

    fn insecure_host_config(
        local_peer_id: &str,
        listen_port: u16,
        direct_peers: HashMap<PeerId, MultiAddress>,
    ) -> HostConfig {
        HostConfig {
            local_peer_id: PeerId::new(local_peer_id),
            tcp_tls: None::<TcpTlsConfig>,
            quic_tls: None::<QuicTlsConfig>,
            identity: test_identity(),
            insecurity: true,
            listen_addresses: vec![format!("/ip4/127.0.0.1/tcp/{listen_port}").parse().unwrap()],
            direct_peers,
            send_stream_pool_init_size: 2,
            send_stream_pool_cap: 8,
            peer_receive_stream_max_count: 32,
            msg_compress: false,
        }
    }

    async fn recv_within(rx: &mut mpsc::UnboundedReceiver<()>, label: &str) {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap_or_else(|_| panic!("{label} timed out"))
            .unwrap_or_else(|| panic!("{label} channel closed"));
    }

    #[tokio::test]
    async fn two_hosts_connect_exchange_and_disconnect() {
        let peer_a = PeerId::new("peer-a");
        let peer_b = PeerId::new("peer-b");

        let addr_b: MultiAddress = "/ip4/127.0.0.1/tcp/18082/p2p/peer-b".parse().unwrap();
        let addr_a: MultiAddress = "/ip4/127.0.0.1/tcp/18081/p2p/peer-a".parse().unwrap();

        let mut direct_a = HashMap::new();
        direct_a.insert(peer_b.clone(), addr_b);
        let mut direct_b = HashMap::new();
        direct_b.insert(peer_a.clone(), addr_a);

        let host_a = Host::new(insecure_host_config("peer-a", 18081, direct_a)).unwrap();
        let host_b = Host::new(insecure_host_config("peer-b", 18082, direct_b)).unwrap();

        let (connect_tx, mut connect_rx) = mpsc::unbounded_channel();
        let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel();
        let (protocol_support_tx, mut protocol_support_rx) = mpsc::unbounded_channel();
        let (protocol_unsupported_tx, mut protocol_unsupported_rx) = mpsc::unbounded_channel();

        for host in [&host_a, &host_b] {
            let connect_tx = connect_tx.clone();
            let disconnect_tx = disconnect_tx.clone();
            let protocol_support_tx = protocol_support_tx.clone();
            let protocol_unsupported_tx = protocol_unsupported_tx.clone();
            host.notify(
                NotifieeBundle::new()
                    .on_peer_connected(move |_| {
                        let _ = connect_tx.send(());
                    })
                    .on_peer_disconnected(move |_| {
                        let _ = disconnect_tx.send(());
                    })
                    .on_peer_protocol_supported(move |_, _| {
                        let _ = protocol_support_tx.send(());
                    })
                    .on_peer_protocol_unsupported(move |_, _| {
                        let _ = protocol_unsupported_tx.send(());
                    }),
            );
        }

        host_a.start().await.unwrap();
        host_b.start().await.unwrap();

        recv_within(&mut connect_rx, "host a connect").await;
        recv_within(&mut connect_rx, "host b connect").await;

        let test_protocol = ProtocolId::new("test/echo/1");
        let (receive_tx, mut receive_rx) = mpsc::unbounded_channel();
        let receive_tx_a = receive_tx.clone();
        host_a
            .register_msg_payload_handler(
                test_protocol.clone(),
                Arc::new(move |_, _| {
                    let _ = receive_tx_a.send(());
                }),
            )
            .await;
        host_b
            .register_msg_payload_handler(
                test_protocol.clone(),
                Arc::new(move |_, _| {
                    let _ = receive_tx.send(());
                }),
            )
            .await;

        // Each side's registration broadcasts to the other; both fire.
        recv_within(&mut protocol_support_rx, "protocol supported (1)").await;
        recv_within(&mut protocol_support_rx, "protocol supported (2)").await;

        host_a.send_msg(&test_protocol, &peer_b, b"hello b".to_vec()).await.unwrap();
        recv_within(&mut receive_rx, "host b receive").await;

        host_b.send_msg(&test_protocol, &peer_a, b"hello a".to_vec()).await.unwrap();
        recv_within(&mut receive_rx, "host a receive").await;

        assert!(host_a.is_peer_support_protocol(&peer_b, &test_protocol));
        assert!(host_b.is_peer_support_protocol(&peer_a, &test_protocol));

        host_b.unregister_msg_payload_handler(&test_protocol).await;
        recv_within(&mut protocol_unsupported_rx, "protocol unsupported").await;
        assert!(!host_a.is_peer_support_protocol(&peer_b, &test_protocol));

        host_a.stop().await.unwrap();
        host_b.stop().await.unwrap();
        recv_within(&mut disconnect_rx, "host a disconnect").await;
        recv_within(&mut disconnect_rx, "host b disconnect").await;
    }

    /// spec.md §8 end-to-end scenario: "B calls stop, A observes
    /// `peerDisconnected(<B>)`" — without A ever calling `stop()` itself.
    /// Exercises the liveness watcher's remote-initiated disconnect path
    /// rather than the `stop()`-drains-`peer_table` path the test above
    /// covers.
    #[tokio::test]
    async fn remote_stop_is_observed_without_local_stop() {
        let peer_a = PeerId::new("peer-a");
        let peer_b = PeerId::new("peer-b");

        let addr_b: MultiAddress = "/ip4/127.0.0.1/tcp/18084/p2p/peer-b".parse().unwrap();
        let addr_a: MultiAddress = "/ip4/127.0.0.1/tcp/18083/p2p/peer-a".parse().unwrap();

        let mut direct_a = HashMap::new();
        direct_a.insert(peer_b.clone(), addr_b);
        let mut direct_b = HashMap::new();
        direct_b.insert(peer_a.clone(), addr_a);

        let host_a = Host::new(insecure_host_config("peer-a", 18083, direct_a)).unwrap();
        let host_b = Host::new(insecure_host_config("peer-b", 18084, direct_b)).unwrap();

        let (connect_tx, mut connect_rx) = mpsc::unbounded_channel();
        let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel();
        host_a.notify(
            NotifieeBundle::new()
                .on_peer_connected(move |_| {
                    let _ = connect_tx.send(());
                })
                .on_peer_disconnected(move |_| {
                    let _ = disconnect_tx.send(());
                }),
        );

        host_a.start().await.unwrap();
        host_b.start().await.unwrap();
        recv_within(&mut connect_rx, "host a connect").await;

        host_b.stop().await.unwrap();
        recv_within(&mut disconnect_rx, "host a observes host b disconnect").await;

        host_a.stop().await.unwrap();
    }

    #[tokio::test]
    async fn dial_rejects_pid_mismatch() {
        let host_a = Host::new(insecure_host_config("peer-a", 18091, HashMap::new())).unwrap();
        let host_b = Host::new(insecure_host_config("peer-b", 18092, HashMap::new())).unwrap();
        host_a.start().await.unwrap();
        host_b.start().await.unwrap();

        let wrong_addr: MultiAddress = "/ip4/127.0.0.1/tcp/18092/p2p/not-peer-b".parse().unwrap();
        let err = host_a.dial_direct_peer(&PeerId::new("not-peer-b"), &wrong_addr).await;
        assert!(err.is_err());

        host_a.stop().await.unwrap();
        host_b.stop().await.unwrap();
    }

    #[test]
    fn insecurity_without_local_peer_id_is_rejected() {
        let err = Host::new(insecure_host_config("", 18093, HashMap::new()));
        assert!(matches!(err, Err(HostError::InsecureRequiresLocalPeerId)));
    }
}
