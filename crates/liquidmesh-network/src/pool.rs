//! Per-`(peerId, protocolId)` outbound stream pool: warm-started, bounded,
//! backpressure-only. Grounded in spec.md §4.6; no equivalent exists in the
//! teacher, so the shape here is built straight from the specification
//! using the same `tokio::sync::Mutex` + bounded-queue discipline the
//! teacher uses for its peer table and connection maps.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use liquidmesh_types::ProtocolId;
use tokio::sync::Mutex;
use tracing::warn;

use crate::connection::Connection;
use crate::error::NetworkError;
use crate::stream::SendStream;

#[derive(Debug, Clone, Copy)]
pub struct SendStreamPoolConfig {
    /// Number of streams opened eagerly at pool creation. Must not exceed
    /// `cap`; warm-up failures are logged and otherwise ignored.
    pub init: usize,
    /// Upper bound on `idle.len() + in_use` at all times.
    pub cap: usize,
}

/// One pool per `(peerId, protocolId)`. `idle.len() + in_use <= cap` holds
/// at every observation point.
pub struct SendStreamPool {
    connection: Arc<dyn Connection>,
    protocol_id: ProtocolId,
    cap: usize,
    idle: Mutex<VecDeque<Box<dyn SendStream>>>,
    in_use: AtomicUsize,
}

impl SendStreamPool {
    /// Creates the pool and kicks off asynchronous warm-up of `init`
    /// streams; the pool is usable immediately, proceeding with whatever
    /// streams warm-up manages to open.
    pub fn new(
        connection: Arc<dyn Connection>,
        protocol_id: ProtocolId,
        config: SendStreamPoolConfig,
    ) -> Arc<Self> {
        let pool = Arc::new(Self {
            connection,
            protocol_id,
            cap: config.cap,
            idle: Mutex::new(VecDeque::new()),
            in_use: AtomicUsize::new(0),
        });
        let warm = Arc::clone(&pool);
        let init = config.init.min(config.cap);
        tokio::spawn(async move { warm.warm_up(init).await });
        pool
    }

    async fn warm_up(&self, init: usize) {
        for _ in 0..init {
            match self.connection.open_send_stream(&self.protocol_id).await {
                Ok(stream) => self.idle.lock().await.push_back(stream),
                Err(e) => warn!(
                    peer = %self.connection.remote_peer_id(),
                    protocol = %self.protocol_id,
                    error = %e,
                    "send stream pool warm-up attempt failed"
                ),
            }
        }
    }

    /// Returns an idle stream if one exists; otherwise opens a new one
    /// against the owning connection if under `cap`; otherwise fails with
    /// `PoolExhausted` rather than blocking.
    pub async fn borrow(&self) -> Result<Box<dyn SendStream>, NetworkError> {
        if let Some(stream) = self.idle.lock().await.pop_front() {
            self.in_use.fetch_add(1, Ordering::SeqCst);
            return Ok(stream);
        }
        if self.in_use.load(Ordering::SeqCst) >= self.cap {
            return Err(NetworkError::PoolExhausted(
                self.connection.remote_peer_id().to_string(),
            ));
        }
        let stream = self.connection.open_send_stream(&self.protocol_id).await?;
        self.in_use.fetch_add(1, Ordering::SeqCst);
        Ok(stream)
    }

    /// Returns a borrowed stream. A healthy stream goes back to idle; an
    /// unhealthy one (any write error observed by the caller) is dropped
    /// so a later `borrow` opens a fresh replacement.
    pub async fn give_back(&self, stream: Box<dyn SendStream>, healthy: bool) {
        self.in_use.fetch_sub(1, Ordering::SeqCst);
        if healthy {
            self.idle.lock().await.push_back(stream);
        }
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    pub async fn idle_len(&self) -> usize {
        self.idle.lock().await.len()
    }

    /// Drains and closes every idle stream. Streams currently on loan are
    /// left to their borrower.
    pub async fn close(&self) {
        let mut idle = self.idle.lock().await;
        while let Some(mut stream) = idle.pop_front() {
            let _ = stream.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ConnectionId, Stat};
    use async_trait::async_trait;
    use liquidmesh_types::{Direction, PeerId};
    use std::sync::atomic::AtomicU64;

    struct MockConnection {
        remote: PeerId,
        opened: AtomicU64,
        fail_after: Option<u64>,
    }

    struct MockSendStream {
        remote: PeerId,
    }

    #[async_trait]
    impl SendStream for MockSendStream {
        async fn write(&mut self, _bytes: &[u8]) -> Result<(), NetworkError> {
            Ok(())
        }
        async fn close(&mut self) -> Result<(), NetworkError> {
            Ok(())
        }
        fn stat(&self) -> Stat {
            Stat {
                direction: Direction::Outbound,
                connection_id: ConnectionId(0),
                closed: false,
            }
        }
        fn remote_peer_id(&self) -> &PeerId {
            &self.remote
        }
    }

    #[async_trait]
    impl Connection for MockConnection {
        fn id(&self) -> ConnectionId {
            ConnectionId(0)
        }
        fn direction(&self) -> Direction {
            Direction::Outbound
        }
        fn local_peer_id(&self) -> &PeerId {
            &self.remote
        }
        fn remote_peer_id(&self) -> &PeerId {
            &self.remote
        }
        async fn open_send_stream(
            &self,
            _protocol_id: &ProtocolId,
        ) -> Result<Box<dyn SendStream>, NetworkError> {
            let n = self.opened.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| n >= limit) {
                return Err(NetworkError::StreamClosed);
            }
            Ok(Box::new(MockSendStream {
                remote: self.remote.clone(),
            }))
        }
        fn is_closed(&self) -> bool {
            false
        }
        async fn close(&self) -> Result<(), NetworkError> {
            Ok(())
        }
        async fn closed(&self) {
            std::future::pending().await
        }
    }

    fn mock_pool(cap: usize, init: usize) -> Arc<SendStreamPool> {
        let conn: Arc<dyn Connection> = Arc::new(MockConnection {
            remote: PeerId::new("peer-a"),
            opened: AtomicU64::new(0),
            fail_after: None,
        });
        SendStreamPool::new(conn, ProtocolId::new("proto/1"), SendStreamPoolConfig { init, cap })
    }

    #[tokio::test]
    async fn borrow_beyond_cap_is_pool_exhausted_not_blocking() {
        let pool = mock_pool(2, 0);
        let a = pool.borrow().await.unwrap();
        let b = pool.borrow().await.unwrap();
        let err = pool.borrow().await.unwrap_err();
        assert!(matches!(err, NetworkError::PoolExhausted(_)));
        assert_eq!(pool.in_use(), 2);
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn idle_plus_in_use_never_exceeds_cap() {
        let pool = mock_pool(3, 0);
        let s1 = pool.borrow().await.unwrap();
        let s2 = pool.borrow().await.unwrap();
        assert!(pool.in_use() + pool.idle_len().await <= 3);
        pool.give_back(s1, true).await;
        assert!(pool.in_use() + pool.idle_len().await <= 3);
        pool.give_back(s2, false).await;
        assert_eq!(pool.idle_len().await, 1);
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn unhealthy_return_is_discarded_and_replaced_on_next_borrow() {
        let pool = mock_pool(2, 0);
        let s1 = pool.borrow().await.unwrap();
        pool.give_back(s1, false).await;
        assert_eq!(pool.idle_len().await, 0);
        let s2 = pool.borrow().await;
        assert!(s2.is_ok());
    }

    #[tokio::test]
    async fn warm_up_failures_are_non_fatal() {
        let conn: Arc<dyn Connection> = Arc::new(MockConnection {
            remote: PeerId::new("peer-b"),
            opened: AtomicU64::new(0),
            fail_after: Some(0),
        });
        let pool = SendStreamPool::new(
            conn,
            ProtocolId::new("proto/1"),
            SendStreamPoolConfig { init: 2, cap: 2 },
        );
        tokio::task::yield_now().await;
        assert_eq!(pool.idle_len().await, 0);
    }
}
