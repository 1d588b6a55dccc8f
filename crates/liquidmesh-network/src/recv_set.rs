//! Per-peer bound on concurrently open inbound streams. Grounded in
//! spec.md §4.7; admission is a synchronous counter check, never a queue —
//! a rejected stream is closed immediately rather than made to wait.

use std::collections::HashMap;
use std::sync::Arc;

use liquidmesh_types::PeerId;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::stream::ReceiveStream;

/// Tracks the number of currently open inbound streams per remote peer and
/// enforces `max_count`.
pub struct ReceiveStreamSet {
    max_count: usize,
    open_count: Mutex<HashMap<PeerId, usize>>,
}

impl ReceiveStreamSet {
    pub fn new(max_count: usize) -> Self {
        Self {
            max_count,
            open_count: Mutex::new(HashMap::new()),
        }
    }

    /// Admits a new inbound stream for `peer_id` if doing so would not
    /// exceed `max_count`. Returns `false` without side effects otherwise.
    pub async fn try_admit(&self, peer_id: &PeerId) -> bool {
        let mut counts = self.open_count.lock().await;
        let count = counts.entry(peer_id.clone()).or_insert(0);
        if *count >= self.max_count {
            return false;
        }
        *count += 1;
        true
    }

    pub async fn release(&self, peer_id: &PeerId) {
        let mut counts = self.open_count.lock().await;
        if let Some(count) = counts.get_mut(peer_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(peer_id);
            }
        }
    }

    pub async fn open_count(&self, peer_id: &PeerId) -> usize {
        *self.open_count.lock().await.get(peer_id).unwrap_or(&0)
    }
}

/// Runs the read loop for one admitted inbound stream: decodes one package
/// per iteration and hands it to `dispatch`. Exits on read error or stream
/// close, releasing the peer's admission slot on the way out.
pub async fn run_receive_loop(
    set: Arc<ReceiveStreamSet>,
    mut stream: Box<dyn ReceiveStream>,
    dispatch: Arc<dyn Fn(PeerId, liquidmesh_codec::Package) + Send + Sync>,
) {
    let peer_id = stream.remote_peer_id().clone();
    loop {
        let mut buf = Vec::new();
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(peer = %peer_id, error = %e, "inbound stream read loop exiting");
                break;
            }
        };
        match liquidmesh_codec::decode(&buf[..n]) {
            Ok(pkg) => dispatch(peer_id.clone(), pkg),
            Err(e) => {
                warn!(peer = %peer_id, error = %e, "malformed package on inbound stream");
                break;
            }
        }
    }
    let _ = stream.close().await;
    set.release(&peer_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admission_beyond_max_count_is_refused() {
        let set = ReceiveStreamSet::new(2);
        let peer = PeerId::new("peer-a");
        assert!(set.try_admit(&peer).await);
        assert!(set.try_admit(&peer).await);
        assert!(!set.try_admit(&peer).await);
        assert_eq!(set.open_count(&peer).await, 2);
    }

    #[tokio::test]
    async fn release_frees_a_slot_for_reuse() {
        let set = ReceiveStreamSet::new(1);
        let peer = PeerId::new("peer-a");
        assert!(set.try_admit(&peer).await);
        assert!(!set.try_admit(&peer).await);
        set.release(&peer).await;
        assert_eq!(set.open_count(&peer).await, 0);
        assert!(set.try_admit(&peer).await);
    }

    #[tokio::test]
    async fn counts_are_independent_per_peer() {
        let set = ReceiveStreamSet::new(1);
        let a = PeerId::new("peer-a");
        let b = PeerId::new("peer-b");
        assert!(set.try_admit(&a).await);
        assert!(set.try_admit(&b).await);
        assert!(!set.try_admit(&a).await);
    }
}
