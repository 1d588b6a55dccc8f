//! Minimal stream multiplexer carried over one TLS-wrapped TCP socket.
//!
//! QUIC gives us native multiplexed streams; TCP does not, so each
//! connection demultiplexes length-prefixed, stream-id-tagged frames over
//! a single unified read/write task — the same one-task-per-connection
//! shape as the teacher's `handle_peer_connection`
//! (`crates/network/src/mtls_node.rs`), generalized from one logical
//! channel per connection to many.
//!
//! Frame layout: `[u32 stream_id][u8 kind][u32 len][len bytes]`. `kind`
//! `0` opens a stream and carries the protocol tag as its payload; `1`
//! carries a data frame; `2` closes the stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::error::NetworkError;

const FRAME_OPEN: u8 = 0;
const FRAME_DATA: u8 = 1;
const FRAME_CLOSE: u8 = 2;

/// Inbound stream handed to the accept loop: the protocol tag carried by
/// its opening frame, plus a channel of subsequent data frames.
pub struct InboundMuxStream {
    pub stream_id: u32,
    pub protocol_tag: String,
    pub data_rx: mpsc::Receiver<Vec<u8>>,
}

struct MuxState {
    inbound_tx: HashMap<u32, mpsc::Sender<Vec<u8>>>,
}

/// Shared multiplexer state for one connection: a writer half guarded by a
/// mutex (writes are framed, so they must not interleave) and a demux task
/// reading the other half.
pub struct Mux<S> {
    writer: Mutex<WriteHalf<S>>,
    next_stream_id: AtomicU32,
    state: Arc<Mutex<MuxState>>,
    demux_task: Mutex<Option<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
    close_notify: Arc<Notify>,
}

impl<S> Mux<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Splits `io` and spawns the demux task. New inbound streams (first
    /// frame observed for a stream id is always `FRAME_OPEN`) are sent to
    /// `new_stream_tx`.
    pub fn new(io: S, new_stream_tx: mpsc::Sender<InboundMuxStream>) -> Arc<Self> {
        let (read_half, write_half) = tokio::io::split(io);
        let state = Arc::new(Mutex::new(MuxState {
            inbound_tx: HashMap::new(),
        }));
        let closed = Arc::new(AtomicBool::new(false));
        let close_notify = Arc::new(Notify::new());
        let task = tokio::spawn(demux_loop(
            read_half,
            Arc::clone(&state),
            new_stream_tx,
            Arc::clone(&closed),
            Arc::clone(&close_notify),
        ));
        Arc::new(Self {
            writer: Mutex::new(write_half),
            next_stream_id: AtomicU32::new(1),
            state,
            demux_task: Mutex::new(Some(task)),
            closed,
            close_notify,
        })
    }

    fn allocate_stream_id(&self) -> u32 {
        self.next_stream_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Tears the connection down: aborts the demux task, shuts down the
    /// write half, and wakes anyone waiting in [`Mux::wait_closed`]. Safe
    /// to call more than once (a remote-initiated close racing a local
    /// one just finds the flag already set).
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            self.close_notify.notify_waiters();
            return;
        }
        if let Some(task) = self.demux_task.lock().await.take() {
            task.abort();
        }
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        self.close_notify.notify_waiters();
    }

    /// Resolves once the connection has died, whether by a local
    /// [`Mux::close`] or because the demux task observed the remote end
    /// drop. Missed-wakeup safe: the notified future is constructed before
    /// the second flag check, so a close landing between the two checks is
    /// never lost.
    pub async fn wait_closed(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let notified = self.close_notify.notified();
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    /// Opens a new outbound stream, writing its protocol-tag frame.
    pub async fn open_stream(&self, protocol_tag: &str) -> Result<u32, NetworkError> {
        let stream_id = self.allocate_stream_id();
        self.write_frame(stream_id, FRAME_OPEN, protocol_tag.as_bytes())
            .await?;
        Ok(stream_id)
    }

    pub async fn write_data(&self, stream_id: u32, payload: &[u8]) -> Result<(), NetworkError> {
        self.write_frame(stream_id, FRAME_DATA, payload).await
    }

    pub async fn close_stream(&self, stream_id: u32) -> Result<(), NetworkError> {
        self.write_frame(stream_id, FRAME_CLOSE, &[]).await
    }

    async fn write_frame(
        &self,
        stream_id: u32,
        kind: u8,
        payload: &[u8],
    ) -> Result<(), NetworkError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(&stream_id.to_be_bytes()).await?;
        writer.write_all(&[kind]).await?;
        writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
        writer.write_all(payload).await?;
        writer.flush().await?;
        Ok(())
    }
}

async fn demux_loop<S>(
    mut reader: ReadHalf<S>,
    state: Arc<Mutex<MuxState>>,
    new_stream_tx: mpsc::Sender<InboundMuxStream>,
    closed: Arc<AtomicBool>,
    close_notify: Arc<Notify>,
) where
    S: AsyncRead + Send + Unpin + 'static,
{
    demux_read_loop(&mut reader, &state, &new_stream_tx).await;
    // Reaching here means the remote end dropped the connection (read
    // error or EOF) or a malformed frame was seen; a locally-initiated
    // `Mux::close` instead aborts this task before it gets here. Either
    // way the connection is dead, so the flag and notify must fire.
    closed.store(true, Ordering::SeqCst);
    close_notify.notify_waiters();
}

async fn demux_read_loop<S>(
    reader: &mut ReadHalf<S>,
    state: &Arc<Mutex<MuxState>>,
    new_stream_tx: &mpsc::Sender<InboundMuxStream>,
) where
    S: AsyncRead + Send + Unpin + 'static,
{
    loop {
        let stream_id = match reader.read_u32().await {
            Ok(v) => v,
            Err(_) => break,
        };
        let kind = match reader.read_u8().await {
            Ok(v) => v,
            Err(_) => break,
        };
        let len = match reader.read_u32().await {
            Ok(v) => v as usize,
            Err(_) => break,
        };
        let mut payload = vec![0u8; len];
        if reader.read_exact(&mut payload).await.is_err() {
            break;
        }

        match kind {
            FRAME_OPEN => {
                let protocol_tag = String::from_utf8_lossy(&payload).into_owned();
                let (data_tx, data_rx) = mpsc::channel(32);
                state.lock().await.inbound_tx.insert(stream_id, data_tx);
                let inbound = InboundMuxStream {
                    stream_id,
                    protocol_tag,
                    data_rx,
                };
                if new_stream_tx.send(inbound).await.is_err() {
                    break;
                }
            }
            FRAME_DATA => {
                let tx = state.lock().await.inbound_tx.get(&stream_id).cloned();
                if let Some(tx) = tx {
                    let _ = tx.send(payload).await;
                }
            }
            FRAME_CLOSE => {
                state.lock().await.inbound_tx.remove(&stream_id);
            }
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn pair() -> (Arc<Mux<tokio::io::DuplexStream>>, Arc<Mux<tokio::io::DuplexStream>>) {
        let (a, b) = tokio::io::duplex(4096);
        let (a_tx, _a_rx) = mpsc::channel(8);
        let (b_tx, _b_rx) = mpsc::channel(8);
        (Mux::new(a, a_tx), Mux::new(b, b_tx))
    }

    #[tokio::test]
    async fn local_close_is_observed_by_wait_closed() {
        let (mux, _peer) = pair();
        mux.close().await;
        timeout(Duration::from_secs(1), mux.wait_closed()).await.unwrap();
    }

    #[tokio::test]
    async fn remote_drop_is_observed_by_wait_closed() {
        let (mux, peer) = pair();
        drop(peer);
        timeout(Duration::from_secs(1), mux.wait_closed()).await.unwrap();
    }

    #[tokio::test]
    async fn wait_closed_returns_immediately_once_already_closed() {
        let (mux, _peer) = pair();
        mux.close().await;
        // Second call must not hang even though no fresh `notify_waiters`
        // call is guaranteed to land after this point.
        timeout(Duration::from_millis(200), mux.wait_closed()).await.unwrap();
    }
}
