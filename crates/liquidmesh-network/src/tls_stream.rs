//! Client/server TLS stream wrapper, copied in shape from the teacher's
//! `TlsStreamWrapper` (`crates/network/src/mtls_node.rs`): a single type
//! the rest of the driver can treat as one `AsyncRead + AsyncWrite`,
//! regardless of which side initiated the handshake.

use std::pin::Pin;
use std::task::{Context, Poll};

use rustls::pki_types::CertificateDer;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// `Plain` carries a bare `TcpStream` for spec.md §4.4's insecurity mode
/// (TLS disabled): there is no handshake-bound identity to extract, so
/// `get_ref` is only ever called on the `Client`/`Server` variants.
pub enum TlsStreamWrapper {
    Client(tokio_rustls::client::TlsStream<TcpStream>),
    Server(tokio_rustls::server::TlsStream<TcpStream>),
    Plain(TcpStream),
}

impl TlsStreamWrapper {
    pub fn get_ref(&self) -> (&TcpStream, &dyn PeerCerts) {
        match self {
            TlsStreamWrapper::Client(s) => {
                let (io, conn) = s.get_ref();
                (io, conn)
            }
            TlsStreamWrapper::Server(s) => {
                let (io, conn) = s.get_ref();
                (io, conn)
            }
            TlsStreamWrapper::Plain(_) => {
                unreachable!("insecurity mode streams carry no TLS peer certificates")
            }
        }
    }
}

/// Narrow trait exposing only the bit of `rustls::{ClientConnection,
/// ServerConnection}` the driver needs after a handshake: the verified
/// peer certificate chain.
pub trait PeerCerts {
    fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]>;
}

impl PeerCerts for rustls::ClientConnection {
    fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        rustls::ClientConnection::peer_certificates(self)
    }
}

impl PeerCerts for rustls::ServerConnection {
    fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        rustls::ServerConnection::peer_certificates(self)
    }
}

impl AsyncRead for TlsStreamWrapper {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            TlsStreamWrapper::Client(s) => Pin::new(s).poll_read(cx, buf),
            TlsStreamWrapper::Server(s) => Pin::new(s).poll_read(cx, buf),
            TlsStreamWrapper::Plain(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TlsStreamWrapper {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            TlsStreamWrapper::Client(s) => Pin::new(s).poll_write(cx, buf),
            TlsStreamWrapper::Server(s) => Pin::new(s).poll_write(cx, buf),
            TlsStreamWrapper::Plain(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            TlsStreamWrapper::Client(s) => Pin::new(s).poll_flush(cx),
            TlsStreamWrapper::Server(s) => Pin::new(s).poll_flush(cx),
            TlsStreamWrapper::Plain(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            TlsStreamWrapper::Client(s) => Pin::new(s).poll_shutdown(cx),
            TlsStreamWrapper::Server(s) => Pin::new(s).poll_shutdown(cx),
            TlsStreamWrapper::Plain(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
