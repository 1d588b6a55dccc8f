//! Multi-address parsing and local-interface enumeration for the transport
//! substrate. Addresses follow a small, fully-owned grammar:
//!
//! ```text
//! /ip{4,6}/<addr>/tcp/<port>[/p2p/<peerId>]
//! /ip{4,6}/<addr>/udp/<port>/quic[/p2p/<peerId>]
//! ```
//!
//! There is no general-purpose multiaddr dependency here; the grammar is
//! small enough to own outright, the way the teacher owns its TLS stream
//! wrapper rather than reaching for an abstraction library.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use liquidmesh_types::PeerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddrError {
    #[error("malformed multiaddr {0:?}")]
    Malformed(String),
    #[error("unsupported ip family or transport in {0:?}")]
    UnsupportedGrammar(String),
    #[error("no usable local address found expanding {0:?}")]
    NoUsableLocalAddress(String),
    #[error("local interface enumeration failed: {0}")]
    InterfaceEnumeration(String),
}

/// Transport carried by a [`NetAddr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    QuicUdp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
            Transport::QuicUdp => write!(f, "udp/quic"),
        }
    }
}

/// The network/transport-layer prefix of a [`MultiAddress`], with no peer
/// identity tail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetAddr {
    pub ip: IpAddr,
    pub port: u16,
    pub transport: Transport,
}

impl NetAddr {
    pub fn new(ip: IpAddr, port: u16, transport: Transport) -> Self {
        Self { ip, port, transport }
    }

    pub fn is_ipv6(&self) -> bool {
        self.ip.is_ipv6()
    }

    pub fn is_unspecified(&self) -> bool {
        self.ip.is_unspecified()
    }

    pub fn to_socket_string(&self) -> String {
        match self.ip {
            IpAddr::V4(ip) => format!("{ip}:{}", self.port),
            IpAddr::V6(ip) => format!("[{ip}]:{}", self.port),
        }
    }
}

impl fmt::Display for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fam = if self.ip.is_ipv6() { "ip6" } else { "ip4" };
        match self.transport {
            Transport::Tcp => write!(f, "/{fam}/{}/tcp/{}", self.ip, self.port),
            Transport::QuicUdp => write!(f, "/{fam}/{}/udp/{}/quic", self.ip, self.port),
        }
    }
}

/// A full multi-address: a [`NetAddr`] with an optional trailing peer
/// identity component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MultiAddress {
    pub net_addr: NetAddr,
    pub peer_id: Option<PeerId>,
}

impl MultiAddress {
    pub fn new(net_addr: NetAddr, peer_id: Option<PeerId>) -> Self {
        Self { net_addr, peer_id }
    }

    /// Separates the optional trailing `/p2p/<peerId>` component from the
    /// transport-layer prefix. Either field may end up empty on the
    /// composite; only the composite's grammar can fail.
    pub fn decompose(&self) -> (NetAddr, Option<PeerId>) {
        (self.net_addr.clone(), self.peer_id.clone())
    }

    /// Inverse of [`MultiAddress::decompose`]; round-trips exactly for
    /// well-formed inputs since both sides just move struct fields.
    pub fn compose(net_addr: NetAddr, peer_id: Option<PeerId>) -> Self {
        Self { net_addr, peer_id }
    }
}

impl fmt::Display for MultiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.net_addr)?;
        if let Some(pid) = &self.peer_id {
            write!(f, "/p2p/{pid}")?;
        }
        Ok(())
    }
}

impl FromStr for MultiAddress {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').filter(|p| !p.is_empty()).collect();
        let mut iter = parts.into_iter();

        let fam = iter.next().ok_or_else(|| AddrError::Malformed(s.to_string()))?;
        let ip_str = iter.next().ok_or_else(|| AddrError::Malformed(s.to_string()))?;
        let ip: IpAddr = ip_str
            .parse()
            .map_err(|_| AddrError::Malformed(s.to_string()))?;
        match (fam, ip) {
            ("ip4", IpAddr::V4(_)) => {}
            ("ip6", IpAddr::V6(_)) => {}
            _ => return Err(AddrError::UnsupportedGrammar(s.to_string())),
        }

        let transport_tag = iter.next().ok_or_else(|| AddrError::Malformed(s.to_string()))?;
        let port_str = iter.next().ok_or_else(|| AddrError::Malformed(s.to_string()))?;
        let port: u16 = port_str
            .parse()
            .map_err(|_| AddrError::Malformed(s.to_string()))?;

        let transport = match transport_tag {
            "tcp" => Transport::Tcp,
            "udp" => {
                let quic_tag = iter.next().ok_or_else(|| AddrError::Malformed(s.to_string()))?;
                if quic_tag != "quic" {
                    return Err(AddrError::UnsupportedGrammar(s.to_string()));
                }
                Transport::QuicUdp
            }
            _ => return Err(AddrError::UnsupportedGrammar(s.to_string())),
        };

        let net_addr = NetAddr::new(ip, port, transport);

        let peer_id = match iter.next() {
            None => None,
            Some("p2p") => {
                let pid = iter.next().ok_or_else(|| AddrError::Malformed(s.to_string()))?;
                Some(PeerId::new(pid))
            }
            Some(_) => return Err(AddrError::Malformed(s.to_string())),
        };

        if iter.next().is_some() {
            return Err(AddrError::Malformed(s.to_string()));
        }

        Ok(MultiAddress::new(net_addr, peer_id))
    }
}

/// Total predicate: can the TCP driver dial this address?
pub fn can_dial_tcp(addr: &MultiAddress) -> bool {
    addr.net_addr.transport == Transport::Tcp
}

/// Total predicate: can the TCP driver listen on this address?
pub fn can_listen_tcp(addr: &MultiAddress) -> bool {
    addr.net_addr.transport == Transport::Tcp
}

/// Total predicate: can the QUIC driver dial this address?
pub fn can_dial_quic(addr: &MultiAddress) -> bool {
    addr.net_addr.transport == Transport::QuicUdp
}

/// Total predicate: can the QUIC driver listen on this address?
pub fn can_listen_quic(addr: &MultiAddress) -> bool {
    addr.net_addr.transport == Transport::QuicUdp
}

/// Enumerate the concrete IPv4/IPv6 addresses bound to local interfaces,
/// skipping loopback-only enumeration quirks and link-local noise the way
/// the Go driver's `GetLocalAddrs` does.
fn local_ip_addrs() -> Result<Vec<IpAddr>, AddrError> {
    let ifaces = interfaces::Interface::get_all()
        .map_err(|e| AddrError::InterfaceEnumeration(e.to_string()))?;
    let mut out = Vec::new();
    for iface in ifaces {
        for addr in iface.addresses {
            if let Some(sock) = addr.addr {
                out.push(sock.ip());
            }
        }
    }
    Ok(out)
}

/// Expand a listen address whose network-layer component is unspecified
/// (`0.0.0.0` / `::`) into one concrete address per local interface,
/// preserving IP family and the trailing transport/port component. Returns
/// the address unchanged, wrapped in a single-element vector, when it is
/// already concrete.
pub fn enumerate_usable_local(addr: &MultiAddress) -> Result<Vec<MultiAddress>, AddrError> {
    if !addr.net_addr.is_unspecified() {
        return Ok(vec![addr.clone()]);
    }

    let want_v6 = addr.net_addr.is_ipv6();
    let locals = local_ip_addrs()?;

    let mut res = Vec::with_capacity(locals.len());
    for ip in locals {
        if ip.is_ipv6() != want_v6 {
            continue;
        }
        let candidate = MultiAddress::new(
            NetAddr::new(ip, addr.net_addr.port, addr.net_addr.transport),
            addr.peer_id.clone(),
        );
        let listenable = match addr.net_addr.transport {
            Transport::Tcp => can_listen_tcp(&candidate),
            Transport::QuicUdp => can_listen_quic(&candidate),
        };
        if listenable {
            res.push(candidate);
        }
    }

    if res.is_empty() {
        return Err(AddrError::NoUsableLocalAddress(addr.to_string()));
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_addr_round_trips_through_decompose_compose() {
        let addr: MultiAddress = "/ip4/127.0.0.1/tcp/9001/p2p/abc".parse().unwrap();
        let (net_addr, peer_id) = addr.decompose();
        let recomposed = MultiAddress::compose(net_addr, peer_id);
        assert_eq!(recomposed.to_string(), addr.to_string());
    }

    #[test]
    fn tcp_addr_without_peer_id_round_trips() {
        let addr: MultiAddress = "/ip4/127.0.0.1/tcp/9001".parse().unwrap();
        assert!(addr.peer_id.is_none());
        assert_eq!(addr.to_string(), "/ip4/127.0.0.1/tcp/9001");
    }

    #[test]
    fn quic_addr_parses_and_displays() {
        let addr: MultiAddress = "/ip6/::1/udp/9443/quic/p2p/peer-z".parse().unwrap();
        assert_eq!(addr.net_addr.transport, Transport::QuicUdp);
        assert!(addr.net_addr.is_ipv6());
        assert_eq!(addr.to_string(), "/ip6/::1/udp/9443/quic/p2p/peer-z");
    }

    #[test]
    fn mismatched_ip_family_tag_is_rejected() {
        let res: Result<MultiAddress, _> = "/ip4/::1/tcp/9001".parse();
        assert!(res.is_err());
    }

    #[test]
    fn malformed_addr_is_rejected() {
        let res: Result<MultiAddress, _> = "/ip4/127.0.0.1/tcp".parse();
        assert!(res.is_err());
    }

    #[test]
    fn can_dial_listen_predicates_match_transport() {
        let tcp: MultiAddress = "/ip4/127.0.0.1/tcp/9001".parse().unwrap();
        let quic: MultiAddress = "/ip4/127.0.0.1/udp/9001/quic".parse().unwrap();
        assert!(can_dial_tcp(&tcp) && can_listen_tcp(&tcp));
        assert!(!can_dial_tcp(&quic) && !can_listen_tcp(&quic));
        assert!(can_dial_quic(&quic) && can_listen_quic(&quic));
        assert!(!can_dial_quic(&tcp) && !can_listen_quic(&tcp));
    }

    #[test]
    fn enumerate_usable_local_passes_through_concrete_address() {
        let addr: MultiAddress = "/ip4/127.0.0.1/tcp/9001".parse().unwrap();
        let expanded = enumerate_usable_local(&addr).unwrap();
        assert_eq!(expanded, vec![addr]);
    }
}
