//! TLS-handshake-bound peer identity: a `CertValidator` wraps a trust-root
//! set and a revocation oracle and derives `DerivedPeerInfo` from each
//! handshake's leaf certificate.
//!
//! Grounded in the teacher's `NoHostnameVerifier`/`extract_node_id_from_cert`
//! (`crates/network/src/mtls_node.rs`) and `CertificateManager`
//! (`production/crates/security/src/cert_manager.rs`), generalized to the
//! chain-trust-root + revocation-oracle + OID-derived cert-id shape the
//! original Go validator uses.

use std::collections::HashMap;
use std::sync::Arc;

use liquidmesh_types::PeerId;
use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use x509_parser::prelude::*;

/// OID under which the peer-identity/chain-membership extension is carried
/// on issued certificates.
pub const PEER_IDENTITY_EXTENSION_OID: &str = "1.3.6.1.4.1.53594.1.1";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("certificate revoked")]
    CertificateRevoked,
    #[error("verify certificate failed: {0}")]
    TrustVerificationFailed(String),
    #[error("leaf is not valid for any configured chain")]
    NoChainMembership,
    #[error("parse certificate failed: {0}")]
    ParseFailed(String),
    #[error("cert id extension missing or malformed")]
    CertIdMissing,
    #[error("empty certificate chain presented")]
    EmptyChain,
}

/// Information derived from a peer's leaf certificate during a successful
/// handshake.
#[derive(Debug, Clone)]
pub struct DerivedPeerInfo {
    pub tls_cert_bytes: Vec<u8>,
    pub chain_ids: Vec<String>,
    pub peer_id: PeerId,
    pub cert_id: String,
}

/// Oracle consulted before trust verification; returns `true` if any
/// certificate in the presented chain has been revoked.
pub trait RevocationOracle: Send + Sync {
    fn is_revoked(&self, chain: &[CertificateDer<'_>]) -> bool;
}

/// A revocation oracle that never reports a revocation; used by tests and
/// deployments with no revocation list configured.
#[derive(Debug, Default)]
pub struct NoRevocations;

impl RevocationOracle for NoRevocations {
    fn is_revoked(&self, _chain: &[CertificateDer<'_>]) -> bool {
        false
    }
}

/// Trust-root set; verifies a leaf certificate and reports the chain
/// identifiers it is valid for. A leaf valid for zero configured chains is
/// a verification failure. Each chain's root set is a small,
/// operator-managed CA list rather than the public web PKI, so membership
/// is decided by plain subject-DN matching against the leaf's issuer
/// rather than full path-building.
pub struct ChainTrustRoots {
    chains: Vec<(String, Vec<CertificateDer<'static>>)>,
}

impl ChainTrustRoots {
    pub fn new() -> Self {
        Self { chains: Vec::new() }
    }

    pub fn add_chain(&mut self, chain_id: impl Into<String>, roots: Vec<CertificateDer<'static>>) {
        self.chains.push((chain_id.into(), roots));
    }

    /// Verify `leaf` against every configured chain's root set, returning
    /// the ids of the chains it validates against.
    fn verify(&self, leaf: &X509Certificate<'_>) -> Result<Vec<String>, IdentityError> {
        let issuer_raw = leaf.issuer().as_raw();
        let mut matched = Vec::new();
        for (chain_id, roots) in &self.chains {
            let trusted = roots.iter().any(|root| {
                X509Certificate::from_der(root.as_ref())
                    .map(|(_, root_cert)| root_cert.subject().as_raw() == issuer_raw)
                    .unwrap_or(false)
            });
            if trusted {
                matched.push(chain_id.clone());
            }
        }
        if matched.is_empty() {
            return Err(IdentityError::NoChainMembership);
        }
        Ok(matched)
    }
}

impl Default for ChainTrustRoots {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive a deterministic peer id from a leaf's encoded public key: the hex
/// SHA-256 digest of the SubjectPublicKeyInfo DER.
fn derive_peer_id(leaf: &X509Certificate<'_>) -> PeerId {
    let spki = leaf.public_key().raw;
    let digest = Sha256::digest(spki);
    PeerId::new(hex_encode(&digest))
}

/// Extract the cert id from the configured peer-identity OID extension.
fn derive_cert_id(leaf: &X509Certificate<'_>) -> Result<String, IdentityError> {
    for ext in leaf.extensions() {
        if ext.oid.to_id_string() == PEER_IDENTITY_EXTENSION_OID {
            return Ok(hex_encode(ext.value));
        }
    }
    Err(IdentityError::CertIdMissing)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Wraps a trust-root set and a revocation oracle; the core object that
/// produces a TLS verify-peer-certificate callback and stores derived peer
/// information keyed by peer id.
pub struct CertValidator {
    trust_roots: ChainTrustRoots,
    revocation: Arc<dyn RevocationOracle>,
    store: RwLock<HashMap<PeerId, DerivedPeerInfo>>,
}

impl CertValidator {
    pub fn new(trust_roots: ChainTrustRoots, revocation: Arc<dyn RevocationOracle>) -> Self {
        Self {
            trust_roots,
            revocation,
            store: RwLock::new(HashMap::new()),
        }
    }

    /// Run the handshake-time derivation sequence over a raw DER certificate
    /// chain (leaf first) and store the result. Any failure aborts the
    /// handshake; the caller must not admit the connection.
    pub async fn verify_and_derive(
        &self,
        raw_chain: &[CertificateDer<'_>],
    ) -> Result<DerivedPeerInfo, IdentityError> {
        if raw_chain.is_empty() {
            return Err(IdentityError::EmptyChain);
        }
        if self.revocation.is_revoked(raw_chain) {
            return Err(IdentityError::CertificateRevoked);
        }

        let tls_cert_bytes = raw_chain[0].as_ref().to_vec();
        let (_, leaf) = X509Certificate::from_der(&tls_cert_bytes)
            .map_err(|e| IdentityError::ParseFailed(e.to_string()))?;

        let chain_ids = self.trust_roots.verify(&leaf)?;
        let peer_id = derive_peer_id(&leaf);
        let cert_id = derive_cert_id(&leaf)?;

        let info = DerivedPeerInfo {
            tls_cert_bytes,
            chain_ids,
            peer_id: peer_id.clone(),
            cert_id,
        };

        let mut store = self.store.write().await;
        store.insert(peer_id, info.clone());
        Ok(info)
    }

    pub async fn query_by_peer(&self, peer_id: &PeerId) -> Option<DerivedPeerInfo> {
        self.store.read().await.get(peer_id).cloned()
    }

    pub async fn evict_by_peer(&self, peer_id: &PeerId) {
        self.store.write().await.remove(peer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed_cert_der(san: &str) -> Vec<u8> {
        let cert = rcgen::generate_simple_self_signed(vec![san.to_string()]).unwrap();
        cert.cert.der().to_vec()
    }

    #[tokio::test]
    async fn derive_peer_id_is_deterministic_over_same_key() {
        let der = self_signed_cert_der("localhost");
        let (_, leaf) = X509Certificate::from_der(&der).unwrap();
        let a = derive_peer_id(&leaf);
        let b = derive_peer_id(&leaf);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn verify_and_derive_rejects_empty_chain() {
        let validator = CertValidator::new(ChainTrustRoots::new(), Arc::new(NoRevocations));
        let err = validator.verify_and_derive(&[]).await.unwrap_err();
        assert!(matches!(err, IdentityError::EmptyChain));
    }

    #[tokio::test]
    async fn verify_and_derive_rejects_revoked_certificate() {
        struct AlwaysRevoked;
        impl RevocationOracle for AlwaysRevoked {
            fn is_revoked(&self, _chain: &[CertificateDer<'_>]) -> bool {
                true
            }
        }
        let der = self_signed_cert_der("localhost");
        let validator = CertValidator::new(ChainTrustRoots::new(), Arc::new(AlwaysRevoked));
        let chain = vec![CertificateDer::from(der)];
        let err = validator.verify_and_derive(&chain).await.unwrap_err();
        assert!(matches!(err, IdentityError::CertificateRevoked));
    }

    #[tokio::test]
    async fn query_after_evict_returns_none() {
        let validator = CertValidator::new(ChainTrustRoots::new(), Arc::new(NoRevocations));
        let peer_id = PeerId::new("some-peer");
        validator
            .store
            .write()
            .await
            .insert(
                peer_id.clone(),
                DerivedPeerInfo {
                    tls_cert_bytes: vec![],
                    chain_ids: vec!["chain-1".into()],
                    peer_id: peer_id.clone(),
                    cert_id: "cert-1".into(),
                },
            );
        assert!(validator.query_by_peer(&peer_id).await.is_some());
        validator.evict_by_peer(&peer_id).await;
        assert!(validator.query_by_peer(&peer_id).await.is_none());
    }
}
