//! Shared identity and protocol-id primitives for the liquidmesh transport
//! substrate: `PeerId`, `ProtocolId`, and the connection `Direction` enum.
//!
//! Every other crate in the workspace depends on this one; it carries no
//! I/O and no async runtime dependency.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator embedded between the chain id and message-flag segment of a
/// [`ProtocolId`] produced by [`ProtocolId::with_chain_and_flag`]. Chosen to
/// be a control character unlikely to appear in a hand-written protocol tag.
const CHAIN_FLAG_SEPARATOR: char = '\u{1}';

/// Opaque peer identity, derived from a public key by the identity
/// validator. Total order is defined by [`PeerId::weight_compare`], not by
/// the derived `Ord` impl (which is plain lexicographic and only used for
/// use as a map key).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deterministic tie-break used when two connections to the same remote
    /// peer are observed. Compares raw bytes lexicographically; if one id is
    /// a strict prefix of the other, the shorter one wins. Returns
    /// `Ordering::Greater` when `self` wins.
    pub fn weight_compare(&self, other: &PeerId) -> Ordering {
        let l = self.0.as_bytes();
        let r = other.0.as_bytes();
        for i in 0..l.len().min(r.len()) {
            if l[i] != r[i] {
                return l[i].cmp(&r[i]);
            }
        }
        match l.len().cmp(&r.len()) {
            Ordering::Equal => Ordering::Equal,
            // self is the (strict) prefix of other: self is shorter, self wins.
            Ordering::Less => Ordering::Greater,
            Ordering::Greater => Ordering::Less,
        }
    }

    /// Convenience boolean form: true if `self` should be kept over `other`.
    pub fn outweighs(&self, other: &PeerId) -> bool {
        self.weight_compare(other) == Ordering::Greater
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        PeerId(s)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        PeerId(s.to_string())
    }
}

/// String tag identifying an application-level protocol spoken over a
/// stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolId(pub String);

#[derive(Debug, Error)]
pub enum ProtocolIdError {
    #[error("protocol id {0:?} carries no chain/flag separator")]
    Malformed(String),
}

impl ProtocolId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a protocol id embedding a chain id and message-flag tag.
    /// Round-trips exactly through [`ProtocolId::chain_and_flag`], including
    /// when either side is empty.
    pub fn with_chain_and_flag(chain_id: &str, msg_flag: &str) -> Self {
        Self(format!("{chain_id}{CHAIN_FLAG_SEPARATOR}{msg_flag}"))
    }

    /// Inverse of [`ProtocolId::with_chain_and_flag`].
    pub fn chain_and_flag(&self) -> Result<(String, String), ProtocolIdError> {
        let idx = self
            .0
            .find(CHAIN_FLAG_SEPARATOR)
            .ok_or_else(|| ProtocolIdError::Malformed(self.0.clone()))?;
        let chain_id = self.0[..idx].to_string();
        let msg_flag = self.0[idx + CHAIN_FLAG_SEPARATOR.len_utf8()..].to_string();
        Ok((chain_id, msg_flag))
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProtocolId {
    fn from(s: String) -> Self {
        ProtocolId(s)
    }
}

impl From<&str> for ProtocolId {
    fn from(s: &str) -> Self {
        ProtocolId(s.to_string())
    }
}

/// Which side initiated a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_compare_is_trichotomous_on_equal() {
        let a = PeerId::new("abc");
        let b = PeerId::new("abc");
        assert_eq!(a.weight_compare(&b), Ordering::Equal);
    }

    #[test]
    fn weight_compare_prefers_greater_byte() {
        let a = PeerId::new("abd");
        let b = PeerId::new("abc");
        assert_eq!(a.weight_compare(&b), Ordering::Greater);
        assert_eq!(b.weight_compare(&a), Ordering::Less);
    }

    #[test]
    fn weight_compare_prefers_shorter_prefix() {
        let short = PeerId::new("ab");
        let long = PeerId::new("abc");
        assert_eq!(short.weight_compare(&long), Ordering::Greater);
        assert_eq!(long.weight_compare(&short), Ordering::Less);
    }

    #[test]
    fn protocol_id_chain_flag_round_trip() {
        for (chain, flag) in [("chain", "flag"), ("", "flag"), ("chain", ""), ("", "")] {
            let pid = ProtocolId::with_chain_and_flag(chain, flag);
            let (c, f) = pid.chain_and_flag().unwrap();
            assert_eq!(c, chain);
            assert_eq!(f, flag);
        }
    }
}
