//! Internal control protocol used to broadcast protocol-support changes to
//! already-connected peers, per spec.md §4.8's
//! `registerMsgPayloadHandler`/`unregisterMsgPayloadHandler`: "broadcast a
//! *protocol-supported* notification to every currently connected peer
//! (via an internal control protocol)".

use liquidmesh_types::ProtocolId;
use serde::{Deserialize, Serialize};

pub const CONTROL_PROTOCOL_ID: &str = "liquidmesh/control/1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlMessage {
    ProtocolSupported(String),
    ProtocolUnsupported(String),
}

impl ControlMessage {
    pub fn protocol_id(&self) -> ProtocolId {
        match self {
            ControlMessage::ProtocolSupported(tag) => ProtocolId::new(tag.clone()),
            ControlMessage::ProtocolUnsupported(tag) => ProtocolId::new(tag.clone()),
        }
    }
}
