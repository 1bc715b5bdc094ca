//! Wire messages exchanged with peers.
//!
//! Every exchange is a [`Request`] answered by a [`Response`] carrying the same id.
//! Payloads are free-form JSON objects, the typed views for the calls a crawler
//! makes are [`PeerList`] and [`PeerStatus`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Path of the call returning the peers a node knows about.
pub const GET_PEERS: &str = "peer.getPeers";
/// Path of the call returning a node's chain tip and software version.
pub const GET_STATUS: &str = "peer.getStatus";

/// A request sent to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed back in the matching [`Response`].
    pub id: u64,
    /// Logical name of the remote call, e.g. [`GET_PEERS`].
    pub path: String,
    /// Call arguments.
    #[serde(default)]
    pub payload: Value,
}

/// A response received from a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the [`Request`] this answers.
    pub id: u64,
    /// Call result, absent when `error` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Remote error description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Build a successful response.
    pub fn ok(id: u64, payload: Value) -> Self {
        Response {
            id,
            payload: Some(payload),
            error: None,
        }
    }

    /// Build an error response.
    pub fn err<S: Into<String>>(id: u64, error: S) -> Self {
        Response {
            id,
            payload: None,
            error: Some(error.into()),
        }
    }
}

/// A peer as advertised in another peer's peer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    /// IP address or hostname.
    pub ip: String,
    /// Advertised port, if the listing peer shares it.
    #[serde(default)]
    pub port: Option<u16>,
    /// Advertised software version.
    #[serde(default)]
    pub version: Option<String>,
    /// Last height the listing peer saw for this peer.
    #[serde(default)]
    pub height: Option<u64>,
}

/// Payload of a [`GET_PEERS`] response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerList {
    pub peers: Vec<PeerInfo>,
}

/// Payload of a [`GET_STATUS`] response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerStatus {
    /// Height of the peer's chain tip.
    pub height: u64,
    /// Identifier of the block at `height`.
    pub block_id: String,
    /// Software version the peer runs.
    pub version: String,
}
