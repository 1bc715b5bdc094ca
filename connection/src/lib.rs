//! Peer connections for crawling a peer-to-peer network.
//!
//! Peers speak a small request/response protocol: length-prefixed JSON frames
//! carrying a [`Request`] and its [`Response`], correlated by id.

mod connection;
mod message;
mod peer;
mod transport;

pub use connection::{
    AsyncConnection, Connection, ConnectionConfiguration, ConnectionError, ConnectionState,
    TcpConnection, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_CONNECT_RETRIES, DEFAULT_REQUEST_TIMEOUT,
};
pub use message::{
    PeerInfo, PeerList, PeerStatus, Request, Response, GET_PEERS, GET_STATUS,
};
pub use peer::PeerAddress;
pub use transport::{encode, FrameReader, FrameWriter, Transport, TransportError, MAX_FRAME_SIZE};
