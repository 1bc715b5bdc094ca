//! I/O layer for connection handling.
//!
//! [`AsyncConnection`] correlates requests with responses over a [`Transport`] and
//! enforces the per-request timeout. It works with any `AsyncRead`/`AsyncWrite`
//! pair, so tests drive it with in-memory I/O.

use super::configuration::ConnectionConfiguration;
use super::error::ConnectionError;
use super::state::ConnectionState;
use crate::message::{PeerInfo, PeerList, PeerStatus, Request, Response, GET_PEERS, GET_STATUS};
use crate::peer::PeerAddress;
use crate::transport::Transport;
use log::debug;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};

/// A request/response connection to a single peer.
///
/// Requests take `&self` and are serialized over the one underlying stream, so a
/// connection can be shared behind an [`Arc`](std::sync::Arc). Responses carrying
/// an id other than the one awaited (answers to requests that already timed out)
/// are discarded.
///
/// Any I/O or framing failure moves the connection to [`ConnectionState::Closed`]
/// and every later request fails fast with [`ConnectionError::Closed`].
#[derive(Debug)]
pub struct AsyncConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// The peer this connection is established with.
    address: PeerAddress,
    /// Configuration used to build the connection.
    pub(super) configuration: ConnectionConfiguration,
    /// Framed transport, locked for the duration of one exchange.
    transport: Mutex<Transport<R, W>>,
    /// Lifecycle state, readable without awaiting.
    state: StdMutex<ConnectionState>,
    /// Next request id.
    next_id: AtomicU64,
}

impl<R, W> std::fmt::Display for AsyncConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection to {} ({})", self.address, self.state())
    }
}

impl<R, W> AsyncConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a new open connection over established I/O.
    pub fn new(
        address: PeerAddress,
        configuration: ConnectionConfiguration,
        reader: R,
        writer: W,
    ) -> Self {
        Self {
            address,
            configuration,
            transport: Mutex::new(Transport::new(reader, writer)),
            state: StdMutex::new(ConnectionState::Open),
            next_id: AtomicU64::new(1),
        }
    }

    /// The peer this connection is established with.
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Whether requests can still be sent.
    pub fn is_open(&self) -> bool {
        self.state().is_usable()
    }

    fn mark_closed(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = state.on_close();
    }

    /// Send a request and wait for its response payload.
    ///
    /// # Arguments
    ///
    /// * `path` - Logical name of the remote call.
    /// * `payload` - Call arguments.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The response payload, `Value::Null` if the peer sent none.
    /// * `Err(ConnectionError::Timeout)` - No matching response within the request timeout.
    /// * `Err(ConnectionError::Remote)` - The peer answered with an error.
    /// * `Err(ConnectionError)` - The stream failed, the connection is now closed.
    pub async fn request(&self, path: &str, payload: Value) -> Result<Value, ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed);
        }

        let request = Request {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            path: path.to_string(),
            payload,
        };

        let deadline = Instant::now() + self.configuration.request_timeout;
        match self.exchange(&request, deadline).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                if e.is_fatal() {
                    debug!("Closing {} after failed {path}: {e}", self.address);
                    self.mark_closed();
                }
                Err(e)
            }
        }
    }

    /// Write the request and read until its response arrives, all before `deadline`.
    ///
    /// Only the write is fatal to time out. Reads are cancellation safe, but an
    /// interrupted write may leave half a frame on the stream.
    async fn exchange(&self, request: &Request, deadline: Instant) -> Result<Value, ConnectionError> {
        let mut transport = match timeout_at(deadline, self.transport.lock()).await {
            Ok(transport) => transport,
            Err(_) => return Err(self.timed_out(request)),
        };

        match timeout_at(deadline, transport.write(request)).await {
            Ok(written) => written?,
            Err(_) => {
                debug!(
                    "Closing {} after {} request {} timed out mid-write",
                    self.address, request.path, request.id
                );
                self.mark_closed();
                return Err(ConnectionError::Timeout);
            }
        }

        loop {
            let response: Response = match timeout_at(deadline, transport.read()).await {
                Ok(read) => read?,
                Err(_) => return Err(self.timed_out(request)),
            };
            if response.id != request.id {
                debug!(
                    "Discarding stale response {} from {} while waiting for {}",
                    response.id, self.address, request.id
                );
                continue;
            }

            if let Some(error) = response.error {
                return Err(ConnectionError::Remote(error));
            }
            return Ok(response.payload.unwrap_or(Value::Null));
        }
    }

    fn timed_out(&self, request: &Request) -> ConnectionError {
        debug!(
            "{} request {} to {} timed out",
            request.path, request.id, self.address
        );
        ConnectionError::Timeout
    }

    /// Ask the peer for the peers it knows about.
    pub async fn get_peers(&self) -> Result<Vec<PeerInfo>, ConnectionError> {
        let payload = self.request(GET_PEERS, Value::Object(Default::default())).await?;
        let list: PeerList =
            serde_json::from_value(payload).map_err(ConnectionError::UnexpectedResponse)?;
        debug!(
            "Collected {} peer addresses from {}",
            list.peers.len(),
            self.address
        );
        Ok(list.peers)
    }

    /// Ask the peer for its chain tip and software version.
    pub async fn get_status(&self) -> Result<PeerStatus, ConnectionError> {
        let payload = self.request(GET_STATUS, Value::Object(Default::default())).await?;
        serde_json::from_value(payload).map_err(ConnectionError::UnexpectedResponse)
    }

    /// Shut down the connection.
    ///
    /// Closing an already closed connection is a no-op.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        if !self.is_open() {
            return Ok(());
        }
        self.mark_closed();
        let mut transport = self.transport.lock().await;
        transport.shutdown().await?;
        Ok(())
    }
}
