//! Message transport over an async byte stream.
//!
//! The [`Transport`] pairs a [`FrameReader`] and a [`FrameWriter`] over any
//! `AsyncRead`/`AsyncWrite` halves. It knows nothing about request correlation,
//! that lives in the connection layer.

mod frame;

pub use frame::{encode, FrameReader, FrameWriter, MAX_FRAME_SIZE};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// Error types specific to the transport layer.
#[derive(Debug)]
pub enum TransportError {
    /// IO error during read/write operations.
    Io(io::Error),
    /// Failed to serialize or deserialize a message body.
    Serialization(serde_json::Error),
    /// A frame exceeded [`MAX_FRAME_SIZE`].
    FrameTooLarge(usize),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "IO error: {e}"),
            TransportError::Serialization(e) => write!(f, "Message serialization error: {e}"),
            TransportError::FrameTooLarge(len) => {
                write!(f, "Frame of {len} bytes exceeds limit of {MAX_FRAME_SIZE}")
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            TransportError::Serialization(e) => Some(e),
            TransportError::FrameTooLarge(_) => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Serialization(e)
    }
}

/// Framed message transport.
///
/// # Example
///
/// ```no_run
/// use peers_connection::{Request, Response, Transport};
/// use tokio::net::TcpStream;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = TcpStream::connect("127.0.0.1:4001").await?;
/// let (reader, writer) = stream.into_split();
/// let mut transport = Transport::new(reader, writer);
///
/// transport
///     .write(&Request {
///         id: 1,
///         path: "peer.getStatus".to_string(),
///         payload: serde_json::json!({}),
///     })
///     .await?;
/// let response: Response = transport.read().await?;
/// println!("{response:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Transport<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl<R, W> Transport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// Read one message. Cancellation safe.
    pub async fn read<T: DeserializeOwned>(&mut self) -> Result<T, TransportError> {
        self.reader.read().await
    }

    /// Write one message.
    pub async fn write<T: Serialize>(&mut self, message: &T) -> Result<(), TransportError> {
        self.writer.write(message).await
    }

    /// Shut down the write direction.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await
    }
}
