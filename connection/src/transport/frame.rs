//! Length-prefixed JSON framing.
//!
//! Each frame is a 4 byte big-endian body length followed by a UTF-8 JSON body.

use crate::transport::TransportError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the frame length prefix in bytes.
pub(crate) const HEADER_SIZE: usize = 4;
/// Largest frame body accepted from a peer.
///
/// Peer lists on large networks stay well below this.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// State machine for the [`FrameReader`] read method.
///
/// Tracks progress across interruptions so a read abandoned by a timeout
/// or `tokio::select!` resumes without losing partially read bytes.
#[derive(Debug)]
enum ReadState {
    /// Reading the length prefix.
    ReadingHeader {
        header: [u8; HEADER_SIZE],
        bytes_read: usize,
    },
    /// Reading the frame body.
    ReadingBody { buffer: Vec<u8>, bytes_read: usize },
}

impl ReadState {
    fn reading_header() -> Self {
        ReadState::ReadingHeader {
            header: [0u8; HEADER_SIZE],
            bytes_read: 0,
        }
    }

    fn reading_body(body_len: usize) -> Self {
        ReadState::ReadingBody {
            buffer: vec![0u8; body_len],
            bytes_read: 0,
        }
    }
}

/// Encode a message into a complete frame.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, TransportError> {
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge(body.len()));
    }

    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Writes frames to the underlying I/O.
#[derive(Debug)]
pub struct FrameWriter<W> {
    pub(crate) writer: W,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize and write one message.
    pub async fn write<T: Serialize>(&mut self, message: &T) -> Result<(), TransportError> {
        let frame = encode(message)?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Shut down the write direction of the I/O.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Reads frames from the underlying I/O.
#[derive(Debug)]
pub struct FrameReader<R> {
    state: ReadState,
    reader: R,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            state: ReadState::reading_header(),
            reader,
        }
    }

    /// Read and deserialize one message.
    ///
    /// This function is cancellation safe.
    pub async fn read<T: DeserializeOwned>(&mut self) -> Result<T, TransportError> {
        loop {
            match &mut self.state {
                ReadState::ReadingHeader { header, bytes_read } => {
                    while *bytes_read < HEADER_SIZE {
                        let n = self.reader.read(&mut header[*bytes_read..]).await?;
                        if n == 0 {
                            return Err(TransportError::Io(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "connection closed while reading frame header",
                            )));
                        }
                        *bytes_read += n;
                    }

                    let body_len = u32::from_be_bytes(*header) as usize;
                    if body_len > MAX_FRAME_SIZE {
                        // The stream can't be resynchronized after this.
                        self.state = ReadState::reading_header();
                        return Err(TransportError::FrameTooLarge(body_len));
                    }
                    self.state = ReadState::reading_body(body_len);
                }

                ReadState::ReadingBody { buffer, bytes_read } => {
                    while *bytes_read < buffer.len() {
                        let n = self.reader.read(&mut buffer[*bytes_read..]).await?;
                        if n == 0 {
                            return Err(TransportError::Io(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "connection closed while reading frame body",
                            )));
                        }
                        *bytes_read += n;
                    }

                    let body = std::mem::take(buffer);
                    self.state = ReadState::reading_header();
                    return Ok(serde_json::from_slice(&body)?);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Request, Response};
    use serde_json::json;
    use tokio_test::io::Builder as MockIoBuilder;

    #[tokio::test]
    async fn test_read_single_frame() {
        let frame = encode(&Response::ok(1, json!({"height": 5}))).unwrap();
        let mut reader = FrameReader::new(MockIoBuilder::new().read(&frame).build());

        let response: Response = reader.read().await.unwrap();
        assert_eq!(response.id, 1);
        assert_eq!(response.payload, Some(json!({"height": 5})));
    }

    #[tokio::test]
    async fn test_write_frame() {
        let request = Request {
            id: 9,
            path: "peer.getStatus".to_string(),
            payload: json!({}),
        };
        let mut writer = FrameWriter::new(Vec::new());
        writer.write(&request).await.unwrap();

        let body_len = u32::from_be_bytes(writer.writer[..HEADER_SIZE].try_into().unwrap());
        assert_eq!(body_len as usize, writer.writer.len() - HEADER_SIZE);
        let decoded: Request = serde_json::from_slice(&writer.writer[HEADER_SIZE..]).unwrap();
        assert_eq!(decoded, request);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let header = ((MAX_FRAME_SIZE + 1) as u32).to_be_bytes();
        let mut reader = FrameReader::new(MockIoBuilder::new().read(&header).build());

        let result = reader.read::<Response>().await;
        assert!(matches!(result, Err(TransportError::FrameTooLarge(_))));
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let body = b"{not json";
        let mut data = (body.len() as u32).to_be_bytes().to_vec();
        data.extend_from_slice(body);
        let mut reader = FrameReader::new(MockIoBuilder::new().read(&data).build());

        let result = reader.read::<Response>().await;
        assert!(matches!(result, Err(TransportError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_unexpected_eof_during_body() {
        let mut frame = encode(&Response::ok(1, json!({}))).unwrap();
        frame.truncate(HEADER_SIZE + 2);
        let mut reader = FrameReader::new(MockIoBuilder::new().read(&frame).build());

        let result = reader.read::<Response>().await;
        assert!(matches!(result, Err(TransportError::Io(_))));
    }

    #[tokio::test]
    async fn test_byte_at_a_time() {
        let first = encode(&Response::ok(1, json!({"a": 1}))).unwrap();
        let second = encode(&Response::err(2, "busy")).unwrap();

        let mut builder = MockIoBuilder::new();
        for byte in first.iter().chain(second.iter()) {
            builder.read(std::slice::from_ref(byte));
        }
        let mut reader = FrameReader::new(builder.build());

        let response: Response = reader.read().await.unwrap();
        assert_eq!(response.id, 1);
        let response: Response = reader.read().await.unwrap();
        assert_eq!(response.id, 2);
        assert_eq!(response.error.as_deref(), Some("busy"));
    }
}
