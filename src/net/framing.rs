//! Message framing for length-prefixed protocol
//!
//! Handles reading and writing framed messages over streams. The relay uses
//! the async variants on tokio sockets; peers use the blocking variants from
//! their dedicated reader and writer threads.

use std::io::{self, Read, Write};

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::game::constants::net::MAX_MESSAGE_SIZE;
use crate::net::protocol::{decode, encode, DecodeError, EncodeError};

/// Errors that can occur during message framing
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl FramingError {
    /// The stream is unusable after this error (as opposed to one bad record)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FramingError::Decode(_) | FramingError::Encode(_))
    }
}

fn map_eof(e: io::Error) -> FramingError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FramingError::ConnectionClosed
    } else {
        FramingError::Io(e)
    }
}

#[inline]
fn check_len(len: usize) -> Result<(), FramingError> {
    if len > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(len, MAX_MESSAGE_SIZE));
    }
    Ok(())
}

/// Read a length-prefixed message from a stream
///
/// Format: [4 bytes little-endian length][payload]
pub async fn read_message<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.map_err(map_eof)?;

    let len = u32::from_le_bytes(len_buf) as usize;
    check_len(len)?;
    if len == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.map_err(map_eof)?;
    Ok(buf)
}

/// Write a length-prefixed message to a stream
///
/// Format: [4 bytes little-endian length][payload]
pub async fn write_message<W: AsyncWrite + Unpin>(
    stream: &mut W,
    data: &[u8],
) -> Result<(), FramingError> {
    check_len(data.len())?;

    let len_bytes = (data.len() as u32).to_le_bytes();
    stream.write_all(&len_bytes).await?;
    stream.write_all(data).await?;
    stream.flush().await?;

    Ok(())
}

/// Encode and write one record
pub async fn send<W, T>(stream: &mut W, message: &T) -> Result<usize, FramingError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = encode(message)?;
    write_message(stream, &data).await?;
    Ok(data.len() + 4)
}

/// Blocking counterpart of [`read_message`]
pub fn read_frame<R: Read>(stream: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).map_err(map_eof)?;

    let len = u32::from_le_bytes(len_buf) as usize;
    check_len(len)?;
    if len == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).map_err(map_eof)?;
    Ok(buf)
}

/// Blocking counterpart of [`write_message`]
pub fn write_frame<W: Write>(stream: &mut W, data: &[u8]) -> Result<(), FramingError> {
    check_len(data.len())?;
    stream.write_all(&(data.len() as u32).to_le_bytes())?;
    stream.write_all(data)?;
    stream.flush()?;
    Ok(())
}

/// Read and decode one record. A decode failure leaves the stream positioned
/// at the next frame.
pub fn recv_blocking<R: Read, T: DeserializeOwned>(stream: &mut R) -> Result<T, FramingError> {
    let data = read_frame(stream)?;
    Ok(decode(&data)?)
}

/// Encode and write one record
pub fn send_blocking<W: Write, T: Serialize>(stream: &mut W, message: &T) -> Result<(), FramingError> {
    let data = encode(message)?;
    write_frame(stream, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{ClientMessage, PlayerState, ServerMessage};
    use std::io::Cursor;

    #[tokio::test]
    async fn test_read_write_message() {
        let data = b"Hello, World!";
        let mut buffer = Vec::new();

        write_message(&mut buffer, data).await.unwrap();

        let mut cursor = Cursor::new(buffer);
        let result = read_message(&mut cursor).await.unwrap();

        assert_eq!(result, data);
    }

    #[tokio::test]
    async fn test_empty_message() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, b"").await.unwrap();

        let mut cursor = Cursor::new(buffer);
        let result = read_message(&mut cursor).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_message_too_large() {
        let large_data = vec![0u8; MAX_MESSAGE_SIZE + 1];
        let mut buffer = Vec::new();

        let result = write_message(&mut buffer, &large_data).await;
        assert!(matches!(result, Err(FramingError::MessageTooLarge(_, _))));
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&((MAX_MESSAGE_SIZE + 1) as u32).to_le_bytes());
        let mut cursor = Cursor::new(buffer);
        let result = read_message(&mut cursor).await;
        assert!(matches!(result, Err(FramingError::MessageTooLarge(_, _))));
    }

    #[tokio::test]
    async fn test_read_truncated_length() {
        let data = vec![0u8; 2]; // Only 2 bytes, need 4 for length
        let mut cursor = Cursor::new(data);

        let result = read_message(&mut cursor).await;
        assert!(matches!(result, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_read_truncated_payload() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&10u32.to_le_bytes()); // Says 10 bytes
        buffer.extend_from_slice(&[1, 2, 3]); // Only 3 bytes

        let mut cursor = Cursor::new(buffer);
        let result = read_message(&mut cursor).await;
        assert!(matches!(result, Err(FramingError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_async_and_blocking_agree() {
        let msg = ClientMessage::State(PlayerState {
            cannon_x: 250.0,
            score: 30,
            ..PlayerState::default()
        });
        let mut async_buf = Vec::new();
        let written = send(&mut async_buf, &msg).await.unwrap();
        assert_eq!(written, async_buf.len());

        let mut blocking_buf = Vec::new();
        send_blocking(&mut blocking_buf, &msg).unwrap();
        assert_eq!(async_buf, blocking_buf);
    }

    #[test]
    fn test_blocking_multiple_messages() {
        let messages = vec![
            ServerMessage::GameReady,
            ServerMessage::Welcome {
                player_id: 1,
                game_ready: true,
                session: uuid::Uuid::nil(),
            },
        ];
        let mut buffer = Vec::new();
        for msg in &messages {
            send_blocking(&mut buffer, msg).unwrap();
        }

        let mut cursor = Cursor::new(buffer);
        assert!(matches!(
            recv_blocking::<_, ServerMessage>(&mut cursor).unwrap(),
            ServerMessage::GameReady
        ));
        assert!(matches!(
            recv_blocking::<_, ServerMessage>(&mut cursor).unwrap(),
            ServerMessage::Welcome { player_id: 1, .. }
        ));
        let eof = recv_blocking::<_, ServerMessage>(&mut cursor);
        assert!(matches!(eof, Err(FramingError::ConnectionClosed)));
    }

    #[test]
    fn test_bad_record_is_not_fatal() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &[0xFF, 0xFE, 0xFD]).unwrap();
        send_blocking(&mut buffer, &ServerMessage::GameReady).unwrap();

        let mut cursor = Cursor::new(buffer);
        let err = recv_blocking::<_, ServerMessage>(&mut cursor).unwrap_err();
        assert!(!err.is_fatal());
        // The stream resyncs on the next frame
        assert!(matches!(
            recv_blocking::<_, ServerMessage>(&mut cursor).unwrap(),
            ServerMessage::GameReady
        ));
    }
}
