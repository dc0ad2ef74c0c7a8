// Wire protocol messages and framing

use crate::core::{Block, Transaction};
use crate::error::{ChainError, Result};
use crate::wallet::WalletUpdate;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Peer protocol version exchanged in the handshake
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on a frame payload; larger frames indicate a broken or
/// hostile peer
pub const MAX_PAYLOAD_LEN: u64 = 4 * 1024 * 1024;

const MSG_HANDSHAKE: u32 = 1;
const MSG_TX: u32 = 2;
const MSG_BLOCK: u32 = 3;
const MSG_WALLET_UPDATE: u32 = 4;
const MSG_PING: u32 = 5;

/// Handshake payload sent immediately after a connection is established
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub protocol_version: u32,
    pub best_height: u64,
    pub addr_from: String,
}

/// A typed peer-to-peer message.
///
/// On the wire every message is length-prefixed:
/// `type (u32 LE) || payload length (u64 LE) || payload`, the payload being
/// the JSON encoding of the variant body. Receivers read exact byte counts,
/// so framing is independent of how the transport chunks the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Handshake(Handshake),
    Tx(Transaction),
    Block(Block),
    WalletUpdate(WalletUpdate),
    Ping(u64),
}

impl Message {
    /// Numeric type tag written into the frame header
    pub fn type_tag(&self) -> u32 {
        match self {
            Message::Handshake(_) => MSG_HANDSHAKE,
            Message::Tx(_) => MSG_TX,
            Message::Block(_) => MSG_BLOCK,
            Message::WalletUpdate(_) => MSG_WALLET_UPDATE,
            Message::Ping(_) => MSG_PING,
        }
    }

    /// Encode the message into a full frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Message::Handshake(hs) => serde_json::to_vec(hs)?,
            Message::Tx(tx) => serde_json::to_vec(tx)?,
            Message::Block(block) => serde_json::to_vec(block)?,
            Message::WalletUpdate(update) => serde_json::to_vec(update)?,
            Message::Ping(nonce) => serde_json::to_vec(nonce)?,
        };

        let mut frame = Vec::with_capacity(12 + payload.len());
        frame.extend_from_slice(&self.type_tag().to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a payload for the given type tag
    pub fn decode(tag: u32, payload: &[u8]) -> Result<Self> {
        match tag {
            MSG_HANDSHAKE => Ok(Message::Handshake(serde_json::from_slice(payload)?)),
            MSG_TX => Ok(Message::Tx(serde_json::from_slice(payload)?)),
            MSG_BLOCK => Ok(Message::Block(serde_json::from_slice(payload)?)),
            MSG_WALLET_UPDATE => {
                Ok(Message::WalletUpdate(serde_json::from_slice(payload)?))
            }
            MSG_PING => Ok(Message::Ping(serde_json::from_slice(payload)?)),
            other => Err(ChainError::Serialization(format!(
                "unknown message type {other}"
            ))),
        }
    }
}

/// Write one framed message to the stream
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = message.encode()?;
    writer
        .write_all(&frame)
        .await
        .map_err(|e| ChainError::Network(format!("write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| ChainError::Network(format!("flush failed: {e}")))?;
    Ok(())
}

/// Read one framed message from the stream
pub async fn read_message<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 12];
    reader
        .read_exact(&mut header)
        .await
        .map_err(|e| ChainError::Network(format!("read failed: {e}")))?;

    let tag = u32::from_le_bytes(header[0..4].try_into().expect("4-byte slice"));
    let len = u64::from_le_bytes(header[4..12].try_into().expect("8-byte slice"));

    if len > MAX_PAYLOAD_LEN {
        return Err(ChainError::Network(format!(
            "payload of {len} bytes exceeds limit"
        )));
    }

    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| ChainError::Network(format!("read failed: {e}")))?;

    Message::decode(tag, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{Consensus, ProofOfWork};
    use crate::wallet::keys::KeyPair;
    use std::sync::atomic::AtomicBool;

    async fn roundtrip(message: Message) -> Message {
        let frame = message.encode().unwrap();
        let mut reader = frame.as_slice();
        read_message(&mut reader).await.unwrap()
    }

    #[tokio::test]
    async fn test_handshake_roundtrip() {
        let message = Message::Handshake(Handshake {
            protocol_version: PROTOCOL_VERSION,
            best_height: 42,
            addr_from: "127.0.0.1:4000".to_string(),
        });
        assert_eq!(roundtrip(message.clone()).await, message);
    }

    #[tokio::test]
    async fn test_transaction_roundtrip() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let mut tx =
            Transaction::new(a.address.to_string(), b.address.to_string(), 10);
        tx.sign(&a.secret_key);

        let decoded = roundtrip(Message::Tx(tx.clone())).await;
        assert_eq!(decoded, Message::Tx(tx));
    }

    #[tokio::test]
    async fn test_block_roundtrip() {
        let mut block = Block::genesis(8);
        assert!(ProofOfWork::new().generate_block(&mut block, &AtomicBool::new(false)));

        let decoded = roundtrip(Message::Block(block.clone())).await;
        match decoded {
            Message::Block(b) => {
                assert_eq!(b, block);
                // The decoded block still verifies
                assert!(ProofOfWork::new().verify_block(&b));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ping_roundtrip() {
        assert_eq!(roundtrip(Message::Ping(7)).await, Message::Ping(7));
    }

    #[tokio::test]
    async fn test_framing_survives_chunked_reads() {
        // Two messages back to back in one buffer decode cleanly in order
        let first = Message::Ping(1).encode().unwrap();
        let second = Message::Ping(2).encode().unwrap();

        let mut stream = Vec::new();
        stream.extend_from_slice(&first);
        stream.extend_from_slice(&second);

        let mut reader = stream.as_slice();
        assert_eq!(read_message(&mut reader).await.unwrap(), Message::Ping(1));
        assert_eq!(read_message(&mut reader).await.unwrap(), Message::Ping(2));
        assert!(reader.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_tag_is_rejected() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&99u32.to_le_bytes());
        frame.extend_from_slice(&2u64.to_le_bytes());
        frame.extend_from_slice(b"{}");

        let mut reader = frame.as_slice();
        assert!(read_message(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_payload_is_rejected() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&MSG_PING.to_le_bytes());
        frame.extend_from_slice(&(MAX_PAYLOAD_LEN + 1).to_le_bytes());

        let mut reader = frame.as_slice();
        assert!(read_message(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn test_truncated_frame_is_an_error() {
        let frame = Message::Ping(7).encode().unwrap();
        let mut reader = &frame[..frame.len() - 1];
        assert!(read_message(&mut reader).await.is_err());
    }
}
