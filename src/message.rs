//! 프로토콜 메시지 정의
//!
//! 전송 계층이 바이트만 옮기는 경우에 쓰는 프레임 형식.
//! 헤더(고정 크기) + bincode 페이로드, 페이로드에는 CRC32가 붙는다.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkSeq, TransferId};
use crate::{Error, Result, MAGIC_NUMBER, PROTOCOL_VERSION};

/// 직렬화된 헤더 크기: magic(4) + version(1) + msg_type(4) + payload_len(4) + crc32(4)
pub const HEADER_LEN: usize = 17;

/// 메시지 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// 데이터 청크
    Chunk = 1,

    /// 청크 수신 확인 (stop-and-wait)
    Ack = 2,
}

/// 메시지 헤더
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    /// 매직 넘버
    pub magic: u32,

    /// 프로토콜 버전
    pub version: u8,

    /// 메시지 타입
    pub msg_type: MessageType,

    /// 메시지 길이 (헤더 제외)
    pub payload_len: u32,

    /// 페이로드 CRC32
    pub crc32: u32,
}

impl MessageHeader {
    pub fn new(msg_type: MessageType, payload: &[u8]) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            version: PROTOCOL_VERSION,
            msg_type,
            payload_len: payload.len() as u32,
            crc32: crc32fast::hash(payload),
        }
    }
}

/// 청크 메시지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMessage {
    pub transfer_id: TransferId,
    pub sequence: ChunkSeq,
    pub is_final: bool,
    pub data: Bytes,
}

impl From<&Chunk> for ChunkMessage {
    fn from(chunk: &Chunk) -> Self {
        Self {
            transfer_id: chunk.transfer_id,
            sequence: chunk.sequence,
            is_final: chunk.is_final,
            data: chunk.data.clone(),
        }
    }
}

/// ACK 메시지 (수신측 → 송신측)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    pub transfer_id: TransferId,
    pub sequence: ChunkSeq,
}

/// 통합 메시지 enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Chunk(ChunkMessage),
    Ack(AckMessage),
}

impl Message {
    /// 메시지 타입 반환
    pub fn msg_type(&self) -> MessageType {
        match self {
            Message::Chunk(_) => MessageType::Chunk,
            Message::Ack(_) => MessageType::Ack,
        }
    }

    /// 헤더 + 페이로드로 직렬화
    pub fn to_bytes(&self) -> Result<Bytes> {
        let payload = match self {
            Message::Chunk(chunk) => bincode::serialize(chunk)?,
            Message::Ack(ack) => bincode::serialize(ack)?,
        };
        let header = MessageHeader::new(self.msg_type(), &payload);
        let header_bytes = bincode::serialize(&header)?;

        let mut buf = BytesMut::with_capacity(header_bytes.len() + payload.len());
        buf.put_slice(&header_bytes);
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// 바이트에서 역직렬화 (매직, 버전, 길이, CRC 검증)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Truncated {
                needed: HEADER_LEN,
                got: bytes.len(),
            });
        }

        let header: MessageHeader = bincode::deserialize(&bytes[..HEADER_LEN])?;
        if header.magic != MAGIC_NUMBER {
            return Err(Error::InvalidMagicNumber {
                expected: MAGIC_NUMBER,
                got: header.magic,
            });
        }
        if header.version != PROTOCOL_VERSION {
            return Err(Error::InvalidVersion {
                expected: PROTOCOL_VERSION,
                got: header.version,
            });
        }

        let end = HEADER_LEN + header.payload_len as usize;
        if bytes.len() < end {
            return Err(Error::Truncated {
                needed: end,
                got: bytes.len(),
            });
        }

        let payload = &bytes[HEADER_LEN..end];
        let crc = crc32fast::hash(payload);
        if crc != header.crc32 {
            return Err(Error::CrcMismatch {
                expected: header.crc32,
                got: crc,
            });
        }

        match header.msg_type {
            MessageType::Chunk => Ok(Message::Chunk(bincode::deserialize(payload)?)),
            MessageType::Ack => Ok(Message::Ack(bincode::deserialize(payload)?)),
        }
    }
}

impl ChunkMessage {
    pub fn to_bytes(&self) -> Result<Bytes> {
        Message::Chunk(self.clone()).to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match Message::from_bytes(bytes)? {
            Message::Chunk(chunk) => Ok(chunk),
            other => Err(Error::MessageTypeMismatch {
                expected: format!("{:?}", MessageType::Chunk),
                got: format!("{:?}", other.msg_type()),
            }),
        }
    }
}

impl AckMessage {
    pub fn to_bytes(&self) -> Result<Bytes> {
        Message::Ack(*self).to_bytes()
    }
}
