//! 에러 타입 정의

use thiserror::Error;

use crate::direction::Direction;

/// LDT 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("전송 진행 중: transfer_id={transfer_id}, 남은 청크={remaining_chunks}")]
    TransferInProgress {
        transfer_id: u64,
        remaining_chunks: usize,
    },

    #[error("유효하지 않은 청크 길이: {length}")]
    InvalidChunkLength { length: usize },

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("방향과 경로 불일치: direction={direction:?}, route={route}")]
    RouteMismatch {
        direction: Direction,
        route: &'static str,
    },

    #[error("순서 위반 청크: expected {expected:?}, got {got:?}")]
    OutOfSequence {
        expected: (u64, u32),
        got: (u64, u32),
    },

    #[error("예상하지 않은 ACK: expected {expected:?}, got {got:?}")]
    UnexpectedAck {
        expected: Option<(u64, u32)>,
        got: (u64, u32),
    },

    #[error("유효하지 않은 매직 넘버: expected {expected:08X}, got {got:08X}")]
    InvalidMagicNumber { expected: u32, got: u32 },

    #[error("유효하지 않은 프로토콜 버전: expected {expected}, got {got}")]
    InvalidVersion { expected: u8, got: u8 },

    #[error("CRC 불일치: expected {expected:08X}, got {got:08X}")]
    CrcMismatch { expected: u32, got: u32 },

    #[error("메시지 타입 불일치: expected {expected}, got {got}")]
    MessageTypeMismatch { expected: String, got: String },

    #[error("잘린 프레임: 최소 {needed} 바이트 필요, {got} 바이트 수신")]
    Truncated { needed: usize, got: usize },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
