//! # LDT (Large Data Transceive)
//!
//! 작은 크기의 순서 보장 신뢰성 메시지만 지원하는 전송 계층 위로
//! 큰 페이로드를 옮기는 청크 전송 엔진
//!
//! ## 핵심 특징
//! - **청크 분할**: 페이로드를 최대 길이 이하의 조각으로 분할
//! - **흐름 제어**: 전송 계층의 미처리 버퍼 점유율 기준으로 tick당 송신량 결정
//! - **방향 지정**: 서버로 / 소유 클라이언트로 / 모든 클라이언트로
//! - **재조립**: 마지막 청크에서 전체 페이로드 완성
//! - **알림**: 청크 송신 진행률, 수신 완료 이벤트
//! - **단일 스레드 코어**: 외부 스케줄러(`driver` 또는 호출자)가 `tick`을 호출

pub mod chunk;
pub mod config;
pub mod direction;
pub mod driver;
pub mod error;
pub mod flow;
pub mod loopback;
pub mod message;
pub mod notify;
pub mod queue;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod transceiver;
pub mod transport;

pub use chunk::{Chunk, ChunkSeq, ChunkSplitter, TransferId};
pub use config::{Config, Strictness};
pub use direction::{Direction, DirectionalSender};
pub use driver::{Endpoint, SharedEndpoint, TickDriver};
pub use error::{Error, Result};
pub use flow::{FlowControlSignal, Pacing, SendGate, ThresholdPolicy};
pub use message::{AckMessage, ChunkMessage, Message};
pub use notify::{ChunkSent, Notifier, SubscriptionId};
pub use queue::SendQueue;
pub use receiver::{Reassembler, Received};
pub use sender::{Progress, PumpState, Sender, TickOutcome};
pub use stats::TransferStats;
pub use transceiver::Transceiver;
pub use transport::{EndpointSelector, PendingReason, Resolution, Route, Transport};

/// 프로토콜 버전
pub const PROTOCOL_VERSION: u8 = 1;

/// 기본 최대 청크 길이 (바이트)
pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 60 * 1000;

/// 초기 배포의 최대 청크 길이 (60KiB)
pub const LEGACY_MAX_CHUNK_LENGTH: usize = 60 * 1024;

/// 매직 넘버 (프레임 식별용)
pub const MAGIC_NUMBER: u32 = 0x4C44_5446; // "LDTF"
