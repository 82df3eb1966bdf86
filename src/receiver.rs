//! 수신자 (재조립)
//!
//! - 청크를 순서대로 버퍼에 이어 붙임
//! - 마지막 청크에서 전체 페이로드를 꺼내고 버퍼를 비움
//! - stop-and-wait 모드에서는 청크마다 ACK 생성

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use crate::chunk::{ChunkSeq, TransferId};
use crate::config::Strictness;
use crate::message::{AckMessage, ChunkMessage};
use crate::stats::TransferStats;
use crate::{Config, Error, Result};

/// 프레임 하나를 처리한 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Received {
    /// 송신측에 돌려보낼 ACK
    pub ack: Option<AckMessage>,

    /// 조립 완료된 페이로드
    pub payload: Option<Bytes>,
}

/// 재조립기 (송신자-수신자 쌍마다 하나의 전송만 진행)
#[derive(Debug)]
pub struct Reassembler {
    strictness: Strictness,
    send_acks: bool,

    /// 수신 버퍼
    buffer: BytesMut,

    /// 진행 중인 전송의 다음 기대 청크
    expected: Option<(TransferId, ChunkSeq)>,

    /// 마지막으로 완료된 전송
    last_completed: Option<TransferId>,

    stats: TransferStats,
}

impl Reassembler {
    pub fn new(config: &Config) -> Self {
        Self {
            strictness: config.strictness,
            send_acks: config.uses_acks(),
            buffer: BytesMut::new(),
            expected: None,
            last_completed: None,
            stats: TransferStats::new(),
        }
    }

    /// 청크 추가, 마지막 청크면 전체 페이로드 반환
    pub fn on_chunk_received(&mut self, chunk: &[u8], is_final: bool) -> Option<Bytes> {
        self.buffer.extend_from_slice(chunk);
        self.stats.chunks_received += 1;
        self.stats.bytes_received += chunk.len() as u64;

        debug!(
            "청크 수신: {} bytes, 버퍼 {} bytes, final={}",
            chunk.len(),
            self.buffer.len(),
            is_final
        );

        if !is_final {
            return None;
        }

        // 버퍼를 꺼내고 빈 상태로 되돌림
        let payload = self.buffer.split().freeze();
        self.stats.payloads_received += 1;
        info!("전체 데이터 수신 완료: {} bytes", payload.len());
        Some(payload)
    }

    /// 순번을 검증하면서 청크 메시지 처리
    pub fn on_chunk_message(&mut self, msg: ChunkMessage) -> Result<Received> {
        let got = (msg.transfer_id, msg.sequence);

        let accepted = match self.expected {
            Some(expected) => expected == got,
            None => msg.sequence == 0 && self.last_completed != Some(msg.transfer_id),
        };

        if !accepted {
            self.stats.rejected_frames += 1;
            let expected = self
                .expected
                .unwrap_or((self.last_completed.map_or(1, |id| id + 1), 0));
            self.strictness
                .enforce(Error::OutOfSequence { expected, got })?;
            return Ok(Received::default());
        }

        self.expected = if msg.is_final {
            self.last_completed = Some(msg.transfer_id);
            None
        } else {
            Some((msg.transfer_id, msg.sequence + 1))
        };

        let ack = self.send_acks.then_some(AckMessage {
            transfer_id: msg.transfer_id,
            sequence: msg.sequence,
        });
        let payload = self.on_chunk_received(&msg.data, msg.is_final);

        Ok(Received { ack, payload })
    }

    /// 버퍼에 쌓인 바이트 수
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// 전송 수신 중인지
    pub fn is_receiving(&self) -> bool {
        self.expected.is_some()
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }
}
