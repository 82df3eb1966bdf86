//! 송수신 컴포넌트
//!
//! 송신 펌프, 피어별 재조립기, 알림을 묶은 엔드포인트 단위 객체.
//! 외부 스케줄러가 `tick`을, 전송 계층이 `on_frame_received`를 호출한다.
//! 수신 전송은 송신 피어(채널)마다 하나씩 따로 조립된다.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::chunk::TransferId;
use crate::direction::Direction;
use crate::message::{AckMessage, Message};
use crate::notify::{ChunkSent, Notifier, SubscriptionId};
use crate::receiver::Reassembler;
use crate::sender::{Progress, PumpState, Sender, TickOutcome};
use crate::stats::TransferStats;
use crate::transport::Transport;
use crate::{Config, Result};

/// 송수신 엔드포인트 (`C`는 전송 계층 채널 타입)
#[derive(Debug)]
pub struct Transceiver<C> {
    sender: Sender<C>,

    /// 송신 피어별 재조립기
    receivers: HashMap<C, Reassembler>,

    /// 연결이 끊긴 피어의 수신 통계
    departed: TransferStats,

    notifier: Notifier,

    /// 디코딩 실패한 프레임 수
    undecodable_frames: u64,
}

impl<C: Clone + Eq + Hash + fmt::Debug> Transceiver<C> {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            sender: Sender::new(config)?,
            receivers: HashMap::new(),
            departed: TransferStats::new(),
            notifier: Notifier::new(),
            undecodable_frames: 0,
        })
    }

    /// 데이터 전송 시작
    pub fn send_data(&mut self, payload: Bytes, direction: Direction) -> Result<TransferId> {
        self.sender.send_data(payload, direction)
    }

    /// 스케줄링 tick
    pub fn tick<T: Transport<Channel = C>>(
        &mut self,
        transport: &mut T,
        delta: Duration,
    ) -> Result<TickOutcome> {
        self.sender.tick(transport, delta, &mut self.notifier)
    }

    fn receiver_for(&mut self, from: &C) -> &mut Reassembler {
        let config = self.sender.config();
        self.receivers
            .entry(from.clone())
            .or_insert_with(|| Reassembler::new(config))
    }

    /// 전송 계층이 청크 데이터와 final 플래그를 직접 넘겨주는 경우
    pub fn on_chunk_received(&mut self, from: &C, chunk: &[u8], is_final: bool) {
        if let Some(payload) = self.receiver_for(from).on_chunk_received(chunk, is_final) {
            self.notifier.emit_transfer_complete(&payload);
        }
    }

    /// 프레임 수신 (청크 또는 ACK)
    ///
    /// stop-and-wait 모드의 ACK는 `from` 채널로 되돌려 보낸다.
    pub fn on_frame_received<T: Transport<Channel = C>>(
        &mut self,
        transport: &mut T,
        from: &C,
        frame: &[u8],
    ) -> Result<()> {
        let message = match Message::from_bytes(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("프레임 디코딩 실패 ({:?}): {}", from, e);
                self.undecodable_frames += 1;
                return self.sender.config().strictness.enforce(e);
            }
        };

        match message {
            Message::Chunk(chunk) => {
                let received = self.receiver_for(from).on_chunk_message(chunk)?;
                if let Some(ack) = received.ack {
                    transport.send_reliable_ordered(from, ack.to_bytes()?);
                }
                if let Some(payload) = received.payload {
                    self.notifier.emit_transfer_complete(&payload);
                }
                Ok(())
            }
            Message::Ack(ack) => self.on_ack(from, ack),
        }
    }

    pub fn on_ack(&mut self, from: &C, ack: AckMessage) -> Result<()> {
        self.sender.on_ack(from, ack)
    }

    /// 피어 연결 끊김 알림: 조립 중이던 데이터는 버림
    pub fn on_peer_disconnected(&mut self, peer: &C) {
        if let Some(receiver) = self.receivers.remove(peer) {
            if receiver.is_receiving() {
                warn!(
                    "피어 {:?} 연결 끊김, 조립 중이던 {} bytes 폐기",
                    peer,
                    receiver.buffered_len()
                );
            } else {
                debug!("피어 {:?} 수신 상태 정리", peer);
            }
            self.departed.merge(receiver.stats());
        }
    }

    pub fn have_something_to_send(&self) -> bool {
        self.sender.have_something_to_send()
    }

    pub fn progress(&self) -> Option<Progress> {
        self.sender.progress()
    }

    pub fn pump_state(&self) -> PumpState {
        self.sender.state()
    }

    /// 청크를 하나 보낼 때마다 호출
    pub fn on_chunk_sent<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&ChunkSent) + Send + 'static,
    {
        self.notifier.on_chunk_sent(observer)
    }

    /// 전체 데이터를 받으면 호출
    pub fn on_transfer_complete<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&Bytes) + Send + 'static,
    {
        self.notifier.on_transfer_complete(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// 송신 + 모든 피어의 수신 통계
    pub fn stats(&self) -> TransferStats {
        let mut stats = self.sender.stats().clone();
        stats.merge(&self.departed);
        for receiver in self.receivers.values() {
            stats.merge(receiver.stats());
        }
        stats.rejected_frames += self.undecodable_frames;
        stats
    }
}
