//! 송신자 (흐름 제어 펌프)
//!
//! - 페이로드를 청크로 나눠 송신 큐에 적재
//! - tick마다 전송 계층 버퍼 여유만큼 청크 송신
//! - 전송 계층을 찾을 수 없으면 다음 tick까지 보류

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use crate::chunk::{Chunk, ChunkSeq, ChunkSplitter, TransferId};
use crate::direction::{Direction, DirectionalSender};
use crate::flow::{FlowControlSignal, Pacing, SendGate};
use crate::message::{AckMessage, ChunkMessage, Message};
use crate::notify::{ChunkSent, Notifier};
use crate::queue::SendQueue;
use crate::stats::TransferStats;
use crate::transport::{PendingReason, Resolution, Route, Transport};
use crate::{Config, Error, Result};

/// 펌프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Sending,
    PendingTransport(PendingReason),
}

/// 한 tick의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 보낼 전송 없음
    Idle,

    /// 최소 송신 간격 미달
    Throttled,

    /// 전송 계층 미해석
    Pending(PendingReason),

    /// 이전 청크 ACK 대기 중
    AwaitingAck,

    /// 버퍼 여유 없음 (0개 송신)
    Saturated,

    /// 청크 송신, 전송 계속
    Sent { chunks: usize },

    /// 마지막 청크 송신
    Completed { chunks: usize },
}

/// 진행 상황
///
/// `bytes_sent + remaining_bytes == total_bytes`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub transfer_id: TransferId,
    pub bytes_sent: usize,
    pub remaining_bytes: usize,
    pub remaining_chunks: usize,
    pub total_bytes: usize,
}

/// 진행 중인 전송 상태
#[derive(Debug)]
struct ActiveTransfer {
    id: TransferId,
    sender: DirectionalSender,
    total_bytes: usize,
    bytes_sent: usize,
    next_sequence: ChunkSeq,
}

/// ACK를 기다리는 청크와 아직 ACK하지 않은 수신자
#[derive(Debug)]
struct PendingAck<C> {
    transfer_id: TransferId,
    sequence: ChunkSeq,
    direction: Direction,
    waiting: HashSet<C>,
}

impl<C> PendingAck<C> {
    fn key(&self) -> (TransferId, ChunkSeq) {
        (self.transfer_id, self.sequence)
    }
}

/// 송신자 (`C`는 전송 계층 채널 타입)
#[derive(Debug)]
pub struct Sender<C> {
    /// 설정
    config: Config,

    /// 청크 분할기
    splitter: ChunkSplitter,

    /// 송신 큐
    queue: SendQueue,

    /// 최소 송신 간격 게이트
    gate: SendGate,

    state: PumpState,

    /// 현재 전송 (한 번에 하나)
    transfer: Option<ActiveTransfer>,

    /// stop-and-wait 모드에서 ACK를 기다리는 청크
    awaiting_ack: Option<PendingAck<C>>,

    /// 다음 전송 ID
    next_transfer_id: TransferId,

    /// 송신 통계
    stats: TransferStats,
}

impl<C: Clone + Eq + Hash + fmt::Debug> Sender<C> {
    /// 새 송신자 생성
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            splitter: ChunkSplitter::new(config.max_chunk_length)?,
            gate: SendGate::new(config.min_send_interval),
            config,
            queue: SendQueue::new(),
            state: PumpState::Idle,
            transfer: None,
            awaiting_ack: None,
            next_transfer_id: 1,
            stats: TransferStats::new(),
        })
    }

    /// 전송 시작
    ///
    /// 이전 전송이 끝나기 전에 호출하면 `Error::TransferInProgress`.
    pub fn send_data(&mut self, payload: Bytes, direction: Direction) -> Result<TransferId> {
        if let Some(transfer) = &self.transfer {
            return Err(Error::TransferInProgress {
                transfer_id: transfer.id,
                remaining_chunks: self.queue.len(),
            });
        }

        let id = self.next_transfer_id;
        self.next_transfer_id += 1;

        let total_bytes = payload.len();
        let chunks = self.splitter.split(payload);
        let chunk_count = chunks.len();
        self.queue.extend(chunks);

        self.transfer = Some(ActiveTransfer {
            id,
            sender: DirectionalSender::new(direction),
            total_bytes,
            bytes_sent: 0,
            next_sequence: 0,
        });
        self.state = PumpState::Sending;
        self.stats.transfers_started += 1;

        info!(
            "전송 {} 시작: {} bytes, {} 청크, direction={}",
            id, total_bytes, chunk_count, direction
        );

        Ok(id)
    }

    /// 스케줄러가 주기적으로 호출
    pub fn tick<T: Transport<Channel = C>>(
        &mut self,
        transport: &mut T,
        delta: Duration,
        notifier: &mut Notifier,
    ) -> Result<TickOutcome> {
        let (transfer_id, sender) = match &self.transfer {
            Some(transfer) => (transfer.id, transfer.sender),
            None => return Ok(TickOutcome::Idle),
        };

        if !self.gate.advance(delta) {
            self.stats.throttled_ticks += 1;
            return Ok(TickOutcome::Throttled);
        }

        if self.awaiting_ack.is_some() {
            self.prune_departed_peers(transport);
            if let Some(pending) = &self.awaiting_ack {
                trace!(
                    "ACK 대기 중: transfer={}, seq={}, 남은 수신자 {}",
                    pending.transfer_id,
                    pending.sequence,
                    pending.waiting.len()
                );
                return Ok(TickOutcome::AwaitingAck);
            }
        }

        let route = match resolve_route(transport, sender.direction()) {
            Ok(route) => route,
            Err(reason) => {
                if matches!(self.state, PumpState::PendingTransport(_)) {
                    debug!("전송 {} 보류 중: {}", transfer_id, reason);
                } else {
                    warn!(
                        "보낼 데이터가 있지만 전송 계층 없음 ({}), 송신 보류: transfer={}",
                        reason, transfer_id
                    );
                }
                self.state = PumpState::PendingTransport(reason);
                self.stats.pending_ticks += 1;
                return Ok(TickOutcome::Pending(reason));
            }
        };

        if let PumpState::PendingTransport(reason) = self.state {
            info!("전송 계층 해석됨 (이전: {}), 전송 {} 재개", reason, transfer_id);
        }
        self.state = PumpState::Sending;

        sender.check_route(&route)?;

        let start = read_signal(transport, &route);
        let mut dispatched = 0;
        let mut completed = false;

        match self.config.pacing {
            Pacing::Threshold(policy) => {
                let limit = policy.limit(start, self.splitter.max_chunk_length());
                while !completed {
                    // 카운터가 늦게 반영되는 전송 계층도 넘치지 않도록 직접 센 값과 비교
                    let outstanding = read_signal(transport, &route)
                        .outstanding
                        .max(start.outstanding + dispatched);
                    if outstanding >= limit {
                        break;
                    }
                    completed = self.dispatch_next(transport, &route, notifier)?;
                    dispatched += 1;
                }
            }
            Pacing::StopAndWait => {
                completed = self.dispatch_next(transport, &route, notifier)?;
                dispatched = 1;
            }
        }

        if dispatched > 0 {
            self.gate.mark_sent();
        }

        if completed {
            self.finish_transfer();
            return Ok(TickOutcome::Completed { chunks: dispatched });
        }

        if dispatched == 0 {
            trace!(
                "버퍼 여유 없음: outstanding={}, capacity={}",
                start.outstanding,
                start.capacity
            );
            return Ok(TickOutcome::Saturated);
        }

        Ok(TickOutcome::Sent { chunks: dispatched })
    }

    /// 청크 하나 송신, 마지막 청크였으면 true
    fn dispatch_next<T: Transport<Channel = C>>(
        &mut self,
        transport: &mut T,
        route: &Route<C>,
        notifier: &mut Notifier,
    ) -> Result<bool> {
        let transfer = match self.transfer.as_mut() {
            Some(transfer) => transfer,
            None => return Ok(true),
        };
        let data = match self.queue.dequeue() {
            Some(data) => data,
            None => return Ok(true),
        };

        // 큐가 비었으면 마지막 청크
        let is_final = self.queue.is_empty();
        let chunk = Chunk {
            transfer_id: transfer.id,
            sequence: transfer.next_sequence,
            is_final,
            data,
        };

        let frame = Message::Chunk(ChunkMessage::from(&chunk)).to_bytes()?;
        let recipients = transfer.sender.dispatch(transport, route, frame)?;

        transfer.next_sequence += 1;
        transfer.bytes_sent += chunk.len();
        if self.config.uses_acks() {
            self.awaiting_ack = Some(PendingAck {
                transfer_id: chunk.transfer_id,
                sequence: chunk.sequence,
                direction: transfer.sender.direction(),
                waiting: route.channels().iter().cloned().collect(),
            });
        }

        self.stats.chunks_sent += 1;
        self.stats.bytes_sent += chunk.len() as u64;

        debug!(
            "청크 송신: transfer={}, seq={}, {} bytes, 수신자 {}, 남은 청크 {}",
            chunk.transfer_id,
            chunk.sequence,
            chunk.len(),
            recipients,
            self.queue.len()
        );

        notifier.emit_chunk_sent(&ChunkSent {
            transfer_id: chunk.transfer_id,
            bytes_sent: transfer.bytes_sent,
            total_bytes: transfer.total_bytes,
            is_final,
            chunk: chunk.data,
        });

        Ok(is_final)
    }

    fn finish_transfer(&mut self) {
        if let Some(transfer) = self.transfer.take() {
            info!(
                "전송 {} 송신 완료: {} bytes, {} 청크",
                transfer.id, transfer.bytes_sent, transfer.next_sequence
            );
            self.stats.transfers_completed += 1;
        }
        self.state = PumpState::Idle;
    }

    /// stop-and-wait ACK 처리
    ///
    /// 브로드캐스트 청크는 모든 수신자가 ACK해야 다음 청크로 넘어간다.
    pub fn on_ack(&mut self, from: &C, ack: AckMessage) -> Result<()> {
        let got = (ack.transfer_id, ack.sequence);
        if let Some(pending) = self.awaiting_ack.as_mut() {
            if pending.key() == got && pending.waiting.remove(from) {
                trace!(
                    "ACK 수신: transfer={}, seq={}, from={:?}, 남은 수신자 {}",
                    got.0,
                    got.1,
                    from,
                    pending.waiting.len()
                );
                if pending.waiting.is_empty() {
                    self.awaiting_ack = None;
                }
                return Ok(());
            }
        }

        self.stats.rejected_frames += 1;
        self.config.strictness.enforce(Error::UnexpectedAck {
            expected: self.awaiting_ack.as_ref().map(PendingAck::key),
            got,
        })
    }

    /// 경로에서 빠진 수신자는 더 이상 ACK를 기다리지 않음
    fn prune_departed_peers<T: Transport<Channel = C>>(&mut self, transport: &mut T) {
        let Some(pending) = self.awaiting_ack.as_mut() else {
            return;
        };
        // 경로를 못 찾으면 기존 수신자 모두 이탈한 것으로 봄
        let route =
            resolve_route(transport, pending.direction).unwrap_or(Route::Broadcast(Vec::new()));

        let before = pending.waiting.len();
        pending
            .waiting
            .retain(|channel| route.channels().contains(channel));
        if pending.waiting.len() != before {
            warn!(
                "ACK 대기 중 수신자 {}개 이탈: transfer={}, seq={}",
                before - pending.waiting.len(),
                pending.transfer_id,
                pending.sequence
            );
        }
        if pending.waiting.is_empty() {
            self.awaiting_ack = None;
        }
    }

    /// 송신 큐에 남은 청크가 있는지
    pub fn have_something_to_send(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.transfer.is_none()
    }

    /// 현재 전송 진행 상황
    pub fn progress(&self) -> Option<Progress> {
        self.transfer.as_ref().map(|transfer| Progress {
            transfer_id: transfer.id,
            bytes_sent: transfer.bytes_sent,
            remaining_bytes: self.queue.remaining_bytes(),
            remaining_chunks: self.queue.len(),
            total_bytes: transfer.total_bytes,
        })
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// 방향에 맞는 경로 해석 (피어 없는 브로드캐스트는 보류)
fn resolve_route<T: Transport>(
    transport: &mut T,
    direction: Direction,
) -> std::result::Result<Route<T::Channel>, PendingReason> {
    match transport.resolve(direction.selector()) {
        Resolution::Unresolved(reason) => Err(reason),
        Resolution::Resolved(Route::Broadcast(channels)) if channels.is_empty() => {
            Err(PendingReason::NoPeers)
        }
        Resolution::Resolved(route) => Ok(route),
    }
}

/// 경로의 흐름 제어 신호 (여러 채널이면 가장 막힌 쪽)
fn read_signal<T: Transport>(transport: &T, route: &Route<T::Channel>) -> FlowControlSignal {
    route
        .channels()
        .iter()
        .map(|channel| FlowControlSignal::new(transport.outstanding(channel), transport.capacity(channel)))
        .reduce(FlowControlSignal::tightest)
        .unwrap_or(FlowControlSignal::new(0, 0))
}
