//! 진행/완료 알림
//!
//! 등록 순서대로 동기 호출되는 관찰자 목록.

use bytes::Bytes;

use crate::chunk::TransferId;

/// 청크 송신 이벤트
#[derive(Debug, Clone)]
pub struct ChunkSent {
    pub transfer_id: TransferId,

    /// 방금 보낸 청크 데이터
    pub chunk: Bytes,

    /// 지금까지 보낸 바이트 (이 청크 포함)
    pub bytes_sent: usize,

    /// 전송 총 바이트
    pub total_bytes: usize,

    pub is_final: bool,
}

/// 관찰자 등록 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ChunkSentObserver = Box<dyn FnMut(&ChunkSent) + Send>;
type CompleteObserver = Box<dyn FnMut(&Bytes) + Send>;

/// 관찰자 레지스트리
#[derive(Default)]
pub struct Notifier {
    next_id: u64,
    chunk_sent: Vec<(SubscriptionId, ChunkSentObserver)>,
    transfer_complete: Vec<(SubscriptionId, CompleteObserver)>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    /// 청크 송신 관찰자 등록
    pub fn on_chunk_sent<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&ChunkSent) + Send + 'static,
    {
        let id = self.allocate_id();
        self.chunk_sent.push((id, Box::new(observer)));
        id
    }

    /// 전체 수신 완료 관찰자 등록
    pub fn on_transfer_complete<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&Bytes) + Send + 'static,
    {
        let id = self.allocate_id();
        self.transfer_complete.push((id, Box::new(observer)));
        id
    }

    /// 등록 해제, 찾았으면 true
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.chunk_sent.len() + self.transfer_complete.len();
        self.chunk_sent.retain(|(sub, _)| *sub != id);
        self.transfer_complete.retain(|(sub, _)| *sub != id);
        before != self.chunk_sent.len() + self.transfer_complete.len()
    }

    pub fn observer_count(&self) -> usize {
        self.chunk_sent.len() + self.transfer_complete.len()
    }

    pub(crate) fn emit_chunk_sent(&mut self, event: &ChunkSent) {
        for (_, observer) in self.chunk_sent.iter_mut() {
            observer(event);
        }
    }

    pub(crate) fn emit_transfer_complete(&mut self, payload: &Bytes) {
        for (_, observer) in self.transfer_complete.iter_mut() {
            observer(payload);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("chunk_sent", &self.chunk_sent.len())
            .field("transfer_complete", &self.transfer_complete.len())
            .finish()
    }
}
