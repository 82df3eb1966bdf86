//! 송신 큐
//!
//! 현재 전송의 남은 청크를 FIFO로 보관한다. 각 청크는 정확히 한 번 소비된다.

use std::collections::VecDeque;

use bytes::Bytes;

/// 송신 대기 청크 큐
#[derive(Debug, Default)]
pub struct SendQueue {
    chunks: VecDeque<Bytes>,

    /// 큐에 남은 총 바이트
    remaining_bytes: usize,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, chunk: Bytes) {
        self.remaining_bytes += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// 맨 앞 청크 꺼내기 (비어 있으면 None, 에러 아님)
    pub fn dequeue(&mut self) -> Option<Bytes> {
        let chunk = self.chunks.pop_front()?;
        self.remaining_bytes -= chunk.len();
        Some(chunk)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn remaining_bytes(&self) -> usize {
        self.remaining_bytes
    }
}

impl Extend<Bytes> for SendQueue {
    fn extend<I: IntoIterator<Item = Bytes>>(&mut self, iter: I) {
        for chunk in iter {
            self.enqueue(chunk);
        }
    }
}
