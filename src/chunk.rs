//! 청크 정의와 분할기
//!
//! - Transfer: 한 방향으로 옮기는 하나의 논리 페이로드
//! - Chunk: 전송 계층 메시지 한 개에 들어가는 조각 (<= max_chunk_length)

use bytes::Bytes;

use crate::{Error, Result};

/// 전송 ID (송신자 단위로 1부터 증가)
pub type TransferId = u64;

/// 청크 순번 (전송 내 인덱스)
pub type ChunkSeq = u32;

/// 송신된 청크 (디스패치 시점에 만들어짐)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 소속 전송 ID
    pub transfer_id: TransferId,

    /// 전송 내 순번
    pub sequence: ChunkSeq,

    /// 마지막 청크 여부 (디큐 시점에 큐가 비었으면 true)
    pub is_final: bool,

    /// 실제 데이터
    pub data: Bytes,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 청크 분할기 (송신측)
#[derive(Debug, Clone, Copy)]
pub struct ChunkSplitter {
    max_chunk_length: usize,
}

impl ChunkSplitter {
    pub fn new(max_chunk_length: usize) -> Result<Self> {
        if max_chunk_length == 0 {
            return Err(Error::InvalidChunkLength {
                length: max_chunk_length,
            });
        }
        Ok(Self { max_chunk_length })
    }

    pub fn max_chunk_length(&self) -> usize {
        self.max_chunk_length
    }

    /// 페이로드에 필요한 청크 수
    ///
    /// 빈 페이로드도 빈 마지막 청크 하나로 보낸다.
    pub fn chunk_count(&self, payload_len: usize) -> usize {
        payload_len.div_ceil(self.max_chunk_length).max(1)
    }

    /// 페이로드를 순서대로 청크 분할 (복사 없이 slice)
    pub fn split(&self, payload: Bytes) -> Vec<Bytes> {
        if payload.is_empty() {
            return vec![Bytes::new()];
        }

        let mut chunks = Vec::with_capacity(self.chunk_count(payload.len()));
        let mut offset = 0;
        while offset < payload.len() {
            let end = (offset + self.max_chunk_length).min(payload.len());
            chunks.push(payload.slice(offset..end));
            offset = end;
        }
        chunks
    }
}
