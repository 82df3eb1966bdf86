//! 전송 통계

use std::time::{Duration, Instant};

/// 전체 전송 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 시작된 송신 전송 수
    pub transfers_started: u64,

    /// 마지막 청크까지 보낸 전송 수
    pub transfers_completed: u64,

    /// 보낸 청크 수
    pub chunks_sent: u64,

    /// 보낸 바이트 (청크 데이터 기준)
    pub bytes_sent: u64,

    /// 전송 계층 미해석으로 보류된 tick 수
    pub pending_ticks: u64,

    /// 최소 송신 간격 때문에 건너뛴 tick 수
    pub throttled_ticks: u64,

    /// 받은 청크 수
    pub chunks_received: u64,

    /// 받은 바이트
    pub bytes_received: u64,

    /// 조립 완료된 페이로드 수
    pub payloads_received: u64,

    /// 거부된 프레임 수 (순서 위반, 디코딩 실패, 잘못된 ACK)
    pub rejected_frames: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            transfers_started: 0,
            transfers_completed: 0,
            chunks_sent: 0,
            bytes_sent: 0,
            pending_ticks: 0,
            throttled_ticks: 0,
            chunks_received: 0,
            bytes_received: 0,
            payloads_received: 0,
            rejected_frames: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 송신 처리율 (bytes/sec)
    pub fn send_throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_sent as f64 / elapsed
    }

    /// 수신 처리율 (bytes/sec)
    pub fn receive_throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_received as f64 / elapsed
    }

    /// 다른 통계를 합침 (시작 시간은 더 이른 쪽)
    pub fn merge(&mut self, other: &TransferStats) {
        self.start_time = self.start_time.min(other.start_time);
        self.transfers_started += other.transfers_started;
        self.transfers_completed += other.transfers_completed;
        self.chunks_sent += other.chunks_sent;
        self.bytes_sent += other.bytes_sent;
        self.pending_ticks += other.pending_ticks;
        self.throttled_ticks += other.throttled_ticks;
        self.chunks_received += other.chunks_received;
        self.bytes_received += other.bytes_received;
        self.payloads_received += other.payloads_received;
        self.rejected_frames += other.rejected_frames;
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Transfers: {}/{} | Sent: {} chunks, {} bytes ({:.2} MB/s) | Received: {} chunks, {} bytes ({:.2} MB/s), {} payloads | Pending ticks: {} | Throttled ticks: {} | Rejected: {}",
            self.elapsed().as_secs_f64(),
            self.transfers_completed,
            self.transfers_started,
            self.chunks_sent,
            self.bytes_sent,
            self.send_throughput() / 1_000_000.0,
            self.chunks_received,
            self.bytes_received,
            self.receive_throughput() / 1_000_000.0,
            self.payloads_received,
            self.pending_ticks,
            self.throttled_ticks,
            self.rejected_frames,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}
