//! 흐름 제어
//!
//! 전송 계층의 미처리 단위 수를 기준으로 이번 tick에 몇 개의 청크를
//! 내보낼 수 있는지 계산한다. 혼잡제어는 하지 않는다.

use std::time::Duration;

/// 전송 계층에서 매 tick 새로 읽는 값
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControlSignal {
    /// 아직 처리되지 않은 신뢰성 단위 수
    pub outstanding: usize,

    /// 전송 계층의 최대 미처리 단위 수
    pub capacity: usize,
}

impl FlowControlSignal {
    pub fn new(outstanding: usize, capacity: usize) -> Self {
        Self {
            outstanding,
            capacity,
        }
    }

    /// 두 채널 중 여유가 더 적은 쪽으로 합침 (브로드캐스트용)
    pub fn tightest(self, other: Self) -> Self {
        Self {
            outstanding: self.outstanding.max(other.outstanding),
            capacity: self.capacity.min(other.capacity),
        }
    }
}

/// 입장 임계값 정책
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdPolicy {
    /// min(시작 시 미처리 수 + burst, capacity × fraction)
    Burst { fraction: f64, burst: usize },

    /// 미처리 수 + max_chunk_length / margin_unit < capacity × fraction
    Margin { fraction: f64, margin_unit: usize },
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::Margin {
            fraction: 0.5,
            margin_unit: 1000,
        }
    }
}

impl ThresholdPolicy {
    /// 한 tick 동안의 한도: 미처리 수가 이 값보다 작을 때만 청크 전송
    pub fn limit(&self, start: FlowControlSignal, max_chunk_length: usize) -> usize {
        match *self {
            ThresholdPolicy::Burst { fraction, burst } => {
                let ceiling = (start.capacity as f64 * fraction) as usize;
                (start.outstanding + burst).min(ceiling)
            }
            ThresholdPolicy::Margin {
                fraction,
                margin_unit,
            } => {
                let ceiling = (start.capacity as f64 * fraction) as usize;
                let margin = max_chunk_length / margin_unit.max(1);
                ceiling.saturating_sub(margin)
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let fraction = match *self {
            ThresholdPolicy::Burst { fraction, .. } => fraction,
            ThresholdPolicy::Margin {
                fraction,
                margin_unit,
            } => {
                if margin_unit == 0 {
                    return Err("margin_unit은 0보다 커야 함".into());
                }
                fraction
            }
        };
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(format!("fraction 범위 오류: {fraction}"));
        }
        Ok(())
    }
}

/// 송신 속도 조절 방식
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// 버퍼 점유율 임계값 기반
    Threshold(ThresholdPolicy),

    /// 청크마다 ACK를 기다림 (최대 1개 in-flight)
    StopAndWait,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Threshold(ThresholdPolicy::default())
    }
}

/// 최소 송신 간격 게이트
///
/// 누적 시간은 간격에서 잘리고, 청크를 하나라도 보낸 tick에서 0으로 돌아간다.
#[derive(Debug, Clone)]
pub struct SendGate {
    min_interval: Option<Duration>,
    since_last_send: Duration,
}

impl SendGate {
    pub fn new(min_interval: Option<Duration>) -> Self {
        Self {
            min_interval,
            since_last_send: Duration::ZERO,
        }
    }

    /// 시간 경과 반영 후 송신 가능 여부 반환
    pub fn advance(&mut self, delta: Duration) -> bool {
        match self.min_interval {
            None => true,
            Some(interval) => {
                self.since_last_send = (self.since_last_send + delta).min(interval);
                self.since_last_send >= interval
            }
        }
    }

    pub fn mark_sent(&mut self) {
        self.since_last_send = Duration::ZERO;
    }

    pub fn since_last_send(&self) -> Duration {
        self.since_last_send
    }
}
