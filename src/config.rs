//! 프로토콜 설정

use std::time::Duration;

use crate::flow::{Pacing, ThresholdPolicy};
use crate::{Error, Result, DEFAULT_MAX_CHUNK_LENGTH, LEGACY_MAX_CHUNK_LENGTH};

/// 전제 조건 위반 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// 에러 반환
    #[default]
    Strict,

    /// 경고 로그 후 무시
    Permissive,
}

impl Strictness {
    /// 위반을 에러로 돌려주거나 경고만 남김
    pub fn enforce(self, violation: Error) -> Result<()> {
        match self {
            Strictness::Strict => Err(violation),
            Strictness::Permissive => {
                tracing::warn!("전제 조건 위반 무시: {}", violation);
                Ok(())
            }
        }
    }
}

/// LDT 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 청크 최대 크기 (바이트)
    pub max_chunk_length: usize,

    /// 송신 속도 조절 방식
    pub pacing: Pacing,

    /// 최소 송신 간격
    /// None이면 버퍼 여유만 보고 매 tick 전송
    pub min_send_interval: Option<Duration>,

    /// 수신/ACK 전제 조건 위반 처리
    pub strictness: Strictness,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_chunk_length: DEFAULT_MAX_CHUNK_LENGTH,
            pacing: Pacing::Threshold(ThresholdPolicy::Margin {
                fraction: 0.5,
                margin_unit: 1000,
            }),
            min_send_interval: Some(Duration::from_millis(200)), // 초당 5회
            strictness: Strictness::Strict,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기 배포용 설정 (60KiB 청크, tick당 최대 10개, 간격 제한 없음)
    pub fn legacy() -> Self {
        Self {
            max_chunk_length: LEGACY_MAX_CHUNK_LENGTH,
            pacing: Pacing::Threshold(ThresholdPolicy::Burst {
                fraction: 0.1,
                burst: 10,
            }),
            min_send_interval: None,
            strictness: Strictness::Strict,
        }
    }

    /// 버퍼 절반 + 200ms 간격 설정
    pub fn throttled() -> Self {
        Self::default()
    }

    /// ACK 기반 stop-and-wait 설정
    pub fn stop_and_wait() -> Self {
        Self {
            pacing: Pacing::StopAndWait,
            min_send_interval: None,
            ..Self::default()
        }
    }

    pub fn with_max_chunk_length(mut self, max_chunk_length: usize) -> Self {
        self.max_chunk_length = max_chunk_length;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_min_send_interval(mut self, interval: Option<Duration>) -> Self {
        self.min_send_interval = interval;
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// ACK 사용 여부
    pub fn uses_acks(&self) -> bool {
        matches!(self.pacing, Pacing::StopAndWait)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_length == 0 {
            return Err(Error::InvalidChunkLength {
                length: self.max_chunk_length,
            });
        }
        if self.max_chunk_length > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "max_chunk_length가 너무 큼: {}",
                self.max_chunk_length
            )));
        }
        if let Pacing::Threshold(policy) = &self.pacing {
            policy.validate().map_err(Error::InvalidConfig)?;
        }
        if self.min_send_interval == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig(
                "min_send_interval은 0일 수 없음 (None 사용)".into(),
            ));
        }
        Ok(())
    }
}
