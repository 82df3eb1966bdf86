//! 외부 전송 계층 인터페이스
//!
//! 신뢰성/순서 보장은 전송 계층의 책임이며, 이 크레이트는
//! 미처리(outstanding) 버퍼가 넘치지 않도록 속도만 조절한다.

use std::fmt;
use std::hash::Hash;

use bytes::Bytes;

/// 채널을 찾을 대상 엔드포인트
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointSelector {
    /// 상위 엔드포인트 (서버)
    Upstream,

    /// 소유 하위 엔드포인트 (소유 클라이언트)
    DownstreamOwner,

    /// 연결된 모든 하위 엔드포인트
    AllDownstream,
}

/// 채널을 아직 찾을 수 없는 이유 (보류 상태, 에러 아님)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReason {
    /// 소유자 없음
    NoOwner,

    /// 연결 없음 (소유자는 있음)
    NoConnection,

    /// 채널 없음 (소유자와 연결은 있음)
    NoChannel,

    /// 브로드캐스트 대상 피어 없음
    NoPeers,
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PendingReason::NoOwner => "no owner",
            PendingReason::NoConnection => "no connection",
            PendingReason::NoChannel => "no channel",
            PendingReason::NoPeers => "no downstream peers",
        };
        f.write_str(text)
    }
}

/// 채널 해석 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Unresolved(PendingReason),
    Resolved(T),
}

/// 해석된 전송 경로
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<C> {
    /// 단일 피어
    Unicast(C),

    /// 여러 피어 (모두 같은 프레임 수신)
    Broadcast(Vec<C>),
}

impl<C> Route<C> {
    /// 경로에 포함된 채널들
    pub fn channels(&self) -> &[C] {
        match self {
            Route::Unicast(channel) => std::slice::from_ref(channel),
            Route::Broadcast(channels) => channels,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Route::Unicast(_) => "unicast",
            Route::Broadcast(_) => "broadcast",
        }
    }
}

/// 순서 보장 + 신뢰성 있는 전송 계층
///
/// 매 tick마다 [`Transport::resolve`]가 다시 호출되므로
/// 구현체가 오래된 핸들을 넘겨줄 일은 없다.
pub trait Transport {
    /// 피어 식별에도 쓰이므로 키로 사용 가능해야 함
    type Channel: Clone + Eq + Hash + fmt::Debug;

    /// 대상 엔드포인트의 채널 해석
    fn resolve(&mut self, selector: EndpointSelector) -> Resolution<Route<Self::Channel>>;

    /// 채널에서 아직 처리되지 않은 신뢰성 단위 수
    fn outstanding(&self, channel: &Self::Channel) -> usize;

    /// 채널의 최대 미처리 단위 수
    fn capacity(&self, channel: &Self::Channel) -> usize;

    /// 프레임 전송 (fire-and-forget, 순서대로 정확히 한 번 도착한다고 가정)
    fn send_reliable_ordered(&mut self, channel: &Self::Channel, frame: Bytes);
}
