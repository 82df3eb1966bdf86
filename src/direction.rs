//! 전송 방향과 방향별 송신기
//!
//! - ToUpstream: 서버로
//! - ToDownstreamOwner: 소유 클라이언트로
//! - ToAllDownstream: 모든 클라이언트로 (브로드캐스트)

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::transport::{EndpointSelector, Route, Transport};
use crate::{Error, Result};

/// 전송 방향 (한 전송 동안 고정)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ToUpstream,
    ToDownstreamOwner,
    ToAllDownstream,
}

impl Direction {
    /// 이 방향이 사용할 엔드포인트
    pub fn selector(self) -> EndpointSelector {
        match self {
            Direction::ToUpstream => EndpointSelector::Upstream,
            Direction::ToDownstreamOwner => EndpointSelector::DownstreamOwner,
            Direction::ToAllDownstream => EndpointSelector::AllDownstream,
        }
    }

    pub fn is_broadcast(self) -> bool {
        matches!(self, Direction::ToAllDownstream)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Direction::ToUpstream => "upstream",
            Direction::ToDownstreamOwner => "owner",
            Direction::ToAllDownstream => "all",
        };
        f.write_str(text)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "upstream" | "server" => Ok(Direction::ToUpstream),
            "owner" | "client" => Ok(Direction::ToDownstreamOwner),
            "all" | "multicast" => Ok(Direction::ToAllDownstream),
            other => Err(format!("알 수 없는 방향: {other}")),
        }
    }
}

/// 방향별 송신기
///
/// 단일 피어 방향은 `Route::Unicast`, 브로드캐스트는 `Route::Broadcast`와만 짝이 맞는다.
#[derive(Debug, Clone, Copy)]
pub struct DirectionalSender {
    direction: Direction,
}

impl DirectionalSender {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// 경로 종류가 방향과 맞는지 확인
    pub fn check_route<C>(&self, route: &Route<C>) -> Result<()> {
        match (self.direction.is_broadcast(), route) {
            (false, Route::Unicast(_)) | (true, Route::Broadcast(_)) => Ok(()),
            _ => Err(Error::RouteMismatch {
                direction: self.direction,
                route: route.kind(),
            }),
        }
    }

    /// 프레임을 경로로 전송, 수신자 수 반환
    pub fn dispatch<T: Transport>(
        &self,
        transport: &mut T,
        route: &Route<T::Channel>,
        frame: Bytes,
    ) -> Result<usize> {
        match (self.direction, route) {
            (Direction::ToUpstream, Route::Unicast(channel))
            | (Direction::ToDownstreamOwner, Route::Unicast(channel)) => {
                transport.send_reliable_ordered(channel, frame);
                Ok(1)
            }
            (Direction::ToAllDownstream, Route::Broadcast(channels)) => {
                for channel in channels {
                    transport.send_reliable_ordered(channel, frame.clone());
                }
                Ok(channels.len())
            }
            (direction, route) => Err(Error::RouteMismatch {
                direction,
                route: route.kind(),
            }),
        }
    }
}
