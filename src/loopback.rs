//! 메모리 내 루프백 전송 계층
//!
//! 서버 1개(엔드포인트 0)와 여러 클라이언트를 흉내 낸다.
//! 보낸 프레임은 `drain`으로 배달되기 전까지 미처리 단위로 남는다.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::transport::{EndpointSelector, PendingReason, Resolution, Route, Transport};

/// 엔드포인트 ID
pub type EndpointId = usize;

/// 서버 엔드포인트 ID
pub const SERVER: EndpointId = 0;

/// 배달된 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: EndpointId,
    pub to: EndpointId,
    pub frame: Bytes,
}

/// 루프백 네트워크 상태
#[derive(Debug)]
pub struct LoopbackNet {
    /// 링크당 최대 미처리 프레임 수
    capacity: usize,

    /// 연결된 클라이언트
    clients: BTreeSet<EndpointId>,

    /// 소유 클라이언트
    owner: Option<EndpointId>,

    /// (from, to) -> 배달 대기 프레임
    links: BTreeMap<(EndpointId, EndpointId), VecDeque<Bytes>>,

    /// 한 링크에서 관측된 최대 미처리 수
    peak_outstanding: usize,
}

impl LoopbackNet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clients: BTreeSet::new(),
            owner: None,
            links: BTreeMap::new(),
            peak_outstanding: 0,
        }
    }

    /// 공유 핸들로 감싸기
    pub fn shared(capacity: usize) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    pub fn connect(&mut self, client: EndpointId) {
        if client != SERVER {
            self.clients.insert(client);
        }
    }

    /// 연결 끊기 (배달 대기 프레임도 버림)
    pub fn disconnect(&mut self, client: EndpointId) {
        self.clients.remove(&client);
        self.links
            .retain(|(from, to), _| *from != client && *to != client);
    }

    pub fn set_owner(&mut self, client: Option<EndpointId>) {
        self.owner = client;
    }

    pub fn outstanding_on(&self, from: EndpointId, to: EndpointId) -> usize {
        self.links.get(&(from, to)).map_or(0, VecDeque::len)
    }

    pub fn peak_outstanding(&self) -> usize {
        self.peak_outstanding
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 링크마다 최대 `per_link`개 배달 (배달된 프레임은 미처리에서 빠짐)
    pub fn drain(&mut self, per_link: usize) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for (&(from, to), queue) in self.links.iter_mut() {
            let count = per_link.min(queue.len());
            deliveries.extend(queue.drain(..count).map(|frame| Delivery { from, to, frame }));
        }
        deliveries
    }

    /// 한 링크에서만 최대 `max`개 배달
    pub fn drain_link(&mut self, from: EndpointId, to: EndpointId, max: usize) -> Vec<Delivery> {
        match self.links.get_mut(&(from, to)) {
            Some(queue) => {
                let count = max.min(queue.len());
                queue
                    .drain(..count)
                    .map(|frame| Delivery { from, to, frame })
                    .collect()
            }
            None => Vec::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.links.values().all(VecDeque::is_empty)
    }

    fn resolve_for(
        &self,
        id: EndpointId,
        selector: EndpointSelector,
    ) -> Resolution<Route<EndpointId>> {
        match selector {
            EndpointSelector::Upstream => {
                if id != SERVER && self.clients.contains(&id) {
                    Resolution::Resolved(Route::Unicast(SERVER))
                } else {
                    Resolution::Unresolved(PendingReason::NoConnection)
                }
            }
            EndpointSelector::DownstreamOwner => {
                if id != SERVER {
                    return Resolution::Unresolved(PendingReason::NoChannel);
                }
                match self.owner {
                    None => Resolution::Unresolved(PendingReason::NoOwner),
                    Some(owner) if self.clients.contains(&owner) => {
                        Resolution::Resolved(Route::Unicast(owner))
                    }
                    Some(_) => Resolution::Unresolved(PendingReason::NoConnection),
                }
            }
            EndpointSelector::AllDownstream => {
                if id != SERVER {
                    return Resolution::Unresolved(PendingReason::NoChannel);
                }
                Resolution::Resolved(Route::Broadcast(self.clients.iter().copied().collect()))
            }
        }
    }

    fn push(&mut self, from: EndpointId, to: EndpointId, frame: Bytes) {
        if to != SERVER && !self.clients.contains(&to) {
            return;
        }
        let queue = self.links.entry((from, to)).or_default();
        queue.push_back(frame);
        self.peak_outstanding = self.peak_outstanding.max(queue.len());
    }
}

/// 한 엔드포인트에서 본 루프백 전송 계층
#[derive(Debug, Clone)]
pub struct LoopbackPort {
    net: Arc<Mutex<LoopbackNet>>,
    id: EndpointId,
}

impl LoopbackPort {
    pub fn new(net: Arc<Mutex<LoopbackNet>>, id: EndpointId) -> Self {
        Self { net, id }
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }
}

impl Transport for LoopbackPort {
    type Channel = EndpointId;

    fn resolve(&mut self, selector: EndpointSelector) -> Resolution<Route<EndpointId>> {
        self.net.lock().resolve_for(self.id, selector)
    }

    fn outstanding(&self, channel: &EndpointId) -> usize {
        self.net.lock().outstanding_on(self.id, *channel)
    }

    fn capacity(&self, _channel: &EndpointId) -> usize {
        self.net.lock().capacity
    }

    fn send_reliable_ordered(&mut self, channel: &EndpointId, frame: Bytes) {
        self.net.lock().push(self.id, *channel, frame);
    }
}
