//! 루프백 네트워크 위에서 송수신기 두 개 이상을 직접 tick하는 통합 테스트

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use ldt::loopback::{Delivery, EndpointId, LoopbackNet, LoopbackPort, SERVER};
use ldt::{
    Config, Direction, Error, Pacing, PendingReason, PumpState, Strictness, ThresholdPolicy,
    TickOutcome, Transceiver,
};

const TICK: Duration = Duration::from_millis(10);

struct Node {
    transceiver: Transceiver<EndpointId>,
    port: LoopbackPort,
    completed: Arc<Mutex<Vec<Bytes>>>,
}

struct Harness {
    net: Arc<Mutex<LoopbackNet>>,
    nodes: Vec<Node>,
}

impl Harness {
    fn new(config: Config, clients: usize, capacity: usize) -> Self {
        let net = LoopbackNet::shared(capacity);
        for client in 1..=clients {
            net.lock().connect(client);
        }

        let nodes = (0..=clients)
            .map(|id| {
                let mut transceiver = Transceiver::new(config.clone()).unwrap();
                let completed = Arc::new(Mutex::new(Vec::new()));
                let sink = completed.clone();
                transceiver.on_transfer_complete(move |payload| sink.lock().push(payload.clone()));
                Node {
                    transceiver,
                    port: LoopbackPort::new(net.clone(), id),
                    completed,
                }
            })
            .collect();

        Self { net, nodes }
    }

    fn tick(&mut self, id: EndpointId) -> TickOutcome {
        let Node {
            transceiver, port, ..
        } = &mut self.nodes[id];
        transceiver.tick(port, TICK).unwrap()
    }

    /// 링크마다 최대 `per_link`개 배달, 배달한 프레임 수 반환
    fn deliver(&mut self, per_link: usize) -> usize {
        let deliveries = self.net.lock().drain(per_link);
        self.dispatch(deliveries)
    }

    /// 한 링크에서만 배달
    fn deliver_link(&mut self, from: EndpointId, to: EndpointId, max: usize) -> usize {
        let deliveries = self.net.lock().drain_link(from, to, max);
        self.dispatch(deliveries)
    }

    fn dispatch(&mut self, deliveries: Vec<Delivery>) -> usize {
        let count = deliveries.len();
        for delivery in deliveries {
            let Node {
                transceiver, port, ..
            } = &mut self.nodes[delivery.to];
            transceiver
                .on_frame_received(port, &delivery.from, &delivery.frame)
                .unwrap();
        }
        count
    }

    fn completed(&self, id: EndpointId) -> Vec<Bytes> {
        self.nodes[id].completed.lock().clone()
    }

    /// 송신 완료 + 모든 프레임 배달까지 반복
    fn run_until_idle(&mut self, source: EndpointId, per_link: usize, max_rounds: usize) {
        for _ in 0..max_rounds {
            self.tick(source);
            self.deliver(per_link);
            if self.nodes[source].transceiver.progress().is_none() && self.net.lock().is_idle() {
                return;
            }
        }
        panic!("전송이 {} 라운드 안에 끝나지 않음", max_rounds);
    }
}

fn no_interval() -> Config {
    Config::new().with_min_send_interval(None)
}

fn pattern(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

#[test]
fn test_large_payload_split_and_reassembled() {
    let mut harness = Harness::new(no_interval(), 1, 256);

    let sent = Arc::new(Mutex::new(Vec::new()));
    let log = sent.clone();
    harness.nodes[SERVER].transceiver.on_chunk_sent(move |event| {
        log.lock().push((event.chunk.len(), event.is_final));
    });

    let data = pattern(150_000);
    harness.nodes[SERVER]
        .transceiver
        .send_data(data.clone(), Direction::ToAllDownstream)
        .unwrap();

    assert_eq!(harness.tick(SERVER), TickOutcome::Completed { chunks: 3 });
    assert_eq!(
        *sent.lock(),
        vec![(60_000, false), (60_000, false), (30_000, true)]
    );

    assert_eq!(harness.deliver(16), 3);
    assert_eq!(harness.completed(1), vec![data]);

    // 추가 tick에서 중복 완료 없음
    assert_eq!(harness.tick(SERVER), TickOutcome::Idle);
    assert_eq!(harness.deliver(16), 0);
    assert_eq!(harness.completed(1).len(), 1);
}

#[test]
fn test_empty_payload_delivers_empty_completion() {
    let mut harness = Harness::new(no_interval(), 1, 256);

    harness.nodes[SERVER]
        .transceiver
        .send_data(Bytes::new(), Direction::ToAllDownstream)
        .unwrap();

    assert_eq!(harness.tick(SERVER), TickOutcome::Completed { chunks: 1 });
    harness.deliver(16);

    let completed = harness.completed(1);
    assert_eq!(completed.len(), 1);
    assert!(completed[0].is_empty());
}

#[test]
fn test_broadcast_reaches_every_client() {
    let mut harness = Harness::new(no_interval().with_max_chunk_length(4_000), 3, 64);

    let data = pattern(50_000);
    harness.nodes[SERVER]
        .transceiver
        .send_data(data.clone(), Direction::ToAllDownstream)
        .unwrap();
    harness.run_until_idle(SERVER, 4, 1_000);

    for client in 1..=3 {
        assert_eq!(harness.completed(client), vec![data.clone()]);
    }
    let stats = harness.nodes[SERVER].transceiver.stats();
    assert_eq!(stats.chunks_sent, 13);
    assert_eq!(stats.transfers_completed, 1);
}

#[test]
fn test_owner_pending_until_resolved() {
    let mut harness = Harness::new(no_interval(), 2, 256);

    let data = pattern(100_000);
    harness.nodes[SERVER]
        .transceiver
        .send_data(data.clone(), Direction::ToDownstreamOwner)
        .unwrap();

    for _ in 0..3 {
        assert_eq!(
            harness.tick(SERVER),
            TickOutcome::Pending(PendingReason::NoOwner)
        );
    }
    assert_eq!(
        harness.nodes[SERVER].transceiver.pump_state(),
        PumpState::PendingTransport(PendingReason::NoOwner)
    );
    let progress = harness.nodes[SERVER].transceiver.progress().unwrap();
    assert_eq!(progress.bytes_sent, 0);
    assert_eq!(progress.remaining_chunks, 2);
    assert_eq!(harness.nodes[SERVER].transceiver.stats().pending_ticks, 3);

    harness.net.lock().set_owner(Some(2));
    assert_eq!(harness.tick(SERVER), TickOutcome::Completed { chunks: 2 });
    assert_eq!(harness.nodes[SERVER].transceiver.pump_state(), PumpState::Idle);
    harness.deliver(16);

    assert_eq!(harness.completed(2), vec![data]);
    assert!(harness.completed(1).is_empty());
}

#[test]
fn test_broadcast_without_clients_is_pending() {
    let mut harness = Harness::new(no_interval(), 0, 256);

    harness.nodes[SERVER]
        .transceiver
        .send_data(pattern(10), Direction::ToAllDownstream)
        .unwrap();

    assert_eq!(
        harness.tick(SERVER),
        TickOutcome::Pending(PendingReason::NoPeers)
    );
    assert!(harness.nodes[SERVER].transceiver.have_something_to_send());
}

#[test]
fn test_upstream_from_client() {
    let mut harness = Harness::new(no_interval().with_max_chunk_length(1_000), 2, 64);

    let data = pattern(7_500);
    harness.nodes[2]
        .transceiver
        .send_data(data.clone(), Direction::ToUpstream)
        .unwrap();
    harness.run_until_idle(2, 4, 100);

    assert_eq!(harness.completed(SERVER), vec![data]);
    assert!(harness.completed(1).is_empty());
}

#[test]
fn test_outstanding_stays_below_threshold() {
    // capacity 64, 1000바이트 청크 → 한도 64 × 0.5 - 1 = 31
    let mut harness = Harness::new(no_interval().with_max_chunk_length(1_000), 1, 64);

    let data = pattern(200_000);
    harness.nodes[SERVER]
        .transceiver
        .send_data(data.clone(), Direction::ToAllDownstream)
        .unwrap();

    // 두 tick에 한 번만 배달해서 한도에 걸리게 함
    let mut saturated = 0;
    for round in 0..1_000 {
        if harness.tick(SERVER) == TickOutcome::Saturated {
            saturated += 1;
        }
        assert!(harness.net.lock().outstanding_on(SERVER, 1) <= 31);
        if round % 2 == 1 {
            harness.deliver(3);
        }
        if harness.nodes[SERVER].transceiver.progress().is_none() && harness.net.lock().is_idle() {
            break;
        }
    }

    assert_eq!(harness.net.lock().peak_outstanding(), 31);
    assert!(saturated > 0);
    assert_eq!(harness.completed(1), vec![data]);
}

#[test]
fn test_burst_policy_limits_each_tick() {
    let config = no_interval()
        .with_max_chunk_length(100)
        .with_pacing(Pacing::Threshold(ThresholdPolicy::Burst {
            fraction: 0.1,
            burst: 10,
        }));
    let mut harness = Harness::new(config, 1, 1_000);

    harness.nodes[SERVER]
        .transceiver
        .send_data(pattern(20_000), Direction::ToAllDownstream)
        .unwrap();

    // 배달 없이 tick: 10개씩 쌓이다가 capacity × 0.1 = 100에서 멈춤
    for round in 1..=10 {
        assert_eq!(harness.tick(SERVER), TickOutcome::Sent { chunks: 10 });
        assert_eq!(harness.net.lock().outstanding_on(SERVER, 1), round * 10);
    }
    assert_eq!(harness.tick(SERVER), TickOutcome::Saturated);
    assert_eq!(harness.net.lock().outstanding_on(SERVER, 1), 100);
}

#[test]
fn test_min_send_interval_throttles() {
    let config = Config::new()
        .with_max_chunk_length(1_000)
        .with_min_send_interval(Some(Duration::from_millis(30)));
    let mut harness = Harness::new(config, 1, 64);

    harness.nodes[SERVER]
        .transceiver
        .send_data(pattern(100_000), Direction::ToAllDownstream)
        .unwrap();

    // 10ms tick, 30ms 간격 → 세 번째 tick에서만 송신
    assert_eq!(harness.tick(SERVER), TickOutcome::Throttled);
    assert_eq!(harness.tick(SERVER), TickOutcome::Throttled);
    assert!(matches!(harness.tick(SERVER), TickOutcome::Sent { .. }));
    assert_eq!(harness.tick(SERVER), TickOutcome::Throttled);
}

#[test]
fn test_progress_accounts_every_byte() {
    let mut harness = Harness::new(no_interval().with_max_chunk_length(3_000), 1, 16);

    let events = Arc::new(Mutex::new(Vec::new()));
    let log = events.clone();
    harness.nodes[SERVER].transceiver.on_chunk_sent(move |event| {
        log.lock().push((event.bytes_sent, event.total_bytes));
    });

    let total = 40_000;
    harness.nodes[SERVER]
        .transceiver
        .send_data(pattern(total), Direction::ToAllDownstream)
        .unwrap();

    for _ in 0..1_000 {
        harness.tick(SERVER);
        match harness.nodes[SERVER].transceiver.progress() {
            Some(progress) => {
                assert_eq!(progress.bytes_sent + progress.remaining_bytes, total);
                assert_eq!(progress.total_bytes, total);
            }
            None => break,
        }
        harness.deliver(2);
    }

    let events = events.lock();
    assert_eq!(events.len(), 14);
    assert!(events.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(events.last(), Some(&(total, total)));
}

#[test]
fn test_second_send_fails_fast() {
    let mut harness = Harness::new(no_interval(), 1, 256);
    let server = &mut harness.nodes[SERVER].transceiver;

    let first = server
        .send_data(pattern(150_000), Direction::ToAllDownstream)
        .unwrap();
    let err = server
        .send_data(pattern(10), Direction::ToAllDownstream)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::TransferInProgress {
            transfer_id,
            remaining_chunks: 3,
        } if transfer_id == first
    ));

    harness.run_until_idle(SERVER, 16, 10);

    let second = harness.nodes[SERVER]
        .transceiver
        .send_data(pattern(10), Direction::ToAllDownstream)
        .unwrap();
    assert_eq!(second, first + 1);
    harness.run_until_idle(SERVER, 16, 10);
    assert_eq!(harness.completed(1).len(), 2);
}

#[test]
fn test_stop_and_wait_one_chunk_in_flight() {
    let config = Config::stop_and_wait().with_max_chunk_length(1_000);
    let mut harness = Harness::new(config, 1, 64);

    let data = pattern(3_500);
    harness.nodes[SERVER]
        .transceiver
        .send_data(data.clone(), Direction::ToAllDownstream)
        .unwrap();

    assert_eq!(harness.tick(SERVER), TickOutcome::Sent { chunks: 1 });
    assert_eq!(harness.tick(SERVER), TickOutcome::AwaitingAck);
    assert_eq!(harness.net.lock().outstanding_on(SERVER, 1), 1);

    // 청크 배달 → ACK가 서버로 돌아감
    harness.deliver(16);
    assert_eq!(harness.net.lock().outstanding_on(1, SERVER), 1);
    harness.deliver(16);

    let mut outcomes = Vec::new();
    for _ in 0..20 {
        outcomes.push(harness.tick(SERVER));
        assert!(harness.net.lock().outstanding_on(SERVER, 1) <= 1);
        harness.deliver(16);
        harness.deliver(16);
        if harness.nodes[SERVER].transceiver.progress().is_none() {
            break;
        }
    }

    assert_eq!(
        outcomes,
        vec![
            TickOutcome::Sent { chunks: 1 },
            TickOutcome::Sent { chunks: 1 },
            TickOutcome::Completed { chunks: 1 },
        ]
    );
    assert_eq!(harness.completed(1), vec![data]);
}

#[test]
fn test_corrupt_frame_rejected_when_strict() {
    let mut harness = Harness::new(no_interval(), 1, 256);
    let Node {
        transceiver, port, ..
    } = &mut harness.nodes[1];

    let err = transceiver
        .on_frame_received(port, &SERVER, b"garbage")
        .unwrap_err();
    assert!(matches!(err, Error::Truncated { got: 7, .. }));
    assert_eq!(transceiver.stats().rejected_frames, 1);
}

#[test]
fn test_corrupt_frame_ignored_when_permissive() {
    let config = no_interval().with_strictness(Strictness::Permissive);
    let mut harness = Harness::new(config, 1, 256);

    let data = pattern(500);
    harness.nodes[SERVER]
        .transceiver
        .send_data(data.clone(), Direction::ToAllDownstream)
        .unwrap();
    harness.tick(SERVER);

    let mut deliveries = harness.net.lock().drain(16);
    assert_eq!(deliveries.len(), 1);
    let good = deliveries.remove(0).frame;
    let mut bad = good.to_vec();
    if let Some(last) = bad.last_mut() {
        *last ^= 0xFF;
    }

    let Node {
        transceiver, port, ..
    } = &mut harness.nodes[1];
    transceiver.on_frame_received(port, &SERVER, &bad).unwrap();
    assert!(harness.completed(1).is_empty());

    let Node {
        transceiver, port, ..
    } = &mut harness.nodes[1];
    transceiver.on_frame_received(port, &SERVER, &good).unwrap();
    assert_eq!(transceiver.stats().rejected_frames, 1);
    assert_eq!(harness.completed(1), vec![data]);
}

#[test]
fn test_raw_chunk_entry_point() {
    let mut harness = Harness::new(no_interval(), 1, 256);
    let client = &mut harness.nodes[1].transceiver;

    client.on_chunk_received(&SERVER, b"hello ", false);
    client.on_chunk_received(&SERVER, b"world", true);

    assert_eq!(harness.completed(1), vec![Bytes::from_static(b"hello world")]);
}

#[test]
fn test_broadcast_paced_by_slowest_client() {
    // capacity 64, 1000바이트 청크 → 한도 31
    let mut harness = Harness::new(no_interval().with_max_chunk_length(1_000), 2, 64);

    let data = pattern(100_000);
    harness.nodes[SERVER]
        .transceiver
        .send_data(data.clone(), Direction::ToAllDownstream)
        .unwrap();

    // 클라이언트 1만 비우고 클라이언트 2는 전혀 비우지 않음
    for _ in 0..20 {
        harness.tick(SERVER);
        assert!(harness.net.lock().outstanding_on(SERVER, 1) <= 31);
        assert!(harness.net.lock().outstanding_on(SERVER, 2) <= 31);
        harness.deliver_link(SERVER, 1, usize::MAX);
    }

    assert_eq!(harness.net.lock().outstanding_on(SERVER, 2), 31);
    assert_eq!(harness.nodes[1].transceiver.stats().chunks_received, 31);
    assert_eq!(
        harness.nodes[SERVER].transceiver.progress().unwrap().remaining_chunks,
        69
    );

    harness.run_until_idle(SERVER, 8, 1_000);
    assert_eq!(harness.completed(1), vec![data.clone()]);
    assert_eq!(harness.completed(2), vec![data]);
    assert!(harness.net.lock().peak_outstanding() <= 31);
}

#[test]
fn test_sequential_uploads_from_two_clients() {
    let mut harness = Harness::new(no_interval().with_max_chunk_length(1_000), 2, 64);

    let first = pattern(4_000);
    let second = Bytes::from(vec![7u8; 4_000]);

    harness.nodes[1]
        .transceiver
        .send_data(first.clone(), Direction::ToUpstream)
        .unwrap();
    harness.run_until_idle(1, 4, 100);

    // 두 클라이언트 모두 transfer_id 1부터 시작
    harness.nodes[2]
        .transceiver
        .send_data(second.clone(), Direction::ToUpstream)
        .unwrap();
    harness.run_until_idle(2, 4, 100);

    assert_eq!(harness.completed(SERVER), vec![first, second]);
    assert_eq!(harness.nodes[SERVER].transceiver.stats().rejected_frames, 0);
}

#[test]
fn test_overlapping_uploads_from_two_clients() {
    let mut harness = Harness::new(no_interval().with_max_chunk_length(1_000), 2, 64);

    let long = pattern(5_500);
    let short = Bytes::from(vec![9u8; 3_200]);

    harness.nodes[1]
        .transceiver
        .send_data(long.clone(), Direction::ToUpstream)
        .unwrap();
    harness.nodes[2]
        .transceiver
        .send_data(short.clone(), Direction::ToUpstream)
        .unwrap();

    // 링크마다 한 프레임씩 배달해서 두 업로드가 서버에서 섞이게 함
    for _ in 0..100 {
        harness.tick(1);
        harness.tick(2);
        harness.deliver(1);
        if harness.net.lock().is_idle()
            && harness.nodes[1].transceiver.progress().is_none()
            && harness.nodes[2].transceiver.progress().is_none()
        {
            break;
        }
    }

    assert_eq!(harness.completed(SERVER), vec![short, long]);
    assert_eq!(harness.nodes[SERVER].transceiver.stats().payloads_received, 2);
}

#[test]
fn test_stop_and_wait_broadcast_waits_for_every_client() {
    let config = Config::stop_and_wait().with_max_chunk_length(1_000);
    let mut harness = Harness::new(config, 2, 64);

    let data = pattern(2_500);
    harness.nodes[SERVER]
        .transceiver
        .send_data(data.clone(), Direction::ToAllDownstream)
        .unwrap();

    assert_eq!(harness.tick(SERVER), TickOutcome::Sent { chunks: 1 });

    // 클라이언트 1의 ACK만 도착
    harness.deliver_link(SERVER, 1, 16);
    assert_eq!(harness.deliver_link(1, SERVER, 16), 1);
    assert_eq!(harness.tick(SERVER), TickOutcome::AwaitingAck);
    assert_eq!(harness.net.lock().outstanding_on(SERVER, 1), 0);
    assert_eq!(harness.net.lock().outstanding_on(SERVER, 2), 1);

    // 클라이언트 2의 청크와 ACK
    harness.deliver(16);
    harness.deliver(16);

    let mut outcomes = Vec::new();
    while harness.nodes[SERVER].transceiver.progress().is_some() {
        assert!(outcomes.len() < 20);
        outcomes.push(harness.tick(SERVER));
        for client in 1..=2 {
            assert!(harness.net.lock().outstanding_on(SERVER, client) <= 1);
        }
        harness.deliver(16);
        harness.deliver(16);
    }

    assert_eq!(
        outcomes,
        vec![
            TickOutcome::Sent { chunks: 1 },
            TickOutcome::Completed { chunks: 1 },
        ]
    );
    assert_eq!(harness.completed(1), vec![data.clone()]);
    assert_eq!(harness.completed(2), vec![data]);
    assert_eq!(harness.nodes[SERVER].transceiver.stats().rejected_frames, 0);
}

#[test]
fn test_stop_and_wait_broadcast_skips_departed_client() {
    let config = Config::stop_and_wait().with_max_chunk_length(1_000);
    let mut harness = Harness::new(config, 2, 64);

    let data = pattern(2_500);
    harness.nodes[SERVER]
        .transceiver
        .send_data(data.clone(), Direction::ToAllDownstream)
        .unwrap();

    assert_eq!(harness.tick(SERVER), TickOutcome::Sent { chunks: 1 });
    harness.deliver_link(SERVER, 1, 16);
    harness.deliver_link(1, SERVER, 16);
    assert_eq!(harness.tick(SERVER), TickOutcome::AwaitingAck);

    // ACK하지 않은 클라이언트 2가 떠나면 더 기다리지 않음
    harness.net.lock().disconnect(2);
    harness.nodes[SERVER].transceiver.on_peer_disconnected(&2);
    assert_eq!(harness.tick(SERVER), TickOutcome::Sent { chunks: 1 });

    harness.run_until_idle(SERVER, 16, 20);
    assert_eq!(harness.completed(1), vec![data]);
    assert!(harness.completed(2).is_empty());
}

