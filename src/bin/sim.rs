//! LDT 시뮬레이터 - 메모리 내 루프백으로 대용량 전송 재현
//!
//! 서버 1개와 클라이언트 N개를 루프백 네트워크로 연결하고
//! 송신측은 tick 드라이버, 수신측은 배달 루프로 구동한다.
//!
//! 사용법:
//!   cargo run --release --bin ldt-sim -- [OPTIONS]
//!
//! 예시:
//!   # 10MB를 모든 클라이언트로
//!   cargo run --release --bin ldt-sim -- --size 10000000 --clients 3
//!
//!   # 클라이언트 → 서버, stop-and-wait
//!   cargo run --release --bin ldt-sim -- --direction upstream --stop-and-wait

use std::error::Error;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use ldt::loopback::{EndpointId, LoopbackNet, LoopbackPort, SERVER};
use ldt::{Config, Direction, Endpoint, SharedEndpoint, TickDriver, Transceiver, TransferStats};

/// 검증하기 쉬운 반복 패턴 데이터 생성
fn generate_payload(size: usize) -> Bytes {
    let patterns: [&[u8]; 3] = [
        b"The quick brown fox jumps over the lazy dog. ",
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 ",
        b"Large Data Transceive test payload. ",
    ];

    let mut data = Vec::with_capacity(size);
    let mut line = 0usize;
    while data.len() < size {
        data.extend_from_slice(format!("[{:08}] ", line).as_bytes());
        data.extend_from_slice(patterns[line % patterns.len()]);
        line += 1;
    }
    data.truncate(size);
    Bytes::from(data)
}

/// 시뮬레이터 설정
struct SimConfig {
    size: usize,
    clients: usize,
    capacity: usize,
    drain_per_link: usize,
    tick: Duration,
    direction: Direction,
    config: Config,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            size: 1_000_000,
            clients: 2,
            capacity: 256,
            drain_per_link: 4,
            tick: Duration::from_millis(10),
            direction: Direction::ToAllDownstream,
            config: Config::default(),
        }
    }
}

fn next_value<'a>(args: &'a [String], i: &mut usize, name: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} 값 필요", name))
}

fn parse_number(value: &str, name: &str) -> Result<usize, String> {
    value
        .parse()
        .map_err(|_| format!("{}: 유효한 숫자 필요 ({})", name, value))
}

fn parse_args() -> Result<SimConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut sim = SimConfig::default();

    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--size" | "-s" => {
                sim.size = parse_number(next_value(&args, &mut i, arg)?, arg)?;
            }
            "--chunk" | "-c" => {
                sim.config.max_chunk_length = parse_number(next_value(&args, &mut i, arg)?, arg)?;
            }
            "--capacity" => {
                sim.capacity = parse_number(next_value(&args, &mut i, arg)?, arg)?;
            }
            "--clients" | "-n" => {
                sim.clients = parse_number(next_value(&args, &mut i, arg)?, arg)?;
            }
            "--drain" => {
                sim.drain_per_link = parse_number(next_value(&args, &mut i, arg)?, arg)?;
            }
            "--tick-ms" => {
                let ms = parse_number(next_value(&args, &mut i, arg)?, arg)?;
                sim.tick = Duration::from_millis(ms as u64);
            }
            "--direction" | "-d" => {
                sim.direction = next_value(&args, &mut i, arg)?.parse()?;
            }
            "--legacy" => {
                sim.config = Config::legacy();
            }
            "--stop-and-wait" => {
                let max_chunk_length = sim.config.max_chunk_length;
                sim.config = Config::stop_and_wait().with_max_chunk_length(max_chunk_length);
            }
            "--no-interval" => {
                sim.config.min_send_interval = None;
            }
            "--help" | "-h" => {
                println!(
                    r#"LDT Simulator - 메모리 내 루프백 대용량 전송

사용법:
  cargo run --release --bin ldt-sim -- [OPTIONS]

옵션:
  -s, --size <BYTES>        페이로드 크기 (기본: 1000000)
  -c, --chunk <BYTES>       최대 청크 길이 (기본: 60000)
  --capacity <N>            링크당 최대 미처리 프레임 수 (기본: 256)
  -n, --clients <N>         클라이언트 수 (기본: 2, 1번이 소유자)
  --drain <N>               배달 라운드당 링크별 배달 프레임 수 (기본: 4)
  --tick-ms <MS>            tick 주기 (기본: 10)
  -d, --direction <DIR>     upstream | owner | all (기본: all)
  --legacy                  초기 배포 설정 (60KiB 청크, tick당 10개)
  --stop-and-wait           ACK 기반 전송
  --no-interval             최소 송신 간격 제거
  -h, --help                이 도움말 출력

예시:
  cargo run --release --bin ldt-sim -- --size 10000000 --clients 3
  cargo run --release --bin ldt-sim -- -d owner --capacity 32 --no-interval
"#
                );
                std::process::exit(0);
            }
            other => warn!("알 수 없는 옵션 무시: {}", other),
        }
        i += 1;
    }

    Ok(sim)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 로깅 설정 (RUST_LOG로 조절)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let sim = parse_args()?;

    info!("LDT Simulator starting...");
    info!("  Payload: {} bytes", sim.size);
    info!("  Max chunk length: {} bytes", sim.config.max_chunk_length);
    info!("  Clients: {}", sim.clients);
    info!("  Direction: {}", sim.direction);
    info!("  Pacing: {:?}", sim.config.pacing);

    let net = LoopbackNet::shared(sim.capacity);
    {
        let mut net = net.lock();
        info!("  Link capacity: {}", net.capacity());
        for client in 1..=sim.clients {
            net.connect(client);
        }
        net.set_owner((sim.clients > 0).then_some(1));
    }

    // 엔드포인트 0 = 서버, 1..=N = 클라이언트
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(EndpointId, usize)>();
    let mut endpoints: Vec<SharedEndpoint<LoopbackPort>> = Vec::with_capacity(sim.clients + 1);
    for id in 0..=sim.clients {
        let mut transceiver = Transceiver::new(sim.config.clone())?;
        let done_tx = done_tx.clone();
        transceiver.on_transfer_complete(move |payload| {
            let _ = done_tx.send((id, payload.len()));
        });
        endpoints.push(Endpoint::shared(transceiver, LoopbackPort::new(net.clone(), id)));
    }
    drop(done_tx);

    let (source, expected) = match sim.direction {
        Direction::ToUpstream => (1, 1),
        Direction::ToDownstreamOwner => (SERVER, 1),
        Direction::ToAllDownstream => (SERVER, sim.clients),
    };
    if source >= endpoints.len() || expected == 0 {
        return Err("클라이언트가 최소 1개 필요".into());
    }

    let data = generate_payload(sim.size);
    let start = Instant::now();
    {
        let mut endpoint = endpoints[source].lock();
        endpoint.transceiver.on_chunk_sent(|sent| {
            if sent.is_final {
                debug!("마지막 청크 송신: transfer={}", sent.transfer_id);
            }
        });
        endpoint.transceiver.send_data(data, sim.direction)?;
    }

    let driver = TickDriver::spawn(endpoints[source].clone(), sim.tick);

    // 배달 루프
    let mut completed = 0;
    let mut round = tokio::time::interval(Duration::from_millis(1));
    while completed < expected {
        round.tick().await;

        let deliveries = net.lock().drain(sim.drain_per_link);
        for delivery in deliveries {
            if let Some(endpoint) = endpoints.get(delivery.to) {
                if let Err(e) = endpoint.lock().deliver(&delivery.from, &delivery.frame) {
                    warn!("배달 실패 {} -> {}: {}", delivery.from, delivery.to, e);
                }
            }
        }

        while let Ok((id, len)) = done_rx.try_recv() {
            info!("엔드포인트 {} 수신 완료: {} bytes", id, len);
            completed += 1;
        }
    }

    driver.stop().await;

    let elapsed = start.elapsed();
    info!("Transfer complete!");
    info!("  Time: {:.2}s", elapsed.as_secs_f64());
    info!(
        "  Throughput: {:.2} MB/s",
        (sim.size * expected) as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );
    info!("  Peak outstanding: {}", net.lock().peak_outstanding());

    let mut total = TransferStats::new();
    for endpoint in &endpoints {
        let endpoint = endpoint.lock();
        let stats = endpoint.transceiver.stats();
        info!("  [{}] {}", endpoint.transport.id(), stats.summary());
        total.merge(&stats);
    }
    info!("  [total] {}", total.summary());

    Ok(())
}
