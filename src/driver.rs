//! tokio 기반 tick 드라이버
//!
//! 코어는 스레드나 async를 쓰지 않는다. 이 모듈은 일정 주기로
//! `Transceiver::tick`을 호출하는 외부 스케줄러 역할만 한다.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::transceiver::Transceiver;
use crate::transport::Transport;

/// 송수신기와 그 전송 계층
#[derive(Debug)]
pub struct Endpoint<T: Transport> {
    pub transceiver: Transceiver<T::Channel>,
    pub transport: T,
}

impl<T: Transport> Endpoint<T> {
    pub fn new(transceiver: Transceiver<T::Channel>, transport: T) -> Self {
        Self {
            transceiver,
            transport,
        }
    }

    pub fn shared(transceiver: Transceiver<T::Channel>, transport: T) -> SharedEndpoint<T> {
        Arc::new(Mutex::new(Self::new(transceiver, transport)))
    }

    /// 수신 프레임 전달
    pub fn deliver(&mut self, from: &T::Channel, frame: &[u8]) -> crate::Result<()> {
        let Endpoint {
            transceiver,
            transport,
        } = self;
        transceiver.on_frame_received(transport, from, frame)
    }
}

/// tick과 수신 콜백이 직렬화되도록 잠금으로 공유
pub type SharedEndpoint<T> = Arc<Mutex<Endpoint<T>>>;

/// 주기적 tick 태스크 핸들
pub struct TickDriver {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TickDriver {
    /// tick 태스크 시작
    pub fn spawn<T>(endpoint: SharedEndpoint<T>, period: Duration) -> Self
    where
        T: Transport + Send + 'static,
        T::Channel: Send,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = Instant::now();

            info!("tick driver started: period={:?}", period);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Instant::now();
                        let delta = now.duration_since(last);
                        last = now;

                        let mut guard = endpoint.lock();
                        let Endpoint { transceiver, transport } = &mut *guard;
                        match transceiver.tick(transport, delta) {
                            Ok(outcome) => debug!("tick: {:?}", outcome),
                            Err(e) => warn!("tick 에러: {}", e),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("tick driver stopped");
        });

        Self { shutdown, task }
    }

    /// 정지 후 태스크 종료 대기, 태스크가 정상 종료했으면 true
    pub async fn stop(self) -> bool {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(()) => true,
            Err(e) => {
                warn!("tick 태스크 비정상 종료: {}", e);
                false
            }
        }
    }
}
