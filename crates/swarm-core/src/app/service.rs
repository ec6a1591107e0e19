//! SchedulerService - `Scheduler` を専用の tokio タスクで動かす
//!
//! # 設計
//! - 遷移はすべて単一コンシューマの mpsc コマンドチャネルを通る（交互に挟まらない）
//! - ヘルススイープは同じループ内で interval により実行
//! - 進捗は遷移ごとに `watch` チャネルへ公開。読み手はループを待たない
//!
//! # 契約
//! - `SchedulerClient` は clone できる。ワーカーは1つ持ち、
//!   完了・クラッシュ通知をブロックせずに送る
//! - `shutdown()` はループを止めてスケジューラを返す。`stop()` は呼ばない
//!   （実行中の帳簿はそのまま）

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::Scheduler;
use super::status::ProgressSnapshot;
use crate::domain::{SchedulerError, Target, WorkerHandle};

/// スイープ周期の下限（`tokio::time::interval` は 0 を受け付けない）
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(1);

enum Command {
    Start {
        targets: Option<Vec<Target>>,
        reply: oneshot::Sender<Result<(), SchedulerError>>,
    },
    Completed(WorkerHandle),
    Crashed(WorkerHandle),
    Sweep {
        reply: oneshot::Sender<usize>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
}

/// 動作中の [`SchedulerService`] と話すためのハンドル
#[derive(Clone)]
pub struct SchedulerClient {
    tx: mpsc::UnboundedSender<Command>,
    progress: watch::Receiver<ProgressSnapshot>,
}

impl SchedulerClient {
    fn send(&self, cmd: Command) -> Result<(), SchedulerError> {
        self.tx.send(cmd).map_err(|_| SchedulerError::ServiceClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| SchedulerError::ServiceClosed)
    }

    /// ターゲットを列挙して実行を開始する
    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.request(|reply| Command::Start {
            targets: None,
            reply,
        })
        .await?
    }

    pub async fn start_with(&self, targets: Vec<Target>) -> Result<(), SchedulerError> {
        self.request(|reply| Command::Start {
            targets: Some(targets),
            reply,
        })
        .await?
    }

    /// 完了を送る。コマンドがキューに入った時点で戻る
    pub fn notify_completed(&self, handle: WorkerHandle) -> Result<(), SchedulerError> {
        self.send(Command::Completed(handle))
    }

    /// クラッシュを送る。コマンドがキューに入った時点で戻る
    pub fn notify_crashed(&self, handle: WorkerHandle) -> Result<(), SchedulerError> {
        self.send(Command::Crashed(handle))
    }

    /// 今すぐスイープする
    ///
    /// バリアも兼ねる: 戻った時点で、それ以前に送った通知はすべて適用済み。
    pub async fn health_sweep(&self) -> Result<usize, SchedulerError> {
        self.request(|reply| Command::Sweep { reply }).await
    }

    pub async fn stop(&self) -> Result<bool, SchedulerError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// 最後に公開された進捗
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.borrow().clone()
    }

    /// 実行中でなくなるまで待つ
    pub async fn wait_until_idle(&self) -> Result<ProgressSnapshot, SchedulerError> {
        let mut rx = self.progress.clone();
        let snapshot = rx
            .wait_for(|p| !p.running)
            .await
            .map_err(|_| SchedulerError::ServiceClosed)?
            .clone();
        Ok(snapshot)
    }
}

/// ループタスクの所有者
pub struct SchedulerService {
    client: SchedulerClient,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<Scheduler>,
}

impl SchedulerService {
    /// `scheduler` を新しいタスクに移す。tokio ランタイム内で呼ぶこと
    pub fn spawn(scheduler: Scheduler) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = watch::channel(scheduler.progress());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let period = scheduler
            .config()
            .scheduler
            .health_check_interval()
            .max(MIN_SWEEP_PERIOD);

        let join = tokio::spawn(run_loop(scheduler, rx, progress_tx, shutdown_rx, period));

        Self {
            client: SchedulerClient {
                tx,
                progress: progress_rx,
            },
            shutdown_tx,
            join,
        }
    }

    pub fn client(&self) -> SchedulerClient {
        self.client.clone()
    }

    /// ループを止めてスケジューラを取り戻す
    pub async fn shutdown(self) -> Result<Scheduler, SchedulerError> {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
        self.join.await.map_err(|_| SchedulerError::ServiceClosed)
    }
}

async fn run_loop(
    mut scheduler: Scheduler,
    mut rx: mpsc::UnboundedReceiver<Command>,
    progress_tx: watch::Sender<ProgressSnapshot>,
    mut shutdown_rx: watch::Receiver<bool>,
    period: Duration,
) -> Scheduler {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(sweep_ms = period.as_millis() as u64, "scheduler service started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {
                let reclaimed = scheduler.health_sweep();
                if reclaimed > 0 {
                    debug!(reclaimed, "periodic sweep reclaimed workers");
                }
                progress_tx.send_replace(scheduler.progress());
            }
            cmd = rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                apply(&mut scheduler, cmd, &progress_tx);
            }
        }
    }

    info!("scheduler service stopped");
    scheduler
}

/// コマンドを1つ適用する
///
/// 応答より先に進捗を公開する（応答を待った呼び出し側は新しい状態を見る）。
fn apply(scheduler: &mut Scheduler, cmd: Command, progress_tx: &watch::Sender<ProgressSnapshot>) {
    match cmd {
        Command::Start { targets, reply } => {
            let result = match targets {
                Some(targets) => scheduler.start_with(targets),
                None => scheduler.start(),
            };
            publish(progress_tx, scheduler);
            let _ = reply.send(result);
        }
        Command::Completed(handle) => {
            scheduler.on_job_completed(&handle);
            publish(progress_tx, scheduler);
        }
        Command::Crashed(handle) => {
            scheduler.on_job_crashed(&handle);
            publish(progress_tx, scheduler);
        }
        Command::Sweep { reply } => {
            let reclaimed = scheduler.health_sweep();
            publish(progress_tx, scheduler);
            let _ = reply.send(reclaimed);
        }
        Command::Stop { reply } => {
            let stopped = scheduler.stop();
            publish(progress_tx, scheduler);
            let _ = reply.send(stopped);
        }
    }
}

fn publish(progress_tx: &watch::Sender<ProgressSnapshot>, scheduler: &Scheduler) {
    progress_tx.send_replace(scheduler.progress());
}
