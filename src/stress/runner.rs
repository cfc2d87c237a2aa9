// 调度器：派发任务、按完成顺序收集结果、管理资源监控、生成汇总
use crate::config::RunConfig;
use crate::ssh::Connector;
use crate::stress::cancel::CancellationToken;
use crate::stress::event::{ErrorKind, EventSink, RunOutcome, RunSummary, StressEvent, TaskOutcome};
use crate::stress::monitor::{ResourceMonitor, ResourceProbe, SysinfoProbe};
use crate::stress::progress::ProgressAggregator;
use crate::stress::task::TransferTask;
use crate::threadpool::ThreadPool;
use crate::utils::error::TransferError;
use crossbeam_channel::{unbounded, Receiver};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SEPARATOR_WIDTH: usize = 50;

pub struct StressTest<C: Connector> {
    config: Arc<RunConfig>,
    connector: Arc<C>,
    cancel: CancellationToken,
    probe: Box<dyn ResourceProbe>,
}

impl<C: Connector> StressTest<C> {
    pub fn new(config: RunConfig, connector: C) -> Self {
        Self {
            config: Arc::new(config),
            connector: Arc::new(connector),
            cancel: CancellationToken::new(),
            probe: Box::new(SysinfoProbe::new()),
        }
    }

    pub fn with_probe<P: ResourceProbe>(mut self, probe: P) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 在独立线程上运行，事件通过返回的 `RunHandle` 读取
    pub fn spawn(self) -> Result<RunHandle, TransferError> {
        let (events, receiver) = EventSink::channel();
        let cancel = self.cancel.clone();
        let handle = thread::Builder::new()
            .name("stress-orchestrator".to_string())
            .spawn(move || self.run(&events))?;

        Ok(RunHandle {
            events: receiver,
            cancel,
            handle,
        })
    }

    /// 阻塞运行直到所有已派发任务都给出结果。
    ///
    /// 只有派发前的配置错误会让整个运行失败；任务内的错误都转换为失败结果。
    pub fn run(self, events: &EventSink) -> Result<RunSummary, TransferError> {
        self.config.validate()?;

        let total = self.config.connections;
        let started = Instant::now();
        log::info!(
            "Starting stress test: {} connection(s) to {}",
            total,
            self.config.connection.addr()
        );

        events.log(format!(
            "Starting SFTP stress test with {} concurrent connections...",
            total
        ));
        events.log(format!("Host: {}", self.config.connection.addr()));
        events.log(format!("Directory: {}", self.config.remote_dir));
        events.log("=".repeat(SEPARATOR_WIDTH));

        let mut progress = ProgressAggregator::new(total);
        let dispatched = ResourceMonitor::start(self.probe, self.config.monitor_interval, events.clone())
            .and_then(|mut monitor| {
                let collected = dispatch_and_collect(
                    &self.config,
                    &self.connector,
                    &self.cancel,
                    events,
                    &mut progress,
                );
                // 无论成功与否都先停止监控线程
                monitor.stop();
                collected
            });

        if let Err(e) = &dispatched {
            log::error!("Stress test aborted: {}", e);
            events.log(format!("SFTP stress test aborted: {}", e));
        }

        // 派发开始后即使中途出错也要给出汇总
        let summary = conclude(&progress, self.cancel.is_canceled(), started.elapsed(), events);
        dispatched?;
        Ok(summary)
    }
}

fn conclude(
    progress: &ProgressAggregator,
    canceled: bool,
    elapsed: Duration,
    events: &EventSink,
) -> RunSummary {
    let total = progress.total();
    let summary = RunSummary {
        outcome: RunOutcome::classify(progress.completed(), total, canceled),
        completed: progress.completed(),
        total,
        successes: progress.successes(),
        failures: progress.failures(),
        bytes_uploaded: progress.bytes(),
        elapsed,
    };

    log::info!(
        "Stress test finished: {:?}, {}/{} completed, {} failed",
        summary.outcome,
        summary.completed,
        summary.total,
        summary.failures
    );
    events.log("=".repeat(SEPARATOR_WIDTH));
    events.log(summary.headline());
    events.emit(StressEvent::Summary(summary.clone()));

    summary
}

fn dispatch_and_collect<C: Connector>(
    config: &Arc<RunConfig>,
    connector: &Arc<C>,
    cancel: &CancellationToken,
    events: &EventSink,
    progress: &mut ProgressAggregator,
) -> Result<(), TransferError> {
    let total = progress.total();
    let pool = ThreadPool::new(total)?;
    let (done_tx, done_rx) = unbounded::<TaskOutcome>();

    let mut dispatched = 0;
    for id in 0..total {
        if cancel.is_canceled() {
            events.log(format!(
                "SFTP stress test canceled; {} of {} tasks dispatched.",
                dispatched, total
            ));
            break;
        }

        let config = Arc::clone(config);
        let connector = Arc::clone(connector);
        let cancel = cancel.clone();
        let task_events = events.clone();
        let done_tx = done_tx.clone();

        let job = move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                TransferTask::new(id, &config, connector.as_ref(), &cancel, &task_events).run()
            }))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                log::error!("Task {} panicked: {}", id, message);
                task_events.task_log(id, format!("Upload failed - unexpected error: {}", message));
                TaskOutcome::failed_with(id, ErrorKind::Unexpected, message)
            });

            if done_tx.send(outcome).is_err() {
                log::warn!("Task {}: completion queue closed", id);
            }
        };

        if let Err(e) = pool.execute(job) {
            log::error!("Failed to dispatch task {}: {}", id, e);
            break;
        }
        progress.mark_running(id);
        dispatched += 1;
    }
    drop(done_tx);

    collect_outcomes(&done_rx, dispatched, cancel, events, progress);

    // 等待工作线程全部退出
    drop(pool);
    Ok(())
}

/// 按到达顺序处理结果，计数只在这里修改
fn collect_outcomes(
    done_rx: &Receiver<TaskOutcome>,
    dispatched: usize,
    cancel: &CancellationToken,
    events: &EventSink,
    progress: &mut ProgressAggregator,
) {
    let mut cancel_noted = false;
    for _ in 0..dispatched {
        let outcome = match done_rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => {
                log::warn!("Completion queue closed before every task reported");
                break;
            }
        };

        if cancel.is_canceled() && !cancel_noted {
            events.log("SFTP stress test canceled during execution.");
            cancel_noted = true;
        }

        match progress.record(&outcome) {
            Some(percent) => {
                events.emit(StressEvent::TaskFinished(outcome));
                events.emit(StressEvent::Progress { percent });
            }
            None => log::warn!("Ignoring duplicate outcome for task {}", outcome.task_id),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 后台运行中的压测
pub struct RunHandle {
    events: Receiver<StressEvent>,
    cancel: CancellationToken,
    handle: thread::JoinHandle<Result<RunSummary, TransferError>>,
}

impl RunHandle {
    pub fn events(&self) -> &Receiver<StressEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn join(self) -> Result<RunSummary, TransferError> {
        self.handle
            .join()
            .map_err(|_| TransferError::ThreadJoinError)?
    }
}
