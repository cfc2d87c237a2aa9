// 事件与结果类型
use crate::stress::monitor::MonitorSample;
use crate::utils::error::TransferError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Transfer,
    Canceled,
    Unexpected,
}

/// 单个任务的最终结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub task_id: usize,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub message: String,
    pub files: usize,
    pub bytes: u64,
}

impl TaskOutcome {
    pub fn succeeded(task_id: usize, files: usize, bytes: u64) -> Self {
        Self {
            task_id,
            success: true,
            error_kind: None,
            message: format!("uploaded {} file(s)", files),
            files,
            bytes,
        }
    }

    pub fn failed(task_id: usize, error: &TransferError) -> Self {
        Self::failed_with(task_id, error.kind(), error.to_string())
    }

    pub fn failed_with(task_id: usize, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            task_id,
            success: false,
            error_kind: Some(kind),
            message: message.into(),
            files: 0,
            bytes: 0,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.error_kind == Some(ErrorKind::Canceled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Canceled,
    Partial,
}

impl RunOutcome {
    pub fn classify(completed: usize, total: usize, canceled: bool) -> Self {
        if canceled {
            RunOutcome::Canceled
        } else if completed == total {
            RunOutcome::Completed
        } else {
            RunOutcome::Partial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub completed: usize,
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub bytes_uploaded: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn headline(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        match self.outcome {
            RunOutcome::Completed => format!(
                "Completed all {} SFTP uploads in {:.2} seconds.",
                self.completed, secs
            ),
            RunOutcome::Canceled => format!(
                "Task was canceled after {} uploads in {:.2} seconds.",
                self.completed, secs
            ),
            RunOutcome::Partial => format!(
                "Task ended early with {} of {} uploads completed in {:.2} seconds.",
                self.completed, self.total, secs
            ),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcome == RunOutcome::Completed && self.failures == 0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StressEvent {
    Log {
        task_id: Option<usize>,
        message: String,
    },
    TaskFinished(TaskOutcome),
    Progress {
        percent: u8,
    },
    FileProgress {
        task_id: usize,
        percent: u8,
    },
    MonitorStatus {
        sample: MonitorSample,
        message: String,
        timeout_ms: u64,
    },
    Summary(RunSummary),
}

/// 事件发送端，消费者（界面层）持有对应的 Receiver
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Sender<StressEvent>,
}

impl EventSink {
    pub fn new(sender: Sender<StressEvent>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (EventSink, Receiver<StressEvent>) {
        let (sender, receiver) = unbounded();
        (EventSink::new(sender), receiver)
    }

    pub fn emit(&self, event: StressEvent) {
        // 消费者已退出时继续运行，事件直接丢弃
        if self.sender.send(event).is_err() {
            log::trace!("event receiver dropped");
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("{}", message);
        self.emit(StressEvent::Log {
            task_id: None,
            message,
        });
    }

    pub fn task_log(&self, task_id: usize, message: impl Into<String>) {
        let message = format!("Task {}: {}", task_id, message.into());
        log::debug!("{}", message);
        self.emit(StressEvent::Log {
            task_id: Some(task_id),
            message,
        });
    }
}
