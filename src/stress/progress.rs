// 进度统计
use crate::stress::event::TaskOutcome;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed | TaskState::Canceled)
    }
}

fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u8
}

/// 整体进度：`completed` 只增不减，`total` 在派发时固定
#[derive(Debug)]
pub struct ProgressAggregator {
    total: usize,
    completed: usize,
    successes: usize,
    failures: usize,
    bytes: u64,
    states: Vec<TaskState>,
}

impl ProgressAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            successes: 0,
            failures: 0,
            bytes: 0,
            states: vec![TaskState::Pending; total],
        }
    }

    pub fn mark_running(&mut self, task_id: usize) -> bool {
        match self.states.get_mut(task_id) {
            Some(state) if *state == TaskState::Pending => {
                *state = TaskState::Running;
                true
            }
            _ => false,
        }
    }

    /// 记录任务结果并返回新的整体百分比；重复或未知的任务 id 返回 `None`
    pub fn record(&mut self, outcome: &TaskOutcome) -> Option<u8> {
        let state = self.states.get_mut(outcome.task_id)?;
        if state.is_terminal() {
            return None;
        }

        *state = if outcome.success {
            TaskState::Succeeded
        } else if outcome.is_canceled() {
            TaskState::Canceled
        } else {
            TaskState::Failed
        };

        self.completed += 1;
        if outcome.success {
            self.successes += 1;
            self.bytes += outcome.bytes;
        } else {
            self.failures += 1;
        }
        Some(self.percent())
    }

    pub fn percent(&self) -> u8 {
        percent_of(self.completed, self.total)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn state(&self, task_id: usize) -> Option<TaskState> {
        self.states.get(task_id).copied()
    }
}

/// 单任务多文件模式下按文件数计算的子进度
#[derive(Debug)]
pub struct FileProgress {
    total_files: usize,
    transferred: usize,
}

impl FileProgress {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            transferred: 0,
        }
    }

    pub fn advance(&mut self) -> u8 {
        self.transferred += 1;
        percent_of(self.transferred, self.total_files)
    }
}
