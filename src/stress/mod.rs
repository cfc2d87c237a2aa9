// 压测核心：任务、进度、资源监控与调度
pub mod cancel;
pub mod event;
pub mod monitor;
pub mod progress;
pub mod runner;
pub mod task;

pub use cancel::CancellationToken;
pub use event::{ErrorKind, EventSink, RunOutcome, RunSummary, StressEvent, TaskOutcome};
pub use monitor::{MonitorSample, ResourceMonitor, ResourceProbe, SysinfoProbe};
pub use progress::{FileProgress, ProgressAggregator, TaskState};
pub use runner::{RunHandle, StressTest};
pub use task::TransferTask;
