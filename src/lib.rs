// 库文件，导出模块
pub mod cli;
pub mod config;
pub mod console;
pub mod ssh;
pub mod stress;
pub mod threadpool;
pub mod utils;

use config::RunConfig;
use ssh::SshConnector;
use stress::{EventSink, RunSummary, StressTest};
use utils::error::TransferError;

/// 使用 ssh2 连接器执行一次压测，事件写入 `events`
pub fn run_stress_test(config: RunConfig, events: &EventSink) -> Result<RunSummary, TransferError> {
    StressTest::new(config, SshConnector).run(events)
}
