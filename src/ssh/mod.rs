// SSH模块入口
pub mod client;
pub mod session;

pub use client::SshClient;
pub use session::{SftpSession, SshConnector};

use crate::config::ConnectionConfig;
use crate::utils::error::TransferError;
use std::path::Path;

/// 建立远程会话，每个任务调用一次
pub trait Connector: Send + Sync + 'static {
    type Session: RemoteSession;

    fn open(&self, config: &ConnectionConfig) -> Result<Self::Session, TransferError>;
}

pub trait RemoteSession {
    /// 上传本地文件到远程路径，返回写入的字节数
    fn put(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError>;

    fn close(&mut self) -> Result<(), TransferError>;
}
