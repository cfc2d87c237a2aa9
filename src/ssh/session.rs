// SFTP会话管理
use crate::config::ConnectionConfig;
use crate::ssh::{Connector, RemoteSession, SshClient};
use crate::utils::error::TransferError;
use ssh2::Sftp;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

const UPLOAD_BUFFER_SIZE: usize = 1024 * 1024;

/// 一个任务独占的 SSH 连接及其 SFTP 通道
pub struct SftpSession {
    client: SshClient,
    sftp: Option<Sftp>,
}

impl SftpSession {
    pub fn open(config: &ConnectionConfig) -> Result<Self, TransferError> {
        let client = SshClient::connect(config)?;
        let sftp = client.sftp()?;
        Ok(Self {
            client,
            sftp: Some(sftp),
        })
    }

    fn upload(sftp: &Sftp, local: &Path, remote: &str) -> Result<u64, String> {
        let mut local_file = File::open(local).map_err(|e| e.to_string())?;
        let mut remote_file = sftp.create(Path::new(remote)).map_err(|e| e.to_string())?;

        let mut buffer = vec![0u8; UPLOAD_BUFFER_SIZE];
        let mut total: u64 = 0;
        loop {
            match local_file.read(&mut buffer) {
                Ok(0) => break,
                Ok(bytes_read) => {
                    remote_file
                        .write_all(&buffer[..bytes_read])
                        .map_err(|e| e.to_string())?;
                    total += bytes_read as u64;
                }
                Err(e) => return Err(e.to_string()),
            }
        }

        // 部分服务器不支持 fsync，忽略错误
        remote_file.fsync().ok();
        Ok(total)
    }
}

impl RemoteSession for SftpSession {
    fn put(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let sftp = self.sftp.as_ref().ok_or_else(|| TransferError::UploadFailed {
            local: local.display().to_string(),
            remote: remote.to_string(),
            message: "session already closed".to_string(),
        })?;

        Self::upload(sftp, local, remote).map_err(|message| TransferError::UploadFailed {
            local: local.display().to_string(),
            remote: remote.to_string(),
            message,
        })
    }

    fn close(&mut self) -> Result<(), TransferError> {
        // 先释放 SFTP 通道再断开 SSH 连接
        if self.sftp.take().is_some() {
            self.client.disconnect()?;
        }
        Ok(())
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close SFTP session: {}", e);
        }
    }
}

/// 基于 ssh2 的真实连接器
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

impl Connector for SshConnector {
    type Session = SftpSession;

    fn open(&self, config: &ConnectionConfig) -> Result<SftpSession, TransferError> {
        SftpSession::open(config)
    }
}
