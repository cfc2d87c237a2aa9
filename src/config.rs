// 配置管理
use crate::cli::Cli;
use crate::utils::error::TransferError;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Password};
use std::path::PathBuf;
use std::time::Duration;

pub const MIN_CONNECTIONS: usize = 1;
pub const MAX_CONNECTIONS: usize = 100;
pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(500);
pub const STATUS_DISPLAY_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub enum AuthMethod {
    Password(String),
    PublicKey(PathBuf),
    Agent,
}

/// 单个连接所需的参数
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    /// `None` 表示不设超时，连接或传输可能无限期阻塞
    pub timeout: Option<Duration>,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            auth,
            timeout: None,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 一次压测运行的配置，运行期间不可变
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub connection: ConnectionConfig,
    pub remote_dir: String,
    pub source: PathBuf,
    pub connections: usize,
    pub multi_file: bool,
    pub monitor_interval: Duration,
}

impl RunConfig {
    pub fn new(connection: ConnectionConfig, remote_dir: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            connection,
            remote_dir: remote_dir.into(),
            source: source.into(),
            connections: MIN_CONNECTIONS,
            multi_file: false,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
        }
    }

    pub fn with_connections(mut self, connections: usize) -> Self {
        self.connections = connections;
        self
    }

    pub fn with_multi_file(mut self, multi_file: bool) -> Self {
        self.multi_file = multi_file;
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let auth = Self::determine_auth_method(cli)?;

        let mut connection = ConnectionConfig::new(cli.host.clone(), cli.port, cli.username.clone(), auth);
        connection.timeout = cli.timeout_secs.map(Duration::from_secs);

        Ok(RunConfig::new(connection, cli.remote_dir.clone(), cli.source.clone())
            .with_connections(cli.connections)
            .with_multi_file(cli.multi_file)
            .with_monitor_interval(Duration::from_millis(cli.monitor_interval_ms)))
    }

    /// 派发任务前的校验，失败时整个运行不会开始
    pub fn validate(&self) -> Result<(), TransferError> {
        if !(MIN_CONNECTIONS..=MAX_CONNECTIONS).contains(&self.connections) {
            return Err(TransferError::InvalidConfig(format!(
                "connection count must be between {} and {}, got {}",
                MIN_CONNECTIONS, MAX_CONNECTIONS, self.connections
            )));
        }

        if self.connection.host.trim().is_empty() {
            return Err(TransferError::InvalidConfig("host must not be empty".to_string()));
        }

        if self.remote_dir.is_empty() {
            return Err(TransferError::InvalidConfig(
                "remote directory must not be empty".to_string(),
            ));
        }

        if self.monitor_interval.is_zero() {
            return Err(TransferError::InvalidConfig(
                "monitor interval must be greater than zero".to_string(),
            ));
        }

        if !self.source.exists() {
            return Err(TransferError::SourceNotFound {
                path: self.source.display().to_string(),
            });
        }

        if self.multi_file && !self.source.is_dir() {
            return Err(TransferError::InvalidConfig(format!(
                "multi-file mode requires a directory source: {}",
                self.source.display()
            )));
        }

        if !self.multi_file && !self.source.is_file() {
            return Err(TransferError::InvalidConfig(format!(
                "source must be a regular file (use multi-file mode for directories): {}",
                self.source.display()
            )));
        }

        Ok(())
    }

    fn determine_auth_method(cli: &Cli) -> Result<AuthMethod> {
        // 命令行或环境变量提供了密码，直接使用
        if let Some(password) = &cli.password {
            return Ok(AuthMethod::Password(password.clone()));
        }

        if cli.use_agent {
            return Ok(AuthMethod::Agent);
        }

        if let Some(key_file) = &cli.key_file {
            return Ok(AuthMethod::PublicKey(key_file.clone()));
        }

        // 尝试查找默认的SSH密钥
        let home = home::home_dir().context("Cannot determine home directory")?;
        let ssh_dir = home.join(".ssh");

        let key_files = ["id_rsa", "id_ed25519", "id_ecdsa"];
        for key_name in &key_files {
            let key_path = ssh_dir.join(key_name);
            if key_path.exists() {
                let use_key = Confirm::new()
                    .with_prompt(format!("Use SSH key {} for authentication?", key_path.display()))
                    .default(true)
                    .interact()?;

                if use_key {
                    return Ok(AuthMethod::PublicKey(key_path));
                }
            }
        }

        let password = Password::new()
            .with_prompt(format!("Enter password for {}@{}", cli.username, cli.host))
            .interact()?;

        Ok(AuthMethod::Password(password))
    }
}
