// SSH客户端封装
use crate::config::{AuthMethod, ConnectionConfig};
use crate::utils::error::TransferError;
use ssh2::{ErrorCode, Session};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;

pub struct SshClient {
    pub session: Session,
}

impl SshClient {
    pub fn connect(config: &ConnectionConfig) -> Result<Self, TransferError> {
        let addr = config.addr();
        let tcp = Self::open_tcp(config).map_err(|source| TransferError::ConnectionFailed {
            addr: addr.clone(),
            source,
        })?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        if let Some(timeout) = config.timeout {
            session.set_timeout(timeout_millis(timeout));
        }
        session
            .handshake()
            .map_err(|source| TransferError::HandshakeFailed { addr, source })?;

        let auth_result = match &config.auth {
            AuthMethod::Password(password) => session.userauth_password(&config.username, password),
            AuthMethod::PublicKey(key_path) => {
                session.userauth_pubkey_file(&config.username, None, key_path, None)
            }
            AuthMethod::Agent => session.userauth_agent(&config.username),
        };

        if !session.authenticated() {
            // 服务器没有返回错误但仍未认证时，补一个认证失败的错误码
            let source = auth_result.err().unwrap_or_else(|| {
                ssh2::Error::new(
                    ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED),
                    "server did not accept the credentials",
                )
            });
            return Err(TransferError::AuthenticationFailed {
                username: config.username.clone(),
                source,
            });
        }

        Ok(SshClient { session })
    }

    pub fn sftp(&self) -> Result<ssh2::Sftp, TransferError> {
        Ok(self.session.sftp()?)
    }

    pub fn disconnect(&self) -> Result<(), TransferError> {
        self.session
            .disconnect(None, "stress test finished", None)
            .map_err(TransferError::from)
    }

    fn open_tcp(config: &ConnectionConfig) -> io::Result<TcpStream> {
        let timeout = match config.timeout {
            Some(timeout) => timeout,
            None => return TcpStream::connect((config.host.as_str(), config.port)),
        };

        // 带超时连接需要逐个尝试解析出的地址
        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
        for addr in (config.host.as_str(), config.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}
