// 测试用的内存连接器
#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender};
use sftp_stress::config::{AuthMethod, ConnectionConfig, RunConfig};
use sftp_stress::ssh::{Connector, RemoteSession};
use sftp_stress::stress::monitor::ProbeReading;
use sftp_stress::stress::{CancellationToken, EventSink, ResourceProbe, RunSummary, StressEvent, StressTest};
use sftp_stress::utils::error::TransferError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Default)]
pub struct MockState {
    pub puts: Mutex<Vec<String>>,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub open_now: AtomicUsize,
    pub max_open: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    pub state: Arc<MockState>,
    pub refuse_all: bool,
    pub fail_remote: Vec<String>,
    pub panic_remote: Vec<String>,
    pub delay: Option<Duration>,
    pub gate: Option<Receiver<()>>,
    pub entered: Option<Sender<String>>,
    pub cancel_on_put: Option<CancellationToken>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn puts(&self) -> Vec<String> {
        self.state.puts.lock().unwrap().clone()
    }
}

pub struct MockSession {
    connector: MockConnector,
    open: bool,
}

impl Connector for MockConnector {
    type Session = MockSession;

    fn open(&self, config: &ConnectionConfig) -> Result<MockSession, TransferError> {
        if self.refuse_all {
            return Err(TransferError::AuthenticationFailed {
                username: config.username.clone(),
                source: ssh2::Error::new(ssh2::ErrorCode::Session(-18), "access denied"),
            });
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        let now = self.state.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(now, Ordering::SeqCst);
        Ok(MockSession {
            connector: self.clone(),
            open: true,
        })
    }
}

impl RemoteSession for MockSession {
    fn put(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
        let connector = &self.connector;
        if let Some(token) = &connector.cancel_on_put {
            token.cancel();
        }
        if let Some(entered) = &connector.entered {
            let _ = entered.send(remote.to_string());
        }
        if let Some(gate) = &connector.gate {
            // 发送端被释放之前一直阻塞，模拟挂起的传输
            let _ = gate.recv();
        }
        if let Some(delay) = connector.delay {
            thread::sleep(delay);
        }
        if connector.panic_remote.iter().any(|r| r == remote) {
            panic!("transport blew up on {}", remote);
        }
        if connector.fail_remote.iter().any(|r| r == remote) {
            return Err(TransferError::UploadFailed {
                local: local.display().to_string(),
                remote: remote.to_string(),
                message: "permission denied".to_string(),
            });
        }

        connector.state.puts.lock().unwrap().push(remote.to_string());
        Ok(fs::metadata(local)?.len())
    }

    fn close(&mut self) -> Result<(), TransferError> {
        if self.open {
            self.open = false;
            self.connector.state.closes.fetch_add(1, Ordering::SeqCst);
            self.connector.state.open_now.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

pub struct StaticProbe;

impl ResourceProbe for StaticProbe {
    fn read(&mut self) -> ProbeReading {
        ProbeReading {
            memory_bytes: 32 * 1024 * 1024,
            ..Default::default()
        }
    }
}

pub fn write_file(dir: &Path, name: &str, bytes: usize) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![b'x'; bytes]).unwrap();
    path
}

pub fn run_config(source: &Path, connections: usize) -> RunConfig {
    let connection = ConnectionConfig::new(
        "sftp.test",
        22,
        "tester",
        AuthMethod::Password("secret".to_string()),
    );
    RunConfig::new(connection, "to_upload", source)
        .with_connections(connections)
        .with_monitor_interval(Duration::from_millis(20))
}

pub fn stress_test(config: RunConfig, connector: &MockConnector) -> StressTest<MockConnector> {
    StressTest::new(config, connector.clone()).with_probe(StaticProbe)
}

/// 阻塞运行并收集全部事件
pub fn run_collect(test: StressTest<MockConnector>) -> (Result<RunSummary, TransferError>, Vec<StressEvent>) {
    let (events, receiver) = EventSink::channel();
    let result = test.run(&events);
    drop(events);
    (result, receiver.iter().collect())
}

pub fn log_lines(events: &[StressEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            StressEvent::Log { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

pub fn progress_values(events: &[StressEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            StressEvent::Progress { percent } => Some(*percent),
            _ => None,
        })
        .collect()
}

pub fn file_progress_values(events: &[StressEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            StressEvent::FileProgress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}
