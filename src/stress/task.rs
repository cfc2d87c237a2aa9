// 单个上传任务
use crate::config::RunConfig;
use crate::ssh::{Connector, RemoteSession};
use crate::stress::cancel::CancellationToken;
use crate::stress::event::{ErrorKind, EventSink, StressEvent, TaskOutcome};
use crate::stress::progress::FileProgress;
use crate::utils::error::TransferError;
use crate::utils::file::{file_name_of, list_source_files, remote_path};
use std::ops::{Deref, DerefMut};
use std::path::Path;

/// 作用域内持有连接，任何退出路径上都会关闭
struct SessionGuard<S: RemoteSession> {
    task_id: usize,
    session: S,
}

impl<S: RemoteSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: RemoteSession> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: RemoteSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Err(e) = self.session.close() {
            log::warn!("Task {}: failed to close connection: {}", self.task_id, e);
        }
    }
}

/// 一次上传尝试：建立连接、上传单个文件或整个目录、释放连接
pub struct TransferTask<'a, C: Connector> {
    id: usize,
    config: &'a RunConfig,
    connector: &'a C,
    cancel: &'a CancellationToken,
    events: &'a EventSink,
}

impl<'a, C: Connector> TransferTask<'a, C> {
    pub fn new(
        id: usize,
        config: &'a RunConfig,
        connector: &'a C,
        cancel: &'a CancellationToken,
        events: &'a EventSink,
    ) -> Self {
        Self {
            id,
            config,
            connector,
            cancel,
            events,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// 所有错误都在这里转换为任务结果，不会向调度器传播
    pub fn run(&self) -> TaskOutcome {
        if self.cancel.is_canceled() {
            self.events.task_log(self.id, "Canceled before starting.");
            return TaskOutcome::failed_with(self.id, ErrorKind::Canceled, "canceled before starting");
        }

        match self.execute() {
            Ok((files, bytes)) => TaskOutcome::succeeded(self.id, files, bytes),
            Err(TransferError::Canceled) => {
                TaskOutcome::failed_with(self.id, ErrorKind::Canceled, "canceled during file uploads")
            }
            Err(e) => {
                self.events
                    .task_log(self.id, format!("Upload failed - {}", e));
                TaskOutcome::failed(self.id, &e)
            }
        }
    }

    fn execute(&self) -> Result<(usize, u64), TransferError> {
        self.events.task_log(self.id, "Starting upload...");

        let session = self.connector.open(&self.config.connection)?;
        let mut session = SessionGuard {
            task_id: self.id,
            session,
        };

        if self.config.multi_file {
            self.upload_directory(&mut *session)
        } else {
            self.checkpoint()?;
            let bytes = self.upload_one(&mut *session, &self.config.source)?;
            self.events.task_log(
                self.id,
                format!("Upload successful to {}.", self.remote_path_for(&self.config.source)?),
            );
            Ok((1, bytes))
        }
    }

    fn upload_directory<S: RemoteSession>(&self, session: &mut S) -> Result<(usize, u64), TransferError> {
        let files = list_source_files(&self.config.source)?;
        self.events
            .task_log(self.id, format!("Uploading {} files...", files.len()));

        // 仅在单连接时上报文件级子进度。多连接时被抑制，
        // 这种不对称看起来并非有意设计，改动前需确认
        let mut sub_progress = if self.config.connections == 1 {
            Some(FileProgress::new(files.len()))
        } else {
            None
        };

        let mut bytes = 0;
        for file in &files {
            self.checkpoint()?;
            bytes += self.upload_one(session, file)?;
            self.events.task_log(
                self.id,
                format!("Upload successful to dir: '{}'.", self.remote_path_for(file)?),
            );

            if let Some(progress) = sub_progress.as_mut() {
                self.events.emit(StressEvent::FileProgress {
                    task_id: self.id,
                    percent: progress.advance(),
                });
            }
        }

        Ok((files.len(), bytes))
    }

    fn upload_one<S: RemoteSession>(&self, session: &mut S, local: &Path) -> Result<u64, TransferError> {
        let remote = self.remote_path_for(local)?;
        session.put(local, &remote)
    }

    fn remote_path_for(&self, local: &Path) -> Result<String, TransferError> {
        let name = file_name_of(local).ok_or_else(|| {
            TransferError::InvalidConfig(format!("cannot determine file name of {}", local.display()))
        })?;
        Ok(remote_path(&self.config.remote_dir, &name, self.id))
    }

    fn checkpoint(&self) -> Result<(), TransferError> {
        if self.cancel.is_canceled() {
            self.events.task_log(self.id, "Canceled during file uploads.");
            return Err(TransferError::Canceled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthMethod, ConnectionConfig};
    use crate::stress::event::StressEvent;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        puts: Mutex<Vec<String>>,
        closes: AtomicUsize,
    }

    struct FakeSession {
        recorder: Arc<Recorder>,
        fail_on: Option<String>,
        cancel_after_put: Option<CancellationToken>,
    }

    impl RemoteSession for FakeSession {
        fn put(&mut self, local: &Path, remote: &str) -> Result<u64, TransferError> {
            if self.fail_on.as_deref() == Some(remote) {
                return Err(TransferError::UploadFailed {
                    local: local.display().to_string(),
                    remote: remote.to_string(),
                    message: "disk full".to_string(),
                });
            }
            self.recorder.puts.lock().unwrap().push(remote.to_string());
            if let Some(token) = &self.cancel_after_put {
                token.cancel();
            }
            Ok(fs::metadata(local)?.len())
        }

        fn close(&mut self) -> Result<(), TransferError> {
            self.recorder.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeConnector {
        recorder: Arc<Recorder>,
        refuse: bool,
        fail_on: Option<String>,
        cancel_after_put: Option<CancellationToken>,
    }

    impl Connector for FakeConnector {
        type Session = FakeSession;

        fn open(&self, config: &ConnectionConfig) -> Result<FakeSession, TransferError> {
            if self.refuse {
                return Err(TransferError::AuthenticationFailed {
                    username: config.username.clone(),
                    source: ssh2::Error::new(ssh2::ErrorCode::Session(-18), "access denied"),
                });
            }
            Ok(FakeSession {
                recorder: Arc::clone(&self.recorder),
                fail_on: self.fail_on.clone(),
                cancel_after_put: self.cancel_after_put.clone(),
            })
        }
    }

    fn config(source: &Path) -> RunConfig {
        let connection = ConnectionConfig::new("sftp.test", 22, "tester", AuthMethod::Password("pw".into()));
        RunConfig::new(connection, "inbox", source)
    }

    fn logs(receiver: &crossbeam_channel::Receiver<StressEvent>) -> Vec<String> {
        receiver
            .try_iter()
            .filter_map(|event| match event {
                StressEvent::Log { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_single_file_upload_uses_task_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dummy.txt");
        fs::write(&file, b"0123456789").unwrap();

        let config = config(&file);
        let connector = FakeConnector::default();
        let cancel = CancellationToken::new();
        let (events, receiver) = EventSink::channel();

        let outcome = TransferTask::new(3, &config, &connector, &cancel, &events).run();
        assert!(outcome.success);
        assert_eq!(outcome.bytes, 10);
        assert_eq!(
            *connector.recorder.puts.lock().unwrap(),
            vec!["inbox/dummy_taskid_3.txt".to_string()]
        );
        assert_eq!(connector.recorder.closes.load(Ordering::SeqCst), 1);
        assert_eq!(
            logs(&receiver),
            vec![
                "Task 3: Starting upload...",
                "Task 3: Upload successful to inbox/dummy_taskid_3.txt.",
            ]
        );
    }

    #[test]
    fn test_canceled_before_start_never_connects() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dummy.txt");
        fs::write(&file, b"x").unwrap();

        let config = config(&file);
        let connector = FakeConnector::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (events, receiver) = EventSink::channel();

        let outcome = TransferTask::new(0, &config, &connector, &cancel, &events).run();
        assert!(outcome.is_canceled());
        assert!(connector.recorder.puts.lock().unwrap().is_empty());
        assert_eq!(connector.recorder.closes.load(Ordering::SeqCst), 0);
        assert_eq!(logs(&receiver), vec!["Task 0: Canceled before starting."]);
    }

    #[test]
    fn test_connection_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dummy.txt");
        fs::write(&file, b"x").unwrap();

        let config = config(&file);
        let connector = FakeConnector {
            refuse: true,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let (events, receiver) = EventSink::channel();

        let outcome = TransferTask::new(1, &config, &connector, &cancel, &events).run();
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Connection));
        let lines = logs(&receiver);
        let last = lines.last().unwrap();
        assert!(last.starts_with("Task 1: Upload failed - Authentication failed for user tester: "));
        assert!(last.contains("access denied"));
    }

    #[test]
    fn test_multi_file_failure_closes_connection_and_keeps_partial_uploads() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.bin", "b.bin", "c.bin"] {
            fs::write(dir.path().join(name), b"data").unwrap();
        }

        let config = config(dir.path()).with_multi_file(true);
        let connector = FakeConnector {
            fail_on: Some("inbox/b.bin".to_string()),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let (events, _receiver) = EventSink::channel();

        let outcome = TransferTask::new(0, &config, &connector, &cancel, &events).run();
        assert_eq!(outcome.error_kind, Some(ErrorKind::Transfer));
        assert_eq!(*connector.recorder.puts.lock().unwrap(), vec!["inbox/a.bin".to_string()]);
        assert_eq!(connector.recorder.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_between_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.bin", "b.bin", "c.bin"] {
            fs::write(dir.path().join(name), b"data").unwrap();
        }

        let config = config(dir.path()).with_multi_file(true);
        let cancel = CancellationToken::new();
        let connector = FakeConnector {
            cancel_after_put: Some(cancel.clone()),
            ..Default::default()
        };
        let (events, receiver) = EventSink::channel();

        let outcome = TransferTask::new(0, &config, &connector, &cancel, &events).run();
        assert!(outcome.is_canceled());
        assert_eq!(connector.recorder.puts.lock().unwrap().len(), 1);
        assert_eq!(connector.recorder.closes.load(Ordering::SeqCst), 1);
        assert!(logs(&receiver).contains(&"Task 0: Canceled during file uploads.".to_string()));
    }

    #[test]
    fn test_sub_progress_only_with_single_connection() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            fs::write(dir.path().join(format!("f{}.txt", i)), b"data").unwrap();
        }

        let cancel = CancellationToken::new();
        let connector = FakeConnector::default();

        let single = config(dir.path()).with_multi_file(true).with_connections(1);
        let (events, receiver) = EventSink::channel();
        TransferTask::new(0, &single, &connector, &cancel, &events).run();
        let percents: Vec<u8> = receiver
            .try_iter()
            .filter_map(|event| match event {
                StressEvent::FileProgress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![25, 50, 75, 100]);

        let several = config(dir.path()).with_multi_file(true).with_connections(2);
        let (events, receiver) = EventSink::channel();
        TransferTask::new(1, &several, &connector, &cancel, &events).run();
        assert!(!receiver
            .try_iter()
            .any(|event| matches!(event, StressEvent::FileProgress { .. })));
    }
}
