// 资源监控：周期性采样网络吞吐、进程内存与 CPU
use crate::config::STATUS_DISPLAY_TIMEOUT;
use crate::stress::event::{EventSink, StressEvent};
use crate::utils::error::TransferError;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TryRecvError};
use serde::Serialize;
use std::thread;
use std::time::Duration;
use sysinfo::{Networks, Pid, System};

/// 一次原始读数，字节计数为累计值
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeReading {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub memory_bytes: u64,
    pub cpu_percent: f32,
}

pub trait ResourceProbe: Send + 'static {
    fn read(&mut self) -> ProbeReading;
}

impl ResourceProbe for Box<dyn ResourceProbe> {
    fn read(&mut self) -> ProbeReading {
        (**self).read()
    }
}

/// 基于 sysinfo 的主机/进程统计
pub struct SysinfoProbe {
    system: System,
    networks: Networks,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                log::warn!("Cannot determine current pid, process stats disabled: {}", e);
                None
            }
        };

        Self {
            system: System::new(),
            networks: Networks::new_with_refreshed_list(),
            pid,
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn read(&mut self) -> ProbeReading {
        self.networks.refresh();
        let mut reading = ProbeReading::default();
        for (_name, data) in &self.networks {
            reading.bytes_sent += data.total_transmitted();
            reading.bytes_received += data.total_received();
        }

        if let Some(pid) = self.pid {
            self.system.refresh_cpu();
            if self.system.refresh_process(pid) {
                if let Some(process) = self.system.process(pid) {
                    reading.memory_bytes = process.memory();
                    reading.cpu_percent = process.cpu_usage();
                }
            }
        }

        reading
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonitorSample {
    pub sent_kbps: f64,
    pub received_kbps: f64,
    pub memory_bytes: u64,
    pub cpu_percent: f32,
}

impl MonitorSample {
    pub fn between(prev: &ProbeReading, now: &ProbeReading, interval: Duration) -> Self {
        let secs = interval.as_secs_f64();
        let rate = |delta: u64| {
            if secs > 0.0 {
                delta as f64 / secs / 1024.0
            } else {
                0.0
            }
        };

        Self {
            sent_kbps: rate(now.bytes_sent.saturating_sub(prev.bytes_sent)),
            received_kbps: rate(now.bytes_received.saturating_sub(prev.bytes_received)),
            memory_bytes: now.memory_bytes,
            cpu_percent: now.cpu_percent,
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "Upload: {:.2} KB/s | Download: {:.2} KB/s | App Usage: RAM: {:.2}MB | CPU: {:.2}%",
            self.sent_kbps,
            self.received_kbps,
            self.memory_bytes as f64 / (1024.0 * 1024.0),
            self.cpu_percent
        )
    }
}

/// 独立采样线程，生命周期与一次运行绑定；`stop` 或 drop 时一定 join
pub struct ResourceMonitor {
    stop: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ResourceMonitor {
    pub fn start<P: ResourceProbe>(
        probe: P,
        interval: Duration,
        events: EventSink,
    ) -> Result<Self, TransferError> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("resource-monitor".to_string())
            .spawn(move || sample_loop(probe, interval, stop_rx, events))?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stop(&mut self) {
        // 关闭通道即为停止信号
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Resource monitor thread panicked");
            }
        }
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample_loop<P: ResourceProbe>(
    mut probe: P,
    interval: Duration,
    stop: Receiver<()>,
    events: EventSink,
) {
    let ticker = tick(interval);
    let mut prev = probe.read();

    loop {
        select! {
            recv(stop) -> _ => break,
            recv(ticker) -> _ => {
                if !matches!(stop.try_recv(), Err(TryRecvError::Empty)) {
                    break;
                }

                let now = probe.read();
                let sample = MonitorSample::between(&prev, &now, interval);
                prev = now;

                events.emit(StressEvent::MonitorStatus {
                    message: sample.status_line(),
                    sample,
                    timeout_ms: STATUS_DISPLAY_TIMEOUT.as_millis() as u64,
                });
            }
        }
    }

    log::debug!("Resource monitor stopped");
}
