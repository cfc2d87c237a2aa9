// 终端进度显示
use crate::stress::{RunSummary, StressEvent};
use crate::utils::file::format_speed;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}";
const FILE_BAR_TEMPLATE: &str = "  files [{bar:40.yellow/blue}] {pos:>3}%";

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// 把事件流渲染为进度条、日志行和状态栏
pub struct ConsoleReporter {
    multi: MultiProgress,
    overall: ProgressBar,
    files: Option<ProgressBar>,
    status: ProgressBar,
    successes: usize,
    failures: usize,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let overall = multi.add(ProgressBar::new(100));
        overall.set_style(bar_style(BAR_TEMPLATE));
        overall.enable_steady_tick(Duration::from_millis(120));

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        Self {
            multi,
            overall,
            files: None,
            status,
            successes: 0,
            failures: 0,
        }
    }

    pub fn handle(&mut self, event: &StressEvent) {
        match event {
            StressEvent::Log { message, .. } => self.println(message),
            StressEvent::TaskFinished(outcome) => {
                if outcome.success {
                    self.successes += 1;
                } else {
                    self.failures += 1;
                }
                self.overall
                    .set_message(format!("{} ok / {} failed", self.successes, self.failures));
            }
            StressEvent::Progress { percent } => self.overall.set_position(u64::from(*percent)),
            StressEvent::FileProgress { percent, .. } => {
                let multi = &self.multi;
                let files = self.files.get_or_insert_with(|| {
                    let bar = multi.add(ProgressBar::new(100));
                    bar.set_style(bar_style(FILE_BAR_TEMPLATE));
                    bar
                });
                files.set_position(u64::from(*percent));
            }
            StressEvent::MonitorStatus { message, .. } => self.status.set_message(message.clone()),
            StressEvent::Summary(summary) => self.finish(summary),
        }
    }

    fn finish(&mut self, summary: &RunSummary) {
        self.status.finish_and_clear();
        if let Some(files) = self.files.take() {
            files.finish_and_clear();
        }

        let secs = summary.elapsed.as_secs();
        let avg_speed = if secs > 0 {
            summary.bytes_uploaded / secs
        } else {
            summary.bytes_uploaded
        };
        self.overall.finish_with_message(format!(
            "{} ok / {} failed (avg speed: {})",
            summary.successes,
            summary.failures,
            format_speed(avg_speed)
        ));
    }

    fn println(&self, message: &str) {
        if self.multi.println(message).is_err() {
            eprintln!("{}", message);
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}
