use indicatif::{ProgressBar, ProgressStyle};
use recsync::{ProgressReporter, SessionOutcome, SessionStatus, StreamType};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Download progress: one bar over the sessions, with the current step as its
/// message.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_run_start(&self, total_sessions: usize) {
        let pb = ProgressBar::new(total_sessions as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "  {spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} sessions {msg}",
        ) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn on_session_start(&self, _index: usize, _total: usize, name: &str) {
        let name = name.to_string();
        self.with_bar(|pb| pb.set_message(name));
    }

    fn on_stream_captured(&self, stream: StreamType) {
        self.with_bar(|pb| pb.set_message(format!("captured {stream}")));
    }

    fn on_download_start(&self, stream: StreamType, file_name: &str) {
        let message = format!("downloading {stream}: {file_name}");
        self.with_bar(|pb| pb.set_message(message));
    }

    fn on_session_complete(&self, outcome: &SessionOutcome) {
        let mark = match outcome.status {
            SessionStatus::Success => "\x1b[32m✓\x1b[0m",
            SessionStatus::Partial => "\x1b[33m⚠\x1b[0m",
            SessionStatus::Failed => "\x1b[31m✗\x1b[0m",
            SessionStatus::Skipped => "○",
        };
        let line = format!("  {} {}", mark, outcome.record.display_name());
        self.with_bar(|pb| {
            pb.println(line);
            pb.inc(1);
        });
    }

    fn on_run_complete(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}
