use crate::capture::{SessionOutcome, StreamType};

/// Trait for reporting download progress.
///
/// The CLI implements it with indicatif; tests use [`SilentReporter`].
/// All methods have default no-op implementations.
pub trait ProgressReporter {
    fn on_run_start(&self, _total_sessions: usize) {}
    fn on_session_start(&self, _index: usize, _total: usize, _name: &str) {}
    fn on_stream_captured(&self, _stream: StreamType) {}
    fn on_download_start(&self, _stream: StreamType, _file_name: &str) {}
    fn on_session_complete(&self, _outcome: &SessionOutcome) {}
    fn on_run_complete(&self) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
