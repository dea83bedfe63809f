pub mod audit;
pub mod capture;
pub mod config;
pub mod date;
pub mod error;
pub mod key;
pub mod progress;
pub mod reconcile;
pub mod record;
pub mod rename;
pub mod report;
pub mod scanner;

pub use capture::{CaptureDriver, DownloadReport, SessionOutcome, SessionStatus, StreamType};
pub use crate::config::{AppConfig, DownloadConfig};
pub use date::{DateNormalizer, NormalizedDate};
pub use error::Error;
pub use key::{FilenameKey, Side};
pub use progress::{ProgressReporter, SilentReporter};
pub use reconcile::{reconcile, ReconciliationResult};
pub use record::{LoadOptions, RecordLoader, SessionRecord};
pub use scanner::{scan_media_files, FileScan};
