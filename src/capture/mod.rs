//! Capture-and-download driver.
//!
//! For each session the driver opens the recording page through a
//! [`BrowserSession`], collects signed media URLs from the page's outgoing
//! requests and hands each stream to a [`Downloader`]. Success is judged only
//! by the file left on disk.

mod curl;
pub mod har;

pub use curl::CurlDownloader;
pub use har::HarBrowser;

use colored::*;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::error::Error;
use crate::key::{FilenameKey, Side};
use crate::progress::ProgressReporter;
use crate::record::SessionRecord;
use crate::report::{print_rule, record_row, semicolon_writer, RECORD_HEADERS};

pub const FAILED_DOWNLOADS_FILE: &str = "failed_downloads.csv";
pub const PARTIAL_DOWNLOADS_FILE: &str = "partial_downloads.csv";

const SIGNATURE_MARKER: &str = "Policy=";
const MEDIA_SUFFIX: &str = ".mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Screen,
    Camera,
    Gallery,
}

impl StreamType {
    /// Classify a media URL by the stream tag embedded in it.
    pub fn from_url(url: &str) -> Option<Self> {
        let lower = url.to_lowercase();
        if lower.contains("_as_") {
            Some(StreamType::Screen)
        } else if lower.contains("_avo_") {
            Some(StreamType::Camera)
        } else if lower.contains("_gallery_") {
            Some(StreamType::Gallery)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Screen => "screen",
            StreamType::Camera => "camera",
            StreamType::Gallery => "gallery",
        }
    }

    /// File-name side tag: screen is the left file, camera the right one.
    pub fn side_tag(&self) -> &'static str {
        match self {
            StreamType::Screen => Side::Esq.as_str(),
            StreamType::Camera => Side::Dir.as_str(),
            StreamType::Gallery => self.as_str(),
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: String,
}

/// Receives every outgoing request of a page while the page is open.
pub trait RequestObserver {
    fn on_request(&mut self, request: &RequestDescriptor);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// `name=value` pairs joined by `; `, dropping cookies with an empty name or
/// value.
pub fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .filter(|c| !c.name.is_empty() && !c.value.is_empty())
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// An open recording page. Closed when dropped.
pub trait PageSession {
    fn has_password_field(&mut self) -> Result<bool, Error>;
    /// Wait up to `timeout` for a video element; `false` when none appeared.
    fn wait_for_video(&mut self, timeout: Duration) -> Result<bool, Error>;
    /// Ask every video element to start playing.
    fn trigger_playback(&mut self) -> Result<(), Error>;
    /// Deliver the requests issued since the last poll.
    fn poll_requests(&mut self, observer: &mut dyn RequestObserver) -> Result<(), Error>;
}

pub trait BrowserSession {
    type Page: PageSession;

    fn is_authenticated(&mut self) -> Result<bool, Error>;
    fn open_page(&mut self, url: &str) -> Result<Self::Page, Error>;
    fn cookies(&mut self) -> Result<Vec<Cookie>, Error>;
}

/// Block until the browser reports an authenticated session, calling
/// `wait_for_login` between checks so the operator can log in.
pub fn ensure_logged_in<B, F>(browser: &mut B, mut wait_for_login: F) -> Result<(), Error>
where
    B: BrowserSession,
    F: FnMut() -> io::Result<()>,
{
    if browser.is_authenticated()? {
        info!("Already logged in");
        return Ok(());
    }
    loop {
        warn!("Login required");
        wait_for_login()?;
        if browser.is_authenticated()? {
            info!("Login successful");
            return Ok(());
        }
        warn!("Login verification failed. Please try again.");
    }
}

/// Page-scoped accumulator of signed media URLs, one per stream type. The
/// first URL seen for a stream wins.
#[derive(Debug)]
pub struct CapturedStreams {
    media_host: String,
    streams: Vec<(StreamType, String)>,
}

impl CapturedStreams {
    pub fn new(media_host: &str) -> Self {
        Self {
            media_host: media_host.to_string(),
            streams: Vec::new(),
        }
    }

    pub fn is_signed_media_url(&self, url: &str) -> bool {
        url.contains(&self.media_host) && url.contains(MEDIA_SUFFIX) && url.contains(SIGNATURE_MARKER)
    }

    pub fn get(&self, stream: StreamType) -> Option<&str> {
        self.streams
            .iter()
            .find(|(s, _)| *s == stream)
            .map(|(_, url)| url.as_str())
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StreamType, &str)> {
        self.streams.iter().map(|(s, url)| (*s, url.as_str()))
    }

    pub fn stream_types(&self) -> Vec<StreamType> {
        self.streams.iter().map(|(s, _)| *s).collect()
    }
}

impl RequestObserver for CapturedStreams {
    fn on_request(&mut self, request: &RequestDescriptor) {
        if !self.is_signed_media_url(&request.url) {
            return;
        }
        let Some(stream) = StreamType::from_url(&request.url) else {
            return;
        };
        if self.get(stream).is_none() {
            debug!("Captured {} URL ({} chars)", stream, request.url.len());
            self.streams.push((stream, request.url.clone()));
        }
    }
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed with code {code:?}: {stderr}")]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("No output file created")]
    Missing,

    #[error("Download too small ({size} bytes)")]
    TooSmall { size: u64 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub output: &'a Path,
    pub cookie_header: &'a str,
    pub referer: &'a str,
}

/// External download tool. Implementations only run the tool; the driver
/// judges the result by the file it leaves behind.
pub trait Downloader {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<(), DownloadError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Success,
    Partial,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub record: SessionRecord,
    pub status: SessionStatus,
    pub downloaded: Vec<StreamType>,
    pub failed: Vec<StreamType>,
    pub error: Option<String>,
}

impl SessionOutcome {
    fn failed(record: &SessionRecord, error: impl Into<String>) -> Self {
        Self {
            record: record.clone(),
            status: SessionStatus::Failed,
            downloaded: Vec::new(),
            failed: Vec::new(),
            error: Some(error.into()),
        }
    }
}

fn exceeds(path: &Path, min_size: u64) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > min_size)
        .unwrap_or(false)
}

pub struct CaptureDriver<'a, B: BrowserSession, D: Downloader> {
    browser: &'a mut B,
    downloader: &'a D,
    config: &'a DownloadConfig,
    output_dir: &'a Path,
    extension: &'a str,
}

impl<'a, B: BrowserSession, D: Downloader> CaptureDriver<'a, B, D> {
    pub fn new(
        browser: &'a mut B,
        downloader: &'a D,
        config: &'a DownloadConfig,
        output_dir: &'a Path,
        extension: &'a str,
    ) -> Self {
        Self {
            browser,
            downloader,
            config,
            output_dir,
            extension,
        }
    }

    fn target(&self, key: &FilenameKey, side_tag: &str) -> PathBuf {
        self.output_dir.join(key.file_name(side_tag, self.extension))
    }

    /// Process every record in order. Per-session failures are recorded in
    /// the report and never stop the run.
    pub fn run(&mut self, records: &[SessionRecord], reporter: &dyn ProgressReporter) -> DownloadReport {
        reporter.on_run_start(records.len());
        let mut report = DownloadReport::default();

        for (index, record) in records.iter().enumerate() {
            reporter.on_session_start(index, records.len(), &record.display_name());
            info!(
                "[{}/{}] Processing: {}",
                index + 1,
                records.len(),
                record.display_name()
            );
            let outcome = self.process(record, reporter);
            reporter.on_session_complete(&outcome);
            report.push(outcome);
        }

        reporter.on_run_complete();
        report
    }

    pub fn process(&mut self, record: &SessionRecord, reporter: &dyn ProgressReporter) -> SessionOutcome {
        let key = record.key();
        let min_existing = self.config.min_existing_size;

        if exceeds(&self.target(&key, Side::Esq.as_str()), min_existing)
            && exceeds(&self.target(&key, Side::Dir.as_str()), min_existing)
        {
            info!("Both files already exist, skipping");
            return SessionOutcome {
                record: record.clone(),
                status: SessionStatus::Skipped,
                downloaded: vec![StreamType::Screen, StreamType::Camera],
                failed: Vec::new(),
                error: None,
            };
        }

        let streams = match self.capture(&record.url) {
            Ok(streams) => streams,
            Err(reason) => {
                warn!("{}", reason);
                return SessionOutcome::failed(record, reason);
            }
        };
        for stream in streams.stream_types() {
            reporter.on_stream_captured(stream);
        }
        info!(
            "Found {} stream(s): {}",
            streams.len(),
            streams
                .stream_types()
                .iter()
                .map(StreamType::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let cookies = match self.browser.cookies() {
            Ok(cookies) => cookies,
            Err(e) => return SessionOutcome::failed(record, e.to_string()),
        };
        let cookie_header = cookie_header(&cookies);
        debug!("{} cookies, header length {}", cookies.len(), cookie_header.len());

        let mut outcome = SessionOutcome {
            record: record.clone(),
            status: SessionStatus::Failed,
            downloaded: Vec::new(),
            failed: Vec::new(),
            error: None,
        };

        for (stream, url) in streams.iter() {
            let output = self.target(&key, stream.side_tag());
            if exceeds(&output, min_existing) {
                info!("Skipping {} (already downloaded)", stream);
                outcome.downloaded.push(stream);
                continue;
            }

            let file_name = output
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            reporter.on_download_start(stream, &file_name);
            info!("Downloading {} stream -> {}", stream, file_name);

            match self.download(url, &output, &cookie_header) {
                Ok(size) => {
                    info!(
                        "{} Saved: {} ({:.1} MB)",
                        "✓".green(),
                        file_name,
                        size as f64 / 1024.0 / 1024.0
                    );
                    outcome.downloaded.push(stream);
                }
                Err(e) => {
                    warn!("{} {} stream failed: {}", "✗".red(), stream, e);
                    outcome.failed.push(stream);
                    outcome.error.get_or_insert_with(|| e.to_string());
                }
            }
        }

        outcome.status = if outcome.downloaded.is_empty() {
            SessionStatus::Failed
        } else if !outcome.failed.is_empty() {
            SessionStatus::Partial
        } else {
            SessionStatus::Success
        };
        outcome
    }

    /// Open the page, collect signed URLs, close the page.
    fn capture(&mut self, url: &str) -> Result<CapturedStreams, String> {
        let mut captured = CapturedStreams::new(&self.config.media_host);
        let settle = Duration::from_millis(self.config.settle_ms);

        let mut page = self
            .browser
            .open_page(url)
            .map_err(|e| format!("Error loading page: {e}"))?;

        if page.has_password_field().map_err(|e| e.to_string())? {
            return Err("Password required".to_string());
        }

        match page.wait_for_video(Duration::from_millis(self.config.video_wait_ms)) {
            Ok(true) => {}
            Ok(false) => debug!("No video element appeared"),
            Err(e) => debug!("Waiting for video failed: {}", e),
        }
        thread::sleep(settle);
        page.poll_requests(&mut captured).map_err(|e| e.to_string())?;

        if captured.len() < 2 {
            debug!("Triggering playback");
            if let Err(e) = page.trigger_playback() {
                debug!("Playback trigger failed: {}", e);
            }
            thread::sleep(settle);
            page.poll_requests(&mut captured).map_err(|e| e.to_string())?;
        }
        drop(page);

        if captured.is_empty() {
            return Err("No video URLs found".to_string());
        }
        Ok(captured)
    }

    /// Run the downloader and check what it left behind. Undersized output is
    /// deleted, whether or not the downloader reported an error.
    fn download(&self, url: &str, output: &Path, cookie_header: &str) -> Result<u64, DownloadError> {
        let fetched = self.downloader.fetch(&FetchRequest {
            url,
            output,
            cookie_header,
            referer: &self.config.referer,
        });
        if let Err(e) = fetched {
            if let Ok(m) = fs::metadata(output) {
                if m.len() <= self.config.min_download_size {
                    remove_partial(output);
                }
            }
            return Err(e);
        }

        let size = match fs::metadata(output) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(DownloadError::Missing),
            Err(e) => return Err(e.into()),
        };
        if size <= self.config.min_download_size {
            remove_partial(output);
            return Err(DownloadError::TooSmall { size });
        }
        Ok(size)
    }
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed partial download {}", path.display()),
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub successful: Vec<SessionOutcome>,
    pub partial: Vec<SessionOutcome>,
    pub failed: Vec<SessionOutcome>,
    pub skipped: Vec<SessionOutcome>,
}

impl DownloadReport {
    pub fn push(&mut self, outcome: SessionOutcome) {
        match outcome.status {
            SessionStatus::Success => self.successful.push(outcome),
            SessionStatus::Partial => self.partial.push(outcome),
            SessionStatus::Failed => self.failed.push(outcome),
            SessionStatus::Skipped => self.skipped.push(outcome),
        }
    }

    pub fn total(&self) -> usize {
        self.successful.len() + self.partial.len() + self.failed.len() + self.skipped.len()
    }

    /// Write the failed and partial sessions, when any, for a later retry.
    pub fn write_reports(&self, dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let mut written = Vec::new();
        for (outcomes, name) in [
            (&self.failed, FAILED_DOWNLOADS_FILE),
            (&self.partial, PARTIAL_DOWNLOADS_FILE),
        ] {
            if outcomes.is_empty() {
                continue;
            }
            let path = dir.join(name);
            let mut wtr = semicolon_writer(&path)?;
            let mut headers = RECORD_HEADERS.to_vec();
            headers.push("Error");
            wtr.write_record(&headers)?;
            for outcome in outcomes {
                let mut row = record_row(&outcome.record);
                row.push(outcome.error.clone().unwrap_or_default());
                wtr.write_record(&row)?;
            }
            wtr.flush()?;
            written.push(path);
        }
        Ok(written)
    }

    pub fn print_summary(&self) {
        println!();
        print_rule('=');
        println!("{}", "DOWNLOAD COMPLETE".bold());
        print_rule('=');
        println!(
            "  {} Successful (both streams): {}",
            "✓".green(),
            self.successful.len()
        );
        println!(
            "  {} Partial (one stream only): {}",
            "⚠".yellow(),
            self.partial.len()
        );
        println!("  {} Failed: {}", "✗".red(), self.failed.len());
        println!(
            "  {} Skipped (already existed): {}",
            "○".dimmed(),
            self.skipped.len()
        );

        if !self.failed.is_empty() {
            println!();
            println!("  Failed recordings:");
            for outcome in &self.failed {
                println!(
                    "    - {}: {}",
                    outcome.record.title,
                    outcome.error.as_deref().unwrap_or("Unknown error")
                );
            }
        }

        if !self.partial.is_empty() {
            println!();
            println!("  Partial recordings (need manual check):");
            for outcome in &self.partial {
                let join = |streams: &[StreamType]| {
                    streams
                        .iter()
                        .map(StreamType::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                println!(
                    "    - {}: got [{}], missing [{}]",
                    outcome.record.title,
                    join(&outcome.downloaded),
                    join(&outcome.failed)
                );
            }
        }
    }
}
