use std::process::Command;
use tracing::debug;

use super::{DownloadError, Downloader, FetchRequest};
use crate::config::DownloadConfig;

const STDERR_PREVIEW: usize = 500;

/// Runs `curl` with the headers a browser sends for a media element.
#[derive(Debug, Clone)]
pub struct CurlDownloader {
    program: String,
    user_agent: String,
}

impl CurlDownloader {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            program: config.program.clone(),
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn args(&self, request: &FetchRequest<'_>) -> Vec<String> {
        let headers = [
            format!("User-Agent: {}", self.user_agent),
            "Accept: video/webm,video/ogg,video/*;q=0.9,application/ogg;q=0.7,audio/*;q=0.6,*/*;q=0.5"
                .to_string(),
            "Accept-Language: en-US,en;q=0.8,pt-BR;q=0.5,pt;q=0.3".to_string(),
            format!("Referer: {}", request.referer),
            "DNT: 1".to_string(),
            "Sec-GPC: 1".to_string(),
            "Connection: keep-alive".to_string(),
            format!("Cookie: {}", request.cookie_header),
            "Sec-Fetch-Dest: video".to_string(),
            "Sec-Fetch-Mode: no-cors".to_string(),
            "Sec-Fetch-Site: same-site".to_string(),
            "Accept-Encoding: identity".to_string(),
            "Priority: u=4".to_string(),
        ];

        let mut args = vec![request.url.to_string()];
        for header in headers {
            args.push("-H".to_string());
            args.push(header);
        }
        args.push("--compressed".to_string());
        args.push("--output".to_string());
        args.push(request.output.to_string_lossy().into_owned());
        args
    }

    pub fn command(&self, request: &FetchRequest<'_>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(request));
        cmd
    }
}

impl Downloader for CurlDownloader {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<(), DownloadError> {
        debug!("Running {} -> {}", self.program, request.output.display());
        let output = self
            .command(request)
            .output()
            .map_err(|source| DownloadError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(STDERR_PREVIEW)
                .collect();
            return Err(DownloadError::Exit {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
