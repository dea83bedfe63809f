//! Browser session replayed from a HAR export.
//!
//! The operator records the recording pages in a real browser and exports the
//! network log. Each session URL maps to the HAR page whose title or first
//! request starts with it; that page's requests are delivered to the observer
//! in order. Cookies are the union of every request's cookies.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::{BrowserSession, Cookie, PageSession, RequestDescriptor, RequestObserver};
use crate::error::Error;

#[derive(Debug, Deserialize)]
struct HarFile {
    log: HarLog,
}

#[derive(Debug, Default, Deserialize)]
struct HarLog {
    #[serde(default)]
    pages: Vec<HarPage>,
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
struct HarPage {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct HarEntry {
    #[serde(default)]
    pageref: Option<String>,
    request: HarRequest,
}

#[derive(Debug, Deserialize)]
struct HarRequest {
    url: String,
    #[serde(default)]
    headers: Vec<HarPair>,
    #[serde(default)]
    cookies: Vec<HarPair>,
}

#[derive(Debug, Deserialize)]
struct HarPair {
    name: String,
    #[serde(default)]
    value: String,
}

impl HarRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

fn parse_cookie_header(header: &str) -> Vec<Cookie> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some(Cookie {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}

pub struct HarBrowser {
    path: PathBuf,
    log: HarLog,
}

impl HarBrowser {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let log = Self::read(path)?;
        info!(
            "Loaded {} pages and {} requests from {}",
            log.pages.len(),
            log.entries.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            log,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let har: HarFile = serde_json::from_str(json)?;
        Ok(Self {
            path: PathBuf::new(),
            log: har.log,
        })
    }

    fn read(path: &Path) -> Result<HarLog, Error> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Har(format!("{}: {}", path.display(), e)))?;
        let har: HarFile = serde_json::from_str(&content)?;
        Ok(har.log)
    }

    /// Re-read the export, picking up a capture taken after logging in.
    pub fn reload(&mut self) -> Result<(), Error> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        self.log = Self::read(&self.path)?;
        debug!("Reloaded {}", self.path.display());
        Ok(())
    }

    fn page_id_for(&self, url: &str) -> Option<&str> {
        let url = url.trim();
        self.log
            .pages
            .iter()
            .find(|page| {
                page.title.starts_with(url)
                    || self
                        .log
                        .entries
                        .iter()
                        .find(|e| e.pageref.as_deref() == Some(page.id.as_str()))
                        .is_some_and(|e| e.request.url.starts_with(url))
            })
            .map(|page| page.id.as_str())
    }

    fn cookie_jar(&self) -> Vec<Cookie> {
        let mut jar: Vec<Cookie> = Vec::new();
        for entry in &self.log.entries {
            let cookies = if entry.request.cookies.is_empty() {
                entry
                    .request
                    .header("Cookie")
                    .map(parse_cookie_header)
                    .unwrap_or_default()
            } else {
                entry
                    .request
                    .cookies
                    .iter()
                    .map(|c| Cookie {
                        name: c.name.clone(),
                        value: c.value.clone(),
                    })
                    .collect()
            };
            for cookie in cookies {
                match jar.iter_mut().find(|c| c.name == cookie.name) {
                    Some(existing) => existing.value = cookie.value,
                    None => jar.push(cookie),
                }
            }
        }
        jar
    }
}

impl BrowserSession for HarBrowser {
    type Page = HarPageSession;

    fn is_authenticated(&mut self) -> Result<bool, Error> {
        if self.cookie_jar().is_empty() {
            self.reload()?;
        }
        Ok(!self.cookie_jar().is_empty())
    }

    fn open_page(&mut self, url: &str) -> Result<Self::Page, Error> {
        let page_id = self
            .page_id_for(url)
            .ok_or_else(|| Error::Har(format!("no page recorded for {url}")))?;

        let mut requests: Vec<RequestDescriptor> = self
            .log
            .entries
            .iter()
            .filter(|e| e.pageref.as_deref() == Some(page_id))
            .map(|e| RequestDescriptor {
                url: e.request.url.clone(),
            })
            .collect();

        // Media fetched by the player may be logged without a page reference.
        requests.extend(
            self.log
                .entries
                .iter()
                .filter(|e| e.pageref.is_none() && e.request.header("Referer").is_some_and(|r| r.starts_with(url)))
                .map(|e| RequestDescriptor {
                    url: e.request.url.clone(),
                }),
        );

        debug!("Page {} replays {} requests", page_id, requests.len());
        Ok(HarPageSession {
            requests,
            delivered: false,
        })
    }

    fn cookies(&mut self) -> Result<Vec<Cookie>, Error> {
        Ok(self.cookie_jar())
    }
}

/// A recorded page. Every request is delivered on the first poll.
pub struct HarPageSession {
    requests: Vec<RequestDescriptor>,
    delivered: bool,
}

impl PageSession for HarPageSession {
    /// A network log carries no DOM; passcode pages surface as pages without
    /// media requests.
    fn has_password_field(&mut self) -> Result<bool, Error> {
        Ok(false)
    }

    fn wait_for_video(&mut self, _timeout: Duration) -> Result<bool, Error> {
        Ok(!self.requests.is_empty())
    }

    fn trigger_playback(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn poll_requests(&mut self, observer: &mut dyn RequestObserver) -> Result<(), Error> {
        if self.delivered {
            return Ok(());
        }
        for request in &self.requests {
            observer.on_request(request);
        }
        self.delivered = true;
        Ok(())
    }
}
