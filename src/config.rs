use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Extension (without the dot) of the recordings to scan and rename.
    #[serde(default = "default_media_extension")]
    pub media_extension: String,
    /// Year applied to spreadsheet dates that carry none. When unset the year
    /// is inferred so the date falls on or before today.
    #[serde(default)]
    pub year: Option<i32>,
    /// Glob patterns for file names the scanner should ignore.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub program: String,
    pub media_host: String,
    pub referer: String,
    pub user_agent: String,
    /// Existing files at or below this size are treated as truncated.
    pub min_existing_size: u64,
    /// Fresh downloads at or below this size are deleted and counted as failed.
    pub min_download_size: u64,
    pub video_wait_ms: u64,
    pub settle_ms: u64,
}

fn default_media_extension() -> String {
    "mp4".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            media_extension: default_media_extension(),
            year: None,
            ignore_patterns: Vec::new(),
            download: DownloadConfig::default(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            program: "curl".to_string(),
            media_host: "ssrweb.zoom.us".to_string(),
            referer: "https://sistemapoliedro.zoom.us/".to_string(),
            user_agent:
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:142.0) Gecko/20100101 Firefox/142.0"
                    .to_string(),
            min_existing_size: 100_000,
            min_download_size: 512 * 1024,
            video_wait_ms: 5_000,
            settle_ms: 1_000,
        }
    }
}

/// Layered configuration: optional `Config.toml` in the working directory,
/// then `RECSYNC__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("RECSYNC").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

impl AppConfig {
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_uses_defaults() {
        let config = Config::builder()
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>()
            .unwrap();
        assert_eq!(config.media_extension, "mp4");
        assert_eq!(config.year, None);
        assert!(config.ignore_patterns.is_empty());
        assert_eq!(config.download.program, "curl");
        assert_eq!(config.download.min_existing_size, 100_000);
    }

    #[test]
    fn test_partial_download_table() {
        let config = Config::builder()
            .add_source(config::File::from_str(
                "year = 2025\n[download]\nprogram = \"/usr/local/bin/curl\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>()
            .unwrap();
        assert_eq!(config.year, Some(2025));
        assert_eq!(config.download.program, "/usr/local/bin/curl");
        assert_eq!(config.download.min_download_size, 512 * 1024);
    }

    #[test]
    fn test_to_toml_round_trips_year() {
        let config = AppConfig {
            year: Some(2024),
            ..AppConfig::default()
        };
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("year = 2024"));
        assert!(rendered.contains("[download]"));
    }
}
