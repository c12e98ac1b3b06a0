//! Paging engine configuration.
//!
//! `PagerConfig` carries everything an engine needs at construction. Loading it
//! from a TOML file is available behind the `config` cargo feature:
//!
//! ```toml
//! poll_interval_ms = 250
//! watch = "notify"
//! charset = "utf-8"
//!
//! [scan]
//! block_size = 65536
//! backscan_initial = 4096
//! backscan_max = 1048576
//! checkpoint_stride = 1024
//! max_recent_boundaries = 65536
//! ```

use crate::error::{PagerError, Result};
use crate::file_handler::{Charset, ScanLimits};
use std::str::FromStr;
use std::time::Duration;

/// How the change monitor learns about modifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    /// Check the fingerprint on a fixed cadence only
    #[default]
    Poll,
    /// Also wake up on OS change notifications, polling as a fallback
    Notify,
}

impl FromStr for WatchMode {
    type Err = PagerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poll" => Ok(WatchMode::Poll),
            "notify" => Ok(WatchMode::Notify),
            other => Err(PagerError::config(format!("unknown watch mode: {other}"))),
        }
    }
}

/// Configuration for a paging engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerConfig {
    /// Cadence of the change monitor's fingerprint checks
    pub poll_interval: Duration,
    pub watch_mode: WatchMode,
    /// Charset used to decode every line
    pub charset: Charset,
    pub scan: ScanLimits,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            watch_mode: WatchMode::default(),
            charset: Charset::default(),
            scan: ScanLimits::default(),
        }
    }
}

impl PagerConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_watch_mode(mut self, mode: WatchMode) -> Self {
        self.watch_mode = mode;
        self
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_scan_limits(mut self, scan: ScanLimits) -> Self {
        self.scan = scan;
        self
    }
}

#[cfg(feature = "config")]
mod file {
    use super::*;
    use serde::Deserialize;
    use std::path::{Path, PathBuf};

    /// On-disk shape of the configuration; every field is optional
    #[derive(Debug, Default, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ConfigFile {
        poll_interval_ms: Option<u64>,
        watch: Option<String>,
        charset: Option<String>,
        #[serde(default)]
        scan: ScanFile,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ScanFile {
        block_size: Option<usize>,
        backscan_initial: Option<usize>,
        backscan_max: Option<usize>,
        checkpoint_stride: Option<u64>,
        max_recent_boundaries: Option<usize>,
    }

    impl PagerConfig {
        /// Parse a TOML document, filling missing keys with defaults
        pub fn from_toml_str(text: &str) -> Result<Self> {
            let raw: ConfigFile =
                toml::from_str(text).map_err(|e| PagerError::config(e.to_string()))?;
            let defaults = PagerConfig::default();
            let scan = ScanLimits {
                block_size: raw.scan.block_size.unwrap_or(defaults.scan.block_size),
                backscan_initial: raw
                    .scan
                    .backscan_initial
                    .unwrap_or(defaults.scan.backscan_initial),
                backscan_max: raw.scan.backscan_max.unwrap_or(defaults.scan.backscan_max),
                checkpoint_stride: raw
                    .scan
                    .checkpoint_stride
                    .unwrap_or(defaults.scan.checkpoint_stride),
                max_recent_boundaries: raw
                    .scan
                    .max_recent_boundaries
                    .unwrap_or(defaults.scan.max_recent_boundaries),
            };

            Ok(Self {
                poll_interval: raw
                    .poll_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.poll_interval),
                watch_mode: raw
                    .watch
                    .as_deref()
                    .map(WatchMode::from_str)
                    .transpose()?
                    .unwrap_or(defaults.watch_mode),
                charset: raw
                    .charset
                    .as_deref()
                    .map(Charset::from_str)
                    .transpose()?
                    .unwrap_or(defaults.charset),
                scan,
            })
        }

        /// Load configuration from `path`
        pub fn load(path: &Path) -> Result<Self> {
            let text = std::fs::read_to_string(path).map_err(|e| {
                PagerError::config(format!("cannot read {}: {}", path.display(), e))
            })?;
            Self::from_toml_str(&text)
        }

        /// Load `<config dir>/logpager/config.toml`, or defaults when it does not exist
        pub fn load_default() -> Result<Self> {
            match Self::default_path() {
                Some(path) if path.is_file() => Self::load(&path),
                _ => Ok(Self::default()),
            }
        }

        pub fn default_path() -> Option<PathBuf> {
            dirs::config_dir().map(|dir| dir.join("logpager").join("config.toml"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PagerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.watch_mode, WatchMode::Poll);
        assert_eq!(config.charset, Charset::Utf8);
        assert_eq!(config.scan, ScanLimits::default());
    }

    #[test]
    fn test_builder_methods() {
        let config = PagerConfig::default()
            .with_poll_interval(Duration::from_millis(20))
            .with_watch_mode(WatchMode::Notify)
            .with_charset(Charset::Latin1);
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.watch_mode, WatchMode::Notify);
        assert_eq!(config.charset, Charset::Latin1);
    }

    #[test]
    fn test_watch_mode_parse() {
        assert_eq!("Notify".parse::<WatchMode>().unwrap(), WatchMode::Notify);
        assert_eq!("poll".parse::<WatchMode>().unwrap(), WatchMode::Poll);
        assert!("inotify".parse::<WatchMode>().is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_toml_partial() {
        let config = PagerConfig::from_toml_str(
            r#"
            poll_interval_ms = 250
            charset = "latin1"

            [scan]
            backscan_max = 2048
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.charset, Charset::Latin1);
        assert_eq!(config.watch_mode, WatchMode::Poll);
        assert_eq!(config.scan.backscan_max, 2048);
        assert_eq!(config.scan.block_size, ScanLimits::default().block_size);
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(PagerConfig::from_toml_str("charset = \"ebcdic\"").is_err());
        assert!(PagerConfig::from_toml_str("colour = \"red\"").is_err());
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "watch = \"notify\"\n").unwrap();

        let config = PagerConfig::load(&path).unwrap();
        assert_eq!(config.watch_mode, WatchMode::Notify);

        let missing = PagerConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(PagerError::ConfigError { .. })));
    }
}
