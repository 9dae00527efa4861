//! Feed capacity and page size configuration.
//!
//! ```toml
//! [home]
//! max = 100
//! page_size = 20
//!
//! [notifications]
//! max = 100
//! page_size = 20
//! exclude_types = ["reblog", "favourite", "follow", "other"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backfill::DEFAULT_PAGE_SIZE;
use crate::model::NotificationKind;

/// Capacity used by screen feeds when the config omits `max`.
pub const DEFAULT_SCREEN_MAX: usize = 100;

/// Settings of one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Capacity; `None` is unbounded.
    pub max: Option<usize>,
    /// Items requested per backfill.
    pub page_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FeedConfig {
    /// Feed settings used by a screen when nothing is configured.
    pub fn screen_default() -> Self {
        Self {
            max: Some(DEFAULT_SCREEN_MAX),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Settings of the home and notification feeds of a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenConfig {
    /// Home feed.
    pub home: FeedConfig,
    /// Notification feed.
    pub notifications: FeedConfig,
    /// Notification kinds dropped by the realtime stream.
    pub exclude_types: Vec<NotificationKind>,
    path: Option<PathBuf>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            home: FeedConfig::screen_default(),
            notifications: FeedConfig::screen_default(),
            exclude_types: default_exclude_types(),
            path: None,
        }
    }
}

impl ScreenConfig {
    /// Loads `explicit`, or the file at [`default_config_path`]. A missing
    /// file yields the defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        let mut config = convert(&data)?;
        config.path = path;
        Ok(config)
    }

    /// Parses a config document without touching the filesystem.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let data: RawConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse { path: None, source })?;
        convert(&data)
    }

    /// Path the config was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the config back to its path, or to the default path.
    pub fn persist(&self) -> Result<PathBuf, ConfigError> {
        let target = match self.path.clone().or_else(default_config_path) {
            Some(path) => path,
            None => return Err(ConfigError::NoConfigPath),
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = toml::to_string_pretty(&RawConfig::from(self))
            .map_err(|source| ConfigError::Serialize { source })?;
        fs::write(&target, serialized).map_err(|source| ConfigError::Write {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }
}

/// A config file that cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config{}: {source}", display_path(.path))]
    Parse {
        /// File that failed, when parsing a file.
        path: Option<PathBuf>,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("[{section}] {field} must be greater than zero")]
    Invalid {
        /// Table holding the value.
        section: &'static str,
        /// Offending key.
        field: &'static str,
    },
    /// The config could not be serialized.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying TOML error.
        source: toml::ser::Error,
    },
    /// The config could not be written.
    #[error("failed to write config {path}: {source}")]
    Write {
        /// Target file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The parent directory could not be created.
    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Neither an explicit nor a platform config path is available.
    #[error("no config directory found; pass an explicit config path")]
    NoConfigPath,
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" {}", path.display()))
        .unwrap_or_default()
}

/// `<config dir>/remotelist/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("remotelist").join("config.toml"))
}

fn default_exclude_types() -> Vec<NotificationKind> {
    vec![
        NotificationKind::Reblog,
        NotificationKind::Favourite,
        NotificationKind::Follow,
        NotificationKind::Other,
    ]
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: Some(path.to_path_buf()),
        source,
    })
}

fn convert(data: &RawConfig) -> Result<ScreenConfig, ConfigError> {
    Ok(ScreenConfig {
        home: convert_feed("home", &data.home.feed)?,
        notifications: convert_feed("notifications", &data.notifications.feed)?,
        exclude_types: data
            .notifications
            .exclude_types
            .clone()
            .unwrap_or_else(default_exclude_types),
        path: None,
    })
}

fn convert_feed(section: &'static str, raw: &RawFeed) -> Result<FeedConfig, ConfigError> {
    let max = raw.max.unwrap_or(DEFAULT_SCREEN_MAX);
    if max == 0 {
        return Err(ConfigError::Invalid {
            section,
            field: "max",
        });
    }
    let page_size = raw.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size == 0 {
        return Err(ConfigError::Invalid {
            section,
            field: "page_size",
        });
    }
    Ok(FeedConfig {
        max: Some(max),
        page_size,
    })
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    home: HomeSection,
    #[serde(default)]
    notifications: NotificationsSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct HomeSection {
    #[serde(flatten)]
    feed: RawFeed,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct NotificationsSection {
    #[serde(flatten)]
    feed: RawFeed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exclude_types: Option<Vec<NotificationKind>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawFeed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_size: Option<usize>,
}

impl From<&ScreenConfig> for RawConfig {
    fn from(config: &ScreenConfig) -> Self {
        let feed = |feed: &FeedConfig| RawFeed {
            max: feed.max,
            page_size: Some(feed.page_size),
        };
        Self {
            home: HomeSection {
                feed: feed(&config.home),
            },
            notifications: NotificationsSection {
                feed: feed(&config.notifications),
                exclude_types: Some(config.exclude_types.clone()),
            },
        }
    }
}
