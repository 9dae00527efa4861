use std::fs;

use remotelist::{ConfigError, FeedConfig, NotificationKind, ScreenConfig};
use tempfile::TempDir;

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let config = ScreenConfig::load(Some(path.clone())).unwrap();
    assert_eq!(config.home, FeedConfig::screen_default());
    assert_eq!(config.notifications.max, Some(100));
    assert_eq!(config.path(), Some(path.as_path()));
}

#[test]
fn file_values_are_applied() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[home]\nmax = 250\npage_size = 40\n\n[notifications]\nexclude_types = [\"follow\"]\n",
    )
    .unwrap();
    let config = ScreenConfig::load(Some(path)).unwrap();
    assert_eq!(
        config.home,
        FeedConfig {
            max: Some(250),
            page_size: 40,
        }
    );
    assert_eq!(config.notifications, FeedConfig::screen_default());
    assert_eq!(config.exclude_types, [NotificationKind::Follow]);
}

#[test]
fn parse_errors_name_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[home]\nmax = \"lots\"\n").unwrap();
    let err = ScreenConfig::load(Some(path.clone())).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { path: Some(ref p), .. } if *p == path));
    assert!(err.to_string().contains("broken.toml"));
}

#[test]
fn persisted_config_loads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut config = ScreenConfig::load(Some(path.clone())).unwrap();
    config.home.page_size = 10;
    config.exclude_types = vec![NotificationKind::Reblog];
    assert_eq!(config.persist().unwrap(), path);

    let reloaded = ScreenConfig::load(Some(path)).unwrap();
    assert_eq!(reloaded.home.page_size, 10);
    assert_eq!(reloaded.home.max, Some(100));
    assert_eq!(reloaded.exclude_types, [NotificationKind::Reblog]);
}
