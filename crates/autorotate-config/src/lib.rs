mod types;

pub use types::*;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Returns the config directory: ~/.config/autorotate/
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("autorotate");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Returns the config file path: ~/.config/autorotate/config.toml
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load config from `path`, or return default if the file does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        info!(?path, "Loaded config");
        Ok(config)
    } else {
        info!(?path, "No config found, using defaults");
        Ok(AppConfig::default())
    }
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    info!(?path, "Saved config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("autorotate-config-{}-{name}.toml", std::process::id()))
    }

    #[test]
    fn default_config() {
        let config = AppConfig::default();
        assert!(!config.rotation_lock);
        assert_eq!(config.sensor.backend, SensorBackend::Iio);
        assert_eq!(config.sensor.sysfs_root, PathBuf::from("/sys/bus/iio/devices"));
        assert_eq!(config.sensor.poll_interval_ms, 150);
        assert_eq!(config.display, DisplayConfig::default());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig = toml::from_str("rotation_lock = true\n").unwrap();
        assert!(config.rotation_lock);
        assert_eq!(config.sensor, SensorConfig::default());
        assert_eq!(config.display.rotate_command, None);
    }

    #[test]
    fn parses_full_config() {
        let config: AppConfig = toml::from_str(
            r#"
            rotation_lock = false

            [sensor]
            backend = "scripted"
            sysfs_root = "/tmp/iio"
            poll_interval_ms = 50

            [display]
            rotate_command = "xrandr -o {rotation}"
            "#,
        )
        .unwrap();

        assert_eq!(config.sensor.backend, SensorBackend::Scripted);
        assert_eq!(config.sensor.sysfs_root, PathBuf::from("/tmp/iio"));
        assert_eq!(config.sensor.poll_interval_ms, 50);
        assert_eq!(
            config.display.rotate_command.as_deref(),
            Some("xrandr -o {rotation}")
        );
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(toml::from_str::<AppConfig>("[sensor]\nbackend = \"hid\"\n").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = scratch_file("missing");
        let _ = std::fs::remove_file(&path);
        assert_eq!(load_config_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn saved_config_loads_back() {
        let path = scratch_file("saved");
        let mut config = AppConfig::default();
        config.rotation_lock = true;
        config.display.rotate_command = Some("rotate {rotation}".into());

        save_config_to(&path, &config).unwrap();
        let loaded = load_config_from(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }
}
