use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Keep the display where it is even when the device is turned.
    pub rotation_lock: bool,
    /// Accelerometer backend configuration.
    pub sensor: SensorConfig,
    /// How rotations reach the display.
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub backend: SensorBackend,
    /// Directory holding `iio:deviceN` entries.
    pub sysfs_root: PathBuf,
    /// How often the IIO backend rescans devices and rereads values.
    pub poll_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            backend: SensorBackend::Iio,
            sysfs_root: PathBuf::from("/sys/bus/iio/devices"),
            poll_interval_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackend {
    /// Linux Industrial I/O accelerometers via sysfs.
    Iio,
    /// Canned device and readings, for running without hardware.
    Scripted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Command run for each rotation, with `{rotation}` replaced by
    /// `normal`, `left`, `inverted` or `right`. `None` only logs rotations.
    pub rotate_command: Option<String>,
}
