use crate::types::Vector3;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Raw accelerometer channel attributes, in x, y, z order.
pub const ACCEL_CHANNELS: [&str; 3] = ["in_accel_x_raw", "in_accel_y_raw", "in_accel_z_raw"];
/// Attribute whose presence marks a gyroscope.
pub const GYRO_CHANNEL: &str = "in_anglvel_x_raw";
/// Attribute whose presence marks a magnetometer.
pub const MAGN_CHANNEL: &str = "in_magn_x_raw";

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed value {value:?} in {path}")]
    Malformed { path: PathBuf, value: String },
    #[error("No reading available")]
    NoData,
}

/// Parse a single sysfs integer attribute (`"-954\n"`).
pub fn parse_raw_value(path: &Path, contents: &str) -> Result<i32, ReadError> {
    let trimmed = contents.trim();
    trimmed.parse::<i32>().map_err(|_| ReadError::Malformed {
        path: path.to_path_buf(),
        value: trimmed.to_string(),
    })
}

/// Read one vector from the accelerometer attributes under `device_dir`.
pub fn read_accel(device_dir: &Path) -> Result<Vector3, ReadError> {
    let mut axes = [0i32; 3];
    for (axis, channel) in axes.iter_mut().zip(ACCEL_CHANNELS) {
        let path = device_dir.join(channel);
        let contents = std::fs::read_to_string(&path).map_err(|source| ReadError::Io {
            path: path.clone(),
            source,
        })?;
        *axis = parse_raw_value(&path, &contents)?;
    }
    Ok(Vector3::from_array(axes))
}

/// Parse the numeric id out of an IIO directory name (`iio:device3` -> 3).
pub fn parse_device_id(name: &str) -> Option<u32> {
    name.strip_prefix("iio:device")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sysfs_values() {
        let path = Path::new("in_accel_x_raw");
        assert_eq!(parse_raw_value(path, "-954\n").unwrap(), -954);
        assert_eq!(parse_raw_value(path, "  18 ").unwrap(), 18);
    }

    #[test]
    fn rejects_garbage() {
        let path = Path::new("in_accel_y_raw");
        let err = parse_raw_value(path, "12.5\n").unwrap_err();
        match err {
            ReadError::Malformed { value, .. } => assert_eq!(value, "12.5"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_raw_value(path, "").is_err());
    }

    #[test]
    fn device_ids() {
        assert_eq!(parse_device_id("iio:device0"), Some(0));
        assert_eq!(parse_device_id("iio:device12"), Some(12));
        assert_eq!(parse_device_id("trigger0"), None);
        assert_eq!(parse_device_id("iio:devicex"), None);
    }

    #[test]
    fn missing_attribute_is_io_error() {
        let dir = std::env::temp_dir().join("autorotate-protocol-missing");
        assert!(matches!(read_accel(&dir), Err(ReadError::Io { .. })));
    }
}
