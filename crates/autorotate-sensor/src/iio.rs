//! Linux Industrial I/O (IIO) accelerometer backend.
//!
//! Devices live under `/sys/bus/iio/devices/iio:deviceN`. There is no portable
//! hot-plug notification for sysfs attribute changes, so this backend polls:
//!
//! 1. Every tick, list `iio:device*` directories and diff against the last scan
//! 2. Emit `Appeared` / `Vanished` for the difference
//! 3. Emit `DataChanged` for each accelerometer still present
//!
//! The scan runs on a dedicated thread and only talks to the service through
//! the event channel.

use crate::protocol::{self, ReadError, ACCEL_CHANNELS, GYRO_CHANNEL, MAGN_CHANNEL};
use crate::source::{DeviceEventSource, EventSender, SensorReader, SourceError};
use crate::types::{Capability, DeviceEvent, DeviceHandle, Vector3};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A device found during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDevice {
    pub handle: DeviceHandle,
    pub capabilities: Vec<Capability>,
}

impl ScannedDevice {
    fn is_accelerometer(&self) -> bool {
        self.capabilities.contains(&Capability::Accelerometer)
    }
}

/// List IIO devices under `root`, keyed by device id.
///
/// A missing root means no devices rather than an error: the IIO bus only
/// exists once a driver has registered.
pub fn scan_devices(root: &Path) -> std::io::Result<BTreeMap<u32, ScannedDevice>> {
    let mut devices = BTreeMap::new();

    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(devices),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(id) = name.to_str().and_then(protocol::parse_device_id) else {
            continue;
        };
        let dir = entry.path();
        let handle = DeviceHandle::new(format!("/dev/iio:device{id}"), id);
        devices.insert(
            id,
            ScannedDevice {
                handle,
                capabilities: device_capabilities(&dir),
            },
        );
    }

    Ok(devices)
}

fn device_capabilities(dir: &Path) -> Vec<Capability> {
    let mut capabilities = Vec::new();
    if ACCEL_CHANNELS.iter().all(|channel| dir.join(channel).exists()) {
        capabilities.push(Capability::Accelerometer);
    }
    if dir.join(GYRO_CHANNEL).exists() {
        capabilities.push(Capability::Gyroscope);
    }
    if dir.join(MAGN_CHANNEL).exists() {
        capabilities.push(Capability::Magnetometer);
    }
    capabilities
}

/// Diff two scans into the events a source should emit.
fn diff_scans(
    previous: &BTreeMap<u32, ScannedDevice>,
    current: &BTreeMap<u32, ScannedDevice>,
) -> Vec<DeviceEvent> {
    let mut events = Vec::new();

    for (id, device) in previous {
        if !current.contains_key(id) {
            events.push(DeviceEvent::Vanished(device.handle.clone()));
        }
    }

    for (id, device) in current {
        if !previous.contains_key(id) {
            events.push(DeviceEvent::Appeared {
                handle: device.handle.clone(),
                capabilities: device.capabilities.clone(),
            });
        }
    }

    for device in current.values().filter(|d| d.is_accelerometer()) {
        events.push(DeviceEvent::DataChanged(device.handle.clone()));
    }

    events
}

/// Polling sysfs device source.
pub struct IioSource {
    root: PathBuf,
    interval: Duration,
    running: Arc<AtomicBool>,
    started: bool,
}

impl IioSource {
    pub fn new(root: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            root: root.into(),
            interval,
            running: Arc::new(AtomicBool::new(false)),
            started: false,
        }
    }
}

impl DeviceEventSource for IioSource {
    fn start(&mut self, events: EventSender) -> Result<(), SourceError> {
        if self.started {
            return Err(SourceError::AlreadyStarted);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let root = self.root.clone();
        let interval = self.interval;

        tracing::info!(root = %root.display(), ?interval, "Watching IIO devices");

        std::thread::Builder::new()
            .name("autorotate-iio".into())
            .spawn(move || iio_poll_thread(root, interval, events, running))
            .map_err(SourceError::Spawn)?;

        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for IioSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn iio_poll_thread(root: PathBuf, interval: Duration, events: EventSender, running: Arc<AtomicBool>) {
    let mut known = BTreeMap::new();
    let mut scan_failed = false;

    while running.load(Ordering::SeqCst) {
        match scan_devices(&root) {
            Ok(current) => {
                scan_failed = false;
                for event in diff_scans(&known, &current) {
                    if events.send(event).is_err() {
                        tracing::debug!("Event receiver dropped, IIO thread exiting");
                        return;
                    }
                }
                known = current;
            }
            Err(e) => {
                // Log once per failure streak, the poll keeps retrying.
                if !scan_failed {
                    tracing::warn!(?e, root = %root.display(), "Failed to scan IIO devices");
                    scan_failed = true;
                }
            }
        }

        std::thread::sleep(interval);
    }

    tracing::debug!("IIO poll thread stopped");
}

/// Reads accelerometer vectors from sysfs.
pub struct IioReader {
    root: PathBuf,
}

impl IioReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn device_dir(&self, handle: &DeviceHandle) -> PathBuf {
        self.root.join(format!("iio:device{}", handle.id()))
    }
}

impl SensorReader for IioReader {
    fn read(&mut self, handle: &DeviceHandle) -> Result<Vector3, ReadError> {
        protocol::read_accel(&self.device_dir(handle))
    }
}
