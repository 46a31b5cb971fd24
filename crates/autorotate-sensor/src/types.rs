use glam::IVec3;
use std::fmt;
use std::path::PathBuf;

/// Raw accelerometer reading in device-native units.
pub type Vector3 = IVec3;

/// Discrete screen orientation derived from the gravity vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// No confident reading. Never a rotation target.
    #[default]
    Undefined,
    Normal,
    BottomUp,
    LeftUp,
    RightUp,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Undefined => "undefined",
            Orientation::Normal => "normal",
            Orientation::BottomUp => "bottom-up",
            Orientation::LeftUp => "left-up",
            Orientation::RightUp => "right-up",
        }
    }

    pub fn is_defined(self) -> bool {
        self != Orientation::Undefined
    }

    /// Whether the screen's long edge is vertical.
    pub fn is_portrait(self) -> bool {
        matches!(self, Orientation::LeftUp | Orientation::RightUp)
    }

    pub fn is_landscape(self) -> bool {
        matches!(self, Orientation::Normal | Orientation::BottomUp)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a sensor device: its device node plus a small numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    node: PathBuf,
    id: u32,
}

impl DeviceHandle {
    pub fn new(node: impl Into<PathBuf>, id: u32) -> Self {
        Self {
            node: node.into(),
            id,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.node.display(), self.id)
    }
}

/// Something a sensor device exposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    Accelerometer,
    Gyroscope,
    Magnetometer,
}

/// Notification from a device source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A candidate device showed up.
    Appeared {
        handle: DeviceHandle,
        capabilities: Vec<Capability>,
    },
    /// A device was removed or failed permanently.
    Vanished(DeviceHandle),
    /// The device reports new data; the host should read it.
    DataChanged(DeviceHandle),
}
