pub mod manager;

use anyhow::Result;
use autorotate_sensor::Orientation;
use std::fmt;

/// Display rotation, counter-clockwise from the panel's native orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// 0 degrees.
    Normal,
    /// 90 degrees.
    Left,
    /// 180 degrees.
    Inverted,
    /// 270 degrees.
    Right,
}

impl Rotation {
    /// Rotation that keeps content upright for `orientation`.
    ///
    /// `Undefined` has no rotation: the display stays as it is.
    pub fn from_orientation(orientation: Orientation) -> Option<Rotation> {
        match orientation {
            Orientation::Normal => Some(Rotation::Normal),
            Orientation::LeftUp => Some(Rotation::Left),
            Orientation::BottomUp => Some(Rotation::Inverted),
            Orientation::RightUp => Some(Rotation::Right),
            Orientation::Undefined => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Normal => 0,
            Rotation::Left => 90,
            Rotation::Inverted => 180,
            Rotation::Right => 270,
        }
    }

    /// Name as understood by `xrandr -o`.
    pub fn as_str(self) -> &'static str {
        match self {
            Rotation::Normal => "normal",
            Rotation::Left => "left",
            Rotation::Inverted => "inverted",
            Rotation::Right => "right",
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for platform-specific display rotation.
pub trait DisplayRotator: Send {
    /// Rotate the display.
    fn apply(&mut self, rotation: Rotation) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_orientation_to_rotation() {
        assert_eq!(Rotation::from_orientation(Orientation::Normal), Some(Rotation::Normal));
        assert_eq!(Rotation::from_orientation(Orientation::LeftUp), Some(Rotation::Left));
        assert_eq!(Rotation::from_orientation(Orientation::BottomUp), Some(Rotation::Inverted));
        assert_eq!(Rotation::from_orientation(Orientation::RightUp), Some(Rotation::Right));
        assert_eq!(Rotation::from_orientation(Orientation::Undefined), None);
    }

    #[test]
    fn rotation_angles() {
        assert_eq!(Rotation::Left.degrees(), 90);
        assert_eq!(Rotation::Right.degrees(), 270);
        assert_eq!(Rotation::Inverted.to_string(), "inverted");
    }
}
