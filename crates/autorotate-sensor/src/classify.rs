use crate::types::{Orientation, Vector3};

/// Tilt (degrees) the x axis must exceed for a portrait reading.
pub const PORTRAIT_THRESHOLD: i32 = 20;
/// Tilt (degrees) the y axis must exceed for a landscape reading.
pub const LANDSCAPE_THRESHOLD: i32 = 25;
/// Below this tilt the previous orientation on the same axis is kept.
pub const SAME_AXIS_LIMIT: i32 = 5;

/// Map a raw accelerometer vector to a screen orientation.
///
/// The portrait axis (x) is tested first; only if its tilt stays within
/// [`PORTRAIT_THRESHOLD`] is the landscape axis (y) considered. A reading that
/// clears neither threshold (lying flat, or held near 45 degrees) is
/// [`Orientation::Undefined`].
///
/// `previous` is the last confirmed orientation and only matters for the
/// same-axis hysteresis band.
pub fn classify(previous: Orientation, v: Vector3) -> Orientation {
    if let Some(rotation) = tilt_degrees(v.x, v.y, v.z) {
        if rotation.abs() > PORTRAIT_THRESHOLD {
            let candidate = if rotation < 0 {
                Orientation::LeftUp
            } else {
                Orientation::RightUp
            };
            return hold_same_axis(previous, candidate, rotation, Orientation::is_portrait);
        }
    }

    if let Some(rotation) = tilt_degrees(v.y, v.x, v.z) {
        if rotation.abs() > LANDSCAPE_THRESHOLD {
            let candidate = if rotation < 0 {
                Orientation::BottomUp
            } else {
                Orientation::Normal
            };
            return hold_same_axis(previous, candidate, rotation, Orientation::is_landscape);
        }
    }

    Orientation::Undefined
}

fn hold_same_axis(
    previous: Orientation,
    candidate: Orientation,
    rotation: i32,
    same_axis: fn(Orientation) -> bool,
) -> Orientation {
    if same_axis(previous) && rotation.abs() < SAME_AXIS_LIMIT {
        previous
    } else {
        candidate
    }
}

/// Angle between `axis` and the plane spanned by the other two axes, rounded
/// to whole degrees. `None` when that plane has no magnitude.
fn tilt_degrees(axis: i32, a: i32, b: i32) -> Option<i32> {
    let (axis, a, b) = (f64::from(axis), f64::from(a), f64::from(b));
    let magnitude = (a * a + b * b).sqrt();
    if magnitude == 0.0 {
        return None;
    }
    Some((axis / magnitude).atan().to_degrees().round() as i32)
}
