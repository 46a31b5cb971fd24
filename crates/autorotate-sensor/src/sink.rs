use crate::types::Orientation;
use tokio::sync::mpsc;

/// Receives confirmed orientation changes from a session.
pub trait OrientationSink {
    fn orientation_changed(&mut self, orientation: Orientation);
}

impl OrientationSink for mpsc::UnboundedSender<Orientation> {
    fn orientation_changed(&mut self, orientation: Orientation) {
        if self.send(orientation).is_err() {
            tracing::debug!(%orientation, "No orientation subscribers left");
        }
    }
}

/// Records every notification.
#[cfg(test)]
impl OrientationSink for Vec<Orientation> {
    fn orientation_changed(&mut self, orientation: Orientation) {
        self.push(orientation);
    }
}
