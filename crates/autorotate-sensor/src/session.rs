use crate::classify::classify;
use crate::sink::OrientationSink;
use crate::types::{Capability, DeviceHandle, Orientation, Vector3};

/// Event fed to the session's transition function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    DeviceAppeared {
        handle: DeviceHandle,
        capabilities: Vec<Capability>,
    },
    DeviceVanished(DeviceHandle),
    SampleAvailable {
        from: DeviceHandle,
        vector: Vector3,
    },
    /// The bound device could not be read this time around.
    ReadFailed(DeviceHandle),
    SetEnabled(bool),
}

/// What a single event did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A device was bound.
    Bound(DeviceHandle),
    /// The bound device went away or the session was stopped.
    Unbound(DeviceHandle),
    /// `current` changed and subscribers were notified.
    Changed(Orientation),
    /// `current` changed while notifications were disabled.
    Suppressed(Orientation),
    /// Notifications were re-enabled and subscribers resynchronized.
    Resynced(Orientation),
    /// Notifications were turned on or off with nothing to resend.
    Toggled(bool),
    /// The sample classified to the current orientation or was inconclusive.
    Unchanged,
    /// A read failure was skipped; the binding stays.
    Skipped,
    /// The event did not apply to this session.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BindingState {
    Idle,
    Bound(DeviceHandle),
}

/// Owns the sensor binding and publishes confirmed orientation changes.
///
/// All state changes go through [`OrientationSession::handle`], one event at a
/// time. Samples from any device other than the bound one are dropped, so a
/// sample that races a `DeviceVanished` can never touch `current`.
pub struct OrientationSession<S> {
    state: BindingState,
    current: Orientation,
    enabled: bool,
    last_notified: Option<Orientation>,
    sink: S,
}

impl<S: OrientationSink> OrientationSession<S> {
    pub fn new(sink: S, enabled: bool) -> Self {
        Self {
            state: BindingState::Idle,
            current: Orientation::Undefined,
            enabled,
            last_notified: None,
            sink,
        }
    }

    /// Last confirmed orientation, including changes that were not published.
    pub fn current(&self) -> Orientation {
        self.current
    }

    pub fn bound_device(&self) -> Option<&DeviceHandle> {
        match &self.state {
            BindingState::Idle => None,
            BindingState::Bound(handle) => Some(handle),
        }
    }

    #[cfg(test)]
    fn sink(&self) -> &S {
        &self.sink
    }

    pub fn handle(&mut self, event: SessionEvent) -> Transition {
        match event {
            SessionEvent::DeviceAppeared {
                handle,
                capabilities,
            } => self.device_appeared(handle, &capabilities),
            SessionEvent::DeviceVanished(handle) => self.device_vanished(&handle),
            SessionEvent::SampleAvailable { from, vector } => self.sample(&from, vector),
            SessionEvent::ReadFailed(handle) => self.read_failed(&handle),
            SessionEvent::SetEnabled(enabled) => self.set_enabled(enabled),
        }
    }

    /// Drop the binding, if any, and forget the current orientation.
    pub fn stop(&mut self) -> Transition {
        match std::mem::replace(&mut self.state, BindingState::Idle) {
            BindingState::Idle => Transition::Ignored,
            BindingState::Bound(handle) => {
                tracing::info!(%handle, "Releasing accelerometer");
                self.current = Orientation::Undefined;
                Transition::Unbound(handle)
            }
        }
    }

    fn device_appeared(&mut self, handle: DeviceHandle, capabilities: &[Capability]) -> Transition {
        if !capabilities.contains(&Capability::Accelerometer) {
            tracing::debug!(%handle, "Ignoring device without an accelerometer");
            return Transition::Ignored;
        }

        if let BindingState::Bound(bound) = &self.state {
            tracing::debug!(%handle, %bound, "Already bound, ignoring additional accelerometer");
            return Transition::Ignored;
        }

        tracing::info!(%handle, "Found accelerometer");
        self.state = BindingState::Bound(handle.clone());
        Transition::Bound(handle)
    }

    fn device_vanished(&mut self, handle: &DeviceHandle) -> Transition {
        if self.bound_device() != Some(handle) {
            return Transition::Ignored;
        }
        tracing::info!(%handle, "Accelerometer removed");
        self.stop()
    }

    fn sample(&mut self, from: &DeviceHandle, vector: Vector3) -> Transition {
        if self.bound_device() != Some(from) {
            tracing::trace!(%from, "Dropping sample from unbound device");
            return Transition::Ignored;
        }

        tracing::debug!(x = vector.x, y = vector.y, z = vector.z, "Got values");

        let next = classify(self.current, vector);
        tracing::debug!(%next, previous = %self.current, "Classified sample");

        if !next.is_defined() || next == self.current {
            return Transition::Unchanged;
        }

        self.current = next;

        if !self.enabled {
            tracing::debug!(orientation = %next, "Orientation changed, but rotation is locked");
            return Transition::Suppressed(next);
        }

        tracing::info!(orientation = %next, "Orientation changed");
        self.notify(next);
        Transition::Changed(next)
    }

    fn read_failed(&mut self, handle: &DeviceHandle) -> Transition {
        if self.bound_device() != Some(handle) {
            return Transition::Ignored;
        }
        tracing::debug!(%handle, "Failed to read accelerometer values, skipping sample");
        Transition::Skipped
    }

    fn set_enabled(&mut self, enabled: bool) -> Transition {
        if enabled == self.enabled {
            return Transition::Ignored;
        }
        self.enabled = enabled;
        tracing::info!(enabled, "Rotation notifications toggled");

        if enabled && self.current.is_defined() && self.last_notified != Some(self.current) {
            // Catch consumers up on what happened while locked.
            let current = self.current;
            self.notify(current);
            return Transition::Resynced(current);
        }

        Transition::Toggled(enabled)
    }

    fn notify(&mut self, orientation: Orientation) {
        self.sink.orientation_changed(orientation);
        self.last_notified = Some(orientation);
    }
}
