//! Device event sources and sensor readers.
//!
//! A [`DeviceEventSource`] announces devices coming and going and flags when a
//! device has fresh data. A [`SensorReader`] fetches the actual vector. Both
//! are injected into the service at construction; the scripted variants here
//! replay canned events and readings for `--mock` runs and tests.

use crate::protocol::ReadError;
use crate::types::{DeviceEvent, DeviceHandle, Vector3};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tokio::sync::mpsc;

/// Everything the session task consumes, in arrival order.
///
/// Device events and lock/shutdown commands share one queue so that a
/// command is applied only after every event queued before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceInput {
    Device(DeviceEvent),
    SetEnabled(bool),
    Shutdown,
}

/// The session task has stopped and no longer takes events.
#[derive(Debug, Error)]
#[error("Orientation session is no longer running")]
pub struct SessionClosed;

/// Handle a source pushes device events through.
#[derive(Debug, Clone)]
pub struct EventSender {
    inner: mpsc::UnboundedSender<ServiceInput>,
}

impl EventSender {
    pub fn new(inner: mpsc::UnboundedSender<ServiceInput>) -> Self {
        Self { inner }
    }

    /// Create a sender together with the queue it feeds.
    #[cfg(test)]
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<ServiceInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, event: DeviceEvent) -> Result<(), SessionClosed> {
        self.inner
            .send(ServiceInput::Device(event))
            .map_err(|_| SessionClosed)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to spawn device source thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Device source already started")]
    AlreadyStarted,
}

/// Emits device hot-plug and data-changed notifications.
pub trait DeviceEventSource: Send {
    /// Start emitting events. Called once by the service.
    fn start(&mut self, events: EventSender) -> Result<(), SourceError>;

    /// Stop emitting events. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Reads the current vector from a bound device.
pub trait SensorReader: Send {
    fn read(&mut self, handle: &DeviceHandle) -> Result<Vector3, ReadError>;
}

/// Replays a fixed list of events as soon as it is started.
pub struct ScriptedSource {
    events: Vec<DeviceEvent>,
    sender: Option<EventSender>,
}

impl ScriptedSource {
    pub fn new(events: Vec<DeviceEvent>) -> Self {
        Self {
            events,
            sender: None,
        }
    }
}

impl DeviceEventSource for ScriptedSource {
    fn start(&mut self, events: EventSender) -> Result<(), SourceError> {
        if self.sender.is_some() {
            return Err(SourceError::AlreadyStarted);
        }
        for event in self.events.drain(..) {
            if events.send(event).is_err() {
                break;
            }
        }
        self.sender = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        self.sender = None;
    }
}

/// Hands out queued readings per device, in order.
///
/// A device with an empty queue reports [`ReadError::NoData`].
#[derive(Default)]
pub struct ScriptedReader {
    readings: HashMap<DeviceHandle, VecDeque<Result<Vector3, ReadError>>>,
}

impl ScriptedReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: &DeviceHandle, reading: Result<Vector3, ReadError>) {
        self.readings
            .entry(handle.clone())
            .or_default()
            .push_back(reading);
    }

    pub fn with_vectors(mut self, handle: &DeviceHandle, vectors: &[Vector3]) -> Self {
        for &vector in vectors {
            self.push(handle, Ok(vector));
        }
        self
    }
}

impl SensorReader for ScriptedReader {
    fn read(&mut self, handle: &DeviceHandle) -> Result<Vector3, ReadError> {
        self.readings
            .get_mut(handle)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(ReadError::NoData))
    }
}
