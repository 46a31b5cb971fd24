pub mod classify;
pub mod iio;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod source;
pub mod types;

pub use classify::classify;
pub use session::{OrientationSession, SessionEvent, Transition};
pub use sink::OrientationSink;
pub use source::{DeviceEventSource, EventSender, SensorReader, ServiceInput, SourceError};
pub use types::{Capability, DeviceEvent, DeviceHandle, Orientation, Vector3};

use tokio::sync::{mpsc, watch};

/// Consecutive failed reads after which the bound device is released.
pub const MAX_READ_FAILURES: u32 = 5;

/// Runs an [`OrientationSession`] on its own task.
///
/// Device events from the source and commands from this handle travel through
/// one queue and are consumed by a single task in arrival order, so the
/// session never sees concurrent mutation and a lock toggle never overtakes
/// an event queued before it. Published orientation changes are delivered
/// through [`OrientationService::next_change`].
pub struct OrientationService {
    current_rx: watch::Receiver<Orientation>,
    changes_rx: mpsc::UnboundedReceiver<Orientation>,
    input_tx: mpsc::UnboundedSender<ServiceInput>,
    task: tokio::task::JoinHandle<()>,
}

impl OrientationService {
    /// Start the source and spawn the session task.
    ///
    /// `enabled` is the initial notification state (the inverse of the
    /// rotation lock). Must be called from within a tokio runtime.
    pub fn spawn<S, R>(mut source: S, reader: R, enabled: bool) -> Result<Self, SourceError>
    where
        S: DeviceEventSource + 'static,
        R: SensorReader + 'static,
    {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (current_tx, current_rx) = watch::channel(Orientation::Undefined);

        source.start(EventSender::new(input_tx.clone()))?;

        let session = OrientationSession::new(changes_tx, enabled);
        let task = tokio::spawn(session_loop(session, source, reader, input_rx, current_tx));

        Ok(Self {
            current_rx,
            changes_rx,
            input_tx,
            task,
        })
    }

    /// Latest confirmed orientation, including changes held back by the lock.
    pub fn current(&self) -> Orientation {
        *self.current_rx.borrow()
    }

    /// Wait for the next published orientation change.
    ///
    /// Returns `None` once the session task has stopped.
    pub async fn next_change(&mut self) -> Option<Orientation> {
        self.changes_rx.recv().await
    }

    /// Turn change notifications on or off (rotation lock).
    ///
    /// Takes effect after every device event already queued.
    pub fn set_enabled(&self, enabled: bool) {
        let _ = self.input_tx.send(ServiceInput::SetEnabled(enabled));
    }

    /// Stop the source, release the device, and wait for the task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.input_tx.send(ServiceInput::Shutdown);
        if let Err(e) = (&mut self.task).await {
            tracing::error!(?e, "Orientation session task failed");
        }
    }
}

impl Drop for OrientationService {
    fn drop(&mut self) {
        // The source holds a sender too, so the queue alone never closes.
        let _ = self.input_tx.send(ServiceInput::Shutdown);
    }
}

/// Read bookkeeping for the bound device, cleared on every (un)bind.
#[derive(Debug, Default)]
struct ReadState {
    /// Last vector read; an identical reading is not resampled.
    last_vector: Option<Vector3>,
    /// Consecutive failed reads.
    failures: u32,
}

/// Background task: feed queued inputs through the session.
async fn session_loop<S, R>(
    mut session: OrientationSession<mpsc::UnboundedSender<Orientation>>,
    mut source: S,
    mut reader: R,
    mut input_rx: mpsc::UnboundedReceiver<ServiceInput>,
    current_tx: watch::Sender<Orientation>,
) where
    S: DeviceEventSource,
    R: SensorReader,
{
    let mut reads = ReadState::default();

    while let Some(input) = input_rx.recv().await {
        let event = match input {
            ServiceInput::Device(event) => {
                match to_session_event(&session, &mut reader, &mut reads, event) {
                    Some(event) => event,
                    None => continue,
                }
            }
            ServiceInput::SetEnabled(enabled) => SessionEvent::SetEnabled(enabled),
            ServiceInput::Shutdown => break,
        };

        let transition = session.handle(event);
        match &transition {
            Transition::Bound(_) | Transition::Unbound(_) => reads = ReadState::default(),
            Transition::Ignored | Transition::Unchanged => {}
            other => tracing::debug!(transition = ?other, "Session transition"),
        }

        current_tx.send_if_modified(|current| {
            let changed = *current != session.current();
            *current = session.current();
            changed
        });
    }

    source.stop();
    session.stop();
    current_tx.send_replace(Orientation::Undefined);
    tracing::info!("Orientation session stopped");
}

/// Turn a source event into a session event, reading the sensor when the
/// bound device reports new data.
///
/// After [`MAX_READ_FAILURES`] failed reads in a row the device is reported
/// as vanished.
fn to_session_event<R: SensorReader>(
    session: &OrientationSession<mpsc::UnboundedSender<Orientation>>,
    reader: &mut R,
    reads: &mut ReadState,
    event: DeviceEvent,
) -> Option<SessionEvent> {
    match event {
        DeviceEvent::Appeared {
            handle,
            capabilities,
        } => Some(SessionEvent::DeviceAppeared {
            handle,
            capabilities,
        }),
        DeviceEvent::Vanished(handle) => Some(SessionEvent::DeviceVanished(handle)),
        DeviceEvent::DataChanged(handle) => {
            if session.bound_device() != Some(&handle) {
                return None;
            }
            match reader.read(&handle) {
                Ok(vector) => {
                    reads.failures = 0;
                    if reads.last_vector == Some(vector) {
                        return None;
                    }
                    reads.last_vector = Some(vector);
                    Some(SessionEvent::SampleAvailable {
                        from: handle,
                        vector,
                    })
                }
                Err(e) => {
                    reads.failures += 1;
                    if reads.failures >= MAX_READ_FAILURES {
                        tracing::warn!(?e, %handle, failures = reads.failures, "Accelerometer keeps failing, releasing it");
                        return Some(SessionEvent::DeviceVanished(handle));
                    }
                    if reads.failures == 1 {
                        tracing::warn!(?e, %handle, "Sensor read failed");
                    } else {
                        tracing::debug!(?e, %handle, failures = reads.failures, "Sensor read failed");
                    }
                    Some(SessionEvent::ReadFailed(handle))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ScriptedReader, ScriptedSource};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const NORMAL: Vector3 = Vector3::new(60, 960, 18);
    const LEFT_UP: Vector3 = Vector3::new(-954, -90, -36);
    const RIGHT_UP: Vector3 = Vector3::new(936, 162, 180);

    fn accel(id: u32) -> DeviceHandle {
        DeviceHandle::new(format!("/dev/iio:device{id}"), id)
    }

    fn appeared(handle: &DeviceHandle) -> DeviceEvent {
        DeviceEvent::Appeared {
            handle: handle.clone(),
            capabilities: vec![Capability::Accelerometer],
        }
    }

    async fn next_change(service: &mut OrientationService) -> Orientation {
        tokio::time::timeout(Duration::from_secs(2), service.next_change())
            .await
            .expect("timed out waiting for orientation change")
            .expect("session task stopped")
    }

    async fn wait_for_current(service: &OrientationService, expected: Orientation) {
        let mut rx = service.current_rx.clone();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|o| *o == expected))
            .await
            .expect("timed out waiting for current orientation")
            .expect("session task stopped");
    }

    #[tokio::test]
    async fn publishes_change_from_bound_device() {
        let a = accel(0);
        let b = accel(1);
        let source = ScriptedSource::new(vec![
            appeared(&a),
            appeared(&b),
            DeviceEvent::DataChanged(b.clone()),
            DeviceEvent::DataChanged(a.clone()),
        ]);
        let reader = ScriptedReader::new()
            .with_vectors(&a, &[NORMAL])
            .with_vectors(&b, &[LEFT_UP]);

        let mut service = OrientationService::spawn(source, reader, true).unwrap();
        assert_eq!(next_change(&mut service).await, Orientation::Normal);
        assert_eq!(service.current(), Orientation::Normal);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn read_failure_is_skipped() {
        let a = accel(0);
        let source = ScriptedSource::new(vec![
            appeared(&a),
            DeviceEvent::DataChanged(a.clone()),
            DeviceEvent::DataChanged(a.clone()),
        ]);
        let mut reader = ScriptedReader::new();
        reader.push(&a, Err(protocol::ReadError::NoData));
        reader.push(&a, Ok(LEFT_UP));

        let mut service = OrientationService::spawn(source, reader, true).unwrap();
        assert_eq!(next_change(&mut service).await, Orientation::LeftUp);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn vanish_resets_current() {
        let a = accel(0);
        let source = ScriptedSource::new(vec![
            appeared(&a),
            DeviceEvent::DataChanged(a.clone()),
            DeviceEvent::Vanished(a.clone()),
        ]);
        let reader = ScriptedReader::new().with_vectors(&a, &[RIGHT_UP]);

        let mut service = OrientationService::spawn(source, reader, true).unwrap();
        assert_eq!(next_change(&mut service).await, Orientation::RightUp);
        wait_for_current(&service, Orientation::Undefined).await;
        service.shutdown().await;
    }

    #[tokio::test]
    async fn unlocking_resyncs_consumers() {
        let a = accel(0);
        let source = ScriptedSource::new(vec![appeared(&a), DeviceEvent::DataChanged(a.clone())]);
        let reader = ScriptedReader::new().with_vectors(&a, &[RIGHT_UP]);

        let mut service = OrientationService::spawn(source, reader, false).unwrap();
        wait_for_current(&service, Orientation::RightUp).await;

        service.set_enabled(true);
        assert_eq!(next_change(&mut service).await, Orientation::RightUp);
        service.shutdown().await;
    }

    #[test]
    fn unchanged_reading_is_not_resampled() {
        let a = accel(0);
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = OrientationSession::new(tx, true);
        session.handle(SessionEvent::DeviceAppeared {
            handle: a.clone(),
            capabilities: vec![Capability::Accelerometer],
        });
        let mut reader = ScriptedReader::new().with_vectors(&a, &[NORMAL, NORMAL, LEFT_UP]);
        let mut reads = ReadState::default();

        let first = to_session_event(&session, &mut reader, &mut reads, DeviceEvent::DataChanged(a.clone()));
        assert!(matches!(first, Some(SessionEvent::SampleAvailable { .. })));
        let repeat = to_session_event(&session, &mut reader, &mut reads, DeviceEvent::DataChanged(a.clone()));
        assert_eq!(repeat, None);
        let moved = to_session_event(&session, &mut reader, &mut reads, DeviceEvent::DataChanged(a.clone()));
        assert_eq!(
            moved,
            Some(SessionEvent::SampleAvailable {
                from: a.clone(),
                vector: LEFT_UP,
            })
        );

        // Data from a device that is not bound is never read.
        let other = to_session_event(&session, &mut reader, &mut reads, DeviceEvent::DataChanged(accel(4)));
        assert_eq!(other, None);
    }

    #[test]
    fn failing_device_is_released() {
        let a = accel(0);
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = OrientationSession::new(tx, true);
        session.handle(SessionEvent::DeviceAppeared {
            handle: a.clone(),
            capabilities: vec![Capability::Accelerometer],
        });
        let mut reader = ScriptedReader::new();
        for _ in 1..MAX_READ_FAILURES {
            reader.push(&a, Err(protocol::ReadError::NoData));
        }
        reader.push(&a, Ok(NORMAL));
        let mut reads = ReadState::default();
        let data_changed = |reader: &mut ScriptedReader, reads: &mut ReadState| {
            to_session_event(&session, reader, reads, DeviceEvent::DataChanged(a.clone()))
        };

        // A good reading ends the streak.
        for _ in 1..MAX_READ_FAILURES {
            assert_eq!(
                data_changed(&mut reader, &mut reads),
                Some(SessionEvent::ReadFailed(a.clone()))
            );
        }
        assert!(matches!(
            data_changed(&mut reader, &mut reads),
            Some(SessionEvent::SampleAvailable { .. })
        ));
        assert_eq!(reads.failures, 0);

        // The reader is now empty, so every read fails.
        for _ in 1..MAX_READ_FAILURES {
            assert_eq!(
                data_changed(&mut reader, &mut reads),
                Some(SessionEvent::ReadFailed(a.clone()))
            );
        }
        assert_eq!(
            data_changed(&mut reader, &mut reads),
            Some(SessionEvent::DeviceVanished(a.clone()))
        );
    }

    #[tokio::test]
    async fn persistent_read_failure_unbinds() {
        let a = accel(0);
        let mut script = vec![appeared(&a)];
        for _ in 0..=MAX_READ_FAILURES {
            script.push(DeviceEvent::DataChanged(a.clone()));
        }
        // Reads after the first report no data.
        let reader = ScriptedReader::new().with_vectors(&a, &[NORMAL]);

        let mut service = OrientationService::spawn(ScriptedSource::new(script), reader, true).unwrap();
        assert_eq!(next_change(&mut service).await, Orientation::Normal);
        wait_for_current(&service, Orientation::Undefined).await;
        service.shutdown().await;
    }

    #[tokio::test]
    async fn lock_applies_after_queued_events() {
        for _ in 0..50 {
            let a = accel(0);
            let source = ScriptedSource::new(vec![appeared(&a), DeviceEvent::DataChanged(a.clone())]);
            let reader = ScriptedReader::new().with_vectors(&a, &[NORMAL]);

            let mut service = OrientationService::spawn(source, reader, true).unwrap();
            service.set_enabled(false);

            assert_eq!(next_change(&mut service).await, Orientation::Normal);
            assert!(
                tokio::time::timeout(Duration::from_millis(20), service.next_change())
                    .await
                    .is_err()
            );
            assert_eq!(service.current(), Orientation::Normal);
            service.shutdown().await;
        }
    }

    struct StopFlagSource {
        stopped: Arc<AtomicBool>,
        sender: Option<source::EventSender>,
    }

    impl DeviceEventSource for StopFlagSource {
        fn start(&mut self, events: source::EventSender) -> Result<(), SourceError> {
            self.sender = Some(events);
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
            self.sender = None;
        }
    }

    #[tokio::test]
    async fn shutdown_stops_source() {
        let stopped = Arc::new(AtomicBool::new(false));
        let source = StopFlagSource {
            stopped: stopped.clone(),
            sender: None,
        };
        let service = OrientationService::spawn(source, ScriptedReader::new(), true).unwrap();
        service.shutdown().await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn idle_session_publishes_nothing() {
        let source = StopFlagSource {
            stopped: Arc::new(AtomicBool::new(false)),
            sender: None,
        };
        let mut service = OrientationService::spawn(source, ScriptedReader::new(), true).unwrap();
        assert!(
            tokio::time::timeout(Duration::from_millis(50), service.next_change())
                .await
                .is_err()
        );
        service.shutdown().await;
    }
}
