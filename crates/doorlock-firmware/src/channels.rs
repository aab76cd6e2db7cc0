//! Bounded queues between the firmware units.
//!
//! Each queue is a Tokio mpsc channel with a fixed capacity and two ways to
//! send:
//!
//! - [`QueueSender::send`] waits for space. Used for messages that must not
//!   be lost, such as events destined for the host; a full queue applies
//!   backpressure to the producer.
//! - [`QueueSender::offer`] never waits. A full queue drops the message and
//!   reports the drop to the [`DiagnosticHook`]. Used for local feedback
//!   (beeps, display text) where a dropped duplicate is harmless.

use doorlock_core::{Error, Result};
use doorlock_protocol::RejectReason;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, trace};

/// Identity of a queue, used in diagnostics and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    /// Identification events, sensing unit to host bridge.
    Events,
    /// Actuator commands to the arbitration unit.
    Actuator,
    /// Display commands to the feedback unit.
    Display,
    /// Sensor requests, host bridge to sensing unit.
    SensorRequests,
}

impl QueueName {
    pub const ALL: [QueueName; 4] = [
        QueueName::Events,
        QueueName::Actuator,
        QueueName::Display,
        QueueName::SensorRequests,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Events => "events",
            QueueName::Actuator => "actuator",
            QueueName::Display => "display",
            QueueName::SensorRequests => "sensor_requests",
        }
    }

    fn index(&self) -> usize {
        match self {
            QueueName::Events => 0,
            QueueName::Actuator => 1,
            QueueName::Display => 2,
            QueueName::SensorRequests => 3,
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer for the silent failure paths of the firmware.
///
/// Dropping a message on a full queue and ignoring a malformed host line are
/// normal behaviour; the hook makes them countable without changing it.
pub trait DiagnosticHook: Send + Sync {
    /// A non-blocking send found `queue` full and dropped its message.
    fn message_dropped(&self, queue: QueueName);

    /// The host bridge ignored an inbound line.
    fn line_rejected(&self, reason: &RejectReason);
}

/// Default hook: logs at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticHook for TracingDiagnostics {
    fn message_dropped(&self, queue: QueueName) {
        debug!(%queue, "queue full, message dropped");
    }

    fn line_rejected(&self, reason: &RejectReason) {
        debug!(%reason, "inbound line ignored");
    }
}

/// Hook that counts drops and rejections, for tests and health reporting.
///
/// # Examples
///
/// ```
/// use doorlock_firmware::channels::{DiagnosticCounter, DiagnosticHook, QueueName};
///
/// let counter = DiagnosticCounter::default();
/// counter.message_dropped(QueueName::Display);
/// assert_eq!(counter.dropped(QueueName::Display), 1);
/// assert_eq!(counter.total_dropped(), 1);
/// ```
#[derive(Debug, Default)]
pub struct DiagnosticCounter {
    dropped: [AtomicUsize; 4],
    rejected: AtomicUsize,
}

impl DiagnosticCounter {
    /// Messages dropped on `queue` so far.
    pub fn dropped(&self, queue: QueueName) -> usize {
        self.dropped[queue.index()].load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> usize {
        QueueName::ALL.iter().map(|queue| self.dropped(*queue)).sum()
    }

    /// Inbound lines ignored so far.
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl DiagnosticHook for DiagnosticCounter {
    fn message_dropped(&self, queue: QueueName) {
        self.dropped[queue.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn line_rejected(&self, _reason: &RejectReason) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }
}

/// Create a bounded queue.
///
/// # Panics
///
/// Panics if `capacity` is zero; [`FirmwareConfig::validate`] rules that out.
///
/// [`FirmwareConfig::validate`]: crate::FirmwareConfig::validate
pub fn queue<T>(
    name: QueueName,
    capacity: usize,
    hook: Arc<dyn DiagnosticHook>,
) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueSender { name, tx, hook }, QueueReceiver { name, rx })
}

/// Producer end of a queue. Cloneable; a queue may have several producers.
pub struct QueueSender<T> {
    name: QueueName,
    tx: mpsc::Sender<T>,
    hook: Arc<dyn DiagnosticHook>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            hook: Arc::clone(&self.hook),
        }
    }
}

impl<T> fmt::Debug for QueueSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSender")
            .field("name", &self.name)
            .field("capacity", &self.tx.max_capacity())
            .finish()
    }
}

impl<T> QueueSender<T> {
    /// Enqueue `message`, waiting for space.
    ///
    /// # Errors
    ///
    /// Returns `Error::QueueClosed` once the consumer is gone.
    pub async fn send(&self, message: T) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| Error::QueueClosed(self.name.as_str()))
    }

    /// Enqueue `message` if there is room right now.
    ///
    /// Returns `false` when the message was dropped, either because the
    /// queue is full (reported to the diagnostic hook) or because the
    /// consumer is gone.
    pub fn offer(&self, message: T) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.hook.message_dropped(self.name);
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!(queue = %self.name, "offer to closed queue");
                false
            }
        }
    }

    pub fn name(&self) -> QueueName {
        self.name
    }
}

/// Consumer end of a queue.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    name: QueueName,
    rx: mpsc::Receiver<T>,
}

impl<T> QueueReceiver<T> {
    /// Wait up to `wait` for the next message.
    ///
    /// Returns `Ok(None)` when the wait elapsed with the queue empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::QueueClosed` once every producer is gone and the
    /// queue is drained.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Result<Option<T>> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => Err(Error::QueueClosed(self.name.as_str())),
            Err(_elapsed) => Ok(None),
        }
    }

    /// Take the next message without waiting.
    ///
    /// # Errors
    ///
    /// Returns `Error::QueueClosed` once every producer is gone and the
    /// queue is drained.
    pub fn try_recv(&mut self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::QueueClosed(self.name.as_str())),
        }
    }

    /// Wait for the next message. `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn name(&self) -> QueueName {
        self.name
    }
}
