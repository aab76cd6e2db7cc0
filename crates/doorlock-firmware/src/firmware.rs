//! Top-level assembly.
//!
//! [`FirmwareBuilder`] collects the peripherals, creates the queues and
//! wires each unit to the ends it needs. Nothing runs until
//! [`Firmware::spawn`], and a board missing required hardware is rejected
//! by [`FirmwareBuilder::build`] before any unit exists.
//!
//! ```text
//!               events (block)                 ┌──────────────┐
//!  ┌─────────┐ ──────────────────────────────► │              │ ◄── serial in
//!  │ Sensing │ ◄────── sensor requests ─────── │ Host bridge  │
//!  └─────────┘                                 │              │ ──► serial out
//!     │   │ beep/light (offer)                 └──────────────┘
//!     │   ▼                                       │      │
//!     │ ┌─────────────┐ ◄───── actuator ──────────┘      │
//!     │ │ Arbitration │                                  │ display
//!     │ └─────────────┘ ── display (relock) ──┐          │
//!     │                                       ▼          ▼
//!     └──────────── display (offer) ──────► ┌──────────────┐
//!                                           │   Feedback   │
//!                                           └──────────────┘
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use doorlock_firmware::{FirmwareBuilder, FirmwareConfig};
//! use doorlock_hardware::mock::{MockCardReader, MockDisplay, MockKeypad, MockPin};
//!
//! # async fn example() -> doorlock_core::Result<()> {
//! let (keypad, _keys) = MockKeypad::new();
//! let (display, _lcd) = MockDisplay::new(16, 2);
//! let (reader, _cards) = MockCardReader::new();
//! let (relay, _) = MockPin::new();
//! let (buzzer, _) = MockPin::new();
//! let (light, _) = MockPin::new();
//!
//! let firmware = FirmwareBuilder::new(FirmwareConfig::default())
//!     .keypad(keypad)
//!     .display(display)
//!     .card_reader(reader)
//!     .relay(relay)
//!     .buzzer(buzzer)
//!     .light(light)
//!     .serial(tokio::io::stdin(), tokio::io::stdout())
//!     .build()?;
//!
//! let handle = firmware.spawn();
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::arbitration::{Actuators, ArbitrationQueues, ArbitrationUnit};
use crate::bridge::{BridgeQueues, HostBridge};
use crate::channels::{DiagnosticHook, QueueName, TracingDiagnostics, queue};
use crate::config::FirmwareConfig;
use crate::feedback::FeedbackUnit;
use crate::sensing::{SensingQueues, SensingUnit};
use doorlock_core::{Error, Result};
use doorlock_hardware::{
    CardReader, CharacterDisplay, FingerprintSensor, KeypadScanner, OutputPin, Unwired,
};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, Empty, Sink};
use tokio::task::{self, JoinError, JoinSet};
use tracing::{Instrument, error, info, info_span, warn};

/// Scheduling priority of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Low => "low",
        }
    }
}

/// The four units of the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Sensing,
    Arbitration,
    Feedback,
    HostBridge,
}

impl Unit {
    pub fn name(&self) -> &'static str {
        match self {
            Unit::Sensing => "sensing",
            Unit::Arbitration => "arbitration",
            Unit::Feedback => "feedback",
            Unit::HostBridge => "host_bridge",
        }
    }

    /// Time-critical units run high; the display runs low.
    pub fn priority(&self) -> Priority {
        match self {
            Unit::Feedback => Priority::Low,
            Unit::Sensing | Unit::Arbitration | Unit::HostBridge => Priority::High,
        }
    }

    /// Core the unit is pinned to on a dual-core board. Recorded on the
    /// unit's tracing span; the tokio runtime does not pin tasks.
    pub fn core(&self) -> u8 {
        match self {
            Unit::Feedback => 0,
            Unit::Sensing | Unit::Arbitration | Unit::HostBridge => 1,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collects the board's peripherals.
///
/// Setters for generic peripherals change the builder's type, so a board
/// without, say, a card reader simply never calls [`FirmwareBuilder::card_reader`]
/// and keeps the [`Unwired`] placeholder.
pub struct FirmwareBuilder<K = Unwired, D = Unwired, F = Unwired, C = Unwired, R = Empty, W = Sink>
{
    config: FirmwareConfig,
    diagnostics: Arc<dyn DiagnosticHook>,
    keypad: Option<K>,
    display: Option<D>,
    sensor: Option<F>,
    reader: Option<C>,
    serial: Option<(R, W)>,
    relay: Option<Box<dyn OutputPin>>,
    buzzer: Option<Box<dyn OutputPin>>,
    light: Option<Box<dyn OutputPin>>,
}

impl FirmwareBuilder {
    pub fn new(config: FirmwareConfig) -> Self {
        Self {
            config,
            diagnostics: Arc::new(TracingDiagnostics),
            keypad: None,
            display: None,
            sensor: None,
            reader: None,
            serial: None,
            relay: None,
            buzzer: None,
            light: None,
        }
    }
}

impl<K, D, F, C, R, W> FirmwareBuilder<K, D, F, C, R, W> {
    pub fn keypad<K2: KeypadScanner>(self, keypad: K2) -> FirmwareBuilder<K2, D, F, C, R, W> {
        FirmwareBuilder {
            config: self.config,
            diagnostics: self.diagnostics,
            keypad: Some(keypad),
            display: self.display,
            sensor: self.sensor,
            reader: self.reader,
            serial: self.serial,
            relay: self.relay,
            buzzer: self.buzzer,
            light: self.light,
        }
    }

    pub fn display<D2: CharacterDisplay>(self, display: D2) -> FirmwareBuilder<K, D2, F, C, R, W> {
        FirmwareBuilder {
            config: self.config,
            diagnostics: self.diagnostics,
            keypad: self.keypad,
            display: Some(display),
            sensor: self.sensor,
            reader: self.reader,
            serial: self.serial,
            relay: self.relay,
            buzzer: self.buzzer,
            light: self.light,
        }
    }

    pub fn fingerprint_sensor<F2: FingerprintSensor>(
        self,
        sensor: F2,
    ) -> FirmwareBuilder<K, D, F2, C, R, W> {
        FirmwareBuilder {
            config: self.config,
            diagnostics: self.diagnostics,
            keypad: self.keypad,
            display: self.display,
            sensor: Some(sensor),
            reader: self.reader,
            serial: self.serial,
            relay: self.relay,
            buzzer: self.buzzer,
            light: self.light,
        }
    }

    pub fn card_reader<C2: CardReader>(self, reader: C2) -> FirmwareBuilder<K, D, F, C2, R, W> {
        FirmwareBuilder {
            config: self.config,
            diagnostics: self.diagnostics,
            keypad: self.keypad,
            display: self.display,
            sensor: self.sensor,
            reader: Some(reader),
            serial: self.serial,
            relay: self.relay,
            buzzer: self.buzzer,
            light: self.light,
        }
    }

    /// The host link: inbound lines are read from `reader`, events and
    /// status lines are written to `writer`.
    pub fn serial<R2, W2>(self, reader: R2, writer: W2) -> FirmwareBuilder<K, D, F, C, R2, W2>
    where
        R2: AsyncRead + Unpin + Send,
        W2: AsyncWrite + Unpin + Send,
    {
        FirmwareBuilder {
            config: self.config,
            diagnostics: self.diagnostics,
            keypad: self.keypad,
            display: self.display,
            sensor: self.sensor,
            reader: self.reader,
            serial: Some((reader, writer)),
            relay: self.relay,
            buzzer: self.buzzer,
            light: self.light,
        }
    }

    pub fn relay(mut self, pin: impl OutputPin + 'static) -> Self {
        self.relay = Some(Box::new(pin));
        self
    }

    pub fn buzzer(mut self, pin: impl OutputPin + 'static) -> Self {
        self.buzzer = Some(Box::new(pin));
        self
    }

    pub fn light(mut self, pin: impl OutputPin + 'static) -> Self {
        self.light = Some(Box::new(pin));
        self
    }

    /// Replace the default [`TracingDiagnostics`] hook.
    pub fn diagnostics(mut self, hook: Arc<dyn DiagnosticHook>) -> Self {
        self.diagnostics = hook;
        self
    }
}

impl<K, D, F, C, R, W> FirmwareBuilder<K, D, F, C, R, W>
where
    K: KeypadScanner,
    D: CharacterDisplay,
    F: FingerprintSensor,
    C: CardReader,
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Validate the configuration and hardware, create the queues and
    /// construct every unit.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the configuration is invalid
    /// - `Error::MissingHardware` naming the first absent required peripheral
    /// - `Error::NoIdentificationModality` if neither a fingerprint sensor
    ///   nor a card reader was supplied
    pub fn build(self) -> Result<Firmware<K, D, F, C, R, W>> {
        self.config.validate()?;

        let relay = self.relay.ok_or(Error::MissingHardware("relay"))?;
        let buzzer = self.buzzer.ok_or(Error::MissingHardware("buzzer"))?;
        let light = self.light.ok_or(Error::MissingHardware("status light"))?;
        let display = self.display.ok_or(Error::MissingHardware("display"))?;
        let keypad = self.keypad.ok_or(Error::MissingHardware("keypad"))?;
        let (serial_in, serial_out) = self.serial.ok_or(Error::MissingHardware("serial link"))?;
        let fingerprint = self.sensor.is_some();
        let card_reader = self.reader.is_some();
        if !fingerprint && !card_reader {
            return Err(Error::NoIdentificationModality);
        }

        let config = Arc::new(self.config);
        let hook = self.diagnostics;
        let capacities = &config.queues;

        let (events_tx, events_rx) = queue(QueueName::Events, capacities.events, hook.clone());
        let (actuator_tx, actuator_rx) =
            queue(QueueName::Actuator, capacities.actuator, hook.clone());
        let (display_tx, display_rx) = queue(QueueName::Display, capacities.display, hook.clone());
        let (requests_tx, requests_rx) = queue(
            QueueName::SensorRequests,
            capacities.sensor_requests,
            hook.clone(),
        );

        let feedback = FeedbackUnit::new(Arc::clone(&config), display, display_rx);

        let arbitration = ArbitrationUnit::new(
            Arc::clone(&config),
            Actuators {
                relay,
                buzzer,
                light,
            },
            ArbitrationQueues {
                commands: actuator_rx,
                display: display_tx.clone(),
                events: events_tx.clone(),
            },
        );

        let sensing = SensingUnit::new(
            Arc::clone(&config),
            keypad,
            self.sensor,
            self.reader,
            SensingQueues {
                events: events_tx,
                actuator: actuator_tx.clone(),
                display: display_tx.clone(),
                requests: requests_rx,
            },
        );

        let bridge = HostBridge::new(
            Arc::clone(&config),
            serial_in,
            serial_out,
            BridgeQueues {
                actuator: actuator_tx,
                display: display_tx,
                requests: requests_tx,
                events: events_rx,
            },
            hook.clone(),
        );

        info!(fingerprint, card_reader, "firmware assembled");

        Ok(Firmware {
            config,
            diagnostics: hook,
            sensing,
            arbitration,
            feedback,
            bridge,
        })
    }
}

/// Assembled firmware, ready to spawn.
pub struct Firmware<K, D, F, C, R, W> {
    config: Arc<FirmwareConfig>,
    diagnostics: Arc<dyn DiagnosticHook>,
    sensing: SensingUnit<K, F, C>,
    arbitration: ArbitrationUnit,
    feedback: FeedbackUnit<D>,
    bridge: HostBridge<R, W>,
}

impl<K, D, F, C, R, W> Firmware<K, D, F, C, R, W>
where
    K: KeypadScanner + 'static,
    D: CharacterDisplay + 'static,
    F: FingerprintSensor + 'static,
    C: CardReader + 'static,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn config(&self) -> &FirmwareConfig {
        &self.config
    }

    /// Spawn every unit on the current runtime.
    ///
    /// Each unit runs inside an `info_span!("unit", ...)` carrying its name,
    /// priority and core.
    pub fn spawn(self) -> FirmwareHandle {
        let mut handle = FirmwareHandle {
            tasks: JoinSet::new(),
            units: HashMap::new(),
            diagnostics: self.diagnostics,
        };

        handle.spawn_unit(Unit::Feedback, self.feedback.run());
        handle.spawn_unit(Unit::Arbitration, self.arbitration.run());
        handle.spawn_unit(Unit::Sensing, self.sensing.run());
        handle.spawn_unit(Unit::HostBridge, self.bridge.run());

        info!(units = handle.units.len(), "firmware started");
        handle
    }
}

/// How a unit's task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTermination {
    /// The unit returned `Ok`.
    Success,
    /// The unit returned an error.
    Error,
    /// The task was aborted.
    Cancelled,
    /// The task panicked.
    Panic,
}

/// Count of unit terminations observed during shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub panicked: usize,
}

impl ShutdownReport {
    fn record(&mut self, termination: TaskTermination) {
        match termination {
            TaskTermination::Success => self.completed += 1,
            TaskTermination::Error => self.failed += 1,
            TaskTermination::Cancelled => self.cancelled += 1,
            TaskTermination::Panic => self.panicked += 1,
        }
    }

    /// No unit failed or panicked.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.panicked == 0
    }
}

/// Handle on the running units.
pub struct FirmwareHandle {
    tasks: JoinSet<Result<()>>,
    units: HashMap<task::Id, Unit>,
    diagnostics: Arc<dyn DiagnosticHook>,
}

impl FirmwareHandle {
    fn spawn_unit<Fut>(&mut self, unit: Unit, future: Fut)
    where
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let span = info_span!(
            "unit",
            name = unit.name(),
            priority = unit.priority().as_str(),
            core = unit.core()
        );
        let id = self.tasks.spawn(future.instrument(span)).id();
        self.units.insert(id, unit);
    }

    /// The diagnostic hook shared by every queue and the host bridge.
    pub fn diagnostics(&self) -> &Arc<dyn DiagnosticHook> {
        &self.diagnostics
    }

    /// Number of units still running.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next unit to stop.
    ///
    /// Returns `None` once every unit has stopped.
    pub async fn wait_any(&mut self) -> Option<(Unit, TaskTermination)> {
        let joined = self.tasks.join_next_with_id().await?;
        let id = match &joined {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let termination = classify_task_result(joined.map(|(_, result)| result));
        let unit = self.units.remove(&id)?;

        match termination {
            TaskTermination::Success => info!(%unit, "unit stopped"),
            TaskTermination::Cancelled => info!(%unit, "unit cancelled"),
            TaskTermination::Error => error!(%unit, "unit failed"),
            TaskTermination::Panic => error!(%unit, "unit panicked"),
        }
        Some((unit, termination))
    }

    /// Abort every unit and wait for all of them to terminate.
    ///
    /// Commands already dequeued by a unit are not resumed.
    pub async fn shutdown(mut self) -> ShutdownReport {
        self.tasks.abort_all();

        let mut report = ShutdownReport::default();
        while let Some(joined) = self.tasks.join_next().await {
            if let Ok(Err(e)) = &joined {
                warn!(error = %e, "unit error at shutdown");
            }
            report.record(classify_task_result(joined));
        }

        info!(
            completed = report.completed,
            failed = report.failed,
            cancelled = report.cancelled,
            panicked = report.panicked,
            "firmware stopped"
        );
        report
    }
}

fn classify_task_result(result: std::result::Result<Result<()>, JoinError>) -> TaskTermination {
    match result {
        Ok(Ok(())) => TaskTermination::Success,
        Ok(Err(_)) => TaskTermination::Error,
        Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
        Err(_) => TaskTermination::Panic,
    }
}
