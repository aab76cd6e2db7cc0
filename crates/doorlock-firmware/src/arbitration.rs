//! Arbitration unit.
//!
//! Sole owner of the relay, buzzer and status light. Each pass takes at most
//! one actuator command (waiting briefly for it), then checks the auto-relock
//! deadline. The deadline check runs every pass whether or not a command
//! arrived, so command traffic cannot starve relocking.

use crate::channels::{QueueReceiver, QueueSender};
use crate::config::FirmwareConfig;
use doorlock_core::{
    BeepPattern, ControlCommand, DoorState, Error, IdentificationEvent, LightMode, Result,
};
use doorlock_hardware::OutputPin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

/// Lock state owned by the arbitration unit.
///
/// The door is unlocked only by [`LockState::unlock`] and locked again only
/// by [`LockState::lock`], which the unit calls on an explicit lock command
/// or when [`LockState::relock_due`] reports the deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockState {
    unlocked: Option<Unlocked>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Unlocked {
    since: Instant,
    duration: Duration,
}

impl LockState {
    pub fn new() -> Self {
        Self { unlocked: None }
    }

    pub fn door(&self) -> DoorState {
        if self.unlocked.is_some() {
            DoorState::Unlocked
        } else {
            DoorState::Locked
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.is_some()
    }

    /// Open for `duration` from `now`. Returns `true` if the door was locked;
    /// an open door just gets a fresh deadline.
    pub fn unlock(&mut self, now: Instant, duration: Duration) -> bool {
        self.unlocked
            .replace(Unlocked {
                since: now,
                duration,
            })
            .is_none()
    }

    /// Returns `true` if the door was open.
    pub fn lock(&mut self) -> bool {
        self.unlocked.take().is_some()
    }

    /// Whether strictly more than the unlock duration has elapsed at `now`.
    pub fn relock_due(&self, now: Instant) -> bool {
        self.unlocked
            .is_some_and(|open| now.saturating_duration_since(open.since) > open.duration)
    }
}

impl Default for LockState {
    fn default() -> Self {
        Self::new()
    }
}

/// Actuator outputs driven by the arbitration unit.
pub struct Actuators {
    pub relay: Box<dyn OutputPin>,
    pub buzzer: Box<dyn OutputPin>,
    pub light: Box<dyn OutputPin>,
}

/// Queue ends used by the arbitration unit.
#[derive(Debug)]
pub struct ArbitrationQueues {
    pub commands: QueueReceiver<ControlCommand>,
    pub display: QueueSender<ControlCommand>,
    pub events: QueueSender<IdentificationEvent>,
}

/// The arbitration unit.
pub struct ArbitrationUnit {
    config: Arc<FirmwareConfig>,
    actuators: Actuators,
    queues: ArbitrationQueues,
    lock: LockState,
}

impl ArbitrationUnit {
    /// Create the unit. The relay is driven low so output and state agree.
    pub fn new(config: Arc<FirmwareConfig>, mut actuators: Actuators, queues: ArbitrationQueues) -> Self {
        actuators.relay.set_low();
        actuators.buzzer.set_low();
        actuators.light.set_low();
        Self {
            config,
            actuators,
            queues,
            lock: LockState::new(),
        }
    }

    pub fn lock_state(&self) -> &LockState {
        &self.lock
    }

    /// Run until every actuator command producer is gone.
    ///
    /// # Errors
    ///
    /// Never returns an error today; the signature matches the other units.
    pub async fn run(mut self) -> Result<()> {
        loop {
            match self.run_pass().await {
                Ok(()) => {}
                Err(Error::QueueClosed(queue)) => {
                    info!(queue, "queue closed, arbitration unit stopping");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One scheduling pass.
    ///
    /// # Errors
    ///
    /// Returns `Error::QueueClosed` once the command queue is closed.
    pub async fn run_pass(&mut self) -> Result<()> {
        let wait = self.config.timing.actuator_poll();
        if let Some(command) = self.queues.commands.recv_timeout(wait).await? {
            self.apply(command).await;
        }
        self.check_relock(Instant::now());
        Ok(())
    }

    async fn apply(&mut self, command: ControlCommand) {
        debug!(?command, "actuator command");
        match command {
            ControlCommand::Unlock { seconds } => {
                let duration = Duration::from_secs(u64::try_from(seconds).unwrap_or(0));
                self.actuators.relay.set_high();
                let opened = self.lock.unlock(Instant::now(), duration);
                info!(seconds, "door unlocked");
                if opened {
                    self.report(DoorState::Unlocked);
                }
            }
            ControlCommand::Lock => {
                self.actuators.relay.set_low();
                if self.lock.lock() {
                    info!("door locked");
                    self.report(DoorState::Locked);
                }
            }
            ControlCommand::Beep { times } => self.beep(BeepPattern::from_times(times)).await,
            ControlCommand::StatusLight(mode) => self.light(mode).await,
            ControlCommand::UpdateDisplay(_) => {
                debug!("display command on actuator queue, forwarding");
                self.queues.display.offer(command);
            }
        }
    }

    fn check_relock(&mut self, now: Instant) {
        if !self.lock.relock_due(now) {
            return;
        }
        self.actuators.relay.set_low();
        self.lock.lock();
        info!("auto-relock");
        self.queues
            .display
            .offer(ControlCommand::display(&self.config.messages.door_locked));
        self.report(DoorState::Locked);
    }

    fn report(&self, door: DoorState) {
        self.queues.events.offer(IdentificationEvent::door_status(door));
    }

    async fn beep(&mut self, pattern: BeepPattern) {
        let (on, off, pulses) = self.config.actuator.beep_cadence(pattern);
        if pulses < pattern.pulses() {
            debug!(requested = pattern.pulses(), pulses, "beep capped");
        }
        pulse(self.actuators.buzzer.as_mut(), on, off, pulses).await;
    }

    async fn light(&mut self, mode: LightMode) {
        let actuator = &self.config.actuator;
        let light = self.actuators.light.as_mut();
        match mode {
            LightMode::Off => light.set_low(),
            LightMode::Solid => light.set_high(),
            LightMode::SlowBlink => {
                let half = actuator.slow_blink();
                pulse(light, half, half, actuator.slow_blink_count).await;
            }
            LightMode::FastBlink => {
                let half = actuator.fast_blink();
                pulse(light, half, half, actuator.fast_blink_count).await;
            }
        }
    }
}

/// Drive `pin` through `count` on/off cycles. The pin ends low.
async fn pulse(pin: &mut dyn OutputPin, on: Duration, off: Duration, count: u32) {
    for _ in 0..count {
        pin.set_high();
        sleep(on).await;
        pin.set_low();
        if !off.is_zero() {
            sleep(off).await;
        }
    }
}
