//! Sensing unit.
//!
//! Owns the identification peripherals and the keypad. Each pass:
//!
//! 1. takes at most one [`SensorRequest`] forwarded by the host bridge;
//! 2. advances the enrollment session if one is active, and ends the pass;
//! 3. otherwise probes the fingerprint sensor and the card reader, each
//!    gated by its own cooldown;
//! 4. scans the keypad.
//!
//! Identification results are sent to the host with a blocking send, so a
//! busy host link slows this unit down instead of losing a result. Local
//! feedback (beeps, light, display text) is offered and may be dropped.
//!
//! A card or finger left in place is read again after every cooldown. Beep
//! and light feedback for a read is skipped while the previous one is still
//! playing, so the arbitration queue never fills up behind host commands.

use crate::channels::{QueueReceiver, QueueSender};
use crate::config::FirmwareConfig;
use crate::enrollment::{self, EnrollmentOutcome, EnrollmentOutput, EnrollmentSession};
use doorlock_core::{
    BeepPattern, ControlCommand, EnrollmentPrompt, Error, EventText, IdentificationEvent, LightMode, Result,
    SensorRequest, SlotId, constants::FIRST_SLOT,
};
use doorlock_hardware::{
    CardReader, CharBuffer, FingerprintSensor, KeypadScanner, SearchMatch, SensorCode,
    SensorResult, Unwired,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Beep count for an accepted identification.
const BEEP_ACCEPTED: i32 = 1;
/// Beep count for a rejected identification.
const BEEP_REJECTED: i32 = -2;
const BEEP_ENROLLED: i32 = 2;
const BEEP_ENROLL_FAILED: i32 = 1;
const BEEP_CLICK: i32 = 0;

/// Queue ends used by the sensing unit.
#[derive(Debug)]
pub struct SensingQueues {
    pub events: QueueSender<IdentificationEvent>,
    pub actuator: QueueSender<ControlCommand>,
    pub display: QueueSender<ControlCommand>,
    pub requests: QueueReceiver<SensorRequest>,
}

/// Gate that stays closed until a deadline: probe cooldowns and feedback.
#[derive(Debug, Clone, Copy)]
struct Cooldown {
    until: Option<Instant>,
}

impl Cooldown {
    fn new() -> Self {
        Self { until: None }
    }

    fn ready(&self, now: Instant) -> bool {
        self.until.is_none_or(|until| now >= until)
    }

    fn start(&mut self, now: Instant, length: Duration) {
        self.until = Some(now + length);
    }
}

/// Keypad line buffer with debounce and idle expiry.
#[derive(Debug)]
pub struct KeyBuffer {
    buffer: EventText,
    last_key: Option<(char, Instant)>,
    debounce: Duration,
    idle_window: Duration,
}

/// What a key press did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Repeat of the previous key within the debounce window.
    Bounced,
    /// The buffer was submitted; carries its contents.
    Submitted(EventText),
    /// Terminator on an empty buffer.
    EmptySubmit,
    Cleared,
    /// Key appended; carries the new length in characters.
    Appended(usize),
    /// Buffer is full; the key was not stored.
    Full,
}

impl KeyBuffer {
    pub fn new(debounce: Duration, idle_window: Duration) -> Self {
        Self {
            buffer: EventText::new(),
            last_key: None,
            debounce,
            idle_window,
        }
    }

    /// Apply one key press at `now`.
    pub fn press(&mut self, key: char, now: Instant, submit_key: char, clear_key: char) -> KeyAction {
        if let Some((last, at)) = self.last_key {
            let since = now.duration_since(at);
            if last == key && since < self.debounce {
                return KeyAction::Bounced;
            }
            if since > self.idle_window && !self.buffer.is_empty() {
                debug!("keypad idle window expired, buffer discarded");
                self.buffer.clear();
            }
        }
        self.last_key = Some((key, now));

        if key == submit_key {
            if self.buffer.is_empty() {
                return KeyAction::EmptySubmit;
            }
            let submitted = self.buffer;
            self.buffer.clear();
            KeyAction::Submitted(submitted)
        } else if key == clear_key {
            self.buffer.clear();
            KeyAction::Cleared
        } else if self.buffer.push(key) {
            KeyAction::Appended(self.buffer.char_count())
        } else {
            KeyAction::Full
        }
    }

    pub fn contents(&self) -> &str {
        self.buffer.as_str()
    }
}

/// The sensing unit.
///
/// `F` and `C` default to [`Unwired`] for boards without a fingerprint
/// sensor or card reader; at least one of them is fitted.
pub struct SensingUnit<K, F = Unwired, C = Unwired> {
    config: Arc<FirmwareConfig>,
    keypad: K,
    sensor: Option<F>,
    reader: Option<C>,
    queues: SensingQueues,
    session: Option<EnrollmentSession>,
    keys: KeyBuffer,
    sensor_cooldown: Cooldown,
    reader_cooldown: Cooldown,
    feedback: Cooldown,
}

impl<K, F, C> SensingUnit<K, F, C>
where
    K: KeypadScanner,
    F: FingerprintSensor,
    C: CardReader,
{
    pub fn new(
        config: Arc<FirmwareConfig>,
        keypad: K,
        sensor: Option<F>,
        reader: Option<C>,
        queues: SensingQueues,
    ) -> Self {
        let keys = KeyBuffer::new(config.keypad.debounce(), config.keypad.idle_window());
        Self {
            config,
            keypad,
            sensor,
            reader,
            queues,
            session: None,
            keys,
            sensor_cooldown: Cooldown::new(),
            reader_cooldown: Cooldown::new(),
            feedback: Cooldown::new(),
        }
    }

    /// The enrollment session in progress, if any.
    pub fn session(&self) -> Option<&EnrollmentSession> {
        self.session.as_ref()
    }

    /// Run until a queue this unit depends on closes.
    ///
    /// # Errors
    ///
    /// Never returns an error today; the signature matches the other units.
    pub async fn run(mut self) -> Result<()> {
        self.handshake().await;

        loop {
            match self.run_pass().await {
                Ok(()) => {}
                Err(Error::QueueClosed(queue)) => {
                    info!(queue, "queue closed, sensing unit stopping");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }

            let pause = if self.session.is_some() {
                self.config.timing.enrollment_pass()
            } else {
                self.config.timing.sensing_pass()
            };
            tokio::time::sleep(pause).await;
        }
    }

    async fn handshake(&mut self) {
        let Some(sensor) = self.sensor.as_mut() else {
            return;
        };
        match sensor.verify_password().await {
            Ok(()) => info!("fingerprint sensor ready"),
            Err(code) => warn!(%code, "fingerprint sensor handshake failed"),
        }
    }

    /// One scheduling pass, without the trailing pause.
    ///
    /// # Errors
    ///
    /// Returns `Error::QueueClosed` when the host bridge is gone.
    pub async fn run_pass(&mut self) -> Result<()> {
        if let Some(request) = self.queues.requests.try_recv()? {
            self.handle_request(request).await?;
        }

        if self.session.is_some() {
            return self.advance_enrollment().await;
        }

        self.probe_fingerprint().await?;
        self.probe_card().await?;
        self.scan_keypad().await
    }

    // Sensor administration

    async fn handle_request(&mut self, request: SensorRequest) -> Result<()> {
        debug!(?request, "sensor request");
        match request {
            SensorRequest::Enroll { slot } => self.start_enrollment(slot).await,
            SensorRequest::Delete { slot } => self.delete(slot).await,
            SensorRequest::List => self.list().await,
            SensorRequest::ClearAll => self.clear_all().await,
        }
    }

    async fn start_enrollment(&mut self, slot: SlotId) -> Result<()> {
        if self.sensor.is_none() {
            warn!(slot, "enrollment requested without a fingerprint sensor");
            return self
                .finish_enrollment(EnrollmentOutcome::Failed {
                    code: SensorCode::PACKET_RECEIVE_ERR,
                })
                .await;
        }
        if let Some(previous) = self.session.replace(EnrollmentSession::new(slot)) {
            info!(previous = previous.slot(), slot, "enrollment restarted");
        } else {
            info!(slot, "enrollment started");
        }
        Ok(())
    }

    async fn delete(&mut self, slot: SlotId) -> Result<()> {
        let result = match self.sensor.as_mut() {
            Some(sensor) => sensor.delete_model(slot).await,
            None => Err(SensorCode::PACKET_RECEIVE_ERR),
        };
        match result {
            Ok(()) => {
                info!(slot, "fingerprint deleted");
                self.queues
                    .events
                    .send(IdentificationEvent::fingerprint_deleted(slot))
                    .await?;
                self.show(&self.config.messages.finger_deleted);
            }
            Err(code) => {
                warn!(slot, %code, "fingerprint delete failed");
                self.queues
                    .events
                    .send(IdentificationEvent::delete_failed(slot))
                    .await?;
            }
        }
        Ok(())
    }

    async fn list(&mut self) -> Result<()> {
        if let Some(sensor) = self.sensor.as_mut() {
            let mut found = 0usize;
            for slot in FIRST_SLOT..=self.config.sensor.capacity {
                if sensor.load_model(slot).await.is_ok() {
                    found += 1;
                    self.queues
                        .events
                        .send(IdentificationEvent::fingerprint_found(slot))
                        .await?;
                }
            }
            info!(found, "fingerprint listing complete");
        }
        self.queues
            .events
            .send(IdentificationEvent::listing_complete())
            .await
    }

    async fn clear_all(&mut self) -> Result<()> {
        let result = match self.sensor.as_mut() {
            Some(sensor) => sensor.empty_database().await,
            None => Err(SensorCode::PACKET_RECEIVE_ERR),
        };
        match result {
            Ok(()) => {
                info!("fingerprint database cleared");
                self.queues
                    .events
                    .send(IdentificationEvent::all_cleared())
                    .await?;
                self.show(&self.config.messages.all_cleared);
            }
            Err(code) => {
                warn!(%code, "fingerprint database clear failed");
                self.queues
                    .events
                    .send(IdentificationEvent::clear_failed())
                    .await?;
            }
        }
        Ok(())
    }

    // Enrollment

    async fn advance_enrollment(&mut self) -> Result<()> {
        let (Some(session), Some(sensor)) = (self.session, self.sensor.as_mut()) else {
            self.session = None;
            return Ok(());
        };

        let event = enrollment::probe(sensor, &session).await;
        let transition = session.advance(event);
        self.session = transition.next;

        for output in transition.outputs {
            match output {
                EnrollmentOutput::Prompt(prompt) => self.prompt(prompt).await?,
                EnrollmentOutput::Settle => {
                    tokio::time::sleep(self.config.sensor.enroll_settle()).await;
                }
                EnrollmentOutput::Finished(outcome) => self.finish_enrollment(outcome).await?,
            }
        }
        Ok(())
    }

    async fn prompt(&mut self, prompt: EnrollmentPrompt) -> Result<()> {
        debug!(prompt = prompt.as_status(), "enrollment prompt");
        let messages = &self.config.messages;
        let text = match prompt {
            EnrollmentPrompt::PlaceFinger => &messages.place_finger,
            EnrollmentPrompt::RemoveFinger => &messages.remove_finger,
            EnrollmentPrompt::PlaceAgain => &messages.place_again,
        };
        self.show(text);
        self.queues
            .events
            .send(IdentificationEvent::enrollment_prompt(prompt))
            .await
    }

    async fn finish_enrollment(&mut self, outcome: EnrollmentOutcome) -> Result<()> {
        let (event, beep, text) = match outcome {
            EnrollmentOutcome::Succeeded { slot } => {
                info!(slot, "enrollment succeeded");
                (
                    IdentificationEvent::enrollment_succeeded(slot),
                    BEEP_ENROLLED,
                    &self.config.messages.enroll_ok,
                )
            }
            EnrollmentOutcome::Failed { code } => {
                warn!(%code, "enrollment failed");
                (
                    IdentificationEvent::enrollment_failed(code.code()),
                    BEEP_ENROLL_FAILED,
                    &self.config.messages.enroll_failed,
                )
            }
        };

        self.queues.events.send(event).await?;
        self.queues.actuator.offer(ControlCommand::Beep { times: beep });
        self.show(text);
        Ok(())
    }

    // Identification

    async fn probe_fingerprint(&mut self) -> Result<()> {
        let now = Instant::now();
        if !self.sensor_cooldown.ready(now) {
            return Ok(());
        }
        let Some(sensor) = self.sensor.as_mut() else {
            return Ok(());
        };

        let result: SensorResult<SearchMatch> = async {
            sensor.capture_image().await?;
            sensor.image_to_template(CharBuffer::One).await?;
            sensor.search().await
        }
        .await;

        match result {
            Ok(found) => {
                debug!(slot = found.slot, confidence = found.confidence, "fingerprint matched");
                self.sensor_cooldown.start(now, self.config.timing.cooldown());
                self.accept(IdentificationEvent::biometric_match(found.slot))
                    .await
            }
            Err(SensorCode::NOT_FOUND) => {
                debug!("fingerprint not enrolled");
                self.sensor_cooldown.start(now, self.config.timing.cooldown());
                self.reject();
                Ok(())
            }
            Err(SensorCode::NO_FINGER) => Ok(()),
            Err(code) => {
                debug!(%code, "fingerprint read failed");
                Ok(())
            }
        }
    }

    async fn probe_card(&mut self) -> Result<()> {
        let now = Instant::now();
        if !self.reader_cooldown.ready(now) {
            return Ok(());
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(());
        };

        match reader.read_card().await {
            Ok(Some(uid)) => {
                debug!(%uid, "card read");
                self.reader_cooldown.start(now, self.config.timing.cooldown());
                self.accept(IdentificationEvent::card_read(&uid.to_hex()))
                    .await
            }
            Ok(None) => Ok(()),
            Err(e) => {
                warn!(error = %e, "card reader failed");
                Ok(())
            }
        }
    }

    async fn accept(&mut self, event: IdentificationEvent) -> Result<()> {
        self.queues.events.send(event).await?;
        self.signal(BEEP_ACCEPTED, LightMode::Solid);
        self.show(&self.config.messages.valid);
        Ok(())
    }

    fn reject(&mut self) {
        self.signal(BEEP_REJECTED, LightMode::Off);
        self.show(&self.config.messages.not_valid);
    }

    /// Queue beep and light feedback unless the last one is still playing.
    fn signal(&mut self, times: i32, light: LightMode) {
        let now = Instant::now();
        if !self.feedback.ready(now) {
            debug!("feedback still playing, skipped");
            return;
        }
        let actuator = &self.config.actuator;
        let busy = actuator.beep_duration(BeepPattern::from_times(times))
            + actuator.light_duration(light);
        self.feedback.start(now, busy);

        self.queues.actuator.offer(ControlCommand::Beep { times });
        self.queues.actuator.offer(ControlCommand::StatusLight(light));
    }

    // Keypad

    async fn scan_keypad(&mut self) -> Result<()> {
        let Some(key) = self.keypad.poll_key() else {
            return Ok(());
        };

        let keypad = &self.config.keypad;
        let action = self
            .keys
            .press(key, Instant::now(), keypad.submit_key, keypad.clear_key);
        if action == KeyAction::Bounced {
            return Ok(());
        }

        self.queues
            .actuator
            .offer(ControlCommand::Beep { times: BEEP_CLICK });
        self.queues.events.offer(IdentificationEvent::key_pressed(key));

        match action {
            KeyAction::Submitted(buffer) => {
                debug!(length = buffer.char_count(), "keypad buffer submitted");
                self.queues
                    .events
                    .send(IdentificationEvent::keypad_submit(&buffer))
                    .await?;
            }
            KeyAction::Appended(length) => {
                let shown = length.min(usize::from(self.config.display.columns));
                let masked: String = std::iter::repeat_n(keypad.mask_char, shown).collect();
                self.show(&masked);
            }
            KeyAction::Full => debug!("keypad buffer full, key ignored"),
            KeyAction::Bounced | KeyAction::EmptySubmit | KeyAction::Cleared => {}
        }
        Ok(())
    }

    fn show(&self, text: &str) {
        self.queues.display.offer(ControlCommand::display(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMIT: char = '#';
    const CLEAR: char = 'C';

    fn buffer() -> KeyBuffer {
        KeyBuffer::new(Duration::from_millis(50), Duration::from_secs(5))
    }

    fn type_keys(keys: &mut KeyBuffer, text: &str, start: Instant) -> Vec<KeyAction> {
        text.chars()
            .enumerate()
            .map(|(i, key)| {
                let at = start + Duration::from_millis(100 * i as u64);
                keys.press(key, at, SUBMIT, CLEAR)
            })
            .collect()
    }

    #[test]
    fn test_submit_carries_buffer() {
        let mut keys = buffer();
        let actions = type_keys(&mut keys, "1234#", Instant::now());

        assert_eq!(actions[3], KeyAction::Appended(4));
        match actions[4] {
            KeyAction::Submitted(text) => assert_eq!(text.as_str(), "1234"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(keys.contents(), "");
    }

    #[test]
    fn test_empty_submit() {
        let mut keys = buffer();
        assert_eq!(
            keys.press(SUBMIT, Instant::now(), SUBMIT, CLEAR),
            KeyAction::EmptySubmit
        );
    }

    #[test]
    fn test_clear_key_discards() {
        let mut keys = buffer();
        let actions = type_keys(&mut keys, "12C3#", Instant::now());

        assert_eq!(actions[2], KeyAction::Cleared);
        match actions[4] {
            KeyAction::Submitted(text) => assert_eq!(text.as_str(), "3"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bounce_is_ignored() {
        let mut keys = buffer();
        let start = Instant::now();

        assert_eq!(keys.press('5', start, SUBMIT, CLEAR), KeyAction::Appended(1));
        assert_eq!(
            keys.press('5', start + Duration::from_millis(20), SUBMIT, CLEAR),
            KeyAction::Bounced
        );
        assert_eq!(
            keys.press('5', start + Duration::from_millis(120), SUBMIT, CLEAR),
            KeyAction::Appended(2)
        );
        assert_eq!(
            keys.press('6', start + Duration::from_millis(130), SUBMIT, CLEAR),
            KeyAction::Appended(3)
        );
    }

    #[test]
    fn test_idle_window_discards_partial_input() {
        let mut keys = buffer();
        let start = Instant::now();
        keys.press('1', start, SUBMIT, CLEAR);
        keys.press('2', start + Duration::from_millis(100), SUBMIT, CLEAR);

        let late = start + Duration::from_millis(100) + Duration::from_millis(5001);
        assert_eq!(keys.press('9', late, SUBMIT, CLEAR), KeyAction::Appended(1));
        assert_eq!(keys.contents(), "9");
    }

    #[test]
    fn test_idle_window_boundary_keeps_input() {
        let mut keys = buffer();
        let start = Instant::now();
        keys.press('1', start, SUBMIT, CLEAR);

        let at_limit = start + Duration::from_secs(5);
        assert_eq!(keys.press('2', at_limit, SUBMIT, CLEAR), KeyAction::Appended(2));
    }

    #[test]
    fn test_buffer_is_capped() {
        let mut keys = buffer();
        let digits: String = std::iter::repeat_n('7', 32).collect();
        let actions = type_keys(&mut keys, &digits, Instant::now());

        assert_eq!(actions[30], KeyAction::Appended(31));
        assert_eq!(actions[31], KeyAction::Full);
    }

    #[test]
    fn test_cooldown() {
        let mut cooldown = Cooldown::new();
        let now = Instant::now();
        assert!(cooldown.ready(now));

        cooldown.start(now, Duration::from_secs(1));
        assert!(!cooldown.ready(now + Duration::from_millis(999)));
        assert!(cooldown.ready(now + Duration::from_secs(1)));
    }
}
