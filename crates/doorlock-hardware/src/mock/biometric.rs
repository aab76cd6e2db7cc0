//! Mock biometric sensor for testing and development.
//!
//! The mock keeps a small in-memory model of a fingerprint module: the
//! finger currently resting on the window, the two character buffers, the
//! merged model and the template database. A [`MockFingerprintHandle`]
//! moves fingers on and off the window and injects failure codes.

use crate::{
    traits::FingerprintSensor,
    types::{CharBuffer, SearchMatch, SensorCode, SensorResult},
};
use doorlock_core::{SlotId, constants::DEFAULT_SENSOR_CAPACITY};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identity of a simulated finger. Two captures of the same finger produce
/// the same template.
pub type Finger = u32;

/// Sensor operation, used to target injected failures and in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorOp {
    VerifyPassword,
    CaptureImage,
    ImageToTemplate(CharBuffer),
    Search,
    CreateModel,
    StoreModel(SlotId),
    LoadModel(SlotId),
    DeleteModel(SlotId),
    EmptyDatabase,
}

impl SensorOp {
    fn same_kind(&self, other: &SensorOp) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug)]
struct SensorState {
    finger: Option<Finger>,
    image: Option<Finger>,
    buffers: [Option<Finger>; 2],
    model: Option<Finger>,
    database: BTreeMap<SlotId, Finger>,
    capacity: SlotId,
    password_ok: bool,
    faults: VecDeque<(SensorOp, SensorCode)>,
    log: Vec<SensorOp>,
}

impl SensorState {
    fn take_fault(&mut self, op: SensorOp) -> Option<SensorCode> {
        let index = self.faults.iter().position(|(target, _)| target.same_kind(&op))?;
        self.faults.remove(index).map(|(_, code)| code)
    }

    fn slot_in_range(&self, slot: SlotId) -> bool {
        (1..=self.capacity).contains(&slot)
    }
}

fn lock(state: &Mutex<SensorState>) -> MutexGuard<'_, SensorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock fingerprint module.
///
/// # Examples
///
/// ```
/// use doorlock_hardware::mock::MockFingerprintSensor;
/// use doorlock_hardware::{CharBuffer, FingerprintSensor};
///
/// #[tokio::main]
/// async fn main() {
///     let (mut sensor, handle) = MockFingerprintSensor::new();
///     handle.enroll(3, 0xF1);
///
///     handle.place_finger(0xF1);
///     sensor.capture_image().await.unwrap();
///     sensor.image_to_template(CharBuffer::One).await.unwrap();
///     assert_eq!(sensor.search().await.unwrap().slot, 3);
/// }
/// ```
#[derive(Debug)]
pub struct MockFingerprintSensor {
    state: Arc<Mutex<SensorState>>,
}

impl MockFingerprintSensor {
    /// Create a sensor with the default slot capacity.
    pub fn new() -> (Self, MockFingerprintHandle) {
        Self::with_capacity(DEFAULT_SENSOR_CAPACITY)
    }

    /// Create a sensor whose valid slots are `1..=capacity`.
    pub fn with_capacity(capacity: SlotId) -> (Self, MockFingerprintHandle) {
        let state = Arc::new(Mutex::new(SensorState {
            finger: None,
            image: None,
            buffers: [None, None],
            model: None,
            database: BTreeMap::new(),
            capacity,
            password_ok: true,
            faults: VecDeque::new(),
            log: Vec::new(),
        }));

        let handle = MockFingerprintHandle {
            state: Arc::clone(&state),
        };

        (Self { state }, handle)
    }

    fn run<T>(
        &self,
        op: SensorOp,
        body: impl FnOnce(&mut SensorState) -> SensorResult<T>,
    ) -> SensorResult<T> {
        let mut state = lock(&self.state);
        state.log.push(op);
        if let Some(code) = state.take_fault(op) {
            return Err(code);
        }
        body(&mut *state)
    }
}

impl FingerprintSensor for MockFingerprintSensor {
    async fn verify_password(&mut self) -> SensorResult {
        self.run(SensorOp::VerifyPassword, |state| {
            if state.password_ok {
                Ok(())
            } else {
                Err(SensorCode::PASSWORD_FAIL)
            }
        })
    }

    async fn capture_image(&mut self) -> SensorResult {
        self.run(SensorOp::CaptureImage, |state| match state.finger {
            Some(finger) => {
                state.image = Some(finger);
                Ok(())
            }
            None => Err(SensorCode::NO_FINGER),
        })
    }

    async fn image_to_template(&mut self, buffer: CharBuffer) -> SensorResult {
        self.run(SensorOp::ImageToTemplate(buffer), |state| {
            let image = state.image.ok_or(SensorCode::INVALID_IMAGE)?;
            state.buffers[usize::from(buffer.id() - 1)] = Some(image);
            Ok(())
        })
    }

    async fn search(&mut self) -> SensorResult<SearchMatch> {
        self.run(SensorOp::Search, |state| {
            let probe = state.buffers[0].ok_or(SensorCode::INVALID_IMAGE)?;
            state
                .database
                .iter()
                .find(|(_, finger)| **finger == probe)
                .map(|(slot, _)| SearchMatch {
                    slot: *slot,
                    confidence: 100,
                })
                .ok_or(SensorCode::NOT_FOUND)
        })
    }

    async fn create_model(&mut self) -> SensorResult {
        self.run(SensorOp::CreateModel, |state| match state.buffers {
            [Some(first), Some(second)] if first == second => {
                state.model = Some(first);
                Ok(())
            }
            _ => Err(SensorCode::ENROLL_MISMATCH),
        })
    }

    async fn store_model(&mut self, slot: SlotId) -> SensorResult {
        self.run(SensorOp::StoreModel(slot), |state| {
            if !state.slot_in_range(slot) {
                return Err(SensorCode::BAD_LOCATION);
            }
            let model = state.model.ok_or(SensorCode::FLASH_ERR)?;
            state.database.insert(slot, model);
            Ok(())
        })
    }

    async fn load_model(&mut self, slot: SlotId) -> SensorResult {
        self.run(SensorOp::LoadModel(slot), |state| {
            if !state.slot_in_range(slot) {
                return Err(SensorCode::BAD_LOCATION);
            }
            if state.database.contains_key(&slot) {
                Ok(())
            } else {
                Err(SensorCode::DB_READ_FAIL)
            }
        })
    }

    async fn delete_model(&mut self, slot: SlotId) -> SensorResult {
        self.run(SensorOp::DeleteModel(slot), |state| {
            if !state.slot_in_range(slot) {
                return Err(SensorCode::BAD_LOCATION);
            }
            state.database.remove(&slot);
            Ok(())
        })
    }

    async fn empty_database(&mut self) -> SensorResult {
        self.run(SensorOp::EmptyDatabase, |state| {
            state.database.clear();
            Ok(())
        })
    }
}

/// Handle for controlling a mock fingerprint sensor.
///
/// Cloneable; every clone observes and drives the same sensor.
#[derive(Debug, Clone)]
pub struct MockFingerprintHandle {
    state: Arc<Mutex<SensorState>>,
}

impl MockFingerprintHandle {
    /// Rest `finger` on the sensor window.
    pub fn place_finger(&self, finger: Finger) {
        lock(&self.state).finger = Some(finger);
    }

    /// Lift whatever finger rests on the window.
    pub fn remove_finger(&self) {
        lock(&self.state).finger = None;
    }

    /// Pre-load a template for `finger` at `slot`.
    pub fn enroll(&self, slot: SlotId, finger: Finger) {
        lock(&self.state).database.insert(slot, finger);
    }

    /// Make the next `op`-kind command fail with `code`.
    ///
    /// Faults queue up in order; the slot or buffer inside `op` is ignored
    /// when matching.
    pub fn fail_next(&self, op: SensorOp, code: SensorCode) {
        lock(&self.state).faults.push_back((op, code));
    }

    /// Make the password handshake fail.
    pub fn reject_password(&self) {
        lock(&self.state).password_ok = false;
    }

    /// Finger stored at `slot`, if any.
    pub fn template_at(&self, slot: SlotId) -> Option<Finger> {
        lock(&self.state).database.get(&slot).copied()
    }

    /// Occupied slots in ascending order.
    pub fn enrolled_slots(&self) -> Vec<SlotId> {
        lock(&self.state).database.keys().copied().collect()
    }

    /// Every command issued so far, in order.
    pub fn operations(&self) -> Vec<SensorOp> {
        lock(&self.state).log.clone()
    }

    /// Number of commands of the same kind as `op` issued so far.
    pub fn count(&self, op: SensorOp) -> usize {
        lock(&self.state)
            .log
            .iter()
            .filter(|logged| logged.same_kind(&op))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn capture_into(
        sensor: &mut MockFingerprintSensor,
        buffer: CharBuffer,
    ) -> SensorResult {
        sensor.capture_image().await?;
        sensor.image_to_template(buffer).await
    }

    #[tokio::test]
    async fn test_capture_without_finger() {
        let (mut sensor, _handle) = MockFingerprintSensor::new();
        assert_eq!(sensor.capture_image().await, Err(SensorCode::NO_FINGER));
    }

    #[tokio::test]
    async fn test_search_finds_enrolled_finger() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.enroll(5, 42);
        handle.place_finger(42);

        capture_into(&mut sensor, CharBuffer::One).await.unwrap();
        let found = sensor.search().await.unwrap();
        assert_eq!(found.slot, 5);
    }

    #[tokio::test]
    async fn test_search_unknown_finger() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.enroll(5, 42);
        handle.place_finger(7);

        capture_into(&mut sensor, CharBuffer::One).await.unwrap();
        assert_eq!(sensor.search().await, Err(SensorCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_enroll_same_finger_twice() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.place_finger(9);
        capture_into(&mut sensor, CharBuffer::One).await.unwrap();
        capture_into(&mut sensor, CharBuffer::Two).await.unwrap();

        sensor.create_model().await.unwrap();
        sensor.store_model(12).await.unwrap();

        assert_eq!(handle.template_at(12), Some(9));
        assert_eq!(sensor.load_model(12).await, Ok(()));
    }

    #[tokio::test]
    async fn test_create_model_rejects_different_fingers() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.place_finger(1);
        capture_into(&mut sensor, CharBuffer::One).await.unwrap();
        handle.place_finger(2);
        capture_into(&mut sensor, CharBuffer::Two).await.unwrap();

        assert_eq!(sensor.create_model().await, Err(SensorCode::ENROLL_MISMATCH));
    }

    #[tokio::test]
    async fn test_store_out_of_range() {
        let (mut sensor, handle) = MockFingerprintSensor::with_capacity(10);
        handle.place_finger(1);
        capture_into(&mut sensor, CharBuffer::One).await.unwrap();
        capture_into(&mut sensor, CharBuffer::Two).await.unwrap();
        sensor.create_model().await.unwrap();

        assert_eq!(sensor.store_model(11).await, Err(SensorCode::BAD_LOCATION));
        assert_eq!(sensor.store_model(0).await, Err(SensorCode::BAD_LOCATION));
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.place_finger(1);
        handle.fail_next(SensorOp::CaptureImage, SensorCode::IMAGE_FAIL);

        assert_eq!(sensor.capture_image().await, Err(SensorCode::IMAGE_FAIL));
        assert_eq!(sensor.capture_image().await, Ok(()));
        assert_eq!(handle.count(SensorOp::CaptureImage), 2);
    }

    #[tokio::test]
    async fn test_fault_matches_any_slot() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.fail_next(SensorOp::DeleteModel(0), SensorCode::DELETE_FAIL);

        assert_eq!(sensor.delete_model(3).await, Err(SensorCode::DELETE_FAIL));
        assert_eq!(sensor.delete_model(3).await, Ok(()));
    }

    #[tokio::test]
    async fn test_delete_and_empty() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        handle.enroll(1, 10);
        handle.enroll(2, 20);
        handle.enroll(3, 30);

        sensor.delete_model(2).await.unwrap();
        assert_eq!(handle.enrolled_slots(), vec![1, 3]);

        sensor.empty_database().await.unwrap();
        assert!(handle.enrolled_slots().is_empty());
    }

    #[tokio::test]
    async fn test_password_rejection() {
        let (mut sensor, handle) = MockFingerprintSensor::new();
        assert_eq!(sensor.verify_password().await, Ok(()));

        handle.reject_password();
        assert_eq!(
            sensor.verify_password().await,
            Err(SensorCode::PASSWORD_FAIL)
        );
    }
}
