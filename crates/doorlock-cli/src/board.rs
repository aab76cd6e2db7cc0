//! Simulated board for running the firmware on a desktop.
//!
//! Every peripheral is a mock. The handles are kept so templates can be
//! seeded before the firmware starts.

use doorlock_core::SlotId;
use doorlock_firmware::FirmwareConfig;
use doorlock_hardware::mock::{
    MockCardReader, MockCardReaderHandle, MockDisplay, MockDisplayHandle, MockFingerprintHandle,
    MockFingerprintSensor, MockKeypad, MockKeypadHandle, MockPin, MockPinHandle,
};

/// Devices handed to the firmware.
pub struct Devices {
    pub keypad: MockKeypad,
    pub display: MockDisplay,
    pub sensor: MockFingerprintSensor,
    pub reader: MockCardReader,
    pub relay: MockPin,
    pub buzzer: MockPin,
    pub light: MockPin,
}

/// Handles kept by the runner.
#[allow(dead_code)]
pub struct Handles {
    pub keys: MockKeypadHandle,
    pub lcd: MockDisplayHandle,
    pub sensor: MockFingerprintHandle,
    pub cards: MockCardReaderHandle,
    pub relay: MockPinHandle,
    pub buzzer: MockPinHandle,
    pub light: MockPinHandle,
}

pub fn simulated(config: &FirmwareConfig) -> (Devices, Handles) {
    let (keypad, keys) = MockKeypad::new();
    let (display, lcd) = MockDisplay::new(config.display.columns, 2);
    let (sensor, sensor_handle) = MockFingerprintSensor::with_capacity(config.sensor.capacity);
    let (reader, cards) = MockCardReader::new();
    let (relay, relay_handle) = MockPin::new();
    let (buzzer, buzzer_handle) = MockPin::new();
    let (light, light_handle) = MockPin::new();

    (
        Devices {
            keypad,
            display,
            sensor,
            reader,
            relay,
            buzzer,
            light,
        },
        Handles {
            keys,
            lcd,
            sensor: sensor_handle,
            cards,
            relay: relay_handle,
            buzzer: buzzer_handle,
            light: light_handle,
        },
    )
}

impl Handles {
    /// Store a template for a simulated finger numbered after its slot.
    pub fn seed_template(&self, slot: SlotId) {
        self.sensor.enroll(slot, u32::from(slot));
    }
}
