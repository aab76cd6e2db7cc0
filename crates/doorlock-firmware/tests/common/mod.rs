//! Shared test bench for end-to-end firmware tests.
//!
//! [`Board`] assembles the complete firmware from mock peripherals and a
//! pair of in-memory pipes standing in for the serial link, then keeps every
//! mock's handle so tests can act as the operator and as the host.
//!
//! All benches are meant for `#[tokio::test(start_paused = true)]`: timing
//! assertions are made against the virtual clock.

#![allow(dead_code)]

use doorlock_firmware::{DiagnosticCounter, FirmwareBuilder, FirmwareConfig, FirmwareHandle};
use doorlock_hardware::mock::{
    MockCardReader, MockCardReaderHandle, MockDisplay, MockDisplayHandle, MockFingerprintHandle,
    MockFingerprintSensor, MockKeypad, MockKeypadHandle, MockPin, MockPinHandle,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, duplex};

/// Longest a test waits for a host line before failing.
pub const LINE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Board {
    pub keys: MockKeypadHandle,
    pub lcd: MockDisplayHandle,
    pub sensor: MockFingerprintHandle,
    pub cards: MockCardReaderHandle,
    pub relay: MockPinHandle,
    pub buzzer: MockPinHandle,
    pub light: MockPinHandle,
    pub counter: Arc<DiagnosticCounter>,
    pub firmware: FirmwareHandle,
    host_tx: DuplexStream,
    host_rx: Lines<BufReader<DuplexStream>>,
}

impl Board {
    /// Start a board with the default configuration and wait out the boot
    /// banner.
    pub async fn start() -> Self {
        Self::with_config(FirmwareConfig::default()).await
    }

    pub async fn with_config(config: FirmwareConfig) -> Self {
        let banner = config.display.banner();

        let (keypad, keys) = MockKeypad::new();
        let (display, lcd) = MockDisplay::new(config.display.columns, 2);
        let (sensor_device, sensor) = MockFingerprintSensor::new();
        let (reader, cards) = MockCardReader::new();
        let (relay_pin, relay) = MockPin::new();
        let (buzzer_pin, buzzer) = MockPin::new();
        let (light_pin, light) = MockPin::new();
        let counter = Arc::new(DiagnosticCounter::default());

        let (host_tx, device_rx) = duplex(4096);
        let (device_tx, host_rx) = duplex(4096);

        let firmware = FirmwareBuilder::new(config)
            .keypad(keypad)
            .display(display)
            .fingerprint_sensor(sensor_device)
            .card_reader(reader)
            .relay(relay_pin)
            .buzzer(buzzer_pin)
            .light(light_pin)
            .serial(device_rx, device_tx)
            .diagnostics(counter.clone())
            .build()
            .expect("board assembles")
            .spawn();

        tokio::time::sleep(banner + Duration::from_millis(100)).await;

        Self {
            keys,
            lcd,
            sensor,
            cards,
            relay,
            buzzer,
            light,
            counter,
            firmware,
            host_tx,
            host_rx: BufReader::new(host_rx).lines(),
        }
    }

    /// Write one line to the firmware as the host.
    pub async fn send(&mut self, line: &str) {
        self.host_tx.write_all(line.as_bytes()).await.unwrap();
        self.host_tx.write_all(b"\n").await.unwrap();
    }

    /// Next line written by the firmware, waiting up to [`LINE_TIMEOUT`].
    pub async fn next_line(&mut self) -> String {
        self.next_line_within(LINE_TIMEOUT)
            .await
            .expect("firmware wrote a line")
    }

    /// Next line written by the firmware within `wait`, if any.
    pub async fn next_line_within(&mut self, wait: Duration) -> Option<String> {
        match tokio::time::timeout(wait, self.host_rx.next_line()).await {
            Ok(line) => line.unwrap(),
            Err(_elapsed) => None,
        }
    }
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
