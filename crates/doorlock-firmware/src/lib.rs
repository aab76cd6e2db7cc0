//! Door lock firmware.
//!
//! Four units run concurrently and talk only through bounded queues:
//!
//! - [`sensing`]: fingerprint sensor, card reader and keypad; drives the
//!   [`enrollment`] state machine.
//! - [`arbitration`]: relay, buzzer and status light; enforces auto-relock.
//! - [`feedback`]: the character display.
//! - [`bridge`]: the JSON line protocol to the host.
//!
//! [`FirmwareBuilder`] assembles them from a [`FirmwareConfig`] and a set of
//! drivers, and [`Firmware::spawn`] starts them on the tokio runtime.

pub mod arbitration;
pub mod bridge;
pub mod channels;
pub mod config;
pub mod enrollment;
pub mod feedback;
pub mod firmware;
pub mod sensing;

pub use channels::{DiagnosticCounter, DiagnosticHook, QueueName, TracingDiagnostics};
pub use config::FirmwareConfig;
pub use firmware::{
    Firmware, FirmwareBuilder, FirmwareHandle, Priority, ShutdownReport, TaskTermination, Unit,
};

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
