//! Shared vocabulary for the door lock firmware.
//!
//! Every message that crosses a unit boundary is defined here: the
//! [`IdentificationEvent`] produced by the sensing unit, the
//! [`ControlCommand`] consumed by the arbitration and feedback units, and the
//! bounded text payload both of them carry. All of these are `Copy` values;
//! nothing in this crate is shared by reference between units.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
