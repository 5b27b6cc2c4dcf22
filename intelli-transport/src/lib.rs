//! HID collaborator for the IntelliDose/IntelliClimate gateway.
//!
//! Enumeration, the open handle abstraction and transport-level errors live
//! here. Nothing in this crate knows about IntelliDose/IntelliClimate framing
//! — that lives in `intelli-protocol`.

pub mod error;
pub mod hid;
pub mod types;

#[cfg(feature = "hotplug")]
pub mod hotplug;

pub use error::TransportError;
pub use hid::{HidApiCollaborator, HidCollaborator, HidHandle};
pub use types::HidDeviceInfo;
