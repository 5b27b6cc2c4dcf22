//! Bit/byte codec, 64-byte frame codec, and shadow data model for the
//! IntelliDose and IntelliClimate HID controllers.
//!
//! This crate is pure and synchronous: nothing here touches a transport.
//! Given raw frame bytes it produces a shadow; given a shadow and the last
//! seen frames it produces new frame bytes. Both directions must agree on
//! every bit position and scale factor or a device's configuration gets
//! silently corrupted on write-back.

pub mod bits;
pub mod frame;
pub mod shadow;

pub use bits::{bit_get, bit_set, compose_byte, crc16_ccitt, i16_be_decode, u16_le_decode, u16_le_encode};
pub use frame::{decode_idose, decode_iclimate, encode_idose, encode_iclimate, DeviceKind, FrameError};
pub use shadow::{IClimateShadow, IDoseShadow, Shadow};
