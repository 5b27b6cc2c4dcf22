//! Descriptors exchanged between the HID collaborator and its callers.

use serde::Serialize;

/// Immutable descriptor for one attached HID interface.
///
/// Supplied fresh by every enumeration pass; a later pass may produce a new
/// descriptor carrying the same `serial_number` (the device never changes
/// identity across re-enumeration, only the path/handle can).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HidDeviceInfo {
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub input_report_length: usize,
    pub output_report_length: usize,
}

impl HidDeviceInfo {
    /// The product name this device reports, or `""` if it reported none.
    pub fn product_name(&self) -> &str {
        self.product.as_deref().unwrap_or("")
    }
}
