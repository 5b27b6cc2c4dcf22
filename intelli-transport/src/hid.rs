//! HID collaborator: enumerates attached HID interfaces and opens a handle
//! for raw input/output report I/O.
//!
//! Unlike the teacher's keyboard transports, these controllers speak one
//! flat 64-byte input/output report with no feature-report side channel and
//! no vendor usage-page filter known ahead of time — enumeration returns
//! every attached HID interface and the caller (the device manager) decides
//! which ones are IntelliDose/IntelliClimate controllers by product name.

use std::time::Duration;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::types::HidDeviceInfo;

/// An open HID interface: raw input/output report I/O.
pub trait HidHandle: Send + Sync {
    /// Writes one output report. Returns the number of bytes written.
    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Reads one input report into `buf`, blocking up to `timeout`.
    /// Returns the number of bytes read, 0 on timeout.
    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Releases the underlying OS handle. Subsequent reads/writes fail.
    fn close(&self) -> Result<(), TransportError>;
}

/// Enumerates and opens HID interfaces.
pub trait HidCollaborator: Send + Sync {
    /// Lists every currently attached HID interface.
    fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, TransportError>;

    /// Opens the interface described by `info`.
    fn open(&self, info: &HidDeviceInfo) -> Result<Box<dyn HidHandle>, TransportError>;
}

/// `HidCollaborator` backed by the `hidapi` crate.
pub struct HidApiCollaborator;

impl HidApiCollaborator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HidApiCollaborator {
    fn default() -> Self {
        Self::new()
    }
}

impl HidCollaborator for HidApiCollaborator {
    fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, TransportError> {
        let api = hidapi::HidApi::new().map_err(TransportError::from)?;
        let devices = api
            .device_list()
            .map(|d| HidDeviceInfo {
                path: d.path().to_string_lossy().to_string(),
                vendor_id: d.vendor_id(),
                product_id: d.product_id(),
                product: d.product_string().map(|s| s.to_string()),
                serial_number: d.serial_number().map(|s| s.to_string()),
                // The controllers report 64-byte input/output reports; hidapi
                // doesn't surface report lengths from the descriptor on every
                // platform, so this is the fixed wire size, not a probed one.
                input_report_length: 64,
                output_report_length: 64,
            })
            .collect();
        Ok(devices)
    }

    fn open(&self, info: &HidDeviceInfo) -> Result<Box<dyn HidHandle>, TransportError> {
        let api = hidapi::HidApi::new().map_err(TransportError::from)?;
        let path = std::ffi::CString::new(info.path.clone())
            .map_err(|e| TransportError::Internal(e.to_string()))?;
        let device = api.open_path(&path).map_err(TransportError::from)?;
        Ok(Box::new(HidApiHandle { device: Mutex::new(device) }))
    }
}

struct HidApiHandle {
    device: Mutex<hidapi::HidDevice>,
}

impl HidHandle for HidApiHandle {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let device = self.device.lock();
        device.write(data).map_err(TransportError::from)
    }

    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let device = self.device.lock();
        let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
        device.read_timeout(buf, millis).map_err(TransportError::from)
    }

    fn close(&self) -> Result<(), TransportError> {
        // hidapi has no explicit close; dropping the device releases the
        // handle. Kept as an explicit method so callers don't need to know
        // that, and so a future transport backend that does need an explicit
        // close has somewhere to put it.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hid_device_info_product_name_defaults_to_empty_string() {
        let info = HidDeviceInfo {
            path: "/dev/hidraw0".to_string(),
            vendor_id: 0x1234,
            product_id: 0x5678,
            product: None,
            serial_number: None,
            input_report_length: 64,
            output_report_length: 64,
        };
        assert_eq!(info.product_name(), "");
    }
}
