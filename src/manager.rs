//! Holds every known controller session, re-enumerates on an interval, and
//! polls each open session on a second interval.

use std::sync::Arc;
use std::time::Duration;

use intelli_transport::HidCollaborator;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::device::{kind_for_product_name, Device, DeviceSnapshot};

const ENUMERATE_RETRY_DELAY: Duration = Duration::from_secs(5);

type UpdateFn = dyn Fn(DeviceSnapshot) + Send + Sync;

pub struct Manager {
    devices: RwLock<Vec<Arc<Device>>>,
    enumerate_interval: Duration,
    update_interval: Duration,
    hid: Arc<dyn HidCollaborator>,
    device_updated_fn: RwLock<Option<Arc<UpdateFn>>>,
}

impl Manager {
    pub fn new(hid: Arc<dyn HidCollaborator>, enumerate_interval: Duration, update_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            devices: RwLock::new(Vec::new()),
            enumerate_interval,
            update_interval,
            hid,
            device_updated_fn: RwLock::new(None),
        })
    }

    /// Registers the callback fired whenever any device's shadow updates.
    ///
    /// Only affects devices added *after* this call — each `Device` is given
    /// a reference to the manager's callback at creation time in
    /// `add_devices`, not re-subscribed on every change. Matches the
    /// original's lifecycle: calling this after devices already exist does
    /// not retroactively attach to them.
    pub fn on_device_updated(&self, f: Arc<UpdateFn>) {
        *self.device_updated_fn.write() = Some(f);
    }

    pub fn find_device(&self, serial: &str) -> Option<Arc<Device>> {
        self.devices.read().iter().find(|d| d.serial == serial).cloned()
    }

    pub fn has_device(&self, serial: &str) -> bool {
        self.devices.read().iter().any(|d| d.serial == serial)
    }

    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.read().clone()
    }

    /// Runs forever: enumerate, add newly seen devices, purge devices no
    /// longer enumerated, sleep.
    pub async fn discover(self: Arc<Self>) {
        loop {
            let infos = match self.hid.enumerate() {
                Ok(infos) => infos,
                Err(e) => {
                    error!(error = %e, "enumeration failed, retrying");
                    tokio::time::sleep(ENUMERATE_RETRY_DELAY).await;
                    continue;
                }
            };

            self.add_devices(&infos);
            if infos.is_empty() {
                warn!("no HID devices enumerated");
            }
            self.purge_devices(&infos);

            tokio::time::sleep(self.enumerate_interval).await;
        }
    }

    fn add_devices(&self, infos: &[intelli_transport::HidDeviceInfo]) {
        let mut devices = self.devices.write();
        for info in infos {
            let Some(kind) = kind_for_product_name(info.product_name()) else { continue };
            let Some(serial) = info.serial_number.as_deref() else { continue };
            if devices.iter().any(|d| d.serial == serial) {
                continue;
            }

            let device = Device::new(info.clone(), kind);
            if let Some(f) = self.device_updated_fn.read().clone() {
                device.on_update(f);
            }
            info!(serial = %device.serial, kind = ?kind, "discovered new device");
            devices.push(device);
        }
    }

    /// Removes any registered device whose serial is absent from the latest
    /// enumeration pass.
    ///
    /// The original gateway's `purgeDevices` early-returns whenever the
    /// device list is non-empty, so it never actually purges after the first
    /// device is seen — almost certainly a bug (see DESIGN.md). This
    /// implements the intended behavior instead.
    fn purge_devices(&self, infos: &[intelli_transport::HidDeviceInfo]) {
        let mut devices = self.devices.write();
        let before = devices.len();
        devices.retain(|d| {
            let still_present = infos.iter().any(|i| i.serial_number.as_deref() == Some(d.serial.as_str()));
            if !still_present {
                d.close();
                debug!(serial = %d.serial, "purged device no longer enumerated");
            }
            still_present
        });
        if devices.len() != before {
            info!(purged = before - devices.len(), remaining = devices.len(), "purge pass complete");
        }
    }

    /// Runs forever: open every not-yet-open device, then fire an
    /// `update_shadow` sweep per device on its own task. Never awaited —
    /// matches the original's fire-and-forget polling loop.
    pub async fn interrogate(self: Arc<Self>) {
        loop {
            let devices = self.devices.read().clone();
            for device in devices {
                if !device.is_open() {
                    if let Err(e) = device.open(self.hid.as_ref()) {
                        warn!(serial = %device.serial, error = %e, "failed to open device");
                        continue;
                    }
                }
                let device = device.clone();
                tokio::task::spawn_blocking(move || {
                    if let Err(e) = device.update_shadow() {
                        warn!(serial = %device.serial, error = %e, "update_shadow failed");
                    }
                });
            }
            tokio::time::sleep(self.update_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intelli_protocol::DeviceKind;
    use intelli_transport::{HidDeviceInfo, TransportError};

    struct FakeHid {
        infos: parking_lot::Mutex<Vec<HidDeviceInfo>>,
    }

    impl HidCollaborator for FakeHid {
        fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, TransportError> {
            Ok(self.infos.lock().clone())
        }

        fn open(&self, _info: &HidDeviceInfo) -> Result<Box<dyn intelli_transport::HidHandle>, TransportError> {
            Err(TransportError::DeviceNotFound("fake".into()))
        }
    }

    fn info(serial: &str, product: &str) -> HidDeviceInfo {
        HidDeviceInfo {
            path: format!("/dev/hidraw-{serial}"),
            vendor_id: 0x1234,
            product_id: 0x0001,
            product: Some(product.to_string()),
            serial_number: Some(serial.to_string()),
            input_report_length: 64,
            output_report_length: 64,
        }
    }

    #[test]
    fn add_devices_skips_unrecognized_product_names() {
        let hid: Arc<dyn HidCollaborator> = Arc::new(FakeHid { infos: parking_lot::Mutex::new(vec![]) });
        let mgr = Manager::new(hid, Duration::from_secs(10), Duration::from_secs(15));
        mgr.add_devices(&[info("SN1", "SomeOtherDevice")]);
        assert_eq!(mgr.device_count(), 0);
    }

    #[test]
    fn add_devices_registers_recognized_controllers_once() {
        let hid: Arc<dyn HidCollaborator> = Arc::new(FakeHid { infos: parking_lot::Mutex::new(vec![]) });
        let mgr = Manager::new(hid, Duration::from_secs(10), Duration::from_secs(15));
        let infos = vec![info("SN1", "IntelliDose"), info("SN2", "ASL IntelliClimate")];
        mgr.add_devices(&infos);
        mgr.add_devices(&infos); // second pass must not duplicate
        assert_eq!(mgr.device_count(), 2);
        assert_eq!(mgr.find_device("SN1").unwrap().kind, DeviceKind::IntelliDose);
        assert_eq!(mgr.find_device("SN2").unwrap().kind, DeviceKind::IntelliClimate);
    }

    #[test]
    fn purge_devices_removes_devices_no_longer_enumerated() {
        let hid: Arc<dyn HidCollaborator> = Arc::new(FakeHid { infos: parking_lot::Mutex::new(vec![]) });
        let mgr = Manager::new(hid, Duration::from_secs(10), Duration::from_secs(15));
        let seen = vec![info("SN1", "IntelliDose"), info("SN2", "IntelliClimate")];
        mgr.add_devices(&seen);
        assert_eq!(mgr.device_count(), 2);

        // SN2 drops out of the next enumeration pass.
        mgr.purge_devices(&[info("SN1", "IntelliDose")]);
        assert!(mgr.has_device("SN1"));
        assert!(!mgr.has_device("SN2"));
    }

    #[test]
    fn purge_devices_keeps_everything_when_all_still_enumerated() {
        let hid: Arc<dyn HidCollaborator> = Arc::new(FakeHid { infos: parking_lot::Mutex::new(vec![]) });
        let mgr = Manager::new(hid, Duration::from_secs(10), Duration::from_secs(15));
        let seen = vec![info("SN1", "IntelliDose")];
        mgr.add_devices(&seen);
        mgr.purge_devices(&seen);
        assert!(mgr.has_device("SN1"));
    }
}
