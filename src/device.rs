//! A single controller session: open handle, last-seen frames, decoded
//! shadow, and the update callback.
//!
//! Three independent lock regions, matching the original device's three
//! mutexes: `handle` serializes actual HID I/O (one request outstanding at a
//! time), `frames` arbitrates the last-seen D-frame buffers that both
//! decoding and re-encoding read, and `updating` prevents two concurrent
//! `update_shadow` sweeps for the same device from interleaving partial
//! reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use intelli_protocol::frame::build_read_request;
use intelli_protocol::{decode_iclimate, decode_idose, encode_iclimate, encode_idose, DeviceKind, Shadow};
use intelli_transport::{HidCollaborator, HidDeviceInfo, HidHandle};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::GatewayError;

const IO_SETTLE: Duration = Duration::from_millis(100);
const READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// A value snapshot handed to the update callback. Deliberately a copy, not
/// a handle back into the live `Device` — the callback runs on its own
/// spawned task and must not need to re-lock the device it was notified
/// about.
#[derive(Debug, Clone)]
pub struct DeviceSnapshot {
    pub serial: String,
    pub name: String,
    pub shadow: Shadow,
    pub connected: bool,
}

type UpdateFn = dyn Fn(DeviceSnapshot) + Send + Sync;

/// Frames last read from (or about to be written to) the controller.
/// Indexed by D/S-frame number: `frames[0]` is D0/S0, etc.
struct Frames {
    buf: Vec<[u8; 64]>,
}

impl Frames {
    fn new(count: usize) -> Self {
        Self { buf: vec![[0u8; 64]; count] }
    }
}

pub struct Device {
    pub serial: String,
    pub name: String,
    pub kind: DeviceKind,
    info: Mutex<HidDeviceInfo>,
    handle: Mutex<Option<Box<dyn HidHandle>>>,
    frames: Mutex<Frames>,
    shadow: Mutex<Option<Shadow>>,
    updating: Mutex<()>,
    is_open: AtomicBool,
    on_update: Mutex<Option<Arc<UpdateFn>>>,
}

impl Device {
    pub fn new(info: HidDeviceInfo, kind: DeviceKind) -> Arc<Self> {
        let serial = info.serial_number.clone().unwrap_or_default();
        let name = info.product_name().to_string();
        Arc::new(Self {
            serial,
            name,
            kind,
            info: Mutex::new(info),
            handle: Mutex::new(None),
            frames: Mutex::new(Frames::new(kind.read_frame_count())),
            shadow: Mutex::new(None),
            updating: Mutex::new(()),
            is_open: AtomicBool::new(false),
            on_update: Mutex::new(None),
        })
    }

    /// Installs the update callback. Mirrors the original's lifecycle quirk:
    /// this is called once at device-creation time by the manager, not
    /// re-applied to already-registered devices if the manager's callback
    /// changes later.
    pub fn on_update(&self, f: Arc<UpdateFn>) {
        *self.on_update.lock() = Some(f);
    }

    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    /// Refreshes the enumeration descriptor (path may change across
    /// re-enumeration even though the serial doesn't) without touching the
    /// open handle.
    pub fn refresh_info(&self, info: HidDeviceInfo) {
        *self.info.lock() = info;
    }

    pub fn open(&self, hid: &dyn HidCollaborator) -> Result<(), GatewayError> {
        let info = self.info.lock().clone();
        let handle = hid.open(&info)?;
        *self.handle.lock() = Some(handle);
        self.is_open.store(true, Ordering::Release);
        debug!(serial = %self.serial, "device opened");
        Ok(())
    }

    pub fn close(&self) {
        if let Some(handle) = self.handle.lock().take() {
            if let Err(e) = handle.close() {
                warn!(serial = %self.serial, error = %e, "error closing device handle");
            }
        }
        self.is_open.store(false, Ordering::Release);
    }

    pub fn shadow(&self) -> Option<Shadow> {
        self.shadow.lock().clone()
    }

    /// Writes one request frame and reads back one response frame, holding
    /// the handle lock for the whole exchange so interleaved callers can't
    /// split a request from its response.
    fn send_request(&self, request: &[u8; 64]) -> Result<[u8; 64], GatewayError> {
        let guard = self.handle.lock();
        let handle = guard.as_ref().ok_or_else(|| GatewayError::NotOpen(self.serial.clone()))?;
        handle.write(request)?;
        // The controller firmware needs a short settle before its response
        // is ready; the original device driver sleeps here too.
        std::thread::sleep(IO_SETTLE);
        let mut buf = [0u8; 64];
        let n = handle.read_timeout(&mut buf, READ_TIMEOUT)?;
        if n < 64 {
            return Err(GatewayError::Transport(intelli_transport::TransportError::ShortRead {
                expected: 64,
                actual: n,
            }));
        }
        Ok(buf)
    }

    /// Reads every D-frame, decodes a fresh shadow, stores it, and fires the
    /// update callback on its own task.
    ///
    /// Any error out of the read sweep or the decode — a transport failure or
    /// a non-64-byte frame — marks the device closed so the next
    /// `interrogate()` pass re-opens it instead of retrying the same stale
    /// handle forever.
    pub fn update_shadow(self: &Arc<Self>) -> Result<(), GatewayError> {
        let _guard = self.updating.lock();

        match self.read_and_publish() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.is_open.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn read_and_publish(self: &Arc<Self>) -> Result<(), GatewayError> {
        let count = self.kind.read_frame_count();
        let mut frames = Vec::with_capacity(count);
        for i in 0..count {
            let request = build_read_request(b'0' + i as u8);
            frames.push(self.send_request(&request)?);
        }
        *self.frames.lock() = Frames { buf: frames.clone() };

        let ts = now_unix();
        let shadow = match self.kind {
            DeviceKind::IntelliDose => {
                Shadow::IDose(decode_idose(&frames[0], &frames[1], &frames[2], &self.serial, ts)?)
            }
            DeviceKind::IntelliClimate => Shadow::IClimate(decode_iclimate(
                &frames[0],
                &frames[1],
                &frames[2],
                &frames[3],
                &self.serial,
                ts,
            )?),
        };

        *self.shadow.lock() = Some(shadow.clone());
        self.fire_update(shadow);
        Ok(())
    }

    /// Re-encodes `shadow` onto the last-seen frames and writes the result
    /// back to the controller.
    pub fn write_shadow(&self, shadow: &Shadow) -> Result<(), GatewayError> {
        let frames = self.frames.lock().buf.clone();
        match (self.kind, shadow) {
            (DeviceKind::IntelliDose, Shadow::IDose(s)) => {
                let (s0, s1) = encode_idose(s, &frames[0], &frames[1], &frames[2])?;
                self.send_request(&s0)?;
                self.send_request(&s1)?;
            }
            (DeviceKind::IntelliClimate, Shadow::IClimate(s)) => {
                let (s0, s1, s2) = encode_iclimate(s, &frames[0], &frames[1], &frames[2], &frames[3])?;
                self.send_request(&s0)?;
                self.send_request(&s1)?;
                self.send_request(&s2)?;
            }
            _ => warn!(serial = %self.serial, "shadow kind does not match device kind, ignoring write"),
        }
        Ok(())
    }

    /// Fire-and-forget callback dispatch, matching the original's unbounded
    /// per-update goroutine. Known re-architecture candidate: under a fast
    /// poll interval and a slow subscriber this spawns tasks faster than
    /// they drain. See DESIGN.md.
    fn fire_update(self: &Arc<Self>, shadow: Shadow) {
        let Some(f) = self.on_update.lock().clone() else { return };
        let snapshot = DeviceSnapshot {
            serial: self.serial.clone(),
            name: self.name.clone(),
            shadow,
            connected: self.is_open(),
        };
        tokio::task::spawn(async move {
            f(snapshot);
        });
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub const IDOSE_NAMES: [&str; 2] = ["IntelliDose", "ASL IntelliDose"];
pub const ICLIMATE_NAMES: [&str; 2] = ["IntelliClimate", "ASL IntelliClimate"];

/// Resolves a product name to a device kind, or `None` if it isn't one of
/// the four recognized controller names.
pub fn kind_for_product_name(name: &str) -> Option<DeviceKind> {
    if IDOSE_NAMES.contains(&name) {
        Some(DeviceKind::IntelliDose)
    } else if ICLIMATE_NAMES.contains(&name) {
        Some(DeviceKind::IntelliClimate)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_for_product_name_matches_all_four_recognized_strings() {
        assert_eq!(kind_for_product_name("IntelliDose"), Some(DeviceKind::IntelliDose));
        assert_eq!(kind_for_product_name("ASL IntelliDose"), Some(DeviceKind::IntelliDose));
        assert_eq!(kind_for_product_name("IntelliClimate"), Some(DeviceKind::IntelliClimate));
        assert_eq!(kind_for_product_name("ASL IntelliClimate"), Some(DeviceKind::IntelliClimate));
    }

    #[test]
    fn kind_for_product_name_rejects_unknown_strings() {
        assert_eq!(kind_for_product_name("SomeOtherKeyboard"), None);
        assert_eq!(kind_for_product_name(""), None);
    }
}
