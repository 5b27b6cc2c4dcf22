//! Hot-plug notifications via udev, gated behind the `hotplug` feature.
//!
//! Not wired up yet: the manager's `discover()` loop already re-enumerates on
//! a fixed interval, so this is an optimization (faster reaction to a newly
//! attached controller) rather than a correctness requirement. Mirrors the
//! teacher's own unfinished `DeviceDiscovery::watch()`.

use tokio::sync::broadcast;
use tracing::warn;

/// A hot-plug event. Currently a placeholder: callers should re-enumerate on
/// receipt rather than trust the payload.
#[derive(Debug, Clone, Copy)]
pub enum HotplugEvent {
    Added,
    Removed,
}

/// Subscribes to udev hot-plug events for HID devices.
///
/// TODO: drive this from a `tokio_udev::AsyncMonitorSocket` filtered to the
/// `hidraw` subsystem instead of returning a receiver nothing ever sends on.
pub fn watch() -> broadcast::Receiver<HotplugEvent> {
    warn!("hotplug monitoring not implemented, falling back to periodic enumeration");
    let (_tx, rx) = broadcast::channel(16);
    rx
}
