//! Gateway process entry point: wires the HID collaborator, the device
//! manager, the message-bus publisher and the HTTP inspection surface
//! together and runs them until the process is signaled to stop.

mod bus;
mod cli;
mod device;
mod error;
mod http;
mod manager;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use bus::{NatsPublisher, Publisher};
use cli::Cli;
use device::DeviceSnapshot;
use intelli_transport::HidApiCollaborator;
use manager::Manager;

/// The enumeration loop's interval is a fixed constant, not a CLI flag — only
/// the poll interval (`--delay`) is operator-tunable.
const ENUMERATE_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "intelli_gateway=debug,intelli_protocol=debug,intelli_transport=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    info!(nats = %cli.nats, listen = %cli.listen, delay = cli.delay, "starting intelli-gateway");

    let publisher = Arc::new(NatsPublisher::new(cli.nats.clone()));
    if let Err(e) = publisher.connect_and_verify().await {
        error!(error = %e, addr = %cli.nats, "failed to connect to message bus, aborting");
        anyhow::bail!("fatal startup error: could not connect to NATS at {}: {e}", cli.nats);
    }
    let publisher: Arc<dyn Publisher> = publisher;

    let hid = Arc::new(HidApiCollaborator::new());
    let manager = Manager::new(hid, ENUMERATE_INTERVAL, Duration::from_secs(cli.delay));

    let publish_fn = {
        let publisher = publisher.clone();
        move |snapshot: DeviceSnapshot| {
            let publisher = publisher.clone();
            tokio::task::spawn(async move { publish_snapshot(publisher, snapshot).await });
        }
    };
    manager.on_device_updated(Arc::new(publish_fn));

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = running.clone();
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })
    .ok();

    let discover_task = tokio::task::spawn(manager.clone().discover());
    let interrogate_task = tokio::task::spawn(manager.clone().interrogate());

    let listen_addr = cli::normalize_listen_addr(&cli.listen);
    let http_manager = manager.clone();
    let http_task = tokio::task::spawn(async move {
        if let Err(e) = http::serve(&listen_addr, http_manager).await {
            error!(error = %e, "http inspection surface exited");
        }
    });

    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    info!("shutdown signal received");
    discover_task.abort();
    interrogate_task.abort();
    http_task.abort();

    Ok(())
}

/// Serializes a shadow snapshot as JSON and publishes it to
/// `intelli.<serial>`. Publish failures are logged and dropped, per the
/// gateway's local error policy — there is no retry.
async fn publish_snapshot(publisher: Arc<dyn Publisher>, snapshot: DeviceSnapshot) {
    let subject = format!("intelli.{}", snapshot.serial);
    let payload = match serde_json::to_vec(&snapshot.shadow) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(serial = %snapshot.serial, error = %e, "failed to marshal shadow, dropping update");
            return;
        }
    };
    if let Err(e) = publisher.publish(&subject, &payload).await {
        warn!(serial = %snapshot.serial, error = %e, "failed to publish shadow, dropping update");
    }
}
