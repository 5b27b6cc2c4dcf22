//! Command-line flags for the gateway process.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "intellid")]
#[command(author, version, about = "USB-HID gateway for IntelliDose/IntelliClimate controllers")]
pub struct Cli {
    /// Address of the NATS core server to publish shadows to.
    #[arg(long, default_value = "localhost:4222")]
    pub nats: String,

    /// Listen address for the HTTP inspection surface.
    #[arg(short = 'p', long = "listen", default_value = ":9191")]
    pub listen: String,

    /// Enables debug-level logging.
    #[arg(long)]
    pub debug: bool,

    /// Polling interval, in seconds, between interrogation sweeps.
    #[arg(long, default_value_t = 15)]
    pub delay: u64,
}

/// Normalizes a Go-style `:PORT` listen address (no host) to one
/// `std::net::SocketAddr` accepts, binding on all interfaces.
pub fn normalize_listen_addr(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_listen_addr_expands_bare_port() {
        assert_eq!(normalize_listen_addr(":9191"), "0.0.0.0:9191");
    }

    #[test]
    fn normalize_listen_addr_leaves_explicit_host_alone() {
        assert_eq!(normalize_listen_addr("127.0.0.1:9191"), "127.0.0.1:9191");
    }
}
