//! Gateway-level error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] intelli_transport::TransportError),

    #[error(transparent)]
    Frame(#[from] intelli_protocol::FrameError),

    #[error("device {0} is not open")]
    NotOpen(String),

    #[error("message bus publish failed: {0}")]
    PublishFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
