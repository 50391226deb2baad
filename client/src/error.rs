use scribblefusion_shared::CodecError;
use thiserror::Error;

use crate::connection::ConnectionState;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("channel could not be opened: {0}")]
    Open(String),
    #[error("channel send failed: {0}")]
    Send(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("history request returned status {0}")]
    Status(u16),
    #[error("history request failed: {0}")]
    Network(String),
    #[error("history response body unreadable: {0}")]
    Body(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to connect after {attempts} attempts")]
    TransportFailure { attempts: u32 },
    #[error("channel is {0:?}, not open")]
    NotOpen(ConnectionState),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed push message: {0}")]
    MalformedMessage(#[source] serde_json::Error),
    #[error(transparent)]
    MalformedCommand(#[from] CodecError),
    #[error(transparent)]
    FetchFailure(#[from] FetchError),
}
