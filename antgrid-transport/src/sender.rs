//! Outbound delivery to a single connection.
//!
//! This module provides:
//! - The `Frame` type handed to a connection's writer.
//! - The `Sender` trait the hub uses to reach a connection without knowing
//!   how frames are written.
//! - The `TransportError` type shared by the transport crate.

use std::io::Error as IoError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error types that can occur in the transport layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// An I/O error occurred (e.g., binding the listener).
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
    /// An outbound message could not be encoded.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// A WebSocket-specific error occurred (e.g., handshake failure).
    #[error("WebSocket error: {0}")]
    WebSocketError(String),
    /// An error related to the runtime or shared state (e.g., a poisoned lock).
    #[error("Runtime error: {0}")]
    RuntimeError(String),
    /// The connection's writer is gone.
    #[error("Connection channel closed")]
    ChannelClosed,
}

/// One unit of outbound traffic for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Encoded JSON message. Shared so a broadcast encodes once.
    Text(Arc<str>),
    /// Liveness probe; the client is expected to answer with a pong.
    Ping,
    /// Close the connection after everything queued before it.
    Close,
}

/// Non-blocking delivery of frames to one connection.
///
/// Implementations must return immediately; a slow or dead connection must
/// never hold up the caller, which is usually broadcasting under the hub lock.
pub trait Sender: Send + Sync {
    /// Queues `frame` for delivery.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the connection can no longer accept frames.
    fn send(&self, frame: Frame) -> Result<(), TransportError>;
}

/// Frames are queued on an unbounded channel drained by the connection's
/// write task.
impl Sender for mpsc::UnboundedSender<Frame> {
    fn send(&self, frame: Frame) -> Result<(), TransportError> {
        mpsc::UnboundedSender::send(self, frame).map_err(|_| TransportError::ChannelClosed)
    }
}
