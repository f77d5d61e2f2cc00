// SPDX-License-Identifier: MIT OR Apache-2.0
//! Message transceivers.
//!
//! A transceiver moves one serialized [`TransactionMessage`] across the
//! process boundary and funnels incoming ones into a poll queue. The
//! shared-memory backend in [`shm`] is the fallback path used when the
//! platform's capability IPC is unavailable; the queue/liveness machinery in
//! [`transceiver`] is backend-independent.

#![warn(missing_docs)]

pub mod shm;
pub mod transceiver;

use utk_proto::TransactionMessage;

pub use shm::ShmTransceiver;
pub use transceiver::{Emitter, MessageFilter, MessageTransceiver, TransceiverCore};

/// Silence window after which the peer is declared dead.
pub const WATCH_DOG_TIMEOUT_MS: u64 = 2000;

/// Outcome of polling the incoming queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled {
    /// A call or reply message was dequeued.
    Success(TransactionMessage),
    /// The wait timed out with nothing to deliver.
    AbortWaitTimeout,
    /// The liveness watchdog or the transport declared the peer dead.
    AbortConnectionDied,
    /// The peer requested an orderly exit.
    AbortRequestExit,
}

/// Transport failures during backend setup or teardown.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Filesystem or mapping failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The shared backing file never appeared on the server side.
    #[error("shared file not available: {0}")]
    SharedFileUnavailable(String),
    /// The transceiver was used before `initialize` succeeded.
    #[error("transceiver not initialized")]
    NotInitialized,
}
