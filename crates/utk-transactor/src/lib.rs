// SPDX-License-Identifier: MIT OR Apache-2.0
//! Api transactor endpoints.
//!
//! A transactor mediates one client/server peer link: it connects the peers
//! through the event bus, gates calls so at most one is in flight, forwards
//! them to the peer's caller endpoint, and propagates peer death. The
//! capability-object path in [`transactor`] is the preferred backend; the
//! [`fallback`] pair drives the shared-memory transceiver when capability
//! IPC is unavailable. The out-of-band [`broadcast`] channel delivers
//! commands to other daemons without a full link.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod broadcast;
pub mod caller;
pub mod fallback;
pub mod transactor;

use serde::{Deserialize, Serialize};

pub use broadcast::{BroadcastCommandHandler, send_broadcast_command, set_broadcast_command_handler};
pub use caller::{ApiCallHandler, ApiCaller, ApiCallerProxy, ApiCallerStub};
pub use fallback::{TransactionClient, TransactionServer};
pub use transactor::ApiTransactor;

/// Time a connecting endpoint waits for its peer.
pub const WAIT_CONN_TIMEOUT_MS: u64 = 5000;
/// Republish attempts during server-side discovery.
pub const PUBLISH_MAX_RETRIES: u32 = 10;

/// A fresh session token, usable as the discovery-topic suffix or as the
/// shared-memory backing file name.
#[must_use]
pub fn generate_token() -> String {
    format!("uitest_{}", uuid::Uuid::new_v4().simple())
}

/// Connection state of a peer link. Transitions are monotonic:
/// `Uninit → Connected → Disconnected`, with `Uninit → Disconnected` on a
/// failed setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStat {
    /// Setup has not run.
    #[default]
    Uninit,
    /// Both endpoints hold each other's caller.
    Connected,
    /// The link is dead; terminal.
    Disconnected,
}

/// Tunables of a transactor endpoint. The defaults are the protocol
/// constants; tests shrink them to keep scenarios fast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactorConfig {
    /// Silence window after which the peer is declared dead.
    pub watch_dog_timeout_ms: u64,
    /// Discovery timeout for both roles.
    pub wait_conn_timeout_ms: u64,
    /// Server-side republish attempts within the discovery window.
    pub publish_max_retries: u32,
    /// Client-side backlog size that triggers one batched cleaner call.
    pub gc_batch_threshold: usize,
}

impl Default for TransactorConfig {
    fn default() -> Self {
        Self {
            watch_dog_timeout_ms: utk_transport::WATCH_DOG_TIMEOUT_MS,
            wait_conn_timeout_ms: WAIT_CONN_TIMEOUT_MS,
            publish_max_retries: PUBLISH_MAX_RETRIES,
            gc_batch_threshold: 100,
        }
    }
}
