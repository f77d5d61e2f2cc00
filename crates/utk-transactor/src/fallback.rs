// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transaction endpoints for the fallback transceiver path.
//!
//! When capability IPC is unavailable, calls and replies travel as
//! serialized [`TransactionMessage`]s through a [`MessageTransceiver`]
//! (in practice the shared-memory backend). The client gates invocations
//! exactly like the capability path; the server drains its poll queue in a
//! run loop until exit or peer death.

use crate::caller::ApiCallHandler;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};
use utk_error::{ApiError, ErrCode};
use utk_proto::{
    ApiCallInfo, ApiReplyInfo, TransactionMessage, decode_call, decode_reply, encode_call,
    encode_reply,
};
use utk_transport::{
    MessageTransceiver, Polled, TransceiverCore, TransportError, WATCH_DOG_TIMEOUT_MS,
};

/// Poll slice while waiting for transaction messages.
const WAIT_TRANSACTION_MS: u64 = WATCH_DOG_TIMEOUT_MS / 100;

/// Exit code of [`TransactionServer::run_loop`] after an orderly exit.
pub const EXIT_CODE_SUCCESS: u32 = 0;
/// Exit code of [`TransactionServer::run_loop`] after peer death.
pub const EXIT_CODE_FAILURE: u32 = 1;

fn died_reply() -> ApiError {
    ApiError::with_message(ErrCode::Internal, "connection with uitest_daemon is dead")
}

/// Server endpoint: polls calls, dispatches them, emits replies.
pub struct TransactionServer {
    transceiver: Box<dyn MessageTransceiver>,
    call_handler: ApiCallHandler,
}

impl TransactionServer {
    /// A server over the given transceiver, dispatching to `call_handler`.
    pub fn new(transceiver: Box<dyn MessageTransceiver>, call_handler: ApiCallHandler) -> Self {
        Self {
            transceiver,
            call_handler,
        }
    }

    /// Bring up the transceiver and start liveness checking. The server
    /// answers incoming handshakes but does not probe on its own.
    pub async fn initialize(&mut self) -> Result<(), TransportError> {
        self.transceiver.initialize().await?;
        TransceiverCore::schedule_check_connection(self.transceiver.core(), false);
        Ok(())
    }

    /// Serve until the peer requests exit (`0`) or dies (`1`).
    pub async fn run_loop(&self) -> u32 {
        let core = self.transceiver.core();
        loop {
            match core.poll(Duration::from_millis(WAIT_TRANSACTION_MS)).await {
                Polled::Success(message) => {
                    let mut reply = ApiReplyInfo::default();
                    match decode_call(&message.payload) {
                        Ok(call) => (self.call_handler)(&call, &mut reply),
                        Err(err) => {
                            reply.exception =
                                ApiError::with_message(ErrCode::Internal, err.to_string());
                        }
                    }
                    match encode_reply(&reply) {
                        Ok(payload) => core.emit_reply(&message, payload),
                        Err(err) => warn!(error = %err, "failed to encode reply"),
                    }
                }
                Polled::AbortConnectionDied => return EXIT_CODE_FAILURE,
                Polled::AbortRequestExit => return EXIT_CODE_SUCCESS,
                Polled::AbortWaitTimeout => continue,
            }
        }
    }

    /// Tear down the transceiver.
    pub async fn finalize(&mut self) {
        self.transceiver.core().on_receive_message(TransactionMessage::exit());
        self.transceiver.finalize().await;
    }
}

/// Client endpoint: serializes one call at a time and awaits its reply.
pub struct TransactionClient {
    transceiver: Box<dyn MessageTransceiver>,
    processing_api: Mutex<String>,
    connection_died: Mutex<bool>,
}

impl TransactionClient {
    /// A client over the given transceiver.
    pub fn new(transceiver: Box<dyn MessageTransceiver>) -> Self {
        Self {
            transceiver,
            processing_api: Mutex::new(String::new()),
            connection_died: Mutex::new(false),
        }
    }

    /// Bring up the transceiver, probe until the server answers, then start
    /// liveness checking with auto-handshake keepalives.
    pub async fn initialize(&mut self, discovery_timeout: Duration) -> Result<(), TransportError> {
        self.transceiver.initialize().await?;
        info!("start checking client/server interaction");
        if !self.transceiver.core().discover_peer(discovery_timeout).await {
            warn!(?discovery_timeout, "wait for interaction timed out");
            return Err(TransportError::NotInitialized);
        }
        TransceiverCore::schedule_check_connection(self.transceiver.core(), true);
        info!("client/server interaction established");
        Ok(())
    }

    /// Invoke one api on the server and return its reply.
    ///
    /// Rejects concurrent invocations and short-circuits once the
    /// connection died.
    pub async fn invoke_api(&self, call: ApiCallInfo) -> ApiReplyInfo {
        let mut reply = ApiReplyInfo::default();
        {
            let died = self.connection_died.lock().expect("state lock");
            if *died {
                reply.exception = died_reply();
                return reply;
            }
            let mut processing = self.processing_api.lock().expect("state lock");
            if !processing.is_empty() {
                reply.exception = ApiError::with_message(
                    ErrCode::ApiUsage,
                    format!(
                        "uitest-api does not allow calling concurrently, \
                         current processing: {processing}, incoming: {}",
                        call.api_id
                    ),
                );
                return reply;
            }
            *processing = call.api_id.clone();
        }
        let core = self.transceiver.core();
        match encode_call(&call) {
            Ok(payload) => core.emit_call(payload),
            Err(err) => {
                self.processing_api.lock().expect("state lock").clear();
                reply.exception = ApiError::with_message(ErrCode::Internal, err.to_string());
                return reply;
            }
        }
        loop {
            match core.poll(Duration::from_millis(WAIT_TRANSACTION_MS)).await {
                Polled::Success(message) => {
                    self.processing_api.lock().expect("state lock").clear();
                    match decode_reply(&message.payload) {
                        Ok(decoded) => reply = decoded,
                        Err(err) => {
                            reply.exception =
                                ApiError::with_message(ErrCode::Internal, err.to_string());
                        }
                    }
                    return reply;
                }
                Polled::AbortConnectionDied | Polled::AbortRequestExit => {
                    *self.connection_died.lock().expect("state lock") = true;
                    self.processing_api.lock().expect("state lock").clear();
                    reply.exception = died_reply();
                    return reply;
                }
                Polled::AbortWaitTimeout => continue,
            }
        }
    }

    /// `true` once the link is dead.
    pub fn connection_died(&self) -> bool {
        *self.connection_died.lock().expect("state lock")
    }

    /// Finalize both sides: ask the server to exit, then tear down the own
    /// transceiver.
    pub async fn finalize(&mut self) {
        self.transceiver.core().emit_exit();
        self.transceiver.core().on_receive_message(TransactionMessage::exit());
        self.transceiver.finalize().await;
        *self.connection_died.lock().expect("state lock") = true;
        info!("client/server connection disposed");
    }
}
