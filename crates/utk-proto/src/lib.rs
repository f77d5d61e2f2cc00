// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data model and wire codec for api transactions.
//!
//! A call travels as a fixed-shape JSON header whose parameter sequence is
//! folded into one opaque string blob, so transports only ever see four
//! fields. File-descriptor arguments are never serialized by value: the blob
//! carries a placeholder and the descriptor itself rides the transport's
//! out-of-band handle channel.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod message;

use serde_json::Value;
use utk_error::ApiError;

pub use codec::{decode_call, decode_reply, encode_call, encode_reply};
pub use message::{MessageKind, TransactionMessage, next_message_id};

/// Sentinel caller reference rooting every selector-builder chain.
pub const REF_SEED_ON: &str = "On#seed";
/// Pre-rename sentinel still accepted from legacy clients.
pub const REF_SEED_BY: &str = "By#seed";

/// No file-descriptor argument present.
pub const NO_FD_PARAM: i32 = -1;

/// One outgoing api invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCallInfo {
    /// Dotted api name, e.g. `"Driver.click"`.
    pub api_id: String,
    /// Receiver reference: empty for static calls, a seed reference, or a
    /// registry-allocated handle.
    pub caller_obj_ref: String,
    /// Positional parameters.
    pub param_list: Vec<Value>,
    /// Index of the file-descriptor parameter, or [`NO_FD_PARAM`].
    pub fd_param_index: i32,
    /// Preprocessing hint: remap `InvalidInput` to `InvalidParam` on the
    /// return path. Set server-side from the signature catalog; not on wire.
    pub convert_error: bool,
}

impl ApiCallInfo {
    /// A call with the given id and no receiver or parameters.
    pub fn new(api_id: impl Into<String>) -> Self {
        Self {
            api_id: api_id.into(),
            caller_obj_ref: String::new(),
            param_list: Vec::new(),
            fd_param_index: NO_FD_PARAM,
            convert_error: false,
        }
    }

    /// Builder-style receiver reference.
    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller_obj_ref = caller.into();
        self
    }

    /// Builder-style parameter list.
    #[must_use]
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.param_list = params;
        self
    }

    /// Marks `param_list[index]` as a file descriptor to transfer as a
    /// kernel handle.
    #[must_use]
    pub fn with_fd_param(mut self, index: usize) -> Self {
        self.fd_param_index = index as i32;
        self
    }

    /// The index of the fd parameter, if one is declared and in range.
    #[must_use]
    pub fn fd_index(&self) -> Option<usize> {
        usize::try_from(self.fd_param_index)
            .ok()
            .filter(|idx| *idx < self.param_list.len())
    }

    /// Replace the fd placeholder with the descriptor value received
    /// through the transport's handle channel.
    pub fn patch_fd_param(&mut self, fd: i64) {
        if let Some(idx) = self.fd_index() {
            self.param_list[idx] = Value::from(fd);
        }
    }
}

/// One api reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiReplyInfo {
    /// Result value; may contain newly minted handle references.
    pub result_value: Value,
    /// Failure detail; `NoError` means success.
    pub exception: ApiError,
}

impl ApiReplyInfo {
    /// A successful reply with the given result value.
    #[must_use]
    pub fn ok(result_value: Value) -> Self {
        Self {
            result_value,
            exception: ApiError::none(),
        }
    }

    /// A failed reply with a null result.
    #[must_use]
    pub fn err(exception: ApiError) -> Self {
        Self {
            result_value: Value::Null,
            exception,
        }
    }
}

/// Codec failures.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The payload was not a parseable document of the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A message carried an unknown kind tag.
    #[error("unknown message kind {0}")]
    UnknownKind(u8),
}
