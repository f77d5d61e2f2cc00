// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transaction messages exchanged by the fallback transceiver.

use crate::ProtoError;
use std::sync::atomic::{AtomicU32, Ordering};

/// Kind tag of a [`TransactionMessage`]. Values are the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Placeholder for an uninitialized slot; never delivered.
    Invalid = 0,
    /// An api invocation.
    Call = 1,
    /// The reply to a call, carrying the calling id.
    Reply = 2,
    /// Keepalive probe; answered automatically with an ack.
    Handshake = 3,
    /// Keepalive answer, carrying the handshake id.
    Ack = 4,
    /// Orderly-shutdown request; short-circuits waiting pollers.
    Exit = 5,
}

impl MessageKind {
    /// Decode a wire tag.
    pub fn from_u8(value: u8) -> Result<Self, ProtoError> {
        Ok(match value {
            0 => Self::Invalid,
            1 => Self::Call,
            2 => Self::Reply,
            3 => Self::Handshake,
            4 => Self::Ack,
            5 => Self::Exit,
            other => return Err(ProtoError::UnknownKind(other)),
        })
    }
}

static MESSAGE_ID: AtomicU32 = AtomicU32::new(0);

/// Next id for an originating message. Monotonic per emitter process.
pub fn next_message_id() -> u32 {
    MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

impl Default for MessageKind {
    fn default() -> Self {
        Self::Invalid
    }
}

/// One message on the fallback transport: an id, a kind, and the serialized
/// call or reply document as a single string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionMessage {
    /// Monotonic per emitter; replies and acks reuse the request id.
    pub id: u32,
    /// Message kind.
    pub kind: MessageKind,
    /// Serialized payload; empty for keepalive and exit messages.
    pub payload: String,
}

impl TransactionMessage {
    /// A call message with a fresh id.
    pub fn call(payload: impl Into<String>) -> Self {
        Self {
            id: next_message_id(),
            kind: MessageKind::Call,
            payload: payload.into(),
        }
    }

    /// A reply keeping the calling id.
    pub fn reply_to(request: &TransactionMessage, payload: impl Into<String>) -> Self {
        Self {
            id: request.id,
            kind: MessageKind::Reply,
            payload: payload.into(),
        }
    }

    /// A keepalive probe with a fresh id.
    #[must_use]
    pub fn handshake() -> Self {
        Self {
            id: next_message_id(),
            kind: MessageKind::Handshake,
            payload: String::new(),
        }
    }

    /// The answer to a handshake, keeping its id.
    #[must_use]
    pub fn ack(handshake: &TransactionMessage) -> Self {
        Self {
            id: handshake.id,
            kind: MessageKind::Ack,
            payload: String::new(),
        }
    }

    /// An orderly-shutdown request with a fresh id.
    #[must_use]
    pub fn exit() -> Self {
        Self {
            id: next_message_id(),
            kind: MessageKind::Exit,
            payload: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_and_ack_keep_the_request_id() {
        let mut call = TransactionMessage::call("payload");
        call.id = 1234;
        let reply = TransactionMessage::reply_to(&call, "result");
        assert_eq!(reply.id, 1234);
        assert_eq!(reply.kind, MessageKind::Reply);

        let mut probe = TransactionMessage::handshake();
        probe.id = 5678;
        let ack = TransactionMessage::ack(&probe);
        assert_eq!(ack.id, 5678);
        assert_eq!(ack.kind, MessageKind::Ack);
    }

    #[test]
    fn kind_tags_round_trip() {
        for kind in [
            MessageKind::Invalid,
            MessageKind::Call,
            MessageKind::Reply,
            MessageKind::Handshake,
            MessageKind::Ack,
            MessageKind::Exit,
        ] {
            assert_eq!(MessageKind::from_u8(kind as u8).unwrap(), kind);
        }
        assert!(MessageKind::from_u8(9).is_err());
    }

    #[test]
    fn ids_are_monotonic() {
        let first = next_message_id();
        let second = next_message_id();
        assert!(second > first);
    }
}
