// SPDX-License-Identifier: MIT OR Apache-2.0
//! Out-of-band command channel.
//!
//! Commands reach other daemons over the broadcast topics without a full
//! RPC link: the sender publishes the command, then waits on the reply
//! topic for a `{code, message}` acknowledgment. A process registers one
//! global command listener that services commands off the bus dispatch
//! path.

use crate::WAIT_CONN_TIMEOUT_MS;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use utk_bus::{
    BusEvent, EventBus, TOPIC_BROADCAST_COMMAND, TOPIC_BROADCAST_COMMAND_REPLY,
};
use utk_error::{ApiError, ErrCode};

/// Function servicing one broadcast command.
pub type BroadcastCommandHandler = Arc<dyn Fn(&Map<String, Value>) -> ApiError + Send + Sync>;

/// Deliver `command` over the broadcast channel and wait for the ack.
///
/// The reply subscription is set up before publishing so the ack cannot be
/// missed. Waits up to twice the connection window.
pub async fn send_broadcast_command(bus: &Arc<EventBus>, command: Map<String, Value>) -> ApiError {
    info!("send broadcast command begin");
    let mut replies = bus.subscribe(TOPIC_BROADCAST_COMMAND_REPLY);
    let mut event = BusEvent::new(TOPIC_BROADCAST_COMMAND);
    event.params = command;
    if bus.publish(event).is_err() {
        return ApiError::with_message(
            ErrCode::Internal,
            "Failed to publish uitest.broadcast.command",
        );
    }
    let timeout = Duration::from_millis(WAIT_CONN_TIMEOUT_MS * 2);
    match tokio::time::timeout(timeout, replies.recv()).await {
        Ok(Some(reply)) => {
            let code = reply
                .param("code")
                .and_then(Value::as_u64)
                .and_then(|raw| ErrCode::from_value(raw as u32))
                .unwrap_or(ErrCode::Internal);
            let message = reply
                .param("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            info!("received broadcast command reply");
            ApiError::with_message(code, message)
        }
        _ => ApiError::with_message(
            ErrCode::Internal,
            "Wait for uitest.broadcast.command.reply timeout",
        ),
    }
}

/// Install the global command listener.
///
/// Each command is serviced on its own task so the bus dispatch path is
/// never blocked; the handler's verdict is published on the reply topic.
/// Returns the listener task; abort it to unset the handler.
pub fn set_broadcast_command_handler(
    bus: &Arc<EventBus>,
    handler: BroadcastCommandHandler,
) -> JoinHandle<()> {
    let mut commands = bus.subscribe(TOPIC_BROADCAST_COMMAND);
    let bus = Arc::clone(bus);
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            let bus = Arc::clone(&bus);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                info!("handle broadcast command begin");
                let verdict = handler(&command.params);
                let reply = BusEvent::new(TOPIC_BROADCAST_COMMAND_REPLY)
                    .with_param("code", json!(verdict.code.value()))
                    .with_param("message", json!(verdict.message));
                if bus.publish(reply).is_err() {
                    warn!("failed to publish broadcast command reply");
                }
                info!("handle broadcast command end");
            });
        }
    })
}
