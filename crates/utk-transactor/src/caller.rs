// SPDX-License-Identifier: MIT OR Apache-2.0
//! Caller endpoints: the stub a transactor exposes to its peer and the
//! proxy it holds on the peer's stub.
//!
//! The stub and proxy are deliberately two entities: the transactor owns
//! its stub exclusively and shares ownership of the peer stub through the
//! proxy. Death notification flows through a watch channel owned by the
//! stub, so a died or dropped endpoint wakes every registered recipient.

use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::warn;
use utk_bus::EndpointHandle;
use utk_error::{ApiError, ErrCode};
use utk_proto::{ApiCallInfo, ApiReplyInfo};

/// Function invoked when a call arrives from the peer.
pub type ApiCallHandler = Arc<dyn Fn(&ApiCallInfo, &mut ApiReplyInfo) + Send + Sync>;

/// Hook receiving the peer's back-caller endpoint during setup.
pub type BackCallerHook = Box<dyn Fn(EndpointHandle) + Send + Sync>;

/// A callable api endpoint.
pub trait ApiCaller: Send + Sync {
    /// Invoke the api specified in `call` and produce its reply.
    fn call(&self, call: &ApiCallInfo, reply: &mut ApiReplyInfo);

    /// Register the peer's own caller for the reverse direction.
    fn set_back_caller(&self, caller: EndpointHandle) -> bool;
}

/// The local endpoint published to the peer.
pub struct ApiCallerStub {
    handler: Mutex<Option<ApiCallHandler>>,
    backcaller_hook: Mutex<Option<BackCallerHook>>,
    death_tx: watch::Sender<bool>,
}

impl Default for ApiCallerStub {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiCallerStub {
    /// A stub with no handler installed.
    #[must_use]
    pub fn new() -> Self {
        let (death_tx, _) = watch::channel(false);
        Self {
            handler: Mutex::new(None),
            backcaller_hook: Mutex::new(None),
            death_tx,
        }
    }

    /// Install the function that services incoming calls.
    pub fn set_call_handler(&self, handler: ApiCallHandler) {
        *self.handler.lock().expect("handler lock") = Some(handler);
    }

    /// Install (or clear) the hook receiving the peer's back-caller.
    pub fn set_back_caller_hook(&self, hook: Option<BackCallerHook>) {
        *self.backcaller_hook.lock().expect("hook lock") = hook;
    }

    /// Subscribe to this endpoint's death signal.
    #[must_use]
    pub fn death_watch(&self) -> watch::Receiver<bool> {
        self.death_tx.subscribe()
    }

    /// Declare this endpoint dead, waking all death recipients.
    pub fn notify_death(&self) {
        let _ = self.death_tx.send(true);
    }

    /// `true` once [`ApiCallerStub::notify_death`] ran.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        *self.death_tx.borrow()
    }
}

impl ApiCaller for ApiCallerStub {
    fn call(&self, call: &ApiCallInfo, reply: &mut ApiReplyInfo) {
        let handler = self.handler.lock().expect("handler lock").clone();
        match handler {
            Some(handler) => handler(call, reply),
            None => {
                reply.exception =
                    ApiError::with_message(ErrCode::Internal, "No call handler set");
            }
        }
    }

    fn set_back_caller(&self, caller: EndpointHandle) -> bool {
        let hook = self.backcaller_hook.lock().expect("hook lock");
        match &*hook {
            Some(hook) => {
                hook(caller);
                true
            }
            None => {
                warn!("no backcaller hook set");
                false
            }
        }
    }
}

/// The handle a transactor holds on its peer's stub.
pub struct ApiCallerProxy {
    remote: Arc<ApiCallerStub>,
}

impl ApiCallerProxy {
    /// Wrap the peer endpoint obtained from the event bus.
    ///
    /// Returns `None` when the handle is not a caller endpoint.
    #[must_use]
    pub fn from_endpoint(endpoint: &EndpointHandle) -> Option<Self> {
        let remote = Arc::clone(endpoint).downcast::<ApiCallerStub>().ok()?;
        Some(Self { remote })
    }

    /// Forward a call to the peer.
    ///
    /// A declared fd parameter is duplicated first so the receiver owns its
    /// own descriptor; duplication failure or a dead peer yields `Internal`.
    pub fn call(&self, call: &ApiCallInfo, reply: &mut ApiReplyInfo) {
        if self.remote.is_dead() {
            reply.exception = ApiError::with_message(ErrCode::Internal, "IPC SendRequest failed");
            return;
        }
        let mut forwarded = call.clone();
        if let Some(idx) = call.fd_index() {
            let raw = call.param_list[idx].as_i64().unwrap_or(-1);
            let Ok(dup) = nix::unistd::dup(raw as std::os::fd::RawFd) else {
                reply.exception =
                    ApiError::with_message(ErrCode::Internal, "Failed to transfer fd param");
                return;
            };
            forwarded.param_list[idx] = Value::from(dup as i64);
        }
        self.remote.call(&forwarded, reply);
    }

    /// Register the local stub as the peer's back-caller.
    pub fn set_back_caller(&self, caller: EndpointHandle) -> bool {
        self.remote.set_back_caller(caller)
    }

    /// Subscribe to the peer's death signal.
    #[must_use]
    pub fn death_watch(&self) -> watch::Receiver<bool> {
        self.remote.death_watch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_handler() -> ApiCallHandler {
        Arc::new(|call, reply| {
            reply.result_value = json!(format!(
                "{}_ok",
                call.param_list.first().and_then(Value::as_str).unwrap_or("")
            ));
        })
    }

    #[test]
    fn stub_dispatches_to_handler() {
        let stub = ApiCallerStub::new();
        stub.set_call_handler(echo_handler());
        let call = ApiCallInfo::new("echo").with_params(vec![json!("yz")]);
        let mut reply = ApiReplyInfo::default();
        stub.call(&call, &mut reply);
        assert_eq!(reply.result_value, json!("yz_ok"));
        assert!(!reply.exception.is_error());
    }

    #[test]
    fn stub_without_handler_reports_internal() {
        let stub = ApiCallerStub::new();
        let mut reply = ApiReplyInfo::default();
        stub.call(&ApiCallInfo::new("x"), &mut reply);
        assert_eq!(reply.exception.code, ErrCode::Internal);
    }

    #[test]
    fn proxy_rejects_calls_on_a_dead_peer() {
        let stub = Arc::new(ApiCallerStub::new());
        stub.set_call_handler(echo_handler());
        let endpoint: EndpointHandle = Arc::clone(&stub) as EndpointHandle;
        let proxy = ApiCallerProxy::from_endpoint(&endpoint).unwrap();
        stub.notify_death();

        let mut reply = ApiReplyInfo::default();
        proxy.call(&ApiCallInfo::new("echo"), &mut reply);
        assert_eq!(reply.exception.code, ErrCode::Internal);
        assert!(reply.exception.message.contains("SendRequest"));
    }

    #[test]
    fn backcaller_needs_a_hook() {
        let stub = ApiCallerStub::new();
        let peer: EndpointHandle = Arc::new(ApiCallerStub::new());
        assert!(!stub.set_back_caller(Arc::clone(&peer)));
        let received = Arc::new(Mutex::new(false));
        let seen = Arc::clone(&received);
        stub.set_back_caller_hook(Some(Box::new(move |_| {
            *seen.lock().unwrap() = true;
        })));
        assert!(stub.set_back_caller(peer));
        assert!(*received.lock().unwrap());
    }
}
