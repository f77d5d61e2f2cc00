// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event observer registrations and the server→client upcall path.
//!
//! Registrations are one-shot: a fired tuple is removed and both its
//! observer and callback references are decremented; expired ones are
//! reaped during the next sweep touching their event. The release flags in
//! the upcall tell the client when the host-side handles can be dropped.

use crate::objects::{ApiContext, DriverObject, SelectorObject};
use crate::server::ApiInvokeHandler;
use crate::FrontendApiServer;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};
use utk_driver::{
    EventOptions, UiEventListener, UiEventSourceInfo, Widget,
    event::{EVENT_COMPONENT_EVENT, EVENT_WINDOW_CHANGE},
};
use utk_error::{ApiError, ErrCode};
use utk_proto::{ApiCallInfo, ApiReplyInfo};

/// Largest meaningful window-change kind.
const WINDOW_CHANGE_TYPE_MAX: i32 = 4;
/// Largest meaningful component-event kind.
const COMPONENT_EVENT_TYPE_MAX: i32 = 8;

type CallbackTuple = (String, String, EventOptions);

/// Forwards driver UI events to the client as one-shot callbacks.
pub struct UiEventForwarder {
    callbacks: Mutex<HashMap<String, Vec<CallbackTuple>>>,
    ref_counts: Mutex<HashMap<String, u32>>,
    sink: Mutex<Option<ApiInvokeHandler>>,
    installed: AtomicBool,
    epoch: Instant,
}

impl Default for UiEventForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl UiEventForwarder {
    /// A forwarder with no registrations.
    #[must_use]
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(HashMap::new()),
            ref_counts: Mutex::new(HashMap::new()),
            sink: Mutex::new(None),
            installed: AtomicBool::new(false),
            epoch: Instant::now(),
        }
    }

    /// Milliseconds on the forwarder's monotonic clock.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Install the reverse-call sink delivering upcalls to the client.
    pub fn set_callback_sink(&self, sink: ApiInvokeHandler) {
        *self.sink.lock().expect("sink lock") = Some(sink);
    }

    fn inc_ref(&self, reference: &str) {
        *self
            .ref_counts
            .lock()
            .expect("refcount lock")
            .entry(reference.to_string())
            .or_insert(0) += 1;
    }

    fn dec_and_get_ref(&self, reference: &str) -> u32 {
        let mut counts = self.ref_counts.lock().expect("refcount lock");
        match counts.get_mut(reference) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    counts.remove(reference);
                    0
                } else {
                    *count
                }
            }
            None => 0,
        }
    }

    /// Register one `(event, observer, callback, options)` tuple.
    /// Duplicate observer/callback pairs for an event are coalesced.
    pub fn add_callback_info(
        &self,
        event: String,
        observer_ref: &str,
        callback_ref: String,
        options: EventOptions,
    ) {
        debug!(%event, observer_ref, %callback_ref, "register event callback");
        let mut callbacks = self.callbacks.lock().expect("callbacks lock");
        let tuples = callbacks.entry(event).or_default();
        if tuples
            .iter()
            .any(|(observer, callback, _)| observer == observer_ref && *callback == callback_ref)
        {
            return;
        }
        tuples.push((observer_ref.to_string(), callback_ref.clone(), options));
        drop(callbacks);
        self.inc_ref(observer_ref);
        self.inc_ref(&callback_ref);
    }

    /// Number of live registrations under one event kind.
    #[must_use]
    pub fn registration_count(&self, event: &str) -> usize {
        self.callbacks
            .lock()
            .expect("callbacks lock")
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Current reference count of a handle.
    #[must_use]
    pub fn ref_count(&self, reference: &str) -> u32 {
        self.ref_counts
            .lock()
            .expect("refcount lock")
            .get(reference)
            .copied()
            .unwrap_or(0)
    }

    fn should_trigger(
        event: &str,
        source: &UiEventSourceInfo,
        options: &EventOptions,
        widget: Option<&Widget>,
    ) -> bool {
        match event {
            EVENT_WINDOW_CHANGE => {
                if options.window_type != 0 && options.window_type != source.window_change_type {
                    return false;
                }
                if let Some(bundle) = &options.bundle_name {
                    if *bundle != source.bundle_name {
                        return false;
                    }
                }
                true
            }
            EVENT_COMPONENT_EVENT => {
                if options.component_type != 0
                    && options.component_type != source.component_event_type
                {
                    return false;
                }
                if !options.self_matchers.is_empty() {
                    return widget.is_some_and(|widget| widget.matches_all(&options.self_matchers));
                }
                true
            }
            _ => true,
        }
    }

    fn trigger_callback(&self, observer_ref: &str, callback_ref: &str, source: &UiEventSourceInfo) {
        let element_info = serde_json::to_value(source).unwrap_or(Value::Null);
        let release_observer = self.dec_and_get_ref(observer_ref) == 0;
        let release_callback = self.dec_and_get_ref(callback_ref) == 0;
        let call = ApiCallInfo::new("UIEventObserver.once")
            .with_caller(observer_ref)
            .with_params(vec![
                element_info,
                json!(callback_ref),
                json!(release_observer),
                json!(release_callback),
            ]);
        let mut reply = ApiReplyInfo::default();
        let sink = self.sink.lock().expect("sink lock").clone();
        match sink {
            Some(sink) => sink(&call, &mut reply),
            None => info!("no callback sink set, upcall dropped"),
        }
    }
}

impl UiEventListener for UiEventForwarder {
    fn on_event(&self, event: &str, source: &UiEventSourceInfo, widget: Option<&Widget>) {
        let now = self.now_ms();
        let mut fired = Vec::new();
        let mut expired = Vec::new();
        {
            let mut callbacks = self.callbacks.lock().expect("callbacks lock");
            let Some(tuples) = callbacks.get_mut(event) else {
                return;
            };
            tuples.retain(|(observer, callback, options)| {
                if options.expired(now) {
                    expired.push((observer.clone(), callback.clone()));
                    return false;
                }
                if Self::should_trigger(event, source, options, widget) {
                    fired.push((observer.clone(), callback.clone()));
                    return false;
                }
                true
            });
        }
        for (observer, callback) in expired {
            self.dec_and_get_ref(&observer);
            self.dec_and_get_ref(&callback);
        }
        // Upcall delivery preserves registration order within the event.
        for (observer, callback) in fired {
            self.trigger_callback(&observer, &callback, source);
        }
    }
}

fn parse_common_options(
    options: &serde_json::Map<String, Value>,
    receiver: &mut EventOptions,
) -> Result<(), ApiError> {
    if let Some(timeout) = options.get("timeout") {
        let timeout = timeout
            .as_i64()
            .ok_or_else(|| ApiError::with_message(ErrCode::InvalidParam, "Invalid timeout."))?;
        if timeout < 0 {
            return Err(ApiError::with_message(ErrCode::InvalidParam, "Invalid timeout."));
        }
        receiver.timeout = timeout as u64;
    }
    Ok(())
}

/// Register `UIEventObserver.once` on the server.
pub fn register_observer_methods(
    server: &mut FrontendApiServer,
    ctx: &Arc<ApiContext>,
    forwarder: &Arc<UiEventForwarder>,
) {
    let ctx = Arc::clone(ctx);
    let forwarder = Arc::clone(forwarder);
    let once = move |call: &ApiCallInfo, out: &mut ApiReplyInfo| {
        let result = register_once(&ctx, &forwarder, call);
        if let Err(err) = result {
            out.exception = err;
        }
    };
    server.add_handler("UIEventObserver.once", Arc::new(once));
}

fn register_once(
    ctx: &Arc<ApiContext>,
    forwarder: &Arc<UiEventForwarder>,
    call: &ApiCallInfo,
) -> Result<(), ApiError> {
    let param_count = call.param_list.len();
    let registry = ctx.registry.lock().expect("registry lock");
    // The observer must be live and bound to its producing driver.
    registry.resolve_owner::<DriverObject>(&call.caller_obj_ref)?;
    let event = crate::args::read_string(call, 0)?;
    if (event == EVENT_WINDOW_CHANGE || event == EVENT_COMPONENT_EVENT)
        && !ctx.driver.event_observer_enabled()
    {
        return Err(ApiError::with_message(
            ErrCode::OperationUnsupported,
            "Event observer is not enabled.",
        ));
    }
    let callback_ref = crate::args::read_string(call, param_count - 1)?;
    let mut options = EventOptions {
        register_time: forwarder.now_ms(),
        ..Default::default()
    };
    match event.as_str() {
        EVENT_WINDOW_CHANGE if param_count > 2 => {
            let change_type = crate::args::read_int(call, 1)?;
            if change_type <= 0 || change_type > WINDOW_CHANGE_TYPE_MAX {
                return Err(ApiError::with_message(
                    ErrCode::InvalidParam,
                    "Invalid windowChangeType.",
                ));
            }
            options.window_type = change_type;
            if param_count == 4 {
                let extra = crate::args::read_object(call, 2)?;
                if let Some(bundle) = extra.get("bundleName").and_then(Value::as_str) {
                    options.bundle_name = Some(bundle.to_string());
                }
                parse_common_options(extra, &mut options)?;
            }
        }
        EVENT_COMPONENT_EVENT if param_count > 2 => {
            let event_type = crate::args::read_int(call, 1)?;
            if event_type <= 0 || event_type > COMPONENT_EVENT_TYPE_MAX {
                return Err(ApiError::with_message(
                    ErrCode::InvalidParam,
                    "Invalid componentEventType.",
                ));
            }
            options.component_type = event_type;
            if param_count == 4 {
                let extra = crate::args::read_object(call, 2)?;
                parse_common_options(extra, &mut options)?;
                if let Some(selector_ref) = extra.get("on").and_then(Value::as_str) {
                    let selector = registry.resolve::<SelectorObject>(selector_ref)?;
                    options.self_matchers = selector.0.self_matchers().to_vec();
                }
            }
        }
        _ => {}
    }
    drop(registry);
    forwarder.add_callback_info(event, &call.caller_obj_ref, callback_ref, options);
    if !forwarder.installed.swap(true, Ordering::Relaxed) {
        let listener: Arc<dyn UiEventListener> = Arc::clone(forwarder) as Arc<dyn UiEventListener>;
        ctx.driver.register_ui_event_listener(listener);
    }
    Ok(())
}
