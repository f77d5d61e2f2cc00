// SPDX-License-Identifier: MIT OR Apache-2.0
//! Component and window finders.

use crate::args::{read_object, read_string, read_uint};
use crate::objects::{ApiContext, ComponentObject, SelectorObject, WindowObject};
use crate::server::FrontendApiServer;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;
use utk_driver::Window;
use utk_error::{ApiError, ErrCode};
use utk_proto::{ApiCallInfo, ApiReplyInfo};

fn find_components(
    ctx: &ApiContext,
    call: &ApiCallInfo,
    out: &mut ApiReplyInfo,
) -> Result<(), ApiError> {
    let driver_ref = call.caller_obj_ref.clone();
    let selector_ref = read_string(call, 0)?;
    let mut selector = {
        let registry = ctx.registry.lock().expect("registry lock");
        registry.resolve::<SelectorObject>(&selector_ref)?.0.clone()
    };
    let found = if call.api_id == "Driver.waitForComponent" {
        let timeout_ms = read_uint(call, 1)?;
        selector.set_want_multi(false);
        ctx.driver
            .wait_for_widget(&selector, timeout_ms)?
            .into_iter()
            .collect()
    } else {
        selector.set_want_multi(call.api_id == "Driver.findComponents");
        ctx.driver.find_widgets(&selector)?
    };
    if call.api_id == "Driver.assertComponentExist" {
        if found.is_empty() {
            return Err(ApiError::with_message(
                ErrCode::AssertionFailed,
                format!("Component not exist matching: {}", selector.describe()),
            ));
        }
        return Ok(());
    }
    let mut registry = ctx.registry.lock().expect("registry lock");
    if call.api_id == "Driver.findComponents" {
        let references: Vec<Value> = found
            .into_iter()
            .map(|widget| json!(registry.store(Box::new(ComponentObject(widget)), Some(&driver_ref))))
            .collect();
        out.result_value = Value::Array(references);
    } else {
        out.result_value = match found.into_iter().next() {
            Some(widget) => {
                json!(registry.store(Box::new(ComponentObject(widget)), Some(&driver_ref)))
            }
            None => Value::Null,
        };
    }
    Ok(())
}

fn window_matcher(filter: &serde_json::Map<String, Value>) -> impl Fn(&Window) -> bool + '_ {
    move |window: &Window| {
        let mut is_match = true;
        if let Some(bundle) = filter.get("bundleName").and_then(Value::as_str) {
            is_match = is_match && bundle == window.bundle_name;
        }
        if let Some(title) = filter.get("title").and_then(Value::as_str) {
            is_match = is_match && title == window.title;
        }
        if let Some(focused) = filter.get("focused").and_then(Value::as_bool) {
            is_match = is_match && focused == window.focused;
        }
        for key in ["actived", "active"] {
            if let Some(active) = filter.get(key).and_then(Value::as_bool) {
                is_match = is_match && active == window.active;
            }
        }
        if let Some(display) = filter.get("displayId").and_then(Value::as_i64) {
            is_match = is_match && display as i32 == window.display_id;
        }
        is_match
    }
}

fn find_window(ctx: &ApiContext, call: &ApiCallInfo, out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let driver_ref = call.caller_obj_ref.clone();
    let filter = read_object(call, 0)?;
    if filter.is_empty() {
        return Err(ApiError::with_message(
            ErrCode::InvalidInput,
            "WindowFilter cannot be empty",
        ));
    }
    let matcher = window_matcher(filter);
    match ctx.driver.find_window(&matcher)? {
        Some(window) => {
            let mut registry = ctx.registry.lock().expect("registry lock");
            out.result_value =
                json!(registry.store(Box::new(WindowObject(window)), Some(&driver_ref)));
        }
        None => {
            warn!("no window matched the filter");
            out.result_value = Value::Null;
        }
    }
    Ok(())
}

/// Register the finder handlers.
pub fn register(server: &mut FrontendApiServer, ctx: &Arc<ApiContext>) {
    for api_id in [
        "Driver.findComponent",
        "Driver.findComponents",
        "Driver.waitForComponent",
        "Driver.assertComponentExist",
    ] {
        let ctx = Arc::clone(ctx);
        server.add_handler(
            api_id,
            Arc::new(move |call, out| {
                if let Err(err) = find_components(&ctx, call, out) {
                    warn!(api = %call.api_id, error = %err, "finder failed");
                    out.exception = err;
                }
            }),
        );
    }
    let ctx = Arc::clone(ctx);
    server.add_handler(
        "Driver.findWindow",
        Arc::new(move |call, out| {
            if let Err(err) = find_window(&ctx, call, out) {
                out.exception = err;
            }
        }),
    );
}
