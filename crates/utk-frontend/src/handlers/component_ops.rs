// SPDX-License-Identifier: MIT OR Apache-2.0
//! Component handlers: attribute reads and widget-relative operations.
//!
//! Operating handlers refresh the widget snapshot first, so a component
//! that vanished between lookup and action surfaces `ComponentLost` with
//! the stale snapshot's description rather than acting on dead bounds.

use crate::args::{read_float, read_string, read_uint_or};
use crate::objects::{ApiContext, ComponentObject, SelectorObject};
use crate::server::FrontendApiServer;
use serde_json::{Value, json};
use std::sync::Arc;
use utk_driver::{KeyAction, TouchOp, UiAttr, UiOpArgs, Widget};
use utk_error::{ApiError, ErrCode};
use utk_proto::{ApiCallInfo, ApiReplyInfo};

fn snapshot(ctx: &ApiContext, reference: &str) -> Result<Widget, ApiError> {
    let registry = ctx.registry.lock().expect("registry lock");
    // The component must still be bound to its producing driver.
    registry.resolve_owner::<crate::objects::DriverObject>(reference)?;
    Ok(registry.resolve::<ComponentObject>(reference)?.0.clone())
}

fn attr_getters(ctx: &ApiContext, call: &ApiCallInfo, out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let widget = snapshot(ctx, &call.caller_obj_ref)?;
    let bool_attr = |attr| json!(widget.attr(attr, "false") == "true");
    out.result_value = match call.api_id.as_str() {
        "Component.getAccessibilityId" => {
            json!(widget.attr(UiAttr::AccessibilityId, "0").parse::<i64>().unwrap_or(0))
        }
        "Component.getId" => json!(widget.attr(UiAttr::Id, "")),
        "Component.getText" => json!(widget.attr(UiAttr::Text, "")),
        "Component.getType" => json!(widget.attr(UiAttr::Type, "")),
        "Component.getDescription" => json!(widget.attr(UiAttr::Description, "")),
        "Component.getHint" => json!(widget.attr(UiAttr::Hint, "")),
        "Component.getBounds" => serde_json::to_value(widget.bounds()).unwrap_or(Value::Null),
        "Component.getBoundsCenter" => {
            serde_json::to_value(widget.bounds().center()).unwrap_or(Value::Null)
        }
        "Component.getDisplayId" => json!(widget.display_id()),
        "Component.isEnabled" => bool_attr(UiAttr::Enabled),
        "Component.isFocused" => bool_attr(UiAttr::Focused),
        "Component.isSelected" => bool_attr(UiAttr::Selected),
        "Component.isClickable" => bool_attr(UiAttr::Clickable),
        "Component.isLongClickable" => bool_attr(UiAttr::LongClickable),
        "Component.isScrollable" => bool_attr(UiAttr::Scrollable),
        "Component.isCheckable" => bool_attr(UiAttr::Checkable),
        _ => bool_attr(UiAttr::Checked),
    };
    Ok(())
}

fn refreshed(ctx: &ApiContext, call: &ApiCallInfo) -> Result<Widget, ApiError> {
    let widget = snapshot(ctx, &call.caller_obj_ref)?;
    ctx.driver.retrieve_widget(&widget)
}

fn touch_ops(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let widget = refreshed(ctx, call)?;
    let center = widget.bounds().center();
    let args = UiOpArgs::default();
    let op = match call.api_id.as_str() {
        "Component.longClick" => TouchOp::LongClick(center),
        "Component.doubleClick" => TouchOp::DoubleClick(center),
        _ => TouchOp::Click(center),
    };
    ctx.driver.perform_touch(&op, &args)
}

fn scroll_to_end(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let widget = refreshed(ctx, call)?;
    let mut args = UiOpArgs::default();
    args.swipe_velocity_pps = read_uint_or(call, 0, args.swipe_velocity_pps)?;
    args.check_swipe_velocity();
    let op = TouchOp::ScrollToEnd {
        area: widget.bounds(),
        to_top: call.api_id == "Component.scrollToTop",
    };
    ctx.driver.perform_touch(&op, &args)
}

fn text_input(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let widget = refreshed(ctx, call)?;
    let center = widget.bounds().center();
    let args = UiOpArgs::default();
    ctx.driver.perform_touch(&TouchOp::Click(center), &args)?;
    let text = if call.api_id == "Component.clearText" {
        String::new()
    } else {
        read_string(call, 0)?
    };
    if text.len() > 200 {
        if let Some(clipboard) = &ctx.clipboard {
            clipboard.set_paste_data(&text)?;
            return ctx.driver.perform_key(&KeyAction::Combine(vec![2072, 2038]), &args);
        }
    }
    ctx.driver.input_text(&text, widget.display_id(), &args)
}

fn scroll_search(ctx: &ApiContext, call: &ApiCallInfo, out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    // Refresh first so scrolling a dead component fails early.
    refreshed(ctx, call)?;
    let selector = {
        let registry = ctx.registry.lock().expect("registry lock");
        registry
            .resolve::<SelectorObject>(&read_string(call, 0)?)?
            .0
            .clone()
    };
    let found = ctx.driver.find_widgets(&selector)?;
    let mut registry = ctx.registry.lock().expect("registry lock");
    let owner = registry
        .owner_ref(&call.caller_obj_ref)
        .map(ToString::to_string);
    out.result_value = match found.into_iter().next() {
        Some(target) => {
            json!(registry.store(Box::new(ComponentObject(target)), owner.as_deref()))
        }
        None => Value::Null,
    };
    Ok(())
}

fn drag_to(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let source = refreshed(ctx, call)?;
    let target_ref = read_string(call, 0)?;
    let target = snapshot(ctx, &target_ref)?;
    let target = ctx.driver.retrieve_widget(&target)?;
    let args = UiOpArgs::default();
    ctx.driver.perform_touch(
        &TouchOp::Drag {
            from: source.bounds().center(),
            to: target.bounds().center(),
        },
        &args,
    )
}

fn pinch(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let widget = refreshed(ctx, call)?;
    let scale = read_float(call, 0)?;
    let valid = if call.api_id == "Component.pinchOut" {
        scale >= 1.0
    } else {
        (0.0..=1.0).contains(&scale)
    };
    if !valid {
        return Err(ApiError::with_message(
            ErrCode::InvalidInput,
            "Pinch scale out of range",
        ));
    }
    let args = UiOpArgs::default();
    ctx.driver.perform_touch(&TouchOp::Pinch { area: widget.bounds(), scale }, &args)
}

/// Register all component handlers.
pub fn register(server: &mut FrontendApiServer, ctx: &Arc<ApiContext>) {
    let wrap = |body: fn(&ApiContext, &ApiCallInfo, &mut ApiReplyInfo) -> Result<(), ApiError>| {
        let ctx = Arc::clone(ctx);
        let handler = move |call: &ApiCallInfo, out: &mut ApiReplyInfo| {
            if let Err(err) = body(&ctx, call, out) {
                out.exception = err;
            }
        };
        Arc::new(handler) as crate::server::ApiInvokeHandler
    };
    for api_id in [
        "Component.getAccessibilityId",
        "Component.getId",
        "Component.getText",
        "Component.getType",
        "Component.getDescription",
        "Component.getHint",
        "Component.getBounds",
        "Component.getBoundsCenter",
        "Component.getDisplayId",
        "Component.isEnabled",
        "Component.isFocused",
        "Component.isSelected",
        "Component.isClickable",
        "Component.isLongClickable",
        "Component.isScrollable",
        "Component.isCheckable",
        "Component.isChecked",
    ] {
        server.add_handler(api_id, wrap(attr_getters));
    }
    for api_id in ["Component.click", "Component.longClick", "Component.doubleClick"] {
        server.add_handler(api_id, wrap(touch_ops));
    }
    for api_id in ["Component.scrollToTop", "Component.scrollToBottom"] {
        server.add_handler(api_id, wrap(scroll_to_end));
    }
    for api_id in ["Component.inputText", "Component.clearText"] {
        server.add_handler(api_id, wrap(text_input));
    }
    server.add_handler("Component.scrollSearch", wrap(scroll_search));
    server.add_handler("Component.dragTo", wrap(drag_to));
    for api_id in ["Component.pinchOut", "Component.pinchIn"] {
        server.add_handler(api_id, wrap(pinch));
    }
}
