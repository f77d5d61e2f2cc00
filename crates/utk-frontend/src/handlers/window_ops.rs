// SPDX-License-Identifier: MIT OR Apache-2.0
//! Window handlers: attribute reads and window-management actions.

use crate::args::{read_int, read_uint};
use crate::objects::{ApiContext, DriverObject, WindowObject};
use crate::server::FrontendApiServer;
use serde_json::{Value, json};
use std::sync::Arc;
use utk_driver::{Direction, Point, Window, WindowAction};
use utk_error::{ApiError, ErrCode};
use utk_proto::{ApiCallInfo, ApiReplyInfo};

fn snapshot(ctx: &ApiContext, reference: &str) -> Result<Window, ApiError> {
    let registry = ctx.registry.lock().expect("registry lock");
    registry.resolve_owner::<DriverObject>(reference)?;
    Ok(registry.resolve::<WindowObject>(reference)?.0.clone())
}

fn getters(ctx: &ApiContext, call: &ApiCallInfo, out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let window = snapshot(ctx, &call.caller_obj_ref)?;
    out.result_value = match call.api_id.as_str() {
        "UiWindow.getBundleName" => json!(window.bundle_name),
        "UiWindow.getBounds" => serde_json::to_value(window.bounds).unwrap_or(Value::Null),
        "UiWindow.getTitle" => json!(window.title),
        "UiWindow.getWindowMode" => json!(window_mode_value(&window.mode)),
        "UiWindow.getDisplayId" => json!(window.display_id),
        "UiWindow.isFocused" => json!(window.focused),
        _ => json!(window.active),
    };
    Ok(())
}

/// Window modes as exposed to the frontend.
fn window_mode_value(mode: &str) -> i32 {
    match mode {
        "fullscreen" => 0,
        "primary" => 1,
        "secondary" => 2,
        "floating" => 3,
        _ => 4,
    }
}

fn actions(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let window = snapshot(ctx, &call.caller_obj_ref)?;
    // Refresh so actions on a closed window raise WindowLost.
    let window = ctx.driver.retrieve_window(&window)?;
    let action = match call.api_id.as_str() {
        "UiWindow.focus" => WindowAction::Focus,
        "UiWindow.moveTo" => {
            WindowAction::MoveTo(Point::on_display(
                read_int(call, 0)?,
                read_int(call, 1)?,
                window.display_id,
            ))
        }
        "UiWindow.resize" => {
            let width = read_uint(call, 0)?;
            let height = read_uint(call, 1)?;
            if width == 0 || height == 0 {
                return Err(ApiError::with_message(
                    ErrCode::InvalidInput,
                    "The width and height cannot be zero",
                ));
            }
            let direction = Direction::from_value(read_uint(call, 2)? as u8).ok_or_else(|| {
                ApiError::with_message(ErrCode::InvalidInput, "Invalid resize direction")
            })?;
            WindowAction::Resize { width, height, direction }
        }
        "UiWindow.split" => WindowAction::Split,
        "UiWindow.maximize" => WindowAction::Maximize,
        "UiWindow.minimize" => WindowAction::Minimize,
        "UiWindow.resume" => WindowAction::Resume,
        _ => WindowAction::Close,
    };
    ctx.driver.change_window_mode(window.id, action)
}

/// Register all window handlers.
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
        "UiWindow.getBundleName",
        "UiWindow.getBounds",
        "UiWindow.getTitle",
        "UiWindow.getWindowMode",
        "UiWindow.getDisplayId",
        "UiWindow.isFocused",
        "UiWindow.isActive",
    ] {
        server.add_handler(api_id, wrap(getters));
    }
    for api_id in [
        "UiWindow.focus",
        "UiWindow.moveTo",
        "UiWindow.resize",
        "UiWindow.split",
        "UiWindow.maximize",
        "UiWindow.minimize",
        "UiWindow.resume",
        "UiWindow.close",
    ] {
        server.add_handler(api_id, wrap(actions));
    }
}
