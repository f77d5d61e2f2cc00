// SPDX-License-Identifier: MIT OR Apache-2.0
//! Driver-level handlers: lifecycle, touch/key/mouse/pen injection,
//! display control, screen capture, and text input.

use crate::args::{
    is_object, read_bool_or, read_float_or, read_int, read_int_or, read_object, read_point,
    read_string, read_uint, read_uint_or,
};
use crate::handlers::{align_displays, validate_point};
use crate::objects::{ApiContext, DriverObject, MatrixObject, ObserverObject};
use crate::server::FrontendApiServer;
use serde_json::{Value, json};
use std::sync::Arc;
use utk_driver::{
    Direction, DisplayRotation, KeyAction, MouseButton, Point, TouchOp, UNASSIGNED_DISPLAY,
    UiOpArgs,
};
use utk_error::{ApiError, ErrCode};
use utk_proto::{ApiCallInfo, ApiReplyInfo};

/// OpenHarmony key codes for the paste chord.
const KEYCODE_CTRL_LEFT: i32 = 2072;
const KEYCODE_V: i32 = 2038;
/// Texts longer than this go through the clipboard instead of keystrokes.
const MAX_TYPED_TEXT_LEN: usize = 200;

type Handler = Arc<dyn Fn(&ApiCallInfo, &mut ApiReplyInfo) + Send + Sync>;

fn wrap(
    ctx: &Arc<ApiContext>,
    body: impl Fn(&ApiContext, &ApiCallInfo, &mut ApiReplyInfo) -> Result<(), ApiError>
    + Send
    + Sync
    + 'static,
) -> Handler {
    let ctx = Arc::clone(ctx);
    Arc::new(move |call, out| {
        if let Err(err) = body(&ctx, call, out) {
            out.exception = err;
        }
    })
}

/// Decode the positional or mapping form of a one/two-point gesture.
fn touch_params(call: &ApiCallInfo) -> Result<(Point, Point, UiOpArgs), ApiError> {
    let mut args = UiOpArgs::default();
    if !is_object(call, 0) {
        let from = Point::new(read_int(call, 0)?, read_int(call, 1)?);
        let to = Point::new(read_int_or(call, 2, 0)?, read_int_or(call, 3, 0)?);
        args.swipe_velocity_pps = read_uint_or(call, 4, args.swipe_velocity_pps)?;
        return Ok((from, to, args));
    }
    let from = read_point(call, 0)?;
    if call.param_list.len() == 1 {
        return Ok((from, Point::default(), args));
    }
    if !is_object(call, 1) {
        args.long_click_hold_ms = read_uint_or(call, 1, args.long_click_hold_ms)?;
        return Ok((from, Point::default(), args));
    }
    let to = read_point(call, 1)?;
    args.swipe_velocity_pps = read_uint_or(call, 2, args.swipe_velocity_pps)?;
    args.long_click_hold_ms = read_uint_or(call, 3, args.long_click_hold_ms)?;
    Ok((from, to, args))
}

fn generic_click(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let (from, to, mut args) = touch_params(call)?;
    args.check_swipe_velocity();
    validate_point(ctx, from)?;
    let op = match call.api_id.as_str() {
        "Driver.longClick" | "Driver.longClickAt" => {
            if args.long_click_hold_ms < 1500 {
                return Err(ApiError::with_message(
                    ErrCode::InvalidInput,
                    "Long click duration cannot be less than 1500ms",
                ));
            }
            TouchOp::LongClick(from)
        }
        "Driver.doubleClick" | "Driver.doubleClickAt" => TouchOp::DoubleClick(from),
        "Driver.swipe" | "Driver.swipeBetween" => {
            let (from, to) = align_displays(from, to)?;
            validate_point(ctx, to)?;
            TouchOp::Swipe { from, to }
        }
        "Driver.drag" | "Driver.dragBetween" => {
            let (from, to) = align_displays(from, to)?;
            validate_point(ctx, to)?;
            TouchOp::Drag { from, to }
        }
        _ => TouchOp::Click(from),
    };
    ctx.driver.perform_touch(&op, &args)
}

fn fling(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let mut args = UiOpArgs::default();
    if is_object(call, 0) {
        let from = read_point(call, 0)?;
        let to = read_point(call, 1)?;
        let (from, to) = align_displays(from, to)?;
        validate_point(ctx, from)?;
        validate_point(ctx, to)?;
        let step_len = read_uint(call, 2)?;
        let distance =
            (((to.x - from.x).pow(2) + (to.y - from.y).pow(2)) as f64).sqrt() as u32;
        if step_len == 0 || step_len > distance.max(1) {
            return Err(ApiError::with_message(
                ErrCode::InvalidInput,
                "The stepLen is out of range",
            ));
        }
        args.swipe_velocity_pps = read_uint(call, 3)?;
        args.check_swipe_velocity();
        return ctx.driver.perform_touch(&TouchOp::Fling { from, to, step_len }, &args);
    }
    let direction = Direction::from_value(read_uint(call, 0)? as u8)
        .ok_or_else(|| ApiError::with_message(ErrCode::InvalidInput, "Invalid direction"))?;
    args.swipe_velocity_pps = read_uint_or(call, 1, args.swipe_velocity_pps)?;
    args.check_swipe_velocity();
    ctx.driver.perform_touch(&TouchOp::FlingDirection(direction), &args)
}

fn key_ops(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let args = UiOpArgs::default();
    let action = match call.api_id.as_str() {
        "Driver.pressBack" => KeyAction::Back,
        "Driver.pressHome" => KeyAction::Home,
        "Driver.triggerKey" => KeyAction::Code(read_int(call, 0)?),
        _ => {
            let mut codes = vec![read_int(call, 0)?, read_int(call, 1)?];
            if let Some(extra) = call.param_list.get(2).and_then(Value::as_i64) {
                codes.push(extra as i32);
            }
            KeyAction::Combine(codes)
        }
    };
    ctx.driver.perform_key(&action, &args)
}

fn mouse_ops(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let mut args = UiOpArgs::default();
    let point = read_point(call, 0)?;
    validate_point(ctx, point)?;
    let op = match call.api_id.as_str() {
        "Driver.mouseMoveTo" => TouchOp::MouseMoveTo(point),
        "Driver.mouseScroll" => {
            let down = read_bool_or(call, 1, true)?;
            let amount = read_int(call, 2)?;
            args.swipe_velocity_pps = read_uint_or(call, 5, args.swipe_velocity_pps)?;
            args.check_swipe_velocity();
            TouchOp::MouseScroll {
                point,
                amount,
                down,
                key1: read_int_or(call, 3, 0)?,
                key2: read_int_or(call, 4, 0)?,
            }
        }
        other => {
            let button = MouseButton::from_value(read_uint(call, 1)? as u8).ok_or_else(|| {
                ApiError::with_message(ErrCode::InvalidInput, "Invalid mouse button")
            })?;
            let key1 = read_int_or(call, 2, 0)?;
            let key2 = read_int_or(call, 3, 0)?;
            match other {
                "Driver.mouseLongClick" => TouchOp::MouseLongClick { point, button, key1, key2 },
                "Driver.mouseDoubleClick" => {
                    TouchOp::MouseDoubleClick { point, button, key1, key2 }
                }
                _ => TouchOp::MouseClick { point, button, key1, key2 },
            }
        }
    };
    ctx.driver.perform_touch(&op, &args)
}

fn pen_ops(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let mut args = UiOpArgs::default();
    let point = read_point(call, 0)?;
    validate_point(ctx, point)?;
    let op = match call.api_id.as_str() {
        "Driver.penLongClick" => TouchOp::PenLongClick {
            point,
            pressure: read_float_or(call, 1, 1.0)?,
        },
        "Driver.penDoubleClick" => TouchOp::PenDoubleClick(point),
        "Driver.penSwipe" => {
            let to = read_point(call, 1)?;
            let (point, to) = align_displays(point, to)?;
            validate_point(ctx, to)?;
            args.swipe_velocity_pps = read_uint_or(call, 2, args.swipe_velocity_pps)?;
            args.check_swipe_velocity();
            TouchOp::PenSwipe {
                from: point,
                to,
                pressure: read_float_or(call, 3, 1.0)?,
            }
        }
        _ => TouchOp::PenClick(point),
    };
    ctx.driver.perform_touch(&op, &args)
}

fn touchpad_swipe(
    ctx: &ApiContext,
    call: &ApiCallInfo,
    _out: &mut ApiReplyInfo,
) -> Result<(), ApiError> {
    let fingers = read_uint(call, 0)?;
    if !(3..=4).contains(&fingers) {
        return Err(ApiError::with_message(
            ErrCode::InvalidInput,
            "The number of fingers must be 3 or 4",
        ));
    }
    let direction = Direction::from_value(read_uint(call, 1)? as u8)
        .ok_or_else(|| ApiError::with_message(ErrCode::InvalidInput, "Invalid direction"))?;
    let mut args = UiOpArgs::default();
    let mut stay = false;
    let mut speed = args.swipe_velocity_pps;
    if call.param_list.len() == 3 {
        let options = read_object(call, 2)?;
        stay = options.get("stay").and_then(Value::as_bool).unwrap_or(false);
        if let Some(given) = options.get("speed").and_then(Value::as_u64) {
            speed = given as u32;
        }
    }
    args.swipe_velocity_pps = speed;
    args.check_swipe_velocity();
    let speed = args.swipe_velocity_pps;
    ctx.driver.perform_touch(
        &TouchOp::TouchPadMultiFingerSwipe { fingers, direction, stay, speed },
        &args,
    )
}

fn inject_multi_pointer(
    ctx: &ApiContext,
    call: &ApiCallInfo,
    out: &mut ApiReplyInfo,
) -> Result<(), ApiError> {
    let matrix = {
        let registry = ctx.registry.lock().expect("registry lock");
        registry
            .resolve::<MatrixObject>(&read_string(call, 0)?)?
            .0
            .clone()
    };
    if !matrix.is_filled() {
        return Err(ApiError::with_message(
            ErrCode::InvalidInput,
            "Each step of each finger must be set",
        ));
    }
    let mut args = UiOpArgs::default();
    args.swipe_velocity_pps = read_uint_or(call, 1, args.swipe_velocity_pps)?;
    args.check_swipe_velocity();
    ctx.driver.perform_touch(&TouchOp::MultiPointer(matrix), &args)?;
    out.result_value = json!(true);
    Ok(())
}

fn screen_cap(ctx: &ApiContext, call: &ApiCallInfo, out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let fd = read_int(call, 0)?;
    let rect = if call.api_id == "Driver.screenCapture" && call.param_list.len() > 1 {
        Some(crate::args::rect_from_value(&call.param_list[1])?)
    } else {
        None
    };
    let display_id = rect.map_or(UNASSIGNED_DISPLAY, |rect| rect.display_id);
    let result = ctx.driver.take_screen_cap(fd, rect, display_id);
    // The duplicate received through the transport belongs to this side.
    let _ = nix::unistd::close(fd);
    result?;
    out.result_value = json!(true);
    Ok(())
}

fn input_text(ctx: &ApiContext, call: &ApiCallInfo, _out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    let point = read_point(call, 0)?;
    validate_point(ctx, point)?;
    let text = read_string(call, 1)?;
    let args = UiOpArgs::default();
    ctx.driver.perform_touch(&TouchOp::Click(point), &args)?;
    if text.len() > MAX_TYPED_TEXT_LEN {
        if let Some(clipboard) = &ctx.clipboard {
            clipboard.set_paste_data(&text)?;
            return ctx
                .driver
                .perform_key(&KeyAction::Combine(vec![KEYCODE_CTRL_LEFT, KEYCODE_V]), &args);
        }
    }
    ctx.driver.input_text(&text, point.display_id, &args)
}

fn display_ops(ctx: &ApiContext, call: &ApiCallInfo, out: &mut ApiReplyInfo) -> Result<(), ApiError> {
    match call.api_id.as_str() {
        "Driver.getDisplaySize" => {
            let display_id = read_int_or(call, 0, UNASSIGNED_DISPLAY)?;
            out.result_value = serde_json::to_value(ctx.driver.display_size(display_id)?)
                .unwrap_or(Value::Null);
        }
        "Driver.getDisplayDensity" => {
            let display_id = read_int_or(call, 0, UNASSIGNED_DISPLAY)?;
            out.result_value = serde_json::to_value(ctx.driver.display_density(display_id)?)
                .unwrap_or(Value::Null);
        }
        "Driver.getDisplayRotation" => {
            out.result_value = json!(ctx.driver.display_rotation()? as u8);
        }
        "Driver.setDisplayRotation" => {
            let rotation = DisplayRotation::from_value(read_uint(call, 0)? as u8)
                .ok_or_else(|| {
                    ApiError::with_message(ErrCode::InvalidInput, "Invalid display rotation")
                })?;
            ctx.driver.set_display_rotation(rotation)?;
        }
        "Driver.wakeUpDisplay" => ctx.driver.wake_up_display()?,
        _ => {
            let idle_ms = read_uint(call, 0)?;
            let timeout_ms = read_uint(call, 1)?;
            out.result_value = json!(ctx.driver.wait_for_ui_steady(idle_ms, timeout_ms).is_ok());
        }
    }
    Ok(())
}

/// Register driver lifecycle and operation handlers.
pub fn register(server: &mut FrontendApiServer, ctx: &Arc<ApiContext>) {
    server.add_handler(
        "Driver.create",
        wrap(ctx, |ctx, _, out| {
            let driver = Arc::clone(&ctx.driver);
            let mut registry = ctx.registry.lock().expect("registry lock");
            out.result_value = json!(registry.store(Box::new(DriverObject(driver)), None));
            Ok(())
        }),
    );
    server.add_handler(
        "Driver.createUIEventObserver",
        wrap(ctx, |ctx, call, out| {
            let mut registry = ctx.registry.lock().expect("registry lock");
            out.result_value = json!(
                registry.store(Box::new(ObserverObject(())), Some(&call.caller_obj_ref))
            );
            Ok(())
        }),
    );
    server.add_handler(
        "Driver.delayMs",
        wrap(ctx, |_, call, _| {
            std::thread::sleep(std::time::Duration::from_millis(u64::from(read_uint(
                call, 0,
            )?)));
            Ok(())
        }),
    );

    for api_id in [
        "Driver.click",
        "Driver.longClick",
        "Driver.doubleClick",
        "Driver.clickAt",
        "Driver.longClickAt",
        "Driver.doubleClickAt",
        "Driver.swipe",
        "Driver.swipeBetween",
        "Driver.drag",
        "Driver.dragBetween",
    ] {
        server.add_handler(api_id, wrap(ctx, generic_click));
    }
    server.add_handler("Driver.fling", wrap(ctx, fling));
    for api_id in [
        "Driver.pressBack",
        "Driver.pressHome",
        "Driver.triggerKey",
        "Driver.triggerCombineKeys",
    ] {
        server.add_handler(api_id, wrap(ctx, key_ops));
    }
    for api_id in [
        "Driver.mouseClick",
        "Driver.mouseLongClick",
        "Driver.mouseDoubleClick",
        "Driver.mouseMoveTo",
        "Driver.mouseScroll",
    ] {
        server.add_handler(api_id, wrap(ctx, mouse_ops));
    }
    for api_id in [
        "Driver.penClick",
        "Driver.penLongClick",
        "Driver.penDoubleClick",
        "Driver.penSwipe",
    ] {
        server.add_handler(api_id, wrap(ctx, pen_ops));
    }
    server.add_handler("Driver.touchPadMultiFingerSwipe", wrap(ctx, touchpad_swipe));
    server.add_handler("Driver.injectMultiPointerAction", wrap(ctx, inject_multi_pointer));
    server.add_handler("Driver.screenCap", wrap(ctx, screen_cap));
    server.add_handler("Driver.screenCapture", wrap(ctx, screen_cap));
    server.add_handler("Driver.inputText", wrap(ctx, input_text));
    for api_id in [
        "Driver.getDisplaySize",
        "Driver.getDisplayDensity",
        "Driver.getDisplayRotation",
        "Driver.setDisplayRotation",
        "Driver.wakeUpDisplay",
        "Driver.waitForIdle",
    ] {
        server.add_handler(api_id, wrap(ctx, display_ops));
    }
}
