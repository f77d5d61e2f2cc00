// SPDX-License-Identifier: MIT OR Apache-2.0
//! Selector-builder handlers (`On.*`).
//!
//! Every builder copy-constructs a new selector from its receiver (the
//! seed reference produces an empty one), appends one matcher or locator,
//! stores the result, and returns the fresh reference. Builder chains
//! therefore never mutate earlier links.

use crate::args::{read_bool_or, read_int, read_string, read_uint_or};
use crate::objects::{ApiContext, SelectorObject};
use crate::server::FrontendApiServer;
use serde_json::json;
use std::sync::Arc;
use utk_driver::{MatchPattern, UiAttr, WidgetMatchModel, WidgetSelector};
use utk_error::{ApiError, ErrCode};
use utk_proto::{ApiCallInfo, ApiReplyInfo, REF_SEED_ON};

/// How a builder reads its test value.
#[derive(Clone, Copy)]
enum ValueKind {
    Str,
    Bool,
    Int,
}

const ATTR_BUILDERS: &[(&str, UiAttr, ValueKind)] = &[
    ("On.accessibilityId", UiAttr::AccessibilityId, ValueKind::Int),
    ("On.id", UiAttr::Id, ValueKind::Str),
    ("On.text", UiAttr::Text, ValueKind::Str),
    ("On.type", UiAttr::Type, ValueKind::Str),
    ("On.description", UiAttr::Description, ValueKind::Str),
    ("On.hint", UiAttr::Hint, ValueKind::Str),
    ("On.originalText", UiAttr::OriginalText, ValueKind::Str),
    ("On.enabled", UiAttr::Enabled, ValueKind::Bool),
    ("On.focused", UiAttr::Focused, ValueKind::Bool),
    ("On.selected", UiAttr::Selected, ValueKind::Bool),
    ("On.clickable", UiAttr::Clickable, ValueKind::Bool),
    ("On.longClickable", UiAttr::LongClickable, ValueKind::Bool),
    ("On.scrollable", UiAttr::Scrollable, ValueKind::Bool),
    ("On.checkable", UiAttr::Checkable, ValueKind::Bool),
    ("On.checked", UiAttr::Checked, ValueKind::Bool),
];

/// Copy-construct the selector named by the receiver reference.
fn base_selector(ctx: &ApiContext, call: &ApiCallInfo) -> Result<WidgetSelector, ApiError> {
    if call.caller_obj_ref == REF_SEED_ON {
        return Ok(WidgetSelector::new());
    }
    let registry = ctx.registry.lock().expect("registry lock");
    Ok(registry.resolve::<SelectorObject>(&call.caller_obj_ref)?.0.clone())
}

fn store_selector(ctx: &ApiContext, selector: WidgetSelector, out: &mut ApiReplyInfo) {
    let reference = ctx
        .registry
        .lock()
        .expect("registry lock")
        .store(Box::new(SelectorObject(selector)), None);
    out.result_value = json!(reference);
}

fn attr_builder(
    ctx: &ApiContext,
    attr: UiAttr,
    kind: ValueKind,
    call: &ApiCallInfo,
) -> Result<WidgetSelector, ApiError> {
    let mut selector = base_selector(ctx, call)?;
    let (test_value, pattern_slot) = match kind {
        ValueKind::Str => (read_string(call, 0)?, 1),
        // A defaulted bool test value means "true".
        ValueKind::Bool => (read_bool_or(call, 0, true)?.to_string(), 1),
        ValueKind::Int => (read_int(call, 0)?.to_string(), 1),
    };
    let pattern_value = read_uint_or(call, pattern_slot, MatchPattern::Equals as u32)?;
    let pattern = MatchPattern::from_value(pattern_value as u8).ok_or_else(|| {
        ApiError::with_message(ErrCode::InvalidInput, "Invalid match pattern")
    })?;
    if matches!(pattern, MatchPattern::RegExp | MatchPattern::RegExpIgnoreCase) {
        // Reject broken patterns at build time, not at match time.
        if let Err(err) = regex::Regex::new(&test_value) {
            return Err(ApiError::with_message(ErrCode::InvalidInput, err.to_string()));
        }
    }
    selector.add_matcher(WidgetMatchModel::new(attr, test_value, pattern));
    Ok(selector)
}

fn relative_builder(ctx: &ApiContext, call: &ApiCallInfo) -> Result<WidgetSelector, ApiError> {
    let mut selector = base_selector(ctx, call)?;
    let attr_name = call.api_id.trim_start_matches("On.");
    match attr_name {
        "isBefore" | "isAfter" | "within" => {
            let anchor = {
                let registry = ctx.registry.lock().expect("registry lock");
                registry
                    .resolve::<SelectorObject>(&read_string(call, 0)?)?
                    .0
                    .clone()
            };
            match attr_name {
                "isBefore" => selector.add_rear_locator(anchor)?,
                "isAfter" => selector.add_front_locator(anchor)?,
                _ => selector.add_parent_locator(anchor)?,
            }
        }
        "inWindow" => selector.add_app_locator(read_string(call, 0)?),
        _ => selector.add_display_locator(read_int(call, 0)?),
    }
    Ok(selector)
}

/// Register all `On.*` builders.
pub fn register(server: &mut FrontendApiServer, ctx: &Arc<ApiContext>) {
    for (api_id, attr, kind) in ATTR_BUILDERS {
        let ctx = Arc::clone(ctx);
        server.add_handler(
            *api_id,
            Arc::new(move |call, out| match attr_builder(&ctx, *attr, *kind, call) {
                Ok(selector) => store_selector(&ctx, selector, out),
                Err(err) => out.exception = err,
            }),
        );
    }
    for api_id in [
        "On.isBefore",
        "On.isAfter",
        "On.within",
        "On.inWindow",
        "On.inDisplay",
        "On.belongingDisplay",
    ] {
        let ctx = Arc::clone(ctx);
        server.add_handler(
            api_id,
            Arc::new(move |call, out| match relative_builder(&ctx, call) {
                Ok(selector) => store_selector(&ctx, selector, out),
                Err(err) => out.exception = err,
            }),
        );
    }
}
