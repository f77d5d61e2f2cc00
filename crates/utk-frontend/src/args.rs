// SPDX-License-Identifier: MIT OR Apache-2.0
//! Positional parameter readers used by handler bodies.
//!
//! The checker has already enforced the declared kinds, so these adapters
//! fail with `InvalidInput` only on genuinely malformed slots (wrong index
//! arithmetic in a handler, or internal calls that skip the checker).

use serde_json::Value;
use utk_driver::{Point, Rect, UNASSIGNED_DISPLAY};
use utk_error::{ApiError, ErrCode};
use utk_proto::ApiCallInfo;

fn invalid(message: String) -> ApiError {
    ApiError::with_message(ErrCode::InvalidInput, message)
}

fn slot(call: &ApiCallInfo, index: usize) -> Option<&Value> {
    call.param_list.get(index).filter(|value| !value.is_null())
}

/// Read a required non-negative integer.
pub fn read_uint(call: &ApiCallInfo, index: usize) -> Result<u32, ApiError> {
    slot(call, index)
        .and_then(Value::as_u64)
        .map(|value| value as u32)
        .ok_or_else(|| invalid(format!("Expect integer at arg{index}")))
}

/// Read an optional non-negative integer with a default.
pub fn read_uint_or(call: &ApiCallInfo, index: usize, default: u32) -> Result<u32, ApiError> {
    match slot(call, index) {
        None => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|value| value as u32)
            .ok_or_else(|| invalid(format!("Expect integer at arg{index}"))),
    }
}

/// Read a required integer.
pub fn read_int(call: &ApiCallInfo, index: usize) -> Result<i32, ApiError> {
    slot(call, index)
        .and_then(Value::as_i64)
        .map(|value| value as i32)
        .ok_or_else(|| invalid(format!("Expect integer at arg{index}")))
}

/// Read an optional integer with a default.
pub fn read_int_or(call: &ApiCallInfo, index: usize, default: i32) -> Result<i32, ApiError> {
    match slot(call, index) {
        None => Ok(default),
        Some(value) => value
            .as_i64()
            .map(|value| value as i32)
            .ok_or_else(|| invalid(format!("Expect integer at arg{index}"))),
    }
}

/// Read an optional float with a default.
pub fn read_float_or(call: &ApiCallInfo, index: usize, default: f32) -> Result<f32, ApiError> {
    match slot(call, index) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .map(|value| value as f32)
            .ok_or_else(|| invalid(format!("Expect float at arg{index}"))),
    }
}

/// Read a required float.
pub fn read_float(call: &ApiCallInfo, index: usize) -> Result<f32, ApiError> {
    slot(call, index)
        .and_then(Value::as_f64)
        .map(|value| value as f32)
        .ok_or_else(|| invalid(format!("Expect float at arg{index}")))
}

/// Read an optional boolean with a default.
pub fn read_bool_or(call: &ApiCallInfo, index: usize, default: bool) -> Result<bool, ApiError> {
    match slot(call, index) {
        None => Ok(default),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| invalid(format!("Expect boolean at arg{index}"))),
    }
}

/// Read a required string.
pub fn read_string(call: &ApiCallInfo, index: usize) -> Result<String, ApiError> {
    slot(call, index)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| invalid(format!("Expect string at arg{index}")))
}

/// Read a required mapping.
pub fn read_object<'a>(
    call: &'a ApiCallInfo,
    index: usize,
) -> Result<&'a serde_json::Map<String, Value>, ApiError> {
    slot(call, index)
        .and_then(Value::as_object)
        .ok_or_else(|| invalid(format!("Expect object at arg{index}")))
}

/// `true` when the slot holds a mapping.
#[must_use]
pub fn is_object(call: &ApiCallInfo, index: usize) -> bool {
    slot(call, index).is_some_and(Value::is_object)
}

/// Number of supplied (non-trailing-null) parameters.
#[must_use]
pub fn arg_count(call: &ApiCallInfo) -> usize {
    call.param_list.len()
}

/// Decode a `{x, y, displayId?}` mapping.
pub fn point_from_value(value: &Value) -> Result<Point, ApiError> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid("Expect Point".to_string()))?;
    let x = object
        .get("x")
        .and_then(Value::as_i64)
        .ok_or_else(|| invalid("Missing property x".to_string()))?;
    let y = object
        .get("y")
        .and_then(Value::as_i64)
        .ok_or_else(|| invalid("Missing property y".to_string()))?;
    let display_id = object
        .get("displayId")
        .and_then(Value::as_i64)
        .unwrap_or(i64::from(UNASSIGNED_DISPLAY));
    Ok(Point::on_display(x as i32, y as i32, display_id as i32))
}

/// Read a required point mapping.
pub fn read_point(call: &ApiCallInfo, index: usize) -> Result<Point, ApiError> {
    let value = slot(call, index).ok_or_else(|| invalid(format!("Expect Point at arg{index}")))?;
    point_from_value(value)
}

/// Decode a `{left, right, top, bottom, displayId?}` mapping.
pub fn rect_from_value(value: &Value) -> Result<Rect, ApiError> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid("Expect Rect".to_string()))?;
    let field = |name: &str| {
        object
            .get(name)
            .and_then(Value::as_i64)
            .map(|edge| edge as i32)
            .ok_or_else(|| invalid(format!("Missing property {name}")))
    };
    let mut rect = Rect::new(field("left")?, field("right")?, field("top")?, field("bottom")?);
    rect.display_id = object
        .get("displayId")
        .and_then(Value::as_i64)
        .map_or(UNASSIGNED_DISPLAY, |display| display as i32);
    Ok(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_cover_missing_and_null_slots() {
        let call = ApiCallInfo::new("x").with_params(vec![json!(1), Value::Null]);
        assert_eq!(read_uint_or(&call, 1, 7).unwrap(), 7);
        assert_eq!(read_uint_or(&call, 2, 9).unwrap(), 9);
        assert_eq!(read_uint(&call, 0).unwrap(), 1);
        assert!(read_uint(&call, 1).is_err());
    }

    #[test]
    fn point_mapping_reads_optional_display() {
        let plain = point_from_value(&json!({"x": 3, "y": 4})).unwrap();
        assert_eq!(plain.display_id, UNASSIGNED_DISPLAY);
        let placed = point_from_value(&json!({"x": 3, "y": 4, "displayId": 2})).unwrap();
        assert_eq!(placed.display_id, 2);
        assert!(point_from_value(&json!({"x": 3})).is_err());
    }

    #[test]
    fn rect_mapping_requires_all_edges() {
        let rect =
            rect_from_value(&json!({"left": 0, "right": 10, "top": 0, "bottom": 20})).unwrap();
        assert_eq!(rect.center_x(), 5);
        assert!(rect_from_value(&json!({"left": 0, "right": 10, "top": 0})).is_err());
    }
}
