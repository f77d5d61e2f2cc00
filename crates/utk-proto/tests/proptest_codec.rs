// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based round-trip laws for the call/reply codec.

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use utk_error::{ApiError, ErrCode};
use utk_proto::{ApiCallInfo, ApiReplyInfo, decode_call, decode_reply, encode_call, encode_reply};

// ── Leaf strategies ─────────────────────────────────────────────────────

fn arb_api_id() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z]{1,12}\\.[a-z][a-zA-Z]{1,16}"
}

fn arb_obj_ref() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("On#seed".to_string()),
        ("[A-Z][a-zA-Z]{1,10}", 0u32..1000).prop_map(|(ty, n)| format!("{ty}#{n}")),
    ]
}

fn arb_leaf_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        // Finite floats only; NaN has no JSON representation.
        (-1.0e12f64..1.0e12).prop_map(Value::from),
        "[a-zA-Z0-9_ .#-]{0,24}".prop_map(Value::from),
    ]
}

/// Values of the kinds a parameter list can carry: leaves plus one level of
/// sequence/mapping nesting, which is as deep as the api surface goes.
fn arb_param_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        arb_leaf_value(),
        prop::collection::vec(arb_leaf_value(), 0..4).prop_map(Value::from),
        prop::collection::btree_map("[a-z]{1,8}", arb_leaf_value(), 0..4).prop_map(|map| {
            Value::Object(map.into_iter().collect::<Map<String, Value>>())
        }),
    ]
}

fn arb_err_code() -> impl Strategy<Value = ErrCode> {
    prop_oneof![
        Just(ErrCode::NoError),
        Just(ErrCode::NoSystemCapability),
        Just(ErrCode::InvalidInput),
        Just(ErrCode::InitializeFailed),
        Just(ErrCode::ApiUsage),
        Just(ErrCode::AssertionFailed),
        Just(ErrCode::ComponentLost),
        Just(ErrCode::OperationUnsupported),
        Just(ErrCode::Internal),
        Just(ErrCode::InvalidParam),
        Just(ErrCode::WindowLost),
        Just(ErrCode::WidgetLost),
        Just(ErrCode::UsageError),
    ]
}

fn arb_call() -> impl Strategy<Value = ApiCallInfo> {
    (
        arb_api_id(),
        arb_obj_ref(),
        prop::collection::vec(arb_param_value(), 0..6),
    )
        .prop_map(|(api_id, caller, params)| {
            ApiCallInfo::new(api_id).with_caller(caller).with_params(params)
        })
}

fn arb_reply() -> impl Strategy<Value = ApiReplyInfo> {
    (arb_param_value(), arb_err_code(), "[ -~]{0,48}").prop_map(|(value, code, message)| {
        ApiReplyInfo {
            result_value: value,
            exception: ApiError::with_message(code, message),
        }
    })
}

// ── Round-trip laws ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn call_codec_round_trips(call in arb_call()) {
        let decoded = decode_call(&encode_call(&call).unwrap()).unwrap();
        prop_assert_eq!(decoded, call);
    }

    #[test]
    fn reply_codec_round_trips(reply in arb_reply()) {
        let decoded = decode_reply(&encode_reply(&reply).unwrap()).unwrap();
        prop_assert_eq!(decoded, reply);
    }

    #[test]
    fn fd_calls_round_trip_after_patching(fd in 3i64..4096) {
        let call = ApiCallInfo::new("Driver.screenCap")
            .with_caller("Driver#0")
            .with_params(vec![json!(fd), json!({"left": 0, "top": 0})])
            .with_fd_param(0);
        let mut decoded = decode_call(&encode_call(&call).unwrap()).unwrap();
        // The wire never carries the descriptor value itself.
        prop_assert_eq!(&decoded.param_list[0], &json!(0));
        decoded.patch_fd_param(fd);
        prop_assert_eq!(&decoded.param_list[0], &call.param_list[0]);
    }
}
