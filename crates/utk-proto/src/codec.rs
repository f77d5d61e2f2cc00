// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON wire shaping for [`ApiCallInfo`] and [`ApiReplyInfo`].

use crate::{ApiCallInfo, ApiReplyInfo, NO_FD_PARAM, ProtoError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utk_error::ApiError;

/// Wire form of a call: the parameter list crosses as one string blob so the
/// header keeps a fixed shape.
#[derive(Serialize, Deserialize)]
struct CallDoc {
    #[serde(rename = "apiId")]
    api_id: String,
    #[serde(rename = "callerObjRef")]
    caller_obj_ref: String,
    #[serde(rename = "paramList")]
    param_list: String,
    #[serde(rename = "fdParamIndex")]
    fd_param_index: i32,
}

#[derive(Serialize, Deserialize)]
struct ReplyDoc {
    #[serde(rename = "resultValue")]
    result_value: Value,
    exception: ApiError,
}

/// Serialize a call. When an fd parameter is declared, the blob carries a
/// zero placeholder in its slot; the descriptor itself must be attached
/// through the transport's handle-passing mechanism.
pub fn encode_call(call: &ApiCallInfo) -> Result<String, ProtoError> {
    let params: Vec<Value> = match call.fd_index() {
        Some(fd_idx) => call
            .param_list
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                if idx == fd_idx {
                    Value::from(0)
                } else {
                    value.clone()
                }
            })
            .collect(),
        None => call.param_list.clone(),
    };
    let doc = CallDoc {
        api_id: call.api_id.clone(),
        caller_obj_ref: call.caller_obj_ref.clone(),
        param_list: serde_json::to_string(&params)?,
        fd_param_index: call.fd_param_index,
    };
    Ok(serde_json::to_string(&doc)?)
}

/// Deserialize a call. The fd slot, if any, still holds the placeholder;
/// callers patch it with [`ApiCallInfo::patch_fd_param`] before dispatching.
pub fn decode_call(payload: &str) -> Result<ApiCallInfo, ProtoError> {
    let doc: CallDoc = serde_json::from_str(payload)?;
    let param_list: Vec<Value> = serde_json::from_str(&doc.param_list)?;
    Ok(ApiCallInfo {
        api_id: doc.api_id,
        caller_obj_ref: doc.caller_obj_ref,
        param_list,
        fd_param_index: if doc.fd_param_index < 0 {
            NO_FD_PARAM
        } else {
            doc.fd_param_index
        },
        convert_error: false,
    })
}

/// Serialize a reply.
pub fn encode_reply(reply: &ApiReplyInfo) -> Result<String, ProtoError> {
    let doc = ReplyDoc {
        result_value: reply.result_value.clone(),
        exception: reply.exception.clone(),
    };
    Ok(serde_json::to_string(&doc)?)
}

/// Deserialize a reply.
pub fn decode_reply(payload: &str) -> Result<ApiReplyInfo, ProtoError> {
    let doc: ReplyDoc = serde_json::from_str(payload)?;
    Ok(ApiReplyInfo {
        result_value: doc.result_value,
        exception: doc.exception,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use utk_error::ErrCode;

    #[test]
    fn call_round_trip() {
        let call = ApiCallInfo::new("Driver.click")
            .with_caller("Driver#0")
            .with_params(vec![json!(120), json!(240)]);
        let decoded = decode_call(&encode_call(&call).unwrap()).unwrap();
        assert_eq!(decoded, call);
    }

    #[test]
    fn param_blob_is_a_string_field() {
        let call = ApiCallInfo::new("On.text").with_params(vec![json!("OK")]);
        let wire: Value = serde_json::from_str(&encode_call(&call).unwrap()).unwrap();
        assert!(wire["paramList"].is_string());
        assert_eq!(wire["fdParamIndex"], -1);
    }

    #[test]
    fn fd_slot_is_zeroed_on_the_wire() {
        let call = ApiCallInfo::new("Driver.screenCap")
            .with_caller("Driver#0")
            .with_params(vec![json!(42)])
            .with_fd_param(0);
        let wire: Value = serde_json::from_str(&encode_call(&call).unwrap()).unwrap();
        let blob: Vec<Value> = serde_json::from_str(wire["paramList"].as_str().unwrap()).unwrap();
        assert_eq!(blob[0], json!(0));

        let mut decoded = decode_call(&encode_call(&call).unwrap()).unwrap();
        decoded.patch_fd_param(7);
        assert_eq!(decoded.param_list[0], json!(7));
    }

    #[test]
    fn reply_round_trip_with_exception() {
        let reply = ApiReplyInfo {
            result_value: json!(["Component#0", "Component#1"]),
            exception: ApiError::with_message(ErrCode::AssertionFailed, "Component not exist"),
        };
        let decoded = decode_reply(&encode_reply(&reply).unwrap()).unwrap();
        assert_eq!(decoded, reply);
    }

    #[test]
    fn malformed_payload_is_reported() {
        assert!(matches!(
            decode_call("{not json"),
            Err(ProtoError::Malformed(_))
        ));
        assert!(matches!(
            decode_reply("[1,2]"),
            Err(ProtoError::Malformed(_))
        ));
    }
}
