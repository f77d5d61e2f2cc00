// SPDX-License-Identifier: MIT OR Apache-2.0
//! The built-in argument checker preprocessor.
//!
//! For the incoming id, every signature overload is tried: the argument
//! count must fall inside the overload's arity window and each supplied
//! argument must pass its declared type token. Class-typed tokens require a
//! live registry entry; JSON object tokens are checked recursively against
//! their property schema.

use crate::catalog::{ApiMethod, find_json_def, is_frontend_class};
use crate::server::ApiInvokeHandler;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use utk_error::{ApiError, ErrCode};
use utk_registry::ObjectRegistry;

fn check_arg(
    expect: &str,
    value: &Value,
    is_defaulted: bool,
    registry: &Mutex<ObjectRegistry>,
) -> Result<(), ApiError> {
    if is_defaulted && value.is_null() {
        return Ok(());
    }
    let invalid = |message: String| Err(ApiError::with_message(ErrCode::InvalidInput, message));
    match expect {
        "int" => {
            let non_negative =
                value.as_u64().is_some() || value.as_i64().is_some_and(|signed| signed >= 0);
            if !non_negative {
                return invalid("Expect integer which cannot be less than 0".to_string());
            }
        }
        "signedInt" => {
            if value.as_i64().is_none() && value.as_u64().is_none() {
                return invalid("Expect signedInt".to_string());
            }
        }
        "float" => {
            if !value.is_number() {
                return invalid("Expect float".to_string());
            }
        }
        "bool" => {
            if !value.is_boolean() {
                return invalid("Expect boolean".to_string());
            }
        }
        "string" => {
            if !value.is_string() {
                return invalid("Expect string".to_string());
            }
        }
        class if is_frontend_class(class) => {
            let Some(reference) = value.as_str() else {
                return invalid(format!("Expect {class}"));
            };
            if !registry.lock().expect("registry lock").contains(reference) {
                return Err(ApiError::with_message(ErrCode::Internal, "Bad object ref"));
            }
        }
        json_type => {
            let Some(def) = find_json_def(json_type) else {
                return Err(ApiError::with_message(
                    ErrCode::Internal,
                    format!("Unknown target type {json_type}"),
                ));
            };
            let Some(object) = value.as_object() else {
                return invalid(format!("Expect {json_type}"));
            };
            let mut unknown: Vec<&String> = object.keys().collect();
            for prop in def.props {
                let Some(prop_value) = object.get(prop.name) else {
                    if prop.required {
                        return invalid(format!("Missing property {}", prop.name));
                    }
                    continue;
                };
                unknown.retain(|key| *key != prop.name);
                check_arg(prop.ty, prop_value, !prop.required, registry).map_err(|err| {
                    ApiError::with_message(
                        err.code,
                        format!("Illegal value of property '{}': {}", prop.name, err.message),
                    )
                })?;
            }
            if !unknown.is_empty() {
                return invalid(format!("Illegal property of {json_type}"));
            }
        }
    }
    Ok(())
}

fn check_overload(
    method: &ApiMethod,
    params: &[Value],
    registry: &Mutex<ObjectRegistry>,
) -> Result<(), (usize, ApiError)> {
    for (index, value) in params.iter().enumerate() {
        let is_defaulted = index >= method.min_args();
        check_arg(&method.param_types[index], value, is_defaulted, registry)
            .map_err(|err| (index, err))?;
    }
    Ok(())
}

/// Build the checker preprocessor over the given catalog and registry.
///
/// Ids absent from the catalog pass unchecked; internal apis such as the
/// backend-object cleaner carry no signature.
pub fn api_call_info_checker(
    catalog: HashMap<String, Vec<ApiMethod>>,
    registry: Arc<Mutex<ObjectRegistry>>,
) -> ApiInvokeHandler {
    Arc::new(move |call, out| {
        let Some(overloads) = catalog.get(&call.api_id) else {
            return;
        };
        let argc = call.param_list.len();
        let mut found_possible_overload = false;
        let mut first_mismatch: Option<ApiError> = None;
        for method in overloads {
            if argc < method.min_args() || argc > method.param_count() {
                continue;
            }
            found_possible_overload = true;
            match check_overload(method, &call.param_list, &registry) {
                Ok(()) => return,
                Err((index, err)) => {
                    first_mismatch.get_or_insert(ApiError::with_message(
                        err.code,
                        format!("Check arg{index} failed: {}", err.message),
                    ));
                }
            }
        }
        out.exception = if found_possible_overload {
            first_mismatch.unwrap_or_else(|| {
                ApiError::with_message(ErrCode::InvalidInput, "Parameter type mismatch")
            })
        } else {
            ApiError::with_message(ErrCode::InvalidInput, "Illegal argument count")
        };
    })
}
