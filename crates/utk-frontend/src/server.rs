// SPDX-License-Identifier: MIT OR Apache-2.0
//! The frontend api server: name aliasing, preprocessor chain, handler
//! dispatch, and return-path remapping.

use crate::catalog::{ApiMethod, build_catalog};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, info};
use utk_error::{ApiError, ErrCode};
use utk_proto::{ApiCallInfo, ApiReplyInfo};

/// Function handling one api invocation.
pub type ApiInvokeHandler =
    std::sync::Arc<dyn Fn(&ApiCallInfo, &mut ApiReplyInfo) + Send + Sync>;

/// Server that accepts and dispatches api invocation requests.
pub struct FrontendApiServer {
    catalog: HashMap<String, Vec<ApiMethod>>,
    handlers: HashMap<String, ApiInvokeHandler>,
    // Ordered: the first preprocessor reporting an error aborts dispatch.
    preprocessors: Vec<(String, ApiInvokeHandler)>,
    old_to_new: HashMap<&'static str, &'static str>,
    new_to_old: HashMap<&'static str, &'static str>,
}

impl Default for FrontendApiServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrontendApiServer {
    /// A server with the compiled signature catalog and the static name
    /// maps, but no handlers yet.
    #[must_use]
    pub fn new() -> Self {
        let old_to_new = HashMap::from([
            ("By", "On"),
            ("UiDriver", "Driver"),
            ("UiComponent", "Component"),
            ("By.id", "On.accessibilityId"),
            ("By.key", "On.id"),
            ("UiComponent.getId", "Component.getAccessibilityId"),
            ("UiComponent.getKey", "Component.getId"),
            ("UiWindow.isActived", "UiWindow.isActive"),
        ]);
        let new_to_old = HashMap::from([
            ("On", "By"),
            ("Driver", "UiDriver"),
            ("Component", "UiComponent"),
        ]);
        Self {
            catalog: build_catalog(),
            handlers: HashMap::new(),
            preprocessors: Vec::new(),
            old_to_new,
            new_to_old,
        }
    }

    /// The compiled signature catalog.
    #[must_use]
    pub fn catalog(&self) -> &HashMap<String, Vec<ApiMethod>> {
        &self.catalog
    }

    /// Register an invocation handler.
    pub fn add_handler(&mut self, api_id: impl Into<String>, handler: ApiInvokeHandler) {
        self.handlers.insert(api_id.into(), handler);
    }

    /// `true` when a handler is registered for the (possibly legacy) id.
    #[must_use]
    pub fn has_handler_for(&self, api_id: &str) -> bool {
        let mapped = check_and_do_api_mapping(api_id, '.', &self.old_to_new);
        self.handlers.contains_key(&mapped)
    }

    /// Remove an invocation handler.
    pub fn remove_handler(&mut self, api_id: &str) {
        self.handlers.remove(api_id);
    }

    /// Append a common preprocessor. Preprocessors run in insertion order
    /// before the handler.
    pub fn add_common_preprocessor(&mut self, name: impl Into<String>, processor: ApiInvokeHandler) {
        self.preprocessors.push((name.into(), processor));
    }

    /// Remove a preprocessor by name.
    pub fn remove_common_preprocessor(&mut self, name: &str) {
        self.preprocessors.retain(|(existing, _)| existing != name);
    }

    /// Dispatch one api invocation.
    pub fn call(&self, incoming: &ApiCallInfo, out: &mut ApiReplyInfo) {
        info!(api = %incoming.api_id, "begin to invoke api");
        let mut call = incoming.clone();
        let old_api_name = self.api_map_pre(&mut call);
        let convert_error = call.convert_error;

        let Some(handler) = self.handlers.get(&call.api_id) else {
            out.exception = ApiError::with_message(
                ErrCode::Internal,
                format!("No handler found for api '{}'", call.api_id),
            );
            return;
        };

        let mut aborted = false;
        for (name, processor) in &self.preprocessors {
            let result = catch_unwind(AssertUnwindSafe(|| processor(&call, out)));
            if result.is_err() {
                out.exception = ApiError::with_message(
                    ErrCode::Internal,
                    format!("Preprocessor failed: {name}"),
                );
            }
            if out.exception.is_error() {
                out.exception.message =
                    format!("(PreProcessing: {name}){}", out.exception.message);
                aborted = true;
                break;
            }
        }
        if !aborted {
            let result = catch_unwind(AssertUnwindSafe(|| handler(&call, out)));
            if let Err(panic) = result {
                let what = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                out.exception =
                    ApiError::with_message(ErrCode::Internal, format!("Handler failed: {what}"));
            }
        }
        if let Some(old_api_name) = &old_api_name {
            self.api_map_post(old_api_name, out);
        }
        // The converted code is applied exactly once, on the return path.
        if convert_error && out.exception.code == ErrCode::InvalidInput {
            out.exception.code = ErrCode::InvalidParam;
        }
    }

    /// Map a legacy call forward to the current api surface.
    ///
    /// Returns the original api name when a legacy class call was mapped,
    /// so the return path can map results back.
    fn api_map_pre(&self, call: &mut ApiCallInfo) -> Option<String> {
        // The convert-error flag comes from the signature under the
        // incoming (possibly legacy) name.
        if let Some(overloads) = self.catalog.get(&call.api_id) {
            call.convert_error = overloads.iter().any(|method| method.convert_error);
        }
        let class_name = class_of(&call.api_id).unwrap_or_default().to_string();
        let Some(mapped_class) = self.old_to_new.get(class_name.as_str()) else {
            // No class rename, but specific method renames may still apply.
            if let Some(mapped) = self.old_to_new.get(call.api_id.as_str()) {
                debug!(from = %call.api_id, to = %mapped, "method name mapped");
                call.api_id = (*mapped).to_string();
            }
            return None;
        };
        let old_api_name = call.api_id.clone();
        call.api_id = check_and_do_api_mapping(&call.api_id, '.', &self.old_to_new);
        if call.caller_obj_ref.starts_with(class_name.as_str()) {
            call.caller_obj_ref = format!(
                "{mapped_class}{}",
                &call.caller_obj_ref[class_name.len()..]
            );
        }
        // Map reference-typed arguments; which slots are references is
        // read from the legacy signature.
        if let Some(overloads) = self.catalog.get(&old_api_name) {
            if let Some(method) = overloads
                .iter()
                .find(|method| call.param_list.len() <= method.param_count())
            {
                for (index, value) in call.param_list.iter_mut().enumerate() {
                    let declared = &method.param_types[index];
                    if declared != "string" {
                        if let Value::String(text) = value {
                            *value =
                                Value::String(check_and_do_api_mapping(text, '#', &self.old_to_new));
                        }
                    }
                }
            }
        }
        Some(old_api_name)
    }

    /// Map the reply of a legacy call back: legacy error codes, and handle
    /// references renamed to the legacy classes.
    fn api_map_post(&self, old_api_name: &str, out: &mut ApiReplyInfo) {
        out.exception.code = out.exception.code.to_legacy();
        let Some(overloads) = self.catalog.get(old_api_name) else {
            return;
        };
        let return_type = overloads
            .first()
            .map(|method| method.return_type.as_str())
            .unwrap_or("void");
        if return_type == "string" || return_type == "[string]" {
            return;
        }
        match &mut out.result_value {
            Value::String(text) => {
                *text = check_and_do_api_mapping(text, '#', &self.new_to_old);
            }
            Value::Array(items) => {
                for item in items {
                    if let Value::String(text) = item {
                        *text = check_and_do_api_mapping(text, '#', &self.new_to_old);
                    }
                }
            }
            _ => {}
        }
    }
}

/// The class prefix of a dotted api name.
fn class_of(api_id: &str) -> Option<&str> {
    api_id.split_once('.').map(|(class, _)| class)
}

/// Rewrite the `<class><splitter>...` prefix of a name through `map`.
/// Full-name entries take precedence over plain class renames.
fn check_and_do_api_mapping(
    name: &str,
    splitter: char,
    map: &HashMap<&'static str, &'static str>,
) -> String {
    let Some((class_name, rest)) = name.split_once(splitter) else {
        return name.to_string();
    };
    let Some(mapped_class) = map.get(class_name) else {
        return name.to_string();
    };
    if let Some(full) = map.get(name) {
        (*full).to_string()
    } else {
        format!("{mapped_class}{splitter}{rest}")
    }
}
