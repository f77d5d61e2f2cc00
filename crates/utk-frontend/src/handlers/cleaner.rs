// SPDX-License-Identifier: MIT OR Apache-2.0
//! The backend-objects cleaner: the server half of client-driven GC.

use crate::objects::ApiContext;
use crate::server::FrontendApiServer;
use serde_json::Value;
use std::sync::Arc;

/// Internal api id of the batched object cleaner.
pub const API_BACKEND_OBJECTS_CLEANER: &str = "BackendObjectsCleaner";

/// Register the cleaner. Each parameter is a handle reference to drop;
/// references that already vanished are ignored.
pub fn register(server: &mut FrontendApiServer, ctx: &Arc<ApiContext>) {
    let ctx = Arc::clone(ctx);
    server.add_handler(
        API_BACKEND_OBJECTS_CLEANER,
        Arc::new(move |call, _out| {
            let references: Vec<&str> =
                call.param_list.iter().filter_map(Value::as_str).collect();
            ctx.registry
                .lock()
                .expect("registry lock")
                .drop_refs(references);
        }),
    );
}
