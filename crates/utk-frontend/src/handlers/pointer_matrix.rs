// SPDX-License-Identifier: MIT OR Apache-2.0
//! Multi-pointer matrix handlers.

use crate::args::{read_point, read_uint};
use crate::objects::{ApiContext, MatrixObject};
use crate::server::FrontendApiServer;
use serde_json::json;
use std::sync::Arc;
use utk_driver::PointerMatrix;

/// Register `PointerMatrix.create` and `PointerMatrix.setPoint`.
pub fn register(server: &mut FrontendApiServer, ctx: &Arc<ApiContext>) {
    let create_ctx = Arc::clone(ctx);
    server.add_handler(
        "PointerMatrix.create",
        Arc::new(move |call, out| {
            let built = read_uint(call, 0)
                .and_then(|fingers| Ok((fingers, read_uint(call, 1)?)))
                .and_then(|(fingers, steps)| PointerMatrix::new(fingers, steps));
            match built {
                Ok(matrix) => {
                    let mut registry = create_ctx.registry.lock().expect("registry lock");
                    out.result_value = json!(registry.store(Box::new(MatrixObject(matrix)), None));
                }
                Err(err) => out.exception = err,
            }
        }),
    );

    let set_ctx = Arc::clone(ctx);
    server.add_handler(
        "PointerMatrix.setPoint",
        Arc::new(move |call, out| {
            let result = (|| {
                let finger = read_uint(call, 0)?;
                let step = read_uint(call, 1)?;
                let point = read_point(call, 2)?;
                let mut registry = set_ctx.registry.lock().expect("registry lock");
                let matrix = registry.resolve_mut::<MatrixObject>(&call.caller_obj_ref)?;
                matrix.0.set_point(finger, step, point)
            })();
            if let Err(err) = result {
                out.exception = err;
            }
        }),
    );
}
