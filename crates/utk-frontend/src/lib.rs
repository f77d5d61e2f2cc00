// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frontend api server.
//!
//! Binds textual api identifiers to handler closures, enforces the
//! declarative signature catalog before any handler body runs, maps legacy
//! names and error codes at the dispatch boundary, and forwards driver UI
//! events to the client as one-shot observer upcalls.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod args;
pub mod catalog;
pub mod checker;
pub mod handlers;
pub mod objects;
pub mod observer;
pub mod server;

use std::sync::Arc;

pub use handlers::register_all;
pub use objects::{
    ApiContext, ComponentObject, DriverObject, MatrixObject, ObserverObject, SelectorObject,
    WindowObject,
};
pub use observer::UiEventForwarder;
pub use server::{ApiInvokeHandler, FrontendApiServer};

/// Build a fully wired api server: every handler family registered and the
/// argument checker installed as the first preprocessor.
///
/// The caller owns the context and forwarder; wire the forwarder's callback
/// sink to the reverse transactor before serving.
#[must_use]
pub fn build_api_server(ctx: &Arc<ApiContext>, forwarder: &Arc<UiEventForwarder>) -> FrontendApiServer {
    let mut server = FrontendApiServer::new();
    handlers::register_all(&mut server, ctx, forwarder);
    let checker =
        checker::api_call_info_checker(server.catalog().clone(), Arc::clone(&ctx.registry));
    server.add_common_preprocessor("ApiCallInfoChecker", checker);
    server
}
