// SPDX-License-Identifier: MIT OR Apache-2.0
//! uitest-kit: the RPC transactor core of a UI-automation test runtime.
//!
//! The workspace crates are re-exported here under short module names:
//!
//! - [`error`]: error taxonomy with stable wire codes
//! - [`proto`]: call/reply data model and wire codec
//! - [`bus`]: topic-addressed event bus for discovery and broadcasts
//! - [`transport`]: message transceivers, including the shared-memory
//!   fallback
//! - [`transactor`]: transactor endpoints and the broadcast command channel
//! - [`registry`]: handle registry and the client-side GC batcher
//! - [`driver`]: driver collaborator interfaces and the widget model
//! - [`frontend`]: the frontend api server
//!
//! A process root wires a server like this: build an
//! [`frontend::ApiContext`] over the device driver, call
//! [`frontend::build_api_server`], hand the server's `call` as the handler
//! to a [`transactor::ApiTransactor`], and point the event forwarder's
//! callback sink at the reverse transactor.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use utk_bus as bus;
pub use utk_driver as driver;
pub use utk_error as error;
pub use utk_frontend as frontend;
pub use utk_proto as proto;
pub use utk_registry as registry;
pub use utk_transactor as transactor;
pub use utk_transport as transport;
