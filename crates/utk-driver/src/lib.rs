// SPDX-License-Identifier: MIT OR Apache-2.0
//! Driver collaborator interfaces.
//!
//! The frontend api server consumes widget discovery, gesture synthesis,
//! and display control exclusively through the traits in this crate; the
//! concrete implementations live in the device's automation daemon. The
//! widget, window, and event value model is defined here so selectors and
//! handlers can be exercised against the [`mock`] driver in tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod driver;
pub mod event;
#[cfg(feature = "mock")]
pub mod mock;
pub mod model;
pub mod options;
pub mod selector;

pub use driver::{Clipboard, UiDriver};
pub use event::{EventOptions, UiEventListener, UiEventSourceInfo};
pub use model::{
    DisplayRotation, MatchPattern, Point, PointerMatrix, Rect, UNASSIGNED_DISPLAY, UiAttr, Widget,
    WidgetMatchModel, Window,
};
pub use options::{Direction, KeyAction, MouseButton, TouchOp, UiOpArgs, WindowAction};
pub use selector::WidgetSelector;
