// SPDX-License-Identifier: MIT OR Apache-2.0
//! The driver capability consumed by the frontend api server.

use crate::event::UiEventListener;
use crate::model::{DisplayRotation, Point, Rect, Widget, Window};
use crate::options::{KeyAction, TouchOp, UiOpArgs, WindowAction};
use crate::selector::WidgetSelector;
use std::os::fd::RawFd;
use std::sync::Arc;
use utk_error::ApiError;

/// Widget discovery, gesture synthesis, and display control, as provided by
/// the device's automation daemon. All methods surface domain failures as
/// [`ApiError`] so handlers can forward them unchanged.
pub trait UiDriver: Send + Sync {
    /// Collect the widgets matching `selector`, honoring its want-multi
    /// flag.
    fn find_widgets(&self, selector: &WidgetSelector) -> Result<Vec<Widget>, ApiError>;

    /// Poll for a match until `timeout_ms` elapses.
    fn wait_for_widget(
        &self,
        selector: &WidgetSelector,
        timeout_ms: u32,
    ) -> Result<Option<Widget>, ApiError>;

    /// Refresh a previously found widget; `ComponentLost` when it is gone.
    fn retrieve_widget(&self, widget: &Widget) -> Result<Widget, ApiError>;

    /// Find the first window accepted by `filter`.
    fn find_window(&self, filter: &dyn Fn(&Window) -> bool) -> Result<Option<Window>, ApiError>;

    /// Refresh a previously found window; `WindowLost` when it is gone.
    fn retrieve_window(&self, window: &Window) -> Result<Window, ApiError>;

    /// Inject one touch-class operation.
    fn perform_touch(&self, op: &TouchOp, args: &UiOpArgs) -> Result<(), ApiError>;

    /// Inject one key-class operation.
    fn perform_key(&self, key: &KeyAction, args: &UiOpArgs) -> Result<(), ApiError>;

    /// Type text into the focused component of a display.
    fn input_text(&self, text: &str, display_id: i32, args: &UiOpArgs) -> Result<(), ApiError>;

    /// Capture a display (optionally cropped) into the open descriptor.
    fn take_screen_cap(&self, fd: RawFd, rect: Option<Rect>, display_id: i32)
    -> Result<(), ApiError>;

    /// Size of a display in pixels.
    fn display_size(&self, display_id: i32) -> Result<Point, ApiError>;

    /// Pixel density of a display.
    fn display_density(&self, display_id: i32) -> Result<Point, ApiError>;

    /// Rotation of the default display.
    fn display_rotation(&self) -> Result<DisplayRotation, ApiError>;

    /// Rotate the default display.
    fn set_display_rotation(&self, rotation: DisplayRotation) -> Result<(), ApiError>;

    /// Wake the default display.
    fn wake_up_display(&self) -> Result<(), ApiError>;

    /// Block until the UI stays idle for `idle_ms`, at most `timeout_ms`.
    fn wait_for_ui_steady(&self, idle_ms: u32, timeout_ms: u32) -> Result<(), ApiError>;

    /// Apply a window-management action.
    fn change_window_mode(&self, window_id: i32, action: WindowAction) -> Result<(), ApiError>;

    /// Install the process-wide UI event listener.
    fn register_ui_event_listener(&self, listener: Arc<dyn UiEventListener>);

    /// Whether event observation is available on this device.
    fn event_observer_enabled(&self) -> bool;
}

/// The clipboard capability used for long-text input.
pub trait Clipboard: Send + Sync {
    /// Replace the clipboard content.
    fn set_paste_data(&self, text: &str) -> Result<(), ApiError>;
}
