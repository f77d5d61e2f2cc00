// SPDX-License-Identifier: MIT OR Apache-2.0
//! An in-memory driver for exercising handlers without a device.
//!
//! Widgets and windows are scripted by the test; every injected operation
//! is recorded for assertions. Events pushed through
//! [`MockDriver::emit_event`] reach the registered listener exactly like
//! driver-thread dispatch would.

use crate::driver::{Clipboard, UiDriver};
use crate::event::{UiEventListener, UiEventSourceInfo};
use crate::model::{DisplayRotation, Point, Rect, Widget, Window};
use crate::options::{KeyAction, TouchOp, UiOpArgs, WindowAction};
use crate::selector::WidgetSelector;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use utk_error::{ApiError, ErrCode};

/// Bytes the mock writes on screen capture.
pub const SCREEN_CAP_BYTES: &[u8] = b"MOCK_SCREEN_CAP";

/// One recorded driver operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOp {
    /// A touch-class injection.
    Touch(TouchOp),
    /// A key-class injection.
    Key(KeyAction),
    /// Text input.
    Text {
        /// The typed text.
        text: String,
        /// Target display.
        display_id: i32,
    },
    /// A screen capture.
    ScreenCap {
        /// Target display.
        display_id: i32,
    },
    /// A window-management action.
    Window {
        /// Target window.
        id: i32,
        /// The action applied.
        action: WindowAction,
    },
    /// A display rotation change.
    Rotation(DisplayRotation),
}

/// Scripted in-memory driver.
pub struct MockDriver {
    widgets: Mutex<Vec<Widget>>,
    windows: Mutex<Vec<Window>>,
    operations: Mutex<Vec<RecordedOp>>,
    listener: Mutex<Option<Arc<dyn UiEventListener>>>,
    observer_enabled: AtomicBool,
    rotation: Mutex<DisplayRotation>,
    display_size: Point,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// A driver with a 720×1280 display and no scripted content.
    #[must_use]
    pub fn new() -> Self {
        Self {
            widgets: Mutex::new(Vec::new()),
            windows: Mutex::new(Vec::new()),
            operations: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
            observer_enabled: AtomicBool::new(true),
            rotation: Mutex::new(DisplayRotation::Rotation0),
            display_size: Point::new(720, 1280),
        }
    }

    /// Script the widgets finders will see.
    pub fn set_widgets(&self, widgets: Vec<Widget>) {
        *self.widgets.lock().unwrap() = widgets;
    }

    /// Script the windows `findWindow` will see.
    pub fn set_windows(&self, windows: Vec<Window>) {
        *self.windows.lock().unwrap() = windows;
    }

    /// Disable or re-enable event observation.
    pub fn set_observer_enabled(&self, enabled: bool) {
        self.observer_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Everything injected so far, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<RecordedOp> {
        self.operations.lock().unwrap().clone()
    }

    /// `true` once a UI event listener is installed.
    #[must_use]
    pub fn has_listener(&self) -> bool {
        self.listener.lock().unwrap().is_some()
    }

    /// Dispatch one event to the registered listener, as the driver's event
    /// thread would.
    pub fn emit_event(&self, event: &str, source: &UiEventSourceInfo, widget: Option<&Widget>) {
        let listener = self.listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            listener.on_event(event, source, widget);
        }
    }

    fn record(&self, op: RecordedOp) {
        self.operations.lock().unwrap().push(op);
    }
}

impl UiDriver for MockDriver {
    fn find_widgets(&self, selector: &WidgetSelector) -> Result<Vec<Widget>, ApiError> {
        let widgets = self.widgets.lock().unwrap();
        let mut found: Vec<Widget> = widgets
            .iter()
            .filter(|widget| selector.matches_self(widget))
            .cloned()
            .collect();
        if !selector.is_want_multi() {
            found.truncate(1);
        }
        Ok(found)
    }

    fn wait_for_widget(
        &self,
        selector: &WidgetSelector,
        _timeout_ms: u32,
    ) -> Result<Option<Widget>, ApiError> {
        Ok(self.find_widgets(selector)?.into_iter().next())
    }

    fn retrieve_widget(&self, widget: &Widget) -> Result<Widget, ApiError> {
        let widgets = self.widgets.lock().unwrap();
        widgets
            .iter()
            .find(|live| live.hierarchy == widget.hierarchy)
            .cloned()
            .ok_or_else(|| {
                ApiError::with_message(
                    ErrCode::ComponentLost,
                    format!("Component dead: {}", widget.hierarchy),
                )
            })
    }

    fn find_window(&self, filter: &dyn Fn(&Window) -> bool) -> Result<Option<Window>, ApiError> {
        let windows = self.windows.lock().unwrap();
        Ok(windows.iter().find(|window| filter(window)).cloned())
    }

    fn retrieve_window(&self, window: &Window) -> Result<Window, ApiError> {
        let windows = self.windows.lock().unwrap();
        windows
            .iter()
            .find(|live| live.id == window.id)
            .cloned()
            .ok_or_else(|| {
                ApiError::with_message(ErrCode::WindowLost, format!("Window dead: {}", window.id))
            })
    }

    fn perform_touch(&self, op: &TouchOp, _args: &UiOpArgs) -> Result<(), ApiError> {
        self.record(RecordedOp::Touch(op.clone()));
        Ok(())
    }

    fn perform_key(&self, key: &KeyAction, _args: &UiOpArgs) -> Result<(), ApiError> {
        self.record(RecordedOp::Key(key.clone()));
        Ok(())
    }

    fn input_text(&self, text: &str, display_id: i32, _args: &UiOpArgs) -> Result<(), ApiError> {
        self.record(RecordedOp::Text {
            text: text.to_string(),
            display_id,
        });
        Ok(())
    }

    #[allow(unsafe_code)]
    fn take_screen_cap(
        &self,
        fd: RawFd,
        _rect: Option<Rect>,
        display_id: i32,
    ) -> Result<(), ApiError> {
        // SAFETY: the transactor hands over a live descriptor it owns for
        // the duration of the call.
        let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
        nix::unistd::write(borrowed, SCREEN_CAP_BYTES)
            .map_err(|err| ApiError::with_message(ErrCode::Internal, err.to_string()))?;
        self.record(RecordedOp::ScreenCap { display_id });
        Ok(())
    }

    fn display_size(&self, _display_id: i32) -> Result<Point, ApiError> {
        Ok(self.display_size)
    }

    fn display_density(&self, _display_id: i32) -> Result<Point, ApiError> {
        Ok(Point::new(320, 320))
    }

    fn display_rotation(&self) -> Result<DisplayRotation, ApiError> {
        Ok(*self.rotation.lock().unwrap())
    }

    fn set_display_rotation(&self, rotation: DisplayRotation) -> Result<(), ApiError> {
        *self.rotation.lock().unwrap() = rotation;
        self.record(RecordedOp::Rotation(rotation));
        Ok(())
    }

    fn wake_up_display(&self) -> Result<(), ApiError> {
        Ok(())
    }

    fn wait_for_ui_steady(&self, _idle_ms: u32, _timeout_ms: u32) -> Result<(), ApiError> {
        Ok(())
    }

    fn change_window_mode(&self, window_id: i32, action: WindowAction) -> Result<(), ApiError> {
        self.record(RecordedOp::Window {
            id: window_id,
            action,
        });
        Ok(())
    }

    fn register_ui_event_listener(&self, listener: Arc<dyn UiEventListener>) {
        *self.listener.lock().unwrap() = Some(listener);
    }

    fn event_observer_enabled(&self) -> bool {
        self.observer_enabled.load(Ordering::Relaxed)
    }
}

/// Clipboard stub recording the pasted text.
#[derive(Default)]
pub struct MockClipboard {
    content: Mutex<String>,
}

impl MockClipboard {
    /// An empty clipboard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last pasted text.
    #[must_use]
    pub fn content(&self) -> String {
        self.content.lock().unwrap().clone()
    }
}

impl Clipboard for MockClipboard {
    fn set_paste_data(&self, text: &str) -> Result<(), ApiError> {
        *self.content.lock().unwrap() = text.to_string();
        Ok(())
    }
}
