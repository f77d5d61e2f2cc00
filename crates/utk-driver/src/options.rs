// SPDX-License-Identifier: MIT OR Apache-2.0
//! Operation arguments and the touch/key operation model.

use crate::model::{Point, PointerMatrix, Rect};
use serde::{Deserialize, Serialize};

/// Tunables of one UI operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiOpArgs {
    /// Hold duration of a long click. Never below 1500.
    pub long_click_hold_ms: u32,
    /// Press duration of a plain click.
    pub click_hold_ms: u32,
    /// Interval between the taps of a double click.
    pub double_click_interval_ms: u32,
    /// Swipe velocity in pixels per second.
    pub swipe_velocity_pps: u32,
    /// Lower velocity bound.
    pub min_swipe_velocity_pps: u32,
    /// Upper velocity bound.
    pub max_swipe_velocity_pps: u32,
    /// Velocity used when a caller-supplied value is out of range.
    pub default_velocity_pps: u32,
    /// Maximum wait of `waitForComponent`.
    pub wait_widget_max_ms: u32,
    /// Idle interval between injected steps.
    pub ui_steady_threshold_ms: u32,
}

impl Default for UiOpArgs {
    fn default() -> Self {
        Self {
            long_click_hold_ms: 1500,
            click_hold_ms: 100,
            double_click_interval_ms: 200,
            swipe_velocity_pps: 600,
            min_swipe_velocity_pps: 200,
            max_swipe_velocity_pps: 40000,
            default_velocity_pps: 600,
            wait_widget_max_ms: 5000,
            ui_steady_threshold_ms: 1000,
        }
    }
}

impl UiOpArgs {
    /// Clamp the swipe velocity into its bounds, falling back to the
    /// default when out of range.
    pub fn check_swipe_velocity(&mut self) {
        if self.swipe_velocity_pps < self.min_swipe_velocity_pps
            || self.swipe_velocity_pps > self.max_swipe_velocity_pps
        {
            tracing::warn!(
                velocity = self.swipe_velocity_pps,
                "swipe velocity out of range, using default"
            );
            self.swipe_velocity_pps = self.default_velocity_pps;
        }
    }
}

/// Swipe/scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// Leftwards.
    Left = 0,
    /// Rightwards.
    Right = 1,
    /// Upwards.
    Up = 2,
    /// Downwards.
    Down = 3,
}

impl Direction {
    /// Decode a wire value.
    #[must_use]
    pub const fn from_value(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Left,
            1 => Self::Right,
            2 => Self::Up,
            3 => Self::Down,
            _ => return None,
        })
    }
}

/// Mouse buttons addressable from the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MouseButton {
    /// Left button.
    Left = 0,
    /// Right button.
    Right = 1,
    /// Middle button.
    Middle = 2,
}

impl MouseButton {
    /// Decode a wire value.
    #[must_use]
    pub const fn from_value(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Left,
            1 => Self::Right,
            2 => Self::Middle,
            _ => return None,
        })
    }
}

/// One touch-class operation handed to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchOp {
    /// Single tap.
    Click(Point),
    /// Press and hold.
    LongClick(Point),
    /// Two quick taps.
    DoubleClick(Point),
    /// Velocity-controlled swipe.
    Swipe {
        /// Start point.
        from: Point,
        /// End point.
        to: Point,
    },
    /// Press, move, release.
    Drag {
        /// Start point.
        from: Point,
        /// End point.
        to: Point,
    },
    /// Inertial fling.
    Fling {
        /// Start point.
        from: Point,
        /// End point.
        to: Point,
        /// Step length in pixels.
        step_len: u32,
    },
    /// Directional fling over the whole display.
    FlingDirection(Direction),
    /// Scroll the area to its top or bottom edge.
    ScrollToEnd {
        /// Scrollable area.
        area: Rect,
        /// `true` scrolls to the top, `false` to the bottom.
        to_top: bool,
    },
    /// Two-finger pinch inside an area; scale > 1 zooms in.
    Pinch {
        /// Pinched area.
        area: Rect,
        /// Scale factor.
        scale: f32,
    },
    /// Scripted multi-pointer injection.
    MultiPointer(PointerMatrix),
    /// Multi-finger touchpad swipe.
    TouchPadMultiFingerSwipe {
        /// Finger count.
        fingers: u32,
        /// Swipe direction.
        direction: Direction,
        /// Whether to wait for the transition animation.
        stay: bool,
        /// Swipe speed.
        speed: u32,
    },
    /// Mouse click with modifier keys held.
    MouseClick {
        /// Click position.
        point: Point,
        /// Button pressed.
        button: MouseButton,
        /// First held key code, 0 for none.
        key1: i32,
        /// Second held key code, 0 for none.
        key2: i32,
    },
    /// Mouse press-and-hold.
    MouseLongClick {
        /// Click position.
        point: Point,
        /// Button pressed.
        button: MouseButton,
        /// First held key code.
        key1: i32,
        /// Second held key code.
        key2: i32,
    },
    /// Mouse double click.
    MouseDoubleClick {
        /// Click position.
        point: Point,
        /// Button pressed.
        button: MouseButton,
        /// First held key code.
        key1: i32,
        /// Second held key code.
        key2: i32,
    },
    /// Move the pointer.
    MouseMoveTo(Point),
    /// Mouse wheel scroll.
    MouseScroll {
        /// Scroll position.
        point: Point,
        /// Wheel ticks.
        amount: i32,
        /// `true` scrolls downwards.
        down: bool,
        /// First held key code.
        key1: i32,
        /// Second held key code.
        key2: i32,
    },
    /// Stylus tap.
    PenClick(Point),
    /// Stylus press-and-hold.
    PenLongClick {
        /// Click position.
        point: Point,
        /// Pen pressure.
        pressure: f32,
    },
    /// Stylus double tap.
    PenDoubleClick(Point),
    /// Stylus swipe.
    PenSwipe {
        /// Start point.
        from: Point,
        /// End point.
        to: Point,
        /// Pen pressure.
        pressure: f32,
    },
}

/// One key-class operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// The back key.
    Back,
    /// The home key.
    Home,
    /// A single key code.
    Code(i32),
    /// Two or three key codes pressed together.
    Combine(Vec<i32>),
}

/// One window-management operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowAction {
    /// Bring the window to focus.
    Focus,
    /// Move the window so its top-left corner lands on the point.
    MoveTo(Point),
    /// Resize towards a corner/edge.
    Resize {
        /// New width.
        width: u32,
        /// New height.
        height: u32,
        /// Corner or edge being dragged.
        direction: Direction,
    },
    /// Enter split-screen mode.
    Split,
    /// Maximize.
    Maximize,
    /// Minimize.
    Minimize,
    /// Restore from maximized/minimized.
    Resume,
    /// Close the window.
    Close,
}
