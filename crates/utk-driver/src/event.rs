// SPDX-License-Identifier: MIT OR Apache-2.0
//! UI event sources and observer registration options.

use crate::model::{Rect, WidgetMatchModel};
use serde::{Deserialize, Serialize};

/// UI event kind key for window changes.
pub const EVENT_WINDOW_CHANGE: &str = "windowChange";
/// UI event kind key for component events.
pub const EVENT_COMPONENT_EVENT: &str = "componentEventOccur";
/// UI event kind key for toast appearance.
pub const EVENT_TOAST_SHOW: &str = "toastShow";
/// UI event kind key for dialog appearance.
pub const EVENT_DIALOG_SHOW: &str = "dialogShow";

/// Source information of one UI event, packed into the upcall payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiEventSourceInfo {
    /// Owning application bundle.
    pub bundle_name: String,
    /// Component/window type tag.
    #[serde(rename = "type")]
    pub ty: String,
    /// Display text of the source.
    pub text: String,
    /// Window-change kind, 0 when not a window event.
    pub window_change_type: i32,
    /// Component-event kind, 0 when not a component event.
    pub component_event_type: i32,
    /// Source window id.
    pub window_id: i32,
    /// Source component id.
    pub component_id: i32,
    /// Bounds of the source component.
    pub component_rect: Rect,
}

/// Filters and lifetime of one observer registration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOptions {
    /// Registration instant on the dispatcher's millisecond clock.
    pub register_time: u64,
    /// Lifetime in milliseconds; 0 keeps the registration until it fires.
    pub timeout: u64,
    /// Required window-change kind, 0 accepts all.
    pub window_type: i32,
    /// Required component-event kind, 0 accepts all.
    pub component_type: i32,
    /// Required source bundle, `None` accepts all.
    pub bundle_name: Option<String>,
    /// Widget matchers applied to the source component.
    pub self_matchers: Vec<WidgetMatchModel>,
}

impl EventOptions {
    /// `true` once `now` lies beyond the registration's lifetime.
    #[must_use]
    pub fn expired(&self, now: u64) -> bool {
        self.timeout > 0 && now > self.register_time + self.timeout
    }
}

/// Receiver of driver UI events.
pub trait UiEventListener: Send + Sync {
    /// Deliver one event with its source description and, for component
    /// events, the source widget.
    fn on_event(
        &self,
        event: &str,
        source: &UiEventSourceInfo,
        widget: Option<&crate::model::Widget>,
    );
}
