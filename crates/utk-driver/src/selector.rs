// SPDX-License-Identifier: MIT OR Apache-2.0
//! Widget selectors: self matchers plus relative locators.

use crate::model::{UNASSIGNED_DISPLAY, Widget, WidgetMatchModel};
use utk_error::{ApiError, ErrCode};

const NEST_USAGE_ERROR: &str =
    "Nesting usage like 'ON.isBefore(ON.isAfter(...))' is not supported";

/// A widget selection: the attribute matchers the target itself must pass,
/// plus relative locators anchoring it against other widgets, the hosting
/// application, and the display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetSelector {
    self_matchers: Vec<WidgetMatchModel>,
    front_locators: Vec<WidgetSelector>,
    rear_locators: Vec<WidgetSelector>,
    parent_locators: Vec<WidgetSelector>,
    app_locator: Option<String>,
    display_locator: Option<i32>,
    want_multi: bool,
}

impl WidgetSelector {
    /// An empty selector matching everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn has_locators(&self) -> bool {
        !self.front_locators.is_empty()
            || !self.rear_locators.is_empty()
            || !self.parent_locators.is_empty()
    }

    fn check_nesting(anchor: &WidgetSelector) -> Result<(), ApiError> {
        if anchor.has_locators() {
            return Err(ApiError::with_message(ErrCode::InvalidInput, NEST_USAGE_ERROR));
        }
        Ok(())
    }

    /// Append one attribute matcher.
    pub fn add_matcher(&mut self, matcher: WidgetMatchModel) {
        self.self_matchers.push(matcher);
    }

    /// Anchor: the target appears after a widget matching `anchor`
    /// (`isAfter`). The anchor itself must carry no locators.
    pub fn add_front_locator(&mut self, anchor: WidgetSelector) -> Result<(), ApiError> {
        Self::check_nesting(&anchor)?;
        self.front_locators.push(anchor);
        Ok(())
    }

    /// Anchor: the target appears before a widget matching `anchor`
    /// (`isBefore`).
    pub fn add_rear_locator(&mut self, anchor: WidgetSelector) -> Result<(), ApiError> {
        Self::check_nesting(&anchor)?;
        self.rear_locators.push(anchor);
        Ok(())
    }

    /// Anchor: the target is a descendant of a widget matching `anchor`
    /// (`within`).
    pub fn add_parent_locator(&mut self, anchor: WidgetSelector) -> Result<(), ApiError> {
        Self::check_nesting(&anchor)?;
        self.parent_locators.push(anchor);
        Ok(())
    }

    /// Restrict the search to windows of the given application
    /// (`inWindow`).
    pub fn add_app_locator(&mut self, bundle_name: impl Into<String>) {
        self.app_locator = Some(bundle_name.into());
    }

    /// Restrict the search to one display (`inDisplay`).
    pub fn add_display_locator(&mut self, display_id: i32) {
        self.display_locator = Some(display_id);
    }

    /// Whether finders should collect all matches or stop at the first.
    pub fn set_want_multi(&mut self, want_multi: bool) {
        self.want_multi = want_multi;
    }

    /// `true` when all matches are wanted.
    #[must_use]
    pub const fn is_want_multi(&self) -> bool {
        self.want_multi
    }

    /// The target's own attribute matchers, in insertion order.
    #[must_use]
    pub fn self_matchers(&self) -> &[WidgetMatchModel] {
        &self.self_matchers
    }

    /// The application restriction, if any.
    #[must_use]
    pub fn app_locator(&self) -> Option<&str> {
        self.app_locator.as_deref()
    }

    /// The display restriction, or [`UNASSIGNED_DISPLAY`].
    #[must_use]
    pub fn display_locator(&self) -> i32 {
        self.display_locator.unwrap_or(UNASSIGNED_DISPLAY)
    }

    /// Check a widget against the self matchers and display restriction.
    /// Relative locators need tree context and are evaluated by the driver.
    #[must_use]
    pub fn matches_self(&self, widget: &Widget) -> bool {
        if let Some(display) = self.display_locator {
            if widget.display_id() != display && widget.display_id() != UNASSIGNED_DISPLAY {
                return false;
            }
        }
        widget.matches_all(&self.self_matchers)
    }

    /// Render the full selection for error messages, e.g.
    /// `{selfMatcher=[$text equals 'OK',]; frontMatcher=[{...}]}`.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::from("{selfMatcher=[");
        for matcher in &self.self_matchers {
            out.push_str(&matcher.describe());
            out.push(',');
        }
        out.push(']');
        for (label, locators) in [
            ("frontMatcher", &self.front_locators),
            ("rearMatcher", &self.rear_locators),
            ("parentMatcher", &self.parent_locators),
        ] {
            if !locators.is_empty() {
                out.push_str("; ");
                out.push_str(label);
                out.push('=');
                for locator in locators {
                    out.push('[');
                    out.push_str(&locator.describe());
                    out.push(']');
                }
            }
        }
        if let Some(app) = &self.app_locator {
            out.push_str("; app=");
            out.push_str(app);
        }
        out.push('}');
        out
    }
}
