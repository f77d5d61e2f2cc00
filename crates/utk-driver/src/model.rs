// SPDX-License-Identifier: MIT OR Apache-2.0
//! Widget, window, and geometry value types.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utk_error::{ApiError, ErrCode};

/// Display marker for "no display specified".
pub const UNASSIGNED_DISPLAY: i32 = -1;

/// A point on a display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// Hosting display, or [`UNASSIGNED_DISPLAY`].
    #[serde(default = "unassigned")]
    pub display_id: i32,
}

fn unassigned() -> i32 {
    UNASSIGNED_DISPLAY
}

impl Point {
    /// A point on the unassigned display.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            display_id: UNASSIGNED_DISPLAY,
        }
    }

    /// A point on a specific display.
    #[must_use]
    pub const fn on_display(x: i32, y: i32, display_id: i32) -> Self {
        Self { x, y, display_id }
    }
}

/// A rectangle area on a display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    /// Left edge.
    pub left: i32,
    /// Right edge.
    pub right: i32,
    /// Top edge.
    pub top: i32,
    /// Bottom edge.
    pub bottom: i32,
    /// Hosting display.
    #[serde(default = "unassigned")]
    pub display_id: i32,
}

impl Rect {
    /// A rectangle on the unassigned display.
    #[must_use]
    pub const fn new(left: i32, right: i32, top: i32, bottom: i32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
            display_id: UNASSIGNED_DISPLAY,
        }
    }

    /// Horizontal center.
    #[must_use]
    pub const fn center_x(&self) -> i32 {
        (self.left + self.right) / 2
    }

    /// Vertical center.
    #[must_use]
    pub const fn center_y(&self) -> i32 {
        (self.top + self.bottom) / 2
    }

    /// Center point, on the rectangle's display.
    #[must_use]
    pub const fn center(&self) -> Point {
        Point::on_display(self.center_x(), self.center_y(), self.display_id)
    }
}

/// Widget attributes addressable from selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiAttr {
    /// Accessibility id assigned by the UI framework.
    AccessibilityId,
    /// Developer-assigned id.
    Id,
    /// Display text.
    Text,
    /// Component type name.
    Type,
    /// Input placeholder hint.
    Hint,
    /// Accessibility description.
    Description,
    /// Original (untruncated) text.
    OriginalText,
    /// Enabled state.
    Enabled,
    /// Focus state.
    Focused,
    /// Selection state.
    Selected,
    /// Clickability.
    Clickable,
    /// Long-clickability.
    LongClickable,
    /// Scrollability.
    Scrollable,
    /// Checkability.
    Checkable,
    /// Checked state.
    Checked,
    /// Visibility, matched implicitly.
    Visible,
    /// Bounds rectangle.
    Bounds,
}

impl UiAttr {
    /// Attribute name as stored on widgets.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AccessibilityId => "accessibilityId",
            Self::Id => "id",
            Self::Text => "text",
            Self::Type => "type",
            Self::Hint => "hint",
            Self::Description => "description",
            Self::OriginalText => "originalText",
            Self::Enabled => "enabled",
            Self::Focused => "focused",
            Self::Selected => "selected",
            Self::Clickable => "clickable",
            Self::LongClickable => "longClickable",
            Self::Scrollable => "scrollable",
            Self::Checkable => "checkable",
            Self::Checked => "checked",
            Self::Visible => "visible",
            Self::Bounds => "bounds",
        }
    }
}

/// String match rule of one attribute matcher. Values are the wire encoding
/// used in selector-builder parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum MatchPattern {
    /// Exact equality.
    #[default]
    Equals = 0,
    /// Substring containment.
    Contains = 1,
    /// Prefix match.
    StartsWith = 2,
    /// Suffix match.
    EndsWith = 3,
    /// Regular-expression match.
    RegExp = 4,
    /// Case-insensitive regular-expression match.
    RegExpIgnoreCase = 5,
}

impl MatchPattern {
    /// Decode a wire value.
    #[must_use]
    pub const fn from_value(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Equals,
            1 => Self::Contains,
            2 => Self::StartsWith,
            3 => Self::EndsWith,
            4 => Self::RegExp,
            5 => Self::RegExpIgnoreCase,
            _ => return None,
        })
    }

    /// Readable rule name used in selection descriptions.
    #[must_use]
    pub const fn rule_name(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::RegExp => "matchesRegExp",
            Self::RegExpIgnoreCase => "matchesRegExpIgnoreCase",
        }
    }
}

/// One attribute matcher `(attribute, testValue, pattern)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetMatchModel {
    /// Attribute under test.
    pub attr: UiAttr,
    /// Expected value in string form.
    pub value: String,
    /// Match rule.
    pub pattern: MatchPattern,
}

impl WidgetMatchModel {
    /// A matcher for the given attribute, value, and rule.
    pub fn new(attr: UiAttr, value: impl Into<String>, pattern: MatchPattern) -> Self {
        Self {
            attr,
            value: value.into(),
            pattern,
        }
    }

    /// Apply the rule to an actual attribute value.
    #[must_use]
    pub fn matches_value(&self, actual: &str) -> bool {
        match self.pattern {
            MatchPattern::Equals => actual == self.value,
            MatchPattern::Contains => actual.contains(&self.value),
            MatchPattern::StartsWith => actual.starts_with(&self.value),
            MatchPattern::EndsWith => actual.ends_with(&self.value),
            MatchPattern::RegExp | MatchPattern::RegExpIgnoreCase => {
                RegexBuilder::new(&self.value)
                    .case_insensitive(self.pattern == MatchPattern::RegExpIgnoreCase)
                    .build()
                    .is_ok_and(|regex| regex.is_match(actual))
            }
        }
    }

    /// Render this matcher for selection descriptions,
    /// e.g. `$text equals 'OK'`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "${} {} '{}'",
            self.attr.name(),
            self.pattern.rule_name(),
            self.value
        )
    }
}

/// One widget snapshot: an attribute map plus bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Widget {
    /// Position of the node in its host tree.
    pub hierarchy: String,
    attributes: BTreeMap<String, String>,
    bounds: Rect,
}

impl Widget {
    /// A widget at the given hierarchy with no attributes.
    pub fn new(hierarchy: impl Into<String>) -> Self {
        Self {
            hierarchy: hierarchy.into(),
            attributes: BTreeMap::new(),
            bounds: Rect::default(),
        }
    }

    /// Read an attribute, with a default for absent ones.
    #[must_use]
    pub fn attr(&self, attr: UiAttr, default: &str) -> String {
        self.attributes
            .get(attr.name())
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Set an attribute.
    pub fn set_attr(&mut self, attr: UiAttr, value: impl Into<String>) {
        self.attributes.insert(attr.name().to_string(), value.into());
    }

    /// Builder-style attribute.
    #[must_use]
    pub fn with_attr(mut self, attr: UiAttr, value: impl Into<String>) -> Self {
        self.set_attr(attr, value);
        self
    }

    /// Bounds rectangle.
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Set the bounds rectangle.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    /// Builder-style bounds.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    /// Hosting display of this widget.
    #[must_use]
    pub const fn display_id(&self) -> i32 {
        self.bounds.display_id
    }

    /// `true` when every matcher accepts this widget.
    #[must_use]
    pub fn matches_all(&self, matchers: &[WidgetMatchModel]) -> bool {
        matchers
            .iter()
            .all(|matcher| matcher.matches_value(&self.attr(matcher.attr, "")))
    }
}

/// One window snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    /// Window identifier.
    pub id: i32,
    /// Owning application bundle.
    pub bundle_name: String,
    /// Window title.
    pub title: String,
    /// Focus state.
    pub focused: bool,
    /// Active state.
    pub active: bool,
    /// Hosting display.
    pub display_id: i32,
    /// Window bounds.
    pub bounds: Rect,
    /// Current window mode tag (fullscreen, split, floating...).
    pub mode: String,
}

/// Display rotation values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum DisplayRotation {
    /// Natural orientation.
    #[default]
    Rotation0 = 0,
    /// Rotated 90 degrees.
    Rotation90 = 1,
    /// Rotated 180 degrees.
    Rotation180 = 2,
    /// Rotated 270 degrees.
    Rotation270 = 3,
}

impl DisplayRotation {
    /// Decode a wire value.
    #[must_use]
    pub const fn from_value(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Rotation0,
            1 => Self::Rotation90,
            2 => Self::Rotation180,
            3 => Self::Rotation270,
            _ => return None,
        })
    }
}

/// A fingers × steps grid of injection points for multi-pointer actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerMatrix {
    fingers: u32,
    steps: u32,
    points: Vec<Vec<Option<Point>>>,
}

impl PointerMatrix {
    /// Maximum supported fingers.
    pub const MAX_FINGERS: u32 = 10;
    /// Maximum supported steps per finger.
    pub const MAX_STEPS: u32 = 1000;

    /// A matrix for the given finger and step counts.
    pub fn new(fingers: u32, steps: u32) -> Result<Self, ApiError> {
        if fingers == 0 || fingers > Self::MAX_FINGERS {
            return Err(ApiError::with_message(
                ErrCode::InvalidInput,
                "Number of fingers must be between 1 and 10",
            ));
        }
        if steps == 0 || steps > Self::MAX_STEPS {
            return Err(ApiError::with_message(
                ErrCode::InvalidInput,
                "Number of steps must be between 1 and 1000",
            ));
        }
        Ok(Self {
            fingers,
            steps,
            points: vec![vec![None; steps as usize]; fingers as usize],
        })
    }

    /// Set the point of one finger at one step.
    pub fn set_point(&mut self, finger: u32, step: u32, point: Point) -> Result<(), ApiError> {
        if finger >= self.fingers || step >= self.steps {
            return Err(ApiError::with_message(
                ErrCode::InvalidInput,
                "Point position out of range",
            ));
        }
        self.points[finger as usize][step as usize] = Some(point);
        Ok(())
    }

    /// Finger count.
    #[must_use]
    pub const fn fingers(&self) -> u32 {
        self.fingers
    }

    /// Step count per finger.
    #[must_use]
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// The point of one finger at one step, if set.
    #[must_use]
    pub fn point(&self, finger: u32, step: u32) -> Option<Point> {
        self.points
            .get(finger as usize)
            .and_then(|row| row.get(step as usize))
            .copied()
            .flatten()
    }

    /// `true` when every cell has been assigned.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.points
            .iter()
            .all(|row| row.iter().all(Option::is_some))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_patterns_cover_the_rules() {
        let text = |pattern| WidgetMatchModel::new(UiAttr::Text, "Con", pattern);
        assert!(text(MatchPattern::Contains).matches_value("Continue"));
        assert!(!text(MatchPattern::Equals).matches_value("Continue"));
        assert!(text(MatchPattern::StartsWith).matches_value("Continue"));
        assert!(!text(MatchPattern::EndsWith).matches_value("Continue"));
        let regex = WidgetMatchModel::new(UiAttr::Text, "^Con.*ue$", MatchPattern::RegExp);
        assert!(regex.matches_value("Continue"));
        let icase = WidgetMatchModel::new(UiAttr::Text, "^con", MatchPattern::RegExpIgnoreCase);
        assert!(icase.matches_value("Continue"));
    }

    #[test]
    fn widget_matching_uses_attributes() {
        let widget = Widget::new("/0/1")
            .with_attr(UiAttr::Text, "OK")
            .with_attr(UiAttr::Enabled, "true");
        assert!(widget.matches_all(&[
            WidgetMatchModel::new(UiAttr::Text, "OK", MatchPattern::Equals),
            WidgetMatchModel::new(UiAttr::Enabled, "true", MatchPattern::Equals),
        ]));
        assert!(!widget.matches_all(&[WidgetMatchModel::new(
            UiAttr::Text,
            "Cancel",
            MatchPattern::Equals
        )]));
    }

    #[test]
    fn pointer_matrix_validates_dimensions() {
        assert!(PointerMatrix::new(0, 10).is_err());
        assert!(PointerMatrix::new(11, 10).is_err());
        assert!(PointerMatrix::new(2, 1001).is_err());
        let mut matrix = PointerMatrix::new(2, 3).unwrap();
        assert!(matrix.set_point(1, 2, Point::new(5, 6)).is_ok());
        assert!(matrix.set_point(2, 0, Point::new(0, 0)).is_err());
        assert_eq!(matrix.point(1, 2), Some(Point::new(5, 6)));
        assert!(!matrix.is_filled());
    }
}
