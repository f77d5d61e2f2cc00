// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error taxonomy for the uitest transactor.
//!
//! Every reply carries an [`ApiError`]: a stable numeric [`ErrCode`] plus a
//! human-readable message. Two generations of codes coexist: the current
//! ones handed to new clients, and the small legacy set that pre-rename
//! clients still expect. [`ErrCode::to_legacy`] is the static table used on
//! the return path when a call arrived under an old API name.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Stable error code carried in every API reply.
///
/// Only [`ErrCode::NoError`] means success. The discriminant values are the
/// wire representation and must never change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ErrCode {
    /// The call succeeded.
    #[default]
    NoError,
    /// The device lacks the system capability backing this API.
    NoSystemCapability,
    /// An argument failed validation.
    InvalidInput,
    /// The driver could not be brought up.
    InitializeFailed,
    /// API misuse, e.g. concurrent invocation on one transactor.
    ApiUsage,
    /// A user assertion on the UI state failed.
    AssertionFailed,
    /// A component that was expected to exist is gone.
    ComponentLost,
    /// The operation is not supported on this device or display.
    OperationUnsupported,
    /// Unexpected internal failure, including transport death.
    Internal,
    /// An argument failed validation, reported under the converted code.
    InvalidParam,
    /// A window that was expected to exist is gone.
    WindowLost,
    /// Legacy counterpart of [`ErrCode::Internal`].
    LegacyInternal,
    /// Legacy counterpart of [`ErrCode::ComponentLost`].
    WidgetLost,
    /// Legacy counterpart of [`ErrCode::AssertionFailed`].
    AssertionFailure,
    /// Legacy catch-all for caller mistakes.
    UsageError,
    /// Legacy counterpart of [`ErrCode::WindowLost`].
    LegacyWindowLost,
}

impl ErrCode {
    /// Wire value of this code.
    #[must_use]
    pub const fn value(self) -> u32 {
        match self {
            Self::NoError => 0,
            Self::LegacyInternal => 1,
            Self::WidgetLost => 2,
            Self::AssertionFailure => 3,
            Self::UsageError => 4,
            Self::LegacyWindowLost => 5,
            Self::NoSystemCapability => 201,
            Self::InvalidInput => 401,
            Self::InitializeFailed => 17_000_001,
            Self::ApiUsage => 17_000_002,
            Self::AssertionFailed => 17_000_003,
            Self::ComponentLost => 17_000_004,
            Self::OperationUnsupported => 17_000_005,
            Self::Internal => 17_000_006,
            Self::InvalidParam => 17_000_007,
            Self::WindowLost => 17_000_008,
        }
    }

    /// Decode a wire value. Unknown values are rejected.
    #[must_use]
    pub const fn from_value(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::NoError,
            1 => Self::LegacyInternal,
            2 => Self::WidgetLost,
            3 => Self::AssertionFailure,
            4 => Self::UsageError,
            5 => Self::LegacyWindowLost,
            201 => Self::NoSystemCapability,
            401 => Self::InvalidInput,
            17_000_001 => Self::InitializeFailed,
            17_000_002 => Self::ApiUsage,
            17_000_003 => Self::AssertionFailed,
            17_000_004 => Self::ComponentLost,
            17_000_005 => Self::OperationUnsupported,
            17_000_006 => Self::Internal,
            17_000_007 => Self::InvalidParam,
            17_000_008 => Self::WindowLost,
            _ => return None,
        })
    }

    /// Readable name, as surfaced to host-language bindings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoError => "NO_ERROR",
            Self::NoSystemCapability => "NO_SYSTEM_CAPABILITY",
            Self::InvalidInput => "INVALID_INPUT",
            Self::InitializeFailed => "INITIALIZE_FAILED",
            Self::ApiUsage => "API_USAGE",
            Self::AssertionFailed => "ASSERTION_FAILED",
            Self::ComponentLost => "COMPONENT_LOST",
            Self::OperationUnsupported => "OPERATION_UNSUPPORTED",
            Self::Internal => "INTERNAL_ERROR",
            Self::InvalidParam => "INVALID_PARAM",
            Self::WindowLost => "WINDOW_LOST",
            Self::LegacyInternal => "INTERNAL_ERROR",
            Self::WidgetLost => "WIDGET_LOST",
            Self::AssertionFailure => "ASSERTION_FAILURE",
            Self::UsageError => "USAGE_ERROR",
            Self::LegacyWindowLost => "WINDOW_LOST",
        }
    }

    /// Map a current-generation code to the one legacy clients expect.
    ///
    /// Codes without a legacy counterpart (and codes that already are
    /// legacy) pass through unchanged.
    #[must_use]
    pub const fn to_legacy(self) -> Self {
        match self {
            Self::ComponentLost => Self::WidgetLost,
            Self::WindowLost => Self::LegacyWindowLost,
            Self::NoSystemCapability | Self::InitializeFailed | Self::InvalidInput => {
                Self::UsageError
            }
            Self::AssertionFailed => Self::AssertionFailure,
            Self::OperationUnsupported | Self::ApiUsage | Self::Internal => Self::LegacyInternal,
            other => other,
        }
    }

    /// `true` for every code except [`ErrCode::NoError`].
    #[must_use]
    pub const fn is_error(self) -> bool {
        !matches!(self, Self::NoError)
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ErrCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.value())
    }
}

impl<'de> Deserialize<'de> for ErrCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u32::deserialize(deserializer)?;
        Self::from_value(value)
            .ok_or_else(|| D::Error::custom(format!("unknown error code {value}")))
    }
}

/// API invocation error detail: code plus human-readable message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// The failure kind.
    pub code: ErrCode,
    /// Human-readable detail, may be empty.
    pub message: String,
}

impl ApiError {
    /// An error with the given code and an empty message.
    #[must_use]
    pub fn new(code: ErrCode) -> Self {
        Self {
            code,
            message: String::new(),
        }
    }

    /// An error with code and message.
    pub fn with_message(code: ErrCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Success value.
    #[must_use]
    pub fn none() -> Self {
        Self::new(ErrCode::NoError)
    }

    /// `true` unless the code is [`ErrCode::NoError`].
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.code.is_error()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_round_trip() {
        for code in [
            ErrCode::NoError,
            ErrCode::NoSystemCapability,
            ErrCode::InvalidInput,
            ErrCode::InitializeFailed,
            ErrCode::ApiUsage,
            ErrCode::AssertionFailed,
            ErrCode::ComponentLost,
            ErrCode::OperationUnsupported,
            ErrCode::Internal,
            ErrCode::InvalidParam,
            ErrCode::WindowLost,
            ErrCode::LegacyInternal,
            ErrCode::WidgetLost,
            ErrCode::AssertionFailure,
            ErrCode::UsageError,
            ErrCode::LegacyWindowLost,
        ] {
            assert_eq!(ErrCode::from_value(code.value()), Some(code));
        }
        assert_eq!(ErrCode::from_value(999), None);
    }

    #[test]
    fn legacy_mapping_matches_table() {
        assert_eq!(ErrCode::ComponentLost.to_legacy(), ErrCode::WidgetLost);
        assert_eq!(ErrCode::WindowLost.to_legacy(), ErrCode::LegacyWindowLost);
        assert_eq!(ErrCode::InvalidInput.to_legacy(), ErrCode::UsageError);
        assert_eq!(ErrCode::InitializeFailed.to_legacy(), ErrCode::UsageError);
        assert_eq!(ErrCode::ApiUsage.to_legacy(), ErrCode::LegacyInternal);
        assert_eq!(ErrCode::Internal.to_legacy(), ErrCode::LegacyInternal);
        assert_eq!(ErrCode::NoError.to_legacy(), ErrCode::NoError);
        // InvalidParam has no legacy counterpart.
        assert_eq!(ErrCode::InvalidParam.to_legacy(), ErrCode::InvalidParam);
    }

    #[test]
    fn api_error_serde_shape() {
        let err = ApiError::with_message(ErrCode::Internal, "ipc connection is dead");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], 17_000_006);
        assert_eq!(json["message"], "ipc connection is dead");
        let back: ApiError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }
}
