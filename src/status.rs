//! Capture status and stream metadata types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of the capture session.
///
/// Exactly one status is active at a time. The presentation layer branches
/// on this value and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    #[default]
    Idle,
    Requesting,
    Granted,
    Ended,
    Denied,
    Cancelled,
    Unsupported,
    Error,
}

impl CaptureStatus {
    /// Every status, in declaration order.
    pub const ALL: [CaptureStatus; 8] = [
        CaptureStatus::Idle,
        CaptureStatus::Requesting,
        CaptureStatus::Granted,
        CaptureStatus::Ended,
        CaptureStatus::Denied,
        CaptureStatus::Cancelled,
        CaptureStatus::Unsupported,
        CaptureStatus::Error,
    ];

    /// Stable string name, used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureStatus::Idle => "idle",
            CaptureStatus::Requesting => "requesting",
            CaptureStatus::Granted => "granted",
            CaptureStatus::Ended => "ended",
            CaptureStatus::Denied => "denied",
            CaptureStatus::Cancelled => "cancelled",
            CaptureStatus::Unsupported => "unsupported",
            CaptureStatus::Error => "error",
        }
    }

    /// Whether the user can only retry or go home from here.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaptureStatus::Ended
                | CaptureStatus::Denied
                | CaptureStatus::Cancelled
                | CaptureStatus::Unsupported
                | CaptureStatus::Error
        )
    }
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`CaptureStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capture status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for CaptureStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaptureStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Category of content being captured, as reported by the capture host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplaySurface {
    Monitor,
    Window,
    Browser,
}

impl DisplaySurface {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplaySurface::Monitor => "monitor",
            DisplaySurface::Window => "window",
            DisplaySurface::Browser => "browser",
        }
    }
}

impl fmt::Display for DisplaySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive attributes of a granted capture.
///
/// Only present while the status is [`CaptureStatus::Granted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub display_surface: Option<DisplaySurface>,
}

impl CaptureMetadata {
    /// One-line summary: `1920x1080 • monitor`.
    ///
    /// Missing values are left blank rather than guessed.
    pub fn summary(&self) -> String {
        let dim = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_default();
        let surface = self.display_surface.map(|s| s.as_str()).unwrap_or_default();
        format!("{}x{} • {}", dim(self.width), dim(self.height), surface)
    }
}
