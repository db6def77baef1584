//! Error types for capture operations.
//!
//! [`AcquireError`] is the named failure a capture host reports for a
//! rejected request. [`DeviceError`] covers screen enumeration.

/// Where the user grants screen capture permission on macOS.
pub const SCREEN_RECORDING_SETTINGS: &str =
    "System Settings > Privacy & Security > Screen Recording";

/// Why a capture request did not produce a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// The host or OS refused permission to capture
    PermissionDenied { details: Option<String> },
    /// The user dismissed the picker / aborted the request
    UserAborted,
    /// Any other failure
    Other(String),
}

impl std::fmt::Display for AcquireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquireError::PermissionDenied { details } => {
                write!(
                    f,
                    "Screen capture permission was denied.\n\nGrant permission in:\n  {}",
                    SCREEN_RECORDING_SETTINGS
                )?;
                if let Some(details) = details {
                    write!(f, "\n\nDetails: {}", details)?;
                }
                Ok(())
            }
            AcquireError::UserAborted => write!(f, "Capture request was aborted by the user"),
            AcquireError::Other(msg) => write!(f, "Capture failed: {}", msg),
        }
    }
}

impl std::error::Error for AcquireError {}

/// Errors from enumerating capturable screens.
#[derive(Debug)]
pub enum DeviceError {
    /// FFmpeg not found
    FfmpegNotFound,
    /// Failed to run FFmpeg
    FfmpegFailed(String),
    /// Device listing only exists for avfoundation
    ListingUnsupported,
    /// FFmpeg listed no screen devices
    NoScreens,
    /// The requested screen number is out of range
    ScreenNotFound { requested: usize, available: usize },
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::FfmpegNotFound => {
                write!(
                    f,
                    "FFmpeg not found. Please install it (e.g. `brew install ffmpeg`) \
                     or set [capture] ffmpeg in the config file."
                )
            }
            DeviceError::FfmpegFailed(msg) => write!(f, "FFmpeg failed: {}", msg),
            DeviceError::ListingUnsupported => {
                write!(f, "Screen listing is only available on macOS (avfoundation)")
            }
            DeviceError::NoScreens => write!(
                f,
                "No screens available. Grant screen recording permission in {}",
                SCREEN_RECORDING_SETTINGS
            ),
            DeviceError::ScreenNotFound {
                requested,
                available,
            } => write!(
                f,
                "Screen {} not found ({} available, see list-screens)",
                requested, available
            ),
        }
    }
}

impl std::error::Error for DeviceError {}
