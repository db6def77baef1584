//! Capture host abstraction and the live capture handle.
//!
//! A [`CaptureHost`] answers a single asynchronous capture request with a
//! [`CaptureStream`] or a named [`AcquireError`]. The controller owns at
//! most one stream at a time and is the only party that stops it.

mod devices;
mod errors;
mod ffmpeg;

use futures_util::future::BoxFuture;

use crate::status::{CaptureMetadata, DisplaySurface};

pub use devices::{list_screens, parse_video_devices, screens_only, select_screen, DeviceInfo};
pub use errors::{AcquireError, DeviceError, SCREEN_RECORDING_SETTINGS};
pub use ffmpeg::{
    classify_failure, parse_stream_resolution, FfmpegHost, FfmpegSettings, FfmpegStream, Platform,
};

/// One-shot notification fired when a capture ends on the host side.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Media constraints passed with a capture request.
///
/// Mirrors `{ video: { frameRate: { ideal: 30 } }, audio: false }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Preferred frame rate; hosts may deliver something else
    pub ideal_frame_rate: u32,
    /// Whether to capture audio alongside video
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_frame_rate: 30,
            audio: false,
        }
    }
}

impl CaptureConstraints {
    /// Set the preferred frame rate
    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.ideal_frame_rate = fps;
        self
    }
}

/// Attributes a video track reports once active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub display_surface: Option<DisplaySurface>,
}

impl From<TrackSettings> for CaptureMetadata {
    fn from(s: TrackSettings) -> Self {
        CaptureMetadata {
            width: s.width,
            height: s.height,
            display_surface: s.display_surface,
        }
    }
}

/// A downscaled 8-bit grayscale frame for previewing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    /// Row-major luma, `width * height` bytes
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PreviewFrame {
    /// Build a frame, rejecting buffers that don't match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self { data, width, height })
    }
}

/// A live capture resource.
///
/// Exactly one underlying resource per value. `stop_tracks` is idempotent
/// and detaches any end-of-track callback before releasing the resource.
pub trait CaptureStream: Send {
    /// Settings of the first video track, if the stream has one.
    fn video_track_settings(&self) -> Option<TrackSettings>;

    /// Attach the one-shot end-of-track callback, replacing any earlier one.
    ///
    /// The callback never fires after `stop_tracks` has been called.
    fn set_on_ended(&mut self, callback: EndedCallback);

    /// Stop every track and release the underlying resource.
    fn stop_tracks(&mut self);

    /// Whether the underlying capture is still producing.
    fn is_live(&self) -> bool;

    /// Most recent preview frame, if the host produces any.
    fn latest_frame(&self) -> Option<PreviewFrame> {
        None
    }
}

/// Source of capture streams.
pub trait CaptureHost {
    /// Whether this host can capture at all.
    fn is_supported(&self) -> bool;

    /// Request a capture stream.
    fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> BoxFuture<'_, Result<Box<dyn CaptureStream>, AcquireError>>;
}
