//! Screen enumeration through FFmpeg's avfoundation device listing.

use std::process::{Command, Stdio};

use super::errors::DeviceError;

/// Device information parsed from FFmpeg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
}

/// Prefix avfoundation gives to screen (as opposed to camera) devices.
pub const SCREEN_DEVICE_PREFIX: &str = "Capture screen";

/// List capturable screens.
///
/// Only avfoundation can enumerate devices; other platforms return
/// [`DeviceError::ListingUnsupported`].
pub fn list_screens(ffmpeg: &str) -> Result<Vec<DeviceInfo>, DeviceError> {
    if !cfg!(target_os = "macos") {
        return Err(DeviceError::ListingUnsupported);
    }

    let output = Command::new(ffmpeg)
        .args(["-f", "avfoundation", "-list_devices", "true", "-i", ""])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeviceError::FfmpegNotFound
            } else {
                DeviceError::FfmpegFailed(e.to_string())
            }
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(screens_only(parse_video_devices(&stderr)))
}

/// Keep only screen devices, in listing order.
pub fn screens_only(devices: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
    devices
        .into_iter()
        .filter(|d| d.name.starts_with(SCREEN_DEVICE_PREFIX))
        .collect()
}

/// Pick the screen at `position` in a [`screens_only`] list.
///
/// `position` is the number `list-screens` prints and `--screen` takes; it
/// is not the avfoundation device index.
pub fn select_screen(screens: &[DeviceInfo], position: usize) -> Result<&DeviceInfo, DeviceError> {
    if screens.is_empty() {
        return Err(DeviceError::NoScreens);
    }
    screens.get(position).ok_or(DeviceError::ScreenNotFound {
        requested: position,
        available: screens.len(),
    })
}

/// Parse video devices from FFmpeg stderr output
pub fn parse_video_devices(stderr: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();
    let mut in_video_section = false;

    for line in stderr.lines() {
        if line.contains("AVFoundation video devices:") {
            in_video_section = true;
            continue;
        }
        if line.contains("AVFoundation audio devices:") {
            break;
        }

        if in_video_section {
            if let Some(device) = parse_device_line(line) {
                devices.push(device);
            }
        }
    }

    devices
}

/// Parse a single device line from FFmpeg output
fn parse_device_line(line: &str) -> Option<DeviceInfo> {
    // Format: [AVFoundation indev @ 0x...] [index] device name
    let bracket_idx = line.find("] [")?;
    let after_bracket = &line[bracket_idx + 3..];
    let close_bracket = after_bracket.find(']')?;
    let index: usize = after_bracket[..close_bracket].parse().ok()?;
    let name = after_bracket.get(close_bracket + 2..)?.trim().to_string();

    if name.is_empty() {
        return None;
    }

    Some(DeviceInfo { index, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
[AVFoundation indev @ 0x123] AVFoundation video devices:
[AVFoundation indev @ 0x123] [0] FaceTime HD Camera
[AVFoundation indev @ 0x123] [1] Capture screen 0
[AVFoundation indev @ 0x123] [2] Capture screen 1
[AVFoundation indev @ 0x123] AVFoundation audio devices:
[AVFoundation indev @ 0x123] [0] MacBook Pro Microphone
"#;

    #[test]
    fn test_parse_device_line_screen() {
        let line = "[AVFoundation indev @ 0x12345678] [1] Capture screen 0";
        let device = parse_device_line(line).unwrap();
        assert_eq!(device.index, 1);
        assert_eq!(device.name, "Capture screen 0");
    }

    #[test]
    fn test_parse_device_line_rejects_noise() {
        assert!(parse_device_line("Input #0, avfoundation, from ''").is_none());
        assert!(parse_device_line("[AVFoundation indev @ 0x1] [x] Broken").is_none());
        assert!(parse_device_line("[AVFoundation indev @ 0x1] [3]").is_none());
    }

    #[test]
    fn test_parse_video_devices_stops_at_audio() {
        let devices = parse_video_devices(LISTING);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].name, "FaceTime HD Camera");
        assert_eq!(devices[2].name, "Capture screen 1");
    }

    #[test]
    fn test_screens_only() {
        let screens = screens_only(parse_video_devices(LISTING));
        let names: Vec<_> = screens.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Capture screen 0", "Capture screen 1"]);
        assert_eq!(screens[0].index, 1);
    }

    #[test]
    fn test_select_screen_uses_list_position() {
        let screens = screens_only(parse_video_devices(LISTING));
        let second = select_screen(&screens, 1).unwrap();
        assert_eq!(second.index, 2);
        assert_eq!(second.name, "Capture screen 1");
    }

    #[test]
    fn test_select_screen_out_of_range() {
        let screens = screens_only(parse_video_devices(LISTING));
        assert!(matches!(
            select_screen(&screens, 2),
            Err(DeviceError::ScreenNotFound {
                requested: 2,
                available: 2
            })
        ));
        assert!(matches!(select_screen(&[], 0), Err(DeviceError::NoScreens)));
    }
}
