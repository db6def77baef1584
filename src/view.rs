//! What the screen shows for a given session snapshot.
//!
//! [`View::from_snapshot`] is a pure function of status, metadata and
//! stream presence. `unsupported` and `error` have no screen of their own
//! and fall into the stopped screen with the generic message.

use crate::controller::SessionSnapshot;
use crate::status::{CaptureMetadata, CaptureStatus};

pub const TITLE: &str = "Screen Share Test App";
pub const REQUESTING_TEXT: &str = "Please select a screen to share...";
pub const INTERRUPTED_TEXT: &str = "The previous request did not finish.";
pub const CONNECTION_LOST_TEXT: &str = "Connection lost. Please restart.";
pub const STOPPED_TITLE: &str = "Screen sharing stopped";
pub const DENIED_TEXT: &str = "Permission was denied.";
pub const ENDED_TEXT: &str = "The session has ended successfully.";

const SPINNER: &[char] = &['|', '/', '-', '\\'];
const WIDTH: usize = 44;

/// The mutually exclusive screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Start screen
    Idle,
    /// Waiting on the capture picker. `in_flight` is false when the status
    /// was reloaded from a run that died mid-request.
    Requesting { in_flight: bool },
    /// Sharing: LIVE badge, stop control, preview and metadata
    Live {
        metadata: Option<CaptureMetadata>,
        has_stream: bool,
    },
    /// Stopped, with retry and home actions
    Stopped { status: CaptureStatus },
}

impl View {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> View {
        match snapshot.status {
            CaptureStatus::Idle => View::Idle,
            CaptureStatus::Requesting => View::Requesting {
                in_flight: snapshot.request_pending,
            },
            CaptureStatus::Granted => View::Live {
                metadata: snapshot.metadata,
                has_stream: snapshot.has_stream,
            },
            status @ (CaptureStatus::Ended
            | CaptureStatus::Denied
            | CaptureStatus::Cancelled
            | CaptureStatus::Unsupported
            | CaptureStatus::Error) => View::Stopped { status },
        }
    }

    /// Keys accepted on this screen, as `(key, label)` pairs.
    pub fn actions(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            View::Idle => &[("s", "Start Screen Test"), ("q", "Quit")],
            View::Requesting { in_flight: true } => &[("Ctrl+C", "Cancel")],
            View::Requesting { in_flight: false } => &[
                ("s", "Retry Screen Test"),
                ("h", "Back to Home"),
                ("q", "Quit"),
            ],
            View::Live { .. } => &[("x", "Stop Sharing"), ("q", "Quit")],
            View::Stopped { .. } => &[
                ("s", "Retry Screen Test"),
                ("h", "Back to Home"),
                ("q", "Quit"),
            ],
        }
    }
}

/// Body text of the stopped screen.
pub fn stopped_message(status: CaptureStatus) -> &'static str {
    if status == CaptureStatus::Denied {
        DENIED_TEXT
    } else {
        ENDED_TEXT
    }
}

/// Draw `view` as terminal text.
///
/// `preview` is the rendered preview for the live screen; `tick` animates
/// the spinner.
pub fn render(view: &View, preview: Option<&str>, tick: usize) -> String {
    let mut lines: Vec<String> = Vec::new();

    match view {
        View::Idle => {
            lines.push(TITLE.to_string());
        }
        View::Requesting { in_flight: true } => {
            lines.push(format!("{} {}", SPINNER[tick % SPINNER.len()], REQUESTING_TEXT));
        }
        View::Requesting { in_flight: false } => {
            lines.push(INTERRUPTED_TEXT.to_string());
        }
        View::Live {
            metadata,
            has_stream,
        } => {
            lines.push("(*) LIVE".to_string());
            match (has_stream, preview) {
                (true, Some(art)) => lines.extend(art.lines().map(str::to_string)),
                (true, None) => lines.push("(waiting for frames)".to_string()),
                (false, _) => lines.push(CONNECTION_LOST_TEXT.to_string()),
            }
            if let Some(meta) = metadata {
                lines.push(meta.summary());
            }
        }
        View::Stopped { status } => {
            lines.push(STOPPED_TITLE.to_string());
            lines.push(stopped_message(*status).to_string());
        }
    }

    let actions = view
        .actions()
        .iter()
        .map(|(key, label)| format!("[{}] {}", key, label))
        .collect::<Vec<_>>()
        .join("  ");

    let inner = lines
        .iter()
        .chain(std::iter::once(&actions))
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .max(WIDTH);

    let mut out = String::new();
    out.push_str(&format!("┌{}┐\n", "─".repeat(inner + 2)));
    for line in &lines {
        out.push_str(&boxed(line, inner));
    }
    out.push_str(&format!("├{}┤\n", "─".repeat(inner + 2)));
    out.push_str(&boxed(&actions, inner));
    out.push_str(&format!("└{}┘\n", "─".repeat(inner + 2)));
    out
}

fn boxed(line: &str, width: usize) -> String {
    let pad = width.saturating_sub(line.chars().count());
    format!("│ {}{} │\n", line, " ".repeat(pad))
}
