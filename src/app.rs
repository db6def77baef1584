//! Interactive screen test session.
//!
//! Reads one-letter commands from stdin, drives the [`CaptureController`]
//! and redraws the current [`View`] whenever the session changes and on
//! every preview tick.

use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::capture::CaptureHost;
use crate::controller::{CaptureController, SessionEvent, SessionSnapshot};
use crate::preview::{AsciiPreview, PreviewSink};
use crate::store::StatusStore;
use crate::view::{render, View};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const SPINNER_PERIOD: Duration = Duration::from_millis(120);
const DEFAULT_REFRESH: Duration = Duration::from_millis(200);

/// A line typed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start or retry the screen test
    Start,
    /// Stop sharing
    Stop,
    /// Back to the start screen
    Home,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "s" | "start" | "retry" => Some(Command::Start),
            "x" | "stop" => Some(Command::Stop),
            "h" | "home" => Some(Command::Home),
            "q" | "quit" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }

    /// Whether the screen offers this command.
    ///
    /// A `requesting` screen with no request in flight (reloaded from an
    /// interrupted run) accepts retry and home like a stopped screen.
    pub fn allowed_in(&self, view: &View) -> bool {
        matches!(
            (self, view),
            (Command::Quit, _)
                | (
                    Command::Start | Command::Home,
                    View::Stopped { .. } | View::Requesting { in_flight: false }
                )
                | (Command::Start, View::Idle)
                | (Command::Stop, View::Live { .. })
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One interactive run: the controller plus an optional ASCII preview.
pub struct ScreenTest<H, S> {
    controller: CaptureController<H, S>,
    preview: Option<AsciiPreview>,
    refresh: Duration,
    tick: usize,
}

impl<H: CaptureHost, S: StatusStore> ScreenTest<H, S> {
    pub fn new(controller: CaptureController<H, S>) -> Self {
        Self {
            controller,
            preview: None,
            refresh: DEFAULT_REFRESH,
            tick: 0,
        }
    }

    pub fn with_preview(mut self, preview: AsciiPreview) -> Self {
        self.preview = Some(preview);
        self
    }

    /// How often the preview is redrawn.
    pub fn with_refresh(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn controller(&self) -> &CaptureController<H, S> {
        &self.controller
    }

    pub fn preview(&self) -> Option<&AsciiPreview> {
        self.preview.as_ref()
    }

    pub fn view(&self) -> View {
        View::from_snapshot(&self.controller.snapshot())
    }

    /// Apply one command. Returns `false` once the user quits.
    ///
    /// Commands the current screen does not offer are ignored.
    pub async fn apply(&mut self, command: Command) -> bool {
        let view = self.view();
        if !command.allowed_in(&view) {
            log::debug!("Ignoring {:?} on {:?}", command, view);
            return true;
        }

        match command {
            Command::Start => self.handle_start().await,
            Command::Stop => self.handle_stop(),
            Command::Home => self.handle_home(),
            Command::Quit => return false,
        }
        true
    }

    pub async fn handle_start(&mut self) {
        self.unbind_preview();
        self.controller.start().await;
        self.bind_preview();
    }

    pub fn handle_stop(&mut self) {
        self.unbind_preview();
        self.controller.stop_and_end();
    }

    pub fn handle_home(&mut self) {
        self.unbind_preview();
        self.controller.go_home();
    }

    /// Apply a host notification, dropping the preview if its session ended.
    pub fn handle_event(&mut self, event: SessionEvent) {
        self.controller.handle_event(event);
        if let Some(preview) = self.preview.as_mut() {
            if preview.bound_session().is_some()
                && preview.bound_session() != self.controller.session_id()
            {
                preview.unbind();
            }
        }
    }

    /// The current screen as terminal text.
    pub fn frame(&mut self) -> String {
        let view = self.view();
        let art = match (self.preview.as_mut(), &view) {
            (Some(preview), View::Live { .. }) => preview.render(self.controller.stream()),
            _ => None,
        };
        render(&view, art.as_deref(), self.tick)
    }

    /// Run until the user quits, stdin closes or Ctrl+C.
    ///
    /// Dropping the session afterwards releases any held capture.
    pub async fn run(mut self) -> Result<(), AppError> {
        let mut stdout = std::io::stdout();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut snapshots = self.controller.subscribe();

        let mut ticker = tokio::time::interval(self.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Registered once so a Ctrl+C arriving mid-iteration is not lost.
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut ctrl_c_armed = true;

        draw(&mut stdout, &self.frame())?;

        loop {
            tokio::select! {
                biased;

                result = &mut ctrl_c, if ctrl_c_armed => {
                    match result {
                        Ok(()) => {
                            log::info!("Interrupted, shutting down");
                            break;
                        }
                        Err(e) => {
                            log::warn!("Ctrl+C handling unavailable: {}", e);
                            ctrl_c_armed = false;
                        }
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        log::debug!("stdin closed");
                        break;
                    };
                    let view = self.view();
                    match Command::parse(&line) {
                        Some(Command::Quit) => break,
                        Some(Command::Start) if Command::Start.allowed_in(&view) => {
                            self.start_with_spinner(&mut stdout, &mut snapshots).await;
                            // Ctrl+C during the request cancelled it; it must not also quit.
                            if ctrl_c_armed {
                                ctrl_c.set(tokio::signal::ctrl_c());
                            }
                        }
                        Some(command) => {
                            self.apply(command).await;
                        }
                        None => log::debug!("Unknown command {:?}", line.trim()),
                    }
                }
                Some(event) = self.controller.next_event() => {
                    self.handle_event(event);
                }
                Ok(()) = snapshots.changed() => {}
                _ = ticker.tick() => {
                    self.tick = self.tick.wrapping_add(1);
                }
            }

            draw(&mut stdout, &self.frame())?;
        }

        Ok(())
    }

    /// Start a capture while animating the requesting screen.
    ///
    /// The request always runs to completion; drawing failures are logged.
    async fn start_with_spinner<W: Write>(
        &mut self,
        out: &mut W,
        snapshots: &mut watch::Receiver<SessionSnapshot>,
    ) {
        self.unbind_preview();

        let mut spinner = tokio::time::interval(SPINNER_PERIOD);
        let mut tick = self.tick;
        {
            let start = self.controller.start();
            tokio::pin!(start);
            loop {
                tokio::select! {
                    _ = &mut start => break,
                    _ = spinner.tick() => {
                        let snapshot = *snapshots.borrow_and_update();
                        let text = render(&View::from_snapshot(&snapshot), None, tick);
                        if let Err(e) = draw(out, &text) {
                            log::warn!("Failed to draw requesting screen: {}", e);
                        }
                        tick = tick.wrapping_add(1);
                    }
                }
            }
        }
        self.tick = tick;

        self.bind_preview();
    }

    fn bind_preview(&mut self) {
        if let (Some(preview), Some(session)) = (self.preview.as_mut(), self.controller.session_id())
        {
            preview.bind(session);
        }
    }

    fn unbind_preview(&mut self) {
        if let Some(preview) = self.preview.as_mut() {
            preview.unbind();
        }
    }
}

fn draw<W: Write>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(CLEAR_SCREEN.as_bytes())?;
    out.write_all(text.as_bytes())?;
    out.flush()
}
