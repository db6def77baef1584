//! FFmpeg-backed capture host.
//!
//! Spawns FFmpeg grabbing the desktop (avfoundation, x11grab or gdigrab),
//! watches its stderr for the first video stream line to learn the native
//! resolution, and streams downscaled grayscale frames from stdout for the
//! preview. The process exiting on its own is the end-of-track event.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::oneshot;

use super::devices::{list_screens, select_screen, SCREEN_DEVICE_PREFIX};
use super::{
    AcquireError, CaptureConstraints, CaptureHost, CaptureStream, EndedCallback, PreviewFrame,
    TrackSettings,
};
use crate::status::DisplaySurface;

/// How long FFmpeg gets to exit after SIGINT before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Stderr fragments FFmpeg prints when the OS refuses screen capture.
const PERMISSION_MARKERS: &[&str] = &[
    "not authorized",
    "Permission denied",
    "Operation not permitted",
    "Could not open",
];

/// Screen grabbing backend, chosen by target OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// avfoundation
    MacOs,
    /// x11grab
    Linux,
    /// gdigrab
    Windows,
}

impl Platform {
    /// Backend for the OS this binary was built for.
    pub fn current() -> Option<Platform> {
        if cfg!(target_os = "macos") {
            Some(Platform::MacOs)
        } else if cfg!(target_os = "linux") {
            Some(Platform::Linux)
        } else if cfg!(target_os = "windows") {
            Some(Platform::Windows)
        } else {
            None
        }
    }
}

/// FFmpeg host configuration.
#[derive(Debug, Clone)]
pub struct FfmpegSettings {
    /// FFmpeg executable name or path
    pub binary: String,
    /// Screen number to grab (position among listed screens)
    pub screen: usize,
    /// X11 display, e.g. `:0` (falls back to `$DISPLAY`)
    pub display: Option<String>,
    /// Preview frame size; `None` disables frame output
    pub preview_size: Option<(u32, u32)>,
    /// Preview frames per second
    pub preview_fps: u32,
    /// Give up on a request that shows no video stream after this long
    pub request_timeout: Duration,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            screen: 0,
            display: None,
            preview_size: Some((80, 30)),
            preview_fps: 5,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Capture host that drives an FFmpeg subprocess.
#[derive(Debug, Clone)]
pub struct FfmpegHost {
    settings: FfmpegSettings,
    platform: Option<Platform>,
    supported: bool,
}

impl FfmpegHost {
    /// Probe for FFmpeg (`<binary> -version`) and build the host.
    ///
    /// A missing binary or an unknown OS makes the host unsupported.
    pub fn detect(settings: FfmpegSettings) -> Self {
        let platform = Platform::current();
        let supported = platform.is_some() && probe_binary(&settings.binary);
        if !supported {
            log::warn!("Screen capture unavailable (ffmpeg: '{}')", settings.binary);
        }
        Self {
            settings,
            platform,
            supported,
        }
    }

    /// Build a host for an explicit platform without probing.
    pub fn with_platform(settings: FfmpegSettings, platform: Platform, supported: bool) -> Self {
        Self {
            settings,
            platform: Some(platform),
            supported,
        }
    }

    pub fn settings(&self) -> &FfmpegSettings {
        &self.settings
    }

    /// Full FFmpeg argument list for a capture request.
    ///
    /// `screen_device` is the avfoundation device name resolved by
    /// [`select_screen`]; without it the configured screen number is
    /// used as `Capture screen N`.
    pub fn command_args(
        &self,
        platform: Platform,
        constraints: &CaptureConstraints,
        screen_device: Option<&str>,
    ) -> Vec<String> {
        if constraints.audio {
            log::debug!("Audio capture requested; only video is grabbed");
        }

        let mut args: Vec<String> = vec!["-hide_banner".into(), "-nostdin".into()];
        args.extend(self.input_args(platform, constraints.ideal_frame_rate, screen_device));
        args.push("-an".into());

        match self.settings.preview_size {
            Some((w, h)) => args.extend([
                "-vf".to_string(),
                format!("fps={},scale={}:{}", self.settings.preview_fps, w, h),
                "-pix_fmt".to_string(),
                "gray".to_string(),
                "-f".to_string(),
                "rawvideo".to_string(),
                "pipe:1".to_string(),
            ]),
            None => args.extend(["-f".to_string(), "null".to_string(), "-".to_string()]),
        }
        args
    }

    fn input_args(&self, platform: Platform, fps: u32, screen_device: Option<&str>) -> Vec<String> {
        let fps = fps.to_string();
        match platform {
            Platform::MacOs => vec![
                "-f".into(),
                "avfoundation".into(),
                "-capture_cursor".into(),
                "1".into(),
                "-framerate".into(),
                fps,
                "-i".into(),
                match screen_device {
                    Some(name) => format!("{}:none", name),
                    None => format!("{} {}:none", SCREEN_DEVICE_PREFIX, self.settings.screen),
                },
            ],
            Platform::Linux => {
                let display = self
                    .settings
                    .display
                    .clone()
                    .or_else(|| std::env::var("DISPLAY").ok())
                    .unwrap_or_else(|| ":0".to_string());
                vec![
                    "-f".into(),
                    "x11grab".into(),
                    "-framerate".into(),
                    fps,
                    "-i".into(),
                    x11_input(&display, self.settings.screen),
                ]
            }
            Platform::Windows => vec![
                "-f".into(),
                "gdigrab".into(),
                "-framerate".into(),
                fps,
                "-i".into(),
                "desktop".into(),
            ],
        }
    }

    /// Spawn FFmpeg and wait until it reports a video stream.
    ///
    /// Ctrl+C while waiting aborts the request.
    pub async fn spawn_capture(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<FfmpegStream, AcquireError> {
        let platform = self
            .platform
            .ok_or_else(|| AcquireError::Other("no screen grabber for this OS".to_string()))?;
        let screen_device = match platform {
            Platform::MacOs => Some(self.resolve_screen_device().await?),
            Platform::Linux | Platform::Windows => None,
        };
        let args = self.command_args(platform, constraints, screen_device.as_deref());
        log::info!("Requesting capture: {} {}", self.settings.binary, args.join(" "));

        let mut child = Command::new(&self.settings.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AcquireError::Other(format!("failed to spawn {}: {}", self.settings.binary, e))
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AcquireError::Other("ffmpeg stderr not captured".to_string()))?;
        let mut lines = BufReader::new(stderr).lines();
        let mut seen = Vec::new();

        let outcome = tokio::select! {
            found = wait_for_video_stream(&mut lines, &mut seen) => match found {
                Some(size) => RequestOutcome::Stream(size),
                None => RequestOutcome::Exited,
            },
            Ok(()) = tokio::signal::ctrl_c() => RequestOutcome::Aborted,
            _ = tokio::time::sleep(self.settings.request_timeout) => RequestOutcome::TimedOut,
        };

        let (width, height) = match outcome {
            RequestOutcome::Stream(size) => size,
            RequestOutcome::Exited => {
                let status = child.wait().await;
                log::info!("Capture request failed, ffmpeg exited: {:?}", status);
                return Err(classify_failure(&seen));
            }
            RequestOutcome::Aborted => {
                log::info!("Capture request aborted");
                let _ = child.kill().await;
                return Err(AcquireError::UserAborted);
            }
            RequestOutcome::TimedOut => {
                let _ = child.kill().await;
                return Err(AcquireError::Other(format!(
                    "no video stream after {:?}",
                    self.settings.request_timeout
                )));
            }
        };

        log::info!("Capture granted: {}x{}", width, height);
        let track = TrackSettings {
            width: Some(width),
            height: Some(height),
            display_surface: Some(DisplaySurface::Monitor),
        };
        Ok(FfmpegStream::attach(child, lines, track, self.settings.preview_size))
    }
}

impl FfmpegHost {
    /// avfoundation device name of the configured screen, found by listing
    /// devices and taking the configured position among the screens.
    async fn resolve_screen_device(&self) -> Result<String, AcquireError> {
        let binary = self.settings.binary.clone();
        let screens = tokio::task::spawn_blocking(move || list_screens(&binary))
            .await
            .map_err(|e| AcquireError::Other(format!("device listing failed: {}", e)))?
            .map_err(|e| AcquireError::Other(e.to_string()))?;
        let device = select_screen(&screens, self.settings.screen)
            .map_err(|e| AcquireError::Other(e.to_string()))?;
        log::debug!(
            "Screen {} is avfoundation device [{}] {}",
            self.settings.screen,
            device.index,
            device.name
        );
        Ok(device.name.clone())
    }
}

impl CaptureHost for FfmpegHost {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> BoxFuture<'_, Result<Box<dyn CaptureStream>, AcquireError>> {
        let constraints = *constraints;
        Box::pin(async move {
            let stream = self.spawn_capture(&constraints).await?;
            Ok(Box::new(stream) as Box<dyn CaptureStream>)
        })
    }
}

enum RequestOutcome {
    Stream((u32, u32)),
    Exited,
    Aborted,
    TimedOut,
}

/// Shared between a stream and its supervisor task.
struct EndState {
    live: AtomicBool,
    stopped: AtomicBool,
    on_ended: Mutex<Option<EndedCallback>>,
}

impl EndState {
    /// The process exited by itself: fire the callback unless stopped.
    fn finish(&self) {
        self.live.store(false, Ordering::SeqCst);
        let callback = self.on_ended.lock().ok().and_then(|mut slot| slot.take());
        if let Some(callback) = callback {
            if !self.stopped.load(Ordering::SeqCst) {
                callback();
            }
        }
    }
}

/// A running FFmpeg capture.
pub struct FfmpegStream {
    track: TrackSettings,
    latest: Arc<Mutex<Option<PreviewFrame>>>,
    state: Arc<EndState>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl std::fmt::Debug for FfmpegStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegStream")
            .field("track", &self.track)
            .field("is_live", &self.is_live())
            .finish_non_exhaustive()
    }
}

impl FfmpegStream {
    fn attach(
        mut child: Child,
        stderr_lines: Lines<BufReader<ChildStderr>>,
        track: TrackSettings,
        preview_size: Option<(u32, u32)>,
    ) -> Self {
        let latest = Arc::new(Mutex::new(None));
        let state = Arc::new(EndState {
            live: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            on_ended: Mutex::new(None),
        });
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(drain_stderr(stderr_lines));
        if let (Some(stdout), Some((w, h))) = (child.stdout.take(), preview_size) {
            tokio::spawn(read_frames(stdout, w, h, Arc::clone(&latest)));
        }
        tokio::spawn(supervise(child, kill_rx, Arc::clone(&state)));

        Self {
            track,
            latest,
            state,
            kill_tx: Some(kill_tx),
        }
    }
}

impl CaptureStream for FfmpegStream {
    fn video_track_settings(&self) -> Option<TrackSettings> {
        Some(self.track)
    }

    fn set_on_ended(&mut self, callback: EndedCallback) {
        if self.state.stopped.load(Ordering::SeqCst) {
            return;
        }
        // Hold the slot while checking liveness so a concurrent exit either
        // sees the callback or we see the exit.
        let fire_now = match self.state.on_ended.lock() {
            Ok(mut slot) => {
                if self.state.live.load(Ordering::SeqCst) {
                    *slot = Some(callback);
                    None
                } else {
                    Some(callback)
                }
            }
            Err(_) => None,
        };
        if let Some(callback) = fire_now {
            callback();
        }
    }

    fn stop_tracks(&mut self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.state.on_ended.lock() {
            slot.take();
        }
        if let Some(tx) = self.kill_tx.take() {
            log::info!("Stopping capture");
            let _ = tx.send(());
        }
        self.state.live.store(false, Ordering::SeqCst);
        if let Ok(mut frame) = self.latest.lock() {
            *frame = None;
        }
    }

    fn is_live(&self) -> bool {
        self.state.live.load(Ordering::SeqCst)
    }

    fn latest_frame(&self) -> Option<PreviewFrame> {
        self.latest.lock().ok().and_then(|frame| frame.clone())
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

async fn wait_for_video_stream(
    lines: &mut Lines<BufReader<ChildStderr>>,
    seen: &mut Vec<String>,
) -> Option<(u32, u32)> {
    while let Ok(Some(line)) = lines.next_line().await {
        log::debug!("[ffmpeg] {}", line);
        let found = parse_stream_resolution(&line);
        seen.push(line);
        if found.is_some() {
            return found;
        }
    }
    None
}

async fn drain_stderr(mut lines: Lines<BufReader<ChildStderr>>) {
    while let Ok(Some(line)) = lines.next_line().await {
        log::debug!("[ffmpeg] {}", line);
    }
}

async fn read_frames(
    mut stdout: ChildStdout,
    width: u32,
    height: u32,
    latest: Arc<Mutex<Option<PreviewFrame>>>,
) {
    let mut buf = vec![0u8; (width as usize) * (height as usize)];
    if buf.is_empty() {
        return;
    }
    while stdout.read_exact(&mut buf).await.is_ok() {
        if let Some(frame) = PreviewFrame::new(buf.clone(), width, height) {
            if let Ok(mut slot) = latest.lock() {
                *slot = Some(frame);
            }
        }
    }
}

async fn supervise(mut child: Child, kill_rx: oneshot::Receiver<()>, state: Arc<EndState>) {
    // A dropped sender also means the stream is gone.
    let killed = tokio::select! {
        status = child.wait() => {
            log::info!("Capture ended by host: {:?}", status);
            false
        }
        _ = kill_rx => true,
    };

    if killed {
        shutdown(&mut child).await;
        state.live.store(false, Ordering::SeqCst);
    } else {
        state.finish();
    }
}

/// SIGINT first so FFmpeg can close its devices, then kill after a grace period.
async fn shutdown(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: plain signal delivery to our own, not yet reaped, child.
            unsafe {
                libc::kill(pid as i32, libc::SIGINT);
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await.is_err() {
        log::warn!("ffmpeg ignored SIGINT, killing it");
        let _ = child.kill().await;
    }
}

fn probe_binary(binary: &str) -> bool {
    match std::process::Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(e) => {
            log::debug!("Probing '{}' failed: {}", binary, e);
            false
        }
    }
}

/// `:0` + screen 1 → `:0.1`; a display that already names a screen is kept.
fn x11_input(display: &str, screen: usize) -> String {
    let host_part = display.rsplit(':').next().unwrap_or_default();
    if host_part.contains('.') {
        display.to_string()
    } else {
        format!("{}.{}", display, screen)
    }
}

/// Resolution from an FFmpeg `Stream #0:0: Video: ...` line.
///
/// Returns `None` for any other line.
pub fn parse_stream_resolution(line: &str) -> Option<(u32, u32)> {
    let (_, details) = line.split_once("Video:")?;
    details.split(',').find_map(|part| {
        let token = part.split_whitespace().next()?;
        let (w, h) = token.split_once('x')?;
        let w: u32 = w.parse().ok()?;
        let h: u32 = h.parse().ok()?;
        (w > 0 && h > 0).then_some((w, h))
    })
}

/// Turn the stderr of an FFmpeg that exited before streaming into an error.
pub fn classify_failure(stderr: &[String]) -> AcquireError {
    if let Some(line) = stderr
        .iter()
        .find(|l| PERMISSION_MARKERS.iter().any(|m| l.contains(m)))
    {
        return AcquireError::PermissionDenied {
            details: Some(line.trim().to_string()),
        };
    }

    let last = stderr
        .iter()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| "ffmpeg exited without a video stream".to_string());
    AcquireError::Other(last)
}
