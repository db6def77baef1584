//! Scripted capture host shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use screenshare_probe::capture::{
    AcquireError, CaptureConstraints, CaptureHost, CaptureStream, EndedCallback, PreviewFrame,
    TrackSettings,
};
use screenshare_probe::DisplaySurface;

/// What the next capture request resolves to.
#[derive(Debug, Clone)]
pub enum Outcome {
    Grant(TrackSettings),
    GrantWithFrame(TrackSettings, PreviewFrame),
    GrantWithoutVideo,
    Fail(AcquireError),
}

/// State observable from a test after the host moved into a controller.
#[derive(Default)]
pub struct Tracker {
    live: AtomicUsize,
    max_live: AtomicUsize,
    acquires: AtomicUsize,
    callbacks: Mutex<Vec<Option<EndedCallback>>>,
    constraints: Mutex<Vec<CaptureConstraints>>,
}

impl Tracker {
    /// Streams acquired and not yet stopped.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of live streams ever observed.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn constraints(&self) -> Vec<CaptureConstraints> {
        self.constraints.lock().unwrap().clone()
    }

    /// Whether stream `n` (0-based, in grant order) still has a callback.
    pub fn has_callback(&self, n: usize) -> bool {
        self.callbacks
            .lock()
            .unwrap()
            .get(n)
            .is_some_and(|cb| cb.is_some())
    }

    /// Simulate the host ending stream `n`, e.g. the OS "stop sharing" bar.
    ///
    /// Returns whether a callback was attached.
    pub fn end_from_host(&self, n: usize) -> bool {
        let cb = self
            .callbacks
            .lock()
            .unwrap()
            .get_mut(n)
            .and_then(Option::take);
        match cb {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }

    /// Take stream `n`'s callback without firing it.
    pub fn take_callback(&self, n: usize) -> Option<EndedCallback> {
        self.callbacks.lock().unwrap().get_mut(n).and_then(Option::take)
    }
}

pub struct ScriptedHost {
    supported: bool,
    outcomes: Mutex<VecDeque<Outcome>>,
    tracker: Arc<Tracker>,
}

impl ScriptedHost {
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            supported: true,
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            tracker: Arc::new(Tracker::default()),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new([])
        }
    }

    pub fn tracker(&self) -> Arc<Tracker> {
        Arc::clone(&self.tracker)
    }
}

impl CaptureHost for ScriptedHost {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> BoxFuture<'_, Result<Box<dyn CaptureStream>, AcquireError>> {
        self.tracker.acquires.fetch_add(1, Ordering::SeqCst);
        self.tracker.constraints.lock().unwrap().push(*constraints);
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Outcome::Fail(AcquireError::Other("script exhausted".into())));

        Box::pin(async move {
            tokio::task::yield_now().await;
            let (settings, frame) = match outcome {
                Outcome::Grant(settings) => (Some(settings), None),
                Outcome::GrantWithFrame(settings, frame) => (Some(settings), Some(frame)),
                Outcome::GrantWithoutVideo => (None, None),
                Outcome::Fail(e) => return Err(e),
            };

            let live = self.tracker.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.tracker.max_live.fetch_max(live, Ordering::SeqCst);
            let slot = {
                let mut callbacks = self.tracker.callbacks.lock().unwrap();
                callbacks.push(None);
                callbacks.len() - 1
            };

            Ok(Box::new(ScriptedStream {
                settings,
                frame,
                slot,
                tracker: Arc::clone(&self.tracker),
                stopped: false,
            }) as Box<dyn CaptureStream>)
        })
    }
}

pub struct ScriptedStream {
    settings: Option<TrackSettings>,
    frame: Option<PreviewFrame>,
    slot: usize,
    tracker: Arc<Tracker>,
    stopped: bool,
}

impl CaptureStream for ScriptedStream {
    fn video_track_settings(&self) -> Option<TrackSettings> {
        self.settings
    }

    fn set_on_ended(&mut self, callback: EndedCallback) {
        if !self.stopped {
            self.tracker.callbacks.lock().unwrap()[self.slot] = Some(callback);
        }
    }

    fn stop_tracks(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.tracker.callbacks.lock().unwrap()[self.slot] = None;
        self.tracker.live.fetch_sub(1, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        !self.stopped
    }

    fn latest_frame(&self) -> Option<PreviewFrame> {
        self.frame.clone()
    }
}

pub fn monitor_1080p() -> TrackSettings {
    TrackSettings {
        width: Some(1920),
        height: Some(1080),
        display_surface: Some(DisplaySurface::Monitor),
    }
}

pub fn window_720p() -> TrackSettings {
    TrackSettings {
        width: Some(1280),
        height: Some(720),
        display_surface: Some(DisplaySurface::Window),
    }
}
