//! Capture lifecycle controller.
//!
//! Owns the status, the metadata of the current capture and at most one
//! live [`CaptureStream`]. Status only changes through the operations
//! here, and every change is written to the [`StatusStore`] and published
//! to receivers from [`CaptureController::subscribe`].
//!
//! ```text
//! idle ──start──▶ requesting ──▶ granted ──stop / host end──▶ ended
//!   ▲                  │
//!   │                  ├──▶ denied | cancelled | error
//!   └──── go_home ◀────┘   (start on an unsupported host ▶ unsupported)
//! ```

use tokio::sync::{mpsc, watch};

use crate::capture::{AcquireError, CaptureConstraints, CaptureHost, CaptureStream};
use crate::status::{CaptureMetadata, CaptureStatus};
use crate::store::StatusStore;

/// Tag of one acquired stream. Increases with every grant.
pub type SessionId = u64;

/// Notifications delivered from capture hosts to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The host ended the capture of the given session.
    TrackEnded(SessionId),
}

/// Everything the presentation layer needs to draw a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub status: CaptureStatus,
    pub metadata: Option<CaptureMetadata>,
    pub has_stream: bool,
    /// A capture request is awaiting the host right now. A `requesting`
    /// status loaded from the store has no request behind it.
    pub request_pending: bool,
}

struct ActiveCapture {
    id: SessionId,
    stream: Box<dyn CaptureStream>,
}

/// The capture state machine.
pub struct CaptureController<H, S> {
    host: H,
    store: S,
    constraints: CaptureConstraints,
    status: CaptureStatus,
    metadata: Option<CaptureMetadata>,
    active: Option<ActiveCapture>,
    request_pending: bool,
    next_session: SessionId,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<H: CaptureHost, S: StatusStore> CaptureController<H, S> {
    /// Build a controller seeded with the stored status.
    pub fn new(host: H, store: S) -> Self {
        let status = store.load();
        log::debug!("Initial capture status: {}", status);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            status,
            metadata: None,
            has_stream: false,
            request_pending: false,
        });

        Self {
            host,
            store,
            constraints: CaptureConstraints::default(),
            status,
            metadata: None,
            active: None,
            request_pending: false,
            next_session: 1,
            events_tx,
            events_rx,
            snapshot_tx,
        }
    }

    /// Use `constraints` for subsequent capture requests.
    pub fn with_constraints(mut self, constraints: CaptureConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn metadata(&self) -> Option<CaptureMetadata> {
        self.metadata
    }

    /// The held stream, for binding a preview. Never stop it through this.
    pub fn stream(&self) -> Option<&dyn CaptureStream> {
        self.active.as_ref().map(|a| a.stream.as_ref())
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn constraints(&self) -> &CaptureConstraints {
        &self.constraints
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            metadata: self.metadata,
            has_stream: self.active.is_some(),
            request_pending: self.request_pending,
        }
    }

    /// Receiver that sees a new snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Request a capture.
    ///
    /// Any held stream is released first, so two captures are never live
    /// together. Failures never escape: they become `unsupported`,
    /// `denied`, `cancelled` or `error`, and `None` is returned.
    pub async fn start(&mut self) -> Option<&dyn CaptureStream> {
        if !self.host.is_supported() {
            log::warn!("Capture is not supported on this host");
            self.transition(CaptureStatus::Unsupported);
            return None;
        }

        self.release();
        self.request_pending = true;
        self.transition(CaptureStatus::Requesting);

        let result = self.host.acquire(&self.constraints).await;
        self.request_pending = false;
        let mut stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                let status = match &e {
                    AcquireError::PermissionDenied { .. } => CaptureStatus::Denied,
                    AcquireError::UserAborted => CaptureStatus::Cancelled,
                    AcquireError::Other(_) => CaptureStatus::Error,
                };
                log::info!("Capture request rejected: {}", e);
                self.transition(status);
                return None;
            }
        };

        let Some(settings) = stream.video_track_settings() else {
            log::warn!("Granted stream has no video track");
            stream.stop_tracks();
            self.transition(CaptureStatus::Error);
            return None;
        };

        let id = self.next_session;
        self.next_session += 1;

        let tx = self.events_tx.clone();
        stream.set_on_ended(Box::new(move || {
            let _ = tx.send(SessionEvent::TrackEnded(id));
        }));

        self.metadata = Some(settings.into());
        self.active = Some(ActiveCapture { id, stream });
        log::info!("Capture session {} granted", id);
        self.transition(CaptureStatus::Granted);

        self.stream()
    }

    /// Release the held stream and metadata without touching the status.
    ///
    /// Safe to call when nothing is held.
    pub fn release_for_reacquire(&mut self) {
        self.release();
        self.publish();
    }

    /// Release the held stream and metadata, then move to `ended`.
    ///
    /// Idempotent.
    pub fn stop_and_end(&mut self) {
        self.release();
        self.transition(CaptureStatus::Ended);
    }

    /// Release anything held and go back to `idle`.
    pub fn go_home(&mut self) {
        self.release();
        self.transition(CaptureStatus::Idle);
    }

    /// Apply one host notification.
    ///
    /// Notifications for a session other than the current one are stale
    /// and ignored.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::TrackEnded(id) if self.session_id() == Some(id) => {
                log::info!("Capture session {} ended by host", id);
                self.stop_and_end();
            }
            SessionEvent::TrackEnded(id) => {
                log::debug!("Ignoring end of stale session {}", id);
            }
        }
    }

    /// Apply every queued notification; returns how many were handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next host notification.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    fn release(&mut self) {
        if let Some(mut active) = self.active.take() {
            log::debug!("Releasing capture session {}", active.id);
            active.stream.stop_tracks();
        }
        self.metadata = None;
    }

    fn transition(&mut self, to: CaptureStatus) {
        if self.status != to {
            log::info!("Capture status: {} -> {}", self.status, to);
        }
        self.status = to;
        self.store.save(to);
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

impl<H, S> Drop for CaptureController<H, S> {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            log::debug!("Releasing capture session {} on teardown", active.id);
            active.stream.stop_tracks();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{EndedCallback, TrackSettings};
    use crate::status::DisplaySurface;
    use crate::store::MemoryStatusStore;
    use futures_util::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Callbacks = Arc<Mutex<Vec<Option<EndedCallback>>>>;

    struct Stream {
        settings: Option<TrackSettings>,
        live: Arc<AtomicUsize>,
        slot: usize,
        callbacks: Callbacks,
        stopped: bool,
    }

    impl CaptureStream for Stream {
        fn video_track_settings(&self) -> Option<TrackSettings> {
            self.settings
        }
        fn set_on_ended(&mut self, callback: EndedCallback) {
            self.callbacks.lock().unwrap()[self.slot] = Some(callback);
        }
        fn stop_tracks(&mut self) {
            if !self.stopped {
                self.stopped = true;
                self.live.fetch_sub(1, Ordering::SeqCst);
                self.callbacks.lock().unwrap()[self.slot] = None;
            }
        }
        fn is_live(&self) -> bool {
            !self.stopped
        }
    }

    #[derive(Default)]
    struct Host {
        unsupported: bool,
        outcomes: Mutex<VecDeque<Result<Option<TrackSettings>, AcquireError>>>,
        live: Arc<AtomicUsize>,
        callbacks: Callbacks,
    }

    impl Host {
        fn granting(n: usize) -> Self {
            let host = Host::default();
            for _ in 0..n {
                host.outcomes.lock().unwrap().push_back(Ok(Some(monitor())));
            }
            host
        }

        fn failing(err: AcquireError) -> Self {
            let host = Host::default();
            host.outcomes.lock().unwrap().push_back(Err(err));
            host
        }

        fn end_from_host(&self, slot: usize) {
            let cb = self.callbacks.lock().unwrap()[slot].take();
            if let Some(cb) = cb {
                cb();
            }
        }
    }

    impl CaptureHost for Host {
        fn is_supported(&self) -> bool {
            !self.unsupported
        }
        fn acquire(
            &self,
            _constraints: &CaptureConstraints,
        ) -> BoxFuture<'_, Result<Box<dyn CaptureStream>, AcquireError>> {
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AcquireError::Other("no script".into())));
            Box::pin(async move {
                let settings = outcome?;
                self.live.fetch_add(1, Ordering::SeqCst);
                let mut callbacks = self.callbacks.lock().unwrap();
                callbacks.push(None);
                Ok(Box::new(Stream {
                    settings,
                    live: Arc::clone(&self.live),
                    slot: callbacks.len() - 1,
                    callbacks: Arc::clone(&self.callbacks),
                    stopped: false,
                }) as Box<dyn CaptureStream>)
            })
        }
    }

    fn monitor() -> TrackSettings {
        TrackSettings {
            width: Some(1920),
            height: Some(1080),
            display_surface: Some(DisplaySurface::Monitor),
        }
    }

    #[tokio::test]
    async fn test_start_grants_and_reports_metadata() {
        let mut controller = CaptureController::new(Host::granting(1), MemoryStatusStore::new());
        assert!(controller.start().await.is_some());
        assert_eq!(controller.status(), CaptureStatus::Granted);
        assert_eq!(controller.metadata(), Some(CaptureMetadata::from(monitor())));
        assert_eq!(controller.session_id(), Some(1));
    }

    #[tokio::test]
    async fn test_failures_map_to_statuses() {
        let cases = [
            (AcquireError::PermissionDenied { details: None }, CaptureStatus::Denied),
            (AcquireError::UserAborted, CaptureStatus::Cancelled),
            (AcquireError::Other("boom".into()), CaptureStatus::Error),
        ];
        for (err, expected) in cases {
            let mut controller = CaptureController::new(Host::failing(err), MemoryStatusStore::new());
            assert!(controller.start().await.is_none());
            assert_eq!(controller.status(), expected);
            assert!(controller.metadata().is_none());
            assert!(controller.stream().is_none());
        }
    }

    #[tokio::test]
    async fn test_stream_without_video_track_is_error() {
        let host = Host::default();
        host.outcomes.lock().unwrap().push_back(Ok(None));
        let live = Arc::clone(&host.live);
        let mut controller = CaptureController::new(host, MemoryStatusStore::new());

        assert!(controller.start().await.is_none());
        assert_eq!(controller.status(), CaptureStatus::Error);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restart_releases_previous_stream() {
        let host = Host::granting(2);
        let live = Arc::clone(&host.live);
        let mut controller = CaptureController::new(host, MemoryStatusStore::new());

        controller.start().await;
        controller.start().await;
        assert_eq!(live.load(Ordering::SeqCst), 1);
        assert_eq!(controller.session_id(), Some(2));
    }

    #[tokio::test]
    async fn test_stale_end_notification_ignored() {
        let mut controller = CaptureController::new(Host::granting(2), MemoryStatusStore::new());
        controller.start().await;
        controller.start().await;

        controller.handle_event(SessionEvent::TrackEnded(1));
        assert_eq!(controller.status(), CaptureStatus::Granted);

        controller.handle_event(SessionEvent::TrackEnded(2));
        assert_eq!(controller.status(), CaptureStatus::Ended);
        assert!(controller.stream().is_none());
    }

    #[tokio::test]
    async fn test_host_end_is_dispatched() {
        let host = Host::granting(1);
        let callbacks = Arc::clone(&host.callbacks);
        let mut controller = CaptureController::new(host, MemoryStatusStore::new());
        controller.start().await;

        let cb = callbacks.lock().unwrap()[0].take().unwrap();
        cb();
        assert_eq!(controller.dispatch_pending(), 1);
        assert_eq!(controller.status(), CaptureStatus::Ended);
        assert!(controller.metadata().is_none());
    }

    #[tokio::test]
    async fn test_end_callback_dropped_on_release() {
        let host = Host::granting(1);
        let callbacks = Arc::clone(&host.callbacks);
        let mut controller = CaptureController::new(host, MemoryStatusStore::new());
        controller.start().await;
        controller.stop_and_end();

        assert!(callbacks.lock().unwrap()[0].is_none());
        controller.host().end_from_host(0);
        assert_eq!(controller.dispatch_pending(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_host_skips_acquire() {
        let host = Host {
            unsupported: true,
            ..Host::granting(1)
        };
        let mut controller = CaptureController::new(host, MemoryStatusStore::new());
        assert!(controller.start().await.is_none());
        assert_eq!(controller.status(), CaptureStatus::Unsupported);
        assert_eq!(controller.host().outcomes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let mut controller = CaptureController::new(Host::granting(1), MemoryStatusStore::new());
        let mut rx = controller.subscribe();
        assert_eq!(rx.borrow_and_update().status, CaptureStatus::Idle);

        controller.start().await;
        assert!(rx.has_changed().unwrap());
        let snap = *rx.borrow_and_update();
        assert_eq!(snap.status, CaptureStatus::Granted);
        assert!(snap.has_stream);
        assert!(snap.metadata.is_some());
        assert!(!snap.request_pending);
    }

    #[tokio::test]
    async fn test_loaded_requesting_has_no_pending_request() {
        let store = MemoryStatusStore::with_status(CaptureStatus::Requesting);
        let controller = CaptureController::new(Host::default(), store);
        let snap = controller.snapshot();
        assert_eq!(snap.status, CaptureStatus::Requesting);
        assert!(!snap.request_pending);
        assert!(!controller.subscribe().borrow().request_pending);
    }

    #[tokio::test]
    async fn test_drop_releases_stream_without_status_change() {
        let host = Host::granting(1);
        let live = Arc::clone(&host.live);
        let store = MemoryStatusStore::new();
        {
            let mut controller = CaptureController::new(host, store.clone());
            controller.start().await;
            assert_eq!(live.load(Ordering::SeqCst), 1);
        }
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert_eq!(store.stored(), Some(CaptureStatus::Granted));
    }
}
