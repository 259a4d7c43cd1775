use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::{
    errors::{AccessError, AcquireError},
    state::{AuthorizationStatus, GateSnapshot, GateView},
};

use super::traits::{CaptureRequest, CaptureStream, MediaPlatform, PermissionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Granted,
    Denied(AccessError),
}

impl AccessOutcome {
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Granted => None,
            Self::Denied(err) => Some(err.to_string()),
        }
    }
}

/// Single completion channel for the gate's owner.
pub trait OutcomeHandler: Send + Sync {
    fn on_outcome(&self, outcome: &AccessOutcome);
}

impl<F> OutcomeHandler for F
where
    F: Fn(&AccessOutcome) + Send + Sync,
{
    fn on_outcome(&self, outcome: &AccessOutcome) {
        self(outcome)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GateOptions {
    pub notify_on_denied_query: bool,
}

/// Handle for one acquisition attempt taken out of the gate, so callers can
/// await the platform without holding the gate.
pub struct AcquireTicket<P: MediaPlatform + ?Sized> {
    generation: u64,
    platform: Arc<P>,
}

impl<P: MediaPlatform + ?Sized> AcquireTicket<P> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn acquire(&self) -> Result<Box<dyn CaptureStream>, AcquireError> {
        self.platform.acquire(CaptureRequest::video_only()).await
    }
}

pub struct PermissionGate<P: MediaPlatform + ?Sized> {
    platform: Arc<P>,
    handler: Box<dyn OutcomeHandler>,
    options: GateOptions,
    status: AuthorizationStatus,
    supported: Option<bool>,
    generation: u64,
    last_message: Option<String>,
}

impl<P: MediaPlatform + ?Sized> PermissionGate<P> {
    pub fn new(
        platform: Arc<P>,
        handler: impl OutcomeHandler + 'static,
        options: GateOptions,
    ) -> Self {
        Self {
            platform,
            handler: Box::new(handler),
            options,
            status: AuthorizationStatus::Checking,
            supported: None,
            generation: 0,
            last_message: None,
        }
    }

    pub async fn mount(&mut self) {
        if self.check_support() {
            self.check_existing_authorization().await;
        }
    }

    /// Probes once; later calls return the cached answer without notifying.
    pub fn check_support(&mut self) -> bool {
        if let Some(supported) = self.supported {
            return supported;
        }

        let supported = self.platform.supports_capture();
        self.supported = Some(supported);
        if !supported {
            warn!("camera capture is not supported on this host");
            self.emit(AccessOutcome::Denied(AccessError::UnsupportedEnvironment));
        }
        supported
    }

    pub async fn check_existing_authorization(&mut self) {
        if self.supported == Some(false) {
            return;
        }

        match self.platform.query_permission().await {
            Ok(PermissionState::Granted) => {
                info!("camera permission already granted");
                self.status = AuthorizationStatus::Granted;
                self.emit(AccessOutcome::Granted);
            }
            Ok(PermissionState::Denied) => {
                info!("camera permission previously denied, waiting for retry");
                self.status = AuthorizationStatus::Denied;
                if self.options.notify_on_denied_query {
                    self.emit(AccessOutcome::Denied(AccessError::AuthorizationRefused));
                }
            }
            Ok(PermissionState::Prompt) => {
                self.status = AuthorizationStatus::PromptNeeded;
            }
            Err(err) => {
                debug!("permission query unavailable: {err:#}");
                self.status = AuthorizationStatus::PromptNeeded;
            }
        }
    }

    pub async fn request_authorization(&mut self) -> Option<AccessOutcome> {
        let ticket = self.begin_request()?;
        let result = ticket.acquire().await;
        self.finish_request(ticket.generation(), result).await
    }

    /// Moves to `Checking` and supersedes any attempt still in flight.
    /// Returns `None` when the host cannot capture at all.
    pub fn begin_request(&mut self) -> Option<AcquireTicket<P>> {
        if self.supported == Some(false) {
            return None;
        }

        self.generation += 1;
        self.status = AuthorizationStatus::Checking;
        debug!("camera acquisition attempt {} started", self.generation);
        Some(AcquireTicket {
            generation: self.generation,
            platform: self.platform.clone(),
        })
    }

    /// Applies an attempt's result. Streams are always released; results of
    /// superseded attempts change nothing and return `None`.
    pub async fn finish_request(
        &mut self,
        generation: u64,
        result: Result<Box<dyn CaptureStream>, AcquireError>,
    ) -> Option<AccessOutcome> {
        let current = generation == self.generation;

        let outcome = match result {
            Ok(mut stream) => {
                let tracks = stream.track_count();
                if let Err(err) = stream.stop_tracks().await {
                    warn!("failed to release camera stream: {err:#}");
                } else {
                    debug!("released camera stream ({tracks} track(s))");
                }
                AccessOutcome::Granted
            }
            Err(err) => {
                warn!("camera acquisition failed: {err}");
                AccessOutcome::Denied(AccessError::from(err))
            }
        };

        if !current {
            debug!(
                "ignoring superseded acquisition attempt {generation} (current {})",
                self.generation
            );
            return None;
        }

        self.status = match outcome {
            AccessOutcome::Granted => AuthorizationStatus::Granted,
            AccessOutcome::Denied(_) => AuthorizationStatus::Denied,
        };
        info!("camera authorization is now {:?}", self.status);
        self.emit(outcome.clone());
        Some(outcome)
    }

    pub fn status(&self) -> AuthorizationStatus {
        self.status
    }

    pub fn view(&self) -> GateView {
        GateView::resolve(self.supported, self.status)
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            supported: self.supported,
            status: self.status,
            view: self.view(),
            message: self.last_message.clone(),
        }
    }

    fn emit(&mut self, outcome: AccessOutcome) {
        self.last_message = outcome.message();
        self.handler.on_outcome(&outcome);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use anyhow::anyhow;
    use async_trait::async_trait;

    use crate::{
        camera::traits::{CaptureRequest, CaptureStream, MediaPlatform, PermissionState},
        core::{
            errors::{AccessError, AcquireError},
            state::{AuthorizationStatus, GateView},
        },
    };

    use super::{AccessOutcome, GateOptions, PermissionGate};

    struct MockStream {
        tracks: usize,
        stopped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CaptureStream for MockStream {
        fn track_count(&self) -> usize {
            self.tracks
        }

        async fn stop_tracks(&mut self) -> anyhow::Result<()> {
            self.stopped.fetch_add(self.tracks, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockPlatform {
        supported: bool,
        query: Option<PermissionState>,
        acquire_results: Mutex<VecDeque<Result<(), AcquireError>>>,
        acquire_calls: AtomicUsize,
        last_request: Mutex<Option<CaptureRequest>>,
        stopped_tracks: Arc<AtomicUsize>,
    }

    impl MockPlatform {
        fn new(supported: bool, query: Option<PermissionState>) -> Self {
            Self {
                supported,
                query,
                acquire_results: Mutex::new(VecDeque::new()),
                acquire_calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
                stopped_tracks: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn then_acquire(self, result: Result<(), AcquireError>) -> Self {
            self.acquire_results
                .lock()
                .expect("mock lock")
                .push_back(result);
            self
        }

        fn acquire_calls(&self) -> usize {
            self.acquire_calls.load(Ordering::SeqCst)
        }

        fn stopped_tracks(&self) -> usize {
            self.stopped_tracks.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaPlatform for MockPlatform {
        fn supports_capture(&self) -> bool {
            self.supported
        }

        async fn query_permission(&self) -> anyhow::Result<PermissionState> {
            self.query
                .ok_or_else(|| anyhow!("permission query is not available"))
        }

        async fn acquire(
            &self,
            request: CaptureRequest,
        ) -> Result<Box<dyn CaptureStream>, AcquireError> {
            self.acquire_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().expect("mock lock") = Some(request);
            let next = self
                .acquire_results
                .lock()
                .expect("mock lock")
                .pop_front()
                .unwrap_or(Ok(()));
            next.map(|()| {
                Box::new(MockStream {
                    tracks: 2,
                    stopped: self.stopped_tracks.clone(),
                }) as Box<dyn CaptureStream>
            })
        }
    }

    type Recorded = Arc<Mutex<Vec<AccessOutcome>>>;

    fn gate_with(
        platform: Arc<MockPlatform>,
        options: GateOptions,
    ) -> (PermissionGate<MockPlatform>, Recorded) {
        let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = recorded.clone();
        let gate = PermissionGate::new(
            platform,
            move |outcome: &AccessOutcome| {
                sink.lock().expect("recorder lock").push(outcome.clone());
            },
            options,
        );
        (gate, recorded)
    }

    fn outcomes(recorded: &Recorded) -> Vec<AccessOutcome> {
        recorded.lock().expect("recorder lock").clone()
    }

    #[tokio::test]
    async fn starts_in_checking() {
        let platform = Arc::new(MockPlatform::new(true, None));
        let (gate, recorded) = gate_with(platform, GateOptions::default());
        assert_eq!(gate.status(), AuthorizationStatus::Checking);
        assert_eq!(gate.snapshot().supported, None);
        assert!(outcomes(&recorded).is_empty());
    }

    #[tokio::test]
    async fn unsupported_host_denies_once_and_stays_unsupported() {
        let platform = Arc::new(MockPlatform::new(false, Some(PermissionState::Granted)));
        let (mut gate, recorded) = gate_with(platform.clone(), GateOptions::default());

        gate.mount().await;
        assert!(!gate.check_support());
        gate.check_existing_authorization().await;
        assert!(gate.request_authorization().await.is_none());

        assert_eq!(
            outcomes(&recorded),
            vec![AccessOutcome::Denied(AccessError::UnsupportedEnvironment)]
        );
        assert_eq!(gate.view(), GateView::Unsupported);
        assert_eq!(gate.snapshot().supported, Some(false));
        assert_eq!(platform.acquire_calls(), 0);
        assert!(
            gate.snapshot()
                .message
                .expect("message should be kept")
                .contains("not supported")
        );
    }

    #[tokio::test]
    async fn existing_grant_notifies_without_acquiring() {
        let platform = Arc::new(MockPlatform::new(true, Some(PermissionState::Granted)));
        let (mut gate, recorded) = gate_with(platform.clone(), GateOptions::default());

        gate.mount().await;

        assert_eq!(gate.status(), AuthorizationStatus::Granted);
        assert_eq!(outcomes(&recorded), vec![AccessOutcome::Granted]);
        assert_eq!(platform.acquire_calls(), 0);
    }

    #[tokio::test]
    async fn existing_denial_waits_for_retry_silently() {
        let platform = Arc::new(MockPlatform::new(true, Some(PermissionState::Denied)));
        let (mut gate, recorded) = gate_with(platform.clone(), GateOptions::default());

        gate.mount().await;

        assert_eq!(gate.status(), AuthorizationStatus::Denied);
        assert!(outcomes(&recorded).is_empty());
        assert_eq!(platform.acquire_calls(), 0);
    }

    #[tokio::test]
    async fn existing_denial_can_notify_when_configured() {
        let platform = Arc::new(MockPlatform::new(true, Some(PermissionState::Denied)));
        let (mut gate, recorded) = gate_with(
            platform,
            GateOptions {
                notify_on_denied_query: true,
            },
        );

        gate.mount().await;

        assert_eq!(
            outcomes(&recorded),
            vec![AccessOutcome::Denied(AccessError::AuthorizationRefused)]
        );
    }

    #[tokio::test]
    async fn prompt_answer_needs_prompt() {
        let platform = Arc::new(MockPlatform::new(true, Some(PermissionState::Prompt)));
        let (mut gate, recorded) = gate_with(platform, GateOptions::default());

        gate.mount().await;

        assert_eq!(gate.status(), AuthorizationStatus::PromptNeeded);
        assert!(outcomes(&recorded).is_empty());
    }

    #[tokio::test]
    async fn unavailable_query_falls_back_to_prompt() {
        let platform = Arc::new(MockPlatform::new(true, None));
        let (mut gate, recorded) = gate_with(platform, GateOptions::default());

        gate.mount().await;

        assert_eq!(gate.status(), AuthorizationStatus::PromptNeeded);
        assert_eq!(gate.view(), GateView::PromptNeeded);
        assert!(outcomes(&recorded).is_empty());
    }

    #[tokio::test]
    async fn successful_request_grants_and_releases_every_track() {
        let platform = Arc::new(MockPlatform::new(true, Some(PermissionState::Denied)));
        let (mut gate, recorded) = gate_with(platform.clone(), GateOptions::default());
        gate.mount().await;

        let ticket = gate.begin_request().expect("request should start");
        assert_eq!(gate.status(), AuthorizationStatus::Checking);
        let result = ticket.acquire().await;
        let outcome = gate.finish_request(ticket.generation(), result).await;

        assert_eq!(outcome, Some(AccessOutcome::Granted));
        assert_eq!(gate.status(), AuthorizationStatus::Granted);
        assert_eq!(outcomes(&recorded), vec![AccessOutcome::Granted]);
        assert_eq!(platform.stopped_tracks(), 2);
        assert_eq!(
            *platform.last_request.lock().expect("mock lock"),
            Some(CaptureRequest::video_only())
        );
    }

    #[tokio::test]
    async fn refused_request_reports_permission_denied() {
        let platform = Arc::new(
            MockPlatform::new(true, Some(PermissionState::Prompt))
                .then_acquire(Err(AcquireError::not_allowed("NotAllowedError"))),
        );
        let (mut gate, recorded) = gate_with(platform, GateOptions::default());
        gate.mount().await;

        let outcome = gate
            .request_authorization()
            .await
            .expect("outcome should be reported");

        assert_eq!(gate.status(), AuthorizationStatus::Denied);
        assert_eq!(outcomes(&recorded).len(), 1);
        assert!(
            outcome
                .message()
                .expect("denial has a message")
                .contains("permission was denied")
        );
    }

    #[tokio::test]
    async fn missing_device_reports_no_camera() {
        let platform = Arc::new(
            MockPlatform::new(true, Some(PermissionState::Prompt))
                .then_acquire(Err(AcquireError::not_found("NotFoundError"))),
        );
        let (mut gate, _recorded) = gate_with(platform, GateOptions::default());
        gate.mount().await;

        let outcome = gate.request_authorization().await;

        assert_eq!(
            outcome,
            Some(AccessOutcome::Denied(AccessError::DeviceUnavailable))
        );
        assert!(
            gate.snapshot()
                .message
                .expect("message should be kept")
                .contains("No camera found")
        );
    }

    #[tokio::test]
    async fn unknown_failure_carries_description() {
        let platform = Arc::new(
            MockPlatform::new(true, None)
                .then_acquire(Err(AcquireError::other("Device or resource busy"))),
        );
        let (mut gate, _recorded) = gate_with(platform, GateOptions::default());
        gate.mount().await;

        let outcome = gate.request_authorization().await;

        assert_eq!(
            outcome,
            Some(AccessOutcome::Denied(AccessError::UnknownAcquisitionFailure(
                "Device or resource busy".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn denial_is_recoverable_by_retry() {
        let platform = Arc::new(
            MockPlatform::new(true, Some(PermissionState::Prompt))
                .then_acquire(Err(AcquireError::not_allowed("NotAllowedError")))
                .then_acquire(Ok(())),
        );
        let (mut gate, recorded) = gate_with(platform.clone(), GateOptions::default());
        gate.mount().await;

        gate.request_authorization().await;
        assert_eq!(gate.status(), AuthorizationStatus::Denied);
        gate.request_authorization().await;

        assert_eq!(gate.status(), AuthorizationStatus::Granted);
        assert_eq!(
            outcomes(&recorded),
            vec![
                AccessOutcome::Denied(AccessError::AuthorizationRefused),
                AccessOutcome::Granted,
            ]
        );
        assert_eq!(gate.snapshot().message, None);
        assert_eq!(platform.acquire_calls(), 2);
    }

    #[tokio::test]
    async fn newer_request_supersedes_pending_result() {
        let platform = Arc::new(
            MockPlatform::new(true, None)
                .then_acquire(Ok(()))
                .then_acquire(Err(AcquireError::not_found("NotFoundError"))),
        );
        let (mut gate, recorded) = gate_with(platform.clone(), GateOptions::default());
        gate.mount().await;

        let first = gate.begin_request().expect("first request should start");
        let second = gate.begin_request().expect("second request should start");
        let first_result = first.acquire().await;
        let second_result = second.acquire().await;

        let latest = gate
            .finish_request(second.generation(), second_result)
            .await;
        let stale = gate.finish_request(first.generation(), first_result).await;

        assert_eq!(
            latest,
            Some(AccessOutcome::Denied(AccessError::DeviceUnavailable))
        );
        assert_eq!(stale, None);
        assert_eq!(gate.status(), AuthorizationStatus::Denied);
        assert_eq!(outcomes(&recorded).len(), 1);
        assert_eq!(platform.stopped_tracks(), 2);
    }

    #[tokio::test]
    async fn grant_from_prompt_when_query_is_missing() {
        let platform = Arc::new(MockPlatform::new(true, None).then_acquire(Ok(())));
        let (mut gate, recorded) = gate_with(platform.clone(), GateOptions::default());

        gate.mount().await;
        assert_eq!(gate.view(), GateView::PromptNeeded);

        gate.request_authorization().await;

        assert_eq!(outcomes(&recorded), vec![AccessOutcome::Granted]);
        assert_eq!(gate.view(), GateView::Granted);
        assert_eq!(platform.stopped_tracks(), 2);
    }
}
