//! Session coordinator.
//!
//! `Session` ties the pieces together and is the only entry point the
//! connection layer uses:
//!
//! ```text
//!   connect() ──► ClientRegistry ◄── Broadcaster ◄── SubjectTimeline (one per subject)
//!                      │                                   │
//!   handle_message() ──┼──► SessionState (view mode) ◄─────┘
//!                      │          ▲
//!                      └──► ProfileTasks ──► ProfileStreamer (one per profiling client)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use attn_core::{ClientId, ClientMessage, ServerMessage, SubjectId, WindowSequence};
use attn_telemetry::Metrics;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::clients::{ClientMode, ClientRegistry};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::profile::{ProfileStreamer, ProfileTasks};
use crate::state::{ResyncReport, SessionSnapshot, SessionState};
use crate::timeline::{SubjectTimeline, TimelineExit};

/// Process-wide replay session.
#[derive(Clone)]
pub struct Session {
    config: Arc<SessionConfig>,
    state: SessionState,
    clients: ClientRegistry,
    broadcaster: Broadcaster,
    profiles: ProfileTasks,
    timelines: Arc<Mutex<Vec<JoinHandle<TimelineExit>>>>,
    timelines_started: Arc<AtomicBool>,
    /// Serializes view-mode transitions across their cancel/replace awaits.
    transitions: Arc<AsyncMutex<()>>,
    shutdown: CancellationToken,
}

impl Session {
    /// Create a session over the prepared subjects. Timelines start with the
    /// first client connection.
    pub fn new(
        config: SessionConfig,
        subjects: impl IntoIterator<Item = (SubjectId, WindowSequence)>,
    ) -> Self {
        let state = SessionState::new(subjects, config.resync_clamp, config.profile_cursor);
        let clients = ClientRegistry::new(config.client_queue_capacity);
        let shutdown = CancellationToken::new();
        Self {
            broadcaster: Broadcaster::new(clients.clone()),
            profiles: ProfileTasks::new(shutdown.clone()),
            config: Arc::new(config),
            state,
            clients,
            timelines: Arc::new(Mutex::new(Vec::new())),
            timelines_started: Arc::new(AtomicBool::new(false)),
            transitions: Arc::new(AsyncMutex::new(())),
            shutdown,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn profiles(&self) -> &ProfileTasks {
        &self.profiles
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// Register a new observer and return its outbound queue.
    ///
    /// The first connection launches the subject timelines.
    pub fn connect(&self) -> (ClientId, mpsc::Receiver<ServerMessage>) {
        let (client, rx) = self.clients.register();
        Metrics::client_connected();
        info!(client = %client, connected = self.clients.len(), "Client connected");
        self.launch_timelines();
        (client, rx)
    }

    /// Spawn one timeline per subject. Only the first call has an effect.
    pub fn launch_timelines(&self) -> bool {
        if self
            .timelines_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let mut handles = self.timelines.lock();
        for subject in self.state.subject_ids() {
            let timeline = SubjectTimeline::new(
                subject,
                self.state.clone(),
                self.broadcaster.clone(),
                self.config.tick_interval(),
                self.shutdown.child_token(),
            );
            handles.push(tokio::spawn(timeline.run()));
        }
        info!(subjects = handles.len(), "Subject timelines launched");
        true
    }

    /// Dispatch one client request.
    pub async fn handle_message(&self, client: ClientId, message: ClientMessage) -> SessionResult<()> {
        match message {
            ClientMessage::Dashboard => self.identify_dashboard(client).await,
            ClientMessage::StartStream { subject } => self.start_profile(client, subject).await,
            ClientMessage::StopStream => self.stop_profile(client).await.map(|_| ()),
            ClientMessage::Unknown => {
                warn!(client = %client, "Unknown message type received");
                Ok(())
            }
        }
    }

    /// Mark `client` as a dashboard observer, clear suppression and send it
    /// the current label of every subject.
    pub async fn identify_dashboard(&self, client: ClientId) -> SessionResult<()> {
        let tx = self
            .clients
            .sender(client)
            .ok_or(SessionError::UnknownClient(client))?;
        {
            let _transition = self.transitions.lock().await;
            self.clients.set_mode(client, ClientMode::Dashboard);
            self.state.clear_suppression();
        }
        info!(client = %client, "Dashboard client identified");

        for (subject, label) in self.state.dashboard_labels() {
            if tx
                .send(ServerMessage::dashboard_update(subject, label))
                .await
                .is_err()
            {
                return Err(SessionError::ClientGone(client));
            }
        }
        Ok(())
    }

    /// Enter profile view of `subject` for `client`.
    ///
    /// Suppresses every other subject, cancels streams of a previously active
    /// subject and replaces the client's own stream. Viewers of the previous
    /// subject fall back to the dashboard.
    pub async fn start_profile(&self, client: ClientId, subject: SubjectId) -> SessionResult<()> {
        let tx = self
            .clients
            .sender(client)
            .ok_or(SessionError::UnknownClient(client))?;
        let _transition = self.transitions.lock().await;
        let previous = self.state.start_profile(subject)?;
        info!(client = %client, subject = %subject, previous = ?previous, "Profile view started");

        if let Some(previous) = previous.filter(|p| *p != subject) {
            let cancelled = self.profiles.cancel_subject(previous).await;
            for viewer in self.clients.viewers_of(previous) {
                self.clients.set_mode(viewer, ClientMode::Dashboard);
                debug!(
                    client = %viewer,
                    subject = %previous,
                    streaming = cancelled.contains(&viewer),
                    "Profile view superseded"
                );
            }
        }
        self.clients
            .set_mode(client, ClientMode::ProfileViewing(subject));

        let state = self.state.clone();
        let interval = self.config.tick_interval();
        let window_secs = self.config.window_secs;
        self.profiles
            .replace(client, move |cancel| {
                ProfileStreamer::new(subject, client, tx, state, interval, window_secs, cancel)
            })
            .await;
        Ok(())
    }

    /// Leave profile view: resynchronize suppressed cursors, resume dashboard
    /// broadcast and stop the client's stream.
    pub async fn stop_profile(&self, client: ClientId) -> SessionResult<Option<ResyncReport>> {
        if !self.clients.contains(client) {
            return Err(SessionError::UnknownClient(client));
        }
        let _transition = self.transitions.lock().await;
        let report = self.state.stop_profile();
        match &report {
            Some(report) => {
                Metrics::resync();
                info!(
                    client = %client,
                    subject = %report.profile_subject,
                    cursor = report.target_cursor,
                    resynced = report.resynced.len(),
                    "Profile view stopped, cursors resynchronized"
                );
            }
            None => debug!(client = %client, "Stop requested with no active profile"),
        }

        self.profiles.cancel(client).await;
        self.clients.set_mode(client, ClientMode::Dashboard);
        Ok(report)
    }

    /// Drop `client` and everything it owns. Safe to call more than once.
    pub async fn disconnect(&self, client: ClientId) {
        let removed = self.clients.remove(client);
        self.profiles.cancel(client).await;
        self.state.forget_client(client);
        if removed {
            Metrics::client_disconnected();
            info!(client = %client, connected = self.clients.len(), "Client disconnected");
        }
    }

    /// Stop every timeline and stream and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("Session shutdown requested");
        self.shutdown.cancel();
        self.profiles.cancel_all().await;
        let handles: Vec<_> = std::mem::take(&mut *self.timelines.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Timeline task failed");
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub async fn cancelled(&self) {
        self.shutdown.cancelled().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("clients", &self.clients.len())
            .field("profiles", &self.profiles)
            .field("timelines_started", &self.timelines_started.load(Ordering::Relaxed))
            .finish()
    }
}
