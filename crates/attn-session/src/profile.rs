//! Profile streaming.
//!
//! A `ProfileStreamer` replays one subject's windows to one client, starting
//! just after the subject's last delivered window, one frame per interval.
//! Only a successful send advances the delivery cursor; a failed send ends the
//! stream. Cancellation is observed at both suspension points (send and wait).
//!
//! `ProfileTasks` owns the per-client task handles: installing a new stream
//! first cancels and awaits the client's previous one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use attn_core::{ClientId, ServerMessage, SubjectId};
use attn_telemetry::Metrics;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::SessionState;

/// Why a profile stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    /// Every remaining window was delivered.
    Completed { delivered: usize },
    /// Replaced, stopped, or the client disconnected.
    Cancelled { delivered: usize },
    /// The client's queue was closed.
    SendFailed { delivered: usize },
}

impl StreamExit {
    pub fn delivered(&self) -> usize {
        match self {
            Self::Completed { delivered }
            | Self::Cancelled { delivered }
            | Self::SendFailed { delivered } => *delivered,
        }
    }
}

/// Replays one subject to one client.
pub struct ProfileStreamer {
    subject: SubjectId,
    client: ClientId,
    tx: mpsc::Sender<ServerMessage>,
    state: SessionState,
    interval: Duration,
    window_secs: u64,
    cancel: CancellationToken,
}

impl ProfileStreamer {
    pub fn new(
        subject: SubjectId,
        client: ClientId,
        tx: mpsc::Sender<ServerMessage>,
        state: SessionState,
        interval: Duration,
        window_secs: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            subject,
            client,
            tx,
            state,
            interval,
            window_secs,
            cancel,
        }
    }

    pub fn subject(&self) -> SubjectId {
        self.subject
    }

    pub async fn run(self) -> StreamExit {
        let mut delivered = 0usize;
        let windows = match self.state.windows(self.subject) {
            Ok(windows) => windows,
            Err(e) => {
                warn!(subject = %self.subject, client = %self.client, error = %e, "Profile stream rejected");
                return StreamExit::Completed { delivered };
            }
        };
        let mut index = match self.state.profile_start_index(self.subject, self.client) {
            Ok(index) => index,
            Err(_) => return StreamExit::Completed { delivered },
        };
        let subject_label = self.subject.to_string();

        info!(
            subject = %self.subject,
            client = %self.client,
            from_window = index + 1,
            total_windows = windows.len(),
            "Profile stream started"
        );

        while let Some(label) = windows.get(index) {
            let frame = ServerMessage::profile_data(self.subject, index, label, self.window_secs);

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return self.cancelled(delivered);
                }
                sent = self.tx.send(frame) => {
                    if sent.is_err() {
                        warn!(subject = %self.subject, client = %self.client, window = index + 1, "Profile send failed");
                        return StreamExit::SendFailed { delivered };
                    }
                }
            }

            // Only reached after a successful send.
            if let Err(e) = self.state.record_profile_delivery(self.subject, self.client, index) {
                warn!(subject = %self.subject, error = %e, "Failed to record profile delivery");
            }
            debug!(
                subject = %self.subject,
                client = %self.client,
                window = index + 1,
                label = %label,
                "Profile frame sent"
            );
            Metrics::profile_frame(&subject_label);
            delivered += 1;
            index += 1;

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    return self.cancelled(delivered);
                }
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(subject = %self.subject, client = %self.client, delivered, "Profile stream completed");
        StreamExit::Completed { delivered }
    }

    fn cancelled(&self, delivered: usize) -> StreamExit {
        debug!(subject = %self.subject, client = %self.client, delivered, "Profile stream cancelled");
        StreamExit::Cancelled { delivered }
    }
}

struct ProfileTask {
    generation: u64,
    subject: SubjectId,
    cancel: CancellationToken,
    handle: JoinHandle<StreamExit>,
}

/// Client → running profile stream.
#[derive(Clone)]
pub struct ProfileTasks {
    tasks: Arc<Mutex<HashMap<ClientId, ProfileTask>>>,
    next_generation: Arc<AtomicU64>,
    shutdown: CancellationToken,
}

impl ProfileTasks {
    /// Streams are cancelled as well when `shutdown` fires.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(1)),
            shutdown,
        }
    }

    /// Token a new stream should observe.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Cancel the client's current stream (if any), wait for it to end, then
    /// spawn `build(token)` as the client's new stream.
    pub async fn replace<F>(&self, client: ClientId, build: F)
    where
        F: FnOnce(CancellationToken) -> ProfileStreamer,
    {
        self.cancel(client).await;

        let cancel = self.child_token();
        let streamer = build(cancel.clone());
        let subject = streamer.subject();
        self.spawn_tracked(client, subject, cancel, streamer.run());
    }

    /// Spawn `stream` as the client's task. The entry and the active-stream
    /// gauge are released when the task ends, including by panic.
    fn spawn_tracked<Fut>(
        &self,
        client: ClientId,
        subject: SubjectId,
        cancel: CancellationToken,
        stream: Fut,
    ) where
        Fut: Future<Output = StreamExit> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        // Insert under the lock so a stream that finishes immediately still
        // finds its own entry to remove.
        let mut tasks = self.tasks.lock();
        let slot = StreamSlot::acquire(self.clone(), client, generation);
        let handle = tokio::spawn(async move {
            let _slot = slot;
            stream.await
        });
        tasks.insert(
            client,
            ProfileTask {
                generation,
                subject,
                cancel,
                handle,
            },
        );
    }

    /// Cancel and await the client's stream. Returns how it ended, or `None`
    /// if there was none.
    pub async fn cancel(&self, client: ClientId) -> Option<StreamExit> {
        let task = self.tasks.lock().remove(&client)?;
        task.cancel.cancel();
        match task.handle.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                warn!(client = %client, error = %e, "Profile task failed");
                None
            }
        }
    }

    /// Cancel and await every stream of `subject`, whichever client owns it.
    /// Returns the affected clients.
    pub async fn cancel_subject(&self, subject: SubjectId) -> Vec<ClientId> {
        let owners: Vec<ClientId> = self
            .tasks
            .lock()
            .iter()
            .filter(|(_, task)| task.subject == subject)
            .map(|(client, _)| *client)
            .collect();
        for client in &owners {
            self.cancel(*client).await;
        }
        owners
    }

    /// Cancel and await every stream.
    pub async fn cancel_all(&self) {
        let clients: Vec<ClientId> = self.tasks.lock().keys().copied().collect();
        for client in clients {
            self.cancel(client).await;
        }
    }

    /// Subject of the client's running stream.
    pub fn running_subject(&self, client: ClientId) -> Option<SubjectId> {
        self.tasks.lock().get(&client).map(|task| task.subject)
    }

    pub fn active_count(&self) -> usize {
        self.tasks.lock().len()
    }

    fn finish(&self, client: ClientId, generation: u64) {
        let mut tasks = self.tasks.lock();
        if tasks.get(&client).map(|task| task.generation) == Some(generation) {
            tasks.remove(&client);
        }
    }
}

/// One running stream's claim on the registry entry and the gauge.
struct StreamSlot {
    registry: ProfileTasks,
    client: ClientId,
    generation: u64,
}

impl StreamSlot {
    fn acquire(registry: ProfileTasks, client: ClientId, generation: u64) -> Self {
        Metrics::profile_stream_started();
        Self {
            registry,
            client,
            generation,
        }
    }
}

impl Drop for StreamSlot {
    fn drop(&mut self) {
        self.registry.finish(self.client, self.generation);
        Metrics::profile_stream_ended();
    }
}

impl std::fmt::Debug for ProfileTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileTasks")
            .field("active", &self.active_count())
            .finish()
    }
}
