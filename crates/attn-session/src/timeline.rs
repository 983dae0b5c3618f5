//! Per-subject real-time replay.
//!
//! A timeline ticks its subject once per interval: the first tick happens
//! immediately, then one every `T`. Ticks keep advancing the cursor while the
//! subject is suppressed; suppression only decides whether the update is
//! published.

use std::time::Duration;

use attn_core::{ServerMessage, SubjectId};
use attn_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::state::SessionState;

/// Why a timeline stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineExit {
    /// The cursor reached the end of the sequence.
    Exhausted { ticks: usize },
    /// Session shutdown.
    Cancelled { ticks: usize },
    /// The subject is not part of the session.
    UnknownSubject,
}

/// Replay loop of one subject.
pub struct SubjectTimeline {
    subject: SubjectId,
    state: SessionState,
    broadcaster: Broadcaster,
    interval: Duration,
    shutdown: CancellationToken,
}

impl SubjectTimeline {
    pub fn new(
        subject: SubjectId,
        state: SessionState,
        broadcaster: Broadcaster,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            subject,
            state,
            broadcaster,
            interval,
            shutdown,
        }
    }

    /// Tick until the sequence is exhausted or the session shuts down.
    pub async fn run(self) -> TimelineExit {
        let subject_label = self.subject.to_string();
        let mut ticks = 0usize;

        loop {
            if self.shutdown.is_cancelled() {
                return TimelineExit::Cancelled { ticks };
            }

            let outcome = match self.state.tick(self.subject) {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    info!(subject = %self.subject, ticks, "Timeline exhausted");
                    return TimelineExit::Exhausted { ticks };
                }
                Err(e) => {
                    warn!(subject = %self.subject, error = %e, "Timeline stopped");
                    return TimelineExit::UnknownSubject;
                }
            };
            ticks += 1;
            Metrics::tick(&subject_label);

            if outcome.broadcast {
                debug!(
                    subject = %self.subject,
                    window = outcome.index + 1,
                    label = %outcome.label,
                    "Dashboard tick"
                );
                self.broadcaster
                    .publish(&ServerMessage::dashboard_update(self.subject, outcome.label));
            } else {
                debug!(
                    subject = %self.subject,
                    window = outcome.index + 1,
                    "Tick suppressed"
                );
                Metrics::dashboard_suppressed();
            }

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = self.shutdown.cancelled() => {
                    return TimelineExit::Cancelled { ticks };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientRegistry;
    use crate::config::ProfileCursorMode;
    use attn_core::{AttentionLevel, WindowSequence};

    const T: Duration = Duration::from_secs(5);

    fn setup(len: usize) -> (SessionState, ClientRegistry) {
        let windows: WindowSequence = (0..len)
            .map(|i| if i % 2 == 0 { AttentionLevel::High } else { AttentionLevel::Low })
            .collect();
        let state = SessionState::new(
            [(SubjectId::new(1), windows.clone()), (SubjectId::new(2), windows)],
            true,
            ProfileCursorMode::Shared,
        );
        (state, ClientRegistry::new(64))
    }

    fn spawn(
        subject: u32,
        state: &SessionState,
        clients: &ClientRegistry,
        token: &CancellationToken,
    ) -> tokio::task::JoinHandle<TimelineExit> {
        tokio::spawn(
            SubjectTimeline::new(
                SubjectId::new(subject),
                state.clone(),
                Broadcaster::new(clients.clone()),
                T,
                token.clone(),
            )
            .run(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_cadence_until_exhausted() {
        let (state, clients) = setup(3);
        let (_client, mut rx) = clients.register();
        let token = CancellationToken::new();

        let handle = spawn(1, &state, &clients, &token);

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            ServerMessage::dashboard_update(SubjectId::new(1), AttentionLevel::High)
        );
        let started = tokio::time::Instant::now();
        let second = rx.recv().await.unwrap();
        assert_eq!(started.elapsed(), T);
        assert_eq!(
            second,
            ServerMessage::dashboard_update(SubjectId::new(1), AttentionLevel::Low)
        );

        assert_eq!(handle.await.unwrap(), TimelineExit::Exhausted { ticks: 3 });
        assert_eq!(state.cursor(SubjectId::new(1)).unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppressed_subject_advances_silently() {
        let (state, clients) = setup(4);
        let (_client, mut rx) = clients.register();
        state.start_profile(SubjectId::new(2)).unwrap();
        let token = CancellationToken::new();

        let handle = spawn(1, &state, &clients, &token);
        assert_eq!(handle.await.unwrap(), TimelineExit::Exhausted { ticks: 4 });

        assert_eq!(state.cursor(SubjectId::new(1)).unwrap(), 4);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_wait() {
        let (state, clients) = setup(100);
        let token = CancellationToken::new();

        let handle = spawn(1, &state, &clients, &token);
        tokio::time::sleep(T * 2 + Duration::from_millis(1)).await;
        token.cancel();

        assert_eq!(handle.await.unwrap(), TimelineExit::Cancelled { ticks: 3 });
    }

    #[tokio::test]
    async fn test_unknown_subject() {
        let (state, clients) = setup(1);
        let token = CancellationToken::new();
        let exit = spawn(9, &state, &clients, &token).await.unwrap();
        assert_eq!(exit, TimelineExit::UnknownSubject);
    }
}
