//! Main application orchestration.
//!
//! Startup order:
//! 1. Load the classifier model and prepare every configured subject
//! 2. Build the replay session over the prepared subjects
//! 3. Serve WebSocket / HTTP until Ctrl-C, then stop the session

use attn_core::SubjectId;
use attn_server::ServerConfig;
use attn_session::Session;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::prepare::SubjectPreparer;

/// Main application.
pub struct Application {
    config: AppConfig,
    preparer: SubjectPreparer,
}

impl Application {
    /// Create the application with the default collaborators.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let preparer = SubjectPreparer::from_config(&config.signal)?;
        Ok(Self::with_preparer(config, preparer))
    }

    /// Create the application with custom collaborators.
    pub fn with_preparer(config: AppConfig, preparer: SubjectPreparer) -> Self {
        Self { config, preparer }
    }

    /// Prepare subjects and build the session. Fails if no subject survives.
    pub async fn build_session(&self) -> AppResult<Session> {
        let subjects: Vec<SubjectId> = self
            .config
            .signal
            .subjects
            .iter()
            .copied()
            .map(SubjectId::new)
            .collect();
        info!(subjects = subjects.len(), "Preparing subjects");

        let prepared = self.preparer.prepare_all_blocking(subjects.clone()).await?;
        if prepared.is_empty() {
            return Err(AppError::NoSubjects);
        }
        if prepared.len() < subjects.len() {
            warn!(
                prepared = prepared.len(),
                requested = subjects.len(),
                "Some subjects were skipped"
            );
        }

        Ok(Session::new(self.config.session.clone(), prepared))
    }

    /// Run until Ctrl-C or a server failure.
    pub async fn run(self) -> AppResult<()> {
        let session = self.build_session().await?;
        self.serve(session, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await
    }

    /// Serve `session` until `shutdown` resolves, then stop every timeline and
    /// stream.
    pub async fn serve<F>(&self, session: Session, shutdown: F) -> AppResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let server_config: ServerConfig = self.config.server.clone();
        let listener = attn_server::bind(&server_config).await?;
        info!(
            addr = %listener.local_addr()?,
            tick_interval_ms = self.config.session.tick_interval_ms,
            subjects = session.state().subject_ids().len(),
            "Replay service ready"
        );

        let server_stop = CancellationToken::new();
        let stop = server_stop.clone();
        let mut server = tokio::spawn(attn_server::serve(
            listener,
            session.clone(),
            server_config,
            async move { stop.cancelled().await },
        ));

        let result = tokio::select! {
            () = shutdown => Ok(()),
            joined = &mut server => match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(AppError::from(e)),
                Err(e) => Err(AppError::Io(std::io::Error::other(e.to_string()))),
            },
        };

        info!("Shutting down");
        session.shutdown().await;
        server_stop.cancel();
        if !server.is_finished() {
            match server.await {
                Ok(Err(e)) => warn!(error = %e, "Server stopped with error"),
                Err(e) => warn!(error = %e, "Server task failed"),
                Ok(Ok(())) => {}
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attn_core::{
        AttentionLevel, BufferSource, Classifier, CollaboratorError, FeatureExtractor, RawBuffer,
    };
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedSource {
        fail: Vec<u32>,
    }

    impl BufferSource for FixedSource {
        fn load(&self, subject: SubjectId) -> Result<RawBuffer, CollaboratorError> {
            if self.fail.contains(&subject.index()) {
                return Err(format!("no recording for {subject}").into());
            }
            Ok(RawBuffer::new(vec![vec![0.0]; 4])?)
        }
    }

    struct CountExtractor;

    impl FeatureExtractor for CountExtractor {
        fn extract(&self, buffer: &RawBuffer) -> Vec<Vec<f64>> {
            vec![vec![0.0]; buffer.len()]
        }
    }

    struct ConstClassifier;

    impl Classifier for ConstClassifier {
        fn classify(&self, _features: &[f64]) -> Result<AttentionLevel, CollaboratorError> {
            Ok(AttentionLevel::High)
        }
    }

    fn app(subjects: Vec<u32>, fail: Vec<u32>) -> Application {
        let mut config = AppConfig::default();
        config.signal.subjects = subjects;
        config.server.bind_addr = "127.0.0.1".to_string();
        config.server.port = 0;
        let preparer = SubjectPreparer::new(
            Arc::new(FixedSource { fail }),
            Arc::new(CountExtractor),
            Arc::new(ConstClassifier),
        );
        Application::with_preparer(config, preparer)
    }

    #[tokio::test]
    async fn test_build_session_skips_failed_subjects() {
        let session = app(vec![1, 2, 3], vec![2]).build_session().await.unwrap();
        assert_eq!(
            session.state().subject_ids(),
            vec![SubjectId::new(1), SubjectId::new(3)]
        );
        assert_eq!(session.state().windows(SubjectId::new(1)).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_no_subjects_is_fatal() {
        let err = app(vec![1], vec![1]).build_session().await.unwrap_err();
        assert!(matches!(err, AppError::NoSubjects));
    }

    #[tokio::test]
    async fn test_serve_stops_session_on_shutdown() {
        let app = app(vec![1, 2], vec![]);
        let session = app.build_session().await.unwrap();
        session.launch_timelines();

        app.serve(session.clone(), tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(session.is_shutdown());
    }
}
