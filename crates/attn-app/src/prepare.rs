//! Subject preparation.
//!
//! Turns each subject's raw recording into its window sequence. This is CPU
//! bound and runs once at startup; a subject that fails to load or classify
//! is skipped and the rest proceed.

use std::sync::Arc;
use std::time::Instant;

use attn_core::{
    derive_window_sequence, BufferSource, Classifier, FeatureExtractor, SubjectId, WindowSequence,
};
use attn_signal::{BandRatioExtractor, CentroidClassifier, JsonBufferSource, SignalConfig};
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};

/// Loader, extractor and classifier for a batch of subjects.
#[derive(Clone)]
pub struct SubjectPreparer {
    source: Arc<dyn BufferSource>,
    extractor: Arc<dyn FeatureExtractor>,
    classifier: Arc<dyn Classifier>,
}

impl SubjectPreparer {
    pub fn new(
        source: Arc<dyn BufferSource>,
        extractor: Arc<dyn FeatureExtractor>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            source,
            extractor,
            classifier,
        }
    }

    /// Default collaborators: JSON recordings, band-ratio features and the
    /// centroid model. A missing or invalid model is fatal.
    pub fn from_config(config: &SignalConfig) -> AppResult<Self> {
        let classifier = CentroidClassifier::from_file(&config.model_path)?;
        info!(
            model = %config.model_path.display(),
            dimension = classifier.dimension(),
            "Classifier model loaded"
        );
        Ok(Self::new(
            Arc::new(JsonBufferSource::new(config.data_dir.clone())),
            Arc::new(BandRatioExtractor::new(config)),
            Arc::new(classifier),
        ))
    }

    /// Prepare one subject.
    pub fn prepare_one(&self, subject: SubjectId) -> AppResult<WindowSequence> {
        let buffer = self
            .source
            .load(subject)
            .map_err(|source| AppError::Load { subject, source })?;
        derive_window_sequence(&buffer, self.extractor.as_ref(), self.classifier.as_ref())
            .map_err(|source| AppError::Classify { subject, source })
    }

    /// Prepare every subject in order, skipping failures.
    pub fn prepare_all(&self, subjects: &[SubjectId]) -> Vec<(SubjectId, WindowSequence)> {
        let mut prepared = Vec::with_capacity(subjects.len());
        for &subject in subjects {
            let started = Instant::now();
            match self.prepare_one(subject) {
                Ok(windows) => {
                    if windows.is_empty() {
                        warn!(subject = %subject, "Recording shorter than one window");
                    }
                    info!(
                        subject = %subject,
                        windows = windows.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Subject prepared"
                    );
                    prepared.push((subject, windows));
                }
                Err(e) => {
                    error!(subject = %subject, error = %e, "Subject preparation failed, skipping");
                }
            }
        }
        prepared
    }

    /// Run `prepare_all` on the blocking pool.
    pub async fn prepare_all_blocking(
        &self,
        subjects: Vec<SubjectId>,
    ) -> AppResult<Vec<(SubjectId, WindowSequence)>> {
        let preparer = self.clone();
        tokio::task::spawn_blocking(move || preparer.prepare_all(&subjects))
            .await
            .map_err(|e| AppError::Preparation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attn_core::{AttentionLevel, CollaboratorError, RawBuffer};
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Source {}
        impl BufferSource for Source {
            fn load(&self, subject: SubjectId) -> Result<RawBuffer, CollaboratorError>;
        }
    }

    mock! {
        Model {}
        impl Classifier for Model {
            fn classify(&self, features: &[f64]) -> Result<AttentionLevel, CollaboratorError>;
        }
    }

    /// One feature per sample: the first channel's value.
    struct SampleExtractor;

    impl FeatureExtractor for SampleExtractor {
        fn extract(&self, buffer: &RawBuffer) -> Vec<Vec<f64>> {
            (0..buffer.len())
                .map(|i| buffer.channel_slice(0, i, i + 1))
                .collect()
        }
    }

    fn buffer(values: &[f64]) -> RawBuffer {
        RawBuffer::new(values.iter().map(|v| vec![*v]).collect()).unwrap()
    }

    fn threshold_model() -> MockModel {
        let mut model = MockModel::new();
        model.expect_classify().returning(|features| {
            Ok(if features[0] > 0.5 {
                AttentionLevel::High
            } else {
                AttentionLevel::Low
            })
        });
        model
    }

    #[test]
    fn test_failing_subject_is_skipped() {
        let mut source = MockSource::new();
        source
            .expect_load()
            .with(eq(SubjectId::new(1)))
            .returning(|_| Ok(buffer(&[0.1, 0.9, 0.7])));
        source
            .expect_load()
            .with(eq(SubjectId::new(2)))
            .returning(|_| Err("missing recording".into()));
        source
            .expect_load()
            .with(eq(SubjectId::new(3)))
            .returning(|_| Ok(buffer(&[0.8])));

        let preparer = SubjectPreparer::new(
            Arc::new(source),
            Arc::new(SampleExtractor),
            Arc::new(threshold_model()),
        );
        let prepared =
            preparer.prepare_all(&[SubjectId::new(1), SubjectId::new(2), SubjectId::new(3)]);

        let ids: Vec<SubjectId> = prepared.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![SubjectId::new(1), SubjectId::new(3)]);
        assert_eq!(
            prepared[0].1.as_slice(),
            &[AttentionLevel::Low, AttentionLevel::High, AttentionLevel::High]
        );
    }

    #[test]
    fn test_classifier_failure_fails_subject() {
        let mut source = MockSource::new();
        source.expect_load().returning(|_| Ok(buffer(&[0.1, 0.2])));
        let mut model = MockModel::new();
        model
            .expect_classify()
            .times(1)
            .returning(|_| Err("dimension mismatch".into()));

        let preparer =
            SubjectPreparer::new(Arc::new(source), Arc::new(SampleExtractor), Arc::new(model));
        let err = preparer.prepare_one(SubjectId::new(4)).unwrap_err();
        assert!(matches!(err, AppError::Classify { subject, .. } if subject == SubjectId::new(4)));
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[test]
    fn test_load_failure_is_typed() {
        let mut source = MockSource::new();
        source
            .expect_load()
            .returning(|_| Err("missing recording".into()));
        let preparer = SubjectPreparer::new(
            Arc::new(source),
            Arc::new(SampleExtractor),
            Arc::new(threshold_model()),
        );

        let err = preparer.prepare_one(SubjectId::new(2)).unwrap_err();
        assert!(matches!(err, AppError::Load { subject, .. } if subject == SubjectId::new(2)));
        assert_eq!(
            err.to_string(),
            "Failed to load subject 2: missing recording"
        );
    }

    #[tokio::test]
    async fn test_prepare_on_blocking_pool() {
        let mut source = MockSource::new();
        source.expect_load().returning(|_| Ok(buffer(&[0.9, 0.1])));

        let preparer = SubjectPreparer::new(
            Arc::new(source),
            Arc::new(SampleExtractor),
            Arc::new(threshold_model()),
        );
        let prepared = tokio_test::assert_ok!(
            preparer.prepare_all_blocking(vec![SubjectId::new(7)]).await
        );
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].1.len(), 2);
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = SignalConfig {
            model_path: dir.path().join("absent.json"),
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(SubjectPreparer::from_config(&config).is_err());
    }

    #[test]
    fn test_default_collaborators_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let model = serde_json::json!({
            "scaler": { "mean": [0.0], "scale": [1.0] },
            "centroids": [[1.0], [10.0], [0.01]]
        });
        let model_path = dir.path().join("model.json");
        std::fs::write(&model_path, model.to_string()).unwrap();

        let config = SignalConfig {
            model_path,
            data_dir: dir.path().to_path_buf(),
            sampling_rate: 64,
            window_secs: 2,
            theta_band: [4.0, 8.0],
            low_beta_band: [13.0, 20.0],
            ..Default::default()
        };
        // 6 Hz sine: theta dominates, so every window lands near the large-ratio centroid.
        let samples: Vec<Vec<f64>> = (0..64 * 4)
            .map(|i| {
                let t = i as f64 / 64.0;
                vec![(2.0 * std::f64::consts::PI * 6.0 * t).sin()]
            })
            .collect();
        std::fs::write(
            dir.path().join("child_1.json"),
            serde_json::to_string(&samples).unwrap(),
        )
        .unwrap();

        let preparer = SubjectPreparer::from_config(&config).unwrap();
        let windows = preparer.prepare_one(SubjectId::new(1)).unwrap();
        // 256 samples, window 128, step 64.
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|level| level == AttentionLevel::High));
    }
}
