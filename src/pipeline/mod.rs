//! Pipeline orchestration.
//!
//! The orchestrator owns one submission's lifecycle end to end: admission,
//! input sanitization, the two model stages, the fail-closed code gate,
//! packaging, and response shaping. It short-circuits on the first failure
//! and never retries anything itself; retry policy lives in exactly one
//! place, the model invoker.

mod response;

pub use response::{AnalysisSummary, ErrorBody, PipelineOutcome, ResponseMetadata};

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::analysis::parse_analysis;
use crate::anthropic::DEFAULT_MAX_ATTEMPTS;
use crate::artifact::Packager;
use crate::error::PipelineError;
use crate::limiter::RateLimiter;
use crate::prompts::{analysis_prompt, code_generation_prompt, SYSTEM_PROMPT};
use crate::sanitize::{frame_user_content, sanitize_code, sanitize_input};
use crate::traits::{CompletionRequest, ModelClient, ObjectStore};

/// Title of every packaged artifact document.
const ARTIFACT_TITLE: &str = "Mind Visualization";

/// One accepted submission.
///
/// Immutable once constructed; `client_id` is an opaque string (typically
/// the caller IP) used only for rate-limit bucketing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    /// Raw untrusted user text.
    pub text: String,
    /// Rate-limit bucketing key.
    pub client_id: String,
}

impl SubmissionRequest {
    /// Create a submission from free text.
    #[must_use]
    pub fn new(text: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            client_id: client_id.into(),
        }
    }

    /// Create a submission from labeled answers (the guided flow).
    ///
    /// Each `(label, answer)` pair becomes one `label: answer` line of the
    /// submission body, in iteration order.
    #[must_use]
    pub fn from_answers<'a, I>(answers: I, client_id: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut text = String::new();
        for (label, answer) in answers {
            let _ = writeln!(text, "{label}: {answer}");
        }
        Self {
            text,
            client_id: client_id.into(),
        }
    }
}

/// Pipeline stages, in order.
///
/// Every stage has a failure edge into the taxonomy of
/// [`PipelineError`]; reaching [`Stage::Completed`] means an artifact was
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Rate limiter admitted the request.
    Admitted,
    /// Input sanitized and framed.
    Sanitized,
    /// Stage-1 reply parsed and validated.
    Analyzed,
    /// Stage-2 reply received.
    CodeGenerated,
    /// Generated code cleaned and verified.
    CodeVerified,
    /// Artifact uploaded.
    Packaged,
    /// Response assembled.
    Completed,
}

/// The pipeline orchestrator.
///
/// Holds injected handles to every collaborator; nothing in here is a
/// process-wide singleton. Per-request state lives on the stack of
/// [`Pipeline::process`], so concurrent submissions share nothing but the
/// limiter's store.
pub struct Pipeline {
    model: Arc<dyn ModelClient>,
    limiter: RateLimiter,
    packager: Packager,
    model_attempts: u32,
}

impl Pipeline {
    /// Assemble a pipeline from its components.
    #[must_use]
    pub fn new(
        model: Arc<dyn ModelClient>,
        store: Arc<dyn ObjectStore>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            model,
            limiter,
            packager: Packager::new(store),
            model_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Record the model invoker's attempt budget (for error reporting).
    #[must_use]
    pub const fn with_model_attempts(mut self, model_attempts: u32) -> Self {
        self.model_attempts = model_attempts;
        self
    }

    /// Run one submission through the whole pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`] encountered; no stage is retried
    /// here beyond what the model invoker already retries internally.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn process(
        &self,
        submission: SubmissionRequest,
    ) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();

        let decision = self.limiter.admit(&submission.client_id).await;
        if !decision.allowed {
            return Err(PipelineError::AdmissionDenied {
                limit: decision.limit,
                remaining: decision.remaining,
                reset_at: decision.reset_at,
            });
        }
        tracing::debug!(stage = ?Stage::Admitted, remaining = decision.remaining);

        let framed = frame_user_content(&sanitize_input(&submission.text));
        tracing::debug!(stage = ?Stage::Sanitized, chars = framed.len());

        let analysis_reply = self
            .model
            .complete(CompletionRequest::new(analysis_prompt(&framed)).with_system(SYSTEM_PROMPT))
            .await
            .map_err(|e| PipelineError::from_api(e, self.model_attempts))?;

        let analysis = parse_analysis(&analysis_reply.raw_text)?;
        tracing::debug!(
            stage = ?Stage::Analyzed,
            concepts = analysis.concept_count(),
            connections = analysis.connection_count(),
        );

        let code_reply = self
            .model
            .complete(
                CompletionRequest::new(code_generation_prompt(&analysis))
                    .with_system(SYSTEM_PROMPT),
            )
            .await
            .map_err(|e| PipelineError::from_api(e, self.model_attempts))?;
        tracing::debug!(stage = ?Stage::CodeGenerated, bytes = code_reply.raw_text.len());

        let safe_code = sanitize_code(&code_reply.raw_text)?;
        tracing::debug!(stage = ?Stage::CodeVerified);

        let artifact = self.packager.package(&safe_code, ARTIFACT_TITLE).await?;
        tracing::debug!(stage = ?Stage::Packaged, artifact_id = %artifact.id);

        let processing_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            stage = ?Stage::Completed,
            processing_time_ms,
            total_tokens = analysis_reply.usage.total() + code_reply.usage.total(),
            artifact_id = %artifact.id,
            "submission completed"
        );

        Ok(PipelineOutcome {
            id: artifact.id,
            url: artifact.url,
            analysis: AnalysisSummary::from(&analysis),
            metadata: ResponseMetadata {
                processing_time_ms,
                timestamp: Utc::now().to_rfc3339(),
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::{ApiError, StorageError};
    use crate::limiter::{InMemoryWindowStore, RateLimiter, RateLimiterConfig};
    use crate::sanitize::NEUTRALIZED_MARKER;
    use crate::test_utils::{
        mock_model_error, mock_model_stages, mock_store_success, sample_analysis_json,
        sample_scene_code,
    };
    use crate::traits::{MockModelClient, MockObjectStore, ModelReply, StoredObject, Usage};

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            Arc::new(InMemoryWindowStore::new()),
            RateLimiterConfig::default(),
        )
    }

    fn submission() -> SubmissionRequest {
        SubmissionRequest::new("I was flying over a vast ocean at twilight", "203.0.113.7")
    }

    #[test]
    fn test_from_answers_labels_lines() {
        let submission = SubmissionRequest::from_answers(
            [("calling", "building things"), ("fear", "stagnation")],
            "ip",
        );
        assert_eq!(submission.text, "calling: building things\nfear: stagnation\n");
        assert_eq!(submission.client_id, "ip");
    }

    #[tokio::test]
    async fn test_happy_path_produces_outcome() {
        let model = mock_model_stages(&sample_analysis_json(), &sample_scene_code());
        let pipeline = Pipeline::new(Arc::new(model), Arc::new(mock_store_success()), limiter());

        let outcome = pipeline.process(submission()).await.unwrap();

        assert_eq!(outcome.id.len(), 10);
        assert!(outcome.url.contains(&outcome.id));
        assert_eq!(outcome.analysis.concept_count, 3);
        assert_eq!(outcome.analysis.connection_count, 2);
        assert_eq!(outcome.analysis.recommended_meditation, "deep-focus");
    }

    #[tokio::test]
    async fn test_admission_denied_short_circuits() {
        // The warmup request spends the 1-request budget; the second must be
        // denied before the model or the store is touched again.
        let mut model = MockModelClient::new();
        model
            .expect_complete()
            .times(1)
            .returning(|_| Ok(ModelReply::new("not json", Usage::new(1, 1))));
        let mut store = MockObjectStore::new();
        store.expect_put().never();

        let limiter = RateLimiter::new(
            Arc::new(InMemoryWindowStore::new()),
            RateLimiterConfig::new().with_max_requests(1),
        );
        let pipeline = Pipeline::new(Arc::new(model), Arc::new(store), limiter);

        let warmup = pipeline.process(submission()).await;
        assert!(matches!(warmup, Err(PipelineError::MalformedResponse { .. })));

        let err = pipeline.process(submission()).await.unwrap_err();
        assert!(matches!(err, PipelineError::AdmissionDenied { limit: 1, .. }));
        assert!(err.retry_after().is_some());
    }

    #[tokio::test]
    async fn test_malformed_analysis_stops_before_stage_two() {
        let mut model = MockModelClient::new();
        model
            .expect_complete()
            .times(1)
            .returning(|_| Ok(ModelReply::new("no json here", Usage::new(1, 1))));
        let mut store = MockObjectStore::new();
        store.expect_put().never();

        let pipeline = Pipeline::new(Arc::new(model), Arc::new(store), limiter());
        let err = pipeline.process(submission()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_unsafe_code_never_reaches_storage() {
        // Stage 2 returns code with an obfuscated eval the cleanup pass
        // cannot neutralize; the gate must fail closed before packaging.
        let hostile = format!("{}\neval (atob('x'));", sample_scene_code());
        let model = mock_model_stages(&sample_analysis_json(), &hostile);
        let mut store = MockObjectStore::new();
        store.expect_put().never();

        let pipeline = Pipeline::new(Arc::new(model), Arc::new(store), limiter());
        let err = pipeline.process(submission()).await.unwrap_err();
        assert!(
            matches!(err, PipelineError::UnsafeContent { ref signature } if signature == "eval-call")
        );
    }

    #[tokio::test]
    async fn test_cleanable_code_is_packaged_with_marker() {
        let cleanable = format!("{}\nlocalStorage.setItem('k','v');", sample_scene_code());
        let model = mock_model_stages(&sample_analysis_json(), &cleanable);

        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .withf(|_, content, _| {
                content.contains(NEUTRALIZED_MARKER) && !content.contains("localStorage")
            })
            .times(1)
            .returning(|key, _, _| {
                Ok(StoredObject {
                    url: format!("https://bucket.test/{key}"),
                })
            });

        let pipeline = Pipeline::new(Arc::new(model), Arc::new(store), limiter());
        let outcome = pipeline.process(submission()).await.unwrap();
        assert!(outcome.url.contains("visualizations/"));
    }

    #[tokio::test]
    async fn test_model_timeout_maps_into_taxonomy() {
        let model = mock_model_error(ApiError::Timeout { timeout_ms: 30_000 });
        let mut store = MockObjectStore::new();
        store.expect_put().never();

        let pipeline = Pipeline::new(Arc::new(model), Arc::new(store), limiter());
        let err = pipeline.process(submission()).await.unwrap_err();
        assert_eq!(err, PipelineError::Timeout { timeout_ms: 30_000 });
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test]
    async fn test_model_overload_maps_to_exhausted_retries() {
        let model = mock_model_error(ApiError::ModelOverloaded {
            model: "claude-sonnet".to_string(),
        });
        let mut store = MockObjectStore::new();
        store.expect_put().never();

        let pipeline = Pipeline::new(Arc::new(model), Arc::new(store), limiter())
            .with_model_attempts(3);
        let err = pipeline.process(submission()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ExhaustedRetries { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_auth_failure_maps_to_configuration() {
        let model = mock_model_error(ApiError::AuthenticationFailed);
        let mut store = MockObjectStore::new();
        store.expect_put().never();

        let pipeline = Pipeline::new(Arc::new(model), Arc::new(store), limiter());
        let err = pipeline.process(submission()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
        assert!(!err.recoverable());
    }

    #[tokio::test]
    async fn test_storage_failure_maps_into_taxonomy() {
        let model = mock_model_stages(&sample_analysis_json(), &sample_scene_code());
        let mut store = MockObjectStore::new();
        store.expect_put().returning(|key, _, _| {
            Err(StorageError::UploadFailed {
                key: key.to_string(),
                message: "status 503".to_string(),
            })
        });

        let pipeline = Pipeline::new(Arc::new(model), Arc::new(store), limiter());
        let err = pipeline.process(submission()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_processing_time_is_stamped() {
        let model = mock_model_stages(&sample_analysis_json(), &sample_scene_code());
        let pipeline = Pipeline::new(Arc::new(model), Arc::new(mock_store_success()), limiter());

        let outcome = pipeline.process(submission()).await.unwrap();
        assert!(outcome.metadata.timestamp.contains('T'));
        // Mock-backed run completes well under a second
        assert!(outcome.metadata.processing_time_ms < 1000);
    }
}
