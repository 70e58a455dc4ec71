//! Outbound response envelopes.
//!
//! The success and failure shapes the surrounding application serializes
//! onto the wire. Field names follow the public API's camelCase convention.

use serde::Serialize;

use crate::analysis::{AnalysisResult, Archetype};
use crate::error::PipelineError;

/// Success envelope for one completed submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    /// Artifact identifier.
    pub id: String,
    /// Public artifact URL.
    pub url: String,
    /// Summary of the validated analysis.
    pub analysis: AnalysisSummary,
    /// Timing metadata.
    pub metadata: ResponseMetadata,
}

/// Analysis summary returned to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    /// Number of concepts in the mind map.
    pub concept_count: usize,
    /// Number of (validated) connections.
    pub connection_count: usize,
    /// Dominant archetype.
    pub dominant_archetype: Archetype,
    /// Insights drawn from the reflection.
    pub insights: Vec<String>,
    /// Current phase of the reflection.
    pub current_phase: String,
    /// Recommended meditation practice.
    pub recommended_meditation: String,
}

impl From<&AnalysisResult> for AnalysisSummary {
    fn from(analysis: &AnalysisResult) -> Self {
        Self {
            concept_count: analysis.concept_count(),
            connection_count: analysis.connection_count(),
            dominant_archetype: analysis.dominant_archetype,
            insights: analysis.insights.clone(),
            current_phase: analysis.current_phase.clone(),
            recommended_meditation: analysis.recommended_meditation.clone(),
        }
    }
}

/// Timing metadata stamped by the orchestrator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Total pipeline wall time in milliseconds.
    pub processing_time_ms: u64,
    /// RFC 3339 completion timestamp.
    pub timestamp: String,
}

/// Failure envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable error description.
    pub error: String,
    /// What the caller should do next.
    pub hint: String,
    /// Whether resubmitting can succeed.
    pub recoverable: bool,
    /// Earliest time a retry can succeed, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<String>,
}

impl From<&PipelineError> for ErrorBody {
    fn from(err: &PipelineError) -> Self {
        Self {
            error: err.to_string(),
            hint: err.hint().to_string(),
            recoverable: err.recoverable(),
            retry_after: err.retry_after().map(|t| t.to_rfc3339()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_outcome_serializes_camel_case() {
        let outcome = PipelineOutcome {
            id: "a1b2c3d4e5".to_string(),
            url: "https://bucket.test/visualizations/a1b2c3d4e5.html".to_string(),
            analysis: AnalysisSummary {
                concept_count: 3,
                connection_count: 2,
                dominant_archetype: Archetype::Magician,
                insights: vec!["x".to_string()],
                current_phase: "transition".to_string(),
                recommended_meditation: "deep-focus".to_string(),
            },
            metadata: ResponseMetadata {
                processing_time_ms: 1234,
                timestamp: "2025-06-01T12:00:00Z".to_string(),
            },
        };

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["analysis"]["conceptCount"], 3);
        assert_eq!(value["analysis"]["connectionCount"], 2);
        assert_eq!(value["analysis"]["dominantArchetype"], "magician");
        assert_eq!(value["metadata"]["processingTimeMs"], 1234);
    }

    #[test]
    fn test_error_body_from_admission_denied() {
        let reset = chrono::Utc.with_ymd_and_hms(2025, 6, 1, 13, 0, 0).unwrap();
        let err = PipelineError::AdmissionDenied {
            limit: 5,
            remaining: 0,
            reset_at: reset,
        };

        let body = ErrorBody::from(&err);
        assert!(body.recoverable);
        assert_eq!(body.retry_after, Some(reset.to_rfc3339()));

        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("retryAfter").is_some());
    }

    #[test]
    fn test_error_body_omits_absent_retry_after() {
        let err = PipelineError::Timeout { timeout_ms: 30_000 };
        let value = serde_json::to_value(ErrorBody::from(&err)).unwrap();
        assert!(value.get("retryAfter").is_none());
        assert_eq!(value["recoverable"], true);
    }

    #[test]
    fn test_error_body_configuration_not_recoverable() {
        let err = PipelineError::Configuration {
            message: "missing key".to_string(),
        };
        let body = ErrorBody::from(&err);
        assert!(!body.recoverable);
    }
}
