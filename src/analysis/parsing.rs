//! Analysis reply parsing and validation.
//!
//! The model may wrap its JSON in prose or markdown fences; extraction
//! takes the first balanced `{...}` region. Validation is asymmetric by
//! design: missing `concepts`/`connections`/`insights` fail the request
//! (no safe default exists), while soft fields coerce to defaults and
//! bounded numerics clamp into range. This maximizes successful completions
//! from a non-deterministic upstream without fabricating data the rest of
//! the pipeline depends on.

use std::collections::HashSet;

use serde_json::Value;

use super::types::{
    AnalysisResult, Archetype, Concept, ConceptCategory, Connection, Position,
    DEFAULT_MEDITATION, DEFAULT_PHASE, MEDITATIONS,
};
use crate::error::PipelineError;

/// Extract the first balanced `{...}` region from free text.
///
/// Tracks string literals and escapes so braces inside JSON strings do not
/// unbalance the scan. Returns `None` when no complete object is present.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse and validate a stage-1 model reply.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedResponse`] when no balanced JSON
/// object is found, the region fails to parse, or a structurally required
/// field (`concepts`, `connections`, `insights`) is missing or empty where
/// required. A malformed reply is fatal here, never retried: it is not
/// assumed to be transient at this layer.
pub fn parse_analysis(raw_text: &str) -> Result<AnalysisResult, PipelineError> {
    let region = extract_json_object(raw_text).ok_or_else(|| malformed("no JSON object found"))?;

    let json: Value = serde_json::from_str(region)
        .map_err(|e| malformed(format!("JSON parse failed: {e}")))?;

    let concepts = parse_concepts(&json)?;
    require_connections_field(&json)?;
    let connections = parse_connections(&json, &concepts);

    let insights = required_string_array(&json, "insights")?;
    if insights.is_empty() {
        return Err(malformed("insights is empty"));
    }

    let dominant_archetype = json
        .get("dominantArchetype")
        .and_then(Value::as_str)
        .map_or(Archetype::Sage, Archetype::parse_or_default);

    let current_phase = json
        .get("currentPhase")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PHASE)
        .to_string();

    let recommended_meditation = json
        .get("recommendedMeditation")
        .and_then(Value::as_str)
        .filter(|m| MEDITATIONS.contains(m))
        .unwrap_or(DEFAULT_MEDITATION)
        .to_string();

    Ok(AnalysisResult {
        concepts,
        connections,
        dominant_archetype,
        insights,
        current_phase,
        recommended_meditation,
    })
}

fn malformed(reason: impl Into<String>) -> PipelineError {
    PipelineError::MalformedResponse {
        reason: reason.into(),
    }
}

/// Parse the required, non-empty concept list.
fn parse_concepts(json: &Value) -> Result<Vec<Concept>, PipelineError> {
    let items = json
        .get("concepts")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing concepts"))?;

    if items.is_empty() {
        return Err(malformed("concepts is empty"));
    }

    items
        .iter()
        .map(|item| {
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("concept missing name"))?
                .to_string();

            let importance = clamp_score(item.get("importance"));

            let category = item
                .get("category")
                .and_then(Value::as_str)
                .map_or(ConceptCategory::Analytical, ConceptCategory::parse_or_default);

            let position = parse_position(item.get("position"));

            Ok(Concept {
                name,
                importance,
                category,
                position,
            })
        })
        .collect()
}

/// Parse the required connection list, dropping dangling references.
///
/// The field itself is structurally required (its absence fails the
/// request) but the list may be empty. Connections whose endpoints name no
/// concept are dropped with a warning rather than failing or passed
/// through uncorrected: the packaged scene indexes concepts by name, and a
/// dangling edge would break the generated program at runtime.
fn parse_connections(json: &Value, concepts: &[Concept]) -> Vec<Connection> {
    let Some(items) = json.get("connections").and_then(Value::as_array) else {
        return Vec::new();
    };

    let known: HashSet<&str> = concepts.iter().map(|c| c.name.as_str()).collect();

    items
        .iter()
        .filter_map(|item| {
            let from = item.get("from").and_then(Value::as_str)?.to_string();
            let to = item.get("to").and_then(Value::as_str)?.to_string();

            if !known.contains(from.as_str()) || !known.contains(to.as_str()) {
                tracing::warn!(%from, %to, "dropping connection with dangling reference");
                return None;
            }

            Some(Connection {
                from,
                to,
                strength: clamp_score(item.get("strength")),
            })
        })
        .collect()
}

/// Validate that `connections` exists as a field before lenient parsing.
fn require_connections_field(json: &Value) -> Result<(), PipelineError> {
    json.get("connections")
        .and_then(Value::as_array)
        .map(|_| ())
        .ok_or_else(|| malformed("missing connections"))
}

/// Clamp a 1..=10 score, defaulting to the midpoint when absent.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_score(value: Option<&Value>) -> u8 {
    value
        .and_then(Value::as_f64)
        .map_or(5, |v| v.clamp(1.0, 10.0).round() as u8)
}

/// Parse a position object, clamping each axis into [-5.0, 5.0].
fn parse_position(value: Option<&Value>) -> Position {
    let clamp_axis = |axis: &str| {
        value
            .and_then(|p| p.get(axis))
            .and_then(Value::as_f64)
            .map_or(0.0, |v| v.clamp(-5.0, 5.0))
    };

    Position {
        x: clamp_axis("x"),
        y: clamp_axis("y"),
        z: clamp_axis("z"),
    }
}

/// Read a required array of strings.
fn required_string_array(json: &Value, field: &str) -> Result<Vec<String>, PipelineError> {
    Ok(json
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(format!("missing {field}")))?
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn full_reply() -> String {
        json!({
            "concepts": [
                {"name": "flight", "importance": 9, "category": "creative",
                 "position": {"x": 0.0, "y": 2.0, "z": -1.0}},
                {"name": "ocean", "importance": 7, "category": "emotional",
                 "position": {"x": -3.0, "y": 0.0, "z": 2.5}},
                {"name": "twilight", "importance": 5, "category": "growth",
                 "position": {"x": 1.5, "y": -1.0, "z": 0.0}}
            ],
            "connections": [
                {"from": "flight", "to": "ocean", "strength": 8},
                {"from": "ocean", "to": "twilight", "strength": 4}
            ],
            "dominantArchetype": "Magician",
            "insights": ["freedom from constraint", "depth beneath calm", "thresholds"],
            "currentPhase": "transition",
            "recommendedMeditation": "deep-focus"
        })
        .to_string()
    }

    #[test]
    fn test_parses_full_reply() {
        let result = parse_analysis(&full_reply()).unwrap();
        assert_eq!(result.concept_count(), 3);
        assert_eq!(result.connection_count(), 2);
        assert_eq!(result.dominant_archetype, Archetype::Magician);
        assert_eq!(result.insights.len(), 3);
        assert_eq!(result.current_phase, "transition");
        assert_eq!(result.recommended_meditation, "deep-focus");
    }

    #[test]
    fn test_extracts_object_from_prose() {
        let wrapped = format!(
            "Here is my analysis of the reflection:\n\n{}\n\nLet me know if you need more.",
            full_reply()
        );
        let result = parse_analysis(&wrapped).unwrap();
        assert_eq!(result.concept_count(), 3);
    }

    #[test]
    fn test_extracts_object_from_markdown_fence() {
        let wrapped = format!("```json\n{}\n```", full_reply());
        assert!(parse_analysis(&wrapped).is_ok());
    }

    #[test]
    fn test_no_json_is_fatal() {
        let err = parse_analysis("I could not produce an analysis.").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse { .. }));
    }

    #[test]
    fn test_unbalanced_json_is_fatal() {
        let err = parse_analysis("{\"concepts\": [").unwrap_err();
        assert!(
            matches!(err, PipelineError::MalformedResponse { reason } if reason.contains("no JSON object"))
        );
    }

    #[test]
    fn test_invalid_json_region_is_fatal() {
        let err = parse_analysis("{not json at all}").unwrap_err();
        assert!(
            matches!(err, PipelineError::MalformedResponse { reason } if reason.contains("parse failed"))
        );
    }

    #[test]
    fn test_missing_concepts_is_fatal() {
        let reply = json!({
            "connections": [],
            "insights": ["x"]
        })
        .to_string();
        let err = parse_analysis(&reply).unwrap_err();
        assert!(
            matches!(err, PipelineError::MalformedResponse { reason } if reason.contains("concepts"))
        );
    }

    #[test]
    fn test_empty_concepts_is_fatal() {
        let reply = json!({
            "concepts": [],
            "connections": [],
            "insights": ["x"]
        })
        .to_string();
        let err = parse_analysis(&reply).unwrap_err();
        assert!(
            matches!(err, PipelineError::MalformedResponse { reason } if reason.contains("empty"))
        );
    }

    #[test]
    fn test_missing_connections_is_fatal() {
        let reply = json!({
            "concepts": [{"name": "a"}],
            "insights": ["x"]
        })
        .to_string();
        let err = parse_analysis(&reply).unwrap_err();
        assert!(
            matches!(err, PipelineError::MalformedResponse { reason } if reason.contains("connections"))
        );
    }

    #[test]
    fn test_empty_connections_is_allowed() {
        let reply = json!({
            "concepts": [{"name": "a"}],
            "connections": [],
            "insights": ["x"]
        })
        .to_string();
        let result = parse_analysis(&reply).unwrap();
        assert_eq!(result.connection_count(), 0);
    }

    #[test]
    fn test_missing_insights_is_fatal() {
        let reply = json!({
            "concepts": [{"name": "a"}],
            "connections": []
        })
        .to_string();
        let err = parse_analysis(&reply).unwrap_err();
        assert!(
            matches!(err, PipelineError::MalformedResponse { reason } if reason.contains("insights"))
        );
    }

    #[test]
    fn test_missing_meditation_defaults() {
        let reply = json!({
            "concepts": [{"name": "a", "importance": 5}],
            "connections": [],
            "insights": ["x"]
        })
        .to_string();
        let result = parse_analysis(&reply).unwrap();
        assert_eq!(result.recommended_meditation, DEFAULT_MEDITATION);
    }

    #[test]
    fn test_unknown_meditation_defaults() {
        let reply = json!({
            "concepts": [{"name": "a"}],
            "connections": [],
            "insights": ["x"],
            "recommendedMeditation": "astral-projection"
        })
        .to_string();
        let result = parse_analysis(&reply).unwrap();
        assert_eq!(result.recommended_meditation, DEFAULT_MEDITATION);
    }

    #[test]
    fn test_missing_phase_and_archetype_default() {
        let reply = json!({
            "concepts": [{"name": "a"}],
            "connections": [],
            "insights": ["x"]
        })
        .to_string();
        let result = parse_analysis(&reply).unwrap();
        assert_eq!(result.current_phase, DEFAULT_PHASE);
        assert_eq!(result.dominant_archetype, Archetype::Sage);
    }

    #[test]
    fn test_scores_clamped_into_range() {
        let reply = json!({
            "concepts": [
                {"name": "a", "importance": 99},
                {"name": "b", "importance": -3}
            ],
            "connections": [{"from": "a", "to": "b", "strength": 0}],
            "insights": ["x"]
        })
        .to_string();
        let result = parse_analysis(&reply).unwrap();
        assert_eq!(result.concepts[0].importance, 10);
        assert_eq!(result.concepts[1].importance, 1);
        assert_eq!(result.connections[0].strength, 1);
    }

    #[test]
    fn test_positions_clamped_into_range() {
        let reply = json!({
            "concepts": [
                {"name": "a", "position": {"x": 42.0, "y": -42.0, "z": 1.0}}
            ],
            "connections": [],
            "insights": ["x"]
        })
        .to_string();
        let result = parse_analysis(&reply).unwrap();
        let position = result.concepts[0].position;
        assert_eq!(position.x, 5.0);
        assert_eq!(position.y, -5.0);
        assert_eq!(position.z, 1.0);
    }

    #[test]
    fn test_missing_position_defaults_to_origin() {
        let reply = json!({
            "concepts": [{"name": "a"}],
            "connections": [],
            "insights": ["x"]
        })
        .to_string();
        let result = parse_analysis(&reply).unwrap();
        assert_eq!(result.concepts[0].position, Position { x: 0.0, y: 0.0, z: 0.0 });
    }

    #[test]
    fn test_dangling_connections_dropped() {
        let reply = json!({
            "concepts": [{"name": "a"}, {"name": "b"}],
            "connections": [
                {"from": "a", "to": "b", "strength": 5},
                {"from": "a", "to": "ghost", "strength": 5},
                {"from": "phantom", "to": "b", "strength": 5}
            ],
            "insights": ["x"]
        })
        .to_string();
        let result = parse_analysis(&reply).unwrap();
        assert_eq!(result.connection_count(), 1);
        assert_eq!(result.connections[0].from, "a");
        assert_eq!(result.connections[0].to, "b");
    }

    #[test]
    fn test_braces_inside_strings_do_not_unbalance() {
        let text = r#"note {"concepts": [{"name": "a {brace} b"}], "connections": [], "insights": ["i"]} tail"#;
        let result = parse_analysis(text).unwrap();
        assert_eq!(result.concepts[0].name, "a {brace} b");
    }

    #[test]
    fn test_extract_json_object_basics() {
        assert_eq!(extract_json_object("x {\"a\": 1} y"), Some("{\"a\": 1}"));
        assert_eq!(extract_json_object("no braces"), None);
        assert_eq!(extract_json_object("{\"a\": {\"b\": 2}}"), Some("{\"a\": {\"b\": 2}}"));
        assert_eq!(extract_json_object("{unclosed"), None);
    }

    #[test]
    fn test_extract_handles_escaped_quotes() {
        let text = r#"{"a": "he said \"hi\" {x}"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }
}
