//! Validated analysis domain types.

use serde::Serialize;

/// Meditation practices the model may recommend.
pub const MEDITATIONS: &[&str] = &[
    "deep-focus",
    "loving-kindness",
    "body-scan",
    "open-awareness",
    "breath-work",
];

/// Fallback when the model omits or invents a meditation.
pub const DEFAULT_MEDITATION: &str = "deep-focus";

/// Fallback when the model omits the current phase.
pub const DEFAULT_PHASE: &str = "exploration";

/// Concept category within the mind map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConceptCategory {
    /// Logic, analysis, planning.
    Analytical,
    /// Feelings and relationships.
    Emotional,
    /// Development and change.
    Growth,
    /// Imagination and expression.
    Creative,
}

impl ConceptCategory {
    /// Parse a category, defaulting to [`Self::Analytical`] on unknown
    /// input.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "emotional" => Self::Emotional,
            "growth" => Self::Growth,
            "creative" => Self::Creative,
            _ => Self::Analytical,
        }
    }
}

/// Dominant archetype of the analyzed reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    /// Wisdom and understanding.
    Sage,
    /// Making and building.
    Creator,
    /// Seeking and discovery.
    Explorer,
    /// Courage and mastery.
    Hero,
    /// Care and protection.
    Caregiver,
    /// Transformation and vision.
    Magician,
    /// Disruption and change.
    Rebel,
    /// Trust and optimism.
    Innocent,
}

impl Archetype {
    /// Parse an archetype, defaulting to [`Self::Sage`] on unknown input.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "creator" => Self::Creator,
            "explorer" => Self::Explorer,
            "hero" => Self::Hero,
            "caregiver" => Self::Caregiver,
            "magician" => Self::Magician,
            "rebel" => Self::Rebel,
            "innocent" => Self::Innocent,
            _ => Self::Sage,
        }
    }
}

/// 3D placement of a concept, each axis within [-5.0, 5.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

/// One concept in the mind map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Concept {
    /// Concept name; connection endpoints reference it.
    pub name: String,
    /// Importance, clamped to 1..=10.
    pub importance: u8,
    /// Category of the concept.
    pub category: ConceptCategory,
    /// Placement in the scene.
    pub position: Position,
}

/// A weighted link between two concepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    /// Source concept name.
    pub from: String,
    /// Target concept name.
    pub to: String,
    /// Link strength, clamped to 1..=10.
    pub strength: u8,
}

/// The validated, structured output of the analysis stage.
///
/// Constructed once per request from the parsed model reply; never mutated
/// after validation and discarded after the response is sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Ordered, non-empty list of concepts.
    pub concepts: Vec<Concept>,
    /// Connections between concepts; dangling references have been dropped.
    pub connections: Vec<Connection>,
    /// Dominant archetype.
    pub dominant_archetype: Archetype,
    /// Non-empty list of insights.
    pub insights: Vec<String>,
    /// Current phase of the reflection.
    pub current_phase: String,
    /// Recommended meditation from [`MEDITATIONS`].
    pub recommended_meditation: String,
}

impl AnalysisResult {
    /// Number of concepts.
    #[must_use]
    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    /// Number of connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("analytical", ConceptCategory::Analytical)]
    #[test_case("Emotional", ConceptCategory::Emotional)]
    #[test_case("GROWTH", ConceptCategory::Growth)]
    #[test_case("creative", ConceptCategory::Creative)]
    #[test_case("unknown", ConceptCategory::Analytical)]
    #[test_case("", ConceptCategory::Analytical)]
    fn test_category_parse_or_default(input: &str, expected: ConceptCategory) {
        assert_eq!(ConceptCategory::parse_or_default(input), expected);
    }

    #[test_case("Magician", Archetype::Magician)]
    #[test_case("sage", Archetype::Sage)]
    #[test_case("REBEL", Archetype::Rebel)]
    #[test_case("nonsense", Archetype::Sage)]
    fn test_archetype_parse_or_default(input: &str, expected: Archetype) {
        assert_eq!(Archetype::parse_or_default(input), expected);
    }

    #[test]
    fn test_archetype_serializes_lowercase() {
        #[allow(clippy::unwrap_used)]
        let value = serde_json::to_value(Archetype::Magician).unwrap();
        assert_eq!(value, "magician");
    }

    #[test]
    fn test_counts() {
        let result = AnalysisResult {
            concepts: vec![Concept {
                name: "ocean".to_string(),
                importance: 8,
                category: ConceptCategory::Emotional,
                position: Position {
                    x: 0.0,
                    y: 1.0,
                    z: -2.0,
                },
            }],
            connections: vec![],
            dominant_archetype: Archetype::Explorer,
            insights: vec!["vastness".to_string()],
            current_phase: DEFAULT_PHASE.to_string(),
            recommended_meditation: DEFAULT_MEDITATION.to_string(),
        };
        assert_eq!(result.concept_count(), 1);
        assert_eq!(result.connection_count(), 0);
    }
}
