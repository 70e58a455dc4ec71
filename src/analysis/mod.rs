//! Stage-1 analysis: domain types and reply parsing.
//!
//! The model's free-text analysis reply is parsed into an [`AnalysisResult`]
//! with a deliberate asymmetry: structurally required fields fail the
//! request, soft fields coerce to safe defaults, and bounded numerics clamp
//! into range.

mod parsing;
mod types;

pub use parsing::{extract_json_object, parse_analysis};
pub use types::{
    AnalysisResult, Archetype, Concept, ConceptCategory, Connection, Position,
    DEFAULT_MEDITATION, DEFAULT_PHASE, MEDITATIONS,
};
