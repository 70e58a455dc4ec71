//! Prompt templates for the two pipeline stages.
//!
//! Stage 1 asks for a structured JSON analysis of the framed user content;
//! stage 2 asks for a self-contained three.js program parameterized by the
//! validated analysis. User text reaches these templates only after the
//! input sanitizer has framed it.

use crate::analysis::AnalysisResult;

/// System prompt shared by both stages.
pub const SYSTEM_PROMPT: &str = "You are the analysis engine of a mind-visualization service. \
     You respond with exactly the artifact requested and nothing else.";

/// Build the stage-1 analysis prompt around framed user content.
#[must_use]
pub fn analysis_prompt(framed_content: &str) -> String {
    format!(
        "Analyze the reflection below and map it into concepts.\n\n\
         {framed_content}\n\n\
         Return only a single JSON object, no prose, with this shape:\n\
         {{\n\
         \"concepts\": [{{\"name\": string, \"importance\": 1-10, \
         \"category\": \"analytical\"|\"emotional\"|\"growth\"|\"creative\", \
         \"position\": {{\"x\": -5..5, \"y\": -5..5, \"z\": -5..5}}}}],\n\
         \"connections\": [{{\"from\": concept name, \"to\": concept name, \"strength\": 1-10}}],\n\
         \"dominantArchetype\": \"sage\"|\"creator\"|\"explorer\"|\"hero\"|\"caregiver\"|\"magician\"|\"rebel\"|\"innocent\",\n\
         \"insights\": [string, ...],\n\
         \"currentPhase\": string,\n\
         \"recommendedMeditation\": \"deep-focus\"|\"loving-kindness\"|\"body-scan\"|\"open-awareness\"|\"breath-work\"\n\
         }}\n\
         Every connection must reference concept names from your own list. \
         Provide at least three concepts and three insights."
    )
}

/// Build the stage-2 code-generation prompt from a validated analysis.
///
/// The concept and connection data is embedded as JSON the generated
/// program reads from a local constant, so the model never needs network
/// or storage access.
#[must_use]
pub fn code_generation_prompt(analysis: &AnalysisResult) -> String {
    let data = serde_json::to_string_pretty(analysis).unwrap_or_else(|_| "{}".to_string());

    format!(
        "Write a three.js animation that renders this mind map as floating, \
         softly glowing spheres connected by lines. Sphere size follows \
         importance, color follows category, line opacity follows strength.\n\n\
         Mind map data:\n{data}\n\n\
         Requirements:\n\
         - Output only JavaScript, no markdown, no HTML.\n\
         - The THREE global and a <canvas id=\"scene\"> element already exist; \
         create the renderer with that canvas.\n\
         - Declare the data as a local const; do not load anything.\n\
         - Use only the THREE API plus requestAnimationFrame. Do not touch \
         storage, cookies, the network, timers that evaluate strings, other \
         DOM elements, or navigation.\n\
         - Animate a slow orbit and gentle pulsing tied to importance."
    )
}
