//! Test utilities and mock factories.
//!
//! Shared fixtures for unit tests: canned model replies and mock
//! implementations of the pipeline's seams. Only compiled for tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::error::ApiError;
use crate::traits::{MockModelClient, MockObjectStore, ModelReply, StoredObject, Usage};

/// A stage-1 reply with 3 concepts, 2 connections, the Magician archetype,
/// 3 insights and a deep-focus recommendation, wrapped in model prose.
#[must_use]
pub fn sample_analysis_json() -> String {
    let body = serde_json::json!({
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
        "insights": [
            "freedom from constraint",
            "depth beneath a calm surface",
            "standing at a threshold"
        ],
        "currentPhase": "transition",
        "recommendedMeditation": "deep-focus"
    });
    format!("Here is the analysis you asked for:\n\n{body}\n")
}

/// A benign stage-2 reply: a minimal three.js scene.
#[must_use]
pub fn sample_scene_code() -> String {
    "const data = {nodes: []};\n\
     const scene = new THREE.Scene();\n\
     const camera = new THREE.PerspectiveCamera(60, 1.6, 0.1, 100);\n\
     const renderer = new THREE.WebGLRenderer({canvas: document.getElementById('scene')});\n\
     function tick() { renderer.render(scene, camera); requestAnimationFrame(tick); }\n\
     tick();"
        .to_string()
}

/// A model client that replies with `analysis_reply` to the first call and
/// `code_reply` to the second.
#[must_use]
pub fn mock_model_stages(analysis_reply: &str, code_reply: &str) -> MockModelClient {
    let analysis_reply = analysis_reply.to_string();
    let code_reply = code_reply.to_string();

    let mut mock = MockModelClient::new();
    let mut seq = mockall::Sequence::new();
    mock.expect_complete()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_request| Ok(ModelReply::new(analysis_reply.clone(), Usage::new(120, 340))));
    mock.expect_complete()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_request| Ok(ModelReply::new(code_reply.clone(), Usage::new(200, 800))));
    mock
}

/// A model client that always fails with `error`.
#[must_use]
pub fn mock_model_error(error: ApiError) -> MockModelClient {
    let mut mock = MockModelClient::new();
    mock.expect_complete()
        .returning(move |_request| Err(error.clone()));
    mock
}

/// An object store that accepts every upload and mirrors the key into the
/// returned URL.
#[must_use]
pub fn mock_store_success() -> MockObjectStore {
    let mut mock = MockObjectStore::new();
    mock.expect_put().returning(|key, _content, _content_type| {
        Ok(StoredObject {
            url: format!("https://bucket.test/{key}"),
        })
    });
    mock
}
