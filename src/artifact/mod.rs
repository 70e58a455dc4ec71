//! Artifact packaging.
//!
//! Wraps verified code in a locked-down HTML document and uploads it as a
//! write-once, publicly readable blob. The shell provides:
//!
//! - a restrictive content-security-policy (inline execution allowed for
//!   the embedded program, everything else pinned or disabled)
//! - a loading indicator and a catch-all error boundary so a runtime
//!   failure in generated code degrades to a visible message
//! - a guard that verifies the rendering library loaded before the
//!   embedded program runs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::PipelineError;
use crate::sanitize::SafeCode;
use crate::traits::ObjectStore;

/// Length of the random artifact identifier.
pub const ARTIFACT_ID_LEN: usize = 10;

/// Content type of every packaged artifact.
pub const ARTIFACT_CONTENT_TYPE: &str = "text/html";

/// Key prefix under which artifacts are stored.
const KEY_PREFIX: &str = "visualizations";

/// The document shell; `__VIZ_TITLE__` and `__VIZ_CODE__` are substituted
/// at packaging time.
const DOCUMENT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="Content-Security-Policy" content="default-src 'none'; script-src 'unsafe-inline' https://cdnjs.cloudflare.com; style-src 'unsafe-inline'; img-src data:; connect-src 'none'; object-src 'none'; base-uri 'none'; form-action 'none'; frame-ancestors 'none'">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>__VIZ_TITLE__</title>
<style>
  html, body { margin: 0; height: 100%; background: #06060f; color: #cfd4ff; font-family: system-ui, sans-serif; }
  #scene { display: block; width: 100%; height: 100%; }
  #loading, #error { position: absolute; inset: 0; display: flex; align-items: center; justify-content: center; text-align: center; padding: 2rem; }
  #error[hidden], #loading[hidden] { display: none; }
</style>
</head>
<body>
<div id="loading">Rendering your visualization&hellip;</div>
<div id="error" hidden></div>
<canvas id="scene"></canvas>
<script src="https://cdnjs.cloudflare.com/ajax/libs/three.js/0.160.0/three.min.js"></script>
<script>
(function () {
  "use strict";
  var loading = document.getElementById("loading");
  var errorBox = document.getElementById("error");
  function fail(message) {
    loading.hidden = true;
    errorBox.hidden = false;
    errorBox.textContent = "Visualization failed: " + message;
  }
  window.addEventListener("error", function (event) {
    fail(event.message || "unexpected error");
  });
  if (typeof THREE === "undefined") {
    fail("rendering library failed to load");
    return;
  }
  try {
__VIZ_CODE__
    loading.hidden = true;
  } catch (err) {
    fail(err && err.message ? err.message : String(err));
  }
})();
</script>
</body>
</html>
"#;

/// A packaged, stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Opaque 10-character identifier; generated before storage, never
    /// reused.
    pub id: String,
    /// Publicly addressable URL.
    pub url: String,
    /// Always [`ARTIFACT_CONTENT_TYPE`].
    pub content_type: &'static str,
    /// Upload timestamp.
    pub stored_at: DateTime<Utc>,
}

/// Packages verified code into stored HTML artifacts.
pub struct Packager {
    store: Arc<dyn ObjectStore>,
}

impl Packager {
    /// Create a packager uploading through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Assemble the document and upload it as a new blob.
    ///
    /// Every invocation creates a fresh identifier and a new object;
    /// packaging never mutates an existing artifact.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the upload fails.
    pub async fn package(&self, code: &SafeCode, title: &str) -> Result<Artifact, PipelineError> {
        let id = generate_artifact_id();
        let key = format!("{KEY_PREFIX}/{id}.html");
        let document = render_document(title, code.as_str());

        let stored = self
            .store
            .put(&key, &document, ARTIFACT_CONTENT_TYPE)
            .await?;

        tracing::info!(artifact_id = %id, url = %stored.url, "artifact packaged");

        Ok(Artifact {
            id,
            url: stored.url,
            content_type: ARTIFACT_CONTENT_TYPE,
            stored_at: Utc::now(),
        })
    }
}

/// Generate a fresh random alphanumeric artifact identifier.
#[must_use]
pub fn generate_artifact_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ARTIFACT_ID_LEN)
        .map(char::from)
        .collect()
}

/// Substitute title and code into the document shell.
fn render_document(title: &str, code: &str) -> String {
    DOCUMENT_TEMPLATE
        .replace("__VIZ_TITLE__", &escape_html(title))
        .replace("__VIZ_CODE__", code)
}

/// Minimal HTML escaping for text interpolated into the shell.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
