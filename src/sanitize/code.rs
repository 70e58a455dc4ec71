//! Two-pass, fail-closed sanitizer for model-generated code.
//!
//! Generated code is *tainted* until it passes this module. One blocklist
//! of signatures drives both passes:
//!
//! 1. **Cleanup** replaces every literal occurrence of a blocked API with an
//!    inert comment marker and logs which signature fired.
//! 2. **Gate** re-scans the cleaned code with the signatures' regex forms,
//!    which tolerate spacing and case tricks literal replacement misses. Any
//!    residual match fails the whole request closed — partially-cleaned code
//!    is never packaged.
//!
//! Verified output is a fixed point: sanitizing it again changes nothing and
//! finds no new matches.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PipelineError;

/// Inert marker substituted for each neutralized occurrence.
///
/// Must never itself contain a blocked literal or match a blocked pattern;
/// the gate re-scan depends on it.
pub const NEUTRALIZED_MARKER: &str = "/* sanitized */";

/// A blocklist entry.
///
/// `literals` are the exact spellings the cleanup pass replaces; `pattern`
/// is the broader form the gate scans for.
struct Signature {
    name: &'static str,
    literals: &'static [&'static str],
    pattern: Regex,
}

// Static patterns, known-valid
#[allow(clippy::expect_used)]
fn signature(name: &'static str, literals: &'static [&'static str], pattern: &str) -> Signature {
    Signature {
        name,
        literals,
        pattern: Regex::new(pattern).expect("static blocklist pattern"),
    }
}

static BLOCKLIST: Lazy<Vec<Signature>> = Lazy::new(|| {
    vec![
        // Storage and cookie access
        signature("local-storage", &["localStorage"], r"(?i)localStorage"),
        signature("session-storage", &["sessionStorage"], r"(?i)sessionStorage"),
        signature(
            "cookie-access",
            &["document.cookie"],
            r"(?i)document\s*\.\s*cookie",
        ),
        // Dynamic code evaluation
        signature("eval-call", &["eval("], r"(?i)eval\s*\("),
        signature(
            "function-constructor",
            &["new Function"],
            r"(?i)new\s+Function",
        ),
        // Dynamic module loading
        signature("dynamic-import", &["import("], r"(?i)import\s*\("),
        signature("require-call", &["require("], r"(?i)require\s*\("),
        // Network primitives
        signature("fetch-call", &["fetch("], r"(?i)fetch\s*\("),
        signature("xml-http-request", &["XMLHttpRequest"], r"(?i)XMLHttpRequest"),
        signature("websocket", &["WebSocket"], r"(?i)WebSocket"),
        signature("post-message", &["postMessage"], r"(?i)postMessage"),
        signature("send-beacon", &["sendBeacon"], r"(?i)sendBeacon"),
        // DOM and markup injection
        signature("inner-html", &["innerHTML"], r"(?i)innerHTML"),
        signature("outer-html", &["outerHTML"], r"(?i)outerHTML"),
        signature(
            "insert-adjacent-html",
            &["insertAdjacentHTML"],
            r"(?i)insertAdjacentHTML",
        ),
        signature(
            "document-write",
            &["document.write"],
            r"(?i)document\s*\.\s*write",
        ),
        signature("script-tag", &["<script"], r"(?i)<\s*script"),
        signature("iframe-tag", &["<iframe"], r"(?i)<\s*iframe"),
        signature("javascript-url", &["javascript:"], r"(?i)javascript\s*:"),
        // Navigation hijacking
        signature(
            "window-location",
            &["window.location"],
            r"(?i)window\s*\.\s*location",
        ),
        signature("window-open", &["window.open"], r"(?i)window\s*\.\s*open"),
        // Inline event-handler attributes
        signature(
            "inline-handler",
            &[
                "onclick=\"",
                "onclick='",
                "onerror=\"",
                "onerror='",
                "onload=\"",
                "onload='",
            ],
            r#"(?i)\bon[a-z]+\s*=\s*["']"#,
        ),
    ]
});

/// Code that has passed both sanitizer passes.
///
/// The only way to construct one is [`sanitize_code`]; tainted code cannot
/// reach the packager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeCode(String);

impl SafeCode {
    /// The verified code text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Cleanup pass: replace blocked literals with [`NEUTRALIZED_MARKER`].
///
/// Returns the cleaned code and the names of the signatures that fired.
fn clean(code: &str) -> (String, Vec<&'static str>) {
    let mut cleaned = code.to_string();
    let mut fired = Vec::new();

    for sig in BLOCKLIST.iter() {
        for literal in sig.literals {
            let occurrences = cleaned.matches(literal).count();
            if occurrences > 0 {
                tracing::warn!(
                    signature = sig.name,
                    occurrences,
                    "neutralized blocked pattern in generated code"
                );
                cleaned = cleaned.replace(literal, NEUTRALIZED_MARKER);
                fired.push(sig.name);
            }
        }
    }

    (cleaned, fired)
}

/// Gate pass: scan for any residual blocklist match.
fn scan(code: &str) -> Option<&'static str> {
    BLOCKLIST
        .iter()
        .find(|sig| sig.pattern.is_match(code))
        .map(|sig| sig.name)
}

/// Strip a leading markdown code fence if the model wrapped its program.
fn strip_markdown_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, keep everything up to the closing fence
    let body = rest.split_once('\n').map_or("", |(_, b)| b);
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

/// Sanitize model-generated code: cleanup, then fail-closed verification.
///
/// # Errors
///
/// Returns [`PipelineError::UnsafeContent`] naming the first signature that
/// still matches after cleanup — an obfuscated spelling the literal pass
/// missed, or (hypothetically) a pattern reintroduced by replacement.
pub fn sanitize_code(raw: &str) -> Result<SafeCode, PipelineError> {
    let code = strip_markdown_fence(raw);
    let (cleaned, fired) = clean(code);

    if let Some(signature) = scan(&cleaned) {
        tracing::warn!(
            signature,
            cleaned_signatures = ?fired,
            "residual blocked pattern after cleanup, rejecting generated code"
        );
        return Err(PipelineError::UnsafeContent {
            signature: signature.to_string(),
        });
    }

    if !fired.is_empty() {
        tracing::info!(signatures = ?fired, "generated code cleaned and verified");
    }

    Ok(SafeCode(cleaned))
}
