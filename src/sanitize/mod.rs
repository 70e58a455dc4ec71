//! Sanitization at both trust boundaries.
//!
//! - [`prompt`]: neutralizes prompt-injection vectors in raw user text
//!   before it is embedded into a model prompt.
//! - [`code`]: two-pass, fail-closed blocklist sanitizer for executable
//!   code produced by the model.

pub mod code;
pub mod prompt;

pub use code::{sanitize_code, SafeCode, NEUTRALIZED_MARKER};
pub use prompt::{frame_user_content, sanitize_input, MAX_INPUT_CHARS};
