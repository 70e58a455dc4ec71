//! Secret string wrapper for sensitive configuration values.

use std::fmt;

/// A string wrapper that redacts its value in Debug/Display output.
///
/// Wraps the Anthropic API key so that logging the configuration (or any
/// struct containing it) can never leak the credential.
///
/// # Example
///
/// ```
/// use mindviz::config::SecretString;
///
/// let key = SecretString::new("sk-ant-live-key");
/// assert_eq!(format!("{key:?}"), "<REDACTED>");
/// assert_eq!(key.expose(), "sk-ant-live-key");
/// ```
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a sensitive value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the underlying secret.
    ///
    /// Call only at the point of use (request headers), never for logging.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if the secret is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<REDACTED>")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
