//! Packaging of the injectable script bundle.
//!
//! The injected script is the runtime shim concatenated with the
//! business-logic bundle, wrapped in a self-invoking function and
//! base64-encoded so it survives transports that mangle raw script
//! characters. The runtime decodes the bundle before any message
//! traffic; a bundle that fails to decode fails the runtime startup.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Errors that can occur while decoding a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("invalid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("bundle is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A base64-encoded, self-invoking script bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBundle {
    encoded: String,
}

impl ScriptBundle {
    /// Concatenates the runtime shim with the business bundle, wraps the
    /// result in a self-invoking function and encodes it.
    #[must_use]
    pub fn compose(shim: &str, business: &str) -> Self {
        let script = format!("((function () {{{shim};{business}}})())");
        Self {
            encoded: STANDARD.encode(script),
        }
    }

    /// Wraps an already-encoded bundle (e.g. one produced by an external
    /// build step).
    #[must_use]
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
        }
    }

    /// The base64 text as it would be injected.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Decodes back to the script source.
    pub fn decode(&self) -> Result<String, BundleError> {
        Ok(String::from_utf8(STANDARD.decode(&self.encoded)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_wraps_and_roundtrips() {
        let bundle = ScriptBundle::compose("shim()", "business()");
        assert_eq!(bundle.decode().unwrap(), "((function () {shim();business()})())");
    }

    #[test]
    fn corrupt_base64_fails_to_decode() {
        let bundle = ScriptBundle::from_encoded("!!not-base64!!");
        assert!(matches!(bundle.decode(), Err(BundleError::Encoding(_))));
    }

    #[test]
    fn non_utf8_payload_fails_to_decode() {
        let bundle = ScriptBundle::from_encoded(STANDARD.encode([0xff, 0xfe, 0x01]));
        assert!(matches!(bundle.decode(), Err(BundleError::Utf8(_))));
    }
}
