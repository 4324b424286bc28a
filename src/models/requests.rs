//! Request DTOs for the operational API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::MAX_KEY_LENGTH;

/// Request body for POST /cache/:category/invalidate
///
/// # Fields
/// - `pattern`: substring matched against the id part of every key
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidatePatternRequest {
    pub pattern: String,
}

impl InvalidatePatternRequest {
    /// Returns an error message if validation fails, None if valid.
    ///
    /// An empty pattern would match every entry; flushing has its own route.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        if self.pattern.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Pattern exceeds maximum length of {MAX_KEY_LENGTH} characters"
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_request_deserialize() {
        let req: InvalidatePatternRequest = serde_json::from_str(r#"{"pattern": "pkg-"}"#).unwrap();
        assert_eq!(req.pattern, "pkg-");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_empty_pattern() {
        let req = InvalidatePatternRequest {
            pattern: String::new(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_long_pattern() {
        let req = InvalidatePatternRequest {
            pattern: "x".repeat(MAX_KEY_LENGTH + 1),
        };
        assert!(req.validate().is_some());
    }
}
