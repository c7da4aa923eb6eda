use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the server alongside non-2xx statuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{errcode}: {error}")]
pub struct ApiError {
    #[serde(default)]
    pub errcode: String,
    #[serde(default)]
    pub error: String,
}

impl ApiError {
    pub fn new(errcode: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            errcode: errcode.into(),
            error: error.into(),
        }
    }

    /// Parses an error body, tolerating bodies that are not JSON at all.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// Sentence ending used in user-facing reports: `.` or `: <reason>.`
    pub fn reason_suffix(reason: Option<&str>) -> String {
        match reason {
            Some(reason) if !reason.is_empty() => format!(": {reason}."),
            _ => ".".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_suffix_formats_optional_reason() {
        assert_eq!(ApiError::reason_suffix(None), ".");
        assert_eq!(ApiError::reason_suffix(Some("")), ".");
        assert_eq!(
            ApiError::reason_suffix(Some("Invalid password")),
            ": Invalid password."
        );
    }

    #[test]
    fn from_body_reads_error_field() {
        let err = ApiError::from_body(br#"{"errcode":"M_FORBIDDEN","error":"nope"}"#)
            .expect("error body");
        assert_eq!(err.errcode, "M_FORBIDDEN");
        assert_eq!(err.error, "nope");
        assert!(ApiError::from_body(b"<html>").is_none());
    }
}
