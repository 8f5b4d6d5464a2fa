//! Endpoint URL validation and construction.
//!
//! The live endpoint is a WebSocket URL; the API key travels as the `key`
//! query parameter. Anything that gets logged goes through [`redact_key`].

use thiserror::Error;
use url::Url;

/// Query parameter carrying the credential.
pub const KEY_PARAM: &str = "key";

/// Errors that can occur during URL validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be ws or wss, got: {0}")]
    WebSocketSchemeRequired(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("API key must not be empty")]
    EmptyKey,
}

/// Validates a live endpoint URL.
///
/// # Example
/// ```rust,ignore
/// use waav_live::utils::url_validation::validate_endpoint_url;
///
/// assert!(validate_endpoint_url("wss://example.com/live").is_ok());
/// assert!(validate_endpoint_url("https://example.com/live").is_err());
/// ```
pub fn validate_endpoint_url(url: &str) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    match parsed.scheme() {
        "ws" | "wss" => {}
        other => return Err(UrlValidationError::WebSocketSchemeRequired(other.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(parsed)
}

/// Build the socket URL for `endpoint` carrying `api_key`.
///
/// An existing `key` parameter on the endpoint is replaced; other query
/// parameters are kept.
pub fn build_endpoint_url(endpoint: &str, api_key: &str) -> Result<String, UrlValidationError> {
    if api_key.is_empty() {
        return Err(UrlValidationError::EmptyKey);
    }

    let mut url = validate_endpoint_url(endpoint)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != KEY_PARAM)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(KEY_PARAM, api_key);

    Ok(url.into())
}

/// `url` with any `key` parameter value masked, for logs and error messages.
pub fn redact_key(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.query_pairs().any(|(name, _)| name == KEY_PARAM) {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(name, value)| {
            let value = if name == KEY_PARAM {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

    #[test]
    fn test_validate_accepts_ws_and_wss() {
        assert!(validate_endpoint_url(ENDPOINT).is_ok());
        assert!(validate_endpoint_url("ws://localhost:9000/live").is_ok());
    }

    #[test]
    fn test_validate_rejects_other_schemes() {
        assert_eq!(
            validate_endpoint_url("https://example.com/live"),
            Err(UrlValidationError::WebSocketSchemeRequired(
                "https".to_string()
            ))
        );
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(matches!(
            validate_endpoint_url("not a url"),
            Err(UrlValidationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_build_appends_key() {
        let url = build_endpoint_url(ENDPOINT, "abc123").unwrap();
        assert_eq!(url, format!("{ENDPOINT}?key=abc123"));
    }

    #[test]
    fn test_build_replaces_existing_key_and_keeps_other_params() {
        let url = build_endpoint_url("wss://example.com/live?alt=json&key=old", "new").unwrap();
        assert_eq!(url, "wss://example.com/live?alt=json&key=new");
    }

    #[test]
    fn test_build_encodes_key() {
        let url = build_endpoint_url("wss://example.com/live", "a b&c").unwrap();
        assert_eq!(url, "wss://example.com/live?key=a+b%26c");
    }

    #[test]
    fn test_build_rejects_empty_key() {
        assert_eq!(
            build_endpoint_url(ENDPOINT, ""),
            Err(UrlValidationError::EmptyKey)
        );
    }

    #[test]
    fn test_redact_key() {
        assert_eq!(
            redact_key("wss://example.com/live?key=secret"),
            "wss://example.com/live?key=***"
        );
        assert_eq!(redact_key("wss://example.com/live"), "wss://example.com/live");
    }
}
