// Bearer token check

use hyper::header::AUTHORIZATION;
use hyper::HeaderMap;

const BEARER_PREFIX: &[u8] = b"Bearer ";

/// Extract the token from the `Authorization` header
///
/// A literal `Bearer ` prefix is stripped when present; otherwise the whole
/// header value is the token. An empty token counts as missing.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&[u8]> {
    let value = headers.get(AUTHORIZATION)?.as_bytes();
    let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value);
    (!token.is_empty()).then_some(token)
}

/// Check the request token against the configured one
pub fn is_authorized(headers: &HeaderMap, expected: &str) -> bool {
    extract_bearer_token(headers).is_some_and(|token| token == expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_with_prefix() {
        let headers = headers_with("Bearer abc123");
        assert_eq!(extract_bearer_token(&headers), Some(&b"abc123"[..]));
    }

    #[test]
    fn test_extract_without_prefix() {
        let headers = headers_with("abc123");
        assert_eq!(extract_bearer_token(&headers), Some(&b"abc123"[..]));
    }

    #[test]
    fn test_extract_missing_or_empty() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
        assert_eq!(extract_bearer_token(&headers_with("Bearer ")), None);
    }

    #[test]
    fn test_prefix_is_case_sensitive() {
        let headers = headers_with("bearer abc123");
        assert_eq!(extract_bearer_token(&headers), Some(&b"bearer abc123"[..]));
        assert!(!is_authorized(&headers, "abc123"));
    }

    #[test]
    fn test_is_authorized() {
        assert!(is_authorized(&headers_with("Bearer abc123"), "abc123"));
        assert!(!is_authorized(&headers_with("Bearer abc1234"), "abc123"));
        assert!(!is_authorized(&HeaderMap::new(), "abc123"));
    }

    #[test]
    fn test_empty_configured_token_rejects_everything() {
        assert!(!is_authorized(&headers_with("Bearer "), ""));
        assert!(!is_authorized(&HeaderMap::new(), ""));
    }
}
