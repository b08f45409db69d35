use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::error::AppError;

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

/// Check the request's bearer token against the configured one.
pub fn verify_bearer_token(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let token = extract_bearer_token(headers)?;
    // Length mismatch is rejected without comparing contents.
    if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(AppError::unauthorized("Bearer token is not valid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token_case_insensitively() {
        assert_eq!(extract_bearer_token(&headers("bearer abc")).unwrap(), "abc");
        assert_eq!(extract_bearer_token(&headers("Bearer  abc ")).unwrap(), "abc");
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());
        assert!(extract_bearer_token(&headers("Basic abc")).is_err());
        assert!(extract_bearer_token(&headers("Bearer")).is_err());
        assert!(extract_bearer_token(&headers("Bearer  ")).is_err());
    }

    #[test]
    fn verifies_expected_token() {
        assert!(verify_bearer_token(&headers("Bearer secret"), "secret").is_ok());
        assert!(matches!(
            verify_bearer_token(&headers("Bearer secreT"), "secret"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(verify_bearer_token(&headers("Bearer sec"), "secret").is_err());
    }

    #[test]
    fn rejects_tokens_sharing_a_prefix() {
        assert!(verify_bearer_token(&headers("Bearer secret-and-more"), "secret").is_err());
        assert!(verify_bearer_token(&headers("Bearer secret"), "secret-and-more").is_err());
    }
}
