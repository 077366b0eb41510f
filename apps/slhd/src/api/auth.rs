//! # Authentication Module
//!
//! Optional bearer-key gate in front of the admin API.
//!
//! When `SLHD_API_KEY` is set and non-empty, every route except `/health`
//! requires:
//!
//! ```text
//! Authorization: Bearer <key>
//! ```
//!
//! The key is never read from the config file.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

/// Environment variable holding the shared API key.
pub const API_KEY_ENV: &str = "SLHD_API_KEY";

/// The configured API key, if any.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

/// Constant-time key comparison.
///
/// Both sides are zero-padded to a common length before `ct_eq` so the
/// comparison time does not depend on where the first mismatch is.
pub fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    let width = provided.len().max(expected.len());

    let mut lhs = vec![0u8; width];
    let mut rhs = vec![0u8; width];
    lhs[..provided.len()].copy_from_slice(provided);
    rhs[..expected.len()].copy_from_slice(expected);

    let same_bytes: bool = lhs.ct_eq(&rhs).into();
    same_bytes && provided.len() == expected.len()
}

/// Reject requests without the configured bearer key.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match presented {
        Some(key) if keys_match(key, &expected) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_api_key",
                path = %request.uri().path(),
                "Rejected request with wrong API key"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                path = %request.uri().path(),
                "Rejected request without Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_keys_match() {
        assert!(keys_match("s3cret-key", "s3cret-key"));
    }

    #[test]
    fn prefix_of_key_does_not_match() {
        assert!(!keys_match("s3cret", "s3cret-key"));
        assert!(!keys_match("s3cret-key-and-more", "s3cret-key"));
        assert!(!keys_match("", "s3cret-key"));
    }

    #[test]
    fn same_length_different_key_does_not_match() {
        assert!(!keys_match("s3cret-kez", "s3cret-key"));
    }
}
