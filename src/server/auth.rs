//! Upload token check

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

/// Credential required on the ingest route
#[derive(Debug, Clone)]
pub enum UploadAuth {
    /// Require this token
    Token(String),
    /// Accept every upload
    Disabled,
}

impl UploadAuth {
    /// Check the `Authorization` header of an upload
    ///
    /// Accepts `Bearer <token>` as well as the bare token, which is what the
    /// camera firmware sends.
    pub fn check(&self, headers: &HeaderMap) -> bool {
        let expected = match self {
            UploadAuth::Disabled => return true,
            UploadAuth::Token(token) => token,
        };

        let Some(value) = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
        else {
            return false;
        };

        let presented = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .unwrap_or(value)
            .trim();

        presented.as_bytes().ct_eq(expected.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token() {
        let auth = UploadAuth::Token("secret".into());

        assert!(auth.check(&headers("Bearer secret")));
        assert!(!auth.check(&headers("Bearer wrong")));
    }

    #[test]
    fn test_bare_token() {
        let auth = UploadAuth::Token("secret".into());

        assert!(auth.check(&headers("secret")));
        assert!(!auth.check(&headers("secre")));
    }

    #[test]
    fn test_missing_header() {
        let auth = UploadAuth::Token("secret".into());

        assert!(!auth.check(&HeaderMap::new()));
    }

    #[test]
    fn test_disabled_accepts_anything() {
        assert!(UploadAuth::Disabled.check(&HeaderMap::new()));
    }
}
