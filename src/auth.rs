//! Bearer token authentication for network transports
//!
//! Every tool call that arrives over HTTP or SSE must carry
//! `Authorization: Bearer <LOCAL_TOKEN>`. Calls without an HTTP request (stdio)
//! are trusted and skip the check entirely.

use std::fmt;
use std::future::Future;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use serde::Serialize;

use crate::error::AuthError;

/// Credential type tag recorded for shared-secret authentication
pub const AUTH_TYPE_LOCAL_TOKEN: &str = "local_token";

/// Case-insensitive scheme prefix, including the separating space
const BEARER_PREFIX: &[u8] = b"bearer ";

/// Outcome of a successful token validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationResult {
    pub valid: bool,

    #[serde(rename = "type")]
    pub auth_type: &'static str,
}

/// Per-call authentication state handed to the guarded operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    /// Whether a credential was checked and accepted
    pub authenticated: bool,

    /// Credential type tag, set only when authenticated
    pub auth_type: Option<&'static str>,
}

/// Compares presented tokens against the process-wide secret
#[derive(Clone)]
pub struct TokenValidator {
    local_token: String,
}

impl TokenValidator {
    pub fn new(local_token: impl Into<String>) -> Self {
        Self {
            local_token: local_token.into(),
        }
    }

    /// Exact, case-sensitive comparison. No trimming happens here.
    ///
    /// Returns `None` for anything that is not the configured secret,
    /// including a missing or empty token.
    pub fn validate_token(&self, token: Option<&str>) -> Option<AuthenticationResult> {
        let token = token?;
        if token.is_empty() || token != self.local_token {
            return None;
        }

        Some(AuthenticationResult {
            valid: true,
            auth_type: AUTH_TYPE_LOCAL_TOKEN,
        })
    }
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("local_token", &"***")
            .finish()
    }
}

/// Gate in front of tool invocation
#[derive(Debug, Clone)]
pub struct AuthGate {
    validator: Option<TokenValidator>,
}

impl AuthGate {
    /// Gate checking against `local_token`; `None` leaves network calls unservable
    pub fn new(local_token: Option<String>) -> Self {
        Self {
            validator: local_token.map(TokenValidator::new),
        }
    }

    pub fn validator(&self) -> Option<&TokenValidator> {
        self.validator.as_ref()
    }

    /// Decide whether a call may proceed
    ///
    /// `request` is the HTTP header map of the call, `None` for stdio.
    pub fn check(&self, request: Option<&HeaderMap>) -> Result<CallContext, AuthError> {
        let Some(headers) = request else {
            tracing::debug!("No HTTP request (stdio transport), skipping authentication");
            return Ok(CallContext::default());
        };

        let validator = self.validator.as_ref().ok_or_else(|| AuthError::Internal {
            message: "no local token configured for network transport".to_string(),
        })?;

        let header = headers
            .get(AUTHORIZATION)
            .map(|value| value.as_bytes())
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| {
                tracing::warn!("Rejected tool call: missing Authorization header");
                AuthError::Required
            })?;

        if header.len() < BEARER_PREFIX.len()
            || !header[..BEARER_PREFIX.len()].eq_ignore_ascii_case(BEARER_PREFIX)
        {
            tracing::warn!("Rejected tool call: Authorization header is not a Bearer token");
            return Err(AuthError::Malformed);
        }

        // Non-UTF-8 bytes can never match the secret
        let token = std::str::from_utf8(&header[BEARER_PREFIX.len()..])
            .ok()
            .map(str::trim);

        match validator.validate_token(token) {
            Some(result) => {
                tracing::debug!("Authenticated tool call ({})", result.auth_type);
                Ok(CallContext {
                    authenticated: result.valid,
                    auth_type: Some(result.auth_type),
                })
            }
            None => {
                tracing::warn!("Rejected tool call: invalid token");
                Err(AuthError::Invalid)
            }
        }
    }

    /// Run `next` only if the call is allowed
    ///
    /// Rejections surface as `E::from(AuthError)` and `next` is never invoked.
    /// Errors returned by `next` propagate unchanged.
    pub async fn authenticate_and_invoke<F, Fut, T, E>(
        &self,
        request: Option<&HeaderMap>,
        next: F,
    ) -> Result<T, E>
    where
        F: FnOnce(CallContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AuthError>,
    {
        let context = self.check(request).map_err(E::from)?;
        next(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    const SECRET: &str = "abc123";

    fn gate() -> AuthGate {
        AuthGate::new(Some(SECRET.to_string()))
    }

    fn headers_with(auth: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(auth));
        headers
    }

    #[test]
    fn test_validator_exact_match() {
        let validator = TokenValidator::new(SECRET);

        let result = validator.validate_token(Some("abc123")).unwrap();
        assert!(result.valid);
        assert_eq!(result.auth_type, "local_token");

        assert!(validator.validate_token(Some("ABC123")).is_none());
        assert!(validator.validate_token(Some("abc123x")).is_none());
        assert!(validator.validate_token(Some("abc")).is_none());
        assert!(validator.validate_token(Some("")).is_none());
        assert!(validator.validate_token(Some("   ")).is_none());
        assert!(validator.validate_token(None).is_none());
    }

    #[test]
    fn test_validator_does_not_trim() {
        let validator = TokenValidator::new(SECRET);
        assert!(validator.validate_token(Some("abc123 ")).is_none());
    }

    #[test]
    fn test_validator_debug_hides_secret() {
        let text = format!("{:?}", TokenValidator::new(SECRET));
        assert!(!text.contains(SECRET));
    }

    #[test]
    fn test_stdio_always_allowed() {
        let context = assert_ok!(gate().check(None));
        assert_eq!(context, CallContext::default());

        // Even without any configured secret
        assert_ok!(AuthGate::new(None).check(None));
    }

    #[test]
    fn test_bearer_scheme_case_insensitive() {
        for header in ["Bearer abc123", "bearer abc123", "BEARER abc123"] {
            let context = assert_ok!(gate().check(Some(&headers_with(header))));
            assert!(context.authenticated);
            assert_eq!(context.auth_type, Some(AUTH_TYPE_LOCAL_TOKEN));
        }
    }

    #[test]
    fn test_token_is_trimmed() {
        assert_ok!(gate().check(Some(&headers_with("Bearer   abc123   "))));
        assert_ok!(gate().check(Some(&headers_with("Bearer abc123 "))));
    }

    #[test]
    fn test_missing_header_requires_credential() {
        let err = assert_err!(gate().check(Some(&HeaderMap::new())));
        assert_eq!(err, AuthError::Required);

        let err = assert_err!(gate().check(Some(&headers_with(""))));
        assert_eq!(err, AuthError::Required);
    }

    #[test]
    fn test_wrong_scheme_is_malformed() {
        let err = assert_err!(gate().check(Some(&headers_with("Token abc123"))));
        assert_eq!(err, AuthError::Malformed);

        // Present but blank is not the same as absent
        let err = assert_err!(gate().check(Some(&headers_with("   "))));
        assert_eq!(err, AuthError::Malformed);

        let err = assert_err!(gate().check(Some(&headers_with("Bearer"))));
        assert_eq!(err, AuthError::Malformed);
    }

    #[test]
    fn test_wrong_token_is_invalid() {
        for header in ["Bearer ABC123", "Bearer abc123x", "Bearer ", "Bearer wrong"] {
            let err = assert_err!(gate().check(Some(&headers_with(header))));
            assert_eq!(err, AuthError::Invalid);
        }
    }

    #[test]
    fn test_non_utf8_token_is_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer abc\xff123").unwrap(),
        );
        let err = assert_err!(gate().check(Some(&headers)));
        assert_eq!(err, AuthError::Invalid);
    }

    #[test]
    fn test_missing_secret_is_internal_error() {
        let err = assert_err!(AuthGate::new(None).check(Some(&headers_with("Bearer abc123"))));
        assert!(matches!(err, AuthError::Internal { .. }));
        assert!(err.to_string().contains("no local token configured"));
    }

    #[tokio::test]
    async fn test_rejected_call_never_invokes_next() {
        let calls = AtomicUsize::new(0);

        let result: Result<&str, AuthError> = gate()
            .authenticate_and_invoke(Some(&headers_with("Token abc123")), |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("tool_result")
            })
            .await;

        assert_eq!(result.unwrap_err(), AuthError::Malformed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_allowed_call_receives_context() {
        let result: Result<CallContext, AuthError> = gate()
            .authenticate_and_invoke(Some(&headers_with("Bearer abc123")), |ctx| async move {
                Ok(ctx)
            })
            .await;

        let ctx = result.unwrap();
        assert!(ctx.authenticated);
        assert_eq!(ctx.auth_type, Some("local_token"));
    }

    #[tokio::test]
    async fn test_downstream_errors_propagate_unchanged() {
        #[derive(Debug, PartialEq)]
        enum ToolError {
            Auth(AuthError),
            Failed(&'static str),
        }

        impl From<AuthError> for ToolError {
            fn from(err: AuthError) -> Self {
                ToolError::Auth(err)
            }
        }

        let result: Result<(), ToolError> = gate()
            .authenticate_and_invoke(Some(&headers_with("Bearer abc123")), |_| async {
                Err(ToolError::Failed("Tool execution failed"))
            })
            .await;
        assert_eq!(result.unwrap_err(), ToolError::Failed("Tool execution failed"));

        let result: Result<(), ToolError> = gate()
            .authenticate_and_invoke(None, |ctx| async move {
                assert!(!ctx.authenticated);
                Ok(())
            })
            .await;
        assert!(result.is_ok());
    }
}
