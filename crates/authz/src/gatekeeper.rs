use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
    middleware::Next,
    response::Response,
};
use shelf_http::AppError;

use crate::{AuthError, Identity, TokenService};

/// Where a request's session token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Header,
    Cookie,
}

/// Request-boundary check for protected routes.
///
/// An `Authorization: Bearer` header wins over the session cookie; the cookie
/// is only consulted when no bearer token is present.
#[derive(Clone)]
pub struct Gatekeeper {
    tokens: TokenService,
    cookie_name: Arc<str>,
}

impl Gatekeeper {
    pub fn new(tokens: TokenService, cookie_name: impl Into<Arc<str>>) -> Self {
        Self {
            tokens,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn extract_token<'h>(&self, headers: &'h HeaderMap) -> Option<(TokenSource, &'h str)> {
        bearer_token(headers)
            .map(|token| (TokenSource::Header, token))
            .or_else(|| {
                cookie_value(headers, &self.cookie_name).map(|token| (TokenSource::Cookie, token))
            })
    }

    /// Resolve the caller's identity from request headers.
    pub fn check(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let Some((source, token)) = self.extract_token(headers) else {
            tracing::debug!("no session token on request");
            return Err(AuthError::Unauthorized);
        };

        let identity = self.tokens.verify(token)?;
        tracing::debug!(user_id = identity.user_id, ?source, "session token accepted");
        Ok(identity)
    }

    /// `Set-Cookie` value carrying a freshly issued token.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
            self.cookie_name,
            token,
            self.tokens.ttl().whole_seconds()
        )
    }

    /// `Set-Cookie` value that makes the browser drop the session cookie.
    pub fn expired_cookie(&self) -> String {
        format!(
            "{}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax",
            self.cookie_name
        )
    }
}

/// Token from a `Bearer` authorization header. A bearer scheme with no token
/// yields `Some("")`, which fails verification.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

fn cookie_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Middleware guarding protected routes. Rejected requests never reach the
/// handler.
pub async fn require_identity(
    State(gate): State<Gatekeeper>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = gate.check(request.headers())?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .copied()
            .ok_or_else(|| AuthError::Unauthorized.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use time::Duration;
    use tower::ServiceExt;

    fn gate() -> Gatekeeper {
        let tokens = TokenService::new(b"gate-secret", Duration::hours(72)).unwrap();
        Gatekeeper::new(tokens, "jwt")
    }

    fn app(gate: Gatekeeper) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|identity: Identity| async move { identity.user_id.to_string() }),
            )
            .route_layer(middleware::from_fn_with_state(gate, require_identity))
    }

    async fn call(gate: &Gatekeeper, headers: &[(&str, String)]) -> (StatusCode, String) {
        let mut request = axum::http::Request::get("/whoami");
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = app(gate.clone())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let (status, _) = call(&gate(), &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bearer_header_is_accepted() {
        let gate = gate();
        let token = gate.tokens().issue(5).unwrap();

        let (status, body) = call(&gate, &[("authorization", format!("Bearer {token}"))]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "5");
    }

    #[tokio::test]
    async fn cookie_is_the_fallback() {
        let gate = gate();
        let token = gate.tokens().issue(9).unwrap();

        let (status, body) = call(&gate, &[("cookie", format!("theme=dark; jwt={token}"))]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "9");
    }

    #[tokio::test]
    async fn header_takes_priority_over_cookie() {
        let gate = gate();
        let good = gate.tokens().issue(3).unwrap();

        let (status, body) = call(
            &gate,
            &[
                ("authorization", format!("Bearer {good}")),
                ("cookie", "jwt=garbage".to_string()),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "3");

        // An invalid header is not rescued by a valid cookie.
        let (status, _) = call(
            &gate,
            &[
                ("authorization", "Bearer garbage".to_string()),
                ("cookie", format!("jwt={good}")),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_falls_back_to_cookie() {
        let gate = gate();
        let token = gate.tokens().issue(4).unwrap();

        let (status, body) = call(
            &gate,
            &[
                ("authorization", "Basic dXNlcjpwYXNz".to_string()),
                ("cookie", format!("jwt={token}")),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "4");
    }

    #[tokio::test]
    async fn bare_bearer_header_is_not_rescued_by_cookie() {
        let gate = gate();
        let token = gate.tokens().issue(6).unwrap();

        for header in ["Bearer", "Bearer   "] {
            let (status, _) = call(
                &gate,
                &[
                    ("authorization", header.to_string()),
                    ("cookie", format!("jwt={token}")),
                ],
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "header {header:?}");
        }
    }

    #[tokio::test]
    async fn foreign_token_is_rejected() {
        let other = TokenService::new(b"other-secret", Duration::hours(72)).unwrap();
        let token = other.issue(1).unwrap();

        let (status, _) = call(&gate(), &[("authorization", format!("Bearer {token}"))]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn extract_reports_source() {
        let gate = gate();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "jwt=abc".parse().unwrap());
        assert_eq!(gate.extract_token(&headers), Some((TokenSource::Cookie, "abc")));

        headers.insert(AUTHORIZATION, "bearer xyz".parse().unwrap());
        assert_eq!(gate.extract_token(&headers), Some((TokenSource::Header, "xyz")));
    }

    #[test]
    fn session_cookie_carries_lifetime() {
        let cookie = gate().session_cookie("tok");
        assert!(cookie.starts_with("jwt=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=259200"));
    }
}
