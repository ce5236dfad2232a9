use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::extractor::CasContext;
use crate::rest::RestClient;

const BASIC_REALM: &str = r#"Basic realm="CAS Protected Area""#;

/// HTTP Basic-Auth middleware backed by the CAS REST protocol.
///
/// Each request's credentials go through the full TGT → ST → validation
/// round trip. Any failure answers `401` with a Basic challenge; on success
/// a [`CasContext`] is attached.
///
/// ```rust,ignore
/// let rest = Arc::new(RestClient::new(cas_url, "https://api.example.com/".parse()?));
/// let app = Router::new()
///     .route("/api", get(api))
///     .layer(axum::middleware::from_fn_with_state(rest, basic_auth));
/// ```
pub async fn basic_auth(
    State(client): State<Arc<RestClient>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some((username, password)) = basic_credentials(request.headers()) else {
        tracing::debug!("Missing Basic credentials");
        return challenge();
    };

    match client.authenticate(&username, &password).await {
        Ok(auth) => {
            tracing::debug!(user = %auth.user, "REST authentication succeeded");
            request
                .extensions_mut()
                .insert(CasContext::authenticated(Arc::new(auth)));
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(username = %username, error = %e, "REST authentication failed");
            challenge()
        }
    }
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn challenge() -> Response {
    (StatusCode::UNAUTHORIZED, [(WWW_AUTHENTICATE, BASIC_REALM)]).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn test_basic_credentials() {
        // alice:s3cr:et
        let headers = headers("Basic YWxpY2U6czNjcjpldA==");
        assert_eq!(
            basic_credentials(&headers),
            Some(("alice".into(), "s3cr:et".into()))
        );
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert_eq!(basic_credentials(&headers("Bearer abc")), None);
        assert_eq!(basic_credentials(&headers("Basic !!!")), None);
        assert_eq!(basic_credentials(&HeaderMap::new()), None);
    }

    #[test]
    fn test_challenge() {
        let response = challenge();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], BASIC_REALM);
    }
}
