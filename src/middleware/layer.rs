use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

use super::client::{CasClient, request_url};
use super::error::AuthError;
use super::extractor::CasContext;

/// Largest form body inspected for a single-logout request. Larger bodies,
/// and bodies of unknown length, go to the handler uninspected.
const MAX_LOGOUT_FORM_LEN: usize = 128 * 1024;

/// Session middleware: answers CAS single-logout posts, resolves the
/// request's session and attaches a [`CasContext`] for handlers.
///
/// Never rejects on its own; pair with [`require_login`] or check
/// [`CasContext::is_authenticated`].
///
/// ```rust,ignore
/// let client = Arc::new(CasClient::new(CasConfig::from_env()?)?);
/// let app = Router::new()
///     .route("/", get(home))
///     .layer(axum::middleware::from_fn_with_state(client.clone(), authenticate));
/// ```
pub async fn authenticate(
    State(client): State<Arc<CasClient>>,
    request: Request,
    next: Next,
) -> Response {
    tracing::info!(method = %request.method(), uri = %request.uri(), "Handling request");
    let (mut parts, mut body) = request.into_parts();

    if is_logout_post(&parts) && fits_logout_cap(&body) {
        let bytes = match axum::body::to_bytes(body, MAX_LOGOUT_FORM_LEN).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // The body is consumed at this point and cannot be handed on.
                tracing::warn!(error = %e, "Failed to read form body");
                return (StatusCode::BAD_REQUEST, "invalid form body").into_response();
            }
        };

        if let Some(logout_request) = logout_request_field(&bytes) {
            return match client.single_logout(&logout_request).await {
                Ok(()) => StatusCode::OK.into_response(),
                Err(e) => AuthError::Cas(e).into_response(),
            };
        }
        body = Body::from(bytes);
    }

    let jar = CookieJar::from_headers(&parts.headers);
    let (jar, session_id, authentication) = client.resolve_session(&mut parts, jar).await;

    let context = CasContext::new(
        client.clone(),
        request_url(&parts).ok(),
        session_id,
        authentication,
    );
    parts.extensions.insert(context);

    let response = next.run(Request::from_parts(parts, body)).await;
    (jar, response).into_response()
}

/// Redirects unauthenticated requests to CAS login and turns `/logout`
/// into a CAS logout. Layer inside [`authenticate`].
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/", get(home))
///     .layer(axum::middleware::from_fn(require_login))
///     .layer(axum::middleware::from_fn_with_state(client.clone(), authenticate));
/// ```
pub async fn require_login(cas: CasContext, request: Request, next: Next) -> Response {
    if !cas.is_authenticated() {
        return cas.redirect_to_login();
    }
    if request.uri().path() == "/logout" {
        return cas.redirect_to_logout().await;
    }
    next.run(request).await
}

fn is_logout_post(parts: &Parts) -> bool {
    parts.method == Method::POST
        && parts
            .headers
            .get(CONTENT_TYPE)
            .is_some_and(|v| v.as_bytes() == b"application/x-www-form-urlencoded")
}

fn fits_logout_cap(body: &Body) -> bool {
    body.size_hint()
        .upper()
        .is_some_and(|len| len <= MAX_LOGOUT_FORM_LEN as u64)
}

fn logout_request_field(body: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(k, _)| k == "logoutRequest")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}
