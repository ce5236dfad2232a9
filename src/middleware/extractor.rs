use std::sync::{Arc, LazyLock};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use time::OffsetDateTime;
use url::Url;

use super::client::CasClient;
use super::error::AuthError;
use crate::error::Error;
use crate::response::{AuthenticationResponse, UserAttributes};

static NO_ATTRIBUTES: LazyLock<UserAttributes> = LazyLock::new(UserAttributes::new);

/// Per-request CAS state attached by [`authenticate`](super::authenticate)
/// and [`basic_auth`](super::basic_auth).
///
/// Use as an Axum extractor in route handlers. Accessors return empty
/// values when the request is not authenticated.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(cas: CasContext) -> Response {
///     if !cas.is_authenticated() {
///         return cas.redirect_to_login();
///     }
///     format!("Hello, {}", cas.username()).into_response()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CasContext {
    authentication: Option<Arc<AuthenticationResponse>>,
    client: Option<Arc<CasClient>>,
    service_url: Option<Url>,
    session_id: Option<String>,
}

impl CasContext {
    pub(super) fn new(
        client: Arc<CasClient>,
        service_url: Option<Url>,
        session_id: String,
        authentication: Option<Arc<AuthenticationResponse>>,
    ) -> Self {
        Self {
            authentication,
            client: Some(client),
            service_url,
            session_id: Some(session_id),
        }
    }

    /// Context for a request authenticated without a browser session.
    pub(super) fn authenticated(authentication: Arc<AuthenticationResponse>) -> Self {
        Self {
            authentication: Some(authentication),
            client: None,
            service_url: None,
            session_id: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authentication.is_some()
    }

    pub fn authentication(&self) -> Option<&AuthenticationResponse> {
        self.authentication.as_deref()
    }

    /// Authenticated principal, or `""`.
    pub fn username(&self) -> &str {
        self.authentication.as_deref().map_or("", |a| a.user.as_str())
    }

    pub fn attributes(&self) -> &UserAttributes {
        self.authentication
            .as_deref()
            .map_or(&*NO_ATTRIBUTES, |a| &a.attributes)
    }

    pub fn authentication_date(&self) -> Option<OffsetDateTime> {
        self.authentication
            .as_deref()
            .and_then(|a| a.authentication_date)
    }

    pub fn is_new_login(&self) -> bool {
        self.authentication.as_deref().is_some_and(|a| a.is_new_login)
    }

    pub fn is_remembered_login(&self) -> bool {
        self.authentication
            .as_deref()
            .is_some_and(|a| a.is_remembered_login)
    }

    pub fn member_of(&self) -> &[String] {
        self.authentication
            .as_deref()
            .map(|a| a.member_of.as_slice())
            .unwrap_or_default()
    }

    /// Proxy-granting ticket IOU from validation, if any.
    pub fn proxy_granting_ticket(&self) -> Option<&str> {
        self.authentication
            .as_deref()
            .and_then(|a| a.proxy_granting_ticket.as_deref())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// 302 to the CAS login page for this request's URL.
    pub fn redirect_to_login(&self) -> Response {
        match &self.client {
            Some(client) => client.redirect_to_login(self.service_url.as_ref()),
            None => AuthError::NoClient.into_response(),
        }
    }

    /// Destroy the local session and 302 to the CAS logout page.
    pub async fn redirect_to_logout(&self) -> Response {
        match &self.client {
            Some(client) => {
                client
                    .redirect_to_logout(self.service_url.as_ref(), self.session_id.as_deref())
                    .await
            }
            None => AuthError::NoClient.into_response(),
        }
    }

    /// Obtain a proxy ticket for `target_service` on behalf of the user.
    ///
    /// # Errors
    ///
    /// [`Error::NoProxyGrantingTicket`] when validation yielded no IOU,
    /// otherwise see [`CasClient::proxy_ticket`].
    pub async fn proxy_ticket(&self, target_service: &str) -> Result<String, Error> {
        let client = self
            .client
            .as_ref()
            .ok_or(Error::NoClient)?;
        let pgt_iou = self
            .proxy_granting_ticket()
            .ok_or(Error::NoProxyGrantingTicket)?;
        client.proxy_ticket(pgt_iou, target_service).await
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CasContext {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CasContext>()
            .cloned()
            .ok_or(AuthError::NoClient)
    }
}

/// Authenticated user. Returns `401 Unauthorized` when the request carries
/// no authentication.
///
/// ```rust,ignore
/// async fn protected(Authenticated(user): Authenticated) -> String {
///     format!("Hello, {}", user.user)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authenticated(pub Arc<AuthenticationResponse>);

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CasContext>()
            .and_then(|cas| cas.authentication.clone())
            .map(Authenticated)
            .ok_or(AuthError::Unauthenticated)
    }
}
