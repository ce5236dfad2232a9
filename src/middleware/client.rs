use std::sync::Arc;

use axum::http::header::{COOKIE, LOCATION};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use url::Url;

use crate::error::Error;
use crate::logout::parse_logout_request;
use crate::proxy::Proxy;
use crate::response::AuthenticationResponse;
use crate::store::{MemorySessionStore, MemoryTicketStore, SessionStoreDyn, TicketStoreDyn};
use crate::types::SessionId;
use crate::url_scheme::{DefaultUrlScheme, UrlScheme, sanitised_url};
use crate::validate::ServiceTicketValidator;

use super::config::{CasConfig, CookieSettings, SESSION_COOKIE_NAME};
use super::cookies;
use super::error::AuthError;

/// Session-aware CAS client shared by the middleware.
///
/// Build one per application and hand it to
/// [`authenticate`](super::authenticate) as router state.
pub struct CasClient {
    tickets: Arc<dyn TicketStoreDyn>,
    sessions: Arc<dyn SessionStoreDyn>,
    urls: Arc<dyn UrlScheme>,
    http: reqwest::Client,
    validator: ServiceTicketValidator,
    proxy: Proxy,
    cookie: CookieSettings,
    send_service: bool,
}

impl std::fmt::Debug for CasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasClient")
            .field("urls", &self.urls)
            .field("proxy", &self.proxy)
            .field("send_service", &self.send_service)
            .finish_non_exhaustive()
    }
}

impl CasClient {
    /// Create a client from `config`. Stores default to the in-memory ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if proxying is enabled without a valid
    /// callback URL.
    pub fn new(config: CasConfig) -> Result<Self, Error> {
        let urls = config
            .urls
            .unwrap_or_else(|| Arc::new(DefaultUrlScheme::new(config.cas_url)));
        let http = config.http.unwrap_or_default();
        let proxy = Proxy::new(urls.clone(), config.proxy)?;

        Ok(Self {
            tickets: config
                .tickets
                .unwrap_or_else(|| Arc::new(MemoryTicketStore::new())),
            sessions: config
                .sessions
                .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
            validator: ServiceTicketValidator::new(http.clone(), urls.clone()),
            urls,
            http,
            proxy,
            cookie: config.cookie,
            send_service: config.send_service,
        })
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// CAS login URL that returns the user to `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL scheme cannot build the login URL.
    pub fn login_url(&self, service: &Url) -> Result<Url, Error> {
        let mut url = self.urls.login()?;
        url.query_pairs_mut()
            .append_pair("service", sanitised_url(service).as_str());
        Ok(url)
    }

    /// CAS logout URL; carries `service` only when configured to.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL scheme cannot build the logout URL.
    pub fn logout_url(&self, service: &Url) -> Result<Url, Error> {
        let mut url = self.urls.logout()?;
        if self.send_service {
            url.query_pairs_mut()
                .append_pair("service", sanitised_url(service).as_str());
        }
        Ok(url)
    }

    /// [`login_url`](Self::login_url) for the URL the request was made to.
    ///
    /// # Errors
    ///
    /// Returns an error if the request URL cannot be determined.
    pub fn login_url_for_request(&self, parts: &Parts) -> Result<Url, Error> {
        self.login_url(&request_url(parts)?)
    }

    /// [`logout_url`](Self::logout_url) for the URL the request was made to.
    ///
    /// # Errors
    ///
    /// Returns an error if the request URL cannot be determined.
    pub fn logout_url_for_request(&self, parts: &Parts) -> Result<Url, Error> {
        self.logout_url(&request_url(parts)?)
    }

    /// CAS 2 validation URL for `ticket` presented on this request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request URL cannot be determined.
    pub fn service_validate_url_for_request(
        &self,
        ticket: &str,
        parts: &Parts,
    ) -> Result<Url, Error> {
        self.validator
            .service_validate_url(&request_url(parts)?, ticket, &self.proxy)
    }

    /// CAS 1 validation URL for `ticket` presented on this request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request URL cannot be determined.
    pub fn validate_url_for_request(&self, ticket: &str, parts: &Parts) -> Result<Url, Error> {
        self.validator.validate_url(&request_url(parts)?, ticket)
    }

    /// Ask CAS for a proxy ticket for `target_service` using the
    /// proxy-granting ticket behind `pgt_iou`.
    ///
    /// # Errors
    ///
    /// See [`Proxy::request_proxy_ticket`].
    pub async fn proxy_ticket(&self, pgt_iou: &str, target_service: &str) -> Result<String, Error> {
        self.proxy
            .request_proxy_ticket(&self.http, target_service, pgt_iou)
            .await
    }

    /// Destroy the session named in a CAS logout request.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedResponse`] for an unreadable request and
    /// [`Error::Store`] when the ticket store fails.
    pub async fn single_logout(&self, logout_request: &str) -> Result<(), Error> {
        let request = parse_logout_request(logout_request)?;
        let ticket = request.session_index.as_str();
        tracing::info!(ticket = %ticket, "Processing single logout request");

        // Sessions bound to the ticket find it gone on their next request,
        // which unbinds them and expires the browser's cookie.
        self.tickets.delete_dyn(ticket).await.map_err(Error::Store)
    }

    /// Find (or mint) the session for this request and resolve its
    /// authentication, validating a `ticket` query parameter if present.
    ///
    /// Store and validation failures leave the request unauthenticated.
    pub(super) async fn resolve_session(
        &self,
        parts: &mut Parts,
        mut jar: CookieJar,
    ) -> (CookieJar, String, Option<Arc<AuthenticationResponse>>) {
        let session_id = match cookies::session_id(&jar) {
            Some(id) => id,
            None => {
                let id: String = SessionId::generate().into();
                tracing::debug!("Setting new session cookie");
                jar = jar.add(cookies::session_cookie(&self.cookie, &id));
                echo_session_cookie(&mut parts.headers, &id);
                id
            }
        };

        let mut invalidated = false;
        match self.sessions.get_dyn(&session_id).await {
            Ok(Some(ticket)) => match self.tickets.read_dyn(&ticket).await {
                Ok(Some(auth)) => {
                    tracing::debug!(ticket = %ticket, user = %auth.user, "Re-used ticket");
                    return (jar, session_id, Some(auth));
                }
                Ok(None) => {
                    tracing::info!(ticket = %ticket, "Ticket no longer valid, clearing session");
                    jar = self.invalidate_session(&session_id, jar).await;
                    invalidated = true;
                }
                Err(e) => {
                    tracing::warn!(ticket = %ticket, error = %e, "Ticket lookup failed, clearing session");
                    jar = self.invalidate_session(&session_id, jar).await;
                    invalidated = true;
                }
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Session lookup failed"),
        }

        let Some(ticket) = ticket_param(parts) else {
            return (jar, session_id, None);
        };

        let auth = match self.validate_request_ticket(parts, &ticket).await {
            Ok(Some(auth)) => auth,
            Ok(None) => {
                tracing::info!(ticket = %ticket, "CAS rejected ticket");
                return (jar, session_id, None);
            }
            Err(e) => {
                tracing::warn!(ticket = %ticket, error = %e, "Ticket validation failed");
                return (jar, session_id, None);
            }
        };

        if let Err(e) = self.tickets.write_dyn(&ticket, Arc::new(auth)).await {
            tracing::warn!(ticket = %ticket, error = %e, "Failed to store ticket");
            return (jar, session_id, None);
        }
        tracing::info!(ticket = %ticket, "Recording session");
        if let Err(e) = self.sessions.set_dyn(&session_id, &ticket).await {
            tracing::warn!(ticket = %ticket, error = %e, "Failed to bind session to ticket");
        }

        match self.tickets.read_dyn(&ticket).await {
            Ok(Some(auth)) => {
                if invalidated {
                    jar = jar.add(cookies::session_cookie(&self.cookie, &session_id));
                }
                (jar, session_id, Some(auth))
            }
            outcome => {
                if let Err(e) = outcome {
                    tracing::warn!(ticket = %ticket, error = %e, "Ticket lookup failed");
                }
                let jar = self.invalidate_session(&session_id, jar).await;
                (jar, session_id, None)
            }
        }
    }

    /// Tear down a session: forget its ticket, unbind it, expire the cookie.
    pub(super) async fn clear_session(&self, session_id: &str, jar: CookieJar) -> CookieJar {
        match self.sessions.get_dyn(session_id).await {
            Ok(Some(ticket)) => {
                if let Err(e) = self.tickets.delete_dyn(&ticket).await {
                    tracing::warn!(ticket = %ticket, error = %e, "Failed to delete ticket");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Session lookup failed"),
        }
        self.invalidate_session(session_id, jar).await
    }

    /// 302 to the CAS login page, or 500 if no login URL can be built.
    pub(super) fn redirect_to_login(&self, service: Option<&Url>) -> Response {
        let url = service
            .ok_or(Error::Url(url::ParseError::EmptyHost))
            .and_then(|service| self.login_url(service));
        match url {
            Ok(url) => {
                tracing::info!(to = %url, "Redirecting client to CAS login");
                found(&url)
            }
            Err(e) => AuthError::Cas(e).into_response(),
        }
    }

    /// Clear the session, then 302 to the CAS logout page.
    pub(super) async fn redirect_to_logout(
        &self,
        service: Option<&Url>,
        session_id: Option<&str>,
    ) -> Response {
        let url = service
            .ok_or(Error::Url(url::ParseError::EmptyHost))
            .and_then(|service| self.logout_url(service));
        let url = match url {
            Ok(url) => url,
            Err(e) => return AuthError::Cas(e).into_response(),
        };

        let mut jar = CookieJar::new();
        if let Some(session_id) = session_id {
            jar = self.clear_session(session_id, jar).await;
        }
        tracing::info!(to = %url, "Redirecting client to CAS logout");
        (jar, found(&url)).into_response()
    }

    async fn validate_request_ticket(
        &self,
        parts: &Parts,
        ticket: &str,
    ) -> Result<Option<AuthenticationResponse>, Error> {
        let service = request_url(parts)?;
        self.validator
            .validate_ticket(&service, ticket, &self.proxy)
            .await
    }

    async fn invalidate_session(&self, session_id: &str, jar: CookieJar) -> CookieJar {
        if let Err(e) = self.sessions.delete_dyn(session_id).await {
            tracing::warn!(error = %e, "Failed to delete session binding");
        }
        jar.add(cookies::expired_session_cookie(&self.cookie, session_id))
    }
}

/// Reconstruct the absolute URL a request was made to.
///
/// Honours `X-Forwarded-Proto` and `X-Forwarded-Host` from a reverse proxy,
/// then the `Host` header, then the request target's authority.
///
/// # Errors
///
/// Returns [`Error::Url`] if no host is known or the result does not parse.
pub fn request_url(parts: &Parts) -> Result<Url, Error> {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let host = header("x-forwarded-host")
        .or_else(|| header("host"))
        .or_else(|| parts.uri.authority().map(|a| a.as_str()))
        .ok_or(Error::Url(url::ParseError::EmptyHost))?;
    let scheme = header("x-forwarded-proto")
        .or_else(|| parts.uri.scheme_str())
        .unwrap_or("http");
    let path = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());

    Ok(Url::parse(&format!("{scheme}://{host}{path}"))?)
}

fn ticket_param(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "ticket")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Make a freshly minted session cookie visible to downstream handlers.
fn echo_session_cookie(headers: &mut HeaderMap, session_id: &str) {
    if let Ok(value) = HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={session_id}")) {
        headers.append(COOKIE, value);
    }
}

fn found(url: &Url) -> Response {
    (StatusCode::FOUND, [(LOCATION, url.as_str())]).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;
    use crate::store::{SessionStore, TicketStore};

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn client(config: CasConfig) -> CasClient {
        CasClient::new(config).unwrap()
    }

    fn config() -> CasConfig {
        CasConfig::new("https://sso.example.com/cas/".parse().unwrap())
    }

    #[test]
    fn test_request_url_from_host_header() {
        let parts = parts("/account?tab=1", &[("host", "app.example.com")]);
        assert_eq!(
            request_url(&parts).unwrap().as_str(),
            "http://app.example.com/account?tab=1"
        );
    }

    #[test]
    fn test_request_url_prefers_forwarded_headers() {
        let parts = parts(
            "/account",
            &[
                ("host", "internal:8080"),
                ("x-forwarded-host", "app.example.com, proxy.local"),
                ("x-forwarded-proto", "https"),
            ],
        );
        assert_eq!(
            request_url(&parts).unwrap().as_str(),
            "https://app.example.com/account"
        );
    }

    #[test]
    fn test_request_url_without_host() {
        let parts = parts("/account", &[]);
        assert!(matches!(request_url(&parts), Err(Error::Url(_))));
    }

    #[test]
    fn test_login_url_sanitises_service() {
        let client = client(config());
        let service: Url = "https://alice:pw@app.example.com/page?ticket=ST-1&x=1"
            .parse()
            .unwrap();

        let url = client.login_url(&service).unwrap();
        let (_, service) = url.query_pairs().find(|(k, _)| k == "service").unwrap();
        assert!(url.as_str().starts_with("https://sso.example.com/cas/login?"));
        assert_eq!(service, "https://app.example.com/page?x=1");
    }

    #[test]
    fn test_logout_url_service_is_optional() {
        let service: Url = "https://app.example.com/".parse().unwrap();

        let url = client(config()).logout_url(&service).unwrap();
        assert_eq!(url.as_str(), "https://sso.example.com/cas/logout");

        let url = client(config().with_send_service(true))
            .logout_url(&service)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sso.example.com/cas/logout?service=https%3A%2F%2Fapp.example.com%2F"
        );
    }

    #[test]
    fn test_ticket_param() {
        assert_eq!(
            ticket_param(&parts("/?a=1&ticket=ST-9", &[])).as_deref(),
            Some("ST-9")
        );
        assert_eq!(ticket_param(&parts("/?ticket=", &[])), None);
        assert_eq!(ticket_param(&parts("/", &[])), None);
    }

    #[tokio::test]
    async fn test_new_session_cookie_is_echoed() {
        let client = client(config());
        let mut parts = parts("/", &[("host", "app.example.com")]);

        let (jar, session_id, auth) = client.resolve_session(&mut parts, CookieJar::new()).await;

        assert!(auth.is_none());
        assert_eq!(jar.get(SESSION_COOKIE_NAME).unwrap().value(), session_id);
        let echoed = parts.headers.get(COOKIE).unwrap().to_str().unwrap();
        assert_eq!(echoed, format!("{SESSION_COOKIE_NAME}={session_id}"));
    }

    #[tokio::test]
    async fn test_existing_session_resolves_without_validation() {
        let tickets = MemoryTicketStore::new();
        let sessions = MemorySessionStore::new();
        tickets
            .write("ST-1", Arc::new(AuthenticationResponse::new("carol")))
            .await
            .unwrap();
        sessions.set("sid", "ST-1").await.unwrap();

        let client = client(
            config()
                .with_ticket_store(tickets)
                .with_session_store(sessions),
        );
        let mut parts = parts("/", &[("host", "app.example.com")]);
        let jar = CookieJar::new().add(axum_extra::extract::cookie::Cookie::new(
            SESSION_COOKIE_NAME,
            "sid",
        ));

        let (_, session_id, auth) = client.resolve_session(&mut parts, jar).await;
        assert_eq!(session_id, "sid");
        assert_eq!(auth.unwrap().user, "carol");
    }

    #[tokio::test]
    async fn test_single_logout_forgets_ticket() {
        let tickets = MemoryTicketStore::new();
        tickets
            .write("ST-1", Arc::new(AuthenticationResponse::new("carol")))
            .await
            .unwrap();
        let client = client(config().with_ticket_store(tickets));

        let xml = r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="1" Version="2.0" IssueInstant="2024-01-01T00:00:00Z"><saml:NameID xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">carol</saml:NameID><samlp:SessionIndex>ST-1</samlp:SessionIndex></samlp:LogoutRequest>"#;
        client.single_logout(xml).await.unwrap();
        // Repeating is harmless.
        client.single_logout(xml).await.unwrap();

        assert!(client.tickets.read_dyn("ST-1").await.unwrap().is_none());
        assert!(client.single_logout("not xml").await.is_err());
    }
}
