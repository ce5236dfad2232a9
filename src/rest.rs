//! CAS REST protocol: credentials → TGT → ST → validation.
//!
//! See <https://apereo.github.io/cas/6.6.x/protocol/REST-Protocol.html>.
//! Every call goes to the CAS server; nothing is cached.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{LOCATION, USER_AGENT};
use url::Url;

use crate::error::Error;
use crate::proxy::Proxy;
use crate::response::AuthenticationResponse;
use crate::types::{ServiceTicket, TicketGrantingTicket};
use crate::url_scheme::{DefaultUrlScheme, UrlScheme};
use crate::validate::{ServiceTicketValidator, USER_AGENT_VALUE};

/// Client for the CAS REST ticket endpoints.
///
/// ```rust,ignore
/// let client = RestClient::new(cas_url, "https://api.example.com/".parse()?);
/// let tgt = client.request_granting_ticket("alice", "secret").await?;
/// let st = client.request_service_ticket(&tgt).await?;
/// let identity = client.validate_service_ticket(&st).await?;
/// client.logout(&tgt).await?;
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    urls: Arc<dyn UrlScheme>,
    service_url: Url,
    http: reqwest::Client,
    validator: ServiceTicketValidator,
    proxy: Proxy,
}

impl RestClient {
    /// Create a client for the CAS server at `cas_url` acting as `service_url`.
    #[must_use]
    pub fn new(cas_url: Url, service_url: Url) -> Self {
        let urls: Arc<dyn UrlScheme> = Arc::new(DefaultUrlScheme::new(cas_url));
        let http = reqwest::Client::new();
        Self {
            validator: ServiceTicketValidator::new(http.clone(), urls.clone()),
            proxy: Proxy::disabled(urls.clone()),
            urls,
            service_url,
            http,
        }
    }

    /// Use a custom HTTP client (timeouts, connection pool reuse, testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self.validator = ServiceTicketValidator::new(self.http.clone(), self.urls.clone());
        self
    }

    /// Use a non-standard endpoint layout.
    #[must_use]
    pub fn with_url_scheme(mut self, urls: impl UrlScheme) -> Self {
        self.urls = Arc::new(urls);
        self.validator = ServiceTicketValidator::new(self.http.clone(), self.urls.clone());
        // An explicitly configured proxy keeps its own scheme.
        if !self.proxy.is_enabled() {
            self.proxy = Proxy::disabled(self.urls.clone());
        }
        self
    }

    /// Request proxy-granting tickets during validation.
    #[must_use]
    pub fn with_proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = proxy;
        self
    }

    /// The service URL tickets are requested for.
    #[must_use]
    pub fn service_url(&self) -> &Url {
        &self.service_url
    }

    /// Exchange credentials for a ticket-granting ticket.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] unless CAS answers `201 Created`, and
    /// [`Error::MalformedResponse`] if the `Location` header does not name a
    /// ticket.
    pub async fn request_granting_ticket(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TicketGrantingTicket, Error> {
        let endpoint = self.urls.rest_granting_ticket()?;

        let response = self
            .http
            .post(endpoint)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Protocol {
                operation: "ticket granting ticket request",
                status: status.as_u16(),
                detail,
            });
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let tgt = location
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| {
                Error::MalformedResponse(format!(
                    "ticket endpoint returned no usable Location header: {location:?}"
                ))
            })?;

        tracing::debug!("Obtained ticket granting ticket");
        Ok(TicketGrantingTicket(tgt.to_string()))
    }

    /// Obtain a service ticket for the configured service URL.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] unless CAS answers `200 OK`.
    pub async fn request_service_ticket(
        &self,
        tgt: &TicketGrantingTicket,
    ) -> Result<ServiceTicket, Error> {
        let endpoint = self.urls.rest_service_ticket(tgt.as_str())?;

        let response = self
            .http
            .post(endpoint)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .form(&[("service", self.service_url.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(Error::Protocol {
                operation: "service ticket request",
                status: status.as_u16(),
                detail: body,
            });
        }

        let ticket = body.trim();
        if ticket.is_empty() {
            return Err(Error::MalformedResponse(
                "service ticket endpoint returned an empty body".into(),
            ));
        }
        Ok(ServiceTicket(ticket.to_string()))
    }

    /// Validate a service ticket for the configured service URL.
    ///
    /// # Errors
    ///
    /// See [`ServiceTicketValidator::validate_ticket`].
    pub async fn validate_service_ticket(
        &self,
        st: &ServiceTicket,
    ) -> Result<Option<AuthenticationResponse>, Error> {
        self.validator
            .validate_ticket(&self.service_url, st.as_str(), &self.proxy)
            .await
    }

    /// Destroy a ticket-granting ticket.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] unless CAS answers 200 or 204.
    pub async fn logout(&self, tgt: &TicketGrantingTicket) -> Result<(), Error> {
        let endpoint = self.urls.rest_logout(tgt.as_str())?;

        let response = self
            .http
            .delete(endpoint)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Protocol {
                operation: "ticket granting ticket destruction",
                status: status.as_u16(),
                detail,
            });
        }
        Ok(())
    }

    /// Run the full credential → identity exchange.
    ///
    /// A CAS 1 rejection is reported as [`Error::AuthenticationFailure`].
    ///
    /// # Errors
    ///
    /// Any error from the three underlying calls.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResponse, Error> {
        let tgt = self.request_granting_ticket(username, password).await?;
        let st = self.request_service_ticket(&tgt).await?;
        self.validate_service_ticket(&st)
            .await?
            .ok_or_else(|| Error::AuthenticationFailure {
                code: "INVALID_TICKET".into(),
                message: "CAS rejected the service ticket".into(),
            })
    }
}
