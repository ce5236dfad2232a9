//! Service-ticket validation with CAS 2+ → CAS 1 fallback.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::USER_AGENT;
use url::Url;

use crate::error::Error;
use crate::proxy::Proxy;
use crate::response::{AuthenticationResponse, parse_cas1_response, parse_service_response};
use crate::url_scheme::{UrlScheme, sanitised_url};

pub(crate) const USER_AGENT_VALUE: &str =
    concat!("cas-client/", env!("CARGO_PKG_VERSION"), " (Rust)");

/// Validates service and proxy tickets against a CAS server.
///
/// The CAS 2+ `serviceValidate` endpoint is tried first; a 404 from it means
/// the server only speaks CAS 1, and the plaintext `validate` endpoint is
/// used instead. Nothing is retried here: timeouts and retry policy belong to
/// the injected [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ServiceTicketValidator {
    http: reqwest::Client,
    urls: Arc<dyn UrlScheme>,
}

impl ServiceTicketValidator {
    #[must_use]
    pub fn new(http: reqwest::Client, urls: Arc<dyn UrlScheme>) -> Self {
        Self { http, urls }
    }

    /// Validate `ticket` for `service`.
    ///
    /// Returns `Ok(None)` when a CAS 1 server explicitly rejects the ticket.
    ///
    /// # Errors
    ///
    /// [`Error::Http`] on network failure, [`Error::Protocol`] for any status
    /// other than 200 (and 404, which triggers the fallback),
    /// [`Error::AuthenticationFailure`] when CAS rejects the ticket, and
    /// [`Error::MalformedResponse`] for unreadable bodies.
    pub async fn validate_ticket(
        &self,
        service: &Url,
        ticket: &str,
        proxy: &Proxy,
    ) -> Result<Option<AuthenticationResponse>, Error> {
        tracing::info!(ticket = %ticket, service = %service, "Validating ticket");

        let url = self.service_validate_url(service, ticket, proxy)?;
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .send()
            .await?;

        tracing::debug!(status = %response.status(), "serviceValidate returned");

        if response.status() == StatusCode::NOT_FOUND {
            return self.validate_ticket_cas1(service, ticket).await;
        }

        let body = Self::ensure_ok(response, "service validate").await?;
        tracing::debug!(response = %body, "Received authentication response");

        let success = parse_service_response(&body)?;
        tracing::debug!(user = %success.user, "Parsed service response");
        Ok(Some(success))
    }

    async fn validate_ticket_cas1(
        &self,
        service: &Url,
        ticket: &str,
    ) -> Result<Option<AuthenticationResponse>, Error> {
        let url = self.validate_url(service, ticket)?;
        tracing::debug!(url = %url, "Falling back to CAS 1 validation");

        let response = self
            .http
            .get(url)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .send()
            .await?;

        let body = Self::ensure_ok(response, "validate").await?;
        parse_cas1_response(&body)
    }

    /// CAS 2+ `serviceValidate` URL for `ticket`.
    ///
    /// `pgtUrl` is included only when proxying is enabled.
    ///
    /// # Errors
    ///
    /// Propagates URL construction failures from the [`UrlScheme`].
    pub fn service_validate_url(
        &self,
        service: &Url,
        ticket: &str,
        proxy: &Proxy,
    ) -> Result<Url, Error> {
        let mut url = self.urls.service_validate()?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("service", sanitised_url(service).as_str())
                .append_pair("ticket", ticket);
            if let Some(callback) = proxy.callback_url().filter(|_| proxy.is_enabled()) {
                query.append_pair("pgtUrl", sanitised_url(callback).as_str());
            }
        }
        Ok(url)
    }

    /// CAS 1 `validate` URL for `ticket`.
    ///
    /// # Errors
    ///
    /// Propagates URL construction failures from the [`UrlScheme`].
    pub fn validate_url(&self, service: &Url, ticket: &str) -> Result<Url, Error> {
        let mut url = self.urls.validate()?;
        url.query_pairs_mut()
            .append_pair("service", sanitised_url(service).as_str())
            .append_pair("ticket", ticket);
        Ok(url)
    }

    /// Reads the body of a 200 response, or turns any other status into
    /// [`Error::Protocol`] carrying the body.
    async fn ensure_ok(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<String, Error> {
        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::OK {
            return Ok(body);
        }
        Err(Error::Protocol {
            operation,
            status: status.as_u16(),
            detail: body,
        })
    }
}
