//! CAS proxy-ticket support.
//!
//! When proxying is enabled, ticket validation sends a `pgtUrl` callback. The
//! CAS server then calls that URL with the real proxy-granting ticket
//! (`pgtId`) and a placeholder (`pgtIou`), and separately returns the
//! placeholder in the validation response. The callback and the validation
//! response may arrive in either order, so a lookup miss is reported as
//! [`Error::ProxyNotCorrelated`], which is retryable.

mod response;
mod store;

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::USER_AGENT;
use url::Url;

use crate::error::Error;
use crate::url_scheme::UrlScheme;
use crate::validate::USER_AGENT_VALUE;

pub use response::{ProxyResponse, parse_proxy_response};
pub use store::{MemoryProxyStore, ProxyStore};

use store::ProxyStoreDyn;

/// Proxy configuration.
///
/// ```rust
/// use cas_client::proxy::ProxyOptions;
///
/// let options = ProxyOptions::enabled("https://app.example.com/cas/proxy-callback");
/// ```
#[derive(Default)]
pub struct ProxyOptions {
    enabled: bool,
    callback_url: Option<String>,
    store: Option<Arc<dyn ProxyStoreDyn>>,
}

impl ProxyOptions {
    /// Proxy support switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Request proxy-granting tickets, delivered to `callback_url`.
    #[must_use]
    pub fn enabled(callback_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            callback_url: Some(callback_url.into()),
            store: None,
        }
    }

    /// Use a custom correlation store (default: [`MemoryProxyStore`]).
    #[must_use]
    pub fn with_store(mut self, store: impl ProxyStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }
}

/// Proxy-granting ticket correlation and proxy-ticket issuing.
#[derive(Clone)]
pub struct Proxy {
    enabled: bool,
    callback_url: Option<Url>,
    store: Arc<dyn ProxyStoreDyn>,
    urls: Arc<dyn UrlScheme>,
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("enabled", &self.enabled)
            .field("callback_url", &self.callback_url.as_ref().map(Url::as_str))
            .finish_non_exhaustive()
    }
}

impl Proxy {
    /// Build the proxy subsystem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the callback URL does not parse or proxying
    /// is enabled without one. No instance is produced in that case.
    pub fn new(urls: Arc<dyn UrlScheme>, options: ProxyOptions) -> Result<Self, Error> {
        let callback_url = options
            .callback_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| Error::Config(format!("proxy callback URL: {e}")))?;

        if options.enabled && callback_url.is_none() {
            return Err(Error::Config(
                "proxy support requires a callback URL".into(),
            ));
        }

        Ok(Self {
            enabled: options.enabled,
            callback_url,
            store: options
                .store
                .unwrap_or_else(|| Arc::new(MemoryProxyStore::new())),
            urls,
        })
    }

    /// Proxy support switched off.
    #[must_use]
    pub fn disabled(urls: Arc<dyn UrlScheme>) -> Self {
        Self {
            enabled: false,
            callback_url: None,
            store: Arc::new(MemoryProxyStore::new()),
            urls,
        }
    }

    /// Whether validation should request proxy-granting tickets.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// URL the CAS server delivers proxy-granting tickets to.
    #[must_use]
    pub fn callback_url(&self) -> Option<&Url> {
        self.callback_url.as_ref()
    }

    /// Record a callback delivery.
    ///
    /// Calls missing either parameter are ignored. Never fails: the CAS
    /// server expects a 200 from the callback whatever it sent.
    pub async fn handle_callback(&self, pgt_iou: Option<&str>, pgt_id: Option<&str>) {
        let (Some(iou), Some(pgt)) = (
            pgt_iou.filter(|s| !s.is_empty()),
            pgt_id.filter(|s| !s.is_empty()),
        ) else {
            tracing::debug!("Proxy callback without pgtIou/pgtId");
            return;
        };

        match self.store.set_dyn(iou, pgt).await {
            Ok(()) => tracing::debug!(pgt_iou = %iou, "Stored proxy granting ticket"),
            Err(e) => {
                tracing::warn!(pgt_iou = %iou, error = %e, "Failed to store proxy granting ticket");
            }
        }
    }

    /// Proxy-granting ticket delivered for `pgt_iou`, if it has arrived.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the correlation store fails.
    pub async fn proxy_granting_ticket(&self, pgt_iou: &str) -> Result<Option<String>, Error> {
        self.store.get_dyn(pgt_iou).await.map_err(Error::Store)
    }

    /// URL of the CAS `proxy` endpoint issuing a ticket for `target_service`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProxyNotCorrelated`] if the callback for `pgt_iou`
    /// has not arrived yet.
    pub async fn proxy_url(&self, target_service: &str, pgt_iou: &str) -> Result<Url, Error> {
        let pgt = self
            .proxy_granting_ticket(pgt_iou)
            .await?
            .ok_or_else(|| Error::ProxyNotCorrelated(pgt_iou.to_string()))?;

        let mut url = self.urls.proxy()?;
        url.query_pairs_mut()
            .append_pair("targetService", target_service)
            .append_pair("pgt", &pgt);
        Ok(url)
    }

    /// Obtain a proxy ticket for `target_service`.
    ///
    /// # Errors
    ///
    /// [`Error::ProxyNotCorrelated`] before the callback arrived,
    /// [`Error::Http`] on network failure, [`Error::Protocol`] for a non-200
    /// reply, [`Error::ProxyFailure`] when CAS refuses, and
    /// [`Error::MissingProxyTicket`] when a 200 reply carries no ticket.
    pub async fn request_proxy_ticket(
        &self,
        http: &reqwest::Client,
        target_service: &str,
        pgt_iou: &str,
    ) -> Result<String, Error> {
        let url = self.proxy_url(target_service, pgt_iou).await?;

        let response = http
            .get(url)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(Error::Protocol {
                operation: "proxy ticket request",
                status: status.as_u16(),
                detail: body,
            });
        }

        let ticket = parse_proxy_response(&body)?.into_ticket()?;
        tracing::debug!(target_service = %target_service, "Obtained proxy ticket");
        Ok(ticket)
    }
}
