use std::sync::Arc;

use axum_extra::extract::cookie::SameSite;
use time::Duration;
use url::Url;

use crate::error::Error;
use crate::proxy::ProxyOptions;
use crate::store::{SessionStore, SessionStoreDyn, TicketStore, TicketStoreDyn};
use crate::url_scheme::UrlScheme;

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "_cas_session";

/// Session cookie attributes.
#[derive(Debug, Clone)]
pub(crate) struct CookieSettings {
    pub(crate) path: String,
    pub(crate) domain: Option<String>,
    pub(crate) max_age: Duration,
    pub(crate) http_only: bool,
    pub(crate) secure: bool,
    pub(crate) same_site: Option<SameSite>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            path: "/".into(),
            domain: None,
            max_age: Duration::days(1),
            // Readable from scripts so Ajax requests can carry it.
            http_only: false,
            secure: false,
            same_site: None,
        }
    }
}

/// CAS client configuration.
///
/// The CAS server URL is the only required value; everything else has a
/// default and a `with_*` override.
///
/// ```rust,ignore
/// let config = CasConfig::new("https://sso.example.com/cas".parse()?)
///     .with_secure_cookies(true)
///     .with_send_service(true);
/// let client = Arc::new(CasClient::new(config)?);
/// ```
pub struct CasConfig {
    pub(super) cas_url: Url,
    pub(super) cookie: CookieSettings,
    pub(super) send_service: bool,
    pub(super) http: Option<reqwest::Client>,
    pub(super) urls: Option<Arc<dyn UrlScheme>>,
    pub(super) tickets: Option<Arc<dyn TicketStoreDyn>>,
    pub(super) sessions: Option<Arc<dyn SessionStoreDyn>>,
    pub(super) proxy: ProxyOptions,
}

impl CasConfig {
    /// Create config for the CAS server at `cas_url`.
    #[must_use]
    pub fn new(cas_url: Url) -> Self {
        Self {
            cas_url,
            cookie: CookieSettings::default(),
            send_service: false,
            http: None,
            urls: None,
            tickets: None,
            sessions: None,
            proxy: ProxyOptions::disabled(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `CAS_URL`: CAS server base URL
    ///
    /// # Optional env vars
    /// - `CAS_SEND_SERVICE`: `"1"`/`"true"` to pass `service` on logout
    /// - `CAS_COOKIE_PATH`, `CAS_COOKIE_DOMAIN`: session cookie scope
    /// - `CAS_COOKIE_MAX_AGE`: session cookie lifetime in seconds
    /// - `CAS_COOKIE_SECURE`, `CAS_COOKIE_HTTP_ONLY`: `"1"`/`"true"` to set the flag
    /// - `CAS_PROXY_CALLBACK_URL`: enables proxy tickets, delivered to this URL
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `CAS_URL` is missing or a value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        let cas_url_str =
            std::env::var("CAS_URL").map_err(|_| Error::Config("CAS_URL is required".into()))?;
        let cas_url: Url = cas_url_str
            .parse()
            .map_err(|e| Error::Config(format!("CAS_URL: {e}")))?;

        let mut config = Self::new(cas_url)
            .with_send_service(env_flag("CAS_SEND_SERVICE"))
            .with_secure_cookies(env_flag("CAS_COOKIE_SECURE"))
            .with_cookie_http_only(env_flag("CAS_COOKIE_HTTP_ONLY"));

        if let Ok(path) = std::env::var("CAS_COOKIE_PATH") {
            config = config.with_cookie_path(path);
        }
        if let Ok(domain) = std::env::var("CAS_COOKIE_DOMAIN") {
            config = config.with_cookie_domain(domain);
        }
        if let Ok(max_age) = std::env::var("CAS_COOKIE_MAX_AGE") {
            let seconds: i64 = max_age
                .parse()
                .map_err(|e| Error::Config(format!("CAS_COOKIE_MAX_AGE: {e}")))?;
            config = config.with_cookie_max_age(Duration::seconds(seconds));
        }
        if let Ok(callback) = std::env::var("CAS_PROXY_CALLBACK_URL") {
            config = config.with_proxy(ProxyOptions::enabled(callback));
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie.path = path.into();
        self
    }

    #[must_use]
    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_cookie_max_age(mut self, max_age: Duration) -> Self {
        self.cookie.max_age = max_age;
        self
    }

    #[must_use]
    pub fn with_cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie.same_site = Some(same_site);
        self
    }

    /// Pass the `service` parameter to the CAS logout page.
    #[must_use]
    pub fn with_send_service(mut self, send_service: bool) -> Self {
        self.send_service = send_service;
        self
    }

    /// Use a custom HTTP client (timeouts, connection pool reuse, testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Use a non-standard endpoint layout.
    #[must_use]
    pub fn with_url_scheme(mut self, urls: impl UrlScheme) -> Self {
        self.urls = Some(Arc::new(urls));
        self
    }

    #[must_use]
    pub fn with_ticket_store(mut self, store: impl TicketStore) -> Self {
        self.tickets = Some(Arc::new(store));
        self
    }

    #[must_use]
    pub fn with_session_store(mut self, store: impl SessionStore) -> Self {
        self.sessions = Some(Arc::new(store));
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, options: ProxyOptions) -> Self {
        self.proxy = options;
        self
    }
}

fn env_flag(name: &str) -> bool {
    matches!(std::env::var(name).as_deref(), Ok("1") | Ok("true"))
}
