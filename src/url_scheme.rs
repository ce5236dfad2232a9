//! CAS endpoint URLs.
//!
//! [`UrlScheme`] is the seam for servers that deviate from the standard
//! endpoint layout; [`DefaultUrlScheme`] covers the stock CAS paths.

use url::Url;

use crate::error::Error;

/// Builds the CAS server URLs the client talks to.
pub trait UrlScheme: Send + Sync + std::fmt::Debug + 'static {
    /// Interactive login page.
    fn login(&self) -> Result<Url, Error>;
    /// Interactive logout page.
    fn logout(&self) -> Result<Url, Error>;
    /// CAS 1 `validate` endpoint.
    fn validate(&self) -> Result<Url, Error>;
    /// CAS 2+ `serviceValidate` endpoint.
    fn service_validate(&self) -> Result<Url, Error>;
    /// Proxy-ticket issuing endpoint.
    fn proxy(&self) -> Result<Url, Error>;
    /// Proxy-ticket validation endpoint.
    fn proxy_validate(&self) -> Result<Url, Error>;
    /// REST endpoint that issues ticket-granting tickets.
    fn rest_granting_ticket(&self) -> Result<Url, Error>;
    /// REST endpoint that issues service tickets for `tgt`.
    fn rest_service_ticket(&self, tgt: &str) -> Result<Url, Error>;
    /// REST endpoint that destroys `tgt`.
    fn rest_logout(&self, tgt: &str) -> Result<Url, Error>;
}

/// Standard CAS endpoint layout below a base URL.
///
/// Paths are public so individual endpoints can be relocated:
///
/// ```rust
/// use cas_client::url_scheme::{DefaultUrlScheme, UrlScheme};
///
/// let mut scheme = DefaultUrlScheme::new("https://sso.example.com/cas".parse().unwrap());
/// scheme.login_path = "signin".into();
/// assert_eq!(scheme.login().unwrap().as_str(), "https://sso.example.com/cas/signin");
/// ```
#[derive(Debug, Clone)]
pub struct DefaultUrlScheme {
    base: Url,
    pub login_path: String,
    pub logout_path: String,
    pub validate_path: String,
    pub service_validate_path: String,
    pub proxy_path: String,
    pub proxy_validate_path: String,
    pub rest_endpoint: String,
}

impl DefaultUrlScheme {
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self {
            base,
            login_path: "login".into(),
            logout_path: "logout".into(),
            validate_path: "validate".into(),
            service_validate_path: "serviceValidate".into(),
            proxy_path: "proxy".into(),
            proxy_validate_path: "proxyValidate".into(),
            rest_endpoint: "v1/tickets".into(),
        }
    }

    /// The CAS server base URL.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn create_url(&self, path: &str) -> Result<Url, Error> {
        if self.base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "CAS URL cannot be a base: {}",
                self.base
            )));
        }
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}/{}", path.trim_start_matches('/')));
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}

impl UrlScheme for DefaultUrlScheme {
    fn login(&self) -> Result<Url, Error> {
        self.create_url(&self.login_path)
    }

    fn logout(&self) -> Result<Url, Error> {
        self.create_url(&self.logout_path)
    }

    fn validate(&self) -> Result<Url, Error> {
        self.create_url(&self.validate_path)
    }

    fn service_validate(&self) -> Result<Url, Error> {
        self.create_url(&self.service_validate_path)
    }

    fn proxy(&self) -> Result<Url, Error> {
        self.create_url(&self.proxy_path)
    }

    fn proxy_validate(&self) -> Result<Url, Error> {
        self.create_url(&self.proxy_validate_path)
    }

    fn rest_granting_ticket(&self) -> Result<Url, Error> {
        self.create_url(&self.rest_endpoint)
    }

    fn rest_service_ticket(&self, tgt: &str) -> Result<Url, Error> {
        self.create_url(&format!("{}/{tgt}", self.rest_endpoint))
    }

    fn rest_logout(&self, tgt: &str) -> Result<Url, Error> {
        self.create_url(&format!("{}/{tgt}", self.rest_endpoint))
    }
}

/// Prepares a service URL for use as the `service` query parameter.
///
/// Embedded credentials (`user:pass@`) are removed so they never reach the
/// CAS server or its logs, and a `ticket` parameter left over from the
/// login redirect is dropped. The remaining query is always re-encoded in
/// `application/x-www-form-urlencoded` form.
#[must_use]
pub fn sanitised_url(service: &Url) -> Url {
    let mut url = service.clone();
    // Only fails for cannot-be-a-base URLs, which carry no userinfo.
    let _ = url.set_username("");
    let _ = url.set_password(None);

    // The query is re-encoded whether or not a ticket was present, so the
    // login redirect and the later validation send the same service string.
    if url.query().is_some() {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "ticket")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    url
}
