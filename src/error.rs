use crate::store::StoreError;

/// Errors raised while talking to a CAS server or managing ticket state.
///
/// An explicit negative authentication result (CAS 1 `no`) is not an error:
/// validation reports it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Network or I/O failure reaching the CAS server.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The CAS server answered with an unexpected status.
    #[error("{operation} failed (status {status}): {detail}")]
    Protocol {
        operation: &'static str,
        status: u16,
        detail: String,
    },

    /// The CAS server rejected the ticket (`<cas:authenticationFailure>`).
    #[error("authentication failure ({code}): {message}")]
    AuthenticationFailure { code: String, message: String },

    /// The response body could not be understood.
    #[error("malformed CAS response: {0}")]
    MalformedResponse(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    /// The proxy-granting ticket for this IOU has not been delivered to the
    /// callback yet. Retry later.
    #[error("proxy granting ticket not yet received for {0}")]
    ProxyNotCorrelated(String),

    /// The CAS server refused to issue a proxy ticket (`<cas:proxyFailure>`).
    #[error("proxy failure ({code}): {message}")]
    ProxyFailure { code: String, message: String },

    #[error("CAS response did not contain a proxy ticket")]
    MissingProxyTicket,

    #[error("no proxy granting ticket available in authentication response")]
    NoProxyGrantingTicket,

    #[error("cas: no client associated with request")]
    NoClient,

    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl Error {
    /// Whether the same call may succeed if repeated later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProxyNotCorrelated(_))
    }
}
