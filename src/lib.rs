#![doc = include_str!("../README.md")]

pub mod error;
pub mod logout;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod proxy;
pub mod response;
pub mod rest;
pub mod session_id;
pub mod store;
pub mod types;
pub mod url_scheme;
pub mod validate;

// Re-exports for convenient access
pub use error::Error;
pub use logout::{LogoutRequest, parse_logout_request};
pub use proxy::{MemoryProxyStore, Proxy, ProxyOptions, ProxyStore};
pub use response::{
    AuthenticationResponse, UserAttributes, parse_cas1_response, parse_service_response,
};
pub use rest::RestClient;
pub use store::{MemorySessionStore, MemoryTicketStore, SessionStore, StoreError, TicketStore};
pub use types::{ServiceTicket, SessionId, TicketGrantingTicket};
pub use url_scheme::{DefaultUrlScheme, UrlScheme, sanitised_url};
pub use validate::ServiceTicketValidator;
