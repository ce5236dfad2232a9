use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::Error;
use crate::response::{attribute, local_name, xml_error};

/// Outcome reported by the CAS `proxy` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyResponse {
    /// `<cas:proxySuccess><cas:proxyTicket>PT-…</cas:proxyTicket></cas:proxySuccess>`
    Success { proxy_ticket: String },
    /// `<cas:proxyFailure code="…">message</cas:proxyFailure>`
    Failure { code: String, message: String },
}

impl ProxyResponse {
    /// The proxy ticket, or the error explaining why there is none.
    ///
    /// # Errors
    ///
    /// [`Error::ProxyFailure`] for a failure envelope and
    /// [`Error::MissingProxyTicket`] for a success envelope without a ticket.
    pub fn into_ticket(self) -> Result<String, Error> {
        match self {
            Self::Success { proxy_ticket } if !proxy_ticket.is_empty() => Ok(proxy_ticket),
            Self::Success { .. } => Err(Error::MissingProxyTicket),
            Self::Failure { code, message } => Err(Error::ProxyFailure { code, message }),
        }
    }
}

/// Parse the `serviceResponse` returned by the `proxy` endpoint.
///
/// # Errors
///
/// [`Error::MalformedResponse`] for unreadable XML and
/// [`Error::MissingProxyTicket`] when neither envelope is present.
pub fn parse_proxy_response(xml: &str) -> Result<ProxyResponse, Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut ticket: Option<String> = None;
    let mut failure: Option<(String, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if name == "proxyFailure" {
                    failure = Some((attribute(&e, "code").unwrap_or_default(), String::new()));
                }
                if name == "proxySuccess" && ticket.is_none() {
                    ticket = Some(String::new());
                }
                path.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                if name == "proxyFailure" {
                    failure = Some((attribute(&e, "code").unwrap_or_default(), String::new()));
                }
                if name == "proxySuccess" {
                    ticket = Some(String::new());
                }
            }
            Ok(Event::Text(e)) => text.push_str(&e.unescape().map_err(xml_error)?),
            Ok(Event::End(_)) => {
                let name = path.pop().unwrap_or_default();
                let parent = path.last().map(String::as_str);
                match (parent, name.as_str()) {
                    (Some("proxySuccess"), "proxyTicket") => ticket = Some(text.trim().to_string()),
                    (_, "proxyFailure") => {
                        if let Some((_, message)) = &mut failure {
                            *message = text.trim().to_string();
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    match (ticket, failure) {
        (Some(proxy_ticket), _) => Ok(ProxyResponse::Success { proxy_ticket }),
        (None, Some((code, message))) => Ok(ProxyResponse::Failure { code, message }),
        (None, None) => Err(Error::MissingProxyTicket),
    }
}
