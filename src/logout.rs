//! CAS single logout (SLO) request parsing.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::Error;
use crate::response::{attribute, local_name, xml_error};

/// Upper bound on a `logoutRequest` form value.
const MAX_LOGOUT_REQUEST_LEN: usize = 64 * 1024;

/// A `<samlp:LogoutRequest>` sent by the CAS server when the user's SSO
/// session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct LogoutRequest {
    pub id: Option<String>,
    pub issue_instant: Option<String>,
    pub name_id: Option<String>,
    /// The service ticket whose session must be revoked.
    pub session_index: String,
}

/// Parse the XML carried in the `logoutRequest` form field.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the XML is malformed, the root is
/// not a `LogoutRequest`, or no `SessionIndex` is present.
pub fn parse_logout_request(xml: &str) -> Result<LogoutRequest, Error> {
    if xml.len() > MAX_LOGOUT_REQUEST_LEN {
        return Err(Error::MalformedResponse("logout request too large".into()));
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut id = None;
    let mut issue_instant = None;
    let mut name_id = None;
    let mut session_index = None;
    let mut seen_root = false;
    let mut current_element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let local = local_name(e);
                if !seen_root {
                    if local != "LogoutRequest" {
                        return Err(Error::MalformedResponse(format!(
                            "unexpected root element <{local}>"
                        )));
                    }
                    seen_root = true;
                    id = attribute(e, "ID");
                    issue_instant = attribute(e, "IssueInstant");
                }
                current_element = local;
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(xml_error)?.trim().to_string();
                match current_element.as_str() {
                    "NameID" => name_id = Some(text),
                    "SessionIndex" => session_index = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current_element.clear(),
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    if !seen_root {
        return Err(Error::MalformedResponse("missing LogoutRequest".into()));
    }

    let session_index = session_index
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::MalformedResponse("missing SessionIndex".into()))?;

    Ok(LogoutRequest {
        id,
        issue_instant,
        name_id,
        session_index,
    })
}
