//! Validated identity and the CAS protocol response parsers that produce it.

use std::collections::HashMap;
use std::collections::hash_map;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::Error;

/// Multi-valued user attributes released by the CAS server.
///
/// Keys are unique; values keep the order in which the server sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserAttributes(HashMap<String, Vec<String>>);

impl UserAttributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// All values of `name`, in server order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Append a value to `name`.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Vec<String>> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a UserAttributes {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = hash_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Identity established by a successful ticket validation.
///
/// CAS 1 servers only report the user; every other field then keeps its
/// default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AuthenticationResponse {
    /// Principal identifier.
    pub user: String,
    /// Proxy-granting ticket IOU, present when a callback URL was sent.
    #[serde(default)]
    pub proxy_granting_ticket: Option<String>,
    /// Proxy chain the ticket passed through, closest first.
    #[serde(default)]
    pub proxies: Vec<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub authentication_date: Option<OffsetDateTime>,
    /// The ticket was granted following a fresh login.
    #[serde(default)]
    pub is_new_login: bool,
    /// The ticket was granted from a remember-me token.
    #[serde(default)]
    pub is_remembered_login: bool,
    #[serde(default)]
    pub member_of: Vec<String>,
    #[serde(default)]
    pub attributes: UserAttributes,
}

impl AuthenticationResponse {
    /// Create a response carrying only the principal.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_proxy_granting_ticket(mut self, pgt_iou: impl Into<String>) -> Self {
        self.proxy_granting_ticket = Some(pgt_iou.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.add(name, value);
        self
    }

    #[must_use]
    pub fn with_authentication_date(mut self, date: OffsetDateTime) -> Self {
        self.authentication_date = Some(date);
        self
    }

    #[must_use]
    pub fn with_member_of(mut self, groups: Vec<String>) -> Self {
        self.member_of = groups;
        self
    }
}

/// Parses a CAS 1 `validate` body.
///
/// `no\n\n` is an explicit rejection and yields `Ok(None)`;
/// `yes\n<user>\n` yields a response carrying only the user.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] for any other body.
pub fn parse_cas1_response(body: &str) -> Result<Option<AuthenticationResponse>, Error> {
    if body == "no\n\n" {
        return Ok(None);
    }

    body.strip_prefix("yes\n")
        .and_then(|rest| rest.strip_suffix('\n'))
        .filter(|user| !user.is_empty() && !user.contains('\n'))
        .map(|user| Some(AuthenticationResponse::new(user)))
        .ok_or_else(|| Error::MalformedResponse(format!("unexpected CAS 1 response: {body:?}")))
}

/// Parses a CAS 2/3 `serviceResponse` document.
///
/// Attributes are accepted in the CAS 3 layout (children of
/// `<cas:attributes>`), the Jasig layout (`<cas:attribute name value/>`), and
/// the RubyCAS layout (extra children of `<cas:authenticationSuccess>`).
///
/// # Errors
///
/// Returns [`Error::AuthenticationFailure`] for an `<authenticationFailure>`
/// envelope and [`Error::MalformedResponse`] when the document is not a
/// well-formed service response.
pub fn parse_service_response(xml: &str) -> Result<AuthenticationResponse, Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = ServiceResponseParser::default();
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                parser.start(&path, &name, &e)?;
                path.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                parser.start(&path, &name, &e)?;
                parser.end(&path, &name, "");
            }
            Ok(Event::Text(e)) => {
                let unescaped = e.unescape().map_err(xml_error)?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => text.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::End(_)) => {
                if let Some(name) = path.pop() {
                    parser.end(&path, &name, text.trim());
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    parser.finish()
}

const ROOT: &str = "serviceResponse";
const SUCCESS: &str = "authenticationSuccess";
const FAILURE: &str = "authenticationFailure";

#[derive(Default)]
struct ServiceResponseParser {
    seen_root: bool,
    success: Option<AuthenticationResponse>,
    failure: Option<(String, String)>,
}

impl ServiceResponseParser {
    fn start(&mut self, path: &[String], name: &str, e: &BytesStart<'_>) -> Result<(), Error> {
        let path: Vec<&str> = path.iter().map(String::as_str).collect();
        match (path.as_slice(), name) {
            ([], ROOT) => self.seen_root = true,
            ([], other) => {
                return Err(Error::MalformedResponse(format!(
                    "unexpected root element <{other}>"
                )));
            }
            ([ROOT], SUCCESS) => self.success = Some(AuthenticationResponse::default()),
            ([ROOT], FAILURE) => {
                self.failure = Some((attribute(e, "code").unwrap_or_default(), String::new()));
            }
            ([ROOT, SUCCESS, "attributes"], "attribute") => {
                if let (Some(success), Some(attr_name)) = (&mut self.success, attribute(e, "name")) {
                    if !attr_name.is_empty() {
                        let value = attribute(e, "value").unwrap_or_default();
                        success.attributes.add(attr_name, value.trim());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, path: &[String], name: &str, text: &str) {
        let path: Vec<&str> = path.iter().map(String::as_str).collect();

        if let ([ROOT], FAILURE) = (path.as_slice(), name) {
            if let Some((_, message)) = &mut self.failure {
                *message = text.to_string();
            }
            return;
        }

        let Some(success) = &mut self.success else {
            return;
        };

        match (path.as_slice(), name) {
            ([ROOT, SUCCESS], "user") => success.user = text.to_string(),
            ([ROOT, SUCCESS], "proxyGrantingTicket") => {
                if !text.is_empty() {
                    success.proxy_granting_ticket = Some(text.to_string());
                }
            }
            ([ROOT, SUCCESS], "attributes" | "proxies") => {}
            ([ROOT, SUCCESS], other) => success.attributes.add(other, text),
            ([ROOT, SUCCESS, "proxies"], "proxy") => success.proxies.push(text.to_string()),
            ([ROOT, SUCCESS, "attributes"], attr) => match attr {
                "authenticationDate" => success.authentication_date = parse_date(text),
                "longTermAuthenticationRequestTokenUsed" => {
                    success.is_remembered_login = parse_bool(text);
                }
                "isFromNewLogin" | "isNewLogin" => success.is_new_login = parse_bool(text),
                "memberOf" => success.member_of.push(text.to_string()),
                "attribute" => {}
                other => success.attributes.add(other, text),
            },
            _ => {}
        }
    }

    fn finish(self) -> Result<AuthenticationResponse, Error> {
        if !self.seen_root {
            return Err(Error::MalformedResponse("missing <cas:serviceResponse>".into()));
        }
        if let Some(success) = self.success {
            if success.user.is_empty() {
                return Err(Error::MalformedResponse(
                    "authenticationSuccess without user".into(),
                ));
            }
            return Ok(success);
        }
        if let Some((code, message)) = self.failure {
            return Err(Error::AuthenticationFailure { code, message });
        }
        Err(Error::MalformedResponse(
            "neither authenticationSuccess nor authenticationFailure present".into(),
        ))
    }
}

pub(crate) fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().into_inner()).into_owned()
}

pub(crate) fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().into_inner() == name.as_bytes())
        .map(|attr| {
            attr.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned())
        })
}

pub(crate) fn xml_error(e: quick_xml::Error) -> Error {
    Error::MalformedResponse(format!("XML parse error: {e}"))
}

fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// CAS servers emit RFC 3339, Java `ZonedDateTime` (`…-04:00[America/New_York]`)
/// and offset-less local timestamps. The last are taken as UTC.
fn parse_date(value: &str) -> Option<OffsetDateTime> {
    let trimmed = value.split('[').next().unwrap_or(value).trim();
    let parsed = OffsetDateTime::parse(trimmed, &Rfc3339).or_else(|_| {
        PrimitiveDateTime::parse(trimmed, &Iso8601::DEFAULT).map(PrimitiveDateTime::assume_utc)
    });
    match parsed {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::warn!(value = %value, error = %e, "Ignoring unparseable authenticationDate");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cas1_rejection_is_not_an_error() {
        assert_eq!(parse_cas1_response("no\n\n").unwrap(), None);
    }

    #[test]
    fn test_cas1_success_carries_only_user() {
        let response = parse_cas1_response("yes\nalice\n").unwrap().unwrap();
        assert_eq!(response, AuthenticationResponse::new("alice"));
        assert!(response.attributes.is_empty());
        assert!(response.authentication_date.is_none());
    }

    #[test]
    fn test_cas1_garbage_is_malformed() {
        assert!(matches!(
            parse_cas1_response("maybe\n"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(parse_cas1_response("yes\n\n").is_err());
        assert!(parse_cas1_response("").is_err());
    }

    #[test]
    fn test_cas2_success() {
        let xml = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:authenticationSuccess>
    <cas:user>bob</cas:user>
    <cas:attributes>
      <cas:mail>bob@example.com</cas:mail>
    </cas:attributes>
    <cas:proxyGrantingTicket>PGTIOU-1</cas:proxyGrantingTicket>
  </cas:authenticationSuccess>
</cas:serviceResponse>"#;

        let response = parse_service_response(xml).unwrap();
        assert_eq!(response.user, "bob");
        assert_eq!(response.attributes.get_all("mail"), ["bob@example.com"]);
        assert_eq!(response.proxy_granting_ticket.as_deref(), Some("PGTIOU-1"));
        assert!(!response.is_new_login);
        assert!(!response.is_remembered_login);
    }

    #[test]
    fn test_cas3_protocol_attributes() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:authenticationSuccess>
    <cas:user>carol</cas:user>
    <cas:attributes>
      <cas:authenticationDate>2015-11-12T09:30:10Z</cas:authenticationDate>
      <cas:longTermAuthenticationRequestTokenUsed>true</cas:longTermAuthenticationRequestTokenUsed>
      <cas:isFromNewLogin>true</cas:isFromNewLogin>
      <cas:memberOf>staff</cas:memberOf>
      <cas:memberOf>admins</cas:memberOf>
      <cas:affiliation>staff</cas:affiliation>
      <cas:affiliation>faculty</cas:affiliation>
      <cas:displayName><![CDATA[Carol & Co]]></cas:displayName>
    </cas:attributes>
    <cas:proxies>
      <cas:proxy>https://proxy2.example.com/cb</cas:proxy>
      <cas:proxy>https://proxy1.example.com/cb</cas:proxy>
    </cas:proxies>
  </cas:authenticationSuccess>
</cas:serviceResponse>"#;

        let response = parse_service_response(xml).unwrap();
        assert_eq!(response.user, "carol");
        assert!(response.is_new_login);
        assert!(response.is_remembered_login);
        assert_eq!(response.member_of, ["staff", "admins"]);
        assert_eq!(
            response.authentication_date.unwrap().unix_timestamp(),
            1_447_320_610
        );
        assert_eq!(response.attributes.get_all("affiliation"), ["staff", "faculty"]);
        assert_eq!(response.attributes.get("displayName"), Some("Carol & Co"));
        assert!(!response.attributes.contains("memberOf"));
        assert!(!response.attributes.contains("authenticationDate"));
        assert_eq!(response.proxies.len(), 2);
        assert_eq!(response.proxies[0], "https://proxy2.example.com/cb");
    }

    #[test]
    fn test_jasig_named_attributes() {
        let xml = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:authenticationSuccess>
    <cas:user>dave</cas:user>
    <cas:attributes>
      <cas:attribute name="uid" value="dave01"/>
      <cas:attribute name="group" value=" ops "/>
      <cas:attribute name="" value="ignored"/>
    </cas:attributes>
  </cas:authenticationSuccess>
</cas:serviceResponse>"#;

        let response = parse_service_response(xml).unwrap();
        assert_eq!(response.attributes.get("uid"), Some("dave01"));
        assert_eq!(response.attributes.get("group"), Some("ops"));
        assert_eq!(response.attributes.len(), 2);
    }

    #[test]
    fn test_rubycas_extra_attributes() {
        let xml = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:authenticationSuccess>
    <cas:user>erin</cas:user>
    <cas:email>erin@example.com</cas:email>
  </cas:authenticationSuccess>
</cas:serviceResponse>"#;

        let response = parse_service_response(xml).unwrap();
        assert_eq!(response.attributes.get("email"), Some("erin@example.com"));
    }

    #[test]
    fn test_authentication_failure() {
        let xml = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:authenticationFailure code="INVALID_TICKET">
    Ticket ST-1856339-aA5Yuvrxzpv8Tau1cYQ7 not recognized
  </cas:authenticationFailure>
</cas:serviceResponse>"#;

        match parse_service_response(xml) {
            Err(Error::AuthenticationFailure { code, message }) => {
                assert_eq!(code, "INVALID_TICKET");
                assert_eq!(message, "Ticket ST-1856339-aA5Yuvrxzpv8Tau1cYQ7 not recognized");
            }
            other => panic!("expected authentication failure, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            parse_service_response("<html><body>oops</body></html>"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_service_response(""),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_service_response(
                r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas"></cas:serviceResponse>"#
            ),
            Err(Error::MalformedResponse(_))
        ));
        assert!(parse_service_response("<cas:serviceResponse><cas:authenticationSuccess>").is_err());
    }

    #[test]
    fn test_date_formats() {
        assert!(parse_date("2016-06-07T21:57:28.085-04:00[America/New_York]").is_some());
        assert!(parse_date("2016-06-07T21:57:28.085").is_some());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn test_response_serializes_for_external_stores() {
        let response = AuthenticationResponse::new("frank").with_attribute("mail", "f@example.com");
        let json = serde_json::to_string(&response).unwrap();
        let parsed: AuthenticationResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
    }
}
