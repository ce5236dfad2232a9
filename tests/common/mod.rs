//! Mock CAS server helpers shared by the integration tests.

#![allow(dead_code)]

use url::Url;
use wiremock::MockServer;

/// Start a mock server and return it with the CAS base URL below it.
pub async fn cas_server() -> (MockServer, Url) {
    let server = MockServer::start().await;
    let base = format!("{}/cas", server.uri()).parse().unwrap();
    (server, base)
}

pub fn success_xml(user: &str) -> String {
    format!(
        r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:authenticationSuccess>
    <cas:user>{user}</cas:user>
    <cas:attributes>
      <cas:mail>{user}@example.com</cas:mail>
      <cas:isFromNewLogin>true</cas:isFromNewLogin>
    </cas:attributes>
  </cas:authenticationSuccess>
</cas:serviceResponse>"#
    )
}

pub fn success_with_pgt_xml(user: &str, pgt_iou: &str) -> String {
    format!(
        r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:authenticationSuccess>
    <cas:user>{user}</cas:user>
    <cas:proxyGrantingTicket>{pgt_iou}</cas:proxyGrantingTicket>
  </cas:authenticationSuccess>
</cas:serviceResponse>"#
    )
}

pub fn failure_xml(code: &str, message: &str) -> String {
    format!(
        r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:authenticationFailure code="{code}">{message}</cas:authenticationFailure>
</cas:serviceResponse>"#
    )
}

pub fn proxy_success_xml(ticket: &str) -> String {
    format!(
        r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:proxySuccess>
    <cas:proxyTicket>{ticket}</cas:proxyTicket>
  </cas:proxySuccess>
</cas:serviceResponse>"#
    )
}

pub fn logout_request_xml(ticket: &str) -> String {
    format!(
        r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="LR-1" Version="2.0" IssueInstant="2024-03-01T10:00:00Z"><saml:NameID>@NOT_USED@</saml:NameID><samlp:SessionIndex>{ticket}</samlp:SessionIndex></samlp:LogoutRequest>"#
    )
}
