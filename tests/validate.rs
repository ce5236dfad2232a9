mod common;

use std::sync::Arc;

use cas_client::proxy::{Proxy, ProxyOptions};
use cas_client::{DefaultUrlScheme, Error, ServiceTicketValidator, UrlScheme};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use common::{cas_server, failure_xml, proxy_success_xml, success_with_pgt_xml, success_xml};

fn setup(base: Url) -> (ServiceTicketValidator, Arc<dyn UrlScheme>) {
    let urls: Arc<dyn UrlScheme> = Arc::new(DefaultUrlScheme::new(base));
    (
        ServiceTicketValidator::new(reqwest::Client::new(), urls.clone()),
        urls,
    )
}

fn service() -> Url {
    "https://app.example.com/account".parse().unwrap()
}

#[tokio::test]
async fn test_service_validate_success() {
    let (server, base) = cas_server().await;
    Mock::given(method("GET"))
        .and(path("/cas/serviceValidate"))
        .and(query_param("ticket", "ST-1"))
        .and(query_param("service", "https://app.example.com/account"))
        .respond_with(ResponseTemplate::new(200).set_body_string(success_xml("carol")))
        .expect(1)
        .mount(&server)
        .await;

    let (validator, urls) = setup(base);
    let auth = validator
        .validate_ticket(&service(), "ST-1", &Proxy::disabled(urls))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(auth.user, "carol");
    assert_eq!(auth.attributes.get("mail"), Some("carol@example.com"));
    assert!(auth.is_new_login);
}

#[tokio::test]
async fn test_falls_back_to_cas1_on_404() {
    let (server, base) = cas_server().await;
    Mock::given(method("GET"))
        .and(path("/cas/serviceValidate"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cas/validate"))
        .and(query_param("ticket", "ST-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("yes\ncarol\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cas/validate"))
        .and(query_param("ticket", "ST-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("no\n\n"))
        .mount(&server)
        .await;

    let (validator, urls) = setup(base);
    let proxy = Proxy::disabled(urls);

    let auth = validator
        .validate_ticket(&service(), "ST-1", &proxy)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth.user, "carol");
    assert!(auth.attributes.is_empty());

    let rejected = validator
        .validate_ticket(&service(), "ST-2", &proxy)
        .await
        .unwrap();
    assert!(rejected.is_none());
}

#[tokio::test]
async fn test_non_200_is_protocol_error() {
    let (server, base) = cas_server().await;
    Mock::given(method("GET"))
        .and(path("/cas/serviceValidate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let (validator, urls) = setup(base);
    let err = validator
        .validate_ticket(&service(), "ST-1", &Proxy::disabled(urls))
        .await
        .unwrap_err();

    match err {
        Error::Protocol { status, detail, .. } => {
            assert_eq!(status, 500);
            assert_eq!(detail, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_authentication_failure() {
    let (server, base) = cas_server().await;
    Mock::given(method("GET"))
        .and(path("/cas/serviceValidate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(failure_xml("INVALID_TICKET", "Ticket ST-1 not recognized")),
        )
        .mount(&server)
        .await;

    let (validator, urls) = setup(base);
    let err = validator
        .validate_ticket(&service(), "ST-1", &Proxy::disabled(urls))
        .await
        .unwrap_err();

    match err {
        Error::AuthenticationFailure { code, message } => {
            assert_eq!(code, "INVALID_TICKET");
            assert_eq!(message, "Ticket ST-1 not recognized");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_proxy_ticket_round_trip() {
    let (server, base) = cas_server().await;
    let callback = "https://app.example.com/cas/proxy-callback";

    Mock::given(method("GET"))
        .and(path("/cas/serviceValidate"))
        .and(query_param("pgtUrl", callback))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(success_with_pgt_xml("carol", "PGTIOU-1")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cas/proxy"))
        .and(query_param("pgt", "PGT-1"))
        .and(query_param("targetService", "https://backend.example.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(proxy_success_xml("PT-1")))
        .expect(1)
        .mount(&server)
        .await;

    let (validator, urls) = setup(base);
    let proxy = Proxy::new(urls, ProxyOptions::enabled(callback)).unwrap();
    let http = reqwest::Client::new();

    let auth = validator
        .validate_ticket(&service(), "ST-1", &proxy)
        .await
        .unwrap()
        .unwrap();
    let iou = auth.proxy_granting_ticket.unwrap();
    assert_eq!(iou, "PGTIOU-1");

    // Callback has not arrived yet.
    let err = proxy
        .request_proxy_ticket(&http, "https://backend.example.com/", &iou)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProxyNotCorrelated(_)));
    assert!(err.is_retryable());

    proxy.handle_callback(Some("PGTIOU-1"), Some("PGT-1")).await;
    let ticket = proxy
        .request_proxy_ticket(&http, "https://backend.example.com/", &iou)
        .await
        .unwrap();
    assert_eq!(ticket, "PT-1");
}

#[tokio::test]
async fn test_proxy_endpoint_errors() {
    let (server, base) = cas_server().await;
    Mock::given(method("GET"))
        .and(path("/cas/proxy"))
        .and(query_param("targetService", "https://refused.example.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
  <cas:proxyFailure code="INVALID_REQUEST">pgt and targetService parameters are both required</cas:proxyFailure>
</cas:serviceResponse>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cas/proxy"))
        .and(query_param("targetService", "https://down.example.com/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let urls: Arc<dyn UrlScheme> = Arc::new(DefaultUrlScheme::new(base));
    let proxy = Proxy::new(
        urls,
        ProxyOptions::enabled("https://app.example.com/cas/proxy-callback"),
    )
    .unwrap();
    proxy.handle_callback(Some("PGTIOU-1"), Some("PGT-1")).await;
    let http = reqwest::Client::new();

    let err = proxy
        .request_proxy_ticket(&http, "https://refused.example.com/", "PGTIOU-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProxyFailure { ref code, .. } if code == "INVALID_REQUEST"));

    let err = proxy
        .request_proxy_ticket(&http, "https://down.example.com/", "PGTIOU-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol { status: 503, .. }));
}
