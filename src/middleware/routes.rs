use axum::Router;
use axum::extract::{Query, State};
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::routing::get;
use serde::Deserialize;

use super::client::CasClient;
use crate::proxy::Proxy;

/// Create the CAS router: the proxy callback endpoint when proxying is
/// enabled, nothing otherwise.
///
/// Mount it outside [`authenticate`](super::authenticate); CAS calls the
/// callback directly and carries no session.
pub fn cas_routes(client: &CasClient) -> Router {
    proxy_callback_routes(client.proxy().clone())
}

/// Router serving the proxy callback of `proxy` (GET only).
pub fn proxy_callback_routes(proxy: Proxy) -> Router {
    let mut router = Router::new();
    if let Some(callback) = proxy.callback_url() {
        router = router.route(callback.path(), get(proxy_callback));
    }
    router.with_state(proxy)
}

#[derive(Deserialize)]
struct ProxyCallbackParams {
    #[serde(rename = "pgtIou")]
    pgt_iou: Option<String>,
    #[serde(rename = "pgtId")]
    pgt_id: Option<String>,
}

/// CAS probes the callback without parameters before using it, so every
/// GET is answered with 200.
async fn proxy_callback(
    State(proxy): State<Proxy>,
    params: Result<Query<ProxyCallbackParams>, QueryRejection>,
) -> StatusCode {
    match params {
        Ok(Query(params)) => {
            proxy
                .handle_callback(params.pgt_iou.as_deref(), params.pgt_id.as_deref())
                .await;
        }
        Err(e) => tracing::warn!(error = %e, "Unreadable proxy callback query"),
    }
    StatusCode::OK
}
