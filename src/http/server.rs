//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the validation middleware in front
//! - Wire up request IDs, tracing and the request timeout
//! - Forward validated requests to the upstream (proxy mode)
//! - Bind server to listener and drain on shutdown

use std::str::FromStr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::middleware::{validation_middleware, GateState};

#[derive(Debug, Error)]
#[error("invalid upstream address '{address}': {source}")]
pub struct UpstreamError {
    pub address: String,
    #[source]
    pub source: axum::http::uri::InvalidUri,
}

/// Upstream forwarding state.
#[derive(Clone)]
struct ProxyState {
    client: Client<HttpConnector, Body>,
    upstream: Authority,
}

/// HTTP server for the validation gate.
pub struct GateServer {
    router: Router,
}

impl GateServer {
    /// Gate in front of an upstream service: everything that passes is forwarded.
    pub fn proxy(gate: GateState, upstream: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let upstream = Authority::from_str(upstream).map_err(|source| UpstreamError {
            address: upstream.to_string(),
            source,
        })?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = ProxyState { client, upstream };

        let routes = Router::new().fallback(proxy_handler).with_state(state);
        Ok(Self::with_routes(gate, routes, timeout))
    }

    /// Gate in front of in-process routes (for example from `bind_controllers`).
    pub fn with_routes(gate: GateState, routes: Router, timeout: Duration) -> Self {
        Self {
            router: Self::build_router(gate, routes, timeout),
        }
    }

    /// Apply middleware layers. The last layer added runs first.
    #[allow(deprecated)]
    fn build_router(gate: GateState, routes: Router, timeout: Duration) -> Router {
        routes
            .layer(from_fn_with_state(gate, validation_middleware))
            .layer(TimeoutLayer::new(timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forward a request to the upstream unchanged apart from its URI.
async fn proxy_handler(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };
    parts.version = Version::HTTP_11;

    let method = parts.method.clone();
    let uri = parts.uri.clone();

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            tracing::debug!(method = %method, uri = %uri, status = %response.status(), "Upstream responded");
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(method = %method, uri = %uri, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
