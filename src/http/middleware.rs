//! Validation middleware.
//!
//! Runs in front of every handler (and the proxy fallback). Requests without
//! rules go straight to `next`; the body is buffered only when the matched
//! operation has `formData` or `body` rules.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::error::RequestError;
use crate::http::request::{body_bag, header_bag, query_bag};
use crate::observability::metrics;
use crate::validation::{DataBag, GateRequest, ValidationOrchestrator};

/// State shared by every invocation of [`validation_middleware`].
#[derive(Clone)]
pub struct GateState {
    pub orchestrator: Arc<ValidationOrchestrator>,
    pub max_body_bytes: usize,
}

impl GateState {
    pub fn new(orchestrator: Arc<ValidationOrchestrator>, max_body_bytes: usize) -> Self {
        Self {
            orchestrator,
            max_body_bytes,
        }
    }
}

pub async fn validation_middleware(State(state): State<GateState>, request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let path = request.uri().path().to_string();
    let method = request.method().as_str().to_string();

    let Some(plan) = state.orchestrator.plan(&path, &method) else {
        tracing::trace!(method = %method, path = %path, "No rules apply");
        metrics::record_outcome("passed");
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();

    let (body, body_data) = if plan.needs_body() {
        match read_body(&parts, body, state.max_body_bytes).await {
            Ok(read) => read,
            Err(e) => {
                tracing::info!(template = plan.template, error = %e, "Unreadable request body");
                return e.into_response();
            }
        }
    } else {
        (body, DataBag::new())
    };

    let gate_request = GateRequest {
        path,
        method,
        query: query_bag(parts.uri.query()),
        headers: header_bag(&parts.headers),
        path_params: None,
        body: body_data,
    };

    let result = state.orchestrator.check(&plan, &gate_request);
    metrics::record_duration(start);

    match result {
        Ok(()) => next.run(Request::from_parts(parts, body)).await,
        Err(e) => e.into_response(),
    }
}

/// Buffer and parse the body, handing back a replayable copy for `next`.
async fn read_body(
    parts: &axum::http::request::Parts,
    body: Body,
    limit: usize,
) -> Result<(Body, DataBag), RequestError> {
    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(RequestError::BodyTooLarge { limit });
    }

    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| RequestError::BodyTooLarge { limit })?;

    let content_type = parts.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let data = body_bag(content_type, &bytes)?;

    Ok((Body::from(bytes), data))
}
