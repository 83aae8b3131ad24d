//! Controller binding.
//!
//! Turns the `(method, template, x-controller)` triples collected by the
//! compiler into axum routes. Handlers are looked up by name in a
//! [`ControllerRegistry`]; a name with no handler fails the whole bind.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use thiserror::Error;

use crate::compiler::ControllerBinding;
use crate::description::HttpMethod;

/// A named request handler.
pub type Controller = Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("{method} {template}: no controller registered as '{controller}'")]
    UnknownController {
        method: String,
        template: String,
        controller: String,
    },

    #[error("templates '{first}' and '{second}' describe the same route")]
    Conflict { first: String, second: String },
}

/// Controllers by the name used in `x-controller`.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Controller>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut, R>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        let controller: Controller = Arc::new(move |request| handler(request).map(IntoResponse::into_response).boxed());
        self.controllers.insert(name.into(), controller);
        self
    }

    pub fn get(&self, name: &str) -> Option<Controller> {
        self.controllers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Options => MethodFilter::OPTIONS,
        HttpMethod::Head => MethodFilter::HEAD,
        HttpMethod::Patch => MethodFilter::PATCH,
    }
}

/// Register every binding on `router`. Nothing is registered if any binding fails.
pub fn bind_controllers<S>(
    router: Router<S>,
    bindings: &[ControllerBinding],
    registry: &ControllerRegistry,
) -> Result<Router<S>, BindError>
where
    S: Clone + Send + Sync + 'static,
{
    // Keyed by route shape: `/users/{id}` and `/users/{userId}` collide in axum.
    let mut routes: IndexMap<String, (String, MethodRouter<S>)> = IndexMap::new();

    for binding in bindings {
        let controller = registry
            .get(&binding.controller)
            .ok_or_else(|| BindError::UnknownController {
                method: binding.method.as_str().to_uppercase(),
                template: binding.template.clone(),
                controller: binding.controller.clone(),
            })?;

        let handler = move |request: Request<Body>| {
            let controller = controller.clone();
            async move { controller(request).await }
        };
        let filter = method_filter(binding.method);

        match routes.shift_remove(&route_shape(&binding.route)) {
            Some((template, existing)) => {
                if template != binding.template {
                    return Err(BindError::Conflict {
                        first: template,
                        second: binding.template.clone(),
                    });
                }
                routes.insert(route_shape(&binding.route), (template, existing.on(filter, handler)));
            }
            None => {
                routes.insert(
                    route_shape(&binding.route),
                    (binding.template.clone(), on(filter, handler)),
                );
            }
        }

        tracing::debug!(
            method = %binding.method,
            template = %binding.template,
            controller = %binding.controller,
            "Controller bound"
        );
    }

    Ok(routes
        .into_values()
        .fold(router, |router, (template, method_router)| router.route(&template, method_router)))
}

fn route_shape(route: &str) -> String {
    route
        .split('/')
        .map(|segment| if segment.starts_with(':') { ":" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn binding(method: HttpMethod, template: &str, controller: &str) -> ControllerBinding {
        ControllerBinding {
            method,
            template: template.to_string(),
            route: crate::routing::to_route_template(template),
            controller: controller.to_string(),
        }
    }

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry
            .register("users.show", |_req| async { "show" })
            .register("users.update", |_req| async { (StatusCode::ACCEPTED, "update") });
        registry
    }

    async fn call(router: Router, method: &str, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_methods_share_one_route() {
        let bindings = vec![
            binding(HttpMethod::Get, "/users/{id}", "users.show"),
            binding(HttpMethod::Put, "/users/{id}", "users.update"),
        ];
        let router = bind_controllers(Router::new(), &bindings, &registry()).unwrap();

        assert_eq!(call(router.clone(), "GET", "/users/1").await, (StatusCode::OK, "show".into()));
        assert_eq!(
            call(router.clone(), "PUT", "/users/1").await,
            (StatusCode::ACCEPTED, "update".into())
        );
        assert_eq!(call(router, "DELETE", "/users/1").await.0, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_unknown_controller_is_fatal() {
        let bindings = vec![
            binding(HttpMethod::Get, "/users/{id}", "users.show"),
            binding(HttpMethod::Delete, "/users/{id}", "users.destroy"),
        ];
        let err = bind_controllers(Router::<()>::new(), &bindings, &registry()).err().unwrap();
        assert_eq!(
            err,
            BindError::UnknownController {
                method: "DELETE".into(),
                template: "/users/{id}".into(),
                controller: "users.destroy".into(),
            }
        );
    }

    #[test]
    fn test_renamed_parameter_conflicts() {
        let bindings = vec![
            binding(HttpMethod::Get, "/users/{id}", "users.show"),
            binding(HttpMethod::Put, "/users/{userId}", "users.update"),
        ];
        let err = bind_controllers(Router::<()>::new(), &bindings, &registry()).err().unwrap();
        assert!(matches!(err, BindError::Conflict { .. }));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("users.show"));
        assert!(registry.get("nope").is_none());
    }
}
