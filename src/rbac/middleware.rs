//! Edge middleware applying session resolution and the path-prefix gate.
//!
//! For every inbound request the service resolves the current session via the
//! injected [`SessionResolver`], evaluates the [`PathGate`] decision table,
//! and either forwards the request (with the session injected into request
//! extensions for handlers to extract) or answers with a 307 redirect to
//! login or the landing page. Denied requests never reach a handler.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use metrics::counter;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

use super::path_gate::{PathGate, RouteDecision};
use crate::error::CoreError;
use crate::session::{Session, SessionResolver};

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer wiring the session resolver and path gate into a router.
///
/// # Example
///
/// ```rust,ignore
/// use shavi_core::rbac::{AccessControlLayer, PathGate};
///
/// let app = Router::new()
///     .route("/hr/payroll", get(payroll_page))
///     .layer(AccessControlLayer::new(resolver, PathGate::default()));
/// ```
#[derive(Clone)]
pub struct AccessControlLayer {
    resolver: Arc<dyn SessionResolver>,
    gate: Arc<PathGate>,
}

impl AccessControlLayer {
    pub fn new(resolver: Arc<dyn SessionResolver>, gate: PathGate) -> Self {
        Self {
            resolver,
            gate: Arc::new(gate),
        }
    }
}

impl<S> Layer<S> for AccessControlLayer {
    type Service = AccessControlService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessControlService {
            inner,
            resolver: self.resolver.clone(),
            gate: self.gate.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Service enforcing the path-prefix gate per request.
#[derive(Clone)]
pub struct AccessControlService<S> {
    inner: S,
    resolver: Arc<dyn SessionResolver>,
    gate: Arc<PathGate>,
}

impl<S> Service<Request<Body>> for AccessControlService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let resolver = self.resolver.clone();
        let gate = self.gate.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let path = request.uri().path().to_string();
            let session = resolver.resolve(request.headers()).await;

            match gate.evaluate(session.as_ref(), &path) {
                RouteDecision::Permit => {
                    if let Some(session) = session {
                        debug!(
                            path = %path,
                            actor = %session.email,
                            role = %session.role,
                            "Route permitted"
                        );
                        request.extensions_mut().insert(session);
                    }
                    inner.call(request).await
                }
                RouteDecision::RedirectToLogin { next } => {
                    counter!("shavi_route_denials_total", "kind" => "login_redirect")
                        .increment(1);
                    let to = format!("{}?next={}", gate.login_path(), next);
                    Ok(redirect(&to))
                }
                RouteDecision::Redirect { to } => {
                    counter!("shavi_route_denials_total", "kind" => "landing_redirect")
                        .increment(1);
                    Ok(redirect(&to))
                }
            }
        })
    }
}

/// Build a 307 redirect response.
fn redirect(to: &str) -> Response {
    (
        StatusCode::TEMPORARY_REDIRECT,
        [(header::LOCATION, to.to_string())],
    )
        .into_response()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Extractor
// ═══════════════════════════════════════════════════════════════════════════════

/// Extractor for the resolved session in handlers.
///
/// Handlers still re-validate with the operation-level gate; this only hands
/// them the session the middleware already resolved.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| CoreError::unauthenticated("extractSession"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Role;
    use crate::session::TokenTableResolver;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    fn app(resolver: TokenTableResolver) -> Router {
        Router::new()
            .route("/hr/payroll", get(|| async { "payroll" }))
            .route("/tech-console", get(|| async { "console" }))
            .layer(AccessControlLayer::new(
                resolver.into_shared(),
                PathGate::default(),
            ))
    }

    fn get_request(path: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_department_match_reaches_handler() {
        let resolver = TokenTableResolver::new()
            .insert("hr-tok", Session::new("u1", "hr@shavi.academy", Role::Hr));

        let response = app(resolver)
            .oneshot(get_request("/hr/payroll", Some("hr-tok")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_mismatched_department_redirects_to_landing() {
        let resolver = TokenTableResolver::new().insert(
            "sales-tok",
            Session::new("u2", "sales@shavi.academy", Role::Sales),
        );

        let response = app(resolver)
            .oneshot(get_request("/hr/payroll", Some("sales-tok")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/dashboard"
        );
    }

    #[tokio::test]
    async fn test_unauthenticated_console_redirects_to_login_with_next() {
        let response = app(TokenTableResolver::new())
            .oneshot(get_request("/tech-console", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login?next=/tech-console"
        );
    }
}
