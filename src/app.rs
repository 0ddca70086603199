use axum::Router;

use crate::routes::health;
use crate::state::AppState;
use tower_http::cors::{AllowOrigin, CorsLayer};
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use http::Method;

/// Route wiring for the stable surface in spec.md §6. The rest of that
/// surface (`/intel/run`, `/forecasts/*`, `/events/latest`, `/portfolio`,
/// `/api/v1/portfolio/debate`, `/quotes/*`, `/bars/latest`) is the HTTP
/// handler layer the spec scopes out as an external collaborator — only
/// `/health` is specified closely enough (liveness + provider-enable map
/// + router stats) to belong here; the rest is a thin DTO layer over
/// `PipelineOrchestrator`/`QuoteRouter`/`PortfolioEngine`/`DebateEngine`
/// that a front-end-facing service builds on top of this crate.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin.as_bytes().starts_with(b"http://localhost:")
                || origin.as_bytes().starts_with(b"http://127.0.0.1:")
        }))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);
    Router::<AppState>::new()
        .nest("/health", health::router())
        .with_state(state)
        .layer(cors)
}