use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Submission endpoints: authorization is enforced by the API gateway
        // in front of this service, which forwards the checked user id
        .nest("/api/v1/tests", tests_routes())
        .nest("/api/v1/ratings", ratings_routes())
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn tests_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/{test_id}/submissions",
            post(handlers::submissions::submit_test),
        )
        .route(
            "/{test_id}/results/{user_id}",
            get(handlers::submissions::get_test_result),
        )
}

fn ratings_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/students", get(handlers::ratings::get_all_students_ratings))
        .route(
            "/students/{user_id}",
            get(handlers::ratings::get_student_rating),
        )
}
