// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{analytics, attempt},
    state::AppState,
    utils::jwt::{auth_middleware, staff_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Student routes (attempt lifecycle, history) and staff routes
///   (analytics, result visibility) are each behind token + role checks.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (engine, analytics, config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let attempt_routes = Router::new()
        .route("/count/{quiz_id}", get(attempt::attempt_count))
        .route("/start/{quiz_id}", post(attempt::start_attempt))
        .route("/submit/{attempt_id}", post(attempt::submit_attempt))
        .route("/my-attempts", get(attempt::my_attempts))
        .route("/hide", post(attempt::hide_attempts))
        .route("/clear/all", delete(attempt::clear_history))
        .route("/{attempt_id}", get(attempt::get_attempt))
        // Auth first, then role check
        .layer(middleware::from_fn(student_middleware))
        .layer(auth.clone());

    let analytics_routes = Router::new()
        .route("/overview", get(analytics::overview))
        .route("/quiz/{quiz_id}", get(analytics::quiz_analytics))
        .layer(middleware::from_fn(staff_middleware))
        .layer(auth.clone());

    let teacher_routes = Router::new()
        .route(
            "/quiz/{quiz_id}/attempts",
            delete(analytics::hide_quiz_attempts),
        )
        .layer(middleware::from_fn(staff_middleware))
        .layer(auth);

    Router::new()
        .nest("/api/attempts", attempt_routes)
        .nest("/api/analytics", analytics_routes)
        .nest("/api/teacher", teacher_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
