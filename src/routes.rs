// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    handlers::{admin, auth, coins, live_tests},
    openapi::ApiDoc,
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public: auth, question papers, cached leaderboards, coin leaderboard.
/// * Authenticated: submissions, own results, own coins.
/// * Admin: question bank, live tests, evaluation trigger, coin adjustments.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let live_test_routes = Router::new()
        .route("/{id}", get(live_tests::get_paper))
        .route("/{id}/leaderboard", get(live_tests::get_leaderboard))
        // Protected live test routes
        .merge(
            Router::new()
                .route("/{id}/submissions", post(live_tests::submit_answers))
                .route("/{id}/results/me", get(live_tests::my_result))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let result_routes = Router::new()
        .route("/me/latest", get(live_tests::my_latest_result))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let coin_routes = Router::new()
        .route("/leaderboard", get(coins::leaderboard))
        .merge(
            Router::new()
                .route("/me", get(coins::my_balance))
                .route("/me/transactions", get(coins::my_transactions))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let admin_routes = Router::new()
        .route("/questions", post(admin::create_question))
        .route("/live-tests", post(admin::create_live_test))
        .route("/live-tests/{id}/evaluate", post(admin::evaluate))
        .route("/coins/{user_id}", post(admin::grant_coins))
        // Auth runs first, then the admin check
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
                .layer(middleware::from_fn(admin_middleware)),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/live-tests", live_test_routes)
        .nest("/api/results", result_routes)
        .nest("/api/coins", coin_routes)
        .nest("/api/admin", admin_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
