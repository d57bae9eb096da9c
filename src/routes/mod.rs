use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod achievements;
pub mod auth;
pub mod health;
pub mod reports;

const MAX_ATTACHMENT_BYTES: usize = 1024 * 1024 * 32;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let achievements_routes = Router::new()
        .route(
            "/",
            get(achievements::list_achievements).post(achievements::create_achievement),
        )
        .route(
            "/:id",
            get(achievements::get_achievement)
                .put(achievements::update_achievement)
                .delete(achievements::delete_achievement),
        )
        .route("/:id/attachments", post(achievements::upload_attachment))
        .route("/:id/submit", post(achievements::submit_achievement))
        .route("/:id/verify", post(achievements::verify_achievement))
        .route("/:id/reject", post(achievements::reject_achievement));

    let reports_routes = Router::new()
        .route("/students/:id", get(reports::student_report))
        .route("/statistics", get(reports::statistics));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/achievements", achievements_routes)
        .nest("/api/reports", reports_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_ATTACHMENT_BYTES))
}
