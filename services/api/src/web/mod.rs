pub mod auth;
pub mod extract;
pub mod middleware;
pub mod notebooks;
pub mod password_reset;
pub mod rate_limit;
pub mod rest;
pub mod state;
pub mod stats;
pub mod sweep_task;
pub mod verification;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RateLimitSettings;
use rate_limit::{limit_requests, RateLimiter, OTP_LIMIT_MESSAGE, RESET_LIMIT_MESSAGE};

pub use middleware::require_auth;
pub use state::AppState;

/// Builds every API route on top of the shared state.
///
/// Transport layers (CORS, tracing, Swagger UI) are added by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    let config = &app_state.config;

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route(
            "/verification/email/verify",
            post(verification::verify_email_code_handler),
        )
        .route(
            "/verification/phone/verify",
            post(verification::verify_phone_code_handler),
        )
        .route(
            "/password-reset/validate/{token}",
            get(password_reset::validate_token_handler),
        );

    // Routes that send a code, limited per client
    let code_routes = Router::new()
        .route(
            "/verification/email/send",
            post(verification::send_email_code_handler),
        )
        .route(
            "/verification/email/resend",
            post(verification::resend_email_code_handler),
        )
        .route(
            "/verification/phone/send",
            post(verification::send_phone_code_handler),
        )
        .route(
            "/verification/phone/resend",
            post(verification::resend_phone_code_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            limiter(config.otp_rate_limit, OTP_LIMIT_MESSAGE),
            limit_requests,
        ));

    let reset_routes = Router::new()
        .route(
            "/password-reset/request",
            post(password_reset::request_reset_handler),
        )
        .route(
            "/password-reset/reset",
            post(password_reset::reset_password_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            limiter(config.reset_rate_limit, RESET_LIMIT_MESSAGE),
            limit_requests,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/stats", get(stats::get_stats_handler))
        .route("/stats/track-time", post(stats::track_time_handler))
        .route("/stats/increment-quiz", post(stats::increment_quiz_handler))
        .route(
            "/stats/increment-material",
            post(stats::increment_material_handler),
        )
        .route(
            "/stats/increment-conversation",
            post(stats::increment_conversation_handler),
        )
        .route(
            "/notebooks",
            get(notebooks::list_notebooks_handler).post(notebooks::create_notebook_handler),
        )
        .route("/notebooks/recent", get(notebooks::recent_notebooks_handler))
        .route(
            "/notebooks/featured",
            get(notebooks::featured_notebooks_handler),
        )
        .route("/notebooks/search", get(notebooks::search_notebooks_handler))
        .route(
            "/notebooks/{id}",
            get(notebooks::get_notebook_handler)
                .put(notebooks::update_notebook_handler)
                .delete(notebooks::delete_notebook_handler),
        )
        .route(
            "/notebooks/{id}/toggle-featured",
            patch(notebooks::toggle_featured_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(code_routes)
        .merge(reset_routes)
        .merge(protected_routes)
        .with_state(app_state)
}

fn limiter(settings: RateLimitSettings, message: &'static str) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(
        settings.max_requests,
        Duration::from_secs(settings.window_secs),
        message,
    ))
}
