use crate::handlers;
use crate::middleware::require_session;
use crate::state::AppState;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

/// Build and configure the application router
pub fn build_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route(
            "/likes/{post_id}",
            post(handlers::like_post).delete(handlers::unlike_post),
        )
        .route("/comments", post(handlers::create_comment))
        .route("/comments/{comment_id}", delete(handlers::delete_comment))
        .route("/posts", post(handlers::create_post))
        .route("/posts/{post_id}/counts", get(handlers::post_counts))
        .route(
            "/notifications",
            get(handlers::stream_notifications).post(handlers::publish_notification),
        )
        .route("/sessions", delete(handlers::revoke_session))
        .route("/sessions/all", delete(handlers::revoke_all_sessions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session issuing for the account service
        .route("/sessions", post(handlers::issue_session))
        .nest("/auth", authenticated)
        // Middleware
        .layer(cors_layer(&state.config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
