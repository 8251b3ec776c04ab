use crate::auth::{self, require_bearer};
use crate::handlers;
use crate::response::ApiResponse;
use crate::services::image_store::MAX_IMAGE_BYTES;
use crate::AppState;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use std::path::Path;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Builds the full application router: public auth routes, bearer-protected
/// election routes, and the uploaded-picture directory.
pub fn build_router(state: AppState, upload_dir: impl AsRef<Path>, cors: CorsLayer) -> Router {
    let public_auth_routes = Router::new()
        .route("/signup", post(auth::handlers::signup))
        .route("/resend-otp", post(auth::handlers::resend_otp))
        .route("/verify-otp", post(auth::handlers::verify_otp))
        .route("/login", post(auth::handlers::login))
        .route("/forgot-password", post(auth::handlers::forgot_password))
        .route("/reset-password", post(auth::handlers::reset_password))
        .route("/renew-token", post(auth::handlers::renew_token));

    let protected_auth_routes = Router::new()
        .route("/logout", post(auth::handlers::logout))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let election_routes = Router::new()
        .route("/create-election", post(handlers::create_election))
        .route("/edit-election", patch(handlers::edit_election))
        .route("/delete-election", delete(handlers::delete_election))
        .route("/add-position", post(handlers::add_position))
        .route("/edit-position", patch(handlers::edit_position))
        .route("/delete-position", delete(handlers::delete_position))
        .route("/add-candidate", post(handlers::add_candidate))
        .route("/edit-candidate", patch(handlers::edit_candidate))
        .route("/delete-candidate", delete(handlers::delete_candidate))
        .route(
            "/upload-candidate-picture",
            post(handlers::upload_candidate_picture)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 1024 * 1024)),
        )
        .route("/add-allowed-voters", post(handlers::add_allowed_voters))
        .route("/delete-allowed-voter", delete(handlers::delete_allowed_voter))
        .route(
            "/get-election-details/{id}",
            get(handlers::get_election_details),
        )
        .route("/vote", post(handlers::vote))
        .route(
            "/get-election-result/{id}",
            get(handlers::get_election_result),
        )
        .route("/get-my-ballot", get(handlers::get_my_ballot))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/", get(handlers::health))
        .nest(
            "/api/auth",
            public_auth_routes.merge(protected_auth_routes),
        )
        .nest("/api/elections", election_routes)
        .nest_service("/uploads", ServeDir::new(upload_dir.as_ref()))
        .fallback(not_found)
        .layer(middleware::from_fn(add_security_headers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for the configured origins. An empty list allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Route not found")),
    )
        .into_response()
}

async fn add_security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'; img-src 'self'; frame-ancestors 'none';"),
    );
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));

    if std::env::var("ENVIRONMENT")
        .map(|env| env == "production")
        .unwrap_or(false)
    {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}
