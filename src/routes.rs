use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use uuid::Uuid;

use crate::{auth, handlers, AppState};

/// Builds the full HTTP API on top of `state`.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/user/register", post(handlers::register))
        .route("/user/validation", put(handlers::verify_email))
        .route("/user/login", post(handlers::login))
        .route("/user/recover", post(handlers::recover))
        .route("/user/reset-password", post(handlers::reset_password));

    let protected_routes = Router::new()
        .route("/user/onboarding", put(handlers::onboarding))
        .route("/user/company", patch(handlers::update_company))
        .route("/user/me", get(handlers::me))
        .route("/user/logo", patch(handlers::upload_logo))
        .route("/user/delete", delete(handlers::delete_account))
        .route("/user/invite", post(handlers::invite))
        .route(
            "/client",
            post(handlers::create_client).get(handlers::list_clients),
        )
        .route(
            "/client/{id}",
            get(handlers::get_client)
                .put(handlers::update_client)
                .delete(handlers::delete_client),
        )
        .route("/client/archive/{id}", patch(handlers::archive_client))
        .route("/client/restore/{id}", patch(handlers::restore_client))
        .route(
            "/project",
            post(handlers::create_project).get(handlers::list_projects),
        )
        .route(
            "/project/{id}",
            get(handlers::get_project)
                .put(handlers::update_project)
                .delete(handlers::delete_project),
        )
        .route("/project/archive/{id}", patch(handlers::archive_project))
        .route("/project/restore/{id}", patch(handlers::restore_project))
        .route(
            "/deliverynote",
            post(handlers::create_note).get(handlers::list_notes),
        )
        .route(
            "/deliverynote/{id}",
            get(handlers::get_note).delete(handlers::delete_note),
        )
        .route("/deliverynote/pdf/{id}", get(handlers::note_pdf))
        .route("/deliverynote/sign/{id}", post(handlers::sign_note))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION, header::LOCATION])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/files", ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(middleware::from_fn(add_security_headers))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
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
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none';"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if std::env::var("ENVIRONMENT")
        .map(|env| env == "production")
        .unwrap_or(false)
    {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains; preload"),
        );
    }

    response
}
