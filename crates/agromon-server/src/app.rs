use std::sync::Arc;

use axum::{middleware, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use crate::state::AppState;
use crate::{api, logging};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "agromon API",
        description = "Farm weather forecasting and alerting REST API",
    ),
    tags(
        (name = "Health", description = "Process health"),
        (name = "Weather", description = "Live forecast with derived alerts"),
        (name = "Farms", description = "Persisted forecasts per farm")
    )
)]
struct ApiDoc;

pub fn build_http_app(state: AppState) -> Router {
    let (router, spec) = api::routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(spec);
    let spec = Arc::new(merged_spec);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .route(
            "/v1/openapi.json",
            get({
                let spec = spec.clone();
                move || async move { Json(spec.as_ref().clone()) }
            }),
        )
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
