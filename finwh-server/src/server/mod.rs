mod config;

use axum::{
    body::Bytes,
    extract::Query,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::headers::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use finwh_etl::{
    batch::{BatchState, EXPECTED_FORMAT},
    EntityKind, IngestOptions, IngestResponse,
};

use crate::app::FinwhApp;

pub use config::*;

const API_KEY_HEADER: &str = "x-api-key";

pub async fn run(config: ServerConfig, app: FinwhApp) -> anyhow::Result<()> {
    if config.api_key.is_none() {
        tracing::warn!("no api key configured, write endpoints are open");
    }
    let router = router(&config, app);

    println!("Starting finwh server on port {}", config.port);
    let listener =
        tokio::net::TcpListener::bind(&std::net::SocketAddr::from(([0, 0, 0, 0], config.port)))
            .await?;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn router(config: &ServerConfig, app: FinwhApp) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/kinds", get(kinds))
        .route("/api/v1/upload-json", post(upload_json))
        .route("/api/v1/database/initialize", post(initialize_database))
        .layer(Extension(ApiKey(config.api_key.clone().map(Arc::from))))
        .layer(Extension(app))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}

#[derive(Clone)]
struct ApiKey(Option<Arc<str>>);

impl ApiKey {
    fn check(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = self.0.as_deref() else {
            return Ok(());
        };
        match headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
            Some(supplied) if supplied == expected => Ok(()),
            _ => Err(api_error(
                StatusCode::FORBIDDEN,
                "Invalid or missing API key".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: String) -> ApiError {
    (
        status,
        Json(ErrorBody {
            status: "error",
            message,
        }),
    )
}

#[derive(Debug, Default, Deserialize)]
struct UploadParams {
    description: Option<String>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
struct KindsBody {
    supported_kinds: Vec<EntityKind>,
    expected_format: &'static str,
}

async fn kinds(Extension(app): Extension<FinwhApp>) -> Json<KindsBody> {
    Json(KindsBody {
        supported_kinds: app.warehouse().supported_kinds(),
        expected_format: EXPECTED_FORMAT,
    })
}

async fn upload_json(
    Extension(app): Extension<FinwhApp>,
    Extension(api_key): Extension<ApiKey>,
    headers: HeaderMap,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    api_key.check(&headers)?;
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid JSON: {e}")))?;

    let response = app
        .warehouse()
        .ingest(
            payload,
            IngestOptions {
                description: params.description,
                processing_date: None,
                data_size: Some(body.len()),
            },
        )
        .await;
    let status = match response.report.state {
        BatchState::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
        BatchState::Committed => StatusCode::OK,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Ok((status, Json(response)))
}

#[derive(Debug, Serialize)]
struct InitializeBody {
    status: &'static str,
    dates_created: u64,
}

async fn initialize_database(
    Extension(app): Extension<FinwhApp>,
    Extension(api_key): Extension<ApiKey>,
    headers: HeaderMap,
) -> Result<Json<InitializeBody>, ApiError> {
    api_key.check(&headers)?;
    let dates_created = app
        .warehouse()
        .seed_default_dates()
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(InitializeBody {
        status: "success",
        dates_created,
    }))
}
