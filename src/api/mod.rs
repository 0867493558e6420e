//! HTTP surface used by the caregiver frontend.

use std::{path::Path, sync::Arc};

use axum::{
  extract::rejection::JsonRejection,
  http::{Method, StatusCode},
  response::{IntoResponse, Response},
  routing::{get, get_service, post},
  Extension, Json, Router,
};
use serde::Deserialize;
use tower_http::{
  cors::{Any, CorsLayer},
  services::ServeDir,
  trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{error::Error, pipeline::Pipeline};

/// Audio files are served under this prefix.
pub const STATIC_PREFIX: &str = "/static";

#[derive(Debug, Deserialize)]
struct GenerateSentenceRequest {
  #[serde(default)]
  keywords: Vec<String>,
}

pub fn router(pipeline: Arc<Pipeline>, audio_dir: &Path) -> Router {
  Router::new()
    .route("/api/generate-sentence", post(generate_sentence))
    .route("/health", get(health))
    .nest(
      STATIC_PREFIX,
      get_service(ServeDir::new(audio_dir)).handle_error(|err: std::io::Error| async move {
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          format!("Something went wrong: {}", err),
        )
      }),
    )
    .layer(Extension(pipeline))
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any),
    )
    .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
  "ok"
}

#[tracing::instrument(name = "POST /api/generate-sentence", skip_all)]
async fn generate_sentence(
  Extension(pipeline): Extension<Arc<Pipeline>>,
  payload: Result<Json<GenerateSentenceRequest>, JsonRejection>,
) -> Result<Response, Error> {
  let Json(request) = payload.map_err(|rejection| {
    Error::Validation(format!("malformed request body. error={}", rejection))
  })?;

  info!("generating utterance. keywords={:?}", request.keywords);

  if request.keywords.is_empty() {
    return Err(Error::Validation(String::from("No keywords provided")));
  }

  let utterance = pipeline.run(&request.keywords).await?;

  Ok(Json(utterance).into_response())
}

impl Error {
  fn status_code(&self) -> StatusCode {
    match self {
      Error::Validation(_) => StatusCode::BAD_REQUEST,
      Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Error::Generation(_) | Error::Synthesis(_) => StatusCode::BAD_GATEWAY,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status_code();

    if status.is_server_error() {
      error!("request failed. kind={} error={}", self.kind(), self);
    } else {
      warn!("request rejected. kind={} error={}", self.kind(), self);
    }

    let body = Json(serde_json::json!({
      "error": self.to_string(),
      "kind": self.kind(),
    }));

    (status, body).into_response()
  }
}
