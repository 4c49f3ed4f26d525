use crate::{error::ApiError, state::AppState};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use inference::{DetectionResponse, InferenceBackend};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub const API_PREFIX: &str = "/api/v1";
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DetectionRequestBase64 {
    pub image_base64: String,
}

pub fn router<B: InferenceBackend + 'static>(state: AppState<B>, max_body_bytes: usize) -> Router {
    let api = Router::new()
        .route("/detections", get(detections_placeholder))
        .route("/detections/base64", post(detect_base64::<B>))
        .route("/detections/image", post(detect_image::<B>))
        .route("/detections/output", get(detection_output::<B>));

    Router::new()
        .route("/", get(root))
        .nest(API_PREFIX, api)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn root() -> Json<Message> {
    Json(Message::new("Hello World"))
}

async fn detections_placeholder() -> Json<Message> {
    Json(Message::new("Detection GET"))
}

async fn detect_base64<B: InferenceBackend + 'static>(
    State(state): State<AppState<B>>,
    Json(request): Json<DetectionRequestBase64>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let detector = state.detector.clone();
    let response =
        tokio::task::spawn_blocking(move || detector.detect_from_base64(&request.image_base64))
            .await??;

    Ok(Json(response))
}

async fn detect_image<B: InferenceBackend + 'static>(
    State(state): State<AppState<B>>,
    mut multipart: Multipart,
) -> Result<Json<DetectionResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Multipart(e.to_string()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let filename = field.file_name().map(str::to_owned);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Multipart(e.to_string()))?;
            tracing::debug!(
                filename = ?filename,
                size = bytes.len(),
                "Received upload"
            );
            upload = Some(bytes);
            break;
        }
    }
    let bytes = upload.ok_or(ApiError::MissingField(UPLOAD_FIELD))?;

    let detector = state.detector.clone();
    let response = tokio::task::spawn_blocking(move || detector.detect_from_upload(&bytes)).await??;

    Ok(Json(response))
}

async fn detection_output<B: InferenceBackend + 'static>(
    State(state): State<AppState<B>>,
) -> Result<Response, ApiError> {
    let detector = state.detector.clone();
    let bytes = tokio::task::spawn_blocking(move || detector.output_image()).await??;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}
