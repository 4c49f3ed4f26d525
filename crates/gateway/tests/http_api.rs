use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use gateway::{routes::router, state::AppState};
use image::{ImageFormat, RgbImage};
use inference::{
    ClassLabelTable, DetectionService, DetectorConfig, InferenceBackend, InferenceOutput,
};
use ndarray::{Array, IxDyn};
use serde_json::{Value, json};
use std::io::Cursor;
use tower::ServiceExt;

const BOUNDARY: &str = "detector-test-boundary";

/// Backend returning a fixed set of (ymin, xmin, ymax, xmax, class, score) rows
struct ScriptedBackend {
    outputs: Vec<[f32; 6]>,
}

impl InferenceBackend for ScriptedBackend {
    fn load_model(_path: &str) -> anyhow::Result<Self> {
        Ok(Self {
            outputs: Vec::new(),
        })
    }

    fn infer(&mut self, _input: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
        let n = self.outputs.len();
        let boxes: Vec<f32> = self.outputs.iter().flat_map(|o| o[..4].to_vec()).collect();
        let classes: Vec<f32> = self.outputs.iter().map(|o| o[4]).collect();
        let scores: Vec<f32> = self.outputs.iter().map(|o| o[5]).collect();

        Ok(InferenceOutput {
            boxes: Array::from_shape_vec(IxDyn(&[1, n, 4]), boxes)?,
            classes: Array::from_shape_vec(IxDyn(&[1, n]), classes)?,
            scores: Array::from_shape_vec(IxDyn(&[1, n]), scores)?,
        })
    }
}

/// App with a single dog at (100, 100, 50x50) on a 320x320 image
fn app(dir: &tempfile::TempDir) -> Router {
    let detector = DetectionService::new(
        ScriptedBackend {
            outputs: vec![[0.3125, 0.3125, 0.46875, 0.46875, 3.0, 0.9]],
        },
        ClassLabelTable::from_lines("person\ncat\ndog"),
        None,
        dir.path().join("output.png"),
        DetectorConfig::default(),
    );

    router(AppState::new(detector), 1024 * 1024)
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    RgbImage::new(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(field: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"image.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/detections/image")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn assert_single_dog(body: &Value) {
    let objects = body["objects"].as_array().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0]["label"], "dog");
    assert!((objects[0]["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    assert!((objects[0]["area_ratio"].as_f64().unwrap() - 2.4414).abs() < 1e-3);
}

#[tokio::test]
async fn test_root_and_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"message": "Hello World"}));

    let response = app.oneshot(get("/api/v1/detections")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"message": "Detection GET"}));
}

#[tokio::test]
async fn test_detect_base64() {
    let dir = tempfile::tempdir().unwrap();
    let payload = STANDARD.encode(png_bytes(320, 320));

    let response = app(&dir)
        .oneshot(json_request(
            "/api/v1/detections/base64",
            json!({ "image_base64": payload }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_single_dog(&body_json(response).await);
}

#[tokio::test]
async fn test_malformed_base64_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();

    let response = app(&dir)
        .oneshot(json_request(
            "/api/v1/detections/base64",
            json!({ "image_base64": "%%% not base64 %%%" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let detail = body_json(response).await["detail"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(detail.starts_with("Error decoding image"), "{detail}");
}

/// Valid base64 that is not an image
#[tokio::test]
async fn test_corrupt_image_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();

    let response = app(&dir)
        .oneshot(json_request(
            "/api/v1/detections/base64",
            json!({ "image_base64": STANDARD.encode(b"definitely not a png") }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_json_field_is_unprocessable() {
    let dir = tempfile::tempdir().unwrap();

    let response = app(&dir)
        .oneshot(json_request(
            "/api/v1/detections/base64",
            json!({ "image": "abc" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_detect_uploaded_image() {
    let dir = tempfile::tempdir().unwrap();

    let response = app(&dir)
        .oneshot(multipart_request("file", &png_bytes(320, 320)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_single_dog(&body_json(response).await);
}

#[tokio::test]
async fn test_upload_without_file_field_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();

    let response = app(&dir)
        .oneshot(multipart_request("attachment", &png_bytes(8, 8)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"detail": "Missing form field `file`"})
    );
}

#[tokio::test]
async fn test_output_before_and_after_detection() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let response = app.clone().oneshot(get("/api/v1/detections/output")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"detail": "No output found"})
    );

    let response = app
        .clone()
        .oneshot(multipart_request("file", &png_bytes(320, 320)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/v1/detections/output")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let image = image::load_from_memory(&bytes).unwrap();
    assert_eq!((image.width(), image.height()), (320, 320));
}

#[tokio::test]
async fn test_cors_preflight_mirrors_origin() {
    let dir = tempfile::tempdir().unwrap();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/detections/base64")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app(&dir).oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}
