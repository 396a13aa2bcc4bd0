use std::sync::Arc;
use std::time::Instant;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use handdet_core::{DetError, HandResult};
use handdet_pipeline::HandPipeline;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Uploaded frames above this size are rejected before decoding.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Shared application state.
pub struct AppState {
    pub pipeline: Mutex<HandPipeline>,
    /// Cached so `/health` never waits on a running inference.
    pub detector_name: String,
    pub start_time: Instant,
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(pipeline: HandPipeline, metrics: PrometheusHandle) -> Self {
        Self {
            detector_name: pipeline.detector_name().to_string(),
            pipeline: Mutex::new(pipeline),
            start_time: Instant::now(),
            metrics,
        }
    }
}

/// POST /process response.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub num_hands: usize,
    pub confidences: Vec<f32>,
    /// `[x1, y1, x2, y2]` in source image pixels.
    pub boxes: Vec<[f32; 4]>,
}

impl From<&HandResult> for ProcessResponse {
    fn from(result: &HandResult) -> Self {
        Self {
            success: true,
            num_hands: result.num_hands(),
            confidences: result.confidences(),
            boxes: result.boxes_xyxy(),
        }
    }
}

/// GET /health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: f64,
    pub model_ready: bool,
    pub detector: String,
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// All routes with request tracing and permissive CORS.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/process", post(process_frame))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /: webcam capture page.
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// POST /process: multipart/form-data with an `image` field.
async fn process_frame(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let data = read_image_field(multipart).await?;

    let start = Instant::now();
    let worker = state.clone();
    let outcome = tokio::task::spawn_blocking(move || worker.pipeline.lock().process_bytes(&data))
        .await
        .map_err(|e| internal_error(format!("detection task failed: {e}")))?;

    let result = match outcome {
        Ok(result) => result,
        Err(DetError::ImageDecode(e)) => {
            tracing::warn!(error = %e, "rejected undecodable frame");
            metrics::counter!("handdet_requests_total", "status" => "bad_request").increment(1);
            return Err(bad_request("Failed to decode image"));
        }
        Err(e) => {
            metrics::counter!("handdet_requests_total", "status" => "error").increment(1);
            return Err(internal_error(e.to_string()));
        }
    };

    metrics::counter!("handdet_requests_total", "status" => "ok").increment(1);
    metrics::histogram!("handdet_latency_ms").record(start.elapsed().as_secs_f64() * 1000.0);
    metrics::histogram!("handdet_hands_detected").record(result.num_hands() as f64);

    tracing::debug!(
        hands = result.num_hands(),
        confidences = ?result.confidences(),
        "processed frame"
    );

    Ok(Json(ProcessResponse::from(&result)))
}

async fn read_image_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Vec<u8>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "request is not multipart");
        bad_request("No image data received")
    })?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("multipart error: {e}")))?
    {
        if field.name() == Some("image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad_request(&format!("image read error: {e}")))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(bad_request("No image data received"))
}

/// GET /health: liveness + readiness check.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs_f64(),
        model_ready: true,
        detector: state.detector_name.clone(),
    })
}

/// GET /metrics: Prometheus text exposition.
async fn render_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn bad_request(msg: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            success: false,
            error: msg.to_string(),
        }),
    )
}

fn internal_error(msg: String) -> ApiError {
    tracing::error!(error = %msg, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            success: false,
            error: msg,
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::OnceLock;

    use axum::body::Body;
    use axum::http::Request;
    use handdet_core::{BBox, Detection, HandDetector, RawImage, Result};
    use handdet_pipeline::PipelineConfig;
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    use super::*;

    const BOUNDARY: &str = "handdet-test-boundary";

    struct FixedDetector(Vec<Detection>);

    impl HandDetector for FixedDetector {
        fn name(&self) -> &str {
            "fixed"
        }

        fn detect(&self, _image: &RawImage) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenDetector;

    impl HandDetector for BrokenDetector {
        fn name(&self) -> &str {
            "broken"
        }

        fn detect(&self, _image: &RawImage) -> Result<Vec<Detection>> {
            Err(DetError::Inference("session lost".into()))
        }
    }

    /// One process-wide recorder, shared by every test router.
    fn metrics_handle() -> PrometheusHandle {
        static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
        HANDLE
            .get_or_init(|| PrometheusBuilder::new().install_recorder().unwrap())
            .clone()
    }

    fn app(detector: Box<dyn HandDetector>) -> Router {
        let pipeline = HandPipeline::with_detector(PipelineConfig::default(), detector);
        create_router(Arc::new(AppState::new(pipeline, metrics_handle())))
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 120, 150]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    fn multipart_request(field: &str, payload: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"frame.jpg\"\r\n").as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/process")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_process_returns_clamped_boxes() {
        let detector = FixedDetector(vec![Detection {
            bbox: BBox::from_xyxy(-4.0, 10.0, 30.0, 100.0),
            confidence: 0.85,
            class_id: 0,
        }]);
        let (status, body) = call(app(Box::new(detector)), multipart_request("image", &jpeg(64, 48))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["num_hands"], 1);
        assert!((body["confidences"][0].as_f64().unwrap() - 0.85).abs() < 1e-6);
        assert_eq!(body["boxes"][0], serde_json::json!([0.0, 10.0, 30.0, 48.0]));
    }

    #[tokio::test]
    async fn test_missing_image_field() {
        let (status, body) = call(app(Box::new(FixedDetector(vec![]))), multipart_request("photo", &jpeg(8, 8))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No image data received");
    }

    #[tokio::test]
    async fn test_non_multipart_body() {
        let req = Request::builder()
            .method("POST")
            .uri("/process")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = call(app(Box::new(FixedDetector(vec![]))), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No image data received");
    }

    #[tokio::test]
    async fn test_undecodable_image() {
        let (status, body) = call(
            app(Box::new(FixedDetector(vec![]))),
            multipart_request("image", b"these are not pixels"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Failed to decode image");
    }

    #[tokio::test]
    async fn test_detector_failure_is_500() {
        let (status, body) = call(app(Box::new(BrokenDetector)), multipart_request("image", &jpeg(16, 16))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("session lost"));
    }

    #[tokio::test]
    async fn test_health() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = call(app(Box::new(FixedDetector(vec![]))), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_ready"], true);
        assert_eq!(body["detector"], "fixed");
    }

    #[tokio::test]
    async fn test_index_page() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app(Box::new(FixedDetector(vec![]))).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("/process"));
    }

    #[tokio::test]
    async fn test_cors_preflight_on_process() {
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/process")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let resp = app(Box::new(FixedDetector(vec![]))).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_cors_header_on_process_response() {
        let mut req = multipart_request("image", &jpeg(8, 8));
        req.headers_mut()
            .insert(header::ORIGIN, "http://localhost:3000".parse().unwrap());
        let resp = app(Box::new(FixedDetector(vec![]))).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_metrics_after_process() {
        let app = app(Box::new(FixedDetector(vec![])));
        let (status, _) = call(app.clone(), multipart_request("image", &jpeg(16, 16))).await;
        assert_eq!(status, StatusCode::OK);

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("handdet_requests_total"), "metrics body: {text}");
    }
}
