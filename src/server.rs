use crate::client::{ChatCompletionsClient, ModelClient};
use crate::codegen::{generate_component_code, generate_component_css, DEFAULT_COMPONENT_NAME};
use crate::config::{Config, Policy};
use crate::engines::build_recognizer;
use crate::error::AnalyzeError;
use crate::layout::generate_layout;
use crate::parser::parse_analysis;
use crate::pipeline::{Analyzer, ExtractionMode};
use crate::types::{Feature, LayoutSection};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub config: Arc<Config>,
}

/// Analyze request: raw text or an image data URL
#[derive(Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub content: Option<String>,
}

/// Analyze response
#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub result: String,
    pub meta: AnalyzeMeta,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeMeta {
    pub mode: ExtractionMode,
    pub ocr_confidence: Option<f32>,
    pub cross_check_issues: usize,
    pub visual_assets_detected: usize,
}

/// Implementation request: a report to turn into sections and a component
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationRequest {
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub component_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationResponse {
    pub features: Vec<Feature>,
    pub api_dependencies: Vec<String>,
    pub sections: Vec<LayoutSection>,
    pub component: ComponentSource,
    /// The markdown the features were parsed from
    pub raw_text: String,
}

#[derive(Serialize)]
pub struct ComponentSource {
    pub jsx: String,
    pub css: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub ocr_backend: String,
    pub ocr_engine: String,
    pub vision_model: String,
    pub ocr_model: String,
    pub analysis_model: String,
    pub policy: Policy,
    pub max_body_size_bytes: usize,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let client: Arc<dyn ModelClient> = Arc::new(ChatCompletionsClient::new(&config.model)?);
    let recognizer = build_recognizer(&config, client.clone())?;
    let analyzer = Analyzer::new(client, recognizer, &config);
    let addr = format!("{}:{}", config.host, config.port);

    if config.model.api_key.is_none() {
        tracing::warn!("No API key configured; model requests are sent unauthenticated");
    }

    let state = AppState {
        analyzer: Arc::new(analyzer),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;

    Router::new()
        .route("/api/analyze", post(handle_analyze))
        .route("/api/implementation", post(handle_implementation))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unwrap a JSON body, reporting rejections in the API error format
fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    max_body_size: usize,
) -> Result<T, AnalyzeError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(AnalyzeError::PayloadTooLarge { max: max_body_size })
        }
        Err(rejection) => Err(AnalyzeError::InvalidRequest(rejection.body_text())),
    }
}

/// Handle snapshot analysis requests
async fn handle_analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AnalyzeError> {
    let request = json_body(payload, state.config.max_body_size)?;
    let content = request.content.unwrap_or_default();

    let analysis = state.analyzer.analyze(&content).await?;

    Ok(Json(AnalyzeResponse {
        result: analysis.report,
        meta: AnalyzeMeta {
            mode: analysis.mode,
            ocr_confidence: analysis.ocr_confidence,
            cross_check_issues: analysis.cross_check_issues,
            visual_assets_detected: analysis.visual_assets_detected,
        },
    }))
}

/// Handle report-to-component requests
async fn handle_implementation(
    State(state): State<AppState>,
    payload: Result<Json<ImplementationRequest>, JsonRejection>,
) -> Result<Json<ImplementationResponse>, AnalyzeError> {
    let request = json_body(payload, state.config.max_body_size)?;
    let markdown = request.markdown.unwrap_or_default();
    if markdown.trim().is_empty() {
        return Err(AnalyzeError::NoContent);
    }

    let parsed = parse_analysis(&markdown);
    let sections = generate_layout(&parsed.features);
    let component_name = request
        .component_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_COMPONENT_NAME.to_string());

    tracing::info!(
        features = parsed.features.len(),
        sections = sections.len(),
        api_dependencies = parsed.api_dependencies.len(),
        "Implementation generated"
    );

    Ok(Json(ImplementationResponse {
        component: ComponentSource {
            jsx: generate_component_code(&parsed.features, &component_name),
            css: generate_component_css(),
        },
        features: parsed.features,
        api_dependencies: parsed.api_dependencies,
        sections,
        raw_text: parsed.raw_text,
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let recognizer = state.analyzer.recognizer();
    let config = &state.config;

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        ocr_backend: config.ocr_backend.as_str().to_string(),
        ocr_engine: format!("{}: {}", recognizer.name(), recognizer.description()),
        vision_model: config.model.vision_model.clone(),
        ocr_model: config.model.ocr_model.clone(),
        analysis_model: config.model.analysis_model.clone(),
        policy: config.policy,
        max_body_size_bytes: config.max_body_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockModelClient;
    use crate::pipeline::ANALYSIS_PROMPT_MARKER;
    use crate::snapshot::sample_png_data_url;
    use crate::vision::VISION_PROMPT_MARKER;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const OCR_REPLY: &str =
        r#"{"rawText": "Trail Running Shoes\n$89.00", "title": "Trail Running Shoes", "price": "$89.00", "confidence": 90}"#;

    fn app_with(client: MockModelClient, config: Config) -> Router {
        let client: Arc<dyn ModelClient> = Arc::new(client);
        let recognizer = build_recognizer(&config, client.clone()).unwrap();
        let analyzer = Analyzer::new(client, recognizer, &config);
        router(AppState {
            analyzer: Arc::new(analyzer),
            config: Arc::new(config),
        })
    }

    fn app(client: MockModelClient) -> Router {
        app_with(client, Config::for_tests("http://localhost:1/v1"))
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        send(app, Method::POST, uri, Some(body.to_string())).await
    }

    #[tokio::test]
    async fn test_empty_content_is_client_error() {
        for body in [json!({"content": ""}), json!({"content": "  "}), json!({})] {
            let (status, json) = post_json(app(MockModelClient::new()), "/api/analyze", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], "no content");
            assert_eq!(json["code"], "NO_CONTENT");
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_request() {
        let (status, json) = send(
            app(MockModelClient::new()),
            Method::POST,
            "/api/analyze",
            Some("{not json".to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let config = Config {
            max_body_size: 64,
            ..Config::for_tests("http://localhost:1/v1")
        };
        let body = json!({"content": "x".repeat(500)});
        let (status, json) = post_json(app_with(MockModelClient::new(), config), "/api/analyze", body).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_image_with_vision_failure_still_succeeds() {
        let client = MockModelClient::new()
            .on("OCR engine", OCR_REPLY)
            .failing_on(VISION_PROMPT_MARKER);

        let (status, json) = post_json(
            app(client),
            "/api/analyze",
            json!({"content": sample_png_data_url()}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["meta"]["mode"], "ocr-only");
        assert_eq!(json["meta"]["visualAssetsDetected"], 0);
        assert_eq!(json["meta"]["ocrConfidence"], 90.0);
        let report = json["result"].as_str().unwrap();
        assert!(report.contains("Trail Running Shoes"));
        assert!(report.contains("- Visual assets detected: 0"));
    }

    #[tokio::test]
    async fn test_both_extractors_failing_is_server_error() {
        let client = MockModelClient::new()
            .failing_on("OCR engine")
            .failing_on(VISION_PROMPT_MARKER);

        let (status, json) = post_json(
            app(client),
            "/api/analyze",
            json!({"content": sample_png_data_url()}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "UPSTREAM_ERROR");
        assert!(json["error"].as_str().unwrap().starts_with("Analysis failed"));
    }

    #[tokio::test]
    async fn test_text_snapshot() {
        let client = MockModelClient::new().on(ANALYSIS_PROMPT_MARKER, "# Product Page Feature Analysis");
        let (status, json) = post_json(
            app(client),
            "/api/analyze",
            json!({"content": "<div class=\"title\">Desk Lamp</div>"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["result"], "# Product Page Feature Analysis");
        assert_eq!(json["meta"]["mode"], "text-model");
        assert!(json["meta"]["ocrConfidence"].is_null());
    }

    #[tokio::test]
    async fn test_implementation_from_markdown() {
        let markdown = "\
## Visible Features

### [Product Title]
- **Data displayed**: Trail Running Shoes
- **Data type**: text

### [Price]
- **Data displayed**: $89.00
- **Data type**: number

### [Add to Cart]
- **Data type**: action

## Data Dependencies Map
- Pricing API: price
";
        let (status, json) = post_json(
            app(MockModelClient::new()),
            "/api/implementation",
            json!({"markdown": markdown, "componentName": "ShoeCard"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["features"].as_array().unwrap().len(), 3);
        assert_eq!(json["features"][1]["dataType"], "number");
        assert_eq!(json["features"][1]["mockData"], 29.99);
        assert_eq!(json["features"][0]["isMVP"], true);
        assert_eq!(json["apiDependencies"], json!(["Pricing API"]));
        assert_eq!(json["sections"][0]["type"], "hero");
        assert_eq!(json["sections"][1]["type"], "actions");
        assert!(json["component"]["jsx"]
            .as_str()
            .unwrap()
            .contains("export function ShoeCard()"));
        assert!(json["component"]["css"]
            .as_str()
            .unwrap()
            .contains(".product-display"));
    }

    #[tokio::test]
    async fn test_implementation_requires_markdown() {
        let (status, json) = post_json(
            app(MockModelClient::new()),
            "/api/implementation",
            json!({"markdown": "   "}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "NO_CONTENT");
    }

    #[tokio::test]
    async fn test_implementation_without_features() {
        let (status, json) = post_json(
            app(MockModelClient::new()),
            "/api/implementation",
            json!({"markdown": "Nothing structured here."}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["features"].as_array().unwrap().is_empty());
        assert!(json["sections"].as_array().unwrap().is_empty());
        assert_eq!(json["rawText"], "Nothing structured here.");
        assert!(json["component"]["jsx"]
            .as_str()
            .unwrap()
            .contains("export function ProductDisplay()"));
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = send(app(MockModelClient::new()), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_info() {
        let (status, json) = send(app(MockModelClient::new()), Method::GET, "/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ocr_backend"], "model");
        assert_eq!(json["vision_model"], "vision-test");
        assert_eq!(json["policy"]["ocrTitleThreshold"], 75.0);
        assert_eq!(json["policy"]["minTitleLength"], 8);
        assert!(json["ocr_engine"].as_str().unwrap().starts_with("model:"));
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();

        let response = app(MockModelClient::new()).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
