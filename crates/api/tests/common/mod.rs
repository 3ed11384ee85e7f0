#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Multipart, Path as UrlPath, Query, State};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::{get as route_get, post};
use axum::{Json, Router};
use http_body_util::BodyExt;
use lookbook_api::config::ServerConfig;
use lookbook_api::router::build_app_router;
use lookbook_api::state::AppState;
use lookbook_comfyui::poller::PollConfig;
use lookbook_comfyui::retry::RetryPolicy;
use lookbook_core::job_store::InMemoryJobStore;
use lookbook_pipeline::config::{CompositeConfig, MaskConfig, PromptMapConfig, VisionConfig};
use lookbook_pipeline::vision::OpenAiVision;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const BOUNDARY: &str = "lookbook-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 16 * 1024 * 1024,
        face_detector_url: None,
    }
}

/// Mask template with input node `54` and output node `455`, written to `dir`.
pub fn write_mask_template(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("mask.json");
    std::fs::write(
        &path,
        json!({
            "54": { "class_type": "LoadImage", "inputs": { "image": "placeholder.png" } },
            "455": { "class_type": "PreviewImage", "inputs": { "images": ["54", 0] } }
        })
        .to_string(),
    )
    .unwrap();
    path
}

/// State whose pipelines read files under `dir`; nothing talks to a real
/// vision API or face detector.
pub fn test_state(dir: &Path) -> AppState {
    let http = reqwest::Client::new();
    AppState {
        config: Arc::new(test_config()),
        http: http.clone(),
        jobs: Arc::new(InMemoryJobStore::new()),
        mask: Arc::new(MaskConfig {
            template_path: dir.join("mask.json"),
            poll: PollConfig::new(Duration::from_millis(10), Duration::from_secs(5)),
            upload_policy: RetryPolicy::fixed(1, Duration::ZERO),
            ..MaskConfig::default()
        }),
        composite: Arc::new(CompositeConfig {
            template_path: dir.join("composite.json"),
            background_image: dir.join("background.png"),
            style_dir: dir.join("styles"),
            ..CompositeConfig::default()
        }),
        promptmap: Arc::new(PromptMapConfig {
            library_path: dir.join("promptlib.json"),
            style_dir: dir.join("styles"),
            ..PromptMapConfig::default()
        }),
        vision: Arc::new(OpenAiVision::new(
            http,
            VisionConfig {
                api_url: "http://127.0.0.1:9".to_string(),
                ..VisionConfig::default()
            },
        )),
        face_detector: None,
    }
}

/// Build the full application router with all middleware layers.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Multipart bodies
// ---------------------------------------------------------------------------

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, Vec<u8>),
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        write!(body, "--{BOUNDARY}\r\n").unwrap();
        match part {
            Part::Text(name, value) => {
                write!(
                    body,
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .unwrap();
            }
            Part::File(name, filename, bytes) => {
                write!(
                    body,
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .unwrap();
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    write!(body, "--{BOUNDARY}--\r\n").unwrap();
    body
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn zip_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

// ---------------------------------------------------------------------------
// Stub render engine
// ---------------------------------------------------------------------------

/// In-process render engine that finishes every job on the first poll
/// with one image on node `455`.
#[derive(Default)]
pub struct StubEngine {
    pub uploads: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<Value>>,
    pub jobs: AtomicUsize,
}

async fn stub_upload(
    State(stub): State<Arc<StubEngine>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    if let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.file_name().unwrap_or_default().to_string();
        let _ = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        stub.uploads.lock().unwrap().push(name.clone());
        return Ok(Json(json!({ "name": name, "subfolder": "", "type": "input" })));
    }
    Err(StatusCode::BAD_REQUEST)
}

async fn stub_prompt(State(stub): State<Arc<StubEngine>>, Json(body): Json<Value>) -> Json<Value> {
    stub.prompts.lock().unwrap().push(body["prompt"].clone());
    let n = stub.jobs.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "prompt_id": format!("stub-{n}"), "number": n }))
}

async fn stub_history(UrlPath(id): UrlPath<String>) -> Json<Value> {
    let mut body = serde_json::Map::new();
    body.insert(
        id.clone(),
        json!({
            "outputs": {
                "455": { "images": [ { "filename": format!("{id}_00001_.png"), "subfolder": "", "type": "output" } ] }
            }
        }),
    );
    Json(Value::Object(body))
}

async fn stub_view(
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Vec<u8> {
    format!("mask:{}", params.get("filename").cloned().unwrap_or_default()).into_bytes()
}

/// Serve a [`StubEngine`] on an ephemeral port; returns its base URL.
pub async fn spawn_stub_engine(stub: Arc<StubEngine>) -> String {
    let app = Router::new()
        .route("/upload/image", post(stub_upload))
        .route("/prompt", post(stub_prompt))
        .route("/history/{id}", route_get(stub_history))
        .route("/view", route_get(stub_view))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
