// Mock generator backend for integration tests
#![allow(dead_code)]

use std::{
    collections::HashSet,
    io,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, dev::ServerHandle, get, http::header, post, web,
};
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use webagent::api::ApiClient;

pub const PASSWORD: &str = "secret";

/// Configuration for mock backend behavior
#[derive(Clone, Debug)]
pub struct MockBackendConfig {
    /// Chunks streamed by `/generate` and `/generate-website`
    pub generate_chunks: Vec<String>,
    /// Abort the stream instead of sending the chunk at this index
    pub fail_at_chunk: Option<usize>,
    pub chunk_delay_ms: u64,
    pub image_description: String,
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            generate_chunks: super::COMPLETE_RESPONSE_CHUNKS
                .iter()
                .map(|chunk| chunk.to_string())
                .collect(),
            fail_at_chunk: None,
            chunk_delay_ms: 0,
            image_description: "A hero section with a blue call-to-action button".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct BackendState {
    users: HashSet<String>,
    access_tokens: HashSet<String>,
    refresh_tokens: HashSet<String>,
    issued: u64,
    refresh_calls: u64,
    api_key_updates: Vec<String>,
    generate_bodies: Vec<Value>,
    description_bodies: Vec<Value>,
    generate_auth: Vec<Option<String>>,
    upload_content_types: Vec<String>,
}

impl BackendState {
    fn issue_tokens(&mut self) -> Value {
        self.issued += 1;
        let access = format!("access-{}", self.issued);
        let refresh_token = format!("refresh-{}", self.issued);
        self.access_tokens.insert(access.clone());
        self.refresh_tokens.insert(refresh_token.clone());
        json!({
            "access_token": access,
            "refresh_token": refresh_token,
            "token_type": "bearer"
        })
    }
}

struct AppState {
    config: MockBackendConfig,
    state: Mutex<BackendState>,
}

impl AppState {
    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }
}

/// Mock backend server for testing
pub struct MockBackend {
    pub base_url: String,
    app: web::Data<AppState>,
    handle: ServerHandle,
}

impl MockBackend {
    /// Start the server on an ephemeral port
    pub async fn start(config: MockBackendConfig) -> Self {
        let app = web::Data::new(AppState {
            config,
            state: Mutex::new(BackendState::default()),
        });

        let data = app.clone();
        let server = HttpServer::new(move || {
            App::new().app_data(data.clone()).service(
                web::scope("/api")
                    .service(register)
                    .service(login)
                    .service(refresh)
                    .service(me)
                    .service(update_api_key)
                    .service(generate)
                    .service(generate_website)
                    .service(analyze_image)
                    .service(design_styles)
                    .service(site_types)
                    .service(templates),
            )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("Failed to bind mock backend");

        let port = server.addrs()[0].port();
        let server = server.run();
        let handle = server.handle();
        tokio::spawn(server);

        Self {
            base_url: format!("http://127.0.0.1:{}/api", port),
            app,
            handle,
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.base_url, Duration::from_secs(5)).unwrap()
    }

    pub async fn stop(&self) {
        self.handle.stop(true).await;
    }

    /// Register a user directly, bypassing the HTTP API
    pub fn add_user(&self, name: &str) {
        self.app.lock().users.insert(name.to_string());
    }

    /// Invalidate every issued access token, as if they expired
    pub fn expire_access_tokens(&self) {
        self.app.lock().access_tokens.clear();
    }

    pub fn revoke_refresh_tokens(&self) {
        self.app.lock().refresh_tokens.clear();
    }

    pub fn refresh_calls(&self) -> u64 {
        self.app.lock().refresh_calls
    }

    pub fn api_key_updates(&self) -> Vec<String> {
        self.app.lock().api_key_updates.clone()
    }

    pub fn generate_bodies(&self) -> Vec<Value> {
        self.app.lock().generate_bodies.clone()
    }

    pub fn description_bodies(&self) -> Vec<Value> {
        self.app.lock().description_bodies.clone()
    }

    pub fn generate_auth(&self) -> Vec<Option<String>> {
        self.app.lock().generate_auth.clone()
    }

    pub fn upload_content_types(&self) -> Vec<String> {
        self.app.lock().upload_content_types.clone()
    }
}

fn bearer(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

fn detail(status: actix_web::http::StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "detail": message }))
}

fn unauthorized() -> HttpResponse {
    detail(
        actix_web::http::StatusCode::UNAUTHORIZED,
        "Could not validate credentials",
    )
}

fn authorized(req: &HttpRequest, app: &AppState) -> bool {
    bearer(req).is_some_and(|token| app.lock().access_tokens.contains(&token))
}

/// Stream the configured chunks, optionally cutting the connection mid-way
fn stream_response(config: &MockBackendConfig) -> HttpResponse {
    let delay = Duration::from_millis(config.chunk_delay_ms);
    let mut items: Vec<Result<Bytes, io::Error>> = Vec::new();
    for (i, chunk) in config.generate_chunks.iter().enumerate() {
        if config.fail_at_chunk == Some(i) {
            items.push(Err(io::Error::other("generator crashed")));
            break;
        }
        items.push(Ok(Bytes::from(chunk.clone())));
    }

    let body = stream::iter(items).then(move |item| async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        item
    });

    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .streaming(body)
}

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    password: String,
    api_key: String,
}

#[post("/users/register")]
async fn register(app: web::Data<AppState>, body: web::Json<RegisterBody>) -> HttpResponse {
    if body.api_key.is_empty() || body.password.is_empty() {
        return detail(
            actix_web::http::StatusCode::BAD_REQUEST,
            "Password and API key are required",
        );
    }
    let mut state = app.lock();
    if !state.users.insert(body.name.clone()) {
        return detail(
            actix_web::http::StatusCode::BAD_REQUEST,
            "Username already registered",
        );
    }
    HttpResponse::Ok().json(json!({ "id": format!("user-{}", state.users.len()), "name": body.name }))
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[post("/users/login")]
async fn login(app: web::Data<AppState>, form: web::Form<LoginForm>) -> HttpResponse {
    let mut state = app.lock();
    if !state.users.contains(&form.username) || form.password != PASSWORD {
        return detail(
            actix_web::http::StatusCode::UNAUTHORIZED,
            "Incorrect username or password",
        );
    }
    HttpResponse::Ok().json(state.issue_tokens())
}

#[derive(Deserialize)]
struct RefreshBody {
    refresh_token: String,
}

#[post("/users/refresh")]
async fn refresh(app: web::Data<AppState>, body: web::Json<RefreshBody>) -> HttpResponse {
    let mut state = app.lock();
    state.refresh_calls += 1;
    if !state.refresh_tokens.remove(&body.refresh_token) {
        return detail(
            actix_web::http::StatusCode::UNAUTHORIZED,
            "Invalid refresh token",
        );
    }
    HttpResponse::Ok().json(state.issue_tokens())
}

#[get("/users/me")]
async fn me(req: HttpRequest, app: web::Data<AppState>) -> HttpResponse {
    if !authorized(&req, &app) {
        return unauthorized();
    }
    HttpResponse::Ok().json(json!({ "id": "user-1", "name": "alice" }))
}

#[derive(Deserialize)]
struct UpdateKeyBody {
    new_api_key: String,
    current_password: String,
}

#[post("/users/update-api-key")]
async fn update_api_key(
    req: HttpRequest,
    app: web::Data<AppState>,
    body: web::Json<UpdateKeyBody>,
) -> HttpResponse {
    if !authorized(&req, &app) {
        return unauthorized();
    }
    if body.current_password != PASSWORD {
        return detail(actix_web::http::StatusCode::BAD_REQUEST, "Incorrect password");
    }
    app.lock().api_key_updates.push(body.new_api_key.clone());
    HttpResponse::Ok().json(json!({ "message": "API key updated successfully" }))
}

#[post("/generate")]
async fn generate(req: HttpRequest, app: web::Data<AppState>, body: web::Json<Value>) -> HttpResponse {
    let prompt = body.get("prompt").and_then(Value::as_str).unwrap_or_default();
    if prompt.trim().is_empty() {
        return HttpResponse::UnprocessableEntity().json(json!({
            "detail": [
                { "loc": ["body", "prompt"], "msg": "field required", "type": "value_error.missing" }
            ]
        }));
    }
    {
        let mut state = app.lock();
        state.generate_bodies.push(body.into_inner());
        state.generate_auth.push(bearer(&req));
    }
    stream_response(&app.config)
}

#[post("/generate-website")]
async fn generate_website(app: web::Data<AppState>, body: web::Json<Value>) -> HttpResponse {
    app.lock().description_bodies.push(body.into_inner());
    stream_response(&app.config)
}

#[post("/analyze-image")]
async fn analyze_image(req: HttpRequest, app: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    app.lock().upload_content_types.push(content_type.clone());

    let body = String::from_utf8_lossy(&body).to_ascii_lowercase();
    if !content_type.starts_with("multipart/form-data") || !body.contains("name=\"file\"") {
        return detail(actix_web::http::StatusCode::BAD_REQUEST, "No file uploaded");
    }
    if !body.contains("content-type: image/") {
        return detail(
            actix_web::http::StatusCode::BAD_REQUEST,
            "Invalid file type. Allowed types: jpeg, jpg, png, webp, gif",
        );
    }

    HttpResponse::Ok().json(json!({
        "success": true,
        "description": app.config.image_description,
        "filename": "upload.png",
        "file_size": body.len(),
        "image_dimensions": "1x1",
        "message": "Image analyzed successfully"
    }))
}

#[get("/design-styles")]
async fn design_styles() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "styles": {
            "v0-modern": { "name": "Modern", "description": "Clean gradients" },
            "brutalist": { "name": "Brutalist", "description": "Raw blocks" }
        },
        "default": "v0-modern"
    }))
}

#[get("/site-types")]
async fn site_types() -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({ "error": "site types unavailable" }))
}

#[get("/templates")]
async fn templates() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "templates": [
            { "id": "bakery", "prompt": "Landing page for a bakery" }
        ]
    }))
}
