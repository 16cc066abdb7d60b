use crate::config::WebConfig;
use crate::error::ProviderError;
use crate::highlight::{Span, annotated_count, highlight};
use crate::parser::{parse_response, parse_terms};
use crate::prompt::{DEFAULT_PROMPT, resolve_prompt};
use crate::provider::ChatClient;
use crate::render::render_html;
use crate::saved::SavedTermStore;
use crate::terms::TermRecord;
use askama::Template;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use cookie::time::Duration;
use cookie::{Cookie, SameSite};
use include_dir::{Dir, include_dir};
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, warn};

type SharedState = Arc<AppState>;
static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/assets");
pub const SAVED_COOKIE: &str = "termlight_saved";
const SAVED_COOKIE_DAYS: i64 = 30;
/// Largest `Set-Cookie` value browsers are guaranteed to keep.
const MAX_COOKIE_BYTES: usize = 4096;

#[derive(Clone)]
pub struct AppState {
    pub client: ChatClient,
    pub theme: WebTheme,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    button_class: &'static str,
    panel_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-4xl w-full space-y-6",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                panel_class: "bg-white shadow rounded p-4",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-9",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                button_class: "btn btn-primary px-4 py-2",
                panel_class: "card card-body mb-3",
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(config: WebConfig, theme: WebTheme) -> Result<(), WebError> {
    let state = Arc::new(AppState {
        client: ChatClient::new(config.provider.clone()),
        theme,
    });
    let router = build_router(state);
    info!(
        %config.addr,
        theme = %theme,
        provider = %config.provider.kind,
        model = %config.provider.model,
        has_key = config.provider.api_key.is_some(),
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

/// Installs the fmt subscriber; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("termlight_rs=info,tower_http=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "message": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    Router::new()
        .route("/", get(home))
        .route("/assets/*path", get(asset))
        .route("/api/analyze", post(api_analyze))
        .route("/api/annotate", post(api_annotate))
        .route("/api/highlight", post(api_highlight))
        .route("/api/saved", get(api_saved).post(api_save).delete(api_unsave))
        .route("/api/saved/clear", post(api_clear_saved))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "termlight-web",
        "provider": state.client.config().kind,
    }))
}

async fn home(State(state): State<SharedState>, headers: HeaderMap) -> impl IntoResponse {
    let saved = load_saved(&headers);
    let template = HomeTemplate {
        chrome: Chrome::new(state.theme),
        saved: saved.iter().collect(),
        default_prompt: DEFAULT_PROMPT.as_str(),
        version: env!("CARGO_PKG_VERSION"),
    };
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => ApiError::internal(err.to_string()).into_response(),
    }
}

async fn asset(Path(path): Path<String>) -> Result<Response, ApiError> {
    let file = ASSETS
        .get_file(&path)
        .ok_or_else(|| ApiError::not_found(format!("No asset named {path:?}")))?;
    let content_type = asset_mime(&path);
    Ok((
        [(header::CONTENT_TYPE, content_type.to_string())],
        file.contents(),
    )
        .into_response())
}

fn asset_mime(path: &str) -> mime::Mime {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("html") => mime::TEXT_HTML_UTF_8,
        Some("css") => mime::TEXT_CSS_UTF_8,
        Some("js") => mime::APPLICATION_JAVASCRIPT_UTF_8,
        Some("svg") => mime::IMAGE_SVG,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    #[serde(default)]
    text: String,
    system_prompt: Option<String>,
    model: Option<String>,
}

impl AnalyzeRequest {
    fn validated(body: &Bytes) -> Result<Self, ApiError> {
        let request: Self = parse_json_body(body)?;
        if request.text.trim().is_empty() {
            return Err(ApiError::bad_request("Text is required"));
        }
        Ok(request)
    }
}

async fn api_analyze(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request = AnalyzeRequest::validated(&body)?;
    let response = state
        .client
        .complete(
            resolve_prompt(request.system_prompt.as_deref()),
            request.text.trim(),
            request.model.as_deref(),
        )
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize, Deserialize)]
struct AnnotateResponse {
    spans: Vec<Span>,
    html: String,
    terms: Vec<TermRecord>,
    annotated: usize,
    status: String,
    ok: bool,
}

async fn api_annotate(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<AnnotateResponse>, ApiError> {
    let request = AnalyzeRequest::validated(&body)?;
    let text = request.text.trim();
    let outcome = state
        .client
        .complete(
            resolve_prompt(request.system_prompt.as_deref()),
            text,
            request.model.as_deref(),
        )
        .await;
    let (terms, status, ok) = match outcome {
        Ok(envelope) => {
            let terms = parse_response(&envelope);
            let status = if terms.is_empty() {
                "No recognizable terms found; showing the original text.".to_string()
            } else {
                format!("Recognized {} terms; hover to see definitions.", terms.len())
            };
            (terms, status, true)
        }
        Err(err) => {
            warn!(error = %err, "analysis failed, rendering plain text");
            (Vec::new(), format!("Analysis failed: {err}"), false)
        }
    };
    let spans = highlight(text, &terms);
    Ok(Json(AnnotateResponse {
        html: render_html(&spans),
        annotated: annotated_count(&spans),
        spans,
        terms,
        status,
        ok,
    }))
}

#[derive(Debug, Deserialize)]
struct HighlightRequest {
    #[serde(default)]
    text: String,
    terms: Option<Vec<Value>>,
    response: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HighlightResponse {
    spans: Vec<Span>,
    html: String,
    annotated: usize,
}

async fn api_highlight(body: Bytes) -> Result<Json<HighlightResponse>, ApiError> {
    let request: HighlightRequest = parse_json_body(&body)?;
    let terms = match (request.terms, request.response) {
        (Some(items), _) => parse_terms(&items),
        (None, Some(envelope)) => parse_response(&envelope),
        (None, None) => Vec::new(),
    };
    let spans = highlight(&request.text, &terms);
    Ok(Json(HighlightResponse {
        html: render_html(&spans),
        annotated: annotated_count(&spans),
        spans,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedPayload {
    terms: Vec<TermRecord>,
    changed: bool,
}

impl SavedPayload {
    fn from_store(store: &SavedTermStore, changed: bool) -> Self {
        Self {
            terms: store.iter().cloned().collect(),
            changed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SaveRequest {
    #[serde(default)]
    term: String,
    #[serde(default)]
    definition: String,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnsaveParams {
    term: Option<String>,
}

async fn api_saved(headers: HeaderMap) -> Json<SavedPayload> {
    Json(SavedPayload::from_store(&load_saved(&headers), false))
}

async fn api_save(headers: HeaderMap, body: Bytes) -> Result<Response, ApiError> {
    let request: SaveRequest = parse_json_body(&body)?;
    let record = TermRecord::new(&request.term, &request.definition, request.category.as_deref())
        .ok_or_else(|| ApiError::bad_request("Both `term` and `definition` are required"))?;
    let term = record.term.clone();
    let mut store = load_saved(&headers);
    let added = store.add(record);
    let cookie = fit_saved_cookie(&mut store);
    if !store.contains(&term) {
        return Err(ApiError::bad_request("Term is too large to be saved"));
    }
    saved_response(&store, cookie, added)
}

async fn api_unsave(
    headers: HeaderMap,
    Query(params): Query<UnsaveParams>,
) -> Result<Response, ApiError> {
    let term = params
        .term
        .filter(|term| !term.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter `term` is required"))?;
    let mut store = load_saved(&headers);
    let removed = store.remove(&term);
    let cookie = fit_saved_cookie(&mut store);
    saved_response(&store, cookie, removed)
}

async fn api_clear_saved(headers: HeaderMap) -> Result<Response, ApiError> {
    let mut store = load_saved(&headers);
    let had_terms = !store.is_empty();
    store.clear();
    let cookie = saved_cookie(&store);
    saved_response(&store, cookie, had_terms)
}

fn saved_response(
    store: &SavedTermStore,
    cookie: Cookie<'static>,
    changed: bool,
) -> Result<Response, ApiError> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|err| ApiError::internal(format!("failed to encode cookie: {err}")))?;
    Ok((
        [(header::SET_COOKIE, value)],
        Json(SavedPayload::from_store(store, changed)),
    )
        .into_response())
}

/// Cookie persisting `store`; an empty store expires the cookie.
fn saved_cookie(store: &SavedTermStore) -> Cookie<'static> {
    let (value, max_age) = if store.is_empty() {
        (String::new(), Duration::ZERO)
    } else {
        let encoded = utf8_percent_encode(&store.serialize(), NON_ALPHANUMERIC).to_string();
        (encoded, Duration::days(SAVED_COOKIE_DAYS))
    };
    Cookie::build((SAVED_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// Cookie for `store`, evicting the oldest terms until it fits the browser limit.
fn fit_saved_cookie(store: &mut SavedTermStore) -> Cookie<'static> {
    loop {
        let cookie = saved_cookie(store);
        let size = cookie.to_string().len();
        if size <= MAX_COOKIE_BYTES {
            return cookie;
        }
        match store.evict_oldest() {
            Some(evicted) => {
                debug!(term = %evicted.term, size, "evicting saved term to fit cookie");
            }
            None => return cookie,
        }
    }
}

/// Reads the saved-term cookie; a missing or corrupt cookie is an empty store.
fn load_saved(headers: &HeaderMap) -> SavedTermStore {
    let Some(raw) = cookie_value(headers, SAVED_COOKIE) else {
        return SavedTermStore::new();
    };
    let decoded = percent_decode_str(&raw).decode_utf8_lossy();
    match SavedTermStore::load_from_serialized(&decoded) {
        Ok(store) => store,
        Err(err) => {
            warn!(error = %err, "discarding unreadable saved-terms cookie");
            SavedTermStore::new()
        }
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|_| ApiError::bad_request("Request body is not valid JSON"))
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="zh-CN">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Termlight • 术语高亮</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" crossorigin="anonymous">
    {% endif %}
    <link rel="stylesheet" href="/assets/styles.css">
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <div>
          <p class="text-sm text-slate-500 text-muted">Termlight v{{ version }}</p>
          <h1 class="{{ chrome.headline_class }}">Paste text, get every term explained.</h1>
          <p class="{{ chrome.lede_class }}">Terms detected by the model are highlighted in place. Hover for a definition, click to save it.</p>
        </div>
        <section class="{{ chrome.panel_class }}">
          <textarea id="inputText" rows="8" class="w-full form-control" placeholder="在这里粘贴需要分析的文本…"></textarea>
          <details class="mt-2">
            <summary>System prompt</summary>
            <textarea id="systemPrompt" rows="10" class="w-full form-control">{{ default_prompt }}</textarea>
          </details>
          <div class="mt-3 flex gap-3 d-flex">
            <button id="analyzeBtn" class="{{ chrome.button_class }}">分析并高亮</button>
            <button id="clearBtn" class="{{ chrome.button_class }}">清空</button>
          </div>
          <p id="status" class="mt-2" data-type="info"></p>
        </section>
        <section class="{{ chrome.panel_class }}">
          <h2 class="text-xl font-semibold mb-2">Result</h2>
          <div id="output" class="output"></div>
        </section>
        <section class="{{ chrome.panel_class }}">
          <div class="flex justify-between d-flex justify-content-between">
            <h2 class="text-xl font-semibold mb-2">Saved terms</h2>
            <button id="resetSavedBtn" class="{{ chrome.button_class }}">Reset</button>
          </div>
          <ul id="savedList" class="saved-list">
            {% for record in saved %}
            <li data-term="{{ record.term }}">
              <strong>{{ record.term }}</strong>
              <span class="category">{{ record.category }}</span>
              <span>{{ record.definition }}</span>
              <button class="remove-saved" data-term="{{ record.term }}">×</button>
            </li>
            {% endfor %}
          </ul>
          {% if saved.is_empty() %}
          <p id="savedEmpty" class="text-sm text-slate-500">Click a highlighted term to keep it here.</p>
          {% endif %}
        </section>
      </div>
    </main>
    <div id="tooltip" class="tooltip" role="tooltip" aria-hidden="true"></div>
    <script src="/assets/app.js"></script>
  </body>
</html>"#,
    ext = "html"
)]
struct HomeTemplate<'a> {
    chrome: Chrome,
    saved: Vec<&'a TermRecord>,
    default_prompt: &'a str,
    version: &'static str,
}
