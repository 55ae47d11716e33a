//! HTTP front end for the question-answering pipeline.
//!
//! One page, two controls: a file input that feeds the ingestion pipeline
//! and a question box that feeds retrieval. A single shared [`VectorIndex`]
//! behind a mutex backs every request; a request failure only fails that
//! request.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::pdf::{self, LoadError};
use crate::providers::{Embedder, GenerationError, Generator};
use crate::rag::{
    self, AnswerComposer, IndexStats, IngestError, IngestReport, RetrieveError, Retriever,
    VectorIndex,
};

/// Shared state behind every request.
pub struct AppState {
    pub index: Arc<Mutex<VectorIndex>>,
    pub embedder: Arc<dyn Embedder>,
    pub retriever: Retriever,
    pub composer: AnswerComposer,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let index = Arc::new(Mutex::new(index));
        let retriever = Retriever::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            config.retriever.top_k,
        );
        let composer = AnswerComposer::new(generator, config.generation.max_context_chars);

        Self {
            index,
            embedder,
            retriever,
            composer,
            config,
        }
    }
}

/// JSON error envelope returned by the API routes.
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
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::warn!("request failed: {}", self.message);
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: format!("could not load PDF: {err}"),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let status = match err {
            IngestError::Embedding(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<RetrieveError> for ApiError {
    fn from(err: RetrieveError) -> Self {
        let status = match err {
            RetrieveError::Embedding(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: err.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest {
    question: String,
    #[serde(default)]
    include_sources: bool,
}

async fn front_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `POST /api/upload`: index one PDF from a multipart form.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<IngestReport>, ApiError> {
    let mut file_bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
            file_bytes = Some(bytes);
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::bad_request("missing 'file' field"))?;

    let pages = pdf::load_pages_from_bytes(&bytes)?;
    let report = rag::ingest_pages(
        state.embedder.as_ref(),
        &state.index,
        &pages,
        &state.config.chunking,
    )
    .await?;

    Ok(Json(report))
}

/// `POST /api/ask`: answer a question from the indexed document.
async fn ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<rag::Answer>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let chunks = state.retriever.retrieve(question).await?;
    let answer = state
        .composer
        .answer(question, &chunks, request.include_sources)
        .await?;

    Ok(Json(answer))
}

/// `GET /api/stats`: current index statistics.
async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<IndexStats>, ApiError> {
    let index = state.index.lock().map_err(|_| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "vector index lock poisoned".to_string(),
    })?;

    index.stats().map(Json).map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: e.to_string(),
    })
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let max_upload = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(front_page))
        .route("/api/upload", post(upload))
        .route("/api/ask", post(ask))
        .route("/api/stats", get(stats))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let listener = TcpListener::bind(&addr).await?;

    log::info!("folio listening on http://{}", addr);

    axum::serve(listener, router(state)).await
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>folio — ask your PDF</title>
<style>
  body { font-family: sans-serif; max-width: 44rem; margin: 2rem auto; padding: 0 1rem; }
  fieldset { margin-bottom: 1.5rem; border: 1px solid #ccc; }
  #answer { white-space: pre-wrap; background: #f6f6f6; padding: 1rem; min-height: 3rem; }
  .sources { color: #555; font-size: 0.85rem; }
  .error { color: #a00; }
</style>
</head>
<body>
<h1>folio</h1>
<fieldset>
  <legend>1. Upload a PDF</legend>
  <input type="file" id="pdf" accept="application/pdf">
  <button id="upload">Index</button>
  <span id="upload-status"></span>
</fieldset>
<fieldset>
  <legend>2. Ask a question</legend>
  <input type="text" id="question" size="60" placeholder="What does the document say about…">
  <button id="ask">Ask</button>
</fieldset>
<div id="answer"></div>
<div id="sources" class="sources"></div>
<script>
const status = document.getElementById('upload-status');
const answer = document.getElementById('answer');
const sources = document.getElementById('sources');

document.getElementById('upload').onclick = async () => {
  const input = document.getElementById('pdf');
  if (!input.files.length) { status.textContent = 'choose a file first'; return; }
  status.textContent = 'indexing…';
  const form = new FormData();
  form.append('file', input.files[0]);
  try {
    const resp = await fetch('/api/upload', { method: 'POST', body: form });
    const body = await resp.json();
    status.textContent = resp.ok
      ? `indexed ${body.chunks} chunks from ${body.pages} pages`
      : `error: ${body.error}`;
  } catch (e) {
    status.textContent = 'error: ' + e;
  }
};

document.getElementById('ask').onclick = async () => {
  const question = document.getElementById('question').value;
  answer.textContent = 'thinking…';
  sources.textContent = '';
  try {
    const resp = await fetch('/api/ask', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ question: question, includeSources: true }),
    });
    const body = await resp.json();
    if (!resp.ok) {
      answer.textContent = 'error: ' + body.error;
      answer.classList.add('error');
      return;
    }
    answer.classList.remove('error');
    answer.textContent = body.text;
    if (body.sources && body.sources.length) {
      sources.textContent = 'sources: ' + body.sources
        .map(s => s.pageStart === s.pageEnd ? `page ${s.pageStart}` : `pages ${s.pageStart}-${s.pageEnd}`)
        .join(', ');
    }
  } catch (e) {
    answer.textContent = 'error: ' + e;
    answer.classList.add('error');
  }
};
</script>
</body>
</html>
"#;
