use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::{Arc, Mutex};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use crate::modules::types::{Dimension, DimensionsResponse, ProgressResponse};

/// `library.toml`: the titles a demo server answers for.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct LibraryFile {
    #[serde(default)]
    pub titles: Vec<Title>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Title {
    pub id: String,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Entry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<u32>,
    #[serde(default)]
    pub pages: Vec<PageSource>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PageSource {
    pub width: u32,
    pub height: u32,
    /// Image served for this page, relative to the library root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Clone)]
pub struct LibraryState {
    library: Arc<LibraryFile>,
    root: PathBuf,
    progress: Arc<Mutex<HashMap<(String, String), usize>>>,
}

impl LibraryState {
    pub fn new(library: LibraryFile, root: impl Into<PathBuf>) -> Self {
        Self {
            library: Arc::new(library),
            root: root.into(),
            progress: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn entry(&self, title_id: &str, entry_id: &str) -> Option<&Entry> {
        self.library
            .titles
            .iter()
            .find(|t| t.id == title_id)?
            .entries
            .iter()
            .find(|e| e.id == entry_id)
    }

    /// Last page recorded for an entry.
    pub fn progress(&self, title_id: &str, entry_id: &str) -> Option<usize> {
        let progress = self.progress.lock().unwrap_or_else(|e| e.into_inner());
        progress.get(&(title_id.to_string(), entry_id.to_string())).copied()
    }
}

pub fn router(state: LibraryState) -> Router {
    Router::new()
        .route("/api/dimensions/:tid/:eid", get(dimensions))
        .route(
            "/api/progress/:tid/:page",
            axum::routing::put(save_progress).post(save_progress),
        )
        .route("/api/page/:tid/:eid/:page", get(page_image))
        .with_state(state)
}

async fn dimensions(
    State(state): State<LibraryState>,
    Path((tid, eid)): Path<(String, String)>,
) -> Json<DimensionsResponse> {
    let Some(entry) = state.entry(&tid, &eid) else {
        return Json(DimensionsResponse {
            success: false,
            error: Some("not found".to_string()),
            ..DimensionsResponse::default()
        });
    };
    Json(DimensionsResponse {
        success: true,
        error: None,
        dimensions: entry
            .pages
            .iter()
            .map(|p| Dimension {
                width: p.width,
                height: p.height,
            })
            .collect(),
        margin: entry.margin,
    })
}

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    eid: String,
}

async fn save_progress(
    State(state): State<LibraryState>,
    Path((tid, page)): Path<(String, usize)>,
    Query(query): Query<ProgressQuery>,
) -> Json<ProgressResponse> {
    let failure = |message: &str| {
        Json(ProgressResponse {
            success: false,
            error: Some(message.to_string()),
        })
    };
    let Some(entry) = state.entry(&tid, &query.eid) else {
        return failure("not found");
    };
    if page < 1 || page > entry.pages.len() {
        return failure("page out of range");
    }

    info!("Progress {tid}/{} -> {page}", query.eid);
    let mut progress = state.progress.lock().unwrap_or_else(|e| e.into_inner());
    progress.insert((tid, query.eid), page);
    Json(ProgressResponse {
        success: true,
        error: None,
    })
}

async fn page_image(
    State(state): State<LibraryState>,
    Path((tid, eid, page)): Path<(String, String, usize)>,
) -> Result<Response, ServerError> {
    let file = state
        .entry(&tid, &eid)
        .and_then(|entry| entry.pages.get(page.checked_sub(1)?))
        .and_then(|p| p.file.as_ref())
        .ok_or_else(|| ServerError::not_found("page not found"))?;

    let path = state.root.join(file);
    let bytes = tokio::fs::read(&path).await.map_err(|err| {
        warn!("Cannot read {}: {err}", path.display());
        ServerError::not_found("page image missing")
    })?;
    Ok(([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response())
}

fn content_type(path: &FsPath) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[derive(Debug)]
struct ServerError {
    code: StatusCode,
    message: String,
}

impl ServerError {
    fn not_found(message: &str) -> Self {
        Self {
            code: StatusCode::NOT_FOUND,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.code, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_file_parses() {
        let library: LibraryFile = toml::from_str(
            r#"
[[titles]]
id = "t1"

[[titles.entries]]
id = "e1"
margin = 10
pages = [
  { width = 800, height = 1200, file = "e1/001.png" },
  { width = 0, height = 0 },
]
"#,
        )
        .unwrap();
        let state = LibraryState::new(library, "/srv/library");
        let entry = state.entry("t1", "e1").unwrap();
        assert_eq!(entry.margin, Some(10));
        assert_eq!(entry.pages.len(), 2);
        assert!(state.entry("t1", "e2").is_none());
        assert_eq!(state.progress("t1", "e1"), None);
    }

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type(FsPath::new("a/01.PNG")), "image/png");
        assert_eq!(content_type(FsPath::new("a/01.jpeg")), "image/jpeg");
        assert_eq!(content_type(FsPath::new("a/01")), "application/octet-stream");
    }
}
