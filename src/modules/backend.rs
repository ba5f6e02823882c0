use std::cell::OnceCell;
use std::error::Error;
use std::time::Duration;
use derive_more::Error as DeriveError;
use derive_more::with_trait::Display;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use url::Url;
use crate::modules::types::{DimensionsResponse, ProgressResponse};

#[derive(Debug, Deserialize, Serialize)]
pub struct BackendsConfigs {
    pub backends: Vec<BackendsConfig>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendsConfig {
    Http(HttpBackend),
}

/// Failure reported by the server: either the request never produced a
/// usable body, or the body carried `success: false`.
#[derive(Debug, Display, DeriveError)]
pub enum ApiError {
    #[display("{message}")]
    Transport { message: String },
    #[display("{message}")]
    Application { message: String },
}

impl ApiError {
    pub(crate) fn application(error: Option<String>) -> Self {
        ApiError::Application {
            message: error.unwrap_or_else(|| "unknown error".to_string()),
        }
    }
}

/// The page metadata, progress and page image contracts of the server.
pub trait Backend {
    fn page_url(&self, title_id: &str, entry_id: &str, page: usize) -> Result<String, Box<dyn Error>>;
    fn dimensions(&self, title_id: &str, entry_id: &str) -> Result<DimensionsResponse, Box<dyn Error>>;
    fn save_progress(&self, title_id: &str, entry_id: &str, page: usize) -> Result<(), Box<dyn Error>>;
    fn prefetch(&self, url: &str) -> Result<(), Box<dyn Error>>;
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgressMethod {
    #[default]
    Put,
    Post,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpBackend {
    url: String,
    #[serde(default = "default_user_agent")]
    user_agent: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default)]
    progress_method: ProgressMethod,
    #[serde(skip)]
    client: OnceCell<Client>,
}

fn default_user_agent() -> String {
    "reader-client/1.0".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl HttpBackend {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            progress_method: ProgressMethod::default(),
            client: OnceCell::new(),
        }
    }

    pub fn with_progress_method(mut self, method: ProgressMethod) -> Self {
        self.progress_method = method;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, Box<dyn Error>> {
        let mut url = Url::parse(&self.url)?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport {
                message: format!("{} cannot be used as a base url", self.url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Built on first use and shared by every later request.
    fn client(&self) -> Result<&Client, Box<dyn Error>> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.user_agent)?);
        let client = Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .default_headers(headers)
            .build()?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl Backend for HttpBackend {
    fn page_url(&self, title_id: &str, entry_id: &str, page: usize) -> Result<String, Box<dyn Error>> {
        let page = page.to_string();
        Ok(self.endpoint(&["api", "page", title_id, entry_id, &page])?.to_string())
    }

    fn dimensions(&self, title_id: &str, entry_id: &str) -> Result<DimensionsResponse, Box<dyn Error>> {
        let url = self.endpoint(&["api", "dimensions", title_id, entry_id])?;
        let body = self.client()?
            .get(url)
            .send()?
            .error_for_status()?
            .text()?;

        let resp: DimensionsResponse = serde_json::from_str(&body)?;
        if !resp.success {
            return Err(ApiError::application(resp.error).into());
        }
        Ok(resp)
    }

    fn save_progress(&self, title_id: &str, entry_id: &str, page: usize) -> Result<(), Box<dyn Error>> {
        let page = page.to_string();
        let mut url = self.endpoint(&["api", "progress", title_id, &page])?;
        url.query_pairs_mut().append_pair("eid", entry_id);

        let method = match self.progress_method {
            ProgressMethod::Put => Method::PUT,
            ProgressMethod::Post => Method::POST,
        };
        let body = self.client()?
            .request(method, url)
            .send()?
            .error_for_status()?
            .text()?;

        let resp: ProgressResponse = serde_json::from_str(&body)?;
        if !resp.success || resp.error.is_some() {
            return Err(ApiError::application(resp.error).into());
        }
        Ok(())
    }

    fn prefetch(&self, url: &str) -> Result<(), Box<dyn Error>> {
        self.client()?
            .get(url)
            .send()?
            .error_for_status()?
            .bytes()?;
        Ok(())
    }
}
