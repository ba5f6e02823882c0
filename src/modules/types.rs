use derive_more::with_trait::Display;
use serde::{Deserialize, Serialize};

/// Natural pixel size of one page. `0` means the backend could not probe it.
#[derive(Debug, Deserialize, Clone, Copy, Display, Serialize, PartialEq, Eq, Default)]
#[display("{width}x{height}")]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    pub fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn ratio(&self) -> Option<f64> {
        if !self.is_known() {
            return None;
        }
        Some(f64::from(self.height) / f64::from(self.width))
    }
}

#[derive(Debug, Clone, Display, PartialEq, Eq)]
#[display("#{index} {width}x{height} {url}")]
pub struct Page {
    pub(crate) index: usize,
    pub(crate) url: String,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Page {
    pub fn new(index: usize, url: impl Into<String>, dimension: Dimension) -> Self {
        Self {
            index,
            url: url.into(),
            width: dimension.width,
            height: dimension.height,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dimension(&self) -> Dimension {
        Dimension {
            width: self.width,
            height: self.height,
        }
    }

    /// Pages with an unknown size are drawn with the fill sentinel instead.
    pub fn needs_fill(&self) -> bool {
        !self.dimension().is_known()
    }
}

/// Body of `GET /api/dimensions/{tid}/{eid}`.
#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct DimensionsResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<u32>,
}

/// Body of the progress write.
#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct ProgressResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The layout the user asked for and that gets persisted.
#[derive(Debug, Deserialize, Clone, Copy, Display, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreferredMode {
    #[default]
    #[display("continuous")]
    Continuous,
    #[display("paged")]
    Paged,
}

/// The layout actually in effect.
#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
pub enum ReadingMode {
    #[display("continuous")]
    Continuous,
    #[display("paged-height")]
    PagedHeight,
    #[display("paged-width")]
    PagedWidth,
}

impl ReadingMode {
    pub fn resolve(preferred: PreferredMode, viewport: Viewport) -> Self {
        match preferred {
            PreferredMode::Continuous => ReadingMode::Continuous,
            PreferredMode::Paged if viewport.is_wide() => ReadingMode::PagedHeight,
            PreferredMode::Paged => ReadingMode::PagedWidth,
        }
    }

    pub fn is_paged(&self) -> bool {
        !matches!(self, ReadingMode::Continuous)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Display, Serialize, PartialEq, Eq)]
#[display("{width}x{height}")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_wide(&self) -> bool {
        self.width > self.height
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 800)
    }
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
pub enum FlipDirection {
    #[display("left")]
    Left,
    #[display("right")]
    Right,
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
pub enum AlertLevel {
    #[display("danger")]
    Danger,
}

/// Side effects a session asks its driver to carry out.
#[derive(Debug, Clone, Display, PartialEq, Eq)]
pub enum SessionEvent {
    #[display("alert[{level}]: {message}")]
    Alert { level: AlertLevel, message: String },
    #[display("history -> {_0}")]
    HistoryReplaced(String),
    #[display("reached the last page ({page})")]
    BoundaryReached { page: usize },
    #[display("prefetch page {page}")]
    Prefetch { page: usize, url: String },
    #[display("navigate -> {_0}")]
    Navigate(String),
}
