use async_trait::async_trait;

mod card;
mod error;
mod extractor;
mod fetcher;
#[cfg(feature = "logging")]
mod logging;
mod render;
mod utils;

pub use card::{Attribute, LinkPreviewCard};
pub use error::PreviewError;
pub use extractor::{MetadataExtractor, PreviewMetadata, ERROR_TITLE, NOT_FOUND};
pub use fetcher::{Fetcher, FetcherConfig, DEFAULT_ENDPOINT};
#[cfg(feature = "logging")]
pub use logging::{log_error_card, log_preview_card, setup_logging, LogConfig, LogLevelGuard};
pub use render::render_card;
pub use utils::truncate_str;

/// Host substring that selects the institutional theme.
pub const INSTITUTIONAL_DOMAIN: &str = "psu.edu";
pub const INSTITUTIONAL_THEME: &str = "var(--ddd-theme-2)";
pub const GENERIC_THEME: &str = "var(--ddd-theme-15)";

/// Everything the card displays, plus the input link and the loading flag.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewState {
    pub title: String,
    pub herf: String,
    pub description: String,
    pub image: String,
    pub url: String,
    pub link: String,
    pub theme_color: String,
    pub loading_state: bool,
}

impl Default for PreviewState {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewState {
    pub fn new() -> Self {
        Self {
            title: String::new(),
            herf: String::new(),
            description: String::new(),
            image: String::new(),
            url: String::new(),
            link: String::new(),
            theme_color: default_theme("").to_string(),
            loading_state: false,
        }
    }

    /// The string inspected by [`default_theme`]: `herf` when set, otherwise `link`.
    pub fn theme_source(&self) -> &str {
        if self.herf.is_empty() {
            &self.link
        } else {
            &self.herf
        }
    }

    /// Overwrites the five content fields, leaving `herf`, `link` and the loading flag alone.
    pub fn apply(&mut self, metadata: PreviewMetadata) {
        self.title = metadata.title;
        self.description = metadata.description;
        self.image = metadata.image;
        self.url = metadata.url;
        self.theme_color = metadata.theme_color;
    }
}

/// Picks the theme token for a link or host string.
pub fn default_theme(source: &str) -> &'static str {
    if source.contains(INSTITUTIONAL_DOMAIN) {
        INSTITUTIONAL_THEME
    } else {
        GENERIC_THEME
    }
}

/// Anything that can answer "what metadata does this link have".
///
/// [`Fetcher`] talks to the remote metadata service; tests and embedders can
/// plug in their own source.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self, link: &str) -> Result<serde_json::Value, PreviewError>;
}
