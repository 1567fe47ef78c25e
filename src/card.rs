use crate::extractor::{PreviewMetadata, BLANK};
use crate::render::render_card;
use crate::{Fetcher, MetadataExtractor, MetadataSource, PreviewError, PreviewState};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

/// Attributes a host page may set on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Title,
    Herf,
    Description,
    Image,
    Url,
    Link,
    ThemeColor,
    /// Reflected boolean attribute.
    LoadingState,
}

impl Attribute {
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Title => "title",
            Attribute::Herf => "herf",
            Attribute::Description => "description",
            Attribute::Image => "image",
            Attribute::Url => "url",
            Attribute::Link => "link",
            Attribute::ThemeColor => "themecolor",
            Attribute::LoadingState => "loading-state",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Attribute {
    type Err = PreviewError;

    // attribute names are case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "title" => Ok(Attribute::Title),
            "herf" => Ok(Attribute::Herf),
            "description" => Ok(Attribute::Description),
            "image" => Ok(Attribute::Image),
            "url" => Ok(Attribute::Url),
            "link" => Ok(Attribute::Link),
            "themecolor" | "theme-color" => Ok(Attribute::ThemeColor),
            "loading-state" => Ok(Attribute::LoadingState),
            _ => Err(PreviewError::UnknownAttribute(s.to_string())),
        }
    }
}

/// A link preview card.
///
/// Owns its [`PreviewState`] and publishes every change through a
/// `watch` channel, so a renderer can [`subscribe`](Self::subscribe) and
/// redraw on each notification.
///
/// Overlapping calls to [`fetch_data`](Self::fetch_data) are sequenced by a
/// generation counter: only the most recently started fetch may write its
/// result, whatever order the responses arrive in.
pub struct LinkPreviewCard {
    source: Arc<dyn MetadataSource>,
    extractor: MetadataExtractor,
    state: watch::Sender<PreviewState>,
    generation: AtomicU64,
}

impl Default for LinkPreviewCard {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkPreviewCard {
    pub fn new() -> Self {
        Self::with_fetcher(Fetcher::new())
    }

    pub fn with_fetcher(fetcher: Fetcher) -> Self {
        Self::with_source(Arc::new(fetcher))
    }

    pub fn with_source(source: Arc<dyn MetadataSource>) -> Self {
        let (state, _) = watch::channel(PreviewState::new());
        Self {
            source,
            extractor: MetadataExtractor::new(),
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.subscribe()
    }

    pub fn render(&self) -> String {
        render_card(&self.state.borrow())
    }

    /// Fetches metadata for `link` and updates the card.
    ///
    /// Never fails: network errors, error statuses and unparsable bodies are
    /// logged and replaced by the fixed error content. `loading_state` is set
    /// for the duration of the call and cleared on every exit path, including
    /// the future being dropped.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_data(&self, link: &str) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.link = link.to_string();
            state.loading_state = true;
        });
        let _loading = LoadingGuard {
            card: self,
            generation,
        };

        let result = self.source.fetch_metadata(link).await;
        if let Err(e) = &result {
            e.log();
        }

        self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                debug!(link = %link, generation, "Discarding result of superseded fetch");
                return false;
            }

            let metadata = match &result {
                Ok(json) => self.extractor.extract(json, state.theme_source()),
                Err(_) => PreviewMetadata::error_state(state.theme_source()),
            };
            state.apply(metadata);
            state.loading_state = false;
            true
        });
    }

    /// Re-fetches the link currently set on the card.
    pub async fn refresh(&self) {
        let link = self.state.borrow().link.clone();
        self.fetch_data(&link).await;
    }

    /// Called when the preview image fails to load: blanks the image and
    /// requests a re-render.
    pub fn handle_image_error(&self) {
        warn!("Image failed to load");
        self.state.send_modify(|state| state.image = BLANK.to_string());
    }

    /// Sets an attribute from its string form. For `loading-state` the
    /// attribute's presence means `true`, whatever its value.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<(), PreviewError> {
        let attribute = name.parse::<Attribute>()?;
        self.state.send_modify(|state| match attribute {
            Attribute::LoadingState => state.loading_state = true,
            _ => *text_field(state, attribute) = value.to_string(),
        });
        Ok(())
    }

    pub fn remove_attribute(&self, name: &str) -> Result<(), PreviewError> {
        let attribute = name.parse::<Attribute>()?;
        self.state.send_modify(|state| match attribute {
            Attribute::LoadingState => state.loading_state = false,
            _ => text_field(state, attribute).clear(),
        });
        Ok(())
    }

    /// Reads an attribute back. `loading-state` is `Some("")` while set
    /// and `None` otherwise.
    pub fn attribute(&self, name: &str) -> Result<Option<String>, PreviewError> {
        let attribute = name.parse::<Attribute>()?;
        let mut state = self.state.borrow().clone();
        Ok(match attribute {
            Attribute::LoadingState => state.loading_state.then(String::new),
            _ => Some(std::mem::take(text_field(&mut state, attribute))),
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

fn text_field(state: &mut PreviewState, attribute: Attribute) -> &mut String {
    match attribute {
        Attribute::Title => &mut state.title,
        Attribute::Herf => &mut state.herf,
        Attribute::Description => &mut state.description,
        Attribute::Image => &mut state.image,
        Attribute::Url => &mut state.url,
        Attribute::Link => &mut state.link,
        Attribute::ThemeColor => &mut state.theme_color,
        Attribute::LoadingState => unreachable!("loading-state is a boolean attribute"),
    }
}

/// Clears `loading_state` when a fetch ends without committing, as long as
/// no newer fetch has started since.
struct LoadingGuard<'a> {
    card: &'a LinkPreviewCard,
    generation: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let card = self.card;
        let generation = self.generation;
        card.state.send_if_modified(|state| {
            if !state.loading_state || !card.is_current(generation) {
                return false;
            }
            debug!(generation, "Fetch ended without a result, clearing loading state");
            state.loading_state = false;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ERROR_TITLE, GENERIC_THEME, INSTITUTIONAL_THEME, NOT_FOUND};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    /// Answers every link with a canned result after an optional delay.
    struct StubSource {
        delay: Duration,
        response: fn(&str) -> Result<Value, PreviewError>,
    }

    #[async_trait]
    impl MetadataSource for StubSource {
        async fn fetch_metadata(&self, link: &str) -> Result<Value, PreviewError> {
            tokio::time::sleep(self.delay).await;
            (self.response)(link)
        }
    }

    fn card_with(response: fn(&str) -> Result<Value, PreviewError>) -> LinkPreviewCard {
        LinkPreviewCard::with_source(Arc::new(StubSource {
            delay: Duration::ZERO,
            response,
        }))
    }

    fn psu_response(_: &str) -> Result<Value, PreviewError> {
        Ok(json!({
            "title": {"title": "Penn State"},
            "description": {"description": "A page"},
            "image": {"logo": "https://x/img.png"},
            "url": {"url": "https://psu.edu/page"},
            "themeColor": {"themeColor": "var(--ddd-theme-2)"}
        }))
    }

    #[tokio::test]
    async fn test_fetch_success_scenario() {
        let card = card_with(psu_response);
        card.fetch_data("https://psu.edu/page").await;

        let state = card.state();
        assert_eq!(state.title, "Penn State");
        assert_eq!(state.description, "A page");
        assert_eq!(state.image, "https://x/img.png");
        assert_eq!(state.url, "https://psu.edu/page");
        assert_eq!(state.link, "https://psu.edu/page");
        assert_eq!(state.theme_color, "var(--ddd-theme-2)");
        assert!(!state.loading_state);
    }

    #[tokio::test]
    async fn test_each_error_kind_collapses_to_error_state() {
        let failures: [fn(&str) -> Result<Value, PreviewError>; 3] = [
            |_| Err(PreviewError::NetworkError("connection refused".into())),
            |_| Err(PreviewError::HttpStatusError(500)),
            |_| Err(PreviewError::ParseError("expected value".into())),
        ];

        for failure in failures {
            let card = card_with(failure);
            card.fetch_data("https://psu.edu/page").await;

            let state = card.state();
            assert_eq!(state.title, ERROR_TITLE);
            assert_eq!(state.description, " ");
            assert_eq!(state.image, " ");
            assert_eq!(state.url, " ");
            assert_eq!(state.theme_color, INSTITUTIONAL_THEME);
            assert!(!state.loading_state);
        }
    }

    #[tokio::test]
    async fn test_partial_metadata() {
        let card = card_with(|_| Ok(json!({"title": {"title": "Only a title"}})));
        card.fetch_data("https://example.com").await;

        let state = card.state();
        assert_eq!(state.title, "Only a title");
        assert_eq!(state.description, NOT_FOUND);
        assert_eq!(state.image, NOT_FOUND);
        assert_eq!(state.url, NOT_FOUND);
        assert_eq!(state.theme_color, GENERIC_THEME);
    }

    #[tokio::test]
    async fn test_herf_drives_default_theme() {
        let card = card_with(|_| Err(PreviewError::HttpStatusError(404)));
        card.set_attribute("herf", "https://www.psu.edu").unwrap();
        card.fetch_data("https://example.com").await;

        assert_eq!(card.state().theme_color, INSTITUTIONAL_THEME);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_state_while_in_flight() {
        let card = Arc::new(LinkPreviewCard::with_source(Arc::new(StubSource {
            delay: Duration::from_secs(5),
            response: psu_response,
        })));
        assert!(!card.state().loading_state);

        let task = tokio::spawn({
            let card = card.clone();
            async move { card.fetch_data("https://psu.edu/page").await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(card.state().loading_state);
        assert_eq!(card.attribute("loading-state").unwrap(), Some(String::new()));

        task.await.unwrap();
        assert!(!card.state().loading_state);
        assert_eq!(card.attribute("loading-state").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_fetch_clears_loading_state() {
        let card = LinkPreviewCard::with_source(Arc::new(StubSource {
            delay: Duration::from_secs(60),
            response: psu_response,
        }));

        let result =
            tokio::time::timeout(Duration::from_secs(1), card.fetch_data("https://psu.edu")).await;
        assert!(result.is_err());

        let state = card.state();
        assert!(!state.loading_state);
        assert!(state.title.is_empty());
    }

    // Dropping the newest fetch does not hand the card back to an older
    // one: the older result is still discarded when it lands.
    #[tokio::test(start_paused = true)]
    async fn test_dropping_newer_fetch_leaves_older_superseded() {
        let card = Arc::new(LinkPreviewCard::with_source(Arc::new(StubSource {
            delay: Duration::from_secs(5),
            response: psu_response,
        })));

        let older = tokio::spawn({
            let card = card.clone();
            async move { card.fetch_data("https://psu.edu/page").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let newer =
            tokio::time::timeout(Duration::from_secs(1), card.fetch_data("https://example.com"))
                .await;
        assert!(newer.is_err());
        assert!(!card.state().loading_state);

        older.await.unwrap();
        let state = card.state();
        assert!(state.title.is_empty());
        assert_eq!(state.link, "https://example.com");
        assert!(!state.loading_state);
    }

    #[tokio::test]
    async fn test_image_error_blanks_image_and_notifies() {
        let card = card_with(psu_response);
        card.fetch_data("https://psu.edu/page").await;

        let mut rx = card.subscribe();
        rx.borrow_and_update();

        card.handle_image_error();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().image, " ");

        // still notifies when the image was already blank
        card.handle_image_error();
        assert!(rx.has_changed().unwrap());
        assert_eq!(card.state().image, " ");
    }

    #[test]
    fn test_attribute_names() {
        assert_eq!("themeColor".parse::<Attribute>().unwrap(), Attribute::ThemeColor);
        assert_eq!("theme-color".parse::<Attribute>().unwrap(), Attribute::ThemeColor);
        assert_eq!("LINK".parse::<Attribute>().unwrap(), Attribute::Link);
        assert_eq!(
            "loading-state".parse::<Attribute>().unwrap(),
            Attribute::LoadingState
        );
        assert!(matches!(
            "href".parse::<Attribute>(),
            Err(PreviewError::UnknownAttribute(name)) if name == "href"
        ));
        assert_eq!(Attribute::ThemeColor.to_string(), "themecolor");
    }

    #[test]
    fn test_set_and_remove_attributes() {
        let card = card_with(psu_response);
        card.set_attribute("title", "Hand written").unwrap();
        card.set_attribute("loading-state", "").unwrap();

        assert_eq!(card.attribute("title").unwrap().as_deref(), Some("Hand written"));
        assert!(card.state().loading_state);

        card.remove_attribute("loading-state").unwrap();
        card.remove_attribute("title").unwrap();
        assert!(!card.state().loading_state);
        assert_eq!(card.attribute("title").unwrap().as_deref(), Some(""));

        assert!(card.set_attribute("colour", "red").is_err());
    }

    #[tokio::test]
    async fn test_refresh_uses_current_link() {
        let card = card_with(|link| Ok(json!({"title": {"title": link}})));
        card.set_attribute("link", "https://rust-lang.org").unwrap();
        card.refresh().await;

        assert_eq!(card.state().title, "https://rust-lang.org");
    }
}
