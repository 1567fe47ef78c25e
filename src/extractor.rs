use crate::default_theme;
use crate::utils::is_truthy;
use serde_json::Value;
use tracing::debug;

/// Substituted for a field whose key is missing from the response.
pub const NOT_FOUND: &str = "Not Found";
pub const ERROR_TITLE: &str = "Error finding website title";
/// What the error state and a failed image load leave behind.
pub(crate) const BLANK: &str = " ";

/// The five display fields produced from one metadata response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewMetadata {
    pub title: String,
    pub description: String,
    pub image: String,
    pub url: String,
    pub theme_color: String,
}

impl PreviewMetadata {
    /// Content shown after any failed fetch.
    pub fn error_state(theme_source: &str) -> Self {
        Self {
            title: ERROR_TITLE.to_string(),
            description: BLANK.to_string(),
            image: BLANK.to_string(),
            url: BLANK.to_string(),
            theme_color: default_theme(theme_source).to_string(),
        }
    }
}

struct FieldPolicy {
    key: &'static str,
    sub_keys: &'static [&'static str],
}

const TITLE: FieldPolicy = FieldPolicy {
    key: "title",
    sub_keys: &["title", "og:title", "twitter:title"],
};
const DESCRIPTION: FieldPolicy = FieldPolicy {
    key: "description",
    sub_keys: &["description", "og:description", "twitter:description"],
};
const IMAGE: FieldPolicy = FieldPolicy {
    key: "image",
    sub_keys: &["logo", "og:image", "twitter:image"],
};
const URL: FieldPolicy = FieldPolicy {
    key: "url",
    sub_keys: &["url", "og:url"],
};
const THEME_COLOR: FieldPolicy = FieldPolicy {
    key: "themeColor",
    sub_keys: &["themeColor", "theme-color"],
};

/// Maps a metadata service response onto display fields.
///
/// Each field is resolved on its own: a top-level key must be truthy, then
/// its sub-keys are probed in order and the first string wins. A bare string
/// in place of the object is taken as the value.
#[derive(Clone, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, json: &Value, theme_source: &str) -> PreviewMetadata {
        let metadata = PreviewMetadata {
            title: self.field(json, &TITLE).unwrap_or_else(|| NOT_FOUND.to_string()),
            description: self
                .field(json, &DESCRIPTION)
                .unwrap_or_else(|| NOT_FOUND.to_string()),
            image: self.field(json, &IMAGE).unwrap_or_else(|| NOT_FOUND.to_string()),
            url: self.field(json, &URL).unwrap_or_else(|| NOT_FOUND.to_string()),
            theme_color: self
                .field(json, &THEME_COLOR)
                .unwrap_or_else(|| default_theme(theme_source).to_string()),
        };

        debug!(?metadata, "Extracted preview metadata");
        metadata
    }

    fn field(&self, json: &Value, policy: &FieldPolicy) -> Option<String> {
        let value = json.get(policy.key);
        if !is_truthy(value) {
            return None;
        }

        match value? {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => policy
                .sub_keys
                .iter()
                .find_map(|sub| map.get(*sub).and_then(Value::as_str))
                .map(String::from),
            _ => None,
        }
    }
}
