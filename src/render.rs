use crate::{default_theme, PreviewState};
use html_escape::{encode_double_quoted_attribute, encode_text};

const DESCRIPTION_LABEL: &str = "Description";
const VISIT_LABEL: &str = "Visit Site";

/// Renders the card markup for `state`.
///
/// Every element carries a `part` name so the host page can style it. While
/// loading only the spinner is shown; a blank image renders no `<img>`.
pub fn render_card(state: &PreviewState) -> String {
    let theme = if is_theme_token(&state.theme_color) {
        state.theme_color.as_str()
    } else {
        default_theme(state.theme_source())
    };
    let mut html = format!(
        r#"<div class="preview" style="--themeColor: {}" part="preview">"#,
        encode_double_quoted_attribute(theme)
    );

    if state.loading_state {
        html.push_str(r#"<div class="loading-spinner" part="loading-spinner"></div>"#);
    } else {
        if !state.image.trim().is_empty() {
            html.push_str(&format!(
                r#"<img src="{}" alt="" part="image" />"#,
                encode_double_quoted_attribute(&state.image)
            ));
        }
        html.push_str(r#"<div class="content" part="content">"#);
        html.push_str(&format!(
            r#"<h3 class="title" part="title">{}</h3>"#,
            encode_text(&state.title)
        ));
        html.push_str(&format!(
            r#"<details part="details"><summary part="summary">{}</summary><p class="desc" part="desc">{}</p></details>"#,
            DESCRIPTION_LABEL,
            encode_text(&state.description)
        ));
        html.push_str(&format!(
            r#"<a href="{}" target="_blank" class="url" part="url">{}</a>"#,
            encode_double_quoted_attribute(&state.link),
            VISIT_LABEL
        ));
        html.push_str("</div>");
    }

    html.push_str("</div>");
    html
}

/// Whether `value` is a single color value safe to place in an inline style:
/// `var(--name)`, `#` followed by 3 to 8 hex digits, or a bare keyword.
fn is_theme_token(value: &str) -> bool {
    let is_ident = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    };

    if let Some(name) = value
        .strip_prefix("var(--")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return is_ident(name);
    }
    if let Some(hex) = value.strip_prefix('#') {
        return (3..=8).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic())
}
