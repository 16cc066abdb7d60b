use crate::highlight::Span;

/// Escapes text for use in HTML bodies and double- or single-quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Renders spans as HTML.
///
/// Annotated spans become `<span class="term">` elements carrying the term,
/// definition and category in `data-*` attributes for the tooltip script.
pub fn render_html(spans: &[Span]) -> String {
    let mut html = String::new();
    for span in spans {
        match span {
            Span::Literal { text, .. } => html.push_str(&escape_html(text)),
            Span::Annotated {
                text,
                definition,
                category,
                ..
            } => {
                let text = escape_html(text);
                html.push_str(&format!(
                    r#"<span class="term" data-term="{text}" data-definition="{definition}" data-category="{category}">{text}</span>"#,
                    definition = escape_html(definition),
                    category = escape_html(category),
                ));
            }
        }
    }
    html
}
