use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Check whether a location points at a video detail ("watch") page
pub fn is_watch_location(location: &str) -> bool {
    location.to_lowercase().contains("youtube.com/watch")
}

/// Read the `v` query parameter from a location
pub fn video_id_from_location(location: &str) -> Option<String> {
    Url::parse(location)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Validate a watch-page URL given on the command line
pub fn validate_watch_url(url: &str) -> anyhow::Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    if !is_watch_location(parsed.as_str()) {
        anyhow::bail!("Not a YouTube watch page: {}", url);
    }

    Ok(parsed)
}

/// Collapse every run of whitespace into a single space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep the first `limit` characters, appending `...` when anything was cut
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("static tag pattern"))
}

fn numeric_entity_pattern() -> &'static Regex {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    ENTITY.get_or_init(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("static entity pattern"))
}

/// Strip markup tags and decode the character references caption markup uses.
///
/// Caption payloads are frequently double-escaped (`&amp;#39;`), so `&amp;` is
/// decoded first and numeric references afterwards.
pub fn markup_to_text(fragment: &str) -> String {
    let stripped = tag_pattern().replace_all(fragment, "");
    let named = stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ");

    numeric_entity_pattern()
        .replace_all(&named, |caps: &regex::Captures| {
            let raw = &caps[1];
            let code = match raw.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => raw.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Find the balanced `{...}` object that opens at byte offset `start`.
///
/// Braces inside JSON string literals are ignored. Returns the object slice,
/// or `None` when `start` is not a `{` or the object never closes.
pub fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    if !text[start..].starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Find the first top-level `{...}` object anywhere in free-form text
pub fn first_json_object(text: &str) -> Option<&str> {
    text.char_indices()
        .filter(|(_, ch)| *ch == '{')
        .find_map(|(idx, _)| balanced_object_at(text, idx))
}
