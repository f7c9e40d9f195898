//! Rewriting attribute values so they still resolve when the snapshot is
//! rendered somewhere else.

use css::absolute_to_stylesheet;
use url::Url;

/// `value` resolved against `base`. Blank values and values that do not
/// form a URL are returned unchanged.
pub fn absolute_to_doc(base: Option<&Url>, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return value.to_string();
    }
    match base.and_then(|base| base.join(trimmed).ok()) {
        Some(url) => url.into(),
        None => value.to_string(),
    }
}

/// Resolves every candidate URL of a `srcset` value, keeping descriptors.
pub fn absolute_srcset(base: Option<&Url>, value: &str) -> String {
    if value.trim().is_empty() {
        return value.to_string();
    }
    let mut out: Vec<String> = Vec::new();
    let mut rest = value;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }
        let url_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let mut url = &rest[..url_end];
        rest = &rest[url_end..];
        if url.ends_with(',') {
            url = url.trim_end_matches(',');
            out.push(absolute_to_doc(base, url));
            continue;
        }
        // Descriptor runs to the next comma outside parentheses.
        let mut depth = 0usize;
        let mut desc_end = rest.len();
        for (i, c) in rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    desc_end = i;
                    break;
                }
                _ => {}
            }
        }
        let descriptor = rest[..desc_end].trim();
        rest = &rest[desc_end..];
        let absolute = absolute_to_doc(base, url);
        if descriptor.is_empty() {
            out.push(absolute);
        } else {
            out.push(format!("{absolute} {descriptor}"));
        }
    }
    out.join(", ")
}

/// Value of attribute `name` on a `tag_name` element as it goes into a
/// snapshot.
pub fn transform_attribute(base: Option<&Url>, tag_name: &str, name: &str, value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    match name {
        "src" => absolute_to_doc(base, value),
        "href" if !(tag_name == "use" && value.starts_with('#')) => absolute_to_doc(base, value),
        "xlink:href" if !value.starts_with('#') => absolute_to_doc(base, value),
        "background" if matches!(tag_name, "table" | "td" | "th") => absolute_to_doc(base, value),
        "srcset" => absolute_srcset(base, value),
        "style" => match base {
            Some(base) => absolute_to_stylesheet(value, base.as_str()),
            None => value.to_string(),
        },
        "data" if tag_name == "object" => absolute_to_doc(base, value),
        _ => value.to_string(),
    }
}
