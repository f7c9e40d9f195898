//! Rewriting `url(...)` references inside stylesheet text.
use regex::{Captures, Regex};
use std::sync::OnceLock;
use url::Url;

fn url_in_css() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"url\((?:(')([^']*)'|(")(.*?)"|([^)]*))\)"#)
            .expect("url() pattern is valid")
    })
}

/// True when `path` needs a base to be resolved: not scheme-qualified, not
/// protocol-relative, not a `www.` host, not a Windows drive path and not a
/// data URI.
pub fn is_relative_path(path: &str) -> bool {
    let lower = path.trim_start().to_ascii_lowercase();
    let scheme_qualified = ["http://", "https://", "ftp://", "ftps://", "data:"]
        .iter()
        .any(|prefix| lower.starts_with(prefix));
    let drive = lower.as_bytes();
    let windows_drive = drive.len() >= 3
        && drive[0].is_ascii_alphabetic()
        && drive[1] == b':'
        && drive[2] == b'\\';
    !(scheme_qualified || windows_drive || lower.starts_with("//") || lower.starts_with("www."))
}

/// `scheme://host[:port]` of `url`, or an empty string when it has none.
pub fn extract_origin(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => parsed.origin().ascii_serialization(),
        _ => String::new(),
    }
}

/// Rewrites every relative `url(...)` in `css_text` against `href`, the URL
/// the stylesheet was loaded from. Absolute, protocol-relative and data URLs
/// are left alone; quoting style is preserved.
pub fn absolute_to_stylesheet(css_text: &str, href: &str) -> String {
    let base = match Url::parse(href) {
        Ok(base) => Some(base),
        Err(err) => {
            log::debug!(target: "css.urls", "leaving urls relative, {href:?} is not a base: {err}");
            None
        }
    };
    url_in_css()
        .replace_all(css_text, |caps: &Captures<'_>| {
            let quote = caps
                .get(1)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            let path = caps
                .get(2)
                .or_else(|| caps.get(4))
                .or_else(|| caps.get(5))
                .map_or("", |m| m.as_str());
            if path.is_empty() || !is_relative_path(path) {
                return caps[0].to_string();
            }
            let resolved = base
                .as_ref()
                .and_then(|base| base.join(path.trim()).ok())
                .map(String::from);
            match resolved {
                Some(abs) => format!("url({quote}{abs}{quote})"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
