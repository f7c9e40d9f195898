//! Nodes that carry no rendering value and can be left out of a snapshot.

use events::SerializedData;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlimDomOptions {
    pub script: bool,
    pub comment: bool,
    pub head_favicon: bool,
    pub head_whitespace: bool,
    pub head_meta_desc_keywords: bool,
    pub head_meta_social: bool,
    pub head_meta_robots: bool,
    pub head_meta_http_equiv: bool,
    pub head_meta_authorship: bool,
    pub head_meta_verification: bool,
}

impl SlimDomOptions {
    pub fn all() -> Self {
        Self {
            script: true,
            comment: true,
            head_favicon: true,
            head_whitespace: true,
            head_meta_desc_keywords: true,
            head_meta_social: true,
            head_meta_robots: true,
            head_meta_http_equiv: true,
            head_meta_authorship: true,
            head_meta_verification: true,
        }
    }

    /// True when `node` should be replaced by the ignored sentinel.
    pub fn excludes(&self, node: &SerializedData) -> bool {
        match node {
            SerializedData::Comment { .. } => self.comment,
            SerializedData::Element {
                tag_name,
                attributes,
                ..
            } => {
                let attr = |name: &str| {
                    attributes
                        .get(name)
                        .map(|v| v.to_ascii_lowercase())
                        .unwrap_or_default()
                };
                let raw = |name: &str| attributes.get(name).map(String::as_str);
                match tag_name.as_str() {
                    "script" => self.script,
                    "link" => {
                        let rel = raw("rel");
                        let script_hint = (rel == Some("preload") && raw("as") == Some("script"))
                            || (rel == Some("prefetch")
                                && raw("href").is_some_and(|h| h.ends_with(".js")));
                        (self.script && script_hint)
                            || (self.head_favicon && rel == Some("shortcut icon"))
                    }
                    "meta" => self.excludes_meta(
                        &attr("name"),
                        &attr("property"),
                        &attr("rel"),
                        raw("http-equiv").is_some(),
                    ),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn excludes_meta(&self, name: &str, property: &str, rel: &str, http_equiv: bool) -> bool {
        if self.head_favicon
            && (name == "msapplication-tileimage"
                || name == "msapplication-tilecolor"
                || name == "application-name"
                || matches!(rel, "icon" | "apple-touch-icon" | "shortcut icon"))
        {
            return true;
        }
        if self.head_meta_desc_keywords
            && (name.starts_with("description") || name.ends_with("keywords"))
        {
            return true;
        }
        if self.head_meta_social
            && (["og:", "twitter:", "fb:"].iter().any(|p| property.starts_with(p))
                || ["og:", "twitter:"].iter().any(|p| name.starts_with(p))
                || name == "pinterest")
        {
            return true;
        }
        if self.head_meta_robots && matches!(name, "robots" | "googlebot" | "bingbot") {
            return true;
        }
        if self.head_meta_http_equiv && http_equiv {
            return true;
        }
        if self.head_meta_authorship
            && (matches!(name, "author" | "generator" | "framework" | "publisher" | "progid")
                || property.starts_with("article:")
                || property.starts_with("product:"))
        {
            return true;
        }
        self.head_meta_verification
            && matches!(
                name,
                "google-site-verification"
                    | "yandex-verification"
                    | "csrf-token"
                    | "p:domain_verify"
                    | "verify-v1"
                    | "verification"
                    | "shopify-checkout-api-token"
            )
    }
}
