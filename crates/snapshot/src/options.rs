//! Capture configuration.
//!
//! Every field has a default, so a partial TOML or JSON table is enough:
//!
//! ```toml
//! block_class = "private"
//! mask_text_selector = ".secret, [data-private]"
//! mask_input_options = ["password", "email"]
//! iframe_load_timeout = 2000
//! ```
//!
//! Callbacks are not part of the serialized form and are set with the
//! `with_*` builders.

use crate::slim::SlimDomOptions;
use css::SelectorList;
use dom::ElementData;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Input types masked when `mask_all_inputs` is set.
pub const MASKABLE_INPUTS: &[&str] = &[
    "color",
    "date",
    "datetime-local",
    "email",
    "month",
    "number",
    "range",
    "search",
    "tel",
    "text",
    "time",
    "url",
    "week",
    "textarea",
    "select",
    "password",
];

/// Class-based policy: either one literal class name or a pattern any class
/// may match.
#[derive(Clone, Debug)]
pub enum ClassMatcher {
    Name(String),
    Pattern(Regex),
}

impl ClassMatcher {
    pub fn name(name: impl Into<String>) -> Self {
        ClassMatcher::Name(name.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(ClassMatcher::Pattern)
    }

    pub fn matches_class(&self, class: &str) -> bool {
        match self {
            ClassMatcher::Name(name) => name == class,
            ClassMatcher::Pattern(re) => re.is_match(class),
        }
    }

    pub fn matches_element(&self, el: &ElementData) -> bool {
        el.classes().any(|class| self.matches_class(class))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassMatcherRepr {
    Name(String),
    Pattern { pattern: String },
}

impl<'de> Deserialize<'de> for ClassMatcher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ClassMatcherRepr::deserialize(deserializer)? {
            ClassMatcherRepr::Name(name) => Ok(ClassMatcher::Name(name)),
            ClassMatcherRepr::Pattern { pattern } => {
                ClassMatcher::pattern(&pattern).map_err(serde::de::Error::custom)
            }
        }
    }
}

/// Caller-supplied text rewrite used for masking.
#[derive(Clone)]
pub struct MaskFn(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl MaskFn {
    pub fn new(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, text: &str) -> String {
        (self.0)(text)
    }
}

impl fmt::Debug for MaskFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MaskFn(..)")
    }
}

/// Decides whether an iframe keeps its `src` in the snapshot.
#[derive(Clone)]
pub struct SrcPredicate(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl SrcPredicate {
    pub fn new(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn test(&self, src: &str) -> bool {
        (self.0)(src)
    }
}

impl fmt::Debug for SrcPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SrcPredicate(..)")
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SerializeOptions {
    pub block_class: ClassMatcher,
    pub block_selector: Option<SelectorList>,
    /// Elements whose input events are not recorded.
    pub ignore_class: String,
    pub mask_text_class: ClassMatcher,
    pub mask_text_selector: Option<SelectorList>,
    pub mask_all_inputs: bool,
    /// Tag names (`textarea`, `select`) and input types whose values are
    /// masked. Ignored when `mask_all_inputs` is set.
    pub mask_input_options: BTreeSet<String>,
    pub inline_stylesheet: bool,
    pub preserve_white_space: bool,
    pub slim_dom: SlimDomOptions,
    /// Base that relative `src`, `href`, `srcset` and CSS urls resolve
    /// against. Left untouched when unset.
    pub base_url: Option<Url>,
    #[serde(deserialize_with = "millis")]
    pub iframe_load_timeout: Duration,
    #[serde(deserialize_with = "millis")]
    pub stylesheet_load_timeout: Duration,
    /// Upper bound on elements visited when a masking or blocking policy
    /// looks at ancestors. Past the bound the policy reports no match.
    pub max_ancestor_depth: usize,
    pub record_canvas: bool,
    #[serde(skip)]
    pub mask_text_fn: Option<MaskFn>,
    #[serde(skip)]
    pub mask_input_fn: Option<MaskFn>,
    #[serde(skip)]
    pub keep_iframe_src_fn: Option<SrcPredicate>,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            block_class: ClassMatcher::name("rr-block"),
            block_selector: None,
            ignore_class: "rr-ignore".to_string(),
            mask_text_class: ClassMatcher::name("rr-mask"),
            mask_text_selector: None,
            mask_all_inputs: false,
            mask_input_options: BTreeSet::from(["password".to_string()]),
            inline_stylesheet: true,
            preserve_white_space: true,
            slim_dom: SlimDomOptions::default(),
            base_url: None,
            iframe_load_timeout: Duration::from_millis(5000),
            stylesheet_load_timeout: Duration::from_millis(5000),
            max_ancestor_depth: 1024,
            record_canvas: false,
            mask_text_fn: None,
            mask_input_fn: None,
            keep_iframe_src_fn: None,
        }
    }
}

impl SerializeOptions {
    pub fn with_mask_text_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.mask_text_fn = Some(MaskFn::new(f));
        self
    }

    pub fn with_mask_input_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.mask_input_fn = Some(MaskFn::new(f));
        self
    }

    pub fn with_keep_iframe_src_fn(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.keep_iframe_src_fn = Some(SrcPredicate::new(f));
        self
    }

    pub fn with_base_url(mut self, base: Url) -> Self {
        self.base_url = Some(base);
        self
    }

    /// True when values of `tag_name` / `input_type` controls are masked.
    pub fn masks_input(&self, tag_name: &str, input_type: Option<&str>) -> bool {
        let tag = tag_name.to_ascii_lowercase();
        if self.mask_all_inputs {
            return MASKABLE_INPUTS.contains(&tag.as_str())
                || input_type.is_none_or(|t| MASKABLE_INPUTS.contains(&t));
        }
        self.mask_input_options.contains(&tag)
            || input_type.is_some_and(|t| self.mask_input_options.contains(t))
    }

    pub fn keeps_iframe_src(&self, src: &str) -> bool {
        self.keep_iframe_src_fn.as_ref().is_some_and(|f| f.test(src))
    }
}
