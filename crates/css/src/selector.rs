//! Selector matching for blocking and masking policies.
//!
//! Supported grammar: selector lists of compound selectors joined by the
//! descendant (` `) or child (`>`) combinator. A compound is an optional type
//! or `*`, followed by any number of `#id`, `.class` and attribute selectors
//! (`[a]`, `[a=v]`, `[a~=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`).
use dom::{Document, NodeKey};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorParseError {
    pub selector: String,
    pub reason: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Includes,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    test: Option<(AttrOp, String)>,
}

impl AttrSelector {
    fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match &self.test {
            None => true,
            Some((AttrOp::Equals, want)) => value == want,
            Some((AttrOp::Includes, want)) => value.split_ascii_whitespace().any(|v| v == want),
            Some((AttrOp::Prefix, want)) => !want.is_empty() && value.starts_with(want.as_str()),
            Some((AttrOp::Suffix, want)) => !want.is_empty() && value.ends_with(want.as_str()),
            Some((AttrOp::Substring, want)) => !want.is_empty() && value.contains(want.as_str()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

impl Compound {
    fn matches(&self, doc: &Document, key: NodeKey) -> bool {
        let Some(el) = doc.element(key) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if !el.tag_name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.ids.iter().all(|id| el.attribute("id") == Some(id.as_str()))
            && self.classes.iter().all(|c| el.has_class(c))
            && self.attrs.iter().all(|a| a.matches(el.attribute(&a.name)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// The subject compound plus its ancestor constraints, nearest first.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Complex {
    subject: Compound,
    ancestors: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches(&self, doc: &Document, key: NodeKey) -> bool {
        self.subject.matches(doc, key) && match_ancestors(doc, key, &self.ancestors)
    }
}

fn parent_element(doc: &Document, key: NodeKey) -> Option<NodeKey> {
    doc.parent(key).filter(|&p| doc.element(p).is_some())
}

fn match_ancestors(doc: &Document, key: NodeKey, rest: &[(Combinator, Compound)]) -> bool {
    let Some(((combinator, compound), tail)) = rest.split_first() else {
        return true;
    };
    match combinator {
        Combinator::Child => parent_element(doc, key)
            .is_some_and(|p| compound.matches(doc, p) && match_ancestors(doc, p, tail)),
        Combinator::Descendant => {
            let mut cursor = parent_element(doc, key);
            while let Some(p) = cursor {
                if compound.matches(doc, p) && match_ancestors(doc, p, tail) {
                    return true;
                }
                cursor = parent_element(doc, p);
            }
            false
        }
    }
}

/// A parsed, comma-separated selector list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SelectorList {
    source: String,
    selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self, SelectorParseError> {
        let err = |reason| {
            log::debug!(target: "css.selector", "rejecting {source:?}: {reason}");
            SelectorParseError {
                selector: source.to_string(),
                reason,
            }
        };
        let mut selectors = Vec::new();
        for part in source.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(err("empty selector in list"));
            }
            selectors.push(parse_complex(part).map_err(err)?);
        }
        Ok(Self {
            source: source.to_string(),
            selectors,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the element at `key` matches any selector in the list.
    pub fn matches(&self, doc: &Document, key: NodeKey) -> bool {
        self.selectors.iter().any(|s| s.matches(doc, key))
    }

    /// The nearest inclusive ancestor element matching the list, looking at
    /// most `max_depth` elements up. Stops at shadow and frame boundaries.
    pub fn closest(&self, doc: &Document, key: NodeKey, max_depth: usize) -> Option<NodeKey> {
        let mut cursor = doc.element(key).map(|_| key);
        let mut depth = 0;
        while let Some(current) = cursor {
            if depth >= max_depth {
                return None;
            }
            if self.matches(doc, current) {
                return Some(current);
            }
            depth += 1;
            cursor = parent_element(doc, current);
        }
        None
    }
}

impl TryFrom<String> for SelectorList {
    type Error = SelectorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SelectorList> for String {
    fn from(value: SelectorList) -> Self {
        value.source
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn parse_complex(input: &str) -> Result<Complex, &'static str> {
    let mut compounds: Vec<(Combinator, Compound)> = Vec::new();
    let mut pending = Combinator::Descendant;
    let mut rest = input.trim();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('>') {
            if compounds.is_empty() {
                return Err("leading combinator");
            }
            pending = Combinator::Child;
            rest = after.trim_start();
            continue;
        }
        let (compound, after) = parse_compound(rest)?;
        compounds.push((pending, compound));
        pending = Combinator::Descendant;
        rest = after.trim_start();
    }
    if pending == Combinator::Child {
        return Err("trailing combinator");
    }
    // Walking right to left, each compound is reached through the
    // combinator written just before its right-hand neighbour.
    let (mut link, subject) = compounds.pop().ok_or("empty selector")?;
    let mut ancestors = Vec::with_capacity(compounds.len());
    while let Some((before, compound)) = compounds.pop() {
        ancestors.push((link, compound));
        link = before;
    }
    Ok(Complex { subject, ancestors })
}

fn parse_compound(input: &str) -> Result<(Compound, &str), &'static str> {
    let mut compound = Compound::default();
    let mut rest = input;

    if let Some(after) = rest.strip_prefix('*') {
        rest = after;
    } else {
        let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        if end > 0 {
            compound.tag = Some(rest[..end].to_ascii_lowercase());
            rest = &rest[end..];
        }
    }

    loop {
        if let Some(after) = rest.strip_prefix('#') {
            let end = after.find(|c: char| !is_ident_char(c)).unwrap_or(after.len());
            if end == 0 {
                return Err("empty id");
            }
            compound.ids.push(after[..end].to_string());
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(|c: char| !is_ident_char(c)).unwrap_or(after.len());
            if end == 0 {
                return Err("empty class");
            }
            compound.classes.push(after[..end].to_string());
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or("unterminated attribute selector")?;
            compound.attrs.push(parse_attr(&after[..close])?);
            rest = &after[close + 1..];
        } else {
            break;
        }
    }

    if rest.len() == input.len() {
        return Err("unsupported selector syntax");
    }
    if let Some(c) = rest.chars().next() {
        if !c.is_whitespace() && c != '>' {
            return Err("unsupported selector syntax");
        }
    }
    Ok((compound, rest))
}

fn parse_attr(body: &str) -> Result<AttrSelector, &'static str> {
    let body = body.trim();
    let ops = [
        ("~=", AttrOp::Includes),
        ("^=", AttrOp::Prefix),
        ("$=", AttrOp::Suffix),
        ("*=", AttrOp::Substring),
        ("=", AttrOp::Equals),
    ];
    for (token, op) in ops {
        if let Some((name, value)) = body.split_once(token) {
            let name = name.trim();
            if name.is_empty() || !name.chars().all(is_ident_char) {
                return Err("invalid attribute name");
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            return Ok(AttrSelector {
                name: name.to_ascii_lowercase(),
                test: Some((op, value.to_string())),
            });
        }
    }
    if body.is_empty() || !body.chars().all(is_ident_char) {
        return Err("invalid attribute name");
    }
    Ok(AttrSelector {
        name: body.to_ascii_lowercase(),
        test: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::parse_document;

    fn find(doc: &Document, tag: &str) -> NodeKey {
        doc.descendants(doc.root())
            .find(|&k| doc.tag_name(k) == Some(tag))
            .unwrap()
    }

    #[test]
    fn compound_selectors_match() {
        let doc = parse_document(
            r#"<div id="main" class="a b"><input type="password" data-k="x-1"></div>"#,
        );
        let div = find(&doc, "div");
        let input = find(&doc, "input");
        for (selector, key, expected) in [
            ("div", div, true),
            ("#main.a.b", div, true),
            ("div.c", div, false),
            ("[type=password]", input, true),
            ("input[type='password']", input, true),
            ("[data-k^=x-]", input, true),
            ("[data-k$=2]", input, false),
            ("*", input, true),
            ("span, input", input, true),
        ] {
            let list = SelectorList::parse(selector).unwrap();
            assert_eq!(list.matches(&doc, key), expected, "{selector}");
        }
    }

    #[test]
    fn combinators_match_ancestors() {
        let doc = parse_document("<section class=s><div><p><em>x</em></p></div></section>");
        let em = find(&doc, "em");
        let p = find(&doc, "p");
        assert!(SelectorList::parse(".s em").unwrap().matches(&doc, em));
        assert!(SelectorList::parse("div > p > em").unwrap().matches(&doc, em));
        assert!(!SelectorList::parse(".s > p").unwrap().matches(&doc, p));
        assert!(SelectorList::parse("section div>p").unwrap().matches(&doc, p));
    }

    #[test]
    fn closest_respects_depth_limit() {
        let doc = parse_document("<div class=block><p><span>x</span></p></div>");
        let span = find(&doc, "span");
        let div = find(&doc, "div");
        let list = SelectorList::parse(".block").unwrap();
        assert_eq!(list.closest(&doc, span, 10), Some(div));
        assert_eq!(list.closest(&doc, span, 2), None);
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert!(SelectorList::parse("a:hover").is_err());
        assert!(SelectorList::parse("> a").is_err());
        assert!(SelectorList::parse("a,").is_err());
        assert!(SelectorList::parse("[x").is_err());
    }

    #[test]
    fn deserializes_from_string() {
        let list: SelectorList = serde_json::from_str(r#"".secret""#).unwrap();
        assert_eq!(list.as_str(), ".secret");
        assert!(serde_json::from_str::<SelectorList>(r#""a:hover""#).is_err());
    }

    #[test]
    fn rejected_selectors_are_logged() {
        let lines = crate::test_log::capture(|| {
            assert!(SelectorList::parse("div, , p").is_err());
            assert!(SelectorList::parse("div > p").is_ok());
        });
        assert_eq!(lines, vec![r#"css.selector: rejecting "div, , p": empty selector in list"#]);
    }
}
