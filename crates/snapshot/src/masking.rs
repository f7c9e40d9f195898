//! Block and mask policy checks against the live tree.

use crate::options::{ClassMatcher, SerializeOptions};
use css::SelectorList;
use dom::{Document, NodeKey};

/// The element itself for elements, the parent element otherwise.
fn subject_element(doc: &Document, node: NodeKey) -> Option<NodeKey> {
    if doc.element(node).is_some() {
        return Some(node);
    }
    doc.parent(node).filter(|p| doc.element(*p).is_some())
}

fn policy_matches(
    doc: &Document,
    node: NodeKey,
    class: &ClassMatcher,
    selector: Option<&SelectorList>,
    check_ancestors: bool,
    max_depth: usize,
) -> bool {
    let Some(start) = subject_element(doc, node) else {
        return false;
    };
    let limit = if check_ancestors { max_depth } else { 1 };
    let mut cursor = Some(start);
    let mut depth = 0;
    while let Some(current) = cursor {
        if depth >= limit {
            break;
        }
        match doc.element(current) {
            Some(el) if class.matches_element(el) => return true,
            Some(_) => {}
            None => break,
        }
        depth += 1;
        cursor = doc.parent(current);
    }
    match selector {
        Some(selector) => selector.closest(doc, start, limit).is_some(),
        None => false,
    }
}

/// True when `node` falls under the block policy. With `check_ancestors`
/// the node also counts as blocked when any ancestor is.
pub fn is_blocked(doc: &Document, node: NodeKey, options: &SerializeOptions, check_ancestors: bool) -> bool {
    policy_matches(
        doc,
        node,
        &options.block_class,
        options.block_selector.as_ref(),
        check_ancestors,
        options.max_ancestor_depth,
    )
}

/// True when the text of `node` (or, for an element, the text below it) is
/// masked.
pub fn needs_masking_text(doc: &Document, node: NodeKey, options: &SerializeOptions) -> bool {
    policy_matches(
        doc,
        node,
        &options.mask_text_class,
        options.mask_text_selector.as_ref(),
        true,
        options.max_ancestor_depth,
    )
}

/// True when input events from `node` are not recorded.
pub fn is_input_ignored(doc: &Document, node: NodeKey, options: &SerializeOptions) -> bool {
    doc.element(node)
        .is_some_and(|el| el.has_class(&options.ignore_class))
}

/// Every non-whitespace character replaced by `*`, or the caller's rewrite.
pub fn mask_text(text: &str, options: &SerializeOptions) -> String {
    match &options.mask_text_fn {
        Some(f) => f.apply(text),
        None => text
            .chars()
            .map(|c| if c.is_whitespace() { c } else { '*' })
            .collect(),
    }
}

/// Value of a form control as it may be recorded.
pub fn mask_input_value(
    tag_name: &str,
    input_type: Option<&str>,
    value: &str,
    options: &SerializeOptions,
) -> String {
    if !options.masks_input(tag_name, input_type) {
        return value.to_string();
    }
    match &options.mask_input_fn {
        Some(f) => f.apply(value),
        None => "*".repeat(value.chars().count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::parse_document;

    fn find(doc: &Document, id: &str) -> NodeKey {
        doc.descendants(doc.root())
            .find(|&k| doc.attribute(k, "id") == Some(id))
            .unwrap()
    }

    #[test]
    fn block_class_checks_ancestors_only_when_asked() {
        let doc = parse_document(r#"<div class="rr-block"><p id="p">x</p></div>"#);
        let options = SerializeOptions::default();
        let p = find(&doc, "p");
        assert!(!is_blocked(&doc, p, &options, false));
        assert!(is_blocked(&doc, p, &options, true));
        let text = doc.first_child(p).unwrap();
        assert!(is_blocked(&doc, text, &options, true));
    }

    #[test]
    fn selector_and_pattern_policies() {
        let doc = parse_document(
            r#"<section data-private="1"><span id="s" class="note">hi</span></section><b id="b" class="secret-9">x</b>"#,
        );
        let options = SerializeOptions {
            mask_text_class: ClassMatcher::pattern("^secret-").unwrap(),
            mask_text_selector: Some(SelectorList::parse("[data-private]").unwrap()),
            ..SerializeOptions::default()
        };
        assert!(needs_masking_text(&doc, find(&doc, "s"), &options));
        assert!(needs_masking_text(&doc, find(&doc, "b"), &options));
        assert!(!needs_masking_text(&doc, doc.root(), &options));
    }

    #[test]
    fn ancestor_walk_is_bounded() {
        let doc = parse_document(r#"<div class="rr-mask"><p><i id="i">x</i></p></div>"#);
        let i = find(&doc, "i");
        let shallow = SerializeOptions {
            max_ancestor_depth: 2,
            ..SerializeOptions::default()
        };
        assert!(!needs_masking_text(&doc, i, &shallow));
        assert!(needs_masking_text(&doc, i, &SerializeOptions::default()));
    }

    #[test]
    fn masking_keeps_whitespace_and_length() {
        let options = SerializeOptions::default();
        assert_eq!(mask_text("ab c", &options), "** *");
        assert_eq!(mask_input_value("input", Some("password"), "hunter2", &options), "*******");
        assert_eq!(mask_input_value("input", Some("text"), "hello", &options), "hello");
        let custom = SerializeOptions::default().with_mask_input_fn(|_| "[redacted]".into());
        assert_eq!(mask_input_value("input", Some("password"), "x", &custom), "[redacted]");
    }
}
