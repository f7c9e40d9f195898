mod common;

use common::{Session, id};
use events::{AttributeChange, EventData, MutationData, StyleChange};
use serde_json::Value;
use std::collections::HashSet;

#[test]
fn snapshot_then_quiet_flush_emits_nothing() {
    let mut session = Session::start("<div><span>hi</span></div>");
    let events = session.take();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0].data, EventData::Meta(_)));
    assert!(events[1].is_full_snapshot());

    let div = session.first("div");
    let span = session.first("span");
    let text = session.doc.children(span)[0];
    assert_eq!(session.id_of(session.doc.root()), id(1));
    assert_eq!(session.id_of(div), id(2));
    assert_eq!(session.id_of(span), id(3));
    assert_eq!(session.id_of(text), id(4));

    session.flush();
    assert!(session.take().is_empty());
}

#[test]
fn appended_last_child_has_no_next_id() {
    let mut session = Session::start("<div><span>hi</span></div>");
    session.take();
    let div = session.first("div");
    let p = session.doc.create_element("p");
    session.doc.append_child(div, p).unwrap();
    session.flush();

    let mutations = session.take_mutations();
    assert_eq!(mutations.len(), 1);
    let adds = &mutations[0].adds;
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].parent_id, id(2));
    assert_eq!(adds[0].next_id, None);
    assert_eq!(adds[0].node.id, id(5));
    assert_eq!(adds[0].node.tag_name(), Some("p"));
    assert_eq!(serde_json::to_value(&adds[0]).unwrap()["nextId"], Value::Null);
}

#[test]
fn inserted_before_sibling_points_at_it() {
    let mut session = Session::start("<ul><li>a</li></ul>");
    session.take();
    let ul = session.first("ul");
    let li = session.first("li");
    let first = session.doc.create_element("li");
    session.doc.insert_before(ul, first, Some(li)).unwrap();
    session.flush();

    let mutations = session.take_mutations();
    assert_eq!(mutations[0].adds[0].next_id, Some(session.id_of(li)));
}

#[test]
fn attribute_set_then_removed_reports_unset() {
    let mut session = Session::start(r#"<div title="a"></div>"#);
    session.take();
    let div = session.first("div");
    session.doc.set_attribute(div, "title", "b").unwrap();
    session.doc.remove_attribute(div, "title").unwrap();
    session.flush();

    let mutations = session.take_mutations();
    assert_eq!(mutations.len(), 1);
    let attributes = &mutations[0].attributes;
    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes[0].id, id(2));
    assert_eq!(
        attributes[0].attributes.get("title"),
        Some(&AttributeChange::Value(None))
    );
}

#[test]
fn reverted_changes_have_no_net_effect() {
    let mut session = Session::start("<div><span>hi</span></div>");
    session.take();
    let div = session.first("div");
    let text = session.doc.children(session.first("span"))[0];

    session.doc.set_attribute(div, "data-x", "1").unwrap();
    session.doc.remove_attribute(div, "data-x").unwrap();
    session.doc.set_text(text, "bye").unwrap();
    session.doc.set_text(text, "hi").unwrap();
    session.flush();

    assert!(session.take().is_empty());
}

#[test]
fn last_text_value_wins() {
    let mut session = Session::start("<p>one</p>");
    session.take();
    let text = session.doc.children(session.first("p"))[0];
    session.doc.set_text(text, "two").unwrap();
    session.doc.set_text(text, "three").unwrap();
    session.flush();

    let mutations = session.take_mutations();
    assert_eq!(mutations[0].texts.len(), 1);
    assert_eq!(mutations[0].texts[0].value.as_deref(), Some("three"));
}

#[test]
fn masked_text_is_rewritten() {
    let mut session = Session::start(r#"<p class="rr-mask">secret</p>"#);
    session.take();
    let text = session.doc.children(session.first("p"))[0];
    session.doc.set_text(text, "new words").unwrap();
    session.flush();

    let mutations = session.take_mutations();
    assert_eq!(mutations[0].texts[0].value.as_deref(), Some("*** *****"));
}

#[test]
fn style_changes_are_reported_per_property() {
    let mut session = Session::start(r#"<div style="color: red; margin: 0"></div>"#);
    session.take();
    let div = session.first("div");
    session.doc.set_attribute(div, "style", "color: blue").unwrap();
    session.flush();

    let mutations = session.take_mutations();
    let Some(AttributeChange::Style(diff)) = mutations[0].attributes[0].attributes.get("style") else {
        panic!("style should be reported as a diff");
    };
    assert_eq!(
        diff.get("color"),
        Some(&StyleChange::Set {
            value: "blue".into(),
            priority: None
        })
    );
    assert_eq!(diff.get("margin"), Some(&StyleChange::Removed));
}

#[test]
fn removed_node_leaves_the_mirror() {
    let mut session = Session::start("<div><span>hi</span></div>");
    session.take();
    let span = session.first("span");
    session.doc.remove(span).unwrap();
    session.flush();

    let mutations = session.take_mutations();
    assert_eq!(mutations[0].removes.len(), 1);
    assert_eq!(mutations[0].removes[0].parent_id, id(2));
    assert_eq!(mutations[0].removes[0].id, id(3));
    assert!(mutations[0].adds.is_empty());
    assert!(!session.recorder.mirror().has(id(3)));
    assert!(!session.recorder.mirror().has(id(4)));
}

#[test]
fn node_added_and_removed_in_one_batch_is_dropped() {
    let mut session = Session::start("<div></div>");
    session.take();
    let div = session.first("div");
    let section = session.doc.create_element("section");
    let inner = session.doc.create_text("temp");
    session.doc.append_child(section, inner).unwrap();
    session.doc.append_child(div, section).unwrap();
    session.doc.remove(section).unwrap();
    session.flush();

    assert!(session.take().is_empty());
}

#[test]
fn child_of_removed_parent_is_not_added() {
    let mut session = Session::start("<div><span>hi</span></div>");
    session.take();
    let span = session.first("span");
    let p = session.doc.create_element("p");
    session.doc.append_child(span, p).unwrap();
    session.doc.remove(span).unwrap();
    session.flush();

    let mutations = session.take_mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].removes.len(), 1);
    assert!(mutations[0].adds.is_empty());
}

#[test]
fn changes_to_a_new_node_travel_in_its_add() {
    let mut session = Session::start("<div></div>");
    session.take();
    let div = session.first("div");
    let p = session.doc.create_element("p");
    let text = session.doc.create_text("draft");
    session.doc.append_child(p, text).unwrap();
    session.doc.append_child(div, p).unwrap();
    session.doc.set_text(text, "final").unwrap();
    session.doc.set_attribute(p, "title", "t").unwrap();
    session.flush();

    let mutations = session.take_mutations();
    assert_eq!(mutations.len(), 1);
    let data = &mutations[0];
    assert!(data.texts.is_empty(), "{:?}", data.texts);
    assert!(data.attributes.is_empty(), "{:?}", data.attributes);
    assert_eq!(data.adds.len(), 2);
    let text_add = data.adds.iter().find(|a| a.parent_id == session.id_of(p)).unwrap();
    assert!(matches!(
        &text_add.node.data,
        events::SerializedData::Text { text_content, .. } if text_content == "final"
    ));
    let p_add = data.adds.iter().find(|a| a.node.id == session.id_of(p)).unwrap();
    assert_eq!(p_add.node.attributes().unwrap().get("title").map(String::as_str), Some("t"));
}

#[test]
fn text_change_on_a_moved_node_is_still_reported() {
    let mut session = Session::start(r#"<div id="a"><span id="s">x</span></div><div id="b"></div>"#);
    session.take();
    let span = session.by_id("s");
    let b = session.by_id("b");
    let text = session.doc.children(span)[0];
    session.doc.append_child(b, span).unwrap();
    session.doc.set_text(text, "y").unwrap();
    session.flush();

    let mutations = session.take_mutations();
    let texts = &mutations[0].texts;
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].id, session.id_of(text));
    assert_eq!(texts[0].value.as_deref(), Some("y"));
}

#[test]
fn moved_node_keeps_its_id() {
    let mut session = Session::start(r#"<div id="a"><span id="s">x</span></div><div id="b"></div>"#);
    session.take();
    let span = session.by_id("s");
    let b = session.by_id("b");
    session.doc.append_child(b, span).unwrap();
    session.flush();

    let mutations = session.take_mutations();
    assert_eq!(mutations.len(), 1);
    let data = &mutations[0];
    assert_eq!(data.removes.len(), 1);
    assert_eq!(data.removes[0].parent_id, id(2));
    assert_eq!(data.removes[0].id, id(3));
    assert_eq!(data.adds[0].parent_id, id(5));
    assert_eq!(data.adds[0].node.id, id(3));
    let text_add = data.adds.iter().find(|a| a.node.id == id(4)).unwrap();
    assert_eq!(text_add.parent_id, id(3));
}

#[test]
fn adds_are_ordered_parents_first() {
    let mut session = Session::start("<div></div>");
    session.take();
    let div = session.first("div");
    let ul = session.doc.create_element("ul");
    let items: Vec<_> = (0..4).map(|_| session.doc.create_element("li")).collect();
    for &li in &items {
        session.doc.append_child(ul, li).unwrap();
    }
    session.doc.append_child(div, ul).unwrap();
    session.flush();

    let mutations = session.take_mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].adds.len(), 5);
    assert_ordered(&mutations[0], &[id(1), id(2)]);
    for &li in &items {
        assert!(session.recorder.mirror().has(session.id_of(li)));
    }
}

fn assert_ordered(data: &MutationData, existing: &[core_types::Id]) {
    let mut known: HashSet<_> = existing.iter().copied().collect();
    for add in &data.adds {
        assert!(known.contains(&add.parent_id), "parent {} not placed before {}", add.parent_id, add.node.id);
        if let Some(next) = add.next_id {
            assert!(known.contains(&next), "next {next} not placed before {}", add.node.id);
        }
        known.insert(add.node.id);
    }
}

#[test]
fn shadow_children_are_attached_to_the_host() {
    let mut session = Session::start(r#"<div id="host"></div>"#);
    session.take();
    let host = session.by_id("host");
    let shadow = session.doc.attach_shadow(host).unwrap();
    let span = session.doc.create_element("span");
    session.doc.append_child(shadow, span).unwrap();
    session.flush();

    let mutations = session.take_mutations();
    let add = &mutations[0].adds[0];
    assert_eq!(add.parent_id, id(2));
    assert!(add.node.is_shadow);
}

#[test]
fn changes_inside_blocked_subtree_are_skipped() {
    let mut session = Session::start(r#"<div class="rr-block"><p>x</p></div>"#);
    session.take();
    let div = session.first("div");
    let span = session.doc.create_element("span");
    session.doc.append_child(div, span).unwrap();
    session.flush();

    assert!(session.take().is_empty());
}
