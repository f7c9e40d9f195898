use core_types::{Id, IdGenerator};
use dom::{Document, NodeKey, Rect, ScrollOffset, parse_document};
use events::{SerializedData, SerializedNode};
use serde_json::json;
use snapshot::{
    Mirror, PendingLoads, SCRIPT_PLACEHOLDER, SerializeContext, SerializeFlags, SerializeObserver,
    SerializeOptions, SlimDomOptions, snapshot,
};
use std::time::Duration;
use url::Url;

fn by_id(doc: &Document, id: &str) -> NodeKey {
    doc.descendants(doc.root())
        .find(|&k| doc.attribute(k, "id") == Some(id))
        .unwrap_or_else(|| panic!("no element with id {id}"))
}

fn take(doc: &Document, options: &SerializeOptions) -> (SerializedNode, Mirror) {
    let mut mirror = Mirror::new();
    let mut ids = IdGenerator::new();
    let node = snapshot(doc, &mut mirror, &mut ids, options).expect("document serializes");
    (node, mirror)
}

fn find_tag<'a>(node: &'a SerializedNode, tag: &str) -> &'a SerializedNode {
    let mut found = None;
    node.walk(&mut |n| {
        if found.is_none() && n.tag_name() == Some(tag) {
            found = Some(n);
        }
    });
    found.unwrap_or_else(|| panic!("no <{tag}> in snapshot"))
}

#[test]
fn ids_follow_pre_order() {
    let doc = parse_document("<div><span>hi</span></div>");
    let (node, mirror) = take(&doc, &SerializeOptions::default());
    assert_eq!(
        serde_json::to_value(&node).unwrap(),
        json!({
            "id": 1, "type": 0,
            "childNodes": [{
                "id": 2, "type": 2, "tagName": "div", "attributes": {},
                "childNodes": [{
                    "id": 3, "type": 2, "tagName": "span", "attributes": {},
                    "childNodes": [{"id": 4, "type": 3, "textContent": "hi"}]
                }]
            }]
        })
    );
    assert_eq!(mirror.len(), 4);
    assert_eq!(mirror.get_id(doc.root()), Id::FIRST);
}

#[test]
fn serializing_twice_keeps_ids() {
    let doc = parse_document("<ul><li>a</li><li>b</li></ul>");
    let options = SerializeOptions::default();
    let mut mirror = Mirror::new();
    let mut ids = IdGenerator::new();
    let first = snapshot(&doc, &mut mirror, &mut ids, &options).unwrap();
    let second = snapshot(&doc, &mut mirror, &mut ids, &options).unwrap();
    assert_eq!(first, second);
    assert_eq!(ids.peek(), Id::from_raw(7));
}

#[test]
fn blocked_elements_become_sized_placeholders() {
    let mut doc = parse_document(
        r#"<div id="card" class="rr-block wide" title="secret"><p>hidden</p></div>"#,
    );
    let card = by_id(&doc, "card");
    doc.set_rect(card, Rect { width: 120.0, height: 40.5 }).unwrap();
    let (node, _) = take(&doc, &SerializeOptions::default());
    let card = find_tag(&node, "div");
    assert!(card.child_nodes.is_empty());
    assert_eq!(
        serde_json::to_value(card.attributes().unwrap()).unwrap(),
        json!({"class": "rr-block wide", "rr_width": "120px", "rr_height": "40.5px"})
    );
}

#[test]
fn masked_text_and_inputs() {
    let mut doc = parse_document(
        r#"<p class="rr-mask">card 1234</p><input id="pw" type="password"><input id="name" type="text"><input id="ok" type="checkbox">"#,
    );
    let pw = by_id(&doc, "pw");
    doc.set_value(pw, "hunter2").unwrap();
    let name = by_id(&doc, "name");
    doc.set_value(name, "ada").unwrap();
    let ok = by_id(&doc, "ok");
    doc.set_checked(ok, true).unwrap();

    let (node, _) = take(&doc, &SerializeOptions::default());
    let p = find_tag(&node, "p");
    assert!(matches!(
        &p.child_nodes[0].data,
        SerializedData::Text { text_content, .. } if text_content == "**** ****"
    ));
    let inputs: Vec<_> = node
        .child_nodes
        .iter()
        .filter(|n| n.tag_name() == Some("input"))
        .map(|n| n.attributes().unwrap().clone())
        .collect();
    assert_eq!(inputs[0].get("value").map(String::as_str), Some("*******"));
    assert_eq!(inputs[1].get("value").map(String::as_str), Some("ada"));
    assert_eq!(inputs[2].get("checked").map(String::as_str), Some(""));
}

#[test]
fn scripts_styles_and_urls() {
    let mut doc = parse_document(
        r#"<head><style>body { background: url(bg.png) }</style><link id="l" rel="stylesheet" href="css/site.css"><script>alert(1)</script></head><body><img src="a.png"><a href="/x">x</a></body>"#,
    );
    let link = by_id(&doc, "l");
    doc.set_sheet(link, ".a { background: url(../img/b.png) }").unwrap();
    let options = SerializeOptions::default()
        .with_base_url(Url::parse("https://example.com/app/page.html").unwrap());
    let (node, _) = take(&doc, &options);

    let style_text = &find_tag(&node, "style").child_nodes[0];
    assert_eq!(
        style_text.data,
        SerializedData::Text {
            text_content: "body { background: url(https://example.com/app/bg.png) }".into(),
            is_style: true,
        }
    );
    let link = find_tag(&node, "link").attributes().unwrap();
    assert_eq!(link.get("rel"), None);
    assert_eq!(link.get("href"), None);
    assert_eq!(
        link.get("_cssText").map(String::as_str),
        Some(".a { background: url(https://example.com/app/img/b.png) }")
    );
    assert!(matches!(
        &find_tag(&node, "script").child_nodes[0].data,
        SerializedData::Text { text_content, .. } if text_content == SCRIPT_PLACEHOLDER
    ));
    assert_eq!(
        find_tag(&node, "img").attributes().unwrap().get("src").map(String::as_str),
        Some("https://example.com/app/a.png")
    );
    assert_eq!(
        find_tag(&node, "a").attributes().unwrap().get("href").map(String::as_str),
        Some("https://example.com/x")
    );
}

#[test]
fn slim_dom_and_whitespace_are_ignored() {
    let doc = parse_document(
        "<head>\n  <meta name=\"robots\" content=\"none\">\n  <title>t</title>\n</head><body><!-- c --><p> </p></body>",
    );
    let options = SerializeOptions {
        slim_dom: SlimDomOptions::all(),
        ..SerializeOptions::default()
    };
    let (node, mirror) = take(&doc, &options);
    let head = find_tag(&node, "head");
    assert_eq!(
        head.child_nodes.iter().map(|n| n.tag_name()).collect::<Vec<_>>(),
        vec![Some("title")]
    );
    let body = find_tag(&node, "body");
    let p = &body.child_nodes[0];
    assert_eq!(p.tag_name(), Some("p"));
    // Whitespace is only dropped inside <head>.
    assert_eq!(p.child_nodes.len(), 1);

    let comment = doc
        .descendants(doc.root())
        .find(|&k| doc.kind(k) == Some(dom::NodeKind::Comment))
        .unwrap();
    assert_eq!(mirror.get_id(comment), Id::IGNORED);
}

#[test]
fn shadow_roots_are_flagged() {
    let mut doc = parse_document(r#"<div id="host"><p>light</p></div>"#);
    let host = by_id(&doc, "host");
    let shadow = doc.attach_shadow(host).unwrap();
    let inner = doc.create_element("slot");
    doc.append_child(shadow, inner).unwrap();

    let (node, _) = take(&doc, &SerializeOptions::default());
    let host = find_tag(&node, "div");
    assert!(matches!(
        host.data,
        SerializedData::Element { is_shadow_host: true, .. }
    ));
    assert!(!host.child_nodes[0].is_shadow);
    assert_eq!(host.child_nodes[1].tag_name(), Some("slot"));
    assert!(host.child_nodes[1].is_shadow);
}

#[test]
fn scroll_offsets_and_svg() {
    let mut doc = parse_document(r#"<div id="d"></div><svg><circle r="1"></circle></svg>"#);
    let d = by_id(&doc, "d");
    doc.set_scroll(d, ScrollOffset { left: 0.0, top: 30.0 }).unwrap();
    let (node, _) = take(&doc, &SerializeOptions::default());
    let div = find_tag(&node, "div").attributes().unwrap();
    assert_eq!(div.get("rr_scrollTop").map(String::as_str), Some("30"));
    assert_eq!(div.get("rr_scrollLeft"), None);
    assert!(matches!(
        find_tag(&node, "circle").data,
        SerializedData::Element { is_svg: true, .. }
    ));
}

#[derive(Default)]
struct Loads {
    serialized: usize,
    iframes: Vec<(NodeKey, SerializedNode)>,
    sheets: Vec<(NodeKey, SerializedNode)>,
}

impl SerializeObserver for Loads {
    fn on_serialize(&mut self, _node: NodeKey) {
        self.serialized += 1;
    }

    fn on_iframe_load(&mut self, frame: NodeKey, document: SerializedNode) {
        self.iframes.push((frame, document));
    }

    fn on_stylesheet_load(&mut self, link: NodeKey, link_node: SerializedNode) {
        self.sheets.push((link, link_node));
    }
}

#[test]
fn iframe_content_arrives_later_with_root_id() {
    let mut doc = parse_document(
        r#"<iframe id="f" src="https://other.test/"></iframe><link id="l" rel="stylesheet" href="https://cdn.test/a.css">"#,
    );
    let frame = by_id(&doc, "f");
    let link = by_id(&doc, "l");
    let options = SerializeOptions::default();
    let mut mirror = Mirror::new();
    let mut ids = IdGenerator::new();
    let mut pending = PendingLoads::new();
    let mut loads = Loads::default();

    let root = {
        let mut ctx = SerializeContext::new(&doc, &mut mirror, &mut ids, &options)
            .with_pending(&mut pending, Duration::ZERO)
            .with_observer(&mut loads);
        ctx.serialize_node_with_id(doc.root(), SerializeFlags::full_tree(&options))
            .unwrap()
    };
    let iframe = find_tag(&root, "iframe").attributes().unwrap();
    assert_eq!(iframe.get("src"), None);
    assert_eq!(iframe.get("rr_src").map(String::as_str), Some("https://other.test/"));
    assert_eq!(pending.len(), 2);
    assert_eq!(loads.serialized, 3);

    let inner = doc.create_document();
    let body = doc.create_element("body");
    doc.append_child(inner, body).unwrap();
    doc.set_content_document(frame, inner).unwrap();
    doc.mark_loaded(frame).unwrap();
    doc.set_sheet(link, "p { margin: 0 }").unwrap();

    let resolved = SerializeContext::new(&doc, &mut mirror, &mut ids, &options)
        .with_pending(&mut pending, Duration::from_millis(10))
        .with_observer(&mut loads)
        .resolve_pending();
    assert_eq!(resolved, 2);
    assert!(pending.is_empty());

    let (loaded_frame, content) = &loads.iframes[0];
    assert_eq!(*loaded_frame, frame);
    assert_eq!(content.id, Id::from_raw(4));
    assert_eq!(content.child_nodes[0].root_id, Some(Id::from_raw(4)));

    let (_, link_node) = &loads.sheets[0];
    assert_eq!(link_node.id, mirror.get_id(link));
    assert_eq!(
        link_node.attributes().unwrap().get("_cssText").map(String::as_str),
        Some("p { margin: 0 }")
    );
}

#[test]
fn iframe_src_kept_when_allowed() {
    let doc = parse_document(r#"<iframe src="https://ok.test/"></iframe>"#);
    let options = SerializeOptions::default().with_keep_iframe_src_fn(|src| src.contains("ok.test"));
    let (node, _) = take(&doc, &options);
    assert_eq!(
        find_tag(&node, "iframe").attributes().unwrap().get("src").map(String::as_str),
        Some("https://ok.test/")
    );
}
