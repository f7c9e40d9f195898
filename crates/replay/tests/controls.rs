use core_types::ManualClock;
use dom::parse_document;
use events::{CustomData, Event, EventData};
use record::{RecordOptions, Recorder};
use replay::{PlayerStatus, Replayer, ReplayerConfig};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// A snapshot at 1000ms followed by one mutation every 10ms.
fn recorded(steps: usize) -> Vec<Event> {
    let mut doc = parse_document(r#"<ul id="list"></ul>"#);
    let clock = ManualClock::new(Duration::from_millis(1_000));
    let events: Rc<RefCell<Vec<Event>>> = Rc::default();
    let sink = Rc::clone(&events);
    let mut recorder = Recorder::new(RecordOptions::default(), clock.clone(), move |event, _| {
        sink.borrow_mut().push(event);
    });
    recorder.start(&mut doc);
    let list = doc
        .descendants(doc.root())
        .find(|&k| doc.attribute(k, "id") == Some("list"))
        .unwrap();
    for step in 0..steps {
        clock.advance(Duration::from_millis(10));
        let li = doc.create_element("li");
        let text = doc.create_text(&step.to_string());
        doc.append_child(li, text).unwrap();
        doc.append_child(list, li).unwrap();
        recorder.flush(&mut doc);
    }
    events.take()
}

fn items(player: &Replayer<ManualClock>) -> usize {
    let tree = player.tree().unwrap();
    let doc = tree.doc();
    doc.descendants(tree.root())
        .filter(|&k| doc.tag_name(k) == Some("li"))
        .count()
}

fn custom(tag: &str, timestamp: i64) -> Event {
    Event::new(
        EventData::Custom(CustomData {
            tag: tag.into(),
            payload: serde_json::json!({ "at": timestamp }),
        }),
        timestamp,
    )
}

fn player(events: Vec<Event>, config: ReplayerConfig) -> (Replayer<ManualClock>, ManualClock) {
    let clock = ManualClock::new(Duration::ZERO);
    (Replayer::new(events, config, clock.clone()), clock)
}

#[test]
fn ticking_applies_events_as_they_become_due() {
    let (mut player, clock) = player(recorded(3), ReplayerConfig::default());
    player.play(0).unwrap();
    assert_eq!(player.status(), PlayerStatus::Playing);
    assert_eq!(items(&player), 0);

    clock.advance(Duration::from_millis(15));
    player.tick().unwrap();
    assert_eq!(items(&player), 1);

    clock.advance(Duration::from_millis(15));
    player.tick().unwrap();
    assert_eq!(items(&player), 3);
    assert_eq!(player.status(), PlayerStatus::Finished);
    assert_eq!(player.current_time(), 30);
}

#[test]
fn pause_holds_the_position() {
    let (mut player, clock) = player(recorded(3), ReplayerConfig::default());
    player.play(0).unwrap();
    clock.advance(Duration::from_millis(12));
    player.tick().unwrap();
    player.pause().unwrap();
    assert_eq!(player.status(), PlayerStatus::Paused);

    clock.advance(Duration::from_secs(5));
    assert_eq!(player.tick().unwrap(), 0);
    assert_eq!(player.current_time(), 12);
    assert_eq!(items(&player), 1);

    player.resume(None).unwrap();
    assert_eq!(player.status(), PlayerStatus::Playing);
    clock.advance(Duration::from_millis(8));
    player.tick().unwrap();
    assert_eq!(items(&player), 2);
}

#[test]
fn seek_while_paused_stays_paused() {
    let (mut player, clock) = player(recorded(4), ReplayerConfig::default());
    player.play(0).unwrap();
    player.pause().unwrap();
    player.seek(25).unwrap();
    assert_eq!(player.status(), PlayerStatus::Paused);
    assert_eq!(items(&player), 2);
    assert_eq!(player.current_time(), 25);

    clock.advance(Duration::from_secs(1));
    player.tick().unwrap();
    assert_eq!(items(&player), 2);

    player.seek(5).unwrap();
    assert_eq!(items(&player), 0);
}

#[test]
fn seek_while_playing_keeps_playing() {
    let (mut player, clock) = player(recorded(4), ReplayerConfig::default());
    player.play(0).unwrap();
    player.seek(15).unwrap();
    assert_eq!(player.status(), PlayerStatus::Playing);
    assert_eq!(items(&player), 1);
    clock.advance(Duration::from_millis(10));
    player.tick().unwrap();
    assert_eq!(items(&player), 2);
}

#[test]
fn speed_scales_playback() {
    let (mut player, clock) = player(recorded(4), ReplayerConfig::default());
    player.play(0).unwrap();
    player.set_speed(2.0);
    clock.advance(Duration::from_millis(10));
    player.tick().unwrap();
    assert_eq!(player.current_time(), 20);
    assert_eq!(items(&player), 2);
}

#[test]
fn playing_past_the_end_finishes_at_once() {
    let (mut player, _) = player(recorded(2), ReplayerConfig::default());
    player.play(1_000).unwrap();
    assert_eq!(player.status(), PlayerStatus::Finished);
    assert_eq!(items(&player), 2);
    assert_eq!(player.current_time(), 1_000);
}

#[test]
fn hook_sees_every_applied_event_in_order() {
    let mut events = recorded(2);
    events.push(custom("checkpoint", 1_015));
    let (mut player, clock) = player(events, ReplayerConfig::default());
    let seen: Rc<RefCell<Vec<(String, i64)>>> = Rc::default();
    let log = Rc::clone(&seen);
    player.set_on_event(move |event| {
        log.borrow_mut().push((event.data.name().to_string(), event.timestamp));
    });
    player.play(0).unwrap();
    clock.advance(Duration::from_millis(20));
    player.tick().unwrap();

    let seen = seen.borrow();
    let timestamps: Vec<i64> = seen.iter().map(|(_, ts)| *ts).collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    assert!(seen.contains(&("Custom".to_string(), 1_015)));
    assert_eq!(seen.last().map(|(_, ts)| *ts), Some(1_020));
}

#[test]
fn live_mode_waits_for_added_events() {
    let config = ReplayerConfig {
        live_mode: true,
        ..ReplayerConfig::default()
    };
    let (mut player, clock) = player(recorded(1), config);
    let tags: Rc<RefCell<Vec<String>>> = Rc::default();
    let log = Rc::clone(&tags);
    player.set_on_event(move |event| {
        if let EventData::Custom(data) = &event.data {
            log.borrow_mut().push(data.tag.clone());
        }
    });
    player.play(0).unwrap();
    assert_eq!(player.status(), PlayerStatus::Live);

    clock.advance(Duration::from_millis(50));
    player.tick().unwrap();
    assert_eq!(player.status(), PlayerStatus::Live);

    // Already behind the playback position: applied immediately.
    player.add_event(custom("late", 1_030)).unwrap();
    assert_eq!(*tags.borrow(), vec!["late".to_string()]);

    player.add_event(custom("soon", 1_080)).unwrap();
    assert_eq!(tags.borrow().len(), 1);
    clock.advance(Duration::from_millis(30));
    player.tick().unwrap();
    assert_eq!(*tags.borrow(), vec!["late".to_string(), "soon".to_string()]);
    assert_eq!(player.len(), 5);
}

#[test]
fn meta_data_spans_the_session() {
    let (player, _) = player(recorded(3), ReplayerConfig::default());
    let meta = player.meta_data().unwrap();
    assert_eq!(meta.start_time, 1_000);
    assert_eq!(meta.end_time, 1_030);
    assert_eq!(meta.total_time, 30);
}

#[test]
fn numeric_session_json_replays() {
    let input = r#"{"events": [
        {"type": 4, "data": {"href": "https://a.test/", "width": 1024, "height": 768}, "timestamp": 100},
        {"type": 2, "data": {"node": {"type": 0, "id": 1, "childNodes": [
            {"type": 2, "tagName": "html", "attributes": {}, "id": 2, "childNodes": [
                {"type": 2, "tagName": "body", "attributes": {"hidden": true}, "id": 3}
            ]}
        ]}, "initialOffset": {"top": 0, "left": 0}}, "timestamp": 100},
        {"type": 3, "data": {"source": 0, "texts": [], "attributes": [], "removes": [],
         "adds": [{"parentId": 3, "nextId": null, "node": {"type": 3, "textContent": "hello", "id": 4}}]},
         "timestamp": 110},
        {"type": 3, "data": {"source": 6, "positions": [{"x": 5, "y": 6, "id": 3, "timeOffset": 0}]}, "timestamp": 120},
        {"type": 3, "data": {"source": 12, "positions": [{"x": 7, "y": 8, "id": 4, "timeOffset": 0}]}, "timestamp": 130}
    ]}"#;
    let mut player = Replayer::from_json(input, ReplayerConfig::default(), ManualClock::new(Duration::ZERO)).unwrap();
    let total = player.meta_data().unwrap().total_time;
    assert_eq!(total, 30);
    player.play(total).unwrap();
    assert_eq!(player.status(), PlayerStatus::Finished);

    let state = player.state();
    assert_eq!(state.viewport.width, 1024);
    let pointer = state.pointer.unwrap();
    assert_eq!((pointer.x, pointer.y), (7.0, 8.0));
    let tree = player.tree().unwrap();
    let body = tree.node(core_types::Id::from_raw(3)).unwrap();
    assert_eq!(tree.doc().attribute(body, "hidden"), Some(""));
    let text = tree.node(core_types::Id::from_raw(4)).unwrap();
    assert_eq!(tree.doc().text(text), Some("hello"));
}
