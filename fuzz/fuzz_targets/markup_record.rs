#![no_main]

use core_types::ManualClock;
use events::Event;
use libfuzzer_sys::fuzz_target;
use record::{RecordOptions, Recorder};
use replay::{Replayer, ReplayerConfig};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

// Any markup recorded into a session must replay, and every node the
// recorder assigned an id must be rebuilt.
fuzz_target!(|data: &[u8]| {
    let Ok(markup) = std::str::from_utf8(data) else {
        return;
    };
    let mut doc = dom::parse_document(markup);
    let events: Rc<RefCell<Vec<Event>>> = Rc::default();
    let sink = Rc::clone(&events);
    let mut recorder = Recorder::new(
        RecordOptions::default(),
        ManualClock::new(Duration::from_secs(1)),
        move |event, _| sink.borrow_mut().push(event),
    );
    recorder.start(&mut doc);
    let events = events.take();

    let mut player = Replayer::new(events, ReplayerConfig::default(), ManualClock::new(Duration::ZERO));
    player.play(0).expect("recorded session should replay");
    let tree = player.tree().expect("recorded session has a snapshot");
    // Link sheets are inlined and frames are attached later, so those
    // documents map a different number of nodes.
    if !markup.contains("<link") && !markup.contains("<iframe") {
        assert_eq!(tree.mirror().len(), recorder.mirror().len());
    }
});
