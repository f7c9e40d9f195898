#![allow(dead_code)]

use core_types::{Id, ManualClock};
use dom::{Document, NodeKey, parse_document};
use events::{Event, EventData, IncrementalData, MutationData};
use record::{RecordOptions, Recorder};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub type Sink = Rc<RefCell<Vec<(Event, bool)>>>;

pub struct Session {
    pub doc: Document,
    pub recorder: Recorder<ManualClock>,
    pub clock: ManualClock,
    pub sink: Sink,
}

impl Session {
    pub fn start(markup: &str) -> Self {
        Self::start_with(markup, RecordOptions::default())
    }

    pub fn start_with(markup: &str, options: RecordOptions) -> Self {
        let mut doc = parse_document(markup);
        let clock = ManualClock::new(Duration::from_millis(1_000));
        let sink: Sink = Rc::default();
        let events = Rc::clone(&sink);
        let mut recorder = Recorder::new(options, clock.clone(), move |event, checkout| {
            events.borrow_mut().push((event, checkout));
        });
        recorder.start(&mut doc);
        Self {
            doc,
            recorder,
            clock,
            sink,
        }
    }

    pub fn flush(&mut self) {
        self.recorder.flush(&mut self.doc);
    }

    /// Drains everything emitted so far.
    pub fn take(&self) -> Vec<Event> {
        self.sink.borrow_mut().drain(..).map(|(event, _)| event).collect()
    }

    pub fn take_mutations(&self) -> Vec<MutationData> {
        self.take()
            .into_iter()
            .filter_map(|event| match event.data {
                EventData::IncrementalSnapshot(IncrementalData::Mutation(data)) => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn by_id(&self, id: &str) -> NodeKey {
        self.doc
            .descendants(self.doc.root())
            .find(|&k| self.doc.attribute(k, "id") == Some(id))
            .unwrap_or_else(|| panic!("no element with id {id}"))
    }

    pub fn first(&self, tag: &str) -> NodeKey {
        self.doc
            .descendants(self.doc.root())
            .find(|&k| self.doc.tag_name(k) == Some(tag))
            .unwrap_or_else(|| panic!("no <{tag}>"))
    }

    pub fn id_of(&self, node: NodeKey) -> Id {
        self.recorder.mirror().get_id(node)
    }
}

pub fn id(raw: i64) -> Id {
    Id::from_raw(raw)
}
