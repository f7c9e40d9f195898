//! Playback of a recorded session.
//!
//! The replayer keeps every event it has been given, sorted by timestamp.
//! Starting playback at an offset first applies, synchronously, everything
//! from the last full snapshot at or before that offset; the remaining
//! events are handed to the [`Timer`] with delays relative to the offset and
//! applied as [`Replayer::tick`] finds them due.

use crate::config::ReplayerConfig;
use crate::error::ReplayError;
use crate::export::export;
use crate::reconcile::{ReconcileStats, reconcile};
use crate::state::ReplayState;
use crate::timer::{Action, Timer, TimerState};
use crate::tree::ReplayTree;
use core_types::{Clock, SystemClock};
use events::{Event, EventData, IncrementalData, Session};
use std::time::Duration;

pub type EventHook = Box<dyn FnMut(&Event)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerStatus {
    Paused,
    Playing,
    /// Playing and waiting for events added while running.
    Live,
    /// Every scheduled event has been applied.
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackMeta {
    pub start_time: i64,
    pub end_time: i64,
    pub total_time: i64,
}

/// An inactive stretch being fast-forwarded.
#[derive(Clone, Copy, Debug)]
struct Skip {
    until: i64,
    restore_speed: f64,
}

pub struct Replayer<C: Clock = SystemClock> {
    config: ReplayerConfig,
    clock: C,
    /// Append-only; scheduled actions refer to events by index here.
    events: Vec<Event>,
    /// Indices into `events`, ordered by timestamp.
    order: Vec<usize>,
    timer: Timer<usize>,
    tree: Option<ReplayTree>,
    state: ReplayState,
    status: PlayerStatus,
    /// Playback offset the timer's elapsed time counts from.
    start_offset: i64,
    skip: Option<Skip>,
    last_reconcile: Option<ReconcileStats>,
    on_event: Option<EventHook>,
}

impl<C: Clock> Replayer<C> {
    pub fn new(events: Vec<Event>, config: ReplayerConfig, clock: C) -> Self {
        let mut timer = Timer::new(config.speed);
        timer.set_live_mode(config.live_mode);
        let mut replayer = Self {
            config,
            clock,
            events: Vec::with_capacity(events.len()),
            order: Vec::with_capacity(events.len()),
            timer,
            tree: None,
            state: ReplayState::default(),
            status: PlayerStatus::Paused,
            start_offset: 0,
            skip: None,
            last_reconcile: None,
            on_event: None,
        };
        for event in events {
            replayer.insert_event(event);
        }
        replayer
    }

    pub fn from_json(input: &str, config: ReplayerConfig, clock: C) -> Result<Self, ReplayError> {
        let session: Session = serde_json::from_str(input)?;
        Ok(Self::new(session.events, config, clock))
    }

    /// Called with every event as it is applied, including custom and
    /// plugin events that have no effect on the tree.
    pub fn set_on_event(&mut self, hook: impl FnMut(&Event) + 'static) {
        self.on_event = Some(Box::new(hook));
    }

    pub fn config(&self) -> &ReplayerConfig {
        &self.config
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn tree(&self) -> Option<&ReplayTree> {
        self.tree.as_ref()
    }

    pub fn state(&self) -> &ReplayState {
        &self.state
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in playback order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.order.iter().map(|&i| &self.events[i])
    }

    /// Counters of the last in-place reconciliation, when one ran.
    pub fn last_reconcile(&self) -> Option<ReconcileStats> {
        self.last_reconcile
    }

    pub fn meta_data(&self) -> Result<PlaybackMeta, ReplayError> {
        let first = self.order.first().ok_or(ReplayError::NoEvents)?;
        let last = self.order.last().ok_or(ReplayError::NoEvents)?;
        let start_time = self.events[*first].timestamp;
        let end_time = self.events[*last].timestamp;
        Ok(PlaybackMeta {
            start_time,
            end_time,
            total_time: end_time.saturating_sub(start_time),
        })
    }

    /// Playback position in milliseconds from the first event.
    pub fn current_time(&self) -> i64 {
        let elapsed = self.timer.elapsed_at(self.clock.now());
        let elapsed = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
        let position = self.start_offset.saturating_add(elapsed);
        match (self.status, self.meta_data()) {
            (PlayerStatus::Finished, Ok(meta)) => position.max(meta.total_time),
            _ => position,
        }
    }

    /// Starts playing from `offset` milliseconds after the first event.
    pub fn play(&mut self, offset: i64) -> Result<(), ReplayError> {
        self.start_at(offset)?;
        self.status = if self.config.live_mode {
            PlayerStatus::Live
        } else if self.timer.is_empty() {
            PlayerStatus::Finished
        } else {
            PlayerStatus::Playing
        };
        if self.status == PlayerStatus::Finished {
            self.timer.clear();
        }
        log::debug!(target: "replay.player", "play from {offset}ms, {} events scheduled", self.timer.len());
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), ReplayError> {
        if self.events.is_empty() {
            return Err(ReplayError::NoEvents);
        }
        self.timer.pause(self.clock.now());
        if matches!(self.status, PlayerStatus::Playing | PlayerStatus::Live) {
            self.status = PlayerStatus::Paused;
        }
        Ok(())
    }

    /// Continues where playback paused, or restarts from `offset` when one
    /// is given.
    pub fn resume(&mut self, offset: Option<i64>) -> Result<(), ReplayError> {
        if self.events.is_empty() {
            return Err(ReplayError::NoEvents);
        }
        match offset {
            Some(offset) => self.play(offset),
            None if self.timer.state() == TimerState::Paused => {
                self.timer.resume(self.clock.now());
                self.status = if self.config.live_mode {
                    PlayerStatus::Live
                } else {
                    PlayerStatus::Playing
                };
                Ok(())
            }
            None => {
                let position = self.current_time();
                self.play(position)
            }
        }
    }

    /// Moves to `offset` and keeps the current play/pause status.
    pub fn seek(&mut self, offset: i64) -> Result<(), ReplayError> {
        let was_running = matches!(self.status, PlayerStatus::Playing | PlayerStatus::Live);
        self.play(offset)?;
        if !was_running && self.status != PlayerStatus::Finished {
            self.pause()?;
        }
        Ok(())
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.config.speed = speed;
        match &mut self.skip {
            Some(skip) => skip.restore_speed = speed,
            None => self.timer.set_speed(speed, self.clock.now()),
        }
    }

    pub fn set_config(&mut self, config: ReplayerConfig) {
        let speed = config.speed;
        self.timer.set_live_mode(config.live_mode);
        if let Some(tree) = &mut self.tree {
            tree.set_pending_timeout(config.pending_add_timeout);
        }
        if !config.skip_inactive {
            self.skip = None;
        }
        self.config = config;
        self.set_speed(speed);
    }

    /// Adds an event, typically while playing live. An event at or before
    /// the current position is applied at once; a later one is scheduled.
    pub fn add_event(&mut self, event: Event) -> Result<(), ReplayError> {
        let running = matches!(self.status, PlayerStatus::Playing | PlayerStatus::Live);
        let start = self.base_time().saturating_add(self.start_offset);
        let position = self.base_time().saturating_add(self.current_time());
        let timestamp = event.timestamp;
        let index = self.insert_event(event);
        if !running {
            return Ok(());
        }
        if timestamp <= position {
            self.apply_event(index, false)
        } else {
            let delay = Duration::from_millis(timestamp.saturating_sub(start).max(0) as u64);
            self.timer.add_action(Action::new(delay, index));
            Ok(())
        }
    }

    /// Applies every event that has become due. Returns how many were
    /// applied.
    pub fn tick(&mut self) -> Result<usize, ReplayError> {
        if !matches!(self.status, PlayerStatus::Playing | PlayerStatus::Live) {
            return Ok(0);
        }
        let now = self.clock.now();
        if let Some(tree) = &mut self.tree {
            tree.expire_pending(now);
        }
        let due = self.timer.tick(now);
        for &index in &due {
            self.apply_event(index, false)?;
            self.update_skip(index);
        }
        if self.timer.state() == TimerState::Stopped {
            self.status = PlayerStatus::Finished;
            self.restore_speed();
            log::debug!(target: "replay.player", "finished at {}ms", self.current_time());
        }
        Ok(due.len())
    }

    fn base_time(&self) -> i64 {
        self.order
            .first()
            .map_or(0, |&i| self.events[i].timestamp)
    }

    /// Stores `event` and places it after every event with the same or an
    /// earlier timestamp. Returns its storage index.
    fn insert_event(&mut self, event: Event) -> usize {
        let timestamp = event.timestamp;
        let index = self.events.len();
        self.events.push(event);
        let events = &self.events;
        let at = self.order.partition_point(|&i| events[i].timestamp <= timestamp);
        self.order.insert(at, index);
        index
    }

    fn start_at(&mut self, offset: i64) -> Result<(), ReplayError> {
        if self.events.is_empty() {
            return Err(ReplayError::NoEvents);
        }
        let offset = offset.max(0);
        self.timer.clear();
        self.timer.set_live_mode(self.config.live_mode);
        self.timer.set_speed(self.config.speed, self.clock.now());
        self.skip = None;
        self.last_reconcile = None;

        let target = self.base_time().saturating_add(offset);
        let order = self.order.clone();
        let split = order.partition_point(|&i| self.events[i].timestamp <= target);
        let (past, future) = order.split_at(split);

        let checkpoint = past
            .iter()
            .rposition(|&i| self.events[i].is_full_snapshot());
        let previous = self.tree.take();
        self.state = ReplayState::default();
        let sync_from = match checkpoint {
            Some(position) => {
                let meta = past[..position]
                    .iter()
                    .rev()
                    .find(|&&i| matches!(self.events[i].data, EventData::Meta(_)));
                if let Some(&meta) = meta {
                    self.apply_event(meta, true)?;
                }
                position
            }
            None => 0,
        };
        for &index in &past[sync_from..] {
            if let Err(err) = self.apply_event(index, true) {
                self.tree = previous;
                return Err(err);
            }
        }

        if self.config.reconcile_checkpoints {
            self.reconcile_into(previous);
        }

        for &index in future {
            let delay = self.events[index].timestamp.saturating_sub(target).max(0);
            self.timer
                .add_action(Action::new(Duration::from_millis(delay as u64), index));
        }
        self.start_offset = offset;
        self.timer.start(self.clock.now());
        if let Some(&last) = past.last() {
            self.update_skip(last);
        }
        Ok(())
    }

    /// Patches `previous`, the tree that was visible before a seek, into the
    /// state just built, and keeps it as the visible tree. Skipped when the
    /// two trees do not share a root, as after a checkout.
    fn reconcile_into(&mut self, previous: Option<ReplayTree>) {
        let (Some(mut visible), Some(built)) = (previous, self.tree.as_ref()) else {
            return;
        };
        let Some(target) = export(built.doc(), built.mirror(), built.root()) else {
            return;
        };
        let root = visible.root();
        if visible.mirror().get_id(root) != target.id {
            log::debug!(target: "replay.reconcile", "root changed, replacing the tree");
            return;
        }
        let mut stats = ReconcileStats::default();
        let (doc, mirror) = visible.parts_mut();
        reconcile(doc, mirror, root, &target, &mut stats);
        log::debug!(target: "replay.reconcile", "{stats:?}");
        visible.set_pending_timeout(self.config.pending_add_timeout);
        self.last_reconcile = Some(stats);
        self.tree = Some(visible);
    }

    /// Called after each applied event. A raised speed lasts until the next
    /// user interaction is reached, and that interaction, like any other
    /// event outside a skip, may start the next one.
    fn update_skip(&mut self, index: usize) {
        if !self.config.skip_inactive {
            return;
        }
        let timestamp = self.events[index].timestamp;
        if let Some(skip) = self.skip {
            if timestamp < skip.until {
                return;
            }
            self.restore_speed();
        }
        let position = self.order.iter().position(|&i| i == index);
        let next = position.and_then(|p| {
            self.order[p + 1..]
                .iter()
                .map(|&i| &self.events[i])
                .find(|e| e.is_user_interaction() && e.timestamp > timestamp)
                .map(|e| e.timestamp)
        });
        let Some(next) = next else {
            return;
        };
        let gap = Duration::from_millis(next.saturating_sub(timestamp).max(0) as u64);
        if gap <= self.config.inactive_threshold {
            return;
        }
        let speed = self.config.skip_speed(gap);
        log::debug!(target: "replay.player", "skipping {}ms of inactivity at {speed}x", gap.as_millis());
        self.skip = Some(Skip {
            until: next,
            restore_speed: self.config.speed,
        });
        self.timer.set_speed(speed, self.clock.now());
    }

    fn restore_speed(&mut self) {
        if let Some(skip) = self.skip.take() {
            self.timer.set_speed(skip.restore_speed, self.clock.now());
        }
    }

    /// Applies one event. `sync` is set while fast-forwarding to a start
    /// offset, where an incremental event with no tree is an error rather
    /// than something to skip.
    fn apply_event(&mut self, index: usize, sync: bool) -> Result<(), ReplayError> {
        let event = &self.events[index];
        let now = self.clock.now();
        match &event.data {
            EventData::DomContentLoaded {} | EventData::Load {} => {}
            EventData::Meta(meta) => self.state.apply_meta(meta),
            EventData::FullSnapshot(data) => {
                self.tree = ReplayTree::from_snapshot(&data.node, self.config.pending_add_timeout);
                self.state.reset_for_snapshot();
                match &mut self.tree {
                    Some(tree) => {
                        let offset = data.initial_offset;
                        if offset.left != 0.0 || offset.top != 0.0 {
                            tree.apply_scroll(data.node.id, offset.left, offset.top);
                        }
                    }
                    None => log::warn!(target: "replay.player", "unusable full snapshot at {}", event.timestamp),
                }
            }
            EventData::IncrementalSnapshot(data) => {
                let Some(tree) = &mut self.tree else {
                    if sync {
                        return Err(ReplayError::NoFullSnapshot {
                            timestamp: event.timestamp,
                        });
                    }
                    log::warn!(
                        target: "replay.player",
                        "{} at {} has no tree to apply to",
                        data.source_name(),
                        event.timestamp
                    );
                    return Ok(());
                };
                match data {
                    IncrementalData::Mutation(mutation) => {
                        tree.apply_mutation(mutation, now);
                    }
                    IncrementalData::MouseMove(moves)
                    | IncrementalData::TouchMove(moves)
                    | IncrementalData::Drag(moves) => self.state.apply_mouse_move(moves),
                    IncrementalData::MouseInteraction(interaction) => self.state.apply_interaction(interaction),
                    IncrementalData::Scroll(scroll) => {
                        tree.apply_scroll(scroll.id, scroll.x, scroll.y);
                    }
                    IncrementalData::ViewportResize(size) => self.state.apply_viewport(size.width, size.height),
                    IncrementalData::Input(input) => {
                        tree.apply_input(input.id, &input.text, input.is_checked);
                    }
                    IncrementalData::MediaInteraction(media) => self.state.apply_media(media),
                    IncrementalData::StyleSheetRule(_)
                    | IncrementalData::StyleDeclaration(_)
                    | IncrementalData::AdoptedStyleSheet(_)
                    | IncrementalData::Log(_) => {
                        log::debug!(
                            target: "replay.player",
                            "{} at {} has no tree effect",
                            data.source_name(),
                            event.timestamp
                        );
                    }
                    IncrementalData::CanvasMutation(canvas) => self.state.apply_canvas(canvas),
                    IncrementalData::Font(font) => self.state.apply_font(font),
                    IncrementalData::Selection(selection) => self.state.apply_selection(&selection.ranges),
                }
            }
            EventData::Custom(_) | EventData::Plugin(_) => {}
        }
        self.state.last_timestamp = Some(event.timestamp);
        if let Some(hook) = &mut self.on_event {
            hook(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Id, ManualClock};
    use events::{
        CustomData, FullSnapshotData, InitialOffset, MetaData, MouseInteraction, MouseInteractionData,
        MutationData, SerializedData, SerializedNode,
    };

    fn snapshot(ts: i64) -> Event {
        let mut root = SerializedNode::new(Id::from_raw(1), SerializedData::Document { compat_mode: None });
        root.child_nodes.push(SerializedNode::new(
            Id::from_raw(2),
            SerializedData::Element {
                tag_name: "html".into(),
                attributes: Default::default(),
                is_svg: false,
                need_block: false,
                is_shadow_host: false,
            },
        ));
        Event::new(
            EventData::FullSnapshot(FullSnapshotData {
                node: root,
                initial_offset: InitialOffset::default(),
            }),
            ts,
        )
    }

    fn click(ts: i64) -> Event {
        Event::incremental(
            IncrementalData::MouseInteraction(MouseInteractionData {
                kind: MouseInteraction::Click,
                id: Id::from_raw(2),
                x: ts as f64,
                y: 0.0,
            }),
            ts,
        )
    }

    fn mutation(ts: i64) -> Event {
        Event::incremental(IncrementalData::Mutation(MutationData::default()), ts)
    }

    fn custom(ts: i64) -> Event {
        Event::new(
            EventData::Custom(CustomData {
                tag: "mark".into(),
                payload: serde_json::Value::Null,
            }),
            ts,
        )
    }

    fn skipping() -> ReplayerConfig {
        ReplayerConfig {
            skip_inactive: true,
            ..ReplayerConfig::default()
        }
    }

    fn meta(ts: i64) -> Event {
        Event::new(
            EventData::Meta(MetaData {
                href: "about:blank".into(),
                width: 800,
                height: 600,
            }),
            ts,
        )
    }

    fn replayer(events: Vec<Event>, config: ReplayerConfig) -> (Replayer<ManualClock>, ManualClock) {
        let clock = ManualClock::new(Duration::ZERO);
        (Replayer::new(events, config, clock.clone()), clock)
    }

    #[test]
    fn controls_need_events() {
        let (mut player, _) = replayer(Vec::new(), ReplayerConfig::default());
        assert!(matches!(player.play(0), Err(ReplayError::NoEvents)));
        assert!(matches!(player.pause(), Err(ReplayError::NoEvents)));
        assert!(matches!(player.meta_data(), Err(ReplayError::NoEvents)));
    }

    #[test]
    fn incremental_before_any_snapshot_is_an_error_when_seeking() {
        let (mut player, _) = replayer(vec![click(100), snapshot(200)], ReplayerConfig::default());
        assert!(matches!(
            player.play(50),
            Err(ReplayError::NoFullSnapshot { timestamp: 100 })
        ));
    }

    #[test]
    fn events_are_sorted_on_load() {
        let (player, _) = replayer(vec![click(300), meta(100), snapshot(100)], ReplayerConfig::default());
        let timestamps: Vec<i64> = player.events().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![100, 100, 300]);
        let meta = player.meta_data().unwrap();
        assert_eq!(meta.total_time, 200);
    }

    #[test]
    fn skip_inactive_speeds_through_gaps() {
        let config = ReplayerConfig {
            skip_inactive: true,
            ..ReplayerConfig::default()
        };
        let (mut player, clock) = replayer(
            vec![meta(0), snapshot(0), click(10), click(60_010), click(60_020)],
            config,
        );
        player.play(0).unwrap();
        clock.set(Duration::from_millis(10));
        assert_eq!(player.tick().unwrap(), 1);
        // 60s at 12x takes 5s of wall time.
        clock.set(Duration::from_millis(5_010));
        assert_eq!(player.tick().unwrap(), 1);
        assert_eq!(player.state().last_interaction.map(|i| i.x), Some(60_010.0));
        // Back to normal speed for the last 10ms.
        clock.set(Duration::from_millis(5_015));
        assert_eq!(player.tick().unwrap(), 0);
        clock.set(Duration::from_millis(5_020));
        assert_eq!(player.tick().unwrap(), 1);
        assert_eq!(player.status(), PlayerStatus::Finished);
    }

    #[test]
    fn back_to_back_gaps_are_both_skipped() {
        let (mut player, clock) = replayer(
            vec![meta(0), snapshot(0), click(10), click(60_010), click(120_010)],
            skipping(),
        );
        player.play(0).unwrap();
        clock.set(Duration::from_millis(10));
        assert_eq!(player.tick().unwrap(), 1);
        clock.set(Duration::from_millis(5_010));
        assert_eq!(player.tick().unwrap(), 1);
        // The second minute starts a new skip from the interaction that
        // ended the first one.
        clock.set(Duration::from_millis(10_010));
        assert_eq!(player.tick().unwrap(), 1);
        assert_eq!(player.state().last_interaction.map(|i| i.x), Some(120_010.0));
        assert_eq!(player.status(), PlayerStatus::Finished);
    }

    #[test]
    fn idle_stretch_after_a_mutation_is_skipped() {
        let (mut player, clock) = replayer(vec![snapshot(0), mutation(10), click(60_010)], ReplayerConfig::default());
        player.play(0).unwrap();
        player.set_config(skipping());
        clock.set(Duration::from_millis(10));
        assert_eq!(player.tick().unwrap(), 1);
        clock.set(Duration::from_millis(5_009));
        assert_eq!(player.tick().unwrap(), 0);
        clock.set(Duration::from_millis(5_010));
        assert_eq!(player.tick().unwrap(), 1);
        assert_eq!(player.status(), PlayerStatus::Finished);
    }

    #[test]
    fn idle_stretch_after_the_start_position_is_skipped() {
        let (mut player, clock) = replayer(vec![meta(0), snapshot(0), click(60_000)], skipping());
        player.play(0).unwrap();
        clock.set(Duration::from_millis(5_000));
        assert_eq!(player.tick().unwrap(), 1);

        let (mut player, clock) = replayer(vec![snapshot(0), mutation(10), click(60_010)], skipping());
        player.play(10).unwrap();
        clock.set(Duration::from_millis(5_000));
        assert_eq!(player.tick().unwrap(), 1);
        assert_eq!(player.status(), PlayerStatus::Finished);
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let (mut player, clock) = replayer(vec![snapshot(i64::MIN + 1), custom(i64::MAX)], skipping());
        let meta = player.meta_data().unwrap();
        assert_eq!(meta.total_time, i64::MAX);
        player.play(0).unwrap();
        player.seek(meta.total_time).unwrap();
        clock.set(Duration::from_secs(10));
        assert_eq!(player.current_time(), i64::MAX);
        player.add_event(custom(i64::MAX - 1)).unwrap();
        player.tick().unwrap();
        player.play(i64::MAX).unwrap();
    }
}
