//! Delay-ordered action queue driven by an external clock.
//!
//! The timer never sleeps. The host calls [`Timer::tick`] with the current
//! time, and every action whose delay has been reached comes back in delay
//! order. Elapsed time accumulates as `(now - last) * speed` per tick, so a
//! speed change only affects time that passes after it.

use std::collections::VecDeque;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    NotStarted,
    Running,
    Paused,
    Stopped,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Action<T> {
    /// Playback time, relative to the start baseline, the action is due at.
    pub delay: Duration,
    pub payload: T,
}

impl<T> Action<T> {
    pub fn new(delay: Duration, payload: T) -> Self {
        Self { delay, payload }
    }
}

#[derive(Debug)]
pub struct Timer<T> {
    actions: VecDeque<Action<T>>,
    speed: f64,
    /// Playback nanoseconds since start.
    elapsed: f64,
    last_tick: Option<Duration>,
    state: TimerState,
    live_mode: bool,
}

impl<T> Timer<T> {
    pub fn new(speed: f64) -> Self {
        Self {
            actions: VecDeque::new(),
            speed: speed.max(0.0),
            elapsed: 0.0,
            last_tick: None,
            state: TimerState::NotStarted,
            live_mode: false,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Pending actions in the order they will fire.
    pub fn actions(&self) -> impl Iterator<Item = &Action<T>> {
        self.actions.iter()
    }

    /// Keeps the timer running with an empty queue.
    pub fn set_live_mode(&mut self, live_mode: bool) {
        self.live_mode = live_mode;
    }

    /// Inserts after every action with the same or a smaller delay.
    pub fn add_action(&mut self, action: Action<T>) {
        let index = self.actions.partition_point(|a| a.delay <= action.delay);
        self.actions.insert(index, action);
    }

    pub fn add_actions(&mut self, actions: impl IntoIterator<Item = Action<T>>) {
        for action in actions {
            self.add_action(action);
        }
    }

    /// Starts counting from zero at `now`.
    pub fn start(&mut self, now: Duration) {
        self.elapsed = 0.0;
        self.last_tick = Some(now);
        self.state = TimerState::Running;
    }

    pub fn pause(&mut self, now: Duration) {
        if self.state == TimerState::Running {
            self.advance(now);
            self.state = TimerState::Paused;
        }
    }

    /// Continues from the elapsed time reached at the last pause.
    pub fn resume(&mut self, now: Duration) {
        if self.state == TimerState::Paused {
            self.last_tick = Some(now);
            self.state = TimerState::Running;
        }
    }

    /// Drops every pending action and stops.
    pub fn clear(&mut self) {
        self.actions.clear();
        self.elapsed = 0.0;
        self.last_tick = None;
        self.state = TimerState::Stopped;
    }

    /// Time up to `now` still counts at the old speed.
    pub fn set_speed(&mut self, speed: f64, now: Duration) {
        if self.state == TimerState::Running {
            self.advance(now);
        }
        self.speed = speed.max(0.0);
    }

    /// Playback time elapsed as of the last tick.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed as u64)
    }

    /// Playback time elapsed as of `now`, without consuming anything.
    pub fn elapsed_at(&self, now: Duration) -> Duration {
        let pending = match (self.state, self.last_tick) {
            (TimerState::Running, Some(last)) => nanos(now.saturating_sub(last)) * self.speed,
            _ => 0.0,
        };
        Duration::from_nanos((self.elapsed + pending) as u64)
    }

    /// Advances to `now` and returns the payloads that became due.
    pub fn tick(&mut self, now: Duration) -> Vec<T> {
        if self.state != TimerState::Running {
            return Vec::new();
        }
        self.advance(now);
        let mut due = Vec::new();
        while self
            .actions
            .front()
            .is_some_and(|a| nanos(a.delay) <= self.elapsed)
        {
            if let Some(action) = self.actions.pop_front() {
                due.push(action.payload);
            }
        }
        if self.actions.is_empty() && !self.live_mode {
            self.state = TimerState::Stopped;
        }
        due
    }

    fn advance(&mut self, now: Duration) {
        if let Some(last) = self.last_tick {
            self.elapsed += nanos(now.saturating_sub(last)) * self.speed;
        }
        self.last_tick = Some(now);
    }
}

fn nanos(d: Duration) -> f64 {
    d.as_nanos() as f64
}
