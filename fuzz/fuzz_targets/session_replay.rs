#![no_main]

use core_types::ManualClock;
use libfuzzer_sys::fuzz_target;
use replay::{Replayer, ReplayerConfig};
use std::time::Duration;

// Arbitrary session JSON must either fail to decode or replay to the end,
// seek back to the start, and export without panicking.
fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let clock = ManualClock::new(Duration::ZERO);
    let Ok(mut player) = Replayer::from_json(input, ReplayerConfig::default(), clock.clone()) else {
        return;
    };
    let Ok(meta) = player.meta_data() else {
        return;
    };
    if player.play(meta.total_time.clamp(0, 60_000)).is_err() {
        return;
    }
    clock.advance(Duration::from_millis(1_000));
    let _ = player.tick();
    let _ = player.seek(0);
    if let Some(tree) = player.tree() {
        let _ = replay::export(tree.doc(), tree.mirror(), tree.root());
    }
});
