//! Human-Input Primitives (C5). Mouse, keyboard and scroll all share one
//! seeded RNG stream and drive the browser-control surface `runner`
//! owns. Each primitive exposes a pure planning function
//! (easy to test against the statistics properties) and a thin async
//! executor that walks the plan against a `headless_chrome::Tab`,
//! checking a cancellation flag at every suspension point.

pub mod keyboard;
pub mod mouse;
pub mod scroll;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::model::BehaviourProfile;

/// Shared cancellation flag. `stop(handle)` sets this; every primitive's
/// step loop checks it between steps and at any sleep, exiting within
/// one step as the concurrency model requires.
pub type CancelFlag = Arc<AtomicBool>;

pub fn new_cancel_flag() -> CancelFlag {
    Arc::new(AtomicBool::new(false))
}

pub fn is_cancelled(flag: &CancelFlag) -> bool {
    flag.load(Ordering::SeqCst)
}

/// Behaviour-profile scaling applied on top of the raw per-primitive
/// formulas: `bot` is fast and jittery (more likely to read as automated,
/// used for load-testing), `cautious` is slow and heavily hesitant.
#[derive(Debug, Clone, Copy)]
pub struct BehaviourTuning {
    pub speed_multiplier: f64,
    pub micro_jitter_prob: f64,
    pub overshoot_prob: f64,
    pub typo_rate: f64,
    pub double_tap_rate: f64,
    pub base_wpm: f64,
}

impl BehaviourTuning {
    pub fn for_profile(profile: BehaviourProfile) -> Self {
        match profile {
            BehaviourProfile::Bot => Self {
                speed_multiplier: 1.8,
                micro_jitter_prob: 0.05,
                overshoot_prob: 0.05,
                typo_rate: 0.01,
                double_tap_rate: 0.005,
                base_wpm: 90.0,
            },
            BehaviourProfile::Fast => Self {
                speed_multiplier: 1.3,
                micro_jitter_prob: 0.12,
                overshoot_prob: 0.12,
                typo_rate: 0.025,
                double_tap_rate: 0.01,
                base_wpm: 70.0,
            },
            BehaviourProfile::Normal => Self {
                speed_multiplier: 1.0,
                micro_jitter_prob: 0.18,
                overshoot_prob: 0.18,
                typo_rate: 0.04,
                double_tap_rate: 0.015,
                base_wpm: 55.0,
            },
            BehaviourProfile::Cautious => Self {
                speed_multiplier: 0.75,
                micro_jitter_prob: 0.25,
                overshoot_prob: 0.25,
                typo_rate: 0.06,
                double_tap_rate: 0.02,
                base_wpm: 40.0,
            },
        }
    }
}
