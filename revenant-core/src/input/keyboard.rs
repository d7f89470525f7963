use std::sync::Arc;
use std::time::Duration;

use headless_chrome::Tab;

use super::{is_cancelled, BehaviourTuning, CancelFlag};
use crate::constants::qwerty_neighbors;
use crate::error::{Result, RevenantError};
use crate::rng::SeededRng;

const BURST_MIN: f64 = 5.0;
const BURST_MAX: f64 = 15.0;
const WORD_BOUNDARY_CHARS: &[char] = &[' ', ',', '.', '!', '?'];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    Char(char),
    Backspace,
}

#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub action: KeyAction,
    pub iki_ms: f64,
    pub hold_ms: f64,
}

struct Cursor {
    pending_extra_ms: f64,
    chars_since_burst: f64,
    burst_target: f64,
}

fn push_event(rng: &mut SeededRng, cursor: &mut Cursor, base_iki: f64, action: KeyAction, out: &mut Vec<KeyEvent>) {
    let iki = (rng.log_normal(base_iki, 0.42) + cursor.pending_extra_ms).max(18.0);
    let hold = rng.log_normal(base_iki.min(80.0 / 0.55) * 0.55, 0.30).max(12.0);
    cursor.pending_extra_ms = 0.0;
    out.push(KeyEvent { action, iki_ms: iki, hold_ms: hold });
}

/// Plans the full keystroke event stream for `text`, including typo
/// insert/backspace/correct cycles, double-taps, word-boundary and
/// reconsideration pauses, and inter-burst pacing.
pub fn plan_typing(rng: &mut SeededRng, text: &str, tuning: &BehaviourTuning) -> Vec<KeyEvent> {
    let wpm = rng.log_normal(tuning.base_wpm, 0.14).max(5.0);
    let base_iki = 60_000.0 / (5.0 * wpm);
    let burst_mid = (BURST_MIN + BURST_MAX) / 2.0;

    let mut cursor = Cursor {
        pending_extra_ms: 0.0,
        chars_since_burst: 0.0,
        burst_target: rng.log_normal(burst_mid, 0.3).max(1.0),
    };
    let mut out = Vec::new();

    for c in text.chars() {
        if cursor.chars_since_burst >= cursor.burst_target {
            cursor.pending_extra_ms += rng.heavy_tail_pause(250.0, 0.48, 0.04);
            cursor.burst_target = rng.log_normal(burst_mid, 0.3).max(1.0);
            cursor.chars_since_burst = 0.0;
        }

        let neighbors = qwerty_neighbors(c);
        if !neighbors.is_empty() && rng.chance(tuning.typo_rate) {
            let wrong = *rng.pick(neighbors);
            push_event(rng, &mut cursor, base_iki, KeyAction::Char(wrong), &mut out);
            cursor.pending_extra_ms += rng.log_normal(220.0, 0.3);
            push_event(rng, &mut cursor, base_iki, KeyAction::Backspace, &mut out);
            push_event(rng, &mut cursor, base_iki, KeyAction::Char(c), &mut out);
        } else if rng.chance(tuning.double_tap_rate) {
            push_event(rng, &mut cursor, base_iki, KeyAction::Char(c), &mut out);
            push_event(rng, &mut cursor, base_iki * 0.3, KeyAction::Char(c), &mut out);
            push_event(rng, &mut cursor, base_iki, KeyAction::Backspace, &mut out);
        } else {
            push_event(rng, &mut cursor, base_iki, KeyAction::Char(c), &mut out);
        }

        cursor.chars_since_burst += 1.0;

        if WORD_BOUNDARY_CHARS.contains(&c) {
            cursor.pending_extra_ms += rng.heavy_tail_pause(1.8 * base_iki, 0.4, 0.03);
        }

        if rng.chance(0.008) {
            cursor.pending_extra_ms += rng.log_normal(700.0, 0.60);
        }
    }

    out
}

pub async fn execute_typing(tab: &Arc<Tab>, events: &[KeyEvent], cancel: &CancelFlag) -> Result<()> {
    for ev in events {
        if is_cancelled(cancel) {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs_f64(ev.iki_ms / 1000.0)).await;
        match ev.action {
            KeyAction::Char(c) => {
                tab.type_str(&c.to_string()).map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
            }
            KeyAction::Backspace => {
                tab.press_key("Backspace").map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
            }
        }
        tokio::time::sleep(Duration::from_secs_f64(ev.hold_ms / 1000.0)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BehaviourProfile;

    fn tuning() -> BehaviourTuning {
        BehaviourTuning::for_profile(BehaviourProfile::Normal)
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let mut a = SeededRng::new(11);
        let mut b = SeededRng::new(11);
        let ev_a = plan_typing(&mut a, "hello world", &tuning());
        let ev_b = plan_typing(&mut b, "hello world", &tuning());
        assert_eq!(ev_a.len(), ev_b.len());
        for (x, y) in ev_a.iter().zip(ev_b.iter()) {
            assert_eq!(x.action, y.action);
            assert!((x.iki_ms - y.iki_ms).abs() < 1e-9);
        }
    }

    #[test]
    fn final_typed_characters_reconstruct_original_text() {
        let mut rng = SeededRng::new(99);
        let text = "the quick brown fox";
        let events = plan_typing(&mut rng, text, &tuning());
        let mut buffer = String::new();
        for ev in &events {
            match ev.action {
                KeyAction::Char(c) => buffer.push(c),
                KeyAction::Backspace => {
                    buffer.pop();
                }
            }
        }
        assert_eq!(buffer, text);
    }

    #[test]
    fn inter_keystroke_interval_lognormal_sigma_within_bounds() {
        let mut rng = SeededRng::new(55);
        let long_text: String = "the quick brown fox jumps over the lazy dog, again and again. "
            .repeat(80)
            .chars()
            .take(5000)
            .collect();
        let events = plan_typing(&mut rng, &long_text, &tuning());
        let ikis: Vec<f64> = events.iter().map(|e| e.iki_ms.max(1.0)).collect();
        let logs: Vec<f64> = ikis.iter().map(|v| v.ln()).collect();
        let mean = logs.iter().sum::<f64>() / logs.len() as f64;
        let var = logs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / logs.len() as f64;
        let sigma = var.sqrt();
        assert!((0.20..=0.70).contains(&sigma), "sigma_log was {sigma}");
    }

    #[test]
    fn no_neighbor_typo_possible_on_space() {
        let mut rng = SeededRng::new(3);
        let mut t = tuning();
        t.typo_rate = 1.0;
        let events = plan_typing(&mut rng, "a a a a a", &t);
        // every event touching a space must be a plain Char(' '), never a
        // substituted neighbor, since qwerty_neighbors(' ') is empty.
        assert!(events.iter().any(|e| e.action == KeyAction::Char(' ')));
    }
}
