use std::sync::Arc;
use std::time::Duration;

use headless_chrome::Tab;

use super::{is_cancelled, BehaviourTuning, CancelFlag};
use crate::error::{Result, RevenantError};
use crate::rng::SeededRng;

const SAMPLE_HZ: f64 = 60.0;
const HAWKES_BASELINE: f64 = 0.12;
const HAWKES_BOOST: f64 = 2.8;
const HAWKES_CAP: f64 = 0.55;
const HAWKES_DECAY: f64 = 0.82;

#[derive(Debug, Clone, Copy)]
pub struct MouseStep {
    pub x: f64,
    pub y: f64,
    pub delay_ms: f64,
    pub paused_ms: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct MouseState {
    pub x: f64,
    pub y: f64,
    hawkes_rate: f64,
}

impl MouseState {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, hawkes_rate: HAWKES_BASELINE }
    }
}

fn segment_count(rng: &mut SeededRng, distance: f64) -> u32 {
    if distance < 120.0 {
        1
    } else if distance < 400.0 {
        rng.int(2, 3) as u32
    } else {
        rng.int(3, 4) as u32
    }
}

/// Fitts's Law travel-time estimate: `a + b*log2(distance/target_size + 1)`.
fn fitts_travel_time_ms(distance: f64, speed_multiplier: f64) -> f64 {
    const A: f64 = 50.0;
    const B: f64 = 150.0;
    const TARGET_SIZE: f64 = 24.0;
    (A + B * (distance / TARGET_SIZE + 1.0).log2()) / speed_multiplier
}

fn cubic_bezier(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), t: f64) -> (f64, f64) {
    let u = 1.0 - t;
    let x = u.powi(3) * p0.0 + 3.0 * u.powi(2) * t * p1.0 + 3.0 * u * t.powi(2) * p2.0 + t.powi(3) * p3.0;
    let y = u.powi(3) * p0.1 + 3.0 * u.powi(2) * t * p1.1 + 3.0 * u * t.powi(2) * p2.1 + t.powi(3) * p3.1;
    (x, y)
}

fn perpendicular_offset(rng: &mut SeededRng, from: (f64, f64), to: (f64, f64), amplitude: f64) -> (f64, f64) {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let len = (dx * dx + dy * dy).sqrt().max(1e-6);
    let (nx, ny) = (-dy / len, dx / len);
    let offset = rng.log_normal(amplitude.max(1.0), 0.5) * if rng.chance(0.5) { 1.0 } else { -1.0 };
    (nx * offset, ny * offset)
}

fn plan_segment(rng: &mut SeededRng, from: (f64, f64), to: (f64, f64), tuning: &BehaviourTuning, out: &mut Vec<MouseStep>) {
    let distance = ((to.0 - from.0).powi(2) + (to.1 - from.1).powi(2)).sqrt();
    let (ox, oy) = perpendicular_offset(rng, from, to, distance * 0.12);
    let mid = ((from.0 + to.0) / 2.0 + ox, (from.1 + to.1) / 2.0 + oy);
    let t1 = 0.12 + rng.uniform() * 0.36;
    let t2 = 0.52 + rng.uniform() * 0.36;
    let cp1 = cubic_bezier(from, mid, mid, to, t1);
    let cp2 = cubic_bezier(from, mid, mid, to, t2);

    let travel_ms = fitts_travel_time_ms(distance, tuning.speed_multiplier);
    let step_count = ((travel_ms / 1000.0) * SAMPLE_HZ).round().max(1.0) as usize;
    let base_step_delay = travel_ms / step_count as f64;

    for i in 1..=step_count {
        let t = i as f64 / step_count as f64;
        let (mut x, mut y) = cubic_bezier(from, cp1, cp2, to, t);

        if rng.chance(tuning.micro_jitter_prob) {
            let jitter = rng.log_normal(1.2, 0.6);
            let angle = rng.uniform() * std::f64::consts::TAU;
            x += jitter * angle.cos();
            y += jitter * angle.sin();
        }

        let delay_ms = rng.log_normal(base_step_delay.max(1.0), 0.40);
        out.push(MouseStep { x, y, delay_ms, paused_ms: 0.0 });
    }
}

/// Plans a full human-like path from `state`'s current position to
/// `target`, applying the Hawkes-process micro-pause schedule and the
/// overshoot-and-correct behaviour, then updates `state` to the final
/// position.
pub fn plan_path(rng: &mut SeededRng, state: &mut MouseState, target: (f64, f64), tuning: &BehaviourTuning) -> Vec<MouseStep> {
    let from = (state.x, state.y);
    let distance = ((target.0 - from.0).powi(2) + (target.1 - from.1).powi(2)).sqrt();
    let segments = segment_count(rng, distance);

    let mut waypoints = Vec::with_capacity(segments as usize + 1);
    waypoints.push(from);
    for i in 1..segments {
        let t = i as f64 / segments as f64;
        waypoints.push((from.0 + (target.0 - from.0) * t, from.1 + (target.1 - from.1) * t));
    }

    let overshoot = distance > 20.0 && rng.chance(tuning.overshoot_prob);
    let final_target = if overshoot {
        let dx = target.0 - from.0;
        let dy = target.1 - from.1;
        let len = (dx * dx + dy * dy).sqrt().max(1e-6);
        let extend = rng.log_normal(18.0, 0.5);
        (target.0 + dx / len * extend, target.1 + dy / len * extend)
    } else {
        target
    };
    waypoints.push(final_target);

    let mut steps = Vec::new();
    for w in waypoints.windows(2) {
        plan_segment(rng, w[0], w[1], tuning, &mut steps);
    }

    if overshoot {
        plan_segment(rng, final_target, target, tuning, &mut steps);
    }

    // Hawkes-process micro-pauses, applied after the geometric plan so
    // pause placement doesn't perturb the path shape itself.
    let mut rate = HAWKES_BASELINE;
    for step in steps.iter_mut() {
        if rng.chance(rate) {
            step.paused_ms = rng.heavy_tail_pause(95.0, 0.5, 0.05);
            rate = (rate * HAWKES_BOOST).min(HAWKES_CAP);
        } else {
            rate = HAWKES_BASELINE + (rate - HAWKES_BASELINE) * HAWKES_DECAY;
        }
    }

    if let Some(last) = steps.last() {
        state.x = last.x;
        state.y = last.y;
    } else {
        state.x = target.0;
        state.y = target.1;
    }

    steps
}

/// Executes a planned path against a live tab, sleeping between steps
/// and checking `cancel` at every suspension point.
pub async fn execute_path(tab: &Arc<Tab>, steps: &[MouseStep], cancel: &CancelFlag) -> Result<()> {
    for step in steps {
        if is_cancelled(cancel) {
            return Ok(());
        }
        tab.move_mouse(step.x, step.y).map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
        tokio::time::sleep(Duration::from_secs_f64(step.delay_ms / 1000.0)).await;
        if step.paused_ms > 0.0 {
            if is_cancelled(cancel) {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_secs_f64(step.paused_ms / 1000.0)).await;
        }
    }
    Ok(())
}

pub async fn move_and_click(
    tab: &Arc<Tab>,
    rng: &mut SeededRng,
    state: &mut MouseState,
    target: (f64, f64),
    tuning: &BehaviourTuning,
    cancel: &CancelFlag,
) -> Result<()> {
    let steps = plan_path(rng, state, target, tuning);
    execute_path(tab, &steps, cancel).await?;
    if is_cancelled(cancel) {
        return Ok(());
    }
    tab.click(headless_chrome::types::MouseButton::Left)
        .map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::stats::{excess_kurtosis, hill_tail_index, histogram_entropy_bits};

    fn tuning() -> BehaviourTuning {
        BehaviourTuning::for_profile(crate::model::BehaviourProfile::Normal)
    }

    #[test]
    fn plan_updates_state_to_target_without_overshoot() {
        let mut rng = SeededRng::new(1);
        let mut state = MouseState::new(0.0, 0.0);
        // Disable overshoot for this check by using a very low-probability tuning.
        let mut t = tuning();
        t.overshoot_prob = 0.0;
        let steps = plan_path(&mut rng, &mut state, (500.0, 300.0), &t);
        assert!(!steps.is_empty());
        let last = steps.last().unwrap();
        assert!((last.x - 500.0).abs() < 1.0);
        assert!((last.y - 300.0).abs() < 1.0);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let mut rng_a = SeededRng::new(42);
        let mut state_a = MouseState::new(10.0, 10.0);
        let steps_a = plan_path(&mut rng_a, &mut state_a, (600.0, 400.0), &tuning());

        let mut rng_b = SeededRng::new(42);
        let mut state_b = MouseState::new(10.0, 10.0);
        let steps_b = plan_path(&mut rng_b, &mut state_b, (600.0, 400.0), &tuning());

        assert_eq!(steps_a.len(), steps_b.len());
        for (a, b) in steps_a.iter().zip(steps_b.iter()) {
            assert!((a.x - b.x).abs() < 1e-9);
            assert!((a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn behaviour_statistics_meet_thresholds_over_many_moves() {
        let mut rng = SeededRng::new(777);
        let mut state = MouseState::new(0.0, 0.0);
        let t = tuning();

        let mut velocities = Vec::new();
        let mut curvatures = Vec::new();
        let mut inter_step = Vec::new();
        let mut pause_flags = Vec::new();

        for m in 0..320 {
            let target = (
                rng.int(50, 1800) as f64,
                rng.int(50, 900) as f64,
            );
            let steps = plan_path(&mut rng, &mut state, target, &t);
            for w in steps.windows(3) {
                let v1 = ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt();
                let v2 = ((w[2].x - w[1].x).powi(2) + (w[2].y - w[1].y).powi(2)).sqrt();
                velocities.push(v1);
                let turn = (v2 - v1).abs();
                curvatures.push(turn);
            }
            for s in &steps {
                inter_step.push(s.delay_ms.max(0.1));
                pause_flags.push(s.paused_ms > 0.0);
            }
            let _ = m;
        }

        let kurtosis = excess_kurtosis(&velocities) + 3.0;
        assert!(kurtosis > 5.0, "velocity kurtosis was {kurtosis}");

        let max_c = curvatures.iter().cloned().fold(0.0_f64, f64::max);
        let entropy = histogram_entropy_bits(&curvatures, 16, 0.0, max_c.max(1.0));
        assert!(entropy > 3.1, "curvature entropy was {entropy}");

        let tail = hill_tail_index(&inter_step);
        assert!(tail > 1.4, "inter-step tail index was {tail}");

        let pause_rate = pause_flags.iter().filter(|p| **p).count() as f64 / pause_flags.len() as f64;
        assert!((0.08..=0.18).contains(&pause_rate), "pause rate was {pause_rate}");
    }
}
