use std::sync::Arc;
use std::time::Duration;

use headless_chrome::Tab;

use super::{is_cancelled, CancelFlag};
use crate::error::{Result, RevenantError};
use crate::rng::SeededRng;

const MIN_PX: f64 = 2.0;
const DECAY: f64 = 0.88;

#[derive(Debug, Clone, Copy)]
pub struct ScrollTick {
    pub delta: f64,
    pub delay_ms: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollConfig {
    pub tick_delay_min_ms: f64,
    pub tick_delay_max_ms: f64,
    pub overshoot_prob: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self { tick_delay_min_ms: 12.0, tick_delay_max_ms: 30.0, overshoot_prob: 0.15 }
    }
}

fn momentum_run(rng: &mut SeededRng, mut remaining: f64, mut velocity: f64, cfg: &ScrollConfig, out: &mut Vec<ScrollTick>) {
    let sign = if remaining < 0.0 { -1.0 } else { 1.0 };
    remaining = remaining.abs();
    while remaining > 0.5 && velocity > MIN_PX * 0.1 {
        let step = velocity.min(remaining);
        out.push(ScrollTick {
            delta: sign * step,
            delay_ms: rng.uniform() * (cfg.tick_delay_max_ms - cfg.tick_delay_min_ms) + cfg.tick_delay_min_ms,
        });
        remaining -= step;
        velocity = (velocity * DECAY).max(MIN_PX);
    }
}

/// Plans a momentum-decay scroll of `target_px` (signed: negative scrolls
/// up), with an optional post-target bounce-back overshoot using the
/// same decay rule.
pub fn plan_scroll(rng: &mut SeededRng, target_px: f64, cfg: &ScrollConfig) -> Vec<ScrollTick> {
    let initial_velocity = rng.gauss(target_px.abs() * 0.35, target_px.abs() * 0.2 * 0.35).max(MIN_PX);
    let mut ticks = Vec::new();
    momentum_run(rng, target_px, initial_velocity, cfg, &mut ticks);

    if rng.chance(cfg.overshoot_prob) {
        let overshoot_amount = rng.log_normal(target_px.abs() * 0.08, 0.5);
        let sign = if target_px < 0.0 { -1.0 } else { 1.0 };
        momentum_run(rng, sign * overshoot_amount, overshoot_amount.max(MIN_PX), cfg, &mut ticks);
        // bounce back toward the original target
        momentum_run(rng, -sign * overshoot_amount, overshoot_amount.max(MIN_PX), cfg, &mut ticks);
    }

    ticks
}

pub async fn execute_scroll(tab: &Arc<Tab>, x: f64, y: f64, ticks: &[ScrollTick], cancel: &CancelFlag) -> Result<()> {
    for tick in ticks {
        if is_cancelled(cancel) {
            return Ok(());
        }
        tab.scroll(x, y, 0.0, tick.delta).map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
        tokio::time::sleep(Duration::from_secs_f64(tick.delay_ms / 1000.0)).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_scroll_converges_near_target_without_overshoot() {
        let mut rng = SeededRng::new(1);
        let cfg = ScrollConfig { overshoot_prob: 0.0, ..ScrollConfig::default() };
        let ticks = plan_scroll(&mut rng, 800.0, &cfg);
        let total: f64 = ticks.iter().map(|t| t.delta).sum();
        assert!((total - 800.0).abs() < MIN_PX * 2.0, "total was {total}");
    }

    #[test]
    fn negative_target_scrolls_upward() {
        let mut rng = SeededRng::new(2);
        let cfg = ScrollConfig { overshoot_prob: 0.0, ..ScrollConfig::default() };
        let ticks = plan_scroll(&mut rng, -500.0, &cfg);
        assert!(ticks.iter().all(|t| t.delta <= 0.0));
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let cfg = ScrollConfig::default();
        let mut a = SeededRng::new(9);
        let mut b = SeededRng::new(9);
        let ta = plan_scroll(&mut a, 400.0, &cfg);
        let tb = plan_scroll(&mut b, 400.0, &cfg);
        assert_eq!(ta.len(), tb.len());
    }
}
