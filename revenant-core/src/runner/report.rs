//! Run report finalisation. A thin, pure constructor kept separate
//! from `rotation::drive` so the wire shape a finished run produces
//! has exactly one place that assembles it.

use crate::model::{AttemptResult, RunReport, RunStats};

pub fn finalize(
    run_id: String,
    target_url: String,
    started_at: u64,
    ended_at: u64,
    stats: RunStats,
    results: Vec<AttemptResult>,
) -> RunReport {
    RunReport { run_id, target_url, started_at, ended_at, stats, results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttemptStatus;

    #[test]
    fn finalize_preserves_input_fields_unchanged() {
        let result = AttemptResult {
            status: AttemptStatus::Success,
            outcome: Some("success".into()),
            profile_id: "p1".into(),
            duration_ms: 10,
            final_url: None,
            started_at: 0,
            ended_at: Some(10),
            rotation_events: vec![],
            session_blob: None,
            screenshot_bytes: None,
        };
        let report = finalize("run-1".into(), "https://example.test".into(), 0, 10, RunStats::default(), vec![result.clone()]);
        assert_eq!(report.run_id, "run-1");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].profile_id, "p1");
    }
}
