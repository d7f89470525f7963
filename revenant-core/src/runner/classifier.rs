//! Outcome classifier for the credential-flow state machine. Pure:
//! given the signals the session runner observed after a submit,
//! decide the attempt's next terminal status. No browser handle, no
//! I/O — this is what makes the rotation-policy behaviour drivable
//! against a synthetic stub instead of a live page.

use crate::model::AttemptStatus;

/// Everything the classifier needs from one post-submit poll. Gathered
/// by `runner::capture::poll_signals` against a real page; hand-built
/// in tests.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassifierSignals {
    pub success_visible: bool,
    pub failure_visible: bool,
    /// Key into `constants::CAPTCHA_MARKERS`, e.g. `"recaptcha"`.
    pub captcha_marker: Option<String>,
    pub rate_limited: bool,
    pub ip_blocked: bool,
    pub account_locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: AttemptStatus,
    pub outcome: String,
}

/// `None` means "no terminal signal yet — keep polling until
/// `post_submit_timeout_ms`", at which point the caller applies the
/// `post_submit_timeout` edge itself (this function never manufactures
/// a timeout; it only knows about in-page signals).
///
/// Success is checked first (so a page that flashes both a success and a stale
/// failure marker still resolves to success), then the two hard
/// signals (they invalidate the credential outright), then the soft
/// signals, then the plain failure indicator.
pub fn classify(signals: &ClassifierSignals) -> Option<Classification> {
    if signals.success_visible {
        return Some(Classification { status: AttemptStatus::Success, outcome: "success".into() });
    }
    if signals.ip_blocked {
        return Some(Classification { status: AttemptStatus::HardBlocked, outcome: "ip_block".into() });
    }
    if signals.account_locked {
        return Some(Classification { status: AttemptStatus::HardBlocked, outcome: "account_locked".into() });
    }
    if signals.captcha_marker.is_some() {
        return Some(Classification { status: AttemptStatus::SoftBlocked, outcome: "captcha_block".into() });
    }
    if signals.rate_limited {
        return Some(Classification { status: AttemptStatus::SoftBlocked, outcome: "rate_limited".into() });
    }
    if signals.failure_visible {
        return Some(Classification { status: AttemptStatus::WrongCredentials, outcome: "wrong_credentials".into() });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_signal_means_keep_polling() {
        assert!(classify(&ClassifierSignals::default()).is_none());
    }

    #[test]
    fn success_wins_over_a_stale_failure_marker() {
        let signals = ClassifierSignals { success_visible: true, failure_visible: true, ..Default::default() };
        let c = classify(&signals).unwrap();
        assert_eq!(c.status, AttemptStatus::Success);
    }

    #[test]
    fn captcha_is_soft_blocked_with_fixed_outcome_tag() {
        let signals = ClassifierSignals { captcha_marker: Some("recaptcha".into()), ..Default::default() };
        let c = classify(&signals).unwrap();
        assert_eq!(c.status, AttemptStatus::SoftBlocked);
        assert_eq!(c.outcome, "captcha_block");
    }

    #[test]
    fn ip_block_outranks_captcha() {
        let signals = ClassifierSignals {
            ip_blocked: true,
            captcha_marker: Some("hcaptcha".into()),
            ..Default::default()
        };
        let c = classify(&signals).unwrap();
        assert_eq!(c.status, AttemptStatus::HardBlocked);
        assert_eq!(c.outcome, "ip_block");
    }

    #[test]
    fn plain_failure_maps_to_wrong_credentials() {
        let signals = ClassifierSignals { failure_visible: true, ..Default::default() };
        let c = classify(&signals).unwrap();
        assert_eq!(c.status, AttemptStatus::WrongCredentials);
    }
}
