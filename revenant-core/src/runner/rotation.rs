//! Rotation policy and the credential-flow batch driver.
//! `RotationController` is pure bookkeeping; `drive` is the only piece
//! of this module that touches a `CredentialAttemptDriver` (a real
//! browser in production, a deterministic stub in tests).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::model::{
    AttemptResult, Credential, FormSelectorBundle, Profile, RotationEvent, RotationPolicy,
};
use crate::runner::classifier::{self, Classification};
use crate::runner::stats::AggregateStats;
use crate::runner::SessionHandle;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Immutable profile pool snapshot taken at run start, with a
/// round-robin cursor.
pub struct ProfilePool {
    profiles: Vec<Profile>,
    cursor: AtomicU32,
}

impl ProfilePool {
    pub fn new(profiles: Vec<Profile>) -> Self {
        assert!(!profiles.is_empty(), "profile pool must not be empty");
        Self { profiles, cursor: AtomicU32::new(0) }
    }

    pub fn next(&self) -> Profile {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst) as usize % self.profiles.len();
        self.profiles[i].clone()
    }
}

struct QueuedCredential {
    index: usize,
    credential: Credential,
    retries_left: u32,
}

/// Mutex-guarded FIFO shared across sessions. A credential
/// re-enters at the back of the queue on a retryable `soft_blocked`
/// outcome so other sessions get a crack at earlier credentials first.
pub struct CredentialQueue {
    inner: Mutex<VecDeque<QueuedCredential>>,
    max_retries: u32,
}

impl CredentialQueue {
    pub fn new(credentials: Vec<Credential>, max_retries: u32) -> Self {
        let inner = credentials
            .into_iter()
            .enumerate()
            .map(|(index, credential)| QueuedCredential { index, credential, retries_left: max_retries })
            .collect();
        Self { inner: Mutex::new(inner), max_retries }
    }

    async fn pop(&self) -> Option<QueuedCredential> {
        self.inner.lock().await.pop_front()
    }

    /// Re-queues for a retry; returns `false` (and drops the credential)
    /// once `retries_left` is exhausted.
    async fn retry(&self, mut cred: QueuedCredential) -> bool {
        if cred.retries_left == 0 {
            return false;
        }
        cred.retries_left -= 1;
        self.inner.lock().await.push_back(cred);
        true
    }
}

/// Tracks both rotation triggers independently: every Nth *credential*
/// pulled off the queue (`rotate_every_attempt` — counted once per
/// distinct credential, not per retry) and a soft-signal counter that
/// fires at `soft_threshold` (counted per soft-blocked classification,
/// including retries, since a session that keeps tripping captchas is
/// the one worth rotating away from regardless of which credential it
/// was working on).
struct RotationController {
    policy: RotationPolicy,
    credentials_seen: u32,
    soft_signals_since_rotation: u32,
}

impl RotationController {
    fn new(policy: RotationPolicy) -> Self {
        Self { policy, credentials_seen: 0, soft_signals_since_rotation: 0 }
    }

    fn note_new_credential(&mut self) -> bool {
        self.credentials_seen += 1;
        self.policy.rotate_every_attempt > 0 && self.credentials_seen % self.policy.rotate_every_attempt == 0
    }

    fn note_soft_signal(&mut self) -> bool {
        self.soft_signals_since_rotation += 1;
        if self.policy.soft_threshold > 0 && self.soft_signals_since_rotation >= self.policy.soft_threshold {
            self.soft_signals_since_rotation = 0;
            true
        } else {
            false
        }
    }
}

/// What it takes to drive one submit-and-classify cycle plus the
/// session lifecycle around it. The production implementation
/// (`runner::BrowserDriver`) delegates every method to `SessionRunner`;
/// tests substitute a deterministic stub so rotation-policy behaviour
/// never has to launch a real browser.
#[async_trait::async_trait]
pub trait CredentialAttemptDriver: Send + Sync {
    async fn launch(&self, profile: Profile) -> Result<SessionHandle>;
    async fn stop(&self, session: &SessionHandle);
    async fn attempt(
        &self,
        session: &SessionHandle,
        form: &FormSelectorBundle,
        credential: &Credential,
    ) -> Classification;
    async fn capture_session_blob(&self, session: &SessionHandle, credential_id: String) -> Option<crate::model::SessionBlob>;
}

/// Events streamed out of `drive` as the run progresses — the control
/// protocol (C7) turns these into `loginAttemptStart` /
/// `loginAttemptResult` / `loginRotation` / `loginRunComplete` frames.
#[derive(Debug, Clone)]
pub enum RunEvent {
    AttemptStart { attempt: u32, credential_index: usize },
    AttemptResult { attempt: u32, result: AttemptResult },
    Rotation(RotationEvent),
    Complete(crate::model::RunReport),
    Aborted(String),
}

#[derive(Debug, Clone, Copy)]
pub enum ConcurrencyMode {
    Sequential,
    Parallel { concurrency: usize },
}

async fn worker<D: CredentialAttemptDriver + ?Sized>(
    driver: Arc<D>,
    form: FormSelectorBundle,
    queue: Arc<CredentialQueue>,
    pool: Arc<ProfilePool>,
    stats: Arc<AggregateStats>,
    results: Arc<Mutex<Vec<AttemptResult>>>,
    events: mpsc::Sender<RunEvent>,
    rotation: Arc<Mutex<RotationController>>,
    attempt_counter: Arc<AtomicU32>,
) {
    let mut session = match driver.launch(pool.next()).await {
        Ok(h) => h,
        Err(e) => {
            let _ = events.send(RunEvent::Aborted(e.to_string())).await;
            return;
        }
    };

    while let Some(cred) = queue.pop().await {
        let is_first_attempt = cred.retries_left == queue.max_retries;
        let mut pending_rotations = Vec::new();
        // Monotonic, not derived from `cred.index`: a retried credential
        // is popped again and must get its own attempt id, so every
        // `AttemptStart` has exactly one matching `AttemptResult` (a
        // retry is a new attempt on the same credential, not a second
        // start for the attempt that timed out/soft-blocked).
        let attempt_no = attempt_counter.fetch_add(1, Ordering::SeqCst) + 1;

        if is_first_attempt {
            let fires = rotation.lock().await.note_new_credential();
            if fires {
                let from = session.clone();
                driver.stop(&session).await;
                session = match driver.launch(pool.next()).await {
                    Ok(h) => h,
                    Err(e) => {
                        let _ = events.send(RunEvent::Aborted(e.to_string())).await;
                        return;
                    }
                };
                let ev = RotationEvent {
                    reason: "rotate_every_attempt".into(),
                    at_attempt: attempt_no,
                    from_profile: from,
                    to_profile: session.clone(),
                };
                stats.record_rotation();
                let _ = events.send(RunEvent::Rotation(ev.clone())).await;
                pending_rotations.push(ev);
            }
        }

        let _ = events
            .send(RunEvent::AttemptStart { attempt: attempt_no, credential_index: cred.index })
            .await;

        let started_at = now_ms();
        let classification = driver.attempt(&session, &form, &cred.credential).await;
        let ended_at = now_ms();

        use crate::model::AttemptStatus;
        match classification.status {
            AttemptStatus::SoftBlocked => {
                let fires = rotation.lock().await.note_soft_signal();
                if fires {
                    let from = session.clone();
                    driver.stop(&session).await;
                    session = match driver.launch(pool.next()).await {
                        Ok(h) => h,
                        Err(e) => {
                            let _ = events.send(RunEvent::Aborted(e.to_string())).await;
                            return;
                        }
                    };
                    let ev = RotationEvent {
                        reason: "soft_threshold".into(),
                        at_attempt: attempt_no,
                        from_profile: from,
                        to_profile: session.clone(),
                    };
                    stats.record_rotation();
                    let _ = events.send(RunEvent::Rotation(ev.clone())).await;
                    pending_rotations.push(ev);
                }

                let outcome = classification.outcome.clone();
                let will_retry = {
                    // Peek at the budget before `queue.retry` consumes `cred`, so
                    // this attempt's own result still records whether it will be
                    // retried — the retry itself becomes a new attempt with its
                    // own `AttemptStart`/`AttemptResult` pair when it's popped
                    // again, never a second start under this same `attempt_no`.
                    cred.retries_left > 0
                };
                let retried = queue.retry(cred).await;
                debug_assert_eq!(will_retry, retried);

                let result = AttemptResult {
                    status: if retried { AttemptStatus::SoftBlocked } else { AttemptStatus::Skipped },
                    outcome: Some(outcome),
                    profile_id: session_profile_id(&session),
                    duration_ms: ended_at.saturating_sub(started_at),
                    final_url: None,
                    started_at,
                    ended_at: Some(ended_at),
                    rotation_events: pending_rotations,
                    session_blob: None,
                    screenshot_bytes: None,
                };
                stats.record_reason(AttemptStatus::SoftBlocked);
                results.lock().await.push(result.clone());
                let _ = events
                    .send(RunEvent::AttemptResult { attempt: attempt_no, result })
                    .await;
            }
            AttemptStatus::HardBlocked => {
                let result = AttemptResult {
                    status: AttemptStatus::Skipped,
                    outcome: Some(classification.outcome.clone()),
                    profile_id: session_profile_id(&session),
                    duration_ms: ended_at.saturating_sub(started_at),
                    final_url: None,
                    started_at,
                    ended_at: Some(ended_at),
                    rotation_events: pending_rotations,
                    session_blob: None,
                    screenshot_bytes: None,
                };
                stats.record_reason(AttemptStatus::HardBlocked);
                results.lock().await.push(result.clone());
                let _ = events
                    .send(RunEvent::AttemptResult { attempt: attempt_no, result })
                    .await;
            }
            terminal => {
                let session_blob = if terminal == AttemptStatus::Success && form.export_session_on_success {
                    driver.capture_session_blob(&session, cred.index.to_string()).await
                } else {
                    None
                };
                let result = AttemptResult {
                    status: terminal,
                    outcome: Some(classification.outcome.clone()),
                    profile_id: session_profile_id(&session),
                    duration_ms: ended_at.saturating_sub(started_at),
                    final_url: None,
                    started_at,
                    ended_at: Some(ended_at),
                    rotation_events: pending_rotations,
                    session_blob,
                    screenshot_bytes: None,
                };
                stats.record_reason(terminal);
                results.lock().await.push(result.clone());
                let _ = events
                    .send(RunEvent::AttemptResult { attempt: attempt_no, result })
                    .await;
            }
        }
    }

    driver.stop(&session).await;
}

/// `SessionHandle` is an opaque string id; this core has no concept of
/// a dedicated profile-id column separate from it, so the handle
/// doubles as the profile-id reported on `AttemptResult` (real sessions
/// are one-to-one with the profile that launched them).
fn session_profile_id(session: &SessionHandle) -> String {
    session.clone()
}

/// Drives `credentials` against `form` using `pool` for identity
/// rotation, fanning attempt/rotation/completion events out through
/// `events`. Returns the finished `RunReport`.
pub async fn drive<D: CredentialAttemptDriver + 'static>(
    run_id: String,
    target_url: String,
    form: FormSelectorBundle,
    credentials: Vec<Credential>,
    profiles: Vec<Profile>,
    policy: RotationPolicy,
    mode: ConcurrencyMode,
    driver: Arc<D>,
    events: mpsc::Sender<RunEvent>,
) -> crate::model::RunReport {
    let started_at = now_ms();
    let pool = Arc::new(ProfilePool::new(profiles));
    let queue = Arc::new(CredentialQueue::new(credentials, policy.max_retries));
    let stats = Arc::new(AggregateStats::default());
    let results = Arc::new(Mutex::new(Vec::new()));
    let rotation = Arc::new(Mutex::new(RotationController::new(policy)));
    let attempt_counter = Arc::new(AtomicU32::new(0));

    let worker_count = match mode {
        ConcurrencyMode::Sequential => 1,
        ConcurrencyMode::Parallel { concurrency } => concurrency.max(1),
    };

    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        handles.push(tokio::spawn(worker(
            driver.clone(),
            form.clone(),
            queue.clone(),
            pool.clone(),
            stats.clone(),
            results.clone(),
            events.clone(),
            rotation.clone(),
            attempt_counter.clone(),
        )));
    }
    for h in handles {
        let _ = h.await;
    }

    let report = crate::runner::report::finalize(
        run_id,
        target_url,
        started_at,
        now_ms(),
        stats.snapshot(),
        results.lock().await.clone(),
    );
    let _ = events.send(RunEvent::Complete(report.clone())).await;
    report
}
