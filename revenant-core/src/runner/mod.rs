//! Session Runner (C6). Owns the live `BrowserSession` + RNG stream +
//! mouse state for one running identity, classifies submit outcomes,
//! and drives the rotation loop across a credential batch. This is the
//! one place that touches every other component: C1 (`rng`), C2/C3/C4
//! (`fingerprint`/`evasion`/`interceptor`, via `browser::BrowserSession`
//! which installs them), C5 (`input`), and feeds C7 (`control`) through
//! the `RunEvent` stream `rotation::drive` emits.

pub mod capture;
pub mod classifier;
pub mod report;
pub mod rotation;
pub mod stats;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::error::{Result, RevenantError};
use crate::input::mouse::MouseState;
use crate::input::{keyboard, mouse, new_cancel_flag, scroll, BehaviourTuning, CancelFlag};
use crate::model::{Credential, FormSelectorBundle, Profile, RotationPolicy};
use crate::rng::SeededRng;
use crate::runner::classifier::Classification;
use crate::runner::rotation::{CredentialAttemptDriver, RunEvent};

/// Opaque per-session handle, as the control protocol hands it back to
/// clients: an id string with no exposed internals.
pub type SessionHandle = String;

const PANIC_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Session {
    id: SessionHandle,
    profile: Profile,
    browser: crate::browser::BrowserSession,
    rng: Mutex<SeededRng>,
    mouse_state: Mutex<MouseState>,
    tuning: BehaviourTuning,
    cancel: CancelFlag,
    degraded: AtomicBool,
}

impl Session {
    fn launch(profile: Profile, headless: bool) -> Result<Arc<Session>> {
        let fingerprint = crate::fingerprint::synthesize(&profile);
        crate::fingerprint::invariant_check(&fingerprint).map_err(RevenantError::Validation)?;

        let id = uuid::Uuid::new_v4().to_string();
        let seed = profile.seed;
        let browser = crate::browser::BrowserSession::launch(id.clone(), headless, &fingerprint, seed)?;
        let degraded = AtomicBool::new(browser.degraded());
        let tuning = BehaviourTuning::for_profile(profile.behaviour_profile);
        let viewport = (fingerprint.viewport_w as f64 / 2.0, fingerprint.viewport_h as f64 / 2.0);

        Ok(Arc::new(Session {
            id,
            profile,
            browser,
            rng: Mutex::new(SeededRng::new(seed)),
            mouse_state: Mutex::new(MouseState::new(viewport.0, viewport.1)),
            tuning,
            cancel: new_cancel_flag(),
            degraded,
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.browser.navigate(url)
    }

    pub async fn click_selector(&self, selector: &str) -> Result<()> {
        let target = self.browser.element_center(selector)?;
        let mut rng = self.rng.lock().await;
        let mut state = self.mouse_state.lock().await;
        mouse::move_and_click(self.browser.tab(), &mut rng, &mut state, target, &self.tuning, &self.cancel).await
    }

    pub async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        self.click_selector(selector).await?;
        let mut rng = self.rng.lock().await;
        let events = keyboard::plan_typing(&mut rng, text, &self.tuning);
        keyboard::execute_typing(self.browser.tab(), &events, &self.cancel).await
    }

    pub async fn scroll_by(&self, target_px: f64) -> Result<()> {
        let mut rng = self.rng.lock().await;
        let ticks = scroll::plan_scroll(&mut rng, target_px, &Default::default());
        let (x, y) = {
            let state = self.mouse_state.lock().await;
            (state.x, state.y)
        };
        scroll::execute_scroll(self.browser.tab(), x, y, &ticks, &self.cancel).await
    }

    pub fn screenshot(&self) -> Result<Vec<u8>> {
        self.browser.capture_screenshot()
    }

    /// Arbitrary JS execution for the control protocol's `execute`
    /// command — not used by the rotation driver itself.
    pub fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        self.browser.evaluate(script)
    }

    /// Runs one login attempt: fills username/password (and TOTP/MFA if
    /// the form bundle names a selector), submits, then polls for a
    /// terminal signal until `post_submit_timeout_ms` elapses.
    async fn attempt_credential(&self, form: &FormSelectorBundle, credential: &Credential) -> Classification {
        if let Err(e) = self.navigate(&form.url).await {
            return Classification { status: crate::model::AttemptStatus::Error, outcome: e.to_string() };
        }
        if let Some(consent) = &form.consent_selector {
            let _ = self.click_selector(consent).await;
        }
        if let Err(e) = self.type_into(&form.username_selector, &credential.username).await {
            return Classification { status: crate::model::AttemptStatus::Error, outcome: e.to_string() };
        }
        if let Err(e) = self.type_into(&form.password_selector, &credential.password).await {
            return Classification { status: crate::model::AttemptStatus::Error, outcome: e.to_string() };
        }
        if let Some(totp_selector) = &form.totp_selector {
            if let Some(extras) = &credential.extras {
                if let Some(code) = extras.get("totp") {
                    let _ = self.type_into(totp_selector, code).await;
                }
            }
        }
        if let Err(e) = self.click_selector(&form.submit_selector).await {
            return Classification { status: crate::model::AttemptStatus::Error, outcome: e.to_string() };
        }

        let deadline = tokio::time::Instant::now() + Duration::from_millis(form.post_submit_timeout_ms);
        let poll_interval = Duration::from_millis(250);
        loop {
            let signals = self.browser.poll_signals(form);
            if let Some(c) = classifier::classify(&signals) {
                return c;
            }
            if tokio::time::Instant::now() >= deadline {
                return Classification {
                    status: crate::model::AttemptStatus::Timeout,
                    outcome: "post_submit_timeout".into(),
                };
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Registry of every currently running session, keyed by its opaque
/// handle — the one lock-guarded piece of shared state the control
/// protocol (C7) reaches into directly.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionHandle, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.write().unwrap().insert(session.id().to_string(), session);
    }

    pub fn get(&self, handle: &str) -> Option<Arc<Session>> {
        self.sessions.read().unwrap().get(handle).cloned()
    }

    pub fn remove(&self, handle: &str) -> Option<Arc<Session>> {
        self.sessions.write().unwrap().remove(handle)
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().unwrap().values().cloned().collect()
    }
}

/// Top-level session orchestrator. One instance per process; owns the
/// shared registry plus the stats/rotation bookkeeping for whatever
/// batch run is currently in flight.
pub struct SessionRunner {
    registry: Arc<SessionRegistry>,
    headless: bool,
}

impl SessionRunner {
    pub fn new(headless: bool) -> Self {
        Self { registry: Arc::new(SessionRegistry::default()), headless }
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Launches one ad-hoc session outside of a credential-rotation run,
    /// for the single-session control-protocol commands (`launchSession`
    /// / `navigate` / `click` / `type` / ...).
    pub async fn launch_session(&self, profile: Profile) -> Result<SessionHandle> {
        let session = Session::launch(profile, self.headless)?;
        let id = session.id().to_string();
        self.registry.insert(session);
        Ok(id)
    }

    pub async fn stop_session(&self, handle: &str) -> Result<()> {
        let session = self.registry.remove(handle).ok_or_else(|| RevenantError::SessionNotFound(handle.to_string()))?;
        session.cancel();
        Ok(())
    }

    /// Cancellation fan-out for an emergency stop: flips every session's
    /// cancel flag, then gives each up to `PANIC_JOIN_TIMEOUT` to settle
    /// before detaching it from the registry regardless.
    pub async fn panic(&self) {
        let sessions = self.registry.all();
        for s in &sessions {
            s.cancel();
        }
        let _ = tokio::time::timeout(PANIC_JOIN_TIMEOUT, async {
            for s in &sessions {
                self.registry.remove(s.id());
            }
        })
        .await;
    }

    pub fn session(&self, handle: &str) -> Result<Arc<Session>> {
        self.registry.get(handle).ok_or_else(|| RevenantError::SessionNotFound(handle.to_string()))
    }

    /// Starts a credential-rotation batch run. Returns the event stream
    /// the control protocol (C7) forwards as `loginAttemptStart` /
    /// `loginAttemptResult` / `loginRotation` / `loginRunComplete`
    /// frames, plus a `JoinHandle` the caller can await for the final
    /// `RunReport`.
    pub fn start_run(
        self: &Arc<Self>,
        run_id: String,
        form: FormSelectorBundle,
        credentials: Vec<Credential>,
        profiles: Vec<Profile>,
        policy: RotationPolicy,
        mode: rotation::ConcurrencyMode,
    ) -> (mpsc::Receiver<RunEvent>, tokio::task::JoinHandle<crate::model::RunReport>) {
        let (tx, rx) = mpsc::channel(1024);
        let driver = Arc::new(BrowserDriver { runner: self.clone() });
        let target_url = form.url.clone();
        let handle = tokio::spawn(rotation::drive(
            run_id, target_url, form, credentials, profiles, policy, mode, driver, tx,
        ));
        (rx, handle)
    }
}

/// Adapts `SessionRunner` to the `CredentialAttemptDriver` trait so
/// `rotation::drive` never has to know it's talking to a real browser.
struct BrowserDriver {
    runner: Arc<SessionRunner>,
}

#[async_trait::async_trait]
impl CredentialAttemptDriver for BrowserDriver {
    async fn launch(&self, profile: Profile) -> Result<SessionHandle> {
        self.runner.launch_session(profile).await
    }

    async fn stop(&self, session: &SessionHandle) {
        let _ = self.runner.stop_session(session).await;
    }

    async fn attempt(&self, session: &SessionHandle, form: &FormSelectorBundle, credential: &Credential) -> Classification {
        match self.runner.session(session) {
            Ok(s) => s.attempt_credential(form, credential).await,
            Err(e) => Classification { status: crate::model::AttemptStatus::Error, outcome: e.to_string() },
        }
    }

    async fn capture_session_blob(&self, session: &SessionHandle, credential_id: String) -> Option<crate::model::SessionBlob> {
        let s = self.runner.session(session).ok()?;
        capture::session_blob(&s, credential_id).ok()
    }
}
