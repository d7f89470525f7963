//! Shared data model. Every type here is plain data — serialisable,
//! clonable, no runtime handles — so it can cross the control-protocol
//! wire unchanged. Runtime entities that own a browser process or an RNG
//! stream (the live `Session`) live in `runner`, not here.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsToken {
    Windows11,
    MacOs14,
    Linux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserToken {
    Chrome,
    Firefox,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviourProfile {
    Bot,
    Fast,
    Normal,
    Cautious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Idle,
    Running,
    Error,
    Banned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRef {
    pub endpoint: String,
    pub country_hint: Option<String>,
    /// Routes the browser's proxy setting to an external TLS/JA4 sidecar
    /// instead of connecting directly. The sidecar itself is not part of
    /// this core.
    pub tls_bridge: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub seed: u32,
    pub os: OsToken,
    pub browser: BrowserToken,
    pub target_url_hint: Option<String>,
    pub proxy: Option<ProxyRef>,
    pub behaviour_profile: BehaviourProfile,
    pub status: ProfileStatus,
}

impl Profile {
    pub fn proxy_country_hint(&self) -> Option<&str> {
        self.proxy.as_ref().and_then(|p| p.country_hint.as_deref())
    }
}

// ---------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UaBrand {
    pub brand: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebRtcMode {
    Block,
    FakeMdns,
    Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebRtcConfig {
    pub mode: WebRtcMode,
    pub fake_mdns: Option<String>,
    pub fake_ip: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

/// The invariant identity for one session, computed once at session
/// start and frozen thereafter. See `fingerprint::synthesize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    // Identity strings
    pub user_agent: String,
    pub ua_platform: String,
    pub ua_platform_version: String,
    pub ua_architecture: String,
    pub ua_bitness: String,
    pub ua_mobile: bool,
    pub ua_brands: Vec<UaBrand>,
    pub chrome_major: u32,

    // Hardware
    pub hardware_concurrency: u32,
    pub device_memory: f64,

    // Display
    pub screen_w: u32,
    pub screen_h: u32,
    pub viewport_w: u32,
    pub viewport_h: u32,
    pub color_depth: u32,
    pub pixel_ratio: f64,

    // Noise amplitudes
    pub canvas_noise: f64,
    pub webgl_noise: f64,
    pub audio_noise: f64,
    pub webgl_vendor: String,
    pub webgl_renderer: String,

    // Fonts
    pub font_subset: Vec<String>,

    // WebRTC
    pub webrtc: WebRtcConfig,

    // Network
    pub accept_language: String,
    pub timezone_id: String,
    pub locale: String,

    // Permissions. `BTreeMap`, not `HashMap`: std's `RandomState` reseeds
    // every process, which would make the serialized JSON (and therefore
    // `deterministic_for_fixed_seed`) iteration-order-dependent instead of
    // byte-stable across runs.
    pub permissions: BTreeMap<String, PermissionState>,

    /// Set by the geo-validator when timezone/locale/accept-language were
    /// rewritten to agree with the proxy's country.
    pub geo_corrected: bool,
}

// ---------------------------------------------------------------------
// Attempts / runs
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Running,
    Success,
    WrongCredentials,
    SoftBlocked,
    HardBlocked,
    Timeout,
    Error,
    Skipped,
}

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptStatus::Success
                | AttemptStatus::WrongCredentials
                | AttemptStatus::HardBlocked
                | AttemptStatus::Timeout
                | AttemptStatus::Error
                | AttemptStatus::Skipped
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationEvent {
    pub reason: String,
    pub at_attempt: u32,
    pub from_profile: String,
    pub to_profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
    pub expiry: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreSnapshot {
    pub name: String,
    pub records: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDbSnapshot {
    pub db_name: String,
    pub version: u32,
    pub stores: Vec<ObjectStoreSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBlob {
    pub credential_id: String,
    pub captured_at: u64,
    pub cookies: Vec<CookieRecord>,
    pub local_storage: HashMap<String, String>,
    pub indexed_db: Vec<IndexedDbSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResult {
    pub status: AttemptStatus,
    pub outcome: Option<String>,
    pub profile_id: String,
    pub duration_ms: u64,
    pub final_url: Option<String>,
    pub started_at: u64,
    pub ended_at: Option<u64>,
    pub rotation_events: Vec<RotationEvent>,
    pub session_blob: Option<SessionBlob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_bytes: Option<Vec<u8>>,
}

// ---------------------------------------------------------------------
// Inputs from the external scraper collaborator
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSelectorBundle {
    pub url: String,
    pub username_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    pub success_selector: Option<String>,
    pub failure_selector: Option<String>,
    pub captcha_selector: Option<String>,
    pub consent_selector: Option<String>,
    pub totp_selector: Option<String>,
    pub mfa_selector: Option<String>,
    pub post_submit_timeout_ms: u64,
    pub page_load_timeout_ms: u64,
    pub export_session_on_success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub extras: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RotationPolicy {
    pub rotate_every_attempt: u32,
    pub soft_threshold: u32,
    pub max_retries: u32,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self { rotate_every_attempt: 0, soft_threshold: 3, max_retries: 2 }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub soft_blocked: u64,
    pub hard_blocked: u64,
    pub error: u64,
    pub rotations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub target_url: String,
    pub started_at: u64,
    pub ended_at: u64,
    pub stats: RunStats,
    pub results: Vec<AttemptResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_status_terminal_classification() {
        assert!(AttemptStatus::Success.is_terminal());
        assert!(AttemptStatus::Skipped.is_terminal());
        assert!(!AttemptStatus::Pending.is_terminal());
        assert!(!AttemptStatus::Running.is_terminal());
        assert!(!AttemptStatus::SoftBlocked.is_terminal());
    }

    #[test]
    fn profile_round_trips_through_json() {
        let p = Profile {
            id: "p1".into(),
            display_name: "test".into(),
            seed: 42,
            os: OsToken::Windows11,
            browser: BrowserToken::Chrome,
            target_url_hint: None,
            proxy: None,
            behaviour_profile: BehaviourProfile::Normal,
            status: ProfileStatus::Idle,
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seed, 42);
        assert_eq!(back.os, OsToken::Windows11);
    }

    #[test]
    fn rotation_policy_defaults() {
        let p = RotationPolicy::default();
        assert_eq!(p.rotate_every_attempt, 0);
        assert_eq!(p.soft_threshold, 3);
        assert_eq!(p.max_retries, 2);
    }
}
