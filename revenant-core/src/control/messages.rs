//! Wire types for the control protocol. `ClientMessage` is
//! what arrives over the WebSocket text channel; `ServerEvent` is what
//! goes back out. Kept separate from `runner`'s internal `RunEvent` so
//! the internal event shape can change without touching the wire.

use serde::{Deserialize, Serialize};

use crate::model::{AttemptResult, Credential, FormSelectorBundle, Profile, RotationEvent, RotationPolicy, RunReport};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Launch {
        profile: Profile,
    },
    Navigate {
        session_id: String,
        url: String,
    },
    Click {
        session_id: String,
        selector: String,
    },
    #[serde(rename = "type")]
    Type {
        session_id: String,
        selector: String,
        text: String,
    },
    Execute {
        session_id: String,
        script: String,
    },
    Screenshot {
        session_id: String,
    },
    RunLogin {
        #[serde(default)]
        run_id: Option<String>,
        form: FormSelectorBundle,
        credentials: Vec<Credential>,
        profiles: Vec<Profile>,
        #[serde(default)]
        policy: RotationPolicy,
        #[serde(default)]
        concurrency: u32,
    },
    Stop {
        session_id: String,
    },
    Ping,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    Ready {
        session_id: String,
        degraded: bool,
    },
    Navigated {
        session_id: String,
        url: String,
    },
    Har {
        session_id: String,
        entry: serde_json::Value,
    },
    Entropy {
        session_id: String,
        sample: serde_json::Value,
    },
    LoginAttemptStart {
        run_id: String,
        attempt: u32,
        credential_index: usize,
    },
    LoginAttemptResult {
        run_id: String,
        attempt: u32,
        result: AttemptResult,
    },
    LoginRotation {
        run_id: String,
        event: RotationEvent,
    },
    LoginRunComplete {
        run_id: String,
        report: RunReport,
    },
    LoginRunPaused {
        run_id: String,
    },
    LoginRunAborted {
        run_id: String,
        reason: String,
    },
    LoginError {
        session_id: Option<String>,
        reason: String,
    },
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_type_variant_serializes_field_as_json_type() {
        let json = r#"{"type":"type","sessionId":"s1","selector":"#u","text":"hi"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Type { session_id, selector, text } => {
                assert_eq!(session_id, "s1");
                assert_eq!(selector, "#u");
                assert_eq!(text, "hi");
            }
            _ => panic!("expected type variant"),
        }
    }

    #[test]
    fn client_message_ping_round_trips() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn server_event_pong_serializes_with_type_tag() {
        let json = serde_json::to_string(&ServerEvent::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn run_login_policy_and_concurrency_default_when_omitted() {
        let json = r#"{"type":"runLogin","form":{"url":"https://example.test/login","username_selector":"#u","password_selector":"#p","submit_selector":"#s","success_selector":null,"failure_selector":null,"captcha_selector":null,"consent_selector":null,"totp_selector":null,"mfa_selector":null,"post_submit_timeout_ms":8000,"page_load_timeout_ms":15000,"export_session_on_success":false},"credentials":[],"profiles":[]}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::RunLogin { policy, concurrency, run_id, .. } => {
                assert_eq!(policy.soft_threshold, 3);
                assert_eq!(concurrency, 0);
                assert!(run_id.is_none());
            }
            _ => panic!("expected RunLogin variant"),
        }
    }
}
