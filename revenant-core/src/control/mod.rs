//! Control protocol (C7): a WebSocket server multiplexing session
//! commands and events between the front-end and the session runner.
//! One task per connection; within a connection, one reader loop
//! dispatching `ClientMessage`s and one writer task draining a bounded
//! `mpsc` channel of `ServerEvent`s — single writer per socket,
//! senders just enqueue frames.

pub mod messages;
pub mod registry;

use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::error::{Result, RevenantError};
use crate::model::FormSelectorBundle;
use crate::runner::rotation::{ConcurrencyMode, RunEvent};
use crate::runner::SessionRunner;

pub use messages::{ClientMessage, ServerEvent};
pub use registry::{RunHandle, RunRegistry};

const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Binds `port` and serves connections until the listener itself fails.
/// Each accepted socket gets its own reader/writer task pair; a failure
/// on one connection never takes down another.
pub async fn serve(runner: Arc<SessionRunner>, run_registry: Arc<RunRegistry>, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await.map_err(RevenantError::Io)?;
    info!(port, "control protocol listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let runner = runner.clone();
        let run_registry = run_registry.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, runner, run_registry).await {
                warn!(peer = %peer, error = %e, "control connection ended with error");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, runner: Arc<SessionRunner>, run_registry: Arc<RunRegistry>) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| RevenantError::Protocol(e.to_string()))?;
    let (mut write, mut read) = ws.split();

    let (tx, mut rx) = mpsc::channel::<ServerEvent>(EVENT_QUEUE_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    error!(error = %e, "failed to serialise server event");
                    continue;
                }
            };
            if write.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "control socket read error");
                break;
            }
        };
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        let parsed: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                let _ = tx.send(ServerEvent::LoginError { session_id: None, reason: e.to_string() }).await;
                continue;
            }
        };
        dispatch(parsed, &runner, &run_registry, &tx).await;
    }

    drop(tx);
    let _ = writer.await;
    Ok(())
}

/// Runs one `ClientMessage` to completion and pushes whatever
/// `ServerEvent`(s) it produces onto `tx`. Errors from the runner become
/// a `loginError` frame rather than tearing down the connection — a
/// failed `click` on one session shouldn't drop every other session's
/// event stream.
async fn dispatch(msg: ClientMessage, runner: &Arc<SessionRunner>, run_registry: &Arc<RunRegistry>, tx: &mpsc::Sender<ServerEvent>) {
    match msg {
        ClientMessage::Launch { profile } => match runner.launch_session(profile).await {
            Ok(session_id) => {
                let degraded = runner.session(&session_id).map(|s| s.is_degraded()).unwrap_or(false);
                let _ = tx.send(ServerEvent::Ready { session_id, degraded }).await;
            }
            Err(e) => {
                let _ = tx.send(ServerEvent::LoginError { session_id: None, reason: e.to_string() }).await;
            }
        },

        ClientMessage::Navigate { session_id, url } => match with_session(runner, &session_id, tx).await {
            Some(session) => match session.navigate(&url).await {
                Ok(()) => {
                    let _ = tx.send(ServerEvent::Navigated { session_id, url }).await;
                }
                Err(e) => report_error(tx, Some(session_id), e).await,
            },
            None => {}
        },

        ClientMessage::Click { session_id, selector } => {
            if let Some(session) = with_session(runner, &session_id, tx).await {
                if let Err(e) = session.click_selector(&selector).await {
                    report_error(tx, Some(session_id), e).await;
                }
            }
        }

        ClientMessage::Type { session_id, selector, text } => {
            if let Some(session) = with_session(runner, &session_id, tx).await {
                if let Err(e) = session.type_into(&selector, &text).await {
                    report_error(tx, Some(session_id), e).await;
                }
            }
        }

        ClientMessage::Execute { session_id, script } => {
            if let Some(session) = with_session(runner, &session_id, tx).await {
                match session.execute_script(&script) {
                    Ok(value) => {
                        let _ = tx.send(ServerEvent::Entropy { session_id, sample: value }).await;
                    }
                    Err(e) => report_error(tx, Some(session_id), e).await,
                }
            }
        }

        ClientMessage::Screenshot { session_id } => {
            if let Some(session) = with_session(runner, &session_id, tx).await {
                match session.screenshot() {
                    Ok(bytes) => {
                        let entry = serde_json::json!({ "screenshot_base64": general_purpose::STANDARD.encode(bytes) });
                        let _ = tx.send(ServerEvent::Har { session_id, entry }).await;
                    }
                    Err(e) => report_error(tx, Some(session_id), e).await,
                }
            }
        }

        ClientMessage::RunLogin { run_id, form, credentials, profiles, policy, concurrency } => {
            start_run(runner, run_registry, run_id, form, credentials, profiles, policy, concurrency, tx.clone()).await;
        }

        ClientMessage::Stop { session_id } => {
            if let Err(e) = runner.stop_session(&session_id).await {
                report_error(tx, Some(session_id), e).await;
            }
        }

        ClientMessage::Ping => {
            let _ = tx.send(ServerEvent::Pong).await;
        }
    }
}

async fn with_session(runner: &Arc<SessionRunner>, session_id: &str, tx: &mpsc::Sender<ServerEvent>) -> Option<Arc<crate::runner::Session>> {
    match runner.session(session_id) {
        Ok(s) => Some(s),
        Err(e) => {
            let _ = tx.send(ServerEvent::LoginError { session_id: Some(session_id.to_string()), reason: e.to_string() }).await;
            None
        }
    }
}

async fn report_error(tx: &mpsc::Sender<ServerEvent>, session_id: Option<String>, e: RevenantError) {
    let _ = tx.send(ServerEvent::LoginError { session_id, reason: e.to_string() }).await;
}

#[allow(clippy::too_many_arguments)]
async fn start_run(
    runner: &Arc<SessionRunner>,
    run_registry: &Arc<RunRegistry>,
    run_id: Option<String>,
    form: FormSelectorBundle,
    credentials: Vec<crate::model::Credential>,
    profiles: Vec<crate::model::Profile>,
    policy: crate::model::RotationPolicy,
    concurrency: u32,
    tx: mpsc::Sender<ServerEvent>,
) {
    let run_id = run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mode = if concurrency > 1 { ConcurrencyMode::Parallel { concurrency: concurrency as usize } } else { ConcurrencyMode::Sequential };

    let (mut events, handle) = runner.start_run(run_id.clone(), form.clone(), credentials, profiles, policy, mode);
    run_registry.insert(run_id.clone(), RunHandle::new(form.url.clone(), tx.clone()));

    let run_id_for_events = run_id.clone();
    let registry = run_registry.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let _ = tx.send(map_run_event(&run_id_for_events, event)).await;
        }
        registry.remove(&run_id_for_events);
    });

    tokio::spawn(async move {
        let _ = handle.await;
    });
}

fn map_run_event(run_id: &str, event: RunEvent) -> ServerEvent {
    match event {
        RunEvent::AttemptStart { attempt, credential_index } => {
            ServerEvent::LoginAttemptStart { run_id: run_id.to_string(), attempt, credential_index }
        }
        RunEvent::AttemptResult { attempt, result } => {
            ServerEvent::LoginAttemptResult { run_id: run_id.to_string(), attempt, result }
        }
        RunEvent::Rotation(event) => ServerEvent::LoginRotation { run_id: run_id.to_string(), event },
        RunEvent::Complete(report) => ServerEvent::LoginRunComplete { run_id: run_id.to_string(), report },
        RunEvent::Aborted(reason) => ServerEvent::LoginRunAborted { run_id: run_id.to_string(), reason },
    }
}

/// Emergency stop: cancels every live session, then fans a
/// `loginRunAborted` frame out to every run still tracked in
/// `run_registry` before clearing it. Not a wire command in its own
/// right — fatal-error handling and operator tooling call this directly.
pub async fn panic_all(runner: &SessionRunner, run_registry: &RunRegistry) {
    runner.panic().await;
    for (run_id, sender) in run_registry.senders() {
        let _ = sender.send(ServerEvent::LoginRunAborted { run_id: run_id.clone(), reason: "panic".to_string() }).await;
        run_registry.remove(&run_id);
    }
}
