//! Browser session lifecycle. Launches one `headless_chrome::Browser`
//! per session and installs the evasion script bundle (C3) and the
//! header interceptor (C4) before the first navigation, so every
//! script `evasion::build_all` produces for this session's
//! `Fingerprint` is in place before any page load can observe the
//! unpatched surface.

use std::collections::HashMap;
use std::sync::Arc;

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormat;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::warn;

use crate::error::{Result, RevenantError};
use crate::evasion;
use crate::interceptor::{self, HeaderPolicy};
use crate::model::{CookieRecord, Fingerprint, IndexedDbSnapshot, SessionBlob};
use crate::runner::classifier::ClassifierSignals;

pub struct BrowserSession {
    browser: Browser,
    tab: Arc<Tab>,
    session_id: String,
    /// Set if any evasion surface or the interceptor failed to install.
    /// The session still runs; `runner` rides this into the session's
    /// `ready` event so the control-protocol client can decide whether
    /// to trust it.
    degraded: bool,
}

impl BrowserSession {
    pub fn launch(session_id: String, headless: bool, fingerprint: &Fingerprint, header_seed: u32) -> Result<Self> {
        let launch_options = LaunchOptions {
            headless,
            window_size: Some((fingerprint.viewport_w, fingerprint.viewport_h)),
            args: vec![
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--no-sandbox".to_string(),
            ],
            ..Default::default()
        };

        let browser = Browser::new(launch_options).map_err(|e| RevenantError::Browser(e.to_string()))?;
        let tab = browser.wait_for_initial_tab().map_err(|e| RevenantError::Browser(e.to_string()))?;
        tab.set_viewport_size(fingerprint.viewport_w as usize, fingerprint.viewport_h as usize)
            .map_err(|e| RevenantError::Browser(e.to_string()))?;

        let mut degraded = false;

        for (surface, script) in evasion::build_all(fingerprint) {
            if let Err(e) = tab.call_method(
                "Page.addScriptToEvaluateOnNewDocument",
                serde_json::json!({ "source": script }),
            ) {
                warn!(surface = surface.name(), error = %e, "evasion surface failed to install");
                degraded = true;
            }
        }

        let header_policy = Arc::new(HeaderPolicy::new(header_seed, fingerprint.chrome_major));
        if let Err(e) = interceptor::install_on(&tab, header_policy) {
            warn!(error = %e, "header interceptor failed to install");
            degraded = true;
        }

        Ok(Self { browser, tab, session_id, degraded })
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn degraded(&self) -> bool {
        self.degraded
    }

    pub fn navigate(&self, url: &str) -> Result<()> {
        self.tab.navigate_to(url).map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
        self.tab.wait_until_navigated().map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
        Ok(())
    }

    pub fn current_url(&self) -> String {
        self.tab.get_url()
    }

    /// Bounding-box centre of the first element matching `selector`, in
    /// viewport coordinates — the target `input::mouse::plan_path` aims
    /// at for a human-like click.
    pub fn element_center(&self, selector: &str) -> Result<(f64, f64)> {
        let element = self.tab.wait_for_element(selector).map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
        let quad = element.get_box_model().map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
        let c = &quad.content;
        let x = (c.top_left.x + c.top_right.x + c.bottom_right.x + c.bottom_left.x) / 4.0;
        let y = (c.top_left.y + c.top_right.y + c.bottom_right.y + c.bottom_left.y) / 4.0;
        Ok((x, y))
    }

    pub fn element_visible(&self, selector: &str) -> bool {
        self.tab.find_element(selector).is_ok()
    }

    pub fn capture_screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormat::Png, None, true)
            .map_err(|e| RevenantError::ActionFailed(e.to_string()))
    }

    /// Gathers the signals `runner::classifier::classify` needs from a
    /// live page, per the `FormSelectorBundle`'s optional selectors.
    pub fn poll_signals(&self, form: &crate::model::FormSelectorBundle) -> ClassifierSignals {
        let visible = |sel: &Option<String>| sel.as_deref().map(|s| self.element_visible(s)).unwrap_or(false);
        let captcha_marker = form
            .captcha_selector
            .as_deref()
            .filter(|_| visible(&form.captcha_selector))
            .map(|_| "configured".to_string())
            .or_else(|| {
                crate::constants::CAPTCHA_MARKERS
                    .iter()
                    .find(|(_, selectors)| selectors.iter().any(|s| self.element_visible(s)))
                    .map(|(name, _)| name.to_string())
            });

        ClassifierSignals {
            success_visible: visible(&form.success_selector),
            failure_visible: visible(&form.failure_selector),
            captcha_marker,
            rate_limited: false,
            ip_blocked: false,
            account_locked: false,
        }
    }

    /// Runs arbitrary JS in the page and returns its value — what the
    /// control protocol's `execute` command calls through.
    pub fn evaluate(&self, expression: &str) -> Result<serde_json::Value> {
        let remote = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
        remote
            .value
            .ok_or_else(|| RevenantError::ActionFailed("evaluate returned no value".into()))
    }

    fn capture_cookies(&self) -> Result<Vec<CookieRecord>> {
        let cookies = self.tab.get_cookies().map_err(|e| RevenantError::ActionFailed(e.to_string()))?;
        Ok(cookies
            .into_iter()
            .map(|c| CookieRecord {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
                same_site: c.same_site.map(|s| format!("{s:?}")),
                expiry: Some(c.expires),
            })
            .collect())
    }

    fn capture_local_storage(&self) -> Result<HashMap<String, String>> {
        let value = self.evaluate(
            "JSON.stringify(Object.fromEntries(Object.keys(localStorage).map(k => [k, localStorage.getItem(k)])))",
        )?;
        let raw = value.as_str().unwrap_or("{}");
        serde_json::from_str(raw).map_err(RevenantError::Serialization)
    }

    /// Enumerates every IndexedDB database for the page's current origin
    /// and every record in every object store, via the CDP `IndexedDB`
    /// domain (`enable` / `requestDatabaseNames` / `requestDatabase` /
    /// `requestData`) rather than `indexedDB.databases()`, which is
    /// async in-page and this driver's `evaluate` call is synchronous.
    /// A failure at any step (domain not enabled, database vanished
    /// mid-enumeration) stops enumeration for that database/store and
    /// keeps whatever was already collected — best-effort, not fatal.
    fn capture_indexed_db(&self) -> Result<Vec<IndexedDbSnapshot>> {
        const PAGE_SIZE: u32 = 1000;

        let origin = self.current_url();

        if self.tab.call_method("IndexedDB.enable", serde_json::json!({})).is_err() {
            return Ok(Vec::new());
        }

        let names_response = match self
            .tab
            .call_method("IndexedDB.requestDatabaseNames", serde_json::json!({ "securityOrigin": origin }))
        {
            Ok(r) => r,
            Err(_) => return Ok(Vec::new()),
        };
        let names_value = serde_json::to_value(&names_response).unwrap_or_default();
        let database_names: Vec<String> = names_value
            .get("databaseNames")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        let mut snapshots = Vec::with_capacity(database_names.len());
        for db_name in database_names {
            let db_response = match self.tab.call_method(
                "IndexedDB.requestDatabase",
                serde_json::json!({ "securityOrigin": origin, "databaseName": db_name }),
            ) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let db_value = serde_json::to_value(&db_response).unwrap_or_default();
            let with_stores = db_value.get("databaseWithObjectStores").cloned().unwrap_or_default();
            let version = with_stores.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            let store_names: Vec<String> = with_stores
                .get("objectStores")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|s| s.get("name").and_then(|n| n.as_str()).map(String::from))
                        .collect()
                })
                .unwrap_or_default();

            let mut stores = Vec::with_capacity(store_names.len());
            for store_name in store_names {
                let mut records = Vec::new();
                let mut skip_count: u32 = 0;
                loop {
                    let data_response = match self.tab.call_method(
                        "IndexedDB.requestData",
                        serde_json::json!({
                            "securityOrigin": origin,
                            "databaseName": db_name,
                            "objectStoreName": store_name,
                            "indexName": "",
                            "skipCount": skip_count,
                            "pageSize": PAGE_SIZE,
                        }),
                    ) {
                        Ok(r) => r,
                        Err(_) => break,
                    };
                    let data_value = serde_json::to_value(&data_response).unwrap_or_default();
                    let entries =
                        data_value.get("objectStoreDataEntries").and_then(|v| v.as_array()).cloned().unwrap_or_default();
                    let page_len = entries.len();
                    for entry in &entries {
                        if let Some(value) = entry.get("value").and_then(|v| v.get("value")).cloned() {
                            records.push(value);
                        }
                    }
                    skip_count += page_len as u32;
                    let has_more = data_value.get("hasMore").and_then(|v| v.as_bool()).unwrap_or(false);
                    if !has_more || page_len == 0 {
                        break;
                    }
                }
                stores.push(crate::model::ObjectStoreSnapshot { name: store_name, records });
            }

            snapshots.push(IndexedDbSnapshot { db_name, version, stores });
        }

        Ok(snapshots)
    }

    pub fn capture_session_blob(&self, credential_id: String) -> Result<SessionBlob> {
        Ok(SessionBlob {
            credential_id,
            captured_at: crate::runner::rotation::now_ms(),
            cookies: self.capture_cookies()?,
            local_storage: self.capture_local_storage()?,
            indexed_db: self.capture_indexed_db()?,
        })
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        tracing::info!(session_id = %self.session_id, "closing browser session");
    }
}
