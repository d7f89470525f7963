//! Header/Route Interceptor (C4). Rewrites every outbound request's
//! header set to a seeded, internally consistent shape and a JA4H
//! canonical order. The pure rewrite logic lives here; `install_on`
//! wires it to a `headless_chrome::Tab`'s CDP `Fetch` domain the same
//! way `browser.rs` wires one-shot scripts onto `Page` — string method
//! name plus a `serde_json::json!` parameter blob.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::constants::{
    IMAGE_ACCEPT_POOL, JA4H_NAVIGATION_ORDER, JA4H_SUBRESOURCE_ORDER, NAVIGATION_ACCEPT_POOL,
    XHR_ACCEPT_POOL,
};
use crate::rng::SeededRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Document,
    Xhr,
    Image,
    Script,
    Stylesheet,
    Font,
    Other,
}

impl ResourceType {
    pub fn from_cdp_str(s: &str) -> Self {
        match s {
            "Document" => ResourceType::Document,
            "XHR" | "Fetch" => ResourceType::Xhr,
            "Image" => ResourceType::Image,
            "Script" => ResourceType::Script,
            "Stylesheet" => ResourceType::Stylesheet,
            "Font" => ResourceType::Font,
            _ => ResourceType::Other,
        }
    }

    fn is_navigation(self) -> bool {
        matches!(self, ResourceType::Document)
    }

    fn priority_value(self) -> &'static str {
        match self {
            ResourceType::Document => "u=0, i",
            ResourceType::Script => "u=2",
            ResourceType::Stylesheet => "u=0",
            ResourceType::Image => "u=5, i",
            ResourceType::Font => "u=2",
            ResourceType::Xhr => "u=3",
            ResourceType::Other => "u=3",
        }
    }

    fn sec_fetch_defaults(self) -> (&'static str, &'static str, &'static str) {
        // (mode, dest, site) - user is handled separately (navigation only)
        match self {
            ResourceType::Document => ("navigate", "document", "same-origin"),
            ResourceType::Xhr => ("cors", "empty", "same-origin"),
            ResourceType::Image => ("no-cors", "image", "same-origin"),
            ResourceType::Script => ("no-cors", "script", "same-origin"),
            ResourceType::Stylesheet => ("no-cors", "style", "same-origin"),
            ResourceType::Font => ("no-cors", "font", "same-origin"),
            ResourceType::Other => ("no-cors", "empty", "same-origin"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CacheControlChoice {
    MaxAgeZero,
    Absent,
    NoCache,
}

/// Session-level choices drawn once at session start. Per-request
/// rewriting is deterministic given these plus the resource type.
pub struct HeaderPolicy {
    chrome_major: u32,
    accept_encoding_zstd: bool,
    accept_encoding_zstd_front: bool,
    navigation_cache_control: CacheControlChoice,
    te_enabled: bool,
    accept_choice: IndexMap<&'static str, usize>,
    failures: Arc<AtomicU64>,
}

impl HeaderPolicy {
    pub fn new(seed: u32, chrome_major: u32) -> Self {
        let mut rng = SeededRng::new(seed);
        let accept_encoding_zstd = chrome_major >= 124 && rng.chance(0.70);
        let accept_encoding_zstd_front = accept_encoding_zstd && rng.chance(0.08 / 0.70);
        let navigation_cache_control = if rng.chance(0.70) {
            CacheControlChoice::MaxAgeZero
        } else if rng.chance(0.20 / 0.30) {
            CacheControlChoice::Absent
        } else {
            CacheControlChoice::NoCache
        };
        let te_enabled = rng.chance(0.30);

        let mut accept_choice = IndexMap::new();
        accept_choice.insert("document", rng.int(0, NAVIGATION_ACCEPT_POOL.len() as i64 - 1) as usize);
        accept_choice.insert("xhr", rng.int(0, XHR_ACCEPT_POOL.len() as i64 - 1) as usize);
        accept_choice.insert("image", rng.int(0, IMAGE_ACCEPT_POOL.len() as i64 - 1) as usize);

        Self {
            chrome_major,
            accept_encoding_zstd,
            accept_encoding_zstd_front,
            navigation_cache_control,
            te_enabled,
            accept_choice,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    fn accept_for(&self, resource_type: ResourceType) -> &'static str {
        match resource_type {
            ResourceType::Document => NAVIGATION_ACCEPT_POOL[self.accept_choice["document"]],
            ResourceType::Xhr => XHR_ACCEPT_POOL[self.accept_choice["xhr"]],
            ResourceType::Image => IMAGE_ACCEPT_POOL[self.accept_choice["image"]],
            _ => "*/*",
        }
    }

    fn accept_encoding(&self) -> String {
        if !self.accept_encoding_zstd {
            return "gzip, deflate, br".to_string();
        }
        if self.accept_encoding_zstd_front {
            "zstd, gzip, deflate, br".to_string()
        } else {
            "gzip, deflate, br, zstd".to_string()
        }
    }

    /// Rewrites one request's header set. `existing` should contain
    /// whatever the browser already generated (cookie, origin, referer,
    /// content-type/length for bodies) so those pass through untouched;
    /// everything this policy governs is overwritten or inserted.
    pub fn rewrite(
        &self,
        resource_type: ResourceType,
        mut existing: IndexMap<String, String>,
        brands_header: Option<&str>,
    ) -> IndexMap<String, String> {
        existing.shift_remove("dnt");
        existing.shift_remove("DNT");
        existing.shift_remove("x-requested-with");
        existing.shift_remove("X-Requested-With");

        existing.insert("accept".to_string(), self.accept_for(resource_type).to_string());
        existing.insert("accept-encoding".to_string(), self.accept_encoding());
        existing.insert("accept-language".to_string(), existing.get("accept-language").cloned().unwrap_or_else(|| "en-US,en;q=0.9".to_string()));

        if let Some(brands) = brands_header {
            existing.insert("sec-ch-ua".to_string(), brands.to_string());
        }

        if resource_type.is_navigation() {
            match self.navigation_cache_control {
                CacheControlChoice::MaxAgeZero => {
                    existing.insert("cache-control".to_string(), "max-age=0".to_string());
                }
                CacheControlChoice::Absent => {
                    existing.shift_remove("cache-control");
                }
                CacheControlChoice::NoCache => {
                    existing.insert("cache-control".to_string(), "no-cache".to_string());
                }
            }
        } else {
            existing.shift_remove("cache-control");
        }

        if self.chrome_major >= 124 {
            existing.insert("priority".to_string(), resource_type.priority_value().to_string());
        } else {
            existing.shift_remove("priority");
        }

        if self.te_enabled && matches!(resource_type, ResourceType::Document | ResourceType::Xhr) {
            existing.insert("te".to_string(), "trailers".to_string());
        } else {
            existing.shift_remove("te");
        }

        let (mode, dest, site) = resource_type.sec_fetch_defaults();
        existing.entry("sec-fetch-mode".to_string()).or_insert_with(|| mode.to_string());
        existing.entry("sec-fetch-dest".to_string()).or_insert_with(|| dest.to_string());
        existing.entry("sec-fetch-site".to_string()).or_insert_with(|| site.to_string());
        if resource_type.is_navigation() {
            existing.entry("sec-fetch-user".to_string()).or_insert_with(|| "?1".to_string());
            existing.entry("upgrade-insecure-requests".to_string()).or_insert_with(|| "1".to_string());
        }

        reorder(resource_type, existing)
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn reorder(resource_type: ResourceType, headers: IndexMap<String, String>) -> IndexMap<String, String> {
    let order: &[&str] = if resource_type.is_navigation() {
        JA4H_NAVIGATION_ORDER
    } else {
        JA4H_SUBRESOURCE_ORDER
    };
    let mut out = IndexMap::with_capacity(headers.len());
    for name in order {
        if let Some((_, v)) = headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            out.insert(name.to_string(), v.clone());
        }
    }
    for (k, v) in headers.into_iter() {
        if !out.contains_key(&k.to_lowercase()) && !order.iter().any(|n| n.eq_ignore_ascii_case(&k)) {
            out.insert(k, v);
        }
    }
    out
}

/// Installs the interceptor on a tab's `Fetch` domain. Every intercepted
/// request is rewritten via `HeaderPolicy::rewrite`; a CDP error for a
/// single request is swallowed (the request is forwarded unchanged) and
/// counted rather than failing the session.
pub fn install_on(
    tab: &Arc<headless_chrome::Tab>,
    policy: Arc<HeaderPolicy>,
) -> crate::error::Result<()> {
    tab.call_method(
        "Fetch.enable",
        serde_json::json!({ "patterns": [{ "urlPattern": "*" }] }),
    )
    .map_err(|e| crate::error::RevenantError::Browser(e.to_string()))?;

    let policy_for_handler = policy.clone();
    let tab_for_handler = tab.clone();
    tab.add_event_listener(Arc::new(move |event: &headless_chrome::protocol::cdp::types::Event| {
        let headless_chrome::protocol::cdp::types::Event::FetchRequestPaused(ev) = event else {
            return;
        };

        // Go through `serde_json::Value` rather than the generated event
        // struct's field names directly: the CDP wire shape (`requestId`,
        // `resourceType`, `request.headers`) is stable; matching on it this
        // way is the same json!()-driven idiom `call_method` already uses
        // everywhere else in this module and in `browser.rs`.
        let raw = match serde_json::to_value(ev) {
            Ok(v) => v,
            Err(_) => {
                policy_for_handler.record_failure();
                return;
            }
        };
        let params = raw.get("params").unwrap_or(&raw);

        let request_id = match params.get("requestId").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => {
                policy_for_handler.record_failure();
                return;
            }
        };

        let resource_type_str = params.get("resourceType").and_then(|v| v.as_str()).unwrap_or("Other");
        let resource_type = ResourceType::from_cdp_str(resource_type_str);

        let mut existing = IndexMap::new();
        if let Some(obj) = params.get("request").and_then(|r| r.get("headers")).and_then(|h| h.as_object()) {
            for (k, v) in obj {
                if let Some(s) = v.as_str() {
                    existing.insert(k.clone(), s.to_string());
                }
            }
        }

        let rewritten = policy_for_handler.rewrite(resource_type, existing, None);
        let headers: Vec<serde_json::Value> = rewritten
            .into_iter()
            .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
            .collect();

        let continued = tab_for_handler.call_method(
            "Fetch.continueRequest",
            serde_json::json!({ "requestId": request_id, "headers": headers }),
        );
        if continued.is_err() {
            policy_for_handler.record_failure();
            let _ = tab_for_handler.call_method(
                "Fetch.continueRequest",
                serde_json::json!({ "requestId": request_id }),
            );
        }
    }))
    .map_err(|e| crate::error::RevenantError::Browser(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn strips_dnt_and_x_requested_with() {
        let policy = HeaderPolicy::new(1, 132);
        let out = policy.rewrite(ResourceType::Document, headers(&[("dnt", "1"), ("host", "example.com")]), None);
        assert!(!out.contains_key("dnt"));
        assert!(!out.contains_key("x-requested-with"));
    }

    #[test]
    fn navigation_header_order_matches_ja4h() {
        let policy = HeaderPolicy::new(7, 132);
        let out = policy.rewrite(
            ResourceType::Document,
            headers(&[("host", "example.com"), ("cookie", "a=b"), ("user-agent", "UA")]),
            None,
        );
        let present_order: Vec<&str> = JA4H_NAVIGATION_ORDER
            .iter()
            .copied()
            .filter(|n| out.contains_key(*n))
            .collect();
        let actual: Vec<&str> = out.keys().map(|s| s.as_str()).collect();
        assert_eq!(actual, present_order);
    }

    #[test]
    fn accept_encoding_is_one_of_three_allowed_strings() {
        for seed in 0..200u32 {
            let policy = HeaderPolicy::new(seed, 132);
            let enc = policy.accept_encoding();
            assert!(
                enc == "gzip, deflate, br" || enc == "gzip, deflate, br, zstd" || enc == "zstd, gzip, deflate, br",
                "unexpected accept-encoding {enc}"
            );
        }
    }

    #[test]
    fn old_chrome_major_drops_priority_and_zstd() {
        let policy = HeaderPolicy::new(3, 110);
        assert_eq!(policy.accept_encoding(), "gzip, deflate, br");
        let out = policy.rewrite(ResourceType::Document, headers(&[("host", "x")]), None);
        assert!(!out.contains_key("priority"));
    }

    #[test]
    fn navigation_requests_always_have_required_sec_fetch_headers() {
        let policy = HeaderPolicy::new(9, 132);
        let out = policy.rewrite(ResourceType::Document, headers(&[("host", "x")]), None);
        for key in ["sec-fetch-site", "sec-fetch-mode", "sec-fetch-user", "sec-fetch-dest"] {
            assert!(out.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let a = HeaderPolicy::new(55, 132);
        let b = HeaderPolicy::new(55, 132);
        assert_eq!(a.accept_encoding(), b.accept_encoding());
        assert_eq!(a.accept_for(ResourceType::Document), b.accept_for(ResourceType::Document));
    }
}
