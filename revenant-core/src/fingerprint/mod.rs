//! Fingerprint synthesiser (C2). Pure, total, deterministic: the same
//! `Profile` seed and tokens always produce byte-identical output.

pub mod tables;

use std::collections::BTreeMap;

use crate::model::{
    BrowserToken, Fingerprint, OsToken, PermissionState, Profile, UaBrand, WebRtcConfig, WebRtcMode,
};
use crate::rng::SeededRng;

struct GeoRow {
    country: &'static str,
    timezone_id: &'static str,
    locale: &'static str,
    accept_language_primary: &'static str,
}

const GEO_POOL: &[GeoRow] = &[
    GeoRow { country: "US", timezone_id: "America/New_York", locale: "en-US", accept_language_primary: "en-US" },
    GeoRow { country: "GB", timezone_id: "Europe/London", locale: "en-GB", accept_language_primary: "en-GB" },
    GeoRow { country: "DE", timezone_id: "Europe/Berlin", locale: "de-DE", accept_language_primary: "de-DE" },
    GeoRow { country: "FR", timezone_id: "Europe/Paris", locale: "fr-FR", accept_language_primary: "fr-FR" },
    GeoRow { country: "JP", timezone_id: "Asia/Tokyo", locale: "ja-JP", accept_language_primary: "ja-JP" },
    GeoRow { country: "BR", timezone_id: "America/Sao_Paulo", locale: "pt-BR", accept_language_primary: "pt-BR" },
    GeoRow { country: "IN", timezone_id: "Asia/Kolkata", locale: "en-IN", accept_language_primary: "en-IN" },
    GeoRow { country: "AU", timezone_id: "Australia/Sydney", locale: "en-AU", accept_language_primary: "en-AU" },
    GeoRow { country: "CA", timezone_id: "America/Toronto", locale: "en-CA", accept_language_primary: "en-CA" },
];

fn geo_row_for_country(country: &str) -> Option<&'static GeoRow> {
    GEO_POOL.iter().find(|r| r.country.eq_ignore_ascii_case(country))
}

fn accept_language_header(primary: &str) -> String {
    format!("{primary},en;q=0.9")
}

/// Behaviour-preset ranges gated by the profile's `behaviour_profile`
/// token ("aggressiveness"). Higher aggressiveness = more noise, smaller
/// font subset (less surface to fingerprint against).
struct AggressivenessPreset {
    canvas_noise_max: f64,
    webgl_noise_max: f64,
    audio_noise_max: f64,
    font_subset_min: usize,
    font_subset_max: usize,
}

fn preset_for(profile: crate::model::BehaviourProfile) -> AggressivenessPreset {
    use crate::model::BehaviourProfile::*;
    match profile {
        Bot => AggressivenessPreset {
            canvas_noise_max: 0.02,
            webgl_noise_max: 0.02,
            audio_noise_max: 0.1e-4,
            font_subset_min: 60,
            font_subset_max: 85,
        },
        Fast => AggressivenessPreset {
            canvas_noise_max: 0.06,
            webgl_noise_max: 0.05,
            audio_noise_max: 0.5e-4,
            font_subset_min: 45,
            font_subset_max: 65,
        },
        Normal => AggressivenessPreset {
            canvas_noise_max: 0.10,
            webgl_noise_max: 0.09,
            audio_noise_max: 0.8e-4,
            font_subset_min: 30,
            font_subset_max: 50,
        },
        Cautious => AggressivenessPreset {
            canvas_noise_max: 0.15,
            webgl_noise_max: 0.13,
            audio_noise_max: 1.2e-4,
            font_subset_min: 20,
            font_subset_max: 35,
        },
    }
}

fn browser_label(browser: BrowserToken, chrome_major: u32, minor_build: u32) -> (String, u32) {
    match browser {
        BrowserToken::Chrome => (format!("Chrome/{chrome_major}.0.{minor_build}.0"), chrome_major),
        BrowserToken::Edge => (format!("Edg/{chrome_major}.0.{minor_build}.0"), chrome_major),
        BrowserToken::Firefox => (format!("Firefox/{chrome_major}.0"), 0),
    }
}

fn build_user_agent(os: OsToken, browser: BrowserToken, chrome_major: u32, minor_build: u32) -> String {
    let os_label = tables::os_label(os);
    match browser {
        BrowserToken::Chrome => format!(
            "Mozilla/5.0 ({os_label}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{chrome_major}.0.{minor_build}.0 Safari/537.36"
        ),
        BrowserToken::Edge => format!(
            "Mozilla/5.0 ({os_label}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{chrome_major}.0.{minor_build}.0 Safari/537.36 Edg/{chrome_major}.0.{minor_build}.0"
        ),
        BrowserToken::Firefox => format!(
            "Mozilla/5.0 ({os_label}; rv:{chrome_major}.0) Gecko/20100101 Firefox/{chrome_major}.0"
        ),
    }
}

fn build_ua_brands(rng: &mut SeededRng, chrome_major: u32) -> Vec<UaBrand> {
    let grease = rng.pick(tables::GREASE_BRANDS).to_string();
    let grease_version = format!("{}", rng.int(8, 24));
    let mut brands = vec![
        UaBrand { brand: "Chromium".into(), version: chrome_major.to_string() },
        UaBrand { brand: "Google Chrome".into(), version: chrome_major.to_string() },
        UaBrand { brand: grease, version: grease_version },
    ];
    rng.shuffle(&mut brands);
    brands
}

/// Four 32-bit LCG draws seeded from the synthesiser's RNG stream,
/// packed into 16 bytes and handed to the `uuid` crate so the version
/// (4) and variant nibbles are forced correctly rather than by hand.
fn derive_mdns_uuid(rng: &mut SeededRng) -> String {
    let mut state = rng.int(0, u32::MAX as i64) as u32;
    let mut bytes = [0u8; 16];
    for chunk in bytes.chunks_mut(4) {
        state = ((state as u64).wrapping_mul(1_103_515_245).wrapping_add(12_345) & 0x7fff_ffff) as u32;
        chunk.copy_from_slice(&state.to_be_bytes());
    }
    let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
    format!("{uuid}.local")
}

const MDNS_REGEX_DESC: &str =
    "^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}\\.local$";

fn matches_mdns_shape(s: &str) -> bool {
    let Some(hostname) = s.strip_suffix(".local") else { return false };
    let parts: Vec<&str> = hostname.split('-').collect();
    if parts.len() != 5 {
        return false;
    }
    let lens = [8, 4, 4, 4, 12];
    for (p, expect_len) in parts.iter().zip(lens) {
        if p.len() != expect_len || !p.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }
    }
    parts[2].starts_with('4') && matches!(parts[3].chars().next(), Some('8' | '9' | 'a' | 'b'))
}

fn default_permissions(rng: &mut SeededRng) -> BTreeMap<String, PermissionState> {
    let names = ["geolocation", "notifications", "camera", "microphone", "clipboard-read"];
    let mut map = BTreeMap::new();
    for name in names {
        let state = if rng.chance(0.75) {
            PermissionState::Prompt
        } else if rng.chance(0.5) {
            PermissionState::Denied
        } else {
            PermissionState::Granted
        };
        map.insert(name.to_string(), state);
    }
    map
}

/// Synthesise a self-consistent Fingerprint from a Profile. Total and
/// pure: every input combination produces a valid output, never an
/// error.
pub fn synthesize(profile: &Profile) -> Fingerprint {
    let mut rng = SeededRng::new(profile.seed);
    let preset = preset_for(profile.behaviour_profile);

    let chrome_major = rng.int(
        tables::CHROME_MAJOR_POOL.min as i64,
        tables::CHROME_MAJOR_POOL.max as i64,
    ) as u32;
    let minor_build = rng.int(6200, 6950) as u32;
    let (_label, effective_major) = browser_label(profile.browser, chrome_major, minor_build);
    let user_agent = build_user_agent(profile.os, profile.browser, chrome_major, minor_build);

    let ua_brands = match profile.browser {
        BrowserToken::Firefox => Vec::new(),
        _ => build_ua_brands(&mut rng, chrome_major),
    };

    let hardware_concurrency = *rng.pick(tables::HARDWARE_CONCURRENCY_BUCKET);
    let device_memory = *rng.pick(tables::DEVICE_MEMORY_BUCKET);
    let screen = rng.pick(tables::screen_buckets(profile.os));
    let (screen_w, screen_h) = (screen.w, screen.h);
    let pixel_ratio = *rng.pick(tables::PIXEL_RATIO_BUCKET);
    let color_depth = *rng.pick(tables::COLOR_DEPTH_BUCKET);

    // viewport is screen minus chrome (toolbars etc), always <= screen.
    let viewport_w = screen_w - (rng.int(0, 40) as u32);
    let viewport_h = screen_h.saturating_sub(rng.int(80, 170) as u32);

    let canvas_noise = rng.uniform() * preset.canvas_noise_max;
    let webgl_noise = rng.uniform() * preset.webgl_noise_max;
    let audio_noise = rng.uniform() * preset.audio_noise_max;
    let (webgl_vendor, webgl_renderer) = {
        let pool = tables::webgl_pool_for_os(profile.os);
        let (v, r) = rng.pick(pool);
        (v.to_string(), r.to_string())
    };

    let font_master = tables::font_master_list(profile.os);
    let subset_size = rng
        .int(preset.font_subset_min as i64, preset.font_subset_max as i64)
        .min(font_master.len() as i64) as usize;
    let mut shuffled = font_master.clone();
    rng.shuffle(&mut shuffled);
    let font_subset: Vec<String> = shuffled.into_iter().take(subset_size).map(String::from).collect();

    let webrtc = if let Some(proxy) = &profile.proxy {
        let _ = proxy;
        WebRtcConfig {
            mode: WebRtcMode::FakeMdns,
            fake_mdns: Some(derive_mdns_uuid(&mut rng)),
            fake_ip: Some(format!(
                "10.{}.{}.{}",
                rng.int(0, 255),
                rng.int(0, 255),
                rng.int(1, 254)
            )),
        }
    } else if rng.chance(0.5) {
        WebRtcConfig { mode: WebRtcMode::Block, fake_mdns: None, fake_ip: None }
    } else {
        WebRtcConfig { mode: WebRtcMode::Passthrough, fake_mdns: None, fake_ip: None }
    };

    let initial_geo = rng.pick(GEO_POOL);
    let mut timezone_id = initial_geo.timezone_id.to_string();
    let mut locale = initial_geo.locale.to_string();
    let mut accept_language = accept_language_header(initial_geo.accept_language_primary);
    let mut geo_corrected = false;

    if let Some(country) = profile.proxy_country_hint() {
        if let Some(row) = geo_row_for_country(country) {
            if row.timezone_id != timezone_id || row.locale != locale {
                timezone_id = row.timezone_id.to_string();
                locale = row.locale.to_string();
                accept_language = accept_language_header(row.accept_language_primary);
                geo_corrected = true;
            }
        }
    }

    let permissions = default_permissions(&mut rng);

    Fingerprint {
        user_agent,
        ua_platform: tables::ua_platform(profile.os).to_string(),
        ua_platform_version: tables::ua_platform_version(profile.os).to_string(),
        ua_architecture: "x86".to_string(),
        ua_bitness: "64".to_string(),
        ua_mobile: false,
        ua_brands,
        chrome_major: effective_major,
        hardware_concurrency,
        device_memory,
        screen_w,
        screen_h,
        viewport_w,
        viewport_h,
        color_depth,
        pixel_ratio,
        canvas_noise,
        webgl_noise,
        audio_noise,
        webgl_vendor,
        webgl_renderer,
        font_subset,
        webrtc,
        accept_language,
        timezone_id,
        locale,
        permissions,
        geo_corrected,
    }
}

/// Verifies every invariant from the data model section holds for a
/// synthesised Fingerprint. Returns the first violated invariant's
/// description, if any.
pub fn invariant_check(fp: &Fingerprint) -> Result<(), String> {
    if fp.viewport_w > fp.screen_w || fp.viewport_h > fp.screen_h {
        return Err("viewport exceeds screen".into());
    }
    if !tables::PIXEL_RATIO_BUCKET.contains(&fp.pixel_ratio) {
        return Err("pixel_ratio outside allowed bucket".into());
    }
    if let Some(mdns) = &fp.webrtc.fake_mdns {
        if !matches_mdns_shape(mdns) {
            return Err(format!("fake_mdns does not match {MDNS_REGEX_DESC}"));
        }
    }
    if !fp.ua_brands.is_empty() {
        let chromium_major = fp.ua_brands.iter().find(|b| b.brand == "Chromium").map(|b| b.version.as_str());
        if chromium_major != Some(fp.chrome_major.to_string().as_str()) {
            return Err("ua_brands chromium version disagrees with chrome_major".into());
        }
        if !fp.user_agent.contains(&format!("Chrome/{}", fp.chrome_major)) {
            return Err("user_agent chrome major disagrees with chrome_major".into());
        }
    }
    if fp.canvas_noise < 0.0 || fp.canvas_noise > 0.15 {
        return Err("canvas_noise out of range".into());
    }
    if fp.webgl_noise < 0.0 || fp.webgl_noise > 0.13 {
        return Err("webgl_noise out of range".into());
    }
    if fp.audio_noise < 0.0 || fp.audio_noise > 1.2e-4 {
        return Err("audio_noise out of range".into());
    }
    if fp.font_subset.len() < 20 || fp.font_subset.len() > 110 {
        return Err("font_subset size out of [20,110]".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BehaviourProfile, OsToken, ProfileStatus};

    fn profile(seed: u32) -> Profile {
        Profile {
            id: "p".into(),
            display_name: "p".into(),
            seed,
            os: OsToken::Windows11,
            browser: BrowserToken::Chrome,
            target_url_hint: None,
            proxy: None,
            behaviour_profile: BehaviourProfile::Normal,
            status: ProfileStatus::Idle,
        }
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let p = profile(0x00AB_CDEF);
        let a = synthesize(&p);
        let b = synthesize(&p);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn ten_thousand_seeds_pass_invariants() {
        for seed in 0..10_000u32 {
            let mut p = profile(seed);
            p.os = match seed % 3 {
                0 => OsToken::Windows11,
                1 => OsToken::MacOs14,
                _ => OsToken::Linux,
            };
            let fp = synthesize(&p);
            invariant_check(&fp).unwrap_or_else(|e| panic!("seed {seed} failed: {e}"));
        }
    }

    #[test]
    fn scenario_seeded_windows_chrome_132() {
        let mut p = profile(0x00AB_CDEF);
        p.os = OsToken::Windows11;
        p.browser = BrowserToken::Chrome;
        p.proxy = Some(crate::model::ProxyRef {
            endpoint: "proxy.example:8080".into(),
            country_hint: Some("US".into()),
            tls_bridge: false,
        });
        let fp = synthesize(&p);
        assert!(fp.user_agent.contains("Chrome/"));
        assert!(fp.ua_brands.iter().any(|b| b.brand == "Chromium"));
        assert!(tables::HARDWARE_CONCURRENCY_BUCKET.contains(&fp.hardware_concurrency));
        let mdns = fp.webrtc.fake_mdns.unwrap();
        assert!(matches_mdns_shape(&mdns));
        invariant_check(&fp).unwrap();
    }

    #[test]
    fn geo_validator_corrects_toward_proxy_country() {
        let mut p = profile(5);
        p.proxy = Some(crate::model::ProxyRef {
            endpoint: "x".into(),
            country_hint: Some("JP".into()),
            tls_bridge: false,
        });
        let fp = synthesize(&p);
        assert_eq!(fp.locale, "ja-JP");
        assert_eq!(fp.timezone_id, "Asia/Tokyo");
    }

    #[test]
    fn firefox_profile_has_no_ua_brands() {
        let mut p = profile(3);
        p.browser = BrowserToken::Firefox;
        let fp = synthesize(&p);
        assert!(fp.ua_brands.is_empty());
        assert!(fp.user_agent.contains("Firefox"));
    }

    #[test]
    fn mdns_shape_matcher_rejects_legacy_sixteen_hex_form() {
        assert!(!matches_mdns_shape("0123456789abcdef0123456789abcdef.local"));
    }
}
