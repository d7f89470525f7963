use crate::model::Fingerprint;

pub(super) fn build(fp: &Fingerprint) -> Option<String> {
    if fp.ua_brands.is_empty() {
        return None;
    }
    let brands_js: Vec<String> = fp
        .ua_brands
        .iter()
        .map(|b| format!("{{ brand: {:?}, version: {:?} }}", b.brand, b.version))
        .collect();
    let brands_literal = format!("[{}]", brands_js.join(", "));
    let full_version_list_literal = format!(
        "[{}]",
        fp.ua_brands
            .iter()
            .map(|b| format!("{{ brand: {:?}, version: {:?} }}", b.brand, format!("{}.0.0.0", b.version)))
            .collect::<Vec<_>>()
            .join(", ")
    );

    Some(format!(
        r#"
  const __m_brands = {brands_literal};
  const __m_uad = {{
    brands: __m_brands,
    mobile: {mobile},
    platform: {platform:?},
    getHighEntropyValues(hints) {{
      const full = {{
        brands: __m_brands,
        mobile: {mobile},
        platform: {platform:?},
        platformVersion: {platform_version:?},
        architecture: {arch:?},
        bitness: {bitness:?},
        model: '',
        uaFullVersion: {ua_full_version:?},
        fullVersionList: {full_version_list_literal},
      }};
      const out = {{}};
      (hints || []).forEach((h) => {{ if (h in full) out[h] = full[h]; }});
      out.brands = __m_brands;
      out.mobile = {mobile};
      out.platform = {platform:?};
      return Promise.resolve(out);
    }},
    toJSON() {{ return {{ brands: __m_brands, mobile: {mobile}, platform: {platform:?} }}; }},
  }};
  Object.defineProperty(Navigator.prototype, 'userAgentData', {{
    get() {{ return __m_uad; }}, configurable: true,
  }});
  Object.defineProperty(Screen.prototype, 'width', {{ get() {{ return {screen_w}; }}, configurable: true }});
  Object.defineProperty(Screen.prototype, 'height', {{ get() {{ return {screen_h}; }}, configurable: true }});
  Object.defineProperty(Screen.prototype, 'availWidth', {{ get() {{ return {screen_w}; }}, configurable: true }});
  Object.defineProperty(Screen.prototype, 'availHeight', {{ get() {{ return {avail_h}; }}, configurable: true }});
  Object.defineProperty(Screen.prototype, 'colorDepth', {{ get() {{ return {color_depth}; }}, configurable: true }});
  Object.defineProperty(Screen.prototype, 'pixelDepth', {{ get() {{ return {color_depth}; }}, configurable: true }});
  Object.defineProperty(window, 'devicePixelRatio', {{ get() {{ return {pixel_ratio}; }}, configurable: true }});
  Object.defineProperty(window, 'outerWidth', {{ get() {{ return {viewport_w}; }}, configurable: true }});
  Object.defineProperty(window, 'outerHeight', {{ get() {{ return {outer_h}; }}, configurable: true }});
  const __m_real_matchMedia = window.matchMedia;
  window.matchMedia = function(query) {{
    const result = __m_real_matchMedia.call(window, query);
    if (typeof query === 'string' && query.includes('prefers-color-scheme')) {{
      Object.defineProperty(result, 'matches', {{ value: query.includes('light'), configurable: true }});
    }}
    return result;
  }};
"#,
        mobile = fp.ua_mobile,
        platform = fp.ua_platform,
        platform_version = fp.ua_platform_version,
        arch = fp.ua_architecture,
        bitness = fp.ua_bitness,
        ua_full_version = format!("{}.0.0.0", fp.chrome_major),
        screen_w = fp.screen_w,
        screen_h = fp.screen_h,
        avail_h = fp.screen_h.saturating_sub(40),
        color_depth = fp.color_depth,
        pixel_ratio = fp.pixel_ratio,
        viewport_w = fp.viewport_w,
        outer_h = fp.viewport_h + 88,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint;
    use crate::model::{BehaviourProfile, BrowserToken, OsToken, Profile, ProfileStatus};

    fn profile(browser: BrowserToken) -> Profile {
        Profile {
            id: "p".into(),
            display_name: "p".into(),
            seed: 4,
            os: OsToken::Windows11,
            browser,
            target_url_hint: None,
            proxy: None,
            behaviour_profile: BehaviourProfile::Normal,
            status: ProfileStatus::Idle,
        }
    }

    #[test]
    fn firefox_has_no_ua_brands_so_this_surface_is_skipped() {
        let fp = fingerprint::synthesize(&profile(BrowserToken::Firefox));
        assert!(fp.ua_brands.is_empty());
        assert!(build(&fp).is_none());
    }

    #[test]
    fn chrome_patches_useragentdata_and_screen_geometry() {
        let fp = fingerprint::synthesize(&profile(BrowserToken::Chrome));
        let script = build(&fp).unwrap();
        assert!(script.contains("userAgentData"));
        assert!(script.contains("getHighEntropyValues"));
        assert!(script.contains(&fp.screen_w.to_string()));
        assert!(script.contains(&fp.screen_h.to_string()));
    }
}
