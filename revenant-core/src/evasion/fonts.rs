use crate::model::Fingerprint;

pub(super) fn build(fp: &Fingerprint) -> Option<String> {
    if fp.font_subset.is_empty() {
        return None;
    }
    let subset: Vec<String> = fp.font_subset.iter().map(|f| format!("{f:?}")).collect();
    let subset_literal = format!("new Set([{}])", subset.join(", "));
    let fallback = fp.font_subset.first().cloned().unwrap_or_else(|| "Arial".to_string());
    let metric_noise = fp.canvas_noise;

    Some(format!(
        r#"
  const __m_font_subset = {subset_literal};
  const __m_font_fallback = {fallback:?};
  const __m_metric_noise = {metric_noise};

  function __m_resolve_family(requested) {{
    const families = requested.split(',').map((f) => f.trim().replace(/^['"]|['"]$/g, ''));
    for (const f of families) {{
      if (__m_font_subset.has(f)) return f;
    }}
    return __m_font_fallback;
  }}

  if (typeof FontFaceSet !== 'undefined') {{
    const __m_real_check = FontFaceSet.prototype.check;
    FontFaceSet.prototype.check = function(font, text) {{
      const parts = font.split(' ');
      const family = parts.slice(1).join(' ');
      if (family && !__m_font_subset.has(family.replace(/^['"]|['"]$/g, ''))) return false;
      return __m_real_check.call(this, font, text);
    }};
    const __m_real_load = FontFaceSet.prototype.load;
    FontFaceSet.prototype.load = function(font, text) {{
      const parts = font.split(' ');
      const family = parts.slice(1).join(' ');
      if (family && !__m_font_subset.has(family.replace(/^['"]|['"]$/g, ''))) {{
        return Promise.resolve([]);
      }}
      return __m_real_load.call(this, font, text);
    }};
  }}

  const __m_real_measureText = CanvasRenderingContext2D.prototype.measureText;
  CanvasRenderingContext2D.prototype.measureText = function(text) {{
    const original = this.font;
    const fontParts = original.split(' ');
    const requestedFamily = fontParts.slice(1).join(' ');
    const resolved = __m_resolve_family(requestedFamily || __m_font_fallback);
    this.font = original.replace(requestedFamily, resolved);
    const metrics = __m_real_measureText.call(this, text);
    this.font = original;
    const jitter = (text.length % 7) * __m_metric_noise * 0.01;
    Object.defineProperty(metrics, 'width', {{ value: metrics.width + jitter, configurable: true }});
    return metrics;
  }};
"#,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint;
    use crate::model::{BehaviourProfile, BrowserToken, OsToken, Profile, ProfileStatus};

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
    fn nonempty_font_subset_patches_fontfaceset_and_measuretext() {
        let fp = fingerprint::synthesize(&profile(1));
        assert!(!fp.font_subset.is_empty());
        let script = build(&fp).unwrap();
        assert!(script.contains("FontFaceSet.prototype.check"));
        assert!(script.contains("CanvasRenderingContext2D.prototype.measureText"));
        for font in &fp.font_subset {
            assert!(script.contains(font));
        }
    }

    #[test]
    fn empty_font_subset_skips_the_surface() {
        let mut fp = fingerprint::synthesize(&profile(1));
        fp.font_subset.clear();
        assert!(build(&fp).is_none());
    }
}
