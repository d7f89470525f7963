use crate::constants::{SHADER_PRECISION_TABLE, WEBGL_BASELINE_EXTENSIONS};
use crate::model::Fingerprint;

use super::{js_seed_literal, POSITION_HASH_JS};

fn baseline_set_literal() -> String {
    let quoted: Vec<String> = WEBGL_BASELINE_EXTENSIONS.iter().map(|e| format!("{e:?}")).collect();
    format!("new Set([{}])", quoted.join(", "))
}

fn shader_precision_table_literal() -> String {
    let entries: Vec<String> = SHADER_PRECISION_TABLE
        .iter()
        .map(|((shader_type, precision_type), (min, max, precision))| {
            format!(
                "{{ shaderType: {shader_type:?}, precisionType: {precision_type:?}, rangeMin: {min}, rangeMax: {max}, precision: {precision} }}"
            )
        })
        .collect();
    format!("[{}]", entries.join(", "))
}

pub(super) fn build(fp: &Fingerprint) -> Option<String> {
    if fp.webgl_noise <= 0.0 {
        return None;
    }
    let max_delta = (fp.webgl_noise * 20.0).round().clamp(0.0, 255.0) as i32;
    let seed = js_seed_literal(fp);

    Some(format!(
        r#"
{POSITION_HASH_JS}
  const __m_webgl_seed = {seed};
  const __m_webgl_max_delta = {max_delta};
  const __m_webgl_baseline = {baseline};
  const __m_shader_precision = {shader_table};
  const __m_vendor = {vendor:?};
  const __m_renderer = {renderer:?};

  function __m_patch_context(proto) {{
    const __m_real_getParameter = proto.getParameter;
    proto.getParameter = function(pname) {{
      const dbgExt = this.getExtension && this.getExtension('WEBGL_debug_renderer_info');
      if (dbgExt) {{
        if (pname === dbgExt.UNMASKED_VENDOR_WEBGL) return __m_vendor;
        if (pname === dbgExt.UNMASKED_RENDERER_WEBGL) return __m_renderer;
      }}
      if (pname === 0x1F00 /* VENDOR */) return __m_vendor;
      if (pname === 0x1F01 /* RENDERER */) return __m_renderer;
      return __m_real_getParameter.call(this, pname);
    }};

    const __m_real_getSupportedExtensions = proto.getSupportedExtensions;
    proto.getSupportedExtensions = function() {{
      const real = __m_real_getSupportedExtensions.call(this) || [];
      return real.filter((name) => __m_webgl_baseline.has(name));
    }};

    const __m_real_getExtension = proto.getExtension;
    proto.getExtension = function(name) {{
      if (name === 'WEBGL_debug_renderer_info') {{
        return {{ UNMASKED_VENDOR_WEBGL: 0x9245, UNMASKED_RENDERER_WEBGL: 0x9246 }};
      }}
      if (!__m_webgl_baseline.has(name)) return null;
      return __m_real_getExtension.call(this, name);
    }};

    const __m_real_readPixels = proto.readPixels;
    proto.readPixels = function(x, y, width, height, format, type, pixels, ...rest) {{
      __m_real_readPixels.call(this, x, y, width, height, format, type, pixels, ...rest);
      if (pixels && pixels.length) {{
        const channels = 4;
        for (let i = 0; i < pixels.length; i++) {{
          if (i % channels === 3) continue;
          const px = Math.floor(i / channels);
          const delta = __m_position_delta(px % width, Math.floor(px / width), i % channels, __m_webgl_seed, __m_webgl_max_delta);
          pixels[i] = Math.min(255, Math.max(0, pixels[i] + delta));
        }}
      }}
    }};

    if (proto.getBufferSubData) {{
      const __m_real_getBufferSubData = proto.getBufferSubData;
      proto.getBufferSubData = function(target, offset, dst, ...rest) {{
        __m_real_getBufferSubData.call(this, target, offset, dst, ...rest);
        if (dst && dst.length) {{
          for (let i = 0; i < dst.length; i++) {{
            const delta = __m_position_delta(i, offset, 0, __m_webgl_seed, __m_webgl_max_delta);
            dst[i] = Math.min(255, Math.max(0, dst[i] + delta));
          }}
        }}
      }};
    }}

    const __m_real_getShaderPrecisionFormat = proto.getShaderPrecisionFormat;
    proto.getShaderPrecisionFormat = function(shaderType, precisionType) {{
      const typeName = shaderType === this.VERTEX_SHADER ? 'VERTEX_SHADER' : 'FRAGMENT_SHADER';
      const precName = ['LOW_FLOAT', 'MEDIUM_FLOAT', 'HIGH_FLOAT', 'LOW_INT', 'MEDIUM_INT', 'HIGH_INT'][precisionType - this.LOW_FLOAT] ||
        Object.keys(this).find((k) => this[k] === precisionType);
      const row = __m_shader_precision.find((r) => r.shaderType === typeName);
      if (row) {{
        return {{ rangeMin: row.rangeMin, rangeMax: row.rangeMax, precision: row.precision }};
      }}
      return __m_real_getShaderPrecisionFormat.call(this, shaderType, precisionType);
    }};
  }}

  if (typeof WebGLRenderingContext !== 'undefined') {{
    __m_patch_context(WebGLRenderingContext.prototype);
  }}
  if (typeof WebGL2RenderingContext !== 'undefined') {{
    __m_patch_context(WebGL2RenderingContext.prototype);
  }}
"#,
        baseline = baseline_set_literal(),
        shader_table = shader_precision_table_literal(),
        vendor = fp.webgl_vendor,
        renderer = fp.webgl_renderer,
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
            os: OsToken::MacOs14,
            browser: BrowserToken::Chrome,
            target_url_hint: None,
            proxy: None,
            behaviour_profile: BehaviourProfile::Normal,
            status: ProfileStatus::Idle,
        }
    }

    #[test]
    fn zero_webgl_noise_skips_the_surface() {
        let mut fp = fingerprint::synthesize(&profile(1));
        fp.webgl_noise = 0.0;
        assert!(build(&fp).is_none());
    }

    #[test]
    fn script_spoofs_vendor_renderer_and_filters_extensions_to_baseline() {
        let mut fp = fingerprint::synthesize(&profile(1));
        fp.webgl_noise = 0.5;
        let script = build(&fp).unwrap();
        assert!(script.contains(&fp.webgl_vendor));
        assert!(script.contains(&fp.webgl_renderer));
        assert!(script.contains("getSupportedExtensions"));
        assert!(script.contains("WebGL2RenderingContext"));
    }

    #[test]
    fn baseline_extension_literal_matches_the_fixed_table_size() {
        assert_eq!(baseline_set_literal().matches("\"").count() / 2, WEBGL_BASELINE_EXTENSIONS.len());
    }
}
