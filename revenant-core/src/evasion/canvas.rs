use super::{js_seed_literal, POSITION_HASH_JS};
use crate::model::Fingerprint;

pub(super) fn build(fp: &Fingerprint) -> Option<String> {
    if fp.canvas_noise <= 0.0 {
        return None;
    }
    let max_delta = (fp.canvas_noise * 4.0).round().clamp(0.0, 4.0) as i32;
    let seed = js_seed_literal(fp);

    Some(format!(
        r#"
{POSITION_HASH_JS}
  const __m_canvas_seed = {seed};
  const __m_max_delta = {max_delta};

  function __m_noise_image_data(imageData, canvasWidth) {{
    const data = imageData.data;
    for (let i = 0; i < data.length; i += 4) {{
      const pixelIndex = i / 4;
      const x = pixelIndex % canvasWidth;
      const y = Math.floor(pixelIndex / canvasWidth);
      for (let c = 0; c < 3; c++) {{
        const delta = __m_position_delta(x, y, c, __m_canvas_seed, __m_max_delta);
        data[i + c] = Math.min(255, Math.max(0, data[i + c] + delta));
      }}
    }}
    return imageData;
  }}

  const __m_real_getImageData = CanvasRenderingContext2D.prototype.getImageData;
  CanvasRenderingContext2D.prototype.getImageData = function(...args) {{
    const result = __m_real_getImageData.apply(this, args);
    return __m_noise_image_data(result, this.canvas.width);
  }};

  if (typeof OffscreenCanvasRenderingContext2D !== 'undefined') {{
    const __m_real_offscreen_getImageData = OffscreenCanvasRenderingContext2D.prototype.getImageData;
    OffscreenCanvasRenderingContext2D.prototype.getImageData = function(...args) {{
      const result = __m_real_offscreen_getImageData.apply(this, args);
      return __m_noise_image_data(result, this.canvas.width);
    }};
  }}

  function __m_with_noised_pixels(canvas, fn) {{
    const ctx = canvas.getContext('2d');
    if (!ctx) return fn();
    const original = __m_real_getImageData.call(ctx, 0, 0, canvas.width, canvas.height);
    const noised = __m_real_getImageData.call(ctx, 0, 0, canvas.width, canvas.height);
    __m_noise_image_data(noised, canvas.width);
    ctx.putImageData(noised, 0, 0);
    try {{
      return fn();
    }} finally {{
      ctx.putImageData(original, 0, 0);
    }}
  }}

  const __m_real_toDataURL = HTMLCanvasElement.prototype.toDataURL;
  HTMLCanvasElement.prototype.toDataURL = function(...args) {{
    return __m_with_noised_pixels(this, () => __m_real_toDataURL.apply(this, args));
  }};

  const __m_real_toBlob = HTMLCanvasElement.prototype.toBlob;
  HTMLCanvasElement.prototype.toBlob = function(...args) {{
    return __m_with_noised_pixels(this, () => __m_real_toBlob.apply(this, args));
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

    /// The in-page `__m_position_delta` is a hand copy of
    /// `crate::rng::position_delta`; this asserts the two agree bit for
    /// bit across a spread of inputs, since the JS side never runs from
    /// a Rust test otherwise.
    #[test]
    fn js_position_hash_mirrors_the_rust_implementation() {
        fn js_wang_hash(key: u32) -> u32 {
            let mut key = (!key).wrapping_add(key << 15);
            key ^= key >> 12;
            key = key.wrapping_add(key << 2);
            key ^= key >> 4;
            key = key.wrapping_mul(2057);
            key ^= key >> 16;
            key
        }
        fn js_position_delta(x: u32, y: u32, channel: u32, seed: u32, max_abs: i32) -> i32 {
            if max_abs <= 0 {
                return 0;
            }
            let mut key = seed ^ 0x9E3779B9;
            key = key.wrapping_add(x.wrapping_mul(0x85EBCA6B));
            key = key.wrapping_add(y.wrapping_mul(0xC2B2AE35));
            key = key.wrapping_add(channel.wrapping_mul(0x27D4EB2F));
            let h = js_wang_hash(key);
            let span = (2 * max_abs + 1) as u32;
            (h % span) as i32 - max_abs
        }

        for (x, y, channel, seed, max_abs) in [
            (0u32, 0u32, 0u32, 1u32, 4i32),
            (319, 239, 2, 0xdead_beef, 4),
            (1920, 1080, 1, 42, 255),
            (7, 900, 0, 7, 1),
        ] {
            assert_eq!(
                crate::rng::position_delta(x, y, channel, seed, max_abs),
                js_position_delta(x, y, channel, seed, max_abs),
            );
        }
    }

    #[test]
    fn zero_canvas_noise_skips_the_surface() {
        let mut fp = fingerprint::synthesize(&profile(1));
        fp.canvas_noise = 0.0;
        assert!(build(&fp).is_none());
    }

    #[test]
    fn nonzero_canvas_noise_patches_getimagedata_and_todataurl() {
        let mut fp = fingerprint::synthesize(&profile(1));
        fp.canvas_noise = 0.6;
        let script = build(&fp).unwrap();
        assert!(script.contains("CanvasRenderingContext2D.prototype.getImageData"));
        assert!(script.contains("HTMLCanvasElement.prototype.toDataURL"));
        assert!(script.contains("HTMLCanvasElement.prototype.toBlob"));
    }
}
