//! Evasion Script Factory (C3). Given a Fingerprint, produces the
//! ordered set of JS init scripts that must be installed on a page
//! before first navigation (see `DESIGN NOTES` about replacing virtual
//! dispatch over browser surfaces with a fixed variant type).

mod audio;
mod canvas;
mod client_hints;
mod fonts;
mod navigator;
mod webgl;
mod webrtc;

use crate::model::Fingerprint;

/// The position-keyed noise hash, reimplemented in JS so canvas/webgl/
/// audio patches can call it in-page. Must compute the exact same
/// integer as `rng::position_delta` for the same inputs — that equality
/// is what the canvas-determinism property actually tests from the Rust
/// side once a CDP harness is wired up.
pub(crate) const POSITION_HASH_JS: &str = r#"
function __m_wang_hash(key) {
  key = (~key + (key << 15)) | 0;
  key = key ^ (key >>> 12);
  key = (key + (key << 2)) | 0;
  key = key ^ (key >>> 4);
  key = Math.imul(key, 2057);
  key = key ^ (key >>> 16);
  return key >>> 0;
}
function __m_position_delta(x, y, channel, seed, maxAbs) {
  if (maxAbs <= 0) return 0;
  let key = (seed ^ 0x9E3779B9) >>> 0;
  key = (key + Math.imul(x, 0x85EBCA6B)) >>> 0;
  key = (key + Math.imul(y, 0xC2B2AE35)) >>> 0;
  key = (key + Math.imul(channel, 0x27D4EB2F)) >>> 0;
  const h = __m_wang_hash(key);
  const span = 2 * maxAbs + 1;
  return (h % span) - maxAbs;
}
"#;

/// Derives a 32-bit seed for the in-page noise hash from the Fingerprint's
/// canvas noise amplitude, so every surface that needs a "seed" for
/// `position_delta`-style noise agrees on the same integer without the
/// Fingerprint needing an explicit `noise_seed` field.
pub(crate) fn js_seed_literal(fp: &Fingerprint) -> u32 {
    let mixed = (fp.canvas_noise * 1_000_003.0) as u32
        ^ (fp.webgl_noise * 2_000_003.0) as u32
        ^ fp.hardware_concurrency.wrapping_mul(2654435761);
    mixed ^ fp.screen_w.wrapping_mul(0x9E3779B9)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvasionSurface {
    Navigator,
    ClientHints,
    Canvas,
    WebGl,
    Audio,
    Fonts,
    WebRtc,
}

impl EvasionSurface {
    /// Fixed install order. No virtual dispatch — a flat list of a closed
    /// enum drives the whole factory.
    pub const ALL_IN_ORDER: [EvasionSurface; 7] = [
        EvasionSurface::Navigator,
        EvasionSurface::ClientHints,
        EvasionSurface::Canvas,
        EvasionSurface::WebGl,
        EvasionSurface::Audio,
        EvasionSurface::Fonts,
        EvasionSurface::WebRtc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EvasionSurface::Navigator => "navigator",
            EvasionSurface::ClientHints => "client_hints",
            EvasionSurface::Canvas => "canvas",
            EvasionSurface::WebGl => "webgl",
            EvasionSurface::Audio => "audio",
            EvasionSurface::Fonts => "fonts",
            EvasionSurface::WebRtc => "webrtc",
        }
    }

    fn guard_property(self) -> String {
        format!("__m_{}_patched__", self.name())
    }

    /// `None` when the surface has nothing to do for this Fingerprint
    /// (e.g. zero noise level) — it is then silently skipped rather than
    /// installing a no-op script.
    pub fn build_script(self, fp: &Fingerprint) -> Option<String> {
        let body = match self {
            EvasionSurface::Navigator => navigator::build(fp)?,
            EvasionSurface::ClientHints => client_hints::build(fp)?,
            EvasionSurface::Canvas => canvas::build(fp)?,
            EvasionSurface::WebGl => webgl::build(fp)?,
            EvasionSurface::Audio => audio::build(fp)?,
            EvasionSurface::Fonts => fonts::build(fp)?,
            EvasionSurface::WebRtc => webrtc::build(fp)?,
        };
        let guard = self.guard_property();
        Some(format!(
            "(function() {{\n  if (window['{guard}']) return;\n{body}\n  Object.defineProperty(window, '{guard}', {{ value: true, configurable: false, writable: false }});\n}})();",
        ))
    }
}

/// Builds every non-skipped script for a Fingerprint, in the fixed order.
pub fn build_all(fp: &Fingerprint) -> Vec<(EvasionSurface, String)> {
    EvasionSurface::ALL_IN_ORDER
        .into_iter()
        .filter_map(|surface| surface.build_script(fp).map(|script| (surface, script)))
        .collect()
}
