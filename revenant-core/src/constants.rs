//! Fixed lookup tables for the header contract and evasion surfaces.
//! These must be reproduced bit-exact — nothing here is tunable at
//! runtime, and nothing here is generated.

/// Canonical Chrome navigation `Accept` header pool. One is drawn per
/// session by the interceptor's seeded RNG.
pub const NAVIGATION_ACCEPT_POOL: &[&str] = &[
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
];

pub const XHR_ACCEPT_POOL: &[&str] = &["*/*", "application/json, text/plain, */*"];

pub const IMAGE_ACCEPT_POOL: &[&str] = &[
    "image/avif,image/webp,image/apng,image/svg+xml,*/*;q=0.8",
    "image/webp,*/*;q=0.8",
];

/// JA4H canonical header order for a navigation (top-level document)
/// request.
pub const JA4H_NAVIGATION_ORDER: &[&str] = &[
    "host",
    "connection",
    "cache-control",
    "sec-ch-ua",
    "sec-ch-ua-mobile",
    "sec-ch-ua-platform",
    "upgrade-insecure-requests",
    "user-agent",
    "accept",
    "sec-fetch-site",
    "sec-fetch-mode",
    "sec-fetch-user",
    "sec-fetch-dest",
    "accept-encoding",
    "accept-language",
    "cookie",
    "priority",
    "te",
];

/// JA4H canonical header order for a sub-resource (XHR/fetch/image/script
/// etc.) request.
pub const JA4H_SUBRESOURCE_ORDER: &[&str] = &[
    "host",
    "connection",
    "sec-ch-ua",
    "sec-ch-ua-mobile",
    "sec-ch-ua-platform",
    "user-agent",
    "accept",
    "origin",
    "sec-fetch-site",
    "sec-fetch-mode",
    "sec-fetch-dest",
    "referer",
    "accept-encoding",
    "accept-language",
    "cookie",
    "priority",
    "content-type",
    "content-length",
];

/// Baseline WebGL extension set exposed by `getSupportedExtensions()`.
/// Anything outside this set is filtered out by the evasion script —
/// see DESIGN.md: blocking non-baseline extensions outright is the
/// behaviour that keeps fingerprint entropy bounded, chosen over
/// passing unknown extensions through unfiltered.
pub const WEBGL_BASELINE_EXTENSIONS: &[&str] = &[
    "ANGLE_instanced_arrays",
    "EXT_blend_minmax",
    "EXT_clip_control",
    "EXT_color_buffer_half_float",
    "EXT_depth_clamp",
    "EXT_disjoint_timer_query",
    "EXT_float_blend",
    "EXT_frag_depth",
    "EXT_polygon_offset_clamp",
    "EXT_shader_texture_lod",
    "EXT_texture_compression_bptc",
    "EXT_texture_compression_rgtc",
    "EXT_texture_filter_anisotropic",
    "EXT_texture_mirror_clamp_to_edge",
    "EXT_sRGB",
    "KHR_parallel_shader_compile",
    "OES_element_index_uint",
    "OES_fbo_render_mipmap",
    "OES_standard_derivatives",
    "OES_texture_float",
    "OES_texture_float_linear",
    "OES_texture_half_float",
    "OES_texture_half_float_linear",
    "OES_vertex_array_object",
    "WEBGL_color_buffer_float",
    "WEBGL_compressed_texture_s3tc",
    "WEBGL_compressed_texture_s3tc_srgb",
    "WEBGL_debug_renderer_info",
    "WEBGL_debug_shaders",
    "WEBGL_depth_texture",
    "WEBGL_lose_context",
    "WEBGL_multi_draw",
];

/// `(shader_type, precision_type) -> (range_min, range_max, precision)`
/// fixed desktop shader-precision triples, used so `getShaderPrecisionFormat`
/// never reveals mobile/GPU-tier precision differences.
pub const SHADER_PRECISION_TABLE: &[((&str, &str), (i32, i32, i32))] = &[
    (("VERTEX_SHADER", "LOW_FLOAT"), (127, 127, 23)),
    (("VERTEX_SHADER", "MEDIUM_FLOAT"), (127, 127, 23)),
    (("VERTEX_SHADER", "HIGH_FLOAT"), (127, 127, 23)),
    (("VERTEX_SHADER", "LOW_INT"), (31, 30, 0)),
    (("VERTEX_SHADER", "MEDIUM_INT"), (31, 30, 0)),
    (("VERTEX_SHADER", "HIGH_INT"), (31, 30, 0)),
    (("FRAGMENT_SHADER", "LOW_FLOAT"), (127, 127, 23)),
    (("FRAGMENT_SHADER", "MEDIUM_FLOAT"), (127, 127, 23)),
    (("FRAGMENT_SHADER", "HIGH_FLOAT"), (127, 127, 23)),
    (("FRAGMENT_SHADER", "LOW_INT"), (31, 30, 0)),
    (("FRAGMENT_SHADER", "MEDIUM_INT"), (31, 30, 0)),
    (("FRAGMENT_SHADER", "HIGH_INT"), (31, 30, 0)),
];

/// QWERTY physical-key adjacency, used by the keyboard primitive's typo
/// model. `' '` (space) maps to nothing — a typo on space is always a
/// double-tap, never an adjacent-key substitution.
pub const QWERTY_ADJACENCY: &[(char, &[char])] = &[
    ('a', &['q', 'w', 's', 'z']),
    ('b', &['v', 'g', 'h', 'n']),
    ('c', &['x', 'd', 'f', 'v']),
    ('d', &['s', 'e', 'r', 'f', 'c', 'x']),
    ('e', &['w', 's', 'd', 'r']),
    ('f', &['d', 'r', 't', 'g', 'v', 'c']),
    ('g', &['f', 't', 'y', 'h', 'b', 'v']),
    ('h', &['g', 'y', 'u', 'j', 'n', 'b']),
    ('i', &['u', 'j', 'k', 'o']),
    ('j', &['h', 'u', 'i', 'k', 'n', 'm']),
    ('k', &['j', 'i', 'o', 'l', 'm']),
    ('l', &['k', 'o', 'p']),
    ('m', &['n', 'j', 'k']),
    ('n', &['b', 'h', 'j', 'm']),
    ('o', &['i', 'k', 'l', 'p']),
    ('p', &['o', 'l']),
    ('q', &['w', 'a']),
    ('r', &['e', 'd', 'f', 't']),
    ('s', &['a', 'w', 'e', 'd', 'x', 'z']),
    ('t', &['r', 'f', 'g', 'y']),
    ('u', &['y', 'h', 'j', 'i']),
    ('v', &['c', 'f', 'g', 'b']),
    ('w', &['q', 'a', 's', 'e']),
    ('x', &['z', 's', 'd', 'c']),
    ('y', &['t', 'g', 'h', 'u']),
    ('z', &['a', 's', 'x']),
];

/// Selector/script markers for the known CAPTCHA providers.
pub const CAPTCHA_MARKERS: &[(&str, &[&str])] = &[
    ("recaptcha", &[".g-recaptcha", "[data-sitekey]"]),
    ("hcaptcha", &[".h-captcha"]),
    ("arkose", &["[data-arkose]", "script[src*=\"arkose\"]"]),
    ("geetest", &["[class*=\"geetest\"]", "script[src*=\"geetest\"]"]),
    ("turnstile", &[".cf-turnstile"]),
    ("funcaptcha", &["[class*=\"funcaptcha\"]", "script[src*=\"funcaptcha\"]"]),
];

/// Informational H/2 SETTINGS reference values. This core does not drive
/// an H2 stack directly (TLS/JA4 is delegated to an external sidecar) but
/// these inform the `priority`/window-related defaults the interceptor
/// emits.
pub struct Http2Settings;
impl Http2Settings {
    pub const HEADER_TABLE_SIZE: u32 = 65536;
    pub const ENABLE_PUSH: u32 = 0;
    pub const INITIAL_WINDOW_SIZE: u32 = 6_291_456;
    pub const MAX_HEADER_LIST_SIZE: u32 = 262_144;
}

/// Minimum Chrome major version required for the "modern" feature set
/// (zstd in Accept-Encoding, `priority` header, ua-ch brand shape).
pub const CHROME_MODERN_MAJOR_MIN: u32 = 124;

pub fn qwerty_neighbors(c: char) -> &'static [char] {
    QWERTY_ADJACENCY
        .iter()
        .find(|(k, _)| *k == c.to_ascii_lowercase())
        .map(|(_, v)| *v)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_accept_pool_has_four_entries() {
        assert_eq!(NAVIGATION_ACCEPT_POOL.len(), 4);
    }

    #[test]
    fn webgl_baseline_has_thirty_entries() {
        assert_eq!(WEBGL_BASELINE_EXTENSIONS.len(), 30);
    }

    #[test]
    fn every_letter_has_neighbors() {
        for c in 'a'..='z' {
            assert!(!qwerty_neighbors(c).is_empty(), "letter {c} has no neighbors");
        }
    }

    #[test]
    fn unknown_char_has_no_neighbors() {
        assert!(qwerty_neighbors(' ').is_empty());
    }
}
