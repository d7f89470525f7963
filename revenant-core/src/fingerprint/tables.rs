//! OS/browser profile pools consumed by `fingerprint::synthesize`. Not
//! fixed wire-protocol lookup tables (those live in `crate::constants`)
//! — these are the synthesiser's own source material and may be
//! extended freely as long as every entry stays internally consistent
//! (OS token, UA platform string, hardware/screen buckets all agree).

use crate::model::{BrowserToken, OsToken};

pub struct ChromeMajorPool {
    pub min: u32,
    pub max: u32,
}

/// Modern Chrome major version window. 124 is the floor for the modern
/// feature set this crate assumes (zstd, priority header, ua-ch brand
/// shape).
pub const CHROME_MAJOR_POOL: ChromeMajorPool = ChromeMajorPool { min: 124, max: 132 };

pub const HARDWARE_CONCURRENCY_BUCKET: &[u32] = &[2, 4, 6, 8, 12, 16];
pub const DEVICE_MEMORY_BUCKET: &[f64] = &[0.25, 0.5, 1.0, 2.0, 4.0, 8.0];
pub const PIXEL_RATIO_BUCKET: &[f64] = &[1.0, 1.25, 1.5, 2.0, 3.0];
pub const COLOR_DEPTH_BUCKET: &[u32] = &[24, 30];

pub struct ScreenBucket {
    pub w: u32,
    pub h: u32,
}

pub const WINDOWS_SCREEN_BUCKETS: &[ScreenBucket] = &[
    ScreenBucket { w: 1920, h: 1080 },
    ScreenBucket { w: 2560, h: 1440 },
    ScreenBucket { w: 1366, h: 768 },
    ScreenBucket { w: 3840, h: 2160 },
    ScreenBucket { w: 1536, h: 864 },
];

pub const MAC_SCREEN_BUCKETS: &[ScreenBucket] = &[
    ScreenBucket { w: 1440, h: 900 },
    ScreenBucket { w: 2560, h: 1600 },
    ScreenBucket { w: 1680, h: 1050 },
    ScreenBucket { w: 3024, h: 1964 },
];

pub const LINUX_SCREEN_BUCKETS: &[ScreenBucket] = &[
    ScreenBucket { w: 1920, h: 1080 },
    ScreenBucket { w: 1600, h: 900 },
    ScreenBucket { w: 2560, h: 1440 },
];

pub fn screen_buckets(os: OsToken) -> &'static [ScreenBucket] {
    match os {
        OsToken::Windows11 => WINDOWS_SCREEN_BUCKETS,
        OsToken::MacOs14 => MAC_SCREEN_BUCKETS,
        OsToken::Linux => LINUX_SCREEN_BUCKETS,
    }
}

pub fn ua_platform(os: OsToken) -> &'static str {
    match os {
        OsToken::Windows11 => "Win32",
        OsToken::MacOs14 => "MacIntel",
        OsToken::Linux => "Linux x86_64",
    }
}

pub fn ua_platform_version(os: OsToken) -> &'static str {
    match os {
        OsToken::Windows11 => "15.0.0",
        OsToken::MacOs14 => "14.5.0",
        OsToken::Linux => "6.8.0",
    }
}

pub fn os_label(os: OsToken) -> &'static str {
    match os {
        OsToken::Windows11 => "Windows NT 10.0; Win64; x64",
        OsToken::MacOs14 => "Macintosh; Intel Mac OS X 14_5",
        OsToken::Linux => "X11; Linux x86_64",
    }
}

pub fn ua_ch_platform(os: OsToken) -> &'static str {
    match os {
        OsToken::Windows11 => "Windows",
        OsToken::MacOs14 => "macOS",
        OsToken::Linux => "Linux",
    }
}

/// GREASE brand name pool. Real Chrome rotates this string across
/// releases; any of these is plausible for a given build.
pub const GREASE_BRANDS: &[&str] =
    &["Not_A Brand", "Not.A/Brand", "Not-A.Brand", "NotA(Brand"];

pub const WEBGL_VENDOR_RENDERER_PAIRS: &[(&str, &str)] = &[
    ("Google Inc. (NVIDIA)", "ANGLE (NVIDIA, NVIDIA GeForce RTX 3060 Direct3D11 vs_5_0 ps_5_0, D3D11)"),
    ("Google Inc. (Intel)", "ANGLE (Intel, Intel(R) UHD Graphics 630 Direct3D11 vs_5_0 ps_5_0, D3D11)"),
    ("Google Inc. (AMD)", "ANGLE (AMD, AMD Radeon RX 6600 Direct3D11 vs_5_0 ps_5_0, D3D11)"),
    ("Google Inc. (Apple)", "ANGLE (Apple, ANGLE Metal Renderer: Apple M2, Unspecified Version)"),
    ("Google Inc. (Intel)", "ANGLE (Intel, Mesa Intel(R) Graphics (ADL GT2), OpenGL 4.6)"),
];

pub fn webgl_pool_for_os(os: OsToken) -> &'static [(&'static str, &'static str)] {
    match os {
        OsToken::MacOs14 => &WEBGL_VENDOR_RENDERER_PAIRS[3..4],
        OsToken::Linux => &WEBGL_VENDOR_RENDERER_PAIRS[4..5],
        OsToken::Windows11 => &WEBGL_VENDOR_RENDERER_PAIRS[0..3],
    }
}

/// Web-safe core present on essentially every desktop install.
pub const CORE_FONT_POOL: &[&str] = &[
    "Arial", "Arial Black", "Arial Narrow", "Comic Sans MS", "Courier New",
    "Georgia", "Impact", "Times New Roman", "Trebuchet MS", "Verdana",
    "Tahoma", "Lucida Console", "Lucida Sans Unicode", "Palatino Linotype",
    "Book Antiqua", "Century Gothic", "Franklin Gothic Medium", "Garamond",
    "Consolas", "Segoe UI Symbol",
];

pub const WINDOWS_EXTRA_FONTS: &[&str] = &[
    "Segoe UI", "Segoe UI Light", "Segoe UI Semibold", "Segoe Print",
    "Segoe Script", "Calibri", "Cambria", "Cambria Math", "Candara",
    "Corbel", "Constantia", "Ebrima", "Gabriola", "Gadugi", "Javanese Text",
    "Leelawadee UI", "Malgun Gothic", "Marlett", "Microsoft Himalaya",
    "Microsoft JhengHei", "Microsoft New Tai Lue", "Microsoft PhagsPa",
    "Microsoft Sans Serif", "Microsoft Tai Le", "Microsoft Uighur",
    "Microsoft YaHei", "Mongolian Baiti", "MS Gothic", "MV Boli",
    "Myanmar Text", "Nirmala UI", "PMingLiU", "Sitka Text", "SimSun",
    "Sylfaen", "Yu Gothic", "Yu Mincho", "Bahnschrift", "Ink Free",
    "HoloLens MDL2 Assets", "Javanese Text", "DengXian", "FangSong",
    "KaiTi", "NSimSun", "SimHei", "Agency FB", "Algerian", "Bauhaus 93",
    "Bell MT", "Berlin Sans FB",
];

pub const MAC_EXTRA_FONTS: &[&str] = &[
    "Helvetica Neue", "Helvetica", "San Francisco", "SF Pro Display",
    "SF Pro Text", "SF Mono", "Avenir", "Avenir Next", "Baskerville",
    "Big Caslon", "Bodoni 72", "Chalkboard SE", "Cochin", "Copperplate",
    "Didot", "Futura", "Gill Sans", "Hoefler Text", "American Typewriter",
    "Andale Mono", "Apple Chancery", "Apple SD Gothic Neo", "Arial Hebrew",
    "Arial Rounded MT Bold", "Athelas", "Avenir Next Condensed",
    "Ayuthaya", "Baghdad", "Beirut", "Bradley Hand", "Brush Script MT",
    "Chalkduster", "Charter", "Comic Sans", "Damascus", "DecoType Naskh",
    "Devanagari Sangam MN", "Euphemia UCAS", "Farah", "Galvji",
    "Geeza Pro", "Geneva", "Gujarati Sangam MN", "Gurmukhi MN",
    "Heiti SC", "Heiti TC", "Herculanum", "Hiragino Kaku Gothic Pro",
    "Hiragino Mincho Pro", "Kailasa", "Kefa",
];

pub const LINUX_EXTRA_FONTS: &[&str] = &[
    "DejaVu Sans", "DejaVu Sans Mono", "DejaVu Serif", "Liberation Sans",
    "Liberation Serif", "Liberation Mono", "Noto Sans", "Noto Serif",
    "Noto Sans Mono", "Ubuntu", "Ubuntu Mono", "Ubuntu Condensed",
    "Cantarell", "Droid Sans", "Droid Serif", "Droid Sans Mono",
    "FreeSans", "FreeSerif", "FreeMono", "Nimbus Sans", "Nimbus Roman",
    "Nimbus Mono PS", "URW Bookman", "URW Gothic", "URW Palladio",
    "Bitstream Vera Sans", "Bitstream Vera Serif", "Bitstream Vera Sans Mono",
    "Source Sans Pro", "Source Code Pro", "Source Serif Pro", "Roboto",
    "Roboto Condensed", "Roboto Mono", "Open Sans", "PT Sans", "PT Serif",
    "Inconsolata", "Fira Sans", "Fira Mono", "Hack", "Lato", "Merriweather",
    "Noto Color Emoji", "Noto Sans CJK JP", "Noto Sans CJK SC",
    "Unifont", "Kacst", "Lohit Devanagari", "Padauk", "Abyssinica SIL",
];

pub fn font_master_list(os: OsToken) -> Vec<&'static str> {
    let extras: &[&str] = match os {
        OsToken::Windows11 => WINDOWS_EXTRA_FONTS,
        OsToken::MacOs14 => MAC_EXTRA_FONTS,
        OsToken::Linux => LINUX_EXTRA_FONTS,
    };
    let mut v: Vec<&'static str> = CORE_FONT_POOL.to_vec();
    v.extend_from_slice(extras);
    v
}

pub fn default_browser_for(os: OsToken) -> BrowserToken {
    match os {
        OsToken::Linux => BrowserToken::Firefox,
        _ => BrowserToken::Chrome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_os_has_a_sizeable_font_pool() {
        for os in [OsToken::Windows11, OsToken::MacOs14, OsToken::Linux] {
            assert!(font_master_list(os).len() >= 60);
        }
    }

    #[test]
    fn every_os_has_screen_buckets() {
        for os in [OsToken::Windows11, OsToken::MacOs14, OsToken::Linux] {
            assert!(!screen_buckets(os).is_empty());
        }
    }
}
