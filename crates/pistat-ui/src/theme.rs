//! Accent theme: presets and hex colour math.

use std::fmt;

/// An opaque RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb`, `#rrggbb`, or the same without `#`.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        if !expanded.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let v = u32::from_str_radix(&expanded, 16).ok()?;
        Some(Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8))
    }

    /// Blend toward white (0.0 = unchanged, 1.0 = white), rounding to
    /// the nearest channel value.
    pub fn lighten(self, ratio: f32) -> Self {
        lerp_rgb(self, Self::WHITE, ratio)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Linearly interpolate two colours.
pub fn lerp_rgb(a: Rgb, b: Rgb, t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8;
    Rgb::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
}

/// Normalize user input to lowercase `#rrggbb`.
pub fn normalize_hex(value: &str) -> Option<String> {
    Rgb::parse_hex(value).map(|c| c.to_string())
}

/// A full colour set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub accent: Rgb,
    pub accent2: Rgb,
    pub muted: Rgb,
    pub bg: Rgb,
    pub panel: Rgb,
}

/// Named presets in display order.
pub const PRESETS: [(&str, Palette); 4] = [
    (
        "green",
        Palette {
            accent: Rgb::new(0x39, 0xff, 0x14),
            accent2: Rgb::new(0x7e, 0xff, 0x3f),
            muted: Rgb::new(0x63, 0xb3, 0x6b),
            bg: Rgb::new(0x00, 0x0a, 0x00),
            panel: Rgb::new(0x00, 0x12, 0x00),
        },
    ),
    (
        "amber",
        Palette {
            accent: Rgb::new(0xff, 0xb3, 0x47),
            accent2: Rgb::new(0xff, 0xd1, 0x66),
            muted: Rgb::new(0xff, 0xc6, 0x80),
            bg: Rgb::new(0x1d, 0x12, 0x00),
            panel: Rgb::new(0x2a, 0x1a, 0x00),
        },
    ),
    (
        "blue",
        Palette {
            accent: Rgb::new(0x5a, 0xd1, 0xff),
            accent2: Rgb::new(0x89, 0xe0, 0xff),
            muted: Rgb::new(0x7a, 0xa6, 0xff),
            bg: Rgb::new(0x00, 0x11, 0x1d),
            panel: Rgb::new(0x00, 0x1a, 0x2b),
        },
    ),
    (
        "purple",
        Palette {
            accent: Rgb::new(0xc7, 0x7d, 0xff),
            accent2: Rgb::new(0xe0, 0xaa, 0xff),
            muted: Rgb::new(0xb7, 0x94, 0xf6),
            bg: Rgb::new(0x14, 0x00, 0x16),
            panel: Rgb::new(0x1f, 0x00, 0x26),
        },
    ),
];

pub fn preset(name: &str) -> Option<Palette> {
    PRESETS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, p)| *p)
}

/// Preset names joined with `sep`.
pub fn preset_names(sep: &str) -> String {
    PRESETS.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(sep)
}

/// The theme currently applied to the console.
#[derive(Debug, Clone)]
pub struct ThemeState {
    pub palette: Palette,
    pub preset_name: Option<String>,
}

impl Default for ThemeState {
    fn default() -> Self {
        Self {
            palette: PRESETS[0].1,
            preset_name: Some(PRESETS[0].0.to_string()),
        }
    }
}

impl ThemeState {
    /// Switch to a named preset. Returns `false` for unknown names.
    pub fn apply_preset(&mut self, name: &str) -> bool {
        let Some(palette) = preset(name) else {
            return false;
        };
        self.palette = palette;
        self.preset_name = Some(name.to_ascii_lowercase());
        log::info!("theme preset '{name}' applied");
        true
    }

    /// Set a custom accent and derive the secondary shades from it.
    /// Returns the normalized hex, or `None` if the input is not a colour.
    pub fn apply_accent(&mut self, hex: &str) -> Option<String> {
        let accent = Rgb::parse_hex(hex)?;
        self.palette.accent = accent;
        self.palette.accent2 = accent.lighten(0.25);
        self.palette.muted = accent.lighten(0.45);
        self.preset_name = None;
        Some(accent.to_string())
    }
}
