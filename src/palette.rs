//! Colour names used in report configs.

use plotters::style::RGBColor;

use crate::error::{ReportError, Result};

const NAMED: &[(&str, (u8, u8, u8))] = &[
    ("beige", (245, 245, 220)),
    ("black", (0, 0, 0)),
    ("blue", (0, 0, 255)),
    ("darkblue", (0, 0, 139)),
    ("gray", (128, 128, 128)),
    ("green", (0, 128, 0)),
    ("grey", (128, 128, 128)),
    ("lightblue", (173, 216, 230)),
    ("lightgray", (211, 211, 211)),
    ("lightgrey", (211, 211, 211)),
    ("orange", (255, 165, 0)),
    ("red", (255, 0, 0)),
    ("white", (255, 255, 255)),
];

/// Parse `#rrggbb`, `#rgb` or a CSS colour name from the table above.
pub fn parse_color(value: &str) -> Result<RGBColor> {
    let s = value.trim();
    if let Some(hex) = s.strip_prefix('#') {
        let channel = |h: &str| u8::from_str_radix(h, 16).ok();
        let rgb = match hex.len() {
            _ if !hex.is_ascii() => None,
            6 => channel(&hex[0..2])
                .zip(channel(&hex[2..4]))
                .zip(channel(&hex[4..6]))
                .map(|((r, g), b)| (r, g, b)),
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                expand(0)
                    .zip(expand(1))
                    .zip(expand(2))
                    .map(|((r, g), b)| (r, g, b))
            }
            _ => None,
        };
        return rgb
            .map(|(r, g, b)| RGBColor(r, g, b))
            .ok_or_else(|| ReportError::InvalidData(format!("bad hex colour '{value}'")));
    }

    let lower = s.to_lowercase();
    NAMED
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, (r, g, b))| RGBColor(*r, *g, *b))
        .ok_or_else(|| ReportError::InvalidData(format!("unknown colour '{value}'")))
}

pub fn to_hex(c: &RGBColor) -> String {
    format!("#{:02x}{:02x}{:02x}", c.0, c.1, c.2)
}

/// Linear blend from `low` (t = 0) to `high` (t = 1).
pub fn lerp(low: &RGBColor, high: &RGBColor, t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(low.0, high.0), mix(low.1, high.1), mix(low.2, high.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_and_names() {
        assert_eq!(parse_color("#1f77b4").unwrap(), RGBColor(0x1f, 0x77, 0xb4));
        assert_eq!(parse_color("#fff").unwrap(), RGBColor(255, 255, 255));
        assert_eq!(parse_color("LightGrey").unwrap(), RGBColor(211, 211, 211));
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("chartreuse-ish").is_err());
    }

    #[test]
    fn test_lerp_endpoints() {
        let low = RGBColor(0, 0, 0);
        let high = RGBColor(200, 100, 50);
        assert_eq!(lerp(&low, &high, 0.0), low);
        assert_eq!(lerp(&low, &high, 1.0), high);
        assert_eq!(lerp(&low, &high, 0.5), RGBColor(100, 50, 25));
        assert_eq!(to_hex(&high), "#c86432");
    }
}
