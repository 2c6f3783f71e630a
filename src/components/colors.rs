use image::Rgba;

// ============================================================================
// COLOUR MODEL: exact RGB <-> HSV and hex helpers
// ============================================================================

/// Hue, saturation and value, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

impl Hsv {
    pub fn new(h: f64, s: f64, v: f64) -> Self {
        Self { h, s, v }
    }
}

#[inline(always)]
fn to_byte(x: f64) -> u8 {
    (x * 255.0 + 0.5).floor().clamp(0.0, 255.0) as u8
}

/// HSV to 8-bit RGB.
///
/// The hue wheel is split into six sectors, `i = floor(h·6) mod 6`, and each
/// sector picks one of `v, p, q, t` per channel. Channels are rounded with
/// `floor(x·255 + 0.5)` so conversions are reproducible bit-for-bit.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [u8; 3] {
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    let h6 = if h.is_finite() { h * 6.0 } else { 0.0 };
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [to_byte(r), to_byte(g), to_byte(b)]
}

/// 8-bit RGB to HSV. Achromatic input (r = g = b) yields hue 0, saturation 0.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    if d == 0.0 {
        return Hsv::new(0.0, 0.0, max);
    }

    let sector = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    Hsv::new(sector / 6.0, d / max, max)
}

pub fn hsv_to_hex(hsv: Hsv) -> String {
    let [r, g, b] = hsv_to_rgb(hsv.h, hsv.s, hsv.v);
    rgb_to_hex(r, g, b)
}

/// `#rrggbb`, lowercase.
pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// `#rrggbb` for opaque colours, `#rrggbbaa` otherwise.
pub fn rgba_to_hex(c: Rgba<u8>) -> String {
    if c[3] == 255 {
        rgb_to_hex(c[0], c[1], c[2])
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", c[0], c[1], c[2], c[3])
    }
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the `#` is optional).
pub fn parse_hex(s: &str) -> Option<Rgba<u8>> {
    let s = s.trim();
    let hex = s.strip_prefix('#').unwrap_or(s);
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => {
            let nib = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok().map(|n| n * 17);
            Some(Rgba([nib(0)?, nib(1)?, nib(2)?, 255]))
        }
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [255, 0, 0]);
        assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), [0, 255, 0]);
        assert_eq!(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), [0, 0, 255]);
        assert_eq!(hsv_to_rgb(1.0, 1.0, 1.0), [255, 0, 0]);
    }

    #[test]
    fn achromatic_short_circuits() {
        let hsv = rgb_to_hsv(128, 128, 128);
        assert_eq!(hsv.h, 0.0);
        assert_eq!(hsv.s, 0.0);
        assert_eq!(hsv_to_rgb(hsv.h, hsv.s, hsv.v), [128, 128, 128]);
    }

    #[test]
    fn round_trip_within_one() {
        for r in (0..=255u16).step_by(5) {
            for g in (0..=255u16).step_by(5) {
                for b in (0..=255u16).step_by(5) {
                    let (r, g, b) = (r as u8, g as u8, b as u8);
                    let hsv = rgb_to_hsv(r, g, b);
                    let back = parse_hex(&hsv_to_hex(hsv)).unwrap();
                    let direct = parse_hex(&rgb_to_hex(r, g, b)).unwrap();
                    for i in 0..3 {
                        let diff = (back[i] as i16 - direct[i] as i16).abs();
                        assert!(diff <= 1, "({r},{g},{b}) -> {:?}", back);
                    }
                }
            }
        }
    }

    #[test]
    fn hex_forms() {
        assert_eq!(parse_hex("#fff"), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(parse_hex("00ff7f"), Some(Rgba([0, 255, 127, 255])));
        assert_eq!(parse_hex("#11223344"), Some(Rgba([0x11, 0x22, 0x33, 0x44])));
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("#gg0000"), None);
        assert_eq!(rgba_to_hex(Rgba([1, 2, 3, 255])), "#010203");
        assert_eq!(rgba_to_hex(Rgba([1, 2, 3, 4])), "#01020304");
    }
}
