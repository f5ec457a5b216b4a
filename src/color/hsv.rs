use image::Rgb;

/// 8-bit HSV pixel on the usual OpenCV scale: hue `0..=180` (degrees / 2),
/// saturation and value `0..=255`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// Convert one RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv(pixel: &Rgb<u8>) -> Hsv {
    let [r, g, b] = pixel.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let s = if max == 0 {
        0.0
    } else {
        delta * 255.0 / max as f32
    };

    let h = if delta == 0.0 {
        0.0
    } else {
        let (r, g, b) = (r as f32, g as f32, b as f32);
        let degrees = if max as f32 == r {
            60.0 * (g - b) / delta
        } else if max as f32 == g {
            120.0 + 60.0 * (b - r) / delta
        } else {
            240.0 + 60.0 * (r - g) / delta
        };
        if degrees < 0.0 {
            degrees + 360.0
        } else {
            degrees
        }
    };

    Hsv {
        h: (h / 2.0).round() as u8,
        s: s.round() as u8,
        v: max,
    }
}
