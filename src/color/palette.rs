use std::fmt;

use serde::{Serialize, Serializer};

use super::hsv::Hsv;

/// Body color labels. `Unknown` is a normal outcome, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorLabel {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Black,
    White,
    Gray,
    Unknown,
}

impl ColorLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorLabel::Red => "Red",
            ColorLabel::Orange => "Orange",
            ColorLabel::Yellow => "Yellow",
            ColorLabel::Green => "Green",
            ColorLabel::Blue => "Blue",
            ColorLabel::Purple => "Purple",
            ColorLabel::Black => "Black",
            ColorLabel::White => "White",
            ColorLabel::Gray => "Gray",
            ColorLabel::Unknown => "Unknown",
        }
    }

    /// Black and Gray are decided by the achromatic short-circuit and are kept
    /// out of the body mask.
    pub fn is_achromatic_dark(&self) -> bool {
        matches!(self, ColorLabel::Black | ColorLabel::Gray)
    }
}

impl fmt::Display for ColorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ColorLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Inclusive HSV box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HsvRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl HsvRange {
    const fn new(lower: (u8, u8, u8), upper: (u8, u8, u8)) -> Self {
        Self {
            lower: Hsv::new(lower.0, lower.1, lower.2),
            upper: Hsv::new(upper.0, upper.1, upper.2),
        }
    }

    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&hsv.h)
            && (self.lower.s..=self.upper.s).contains(&hsv.s)
            && (self.lower.v..=self.upper.v).contains(&hsv.v)
    }
}

/// One palette entry. A color may own several disjoint ranges.
#[derive(Clone, Copy, Debug)]
pub struct PaletteEntry {
    pub label: ColorLabel,
    pub ranges: &'static [HsvRange],
}

impl PaletteEntry {
    pub fn matches(&self, hsv: Hsv) -> bool {
        self.ranges.iter().any(|range| range.contains(hsv))
    }
}

/// Palette in ranking tie-break order.
pub static PALETTE: [PaletteEntry; 9] = [
    PaletteEntry {
        label: ColorLabel::Red,
        // Hue wraps at 0/180.
        ranges: &[
            HsvRange::new((0, 70, 50), (10, 255, 255)),
            HsvRange::new((170, 70, 50), (180, 255, 255)),
        ],
    },
    PaletteEntry {
        label: ColorLabel::Orange,
        ranges: &[HsvRange::new((11, 100, 100), (25, 255, 255))],
    },
    PaletteEntry {
        label: ColorLabel::Yellow,
        ranges: &[HsvRange::new((26, 100, 100), (34, 255, 255))],
    },
    PaletteEntry {
        label: ColorLabel::Green,
        ranges: &[HsvRange::new((35, 52, 72), (85, 255, 255))],
    },
    PaletteEntry {
        label: ColorLabel::Blue,
        ranges: &[HsvRange::new((86, 80, 2), (125, 255, 255))],
    },
    PaletteEntry {
        label: ColorLabel::Purple,
        ranges: &[HsvRange::new((126, 100, 100), (150, 255, 255))],
    },
    PaletteEntry {
        label: ColorLabel::Black,
        ranges: &[HsvRange::new((0, 0, 0), (180, 255, 50))],
    },
    PaletteEntry {
        label: ColorLabel::White,
        ranges: &[HsvRange::new((0, 0, 200), (180, 50, 255))],
    },
    PaletteEntry {
        label: ColorLabel::Gray,
        ranges: &[HsvRange::new((0, 0, 51), (180, 50, 199))],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::hsv::rgb_to_hsv;
    use image::Rgb;

    fn labels_for(pixel: [u8; 3]) -> Vec<ColorLabel> {
        let hsv = rgb_to_hsv(&Rgb(pixel));
        PALETTE
            .iter()
            .filter(|entry| entry.matches(hsv))
            .map(|entry| entry.label)
            .collect()
    }

    #[test]
    fn pure_hues_land_in_their_ranges() {
        assert_eq!(labels_for([255, 0, 0]), vec![ColorLabel::Red]);
        assert_eq!(labels_for([255, 0, 20]), vec![ColorLabel::Red]);
        assert_eq!(labels_for([255, 255, 0]), vec![ColorLabel::Yellow]);
        assert_eq!(labels_for([0, 255, 0]), vec![ColorLabel::Green]);
        assert_eq!(labels_for([0, 0, 255]), vec![ColorLabel::Blue]);
        assert_eq!(labels_for([255, 128, 0]), vec![ColorLabel::Orange]);
        assert_eq!(labels_for([128, 0, 255]), vec![ColorLabel::Purple]);
    }

    #[test]
    fn achromatic_bands_split_on_value() {
        assert_eq!(labels_for([10, 10, 10]), vec![ColorLabel::Black]);
        assert_eq!(labels_for([128, 128, 128]), vec![ColorLabel::Gray]);
        assert_eq!(labels_for([240, 240, 240]), vec![ColorLabel::White]);
    }

    #[test]
    fn labels_serialize_to_display_names() {
        assert_eq!(serde_json::to_value(ColorLabel::Gray).unwrap(), "Gray");
        assert_eq!(ColorLabel::Unknown.to_string(), "Unknown");
        assert!(ColorLabel::Black.is_achromatic_dark());
        assert!(!ColorLabel::White.is_achromatic_dark());
    }
}
