use image::{Rgb, RgbImage};

use vehicle_analysis::{ColorLabel, ColorRecognizer};

/// HSV lands outside every palette range (hue ~15, saturation ~80, value 200).
const UNMATCHED: Rgb<u8> = Rgb([200, 168, 137]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const WHITE: Rgb<u8> = Rgb([240, 240, 240]);
const BLACK: Rgb<u8> = Rgb([10, 10, 10]);

/// 100x100 image painted in horizontal bands: `(rows, color)` from the top.
fn bands(layout: &[(u32, Rgb<u8>)]) -> RgbImage {
    let mut rows = Vec::new();
    for &(count, color) in layout {
        rows.extend(std::iter::repeat(color).take(count as usize));
    }
    assert_eq!(rows.len(), 100);
    RgbImage::from_fn(100, 100, |_, y| rows[y as usize])
}

fn full_region() -> ColorRecognizer {
    ColorRecognizer::new(1.0).unwrap()
}

#[test]
fn solid_hues_classify_as_themselves() {
    let recognizer = ColorRecognizer::default();
    for (pixel, label) in [
        (RED, ColorLabel::Red),
        (GREEN, ColorLabel::Green),
        (BLUE, ColorLabel::Blue),
        (Rgb([255, 255, 0]), ColorLabel::Yellow),
        (WHITE, ColorLabel::White),
    ] {
        let image = RgbImage::from_pixel(80, 60, pixel);
        assert_eq!(recognizer.recognize(&image).unwrap(), label, "{:?}", pixel);
    }
}

#[test]
fn solid_body_filling_the_crop_is_classified_at_any_size() {
    let recognizer = full_region();
    for (w, h) in [(4, 4), (7, 5), (60, 45), (200, 120)] {
        let image = RgbImage::from_pixel(w, h, RED);
        assert_eq!(
            recognizer.recognize(&image).unwrap(),
            ColorLabel::Red,
            "{}x{}",
            w,
            h
        );
    }
}

#[test]
fn solid_black_and_gray_short_circuit() {
    let recognizer = ColorRecognizer::default();
    assert_eq!(
        recognizer
            .recognize(&RgbImage::from_pixel(40, 40, BLACK))
            .unwrap(),
        ColorLabel::Black
    );
    assert_eq!(
        recognizer
            .recognize(&RgbImage::from_pixel(40, 40, Rgb([128, 128, 128])))
            .unwrap(),
        ColorLabel::Gray
    );
}

#[test]
fn sparse_color_is_unknown() {
    // 5% red, the rest matches nothing.
    let image = bands(&[(5, RED), (95, UNMATCHED)]);
    assert_eq!(full_region().recognize(&image).unwrap(), ColorLabel::Unknown);
}

#[test]
fn unmatched_region_is_unknown() {
    let image = RgbImage::from_pixel(50, 50, UNMATCHED);
    assert_eq!(full_region().recognize(&image).unwrap(), ColorLabel::Unknown);
}

#[test]
fn strong_runner_up_overrides_the_top_color() {
    // 55% blue over 25% white: 25/55 reaches the override ratio.
    let image = bands(&[(55, BLUE), (25, WHITE), (20, UNMATCHED)]);
    assert_eq!(full_region().recognize(&image).unwrap(), ColorLabel::White);
}

#[test]
fn weak_runner_up_keeps_the_top_color() {
    // 10/55 stays below the override ratio.
    let image = bands(&[(55, BLUE), (10, WHITE), (35, UNMATCHED)]);
    assert_eq!(full_region().recognize(&image).unwrap(), ColorLabel::Blue);
}

#[test]
fn black_majority_beats_scattered_color() {
    // Neither chromatic color reaches 10% on its own; black outnumbers both 10x+.
    let image = bands(&[(4, RED), (92, BLACK), (4, GREEN)]);
    assert_eq!(full_region().recognize(&image).unwrap(), ColorLabel::Black);
}

#[test]
fn center_crop_drops_the_border() {
    // A 10% red frame around a green body disappears with the default crop.
    let image = RgbImage::from_fn(100, 100, |x, y| {
        if x < 10 || x >= 90 || y < 10 || y >= 90 {
            RED
        } else {
            GREEN
        }
    });
    assert_eq!(
        ColorRecognizer::default().recognize(&image).unwrap(),
        ColorLabel::Green
    );
}

#[test]
fn body_mask_ignores_small_detached_blobs() {
    // A small green badge away from the red body does not enter the vote.
    let image = RgbImage::from_fn(100, 100, |x, y| {
        if (10..60).contains(&x) && (10..90).contains(&y) {
            RED
        } else if (80..95).contains(&x) && (40..55).contains(&y) {
            GREEN
        } else {
            UNMATCHED
        }
    });
    assert_eq!(full_region().recognize(&image).unwrap(), ColorLabel::Red);
}

#[test]
fn classification_is_deterministic() {
    let image = bands(&[(55, BLUE), (25, WHITE), (20, UNMATCHED)]);
    let recognizer = full_region();
    let first = recognizer.recognize(&image).unwrap();
    for _ in 0..3 {
        assert_eq!(recognizer.recognize(&image).unwrap(), first);
    }
}
