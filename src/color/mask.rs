use image::{imageops, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::morphology::close;
use imageproc::point::Point;

/// Closing neighbourhood radius: a 5x5 square.
pub const CLOSE_RADIUS: u8 = 2;
/// Closing is applied as `CLOSE_ITERATIONS` dilations followed by as many erosions.
pub const CLOSE_ITERATIONS: u8 = 2;

const ON: Luma<u8> = Luma([255]);

/// Background margin around the mask while closing and tracing. Wide enough
/// that dilation never reaches the outer ring, so foreground touching the
/// crop edge still closes normally and traces as an outer border.
const PAD: u32 = (CLOSE_RADIUS * CLOSE_ITERATIONS) as u32 + 1;

/// Isolate the vehicle body from a binary chromatic mask.
///
/// Closes small holes, keeps the largest external contour and fills it solid.
/// Returns `None` when the mask has no foreground at all.
pub fn body_mask(chromatic: &GrayImage) -> Option<GrayImage> {
    let (width, height) = chromatic.dimensions();
    let mut padded = GrayImage::new(width + 2 * PAD, height + 2 * PAD);
    imageops::replace(&mut padded, chromatic, PAD as i64, PAD as i64);

    // Iterated square dilation/erosion is a single one with the radii summed.
    let closed = close(&padded, Norm::LInf, CLOSE_RADIUS * CLOSE_ITERATIONS);

    let contours = find_contours::<i32>(&closed);
    let largest = largest_external_contour(&contours)?;

    let offset = PAD as i32;
    let points: Vec<Point<i32>> = largest
        .points
        .iter()
        .map(|p| Point::new(p.x - offset, p.y - offset))
        .collect();

    let mut body = GrayImage::new(width, height);
    fill_contour(&mut body, &points);
    Some(body)
}

/// First contour of maximal area among the outermost borders.
fn largest_external_contour(contours: &[Contour<i32>]) -> Option<&Contour<i32>> {
    let mut best: Option<(&Contour<i32>, f64)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        let area = polygon_area(&contour.points);
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((contour, area)),
        }
    }
    best.map(|(contour, _)| contour)
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

fn fill_contour(mask: &mut GrayImage, points: &[Point<i32>]) {
    let mut polygon: Vec<Point<i32>> = points.to_vec();
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    if polygon.len() >= 3 {
        draw_polygon_mut(mask, &polygon, ON);
    }
    // Contour points are boundary pixels; set them explicitly so thin or
    // degenerate contours still cover themselves.
    let (width, height) = mask.dimensions();
    for p in points {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
            mask.put_pixel(p.x as u32, p.y as u32, ON);
        }
    }
}
