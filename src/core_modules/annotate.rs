// THEORY:
// The `annotate` module renders the visual QA artifact for one image: the
// source pixels overlaid with the tile grid (thin green rectangles), each
// kept detection's box (thick red rectangle), and its outline polygon
// (blue border with a translucent random fill). Nothing downstream consumes
// this image; it exists so a human can spot seam artifacts, double counts,
// and padding ghosts at a glance.

use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use rand::Rng;

use crate::core_modules::detection::Detection;
use crate::core_modules::patch_grid::PatchGrid;

const GRID_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BOX_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const OUTLINE_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
const BOX_THICKNESS: i32 = 3;
const FILL_ALPHA: u8 = 125;

/// Renders the annotated copy of `image`: tile boundaries, detection boxes,
/// and translucent polygon fills. Detections must be in the global frame.
pub fn render_annotations(
    image: &image::RgbImage,
    grid: &PatchGrid,
    detections: &[Detection],
) -> RgbaImage {
    let mut canvas = image::DynamicImage::ImageRgb8(image.clone()).to_rgba8();
    let mut rng = rand::thread_rng();

    for patch in &grid.patches {
        draw_clamped_rect(
            &mut canvas,
            patch.x0 as i32,
            patch.y0 as i32,
            patch.x1 as i32,
            patch.y1 as i32,
            GRID_COLOR,
        );
    }

    for detection in detections {
        let fill = Rgba([rng.gen_range(0..=255), rng.gen_range(0..=255), rng.gen_range(0..=255), FILL_ALPHA]);
        fill_polygon_blended(&mut canvas, &detection.polygon, fill);
        draw_polygon_outline(&mut canvas, &detection.polygon);

        // Thick box outline, clamped so edge detections stay visible.
        for t in 0..BOX_THICKNESS {
            draw_clamped_rect(
                &mut canvas,
                detection.bbox.x1 as i32 + t,
                detection.bbox.y1 as i32 + t,
                detection.bbox.x2 as i32 - t,
                detection.bbox.y2 as i32 - t,
                BOX_COLOR,
            );
        }
    }

    canvas
}

fn draw_clamped_rect(canvas: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let w = canvas.width() as i32;
    let h = canvas.height() as i32;
    let x0 = x0.clamp(0, w - 1);
    let y0 = y0.clamp(0, h - 1);
    let x1 = x1.clamp(0, w - 1);
    let y1 = y1.clamp(0, h - 1);
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    let rect = Rect::at(x0, y0).of_size((x1 - x0) as u32, (y1 - y0) as u32);
    draw_hollow_rect_mut(canvas, rect, color);
}

fn draw_polygon_outline(canvas: &mut RgbaImage, polygon: &[(f64, f64)]) {
    if polygon.len() < 3 {
        return;
    }
    for i in 0..polygon.len() {
        let (x1, y1) = polygon[i];
        let (x2, y2) = polygon[(i + 1) % polygon.len()];
        draw_line_segment_mut(
            canvas,
            (x1 as f32, y1 as f32),
            (x2 as f32, y2 as f32),
            OUTLINE_COLOR,
        );
    }
}

/// Scanline fill with alpha blending; the underlying tissue stays visible
/// through the overlay. Polygons with fewer than 3 vertices are skipped,
/// matching the area engine's notion of a degenerate outline.
fn fill_polygon_blended(canvas: &mut RgbaImage, polygon: &[(f64, f64)], fill: Rgba<u8>) {
    if polygon.len() < 3 {
        return;
    }
    let h = canvas.height() as i32;
    let w = canvas.width() as i32;
    let y_min = polygon.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).floor() as i32;
    let y_max = polygon.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max).ceil() as i32;

    for y in y_min.max(0)..=y_max.min(h - 1) {
        let scan_y = y as f64 + 0.5;
        let mut crossings = Vec::new();
        for i in 0..polygon.len() {
            let (x1, y1) = polygon[i];
            let (x2, y2) = polygon[(i + 1) % polygon.len()];
            if (y1 <= scan_y && scan_y < y2) || (y2 <= scan_y && scan_y < y1) {
                crossings.push(x1 + (scan_y - y1) / (y2 - y1) * (x2 - x1));
            }
        }
        crossings.sort_by(f64::total_cmp);

        for pair in crossings.chunks(2) {
            let [start, end] = pair else { continue };
            let x_lo = (start.ceil() as i32).max(0);
            let x_hi = (end.floor() as i32).min(w - 1);
            for x in x_lo..=x_hi {
                let mut px = *canvas.get_pixel(x as u32, y as u32);
                px.blend(&fill);
                canvas.put_pixel(x as u32, y as u32, px);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::detection::{BoundingBox, CoordFrame};
    use image::{Rgb, RgbImage};

    fn det(x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
        Detection {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            score: 0.9,
            label: 0,
            polygon: vec![(x1, y1), (x2, y1), (x2, y2), (x1, y2)],
            frame: CoordFrame::Global,
        }
    }

    #[test]
    fn polygon_fill_blends_inside_and_leaves_outside_untouched() {
        let mut canvas = RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255]));
        fill_polygon_blended(
            &mut canvas,
            &[(10.0, 10.0), (30.0, 10.0), (30.0, 30.0), (10.0, 30.0)],
            Rgba([0, 0, 255, FILL_ALPHA]),
        );

        let inside = canvas.get_pixel(20, 20);
        let outside = canvas.get_pixel(40, 40);
        assert_ne!(*inside, Rgba([255, 255, 255, 255]));
        // Translucent: the white underneath still contributes.
        assert!(inside.0[0] > 0);
        assert_eq!(*outside, Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn degenerate_polygon_draws_nothing() {
        let mut canvas = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        fill_polygon_blended(&mut canvas, &[(1.0, 1.0), (5.0, 5.0)], Rgba([255, 0, 0, 255]));
        assert!(canvas.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn render_marks_grid_and_detection() {
        let image = RgbImage::from_pixel(100, 100, Rgb([200, 200, 200]));
        let grid = PatchGrid::new(100, 100, 64).expect("valid grid");
        let annotated = render_annotations(&image, &grid, &[det(10.0, 10.0, 40.0, 40.0)]);

        assert_eq!(annotated.dimensions(), (100, 100));
        // Tile boundary pixel is green.
        assert_eq!(*annotated.get_pixel(0, 0), GRID_COLOR);
        // Detection box edge is red.
        assert_eq!(*annotated.get_pixel(25, 10), BOX_COLOR);
    }

    #[test]
    fn off_image_box_is_clamped_not_panicking() {
        let image = RgbImage::from_pixel(50, 50, Rgb([200, 200, 200]));
        let grid = PatchGrid::new(50, 50, 64).expect("valid grid");
        let annotated = render_annotations(&image, &grid, &[det(40.0, 40.0, 80.0, 80.0)]);
        assert_eq!(annotated.dimensions(), (50, 50));
    }
}
