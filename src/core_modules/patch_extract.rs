// THEORY:
// The `patch_extract` module cuts one tile's pixels out of the source image,
// pasting them onto a canvas pre-filled with a fixed background color. Tiles
// on the right/bottom edge of the grid extend past the image, and the fill
// color is deliberately white rather than black: a zero-filled (black) border
// is empirically mistaken for real tissue structure by the detector, while a
// white border matches the well background it was trained on.

use image::{Rgb, RgbImage};

use crate::core_modules::patch_grid::PatchSpec;

/// Background color pasted under every patch before the image content is
/// copied in. White, matching the empty well background.
pub const BACKGROUND_FILL: Rgb<u8> = Rgb([255, 255, 255]);

/// Copies the tile described by `spec` out of `image` onto a
/// `patch_size x patch_size` background-filled canvas. Pixels beyond the
/// image's right/bottom edge keep the fill color.
pub fn extract_patch(image: &RgbImage, spec: &PatchSpec, patch_size: u32) -> RgbImage {
    let mut patch = RgbImage::from_pixel(patch_size, patch_size, BACKGROUND_FILL);
    let copy_w = patch_size.min(image.width().saturating_sub(spec.x0));
    let copy_h = patch_size.min(image.height().saturating_sub(spec.y0));

    for py in 0..copy_h {
        for px in 0..copy_w {
            patch.put_pixel(px, py, *image.get_pixel(spec.x0 + px, spec.y0 + py));
        }
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::patch_grid::PatchGrid;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 7]))
    }

    #[test]
    fn interior_patch_copies_source_pixels() {
        let image = gradient_image(200, 200);
        let grid = PatchGrid::new(200, 200, 64).expect("valid grid");
        let spec = grid.patches.iter().find(|p| p.grid_col == 1 && p.grid_row == 1).unwrap();

        let patch = extract_patch(&image, spec, 64);
        assert_eq!(patch.dimensions(), (64, 64));
        assert_eq!(*patch.get_pixel(0, 0), *image.get_pixel(spec.x0, spec.y0));
        assert_eq!(*patch.get_pixel(63, 63), *image.get_pixel(spec.x0 + 63, spec.y0 + 63));
    }

    #[test]
    fn overhanging_patch_is_background_filled() {
        let image = gradient_image(100, 100);
        let grid = PatchGrid::new(100, 100, 64).expect("valid grid");
        let spec = grid.patches.last().unwrap();
        assert!(spec.x1 > 100 && spec.y1 > 100);

        let patch = extract_patch(&image, spec, 64);
        // Inside the image: real content.
        assert_eq!(*patch.get_pixel(0, 0), *image.get_pixel(spec.x0, spec.y0));
        // Beyond the image: the white fill, not black.
        assert_eq!(*patch.get_pixel(63, 63), BACKGROUND_FILL);
    }

    #[test]
    fn fully_outside_patch_is_all_background() {
        let image = gradient_image(10, 10);
        let spec = PatchSpec {
            x0: 32,
            y0: 32,
            x1: 96,
            y1: 96,
            grid_col: 1,
            grid_row: 1,
        };
        let patch = extract_patch(&image, &spec, 64);
        assert!(patch.pixels().all(|p| *p == BACKGROUND_FILL));
    }
}
