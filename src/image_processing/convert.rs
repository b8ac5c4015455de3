use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// Luminance weights applied by the greyscale filter
const LUMA_WEIGHTS: (f32, f32, f32) = (0.2126, 0.7152, 0.0722);

/// 4x4 ordered-dither thresholds used before the RGB565 reduction
const RGB565_MATRIX: [u8; 16] = [1, 9, 3, 11, 13, 5, 15, 7, 4, 12, 2, 10, 16, 8, 14, 6];

/// Rounds of 2-means refinement for the quantize palette
const QUANTIZE_ITERATIONS: usize = 8;

/// Convert an image to single-channel luminance
pub fn convert_to_grayscale(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut grayscale = GrayImage::new(width, height);

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let r = pixel[0] as f32;
        let g = pixel[1] as f32;
        let b = pixel[2] as f32;

        let gray = (LUMA_WEIGHTS.0 * r + LUMA_WEIGHTS.1 * g + LUMA_WEIGHTS.2 * b)
            .round()
            .clamp(0.0, 255.0) as u8;

        grayscale.put_pixel(x, y, Luma([gray]));
    }

    grayscale
}

/// Reduce the image to a two-colour palette and map every pixel to its nearest entry
pub fn quantize_two_colors(img: &DynamicImage) -> RgbImage {
    let rgb = img.to_rgb8();
    let palette = two_color_palette(&rgb);

    let (width, height) = rgb.dimensions();
    let mut output = RgbImage::new(width, height);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (r, g, b) = find_closest_color(pixel[0], pixel[1], pixel[2], &palette);
        output.put_pixel(x, y, Rgb([r, g, b]));
    }

    output
}

/// Build a two-entry palette with 2-means clustering, seeded with the
/// darkest and the lightest pixel
fn two_color_palette(img: &RgbImage) -> [(u8, u8, u8); 2] {
    let mut darkest = (0u8, 0u8, 0u8);
    let mut lightest = (255u8, 255u8, 255u8);
    let mut min_luma = f32::MAX;
    let mut max_luma = f32::MIN;

    for pixel in img.pixels() {
        let luma = luminance(pixel);
        if luma < min_luma {
            min_luma = luma;
            darkest = (pixel[0], pixel[1], pixel[2]);
        }
        if luma > max_luma {
            max_luma = luma;
            lightest = (pixel[0], pixel[1], pixel[2]);
        }
    }

    let mut palette = [darkest, lightest];

    for _ in 0..QUANTIZE_ITERATIONS {
        let mut sums = [[0u64; 3]; 2];
        let mut counts = [0u64; 2];

        for pixel in img.pixels() {
            let nearest = find_closest_color(pixel[0], pixel[1], pixel[2], &palette);
            let index = if nearest == palette[0] { 0 } else { 1 };
            sums[index][0] += pixel[0] as u64;
            sums[index][1] += pixel[1] as u64;
            sums[index][2] += pixel[2] as u64;
            counts[index] += 1;
        }

        let mut next = palette;
        for index in 0..2 {
            if counts[index] > 0 {
                next[index] = (
                    (sums[index][0] / counts[index]) as u8,
                    (sums[index][1] / counts[index]) as u8,
                    (sums[index][2] / counts[index]) as u8,
                );
            }
        }

        if next == palette {
            break;
        }
        palette = next;
    }

    palette
}

fn luminance(pixel: &Rgb<u8>) -> f32 {
    LUMA_WEIGHTS.0 * pixel[0] as f32 + LUMA_WEIGHTS.1 * pixel[1] as f32 + LUMA_WEIGHTS.2 * pixel[2] as f32
}

/// Find the closest color in a palette by Euclidean RGB distance
fn find_closest_color(r: u8, g: u8, b: u8, palette: &[(u8, u8, u8)]) -> (u8, u8, u8) {
    let mut min_distance = f32::MAX;
    let mut closest_color = palette[0];

    for &(pr, pg, pb) in palette {
        let dr = (r as f32) - (pr as f32);
        let dg = (g as f32) - (pg as f32);
        let db = (b as f32) - (pb as f32);

        let distance = dr * dr + dg * dg + db * db;

        if distance < min_distance {
            min_distance = distance;
            closest_color = (pr, pg, pb);
        }
    }

    closest_color
}

/// Ordered dither down to RGB565 precision
pub fn dither_rgb565(img: &DynamicImage) -> RgbImage {
    let mut output = img.to_rgb8();

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let threshold_id = (((y & 3) << 2) + (x % 4)) as usize;
        let dither = RGB565_MATRIX[threshold_id];

        let r = pixel[0].saturating_add(dither) & 0xf8;
        let g = pixel[1].saturating_add(dither) & 0xfc;
        let b = pixel[2].saturating_add(dither) & 0xf8;

        *pixel = Rgb([r, g, b]);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        }))
    }

    #[test]
    fn test_grayscale_uses_luminance_weights() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 0, 0])));
        let gray = convert_to_grayscale(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 54);

        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 255, 255])));
        assert_eq!(convert_to_grayscale(&white).get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_quantize_leaves_at_most_two_colors() {
        let out = quantize_two_colors(&gradient(32, 32));
        let colors: HashSet<[u8; 3]> = out.pixels().map(|p| p.0).collect();
        assert!(colors.len() <= 2);
        assert_eq!(out.dimensions(), (32, 32));
    }

    #[test]
    fn test_quantize_two_color_input_is_stable() {
        let img = RgbImage::from_fn(4, 4, |x, _| {
            if x < 2 {
                Rgb([10, 20, 30])
            } else {
                Rgb([200, 210, 220])
            }
        });
        let out = quantize_two_colors(&DynamicImage::ImageRgb8(img.clone()));
        assert_eq!(out, img);
    }

    #[test]
    fn test_find_closest_color() {
        let palette = [(0, 0, 0), (255, 255, 255)];
        assert_eq!(find_closest_color(10, 10, 10, &palette), (0, 0, 0));
        assert_eq!(find_closest_color(200, 220, 240, &palette), (255, 255, 255));
    }

    #[test]
    fn test_dither_truncates_to_rgb565() {
        let out = dither_rgb565(&gradient(16, 16));
        for pixel in out.pixels() {
            assert_eq!(pixel[0] & 0x07, 0);
            assert_eq!(pixel[1] & 0x03, 0);
            assert_eq!(pixel[2] & 0x07, 0);
        }
    }

    #[test]
    fn test_dither_saturates_at_white() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let out = dither_rgb565(&white);
        assert!(out.pixels().all(|p| p.0 == [0xf8, 0xfc, 0xf8]));
    }
}
