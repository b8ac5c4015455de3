use anyhow::{Context, Result};
use exif::{In, Reader, Tag, Value};
use image::DynamicImage;
use std::io::Cursor;

/// EXIF orientation values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExifOrientation {
    /// No orientation specified or undefined
    Undefined = 0,
    /// Normal orientation (0 degrees)
    TopLeft = 1,
    /// Horizontally flipped
    TopRight = 2,
    /// Rotated 180 degrees
    BottomRight = 3,
    /// Vertically flipped
    BottomLeft = 4,
    /// Rotated 90 degrees CCW + horizontally flipped
    LeftTop = 5,
    /// Rotated 90 degrees CW
    RightTop = 6,
    /// Rotated 90 degrees CW + horizontally flipped
    RightBottom = 7,
    /// Rotated 90 degrees CCW
    LeftBottom = 8,
}

impl From<u32> for ExifOrientation {
    fn from(value: u32) -> Self {
        match value {
            1 => ExifOrientation::TopLeft,
            2 => ExifOrientation::TopRight,
            3 => ExifOrientation::BottomRight,
            4 => ExifOrientation::BottomLeft,
            5 => ExifOrientation::LeftTop,
            6 => ExifOrientation::RightTop,
            7 => ExifOrientation::RightBottom,
            8 => ExifOrientation::LeftBottom,
            _ => ExifOrientation::Undefined,
        }
    }
}

impl ExifOrientation {
    /// Whether pixels have to be moved at all
    pub fn is_identity(&self) -> bool {
        matches!(self, ExifOrientation::Undefined | ExifOrientation::TopLeft)
    }
}

/// Read the EXIF orientation tag from an in-memory image.
///
/// Images without EXIF data (most PNGs, screenshots) report `Undefined`.
pub fn read_exif_orientation(bytes: &[u8]) -> ExifOrientation {
    read_orientation_tag(bytes).unwrap_or(ExifOrientation::Undefined)
}

fn read_orientation_tag(bytes: &[u8]) -> Result<ExifOrientation> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .context("Failed to read EXIF data")?;

    if let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) {
        if let Value::Short(values) = &field.value {
            if let Some(&orientation_value) = values.first() {
                return Ok(ExifOrientation::from(orientation_value as u32));
            }
        }
    }

    Ok(ExifOrientation::Undefined)
}

/// Apply EXIF rotation so the pixels match what viewers display
pub fn apply_rotation(img: DynamicImage, orientation: ExifOrientation) -> DynamicImage {
    match orientation {
        ExifOrientation::Undefined | ExifOrientation::TopLeft => img,
        ExifOrientation::TopRight => img.fliph(),
        ExifOrientation::BottomRight => img.rotate180(),
        ExifOrientation::BottomLeft => img.flipv(),
        ExifOrientation::LeftTop => img.rotate270().fliph(),
        ExifOrientation::RightTop => img.rotate90(),
        ExifOrientation::RightBottom => img.rotate90().fliph(),
        ExifOrientation::LeftBottom => img.rotate270(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_exif_orientation_from_u32() {
        assert_eq!(ExifOrientation::from(1), ExifOrientation::TopLeft);
        assert_eq!(ExifOrientation::from(6), ExifOrientation::RightTop);
        assert_eq!(ExifOrientation::from(8), ExifOrientation::LeftBottom);
        assert_eq!(ExifOrientation::from(99), ExifOrientation::Undefined);
    }

    #[test]
    fn test_missing_exif_is_undefined() {
        assert_eq!(read_exif_orientation(b"not an image"), ExifOrientation::Undefined);
        assert_eq!(read_exif_orientation(&[]), ExifOrientation::Undefined);
    }

    #[test]
    fn test_quarter_turns_swap_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 2));

        let rotated = apply_rotation(img.clone(), ExifOrientation::RightTop);
        assert_eq!((rotated.width(), rotated.height()), (2, 4));

        let rotated = apply_rotation(img.clone(), ExifOrientation::LeftTop);
        assert_eq!((rotated.width(), rotated.height()), (2, 4));

        let same = apply_rotation(img, ExifOrientation::BottomRight);
        assert_eq!((same.width(), same.height()), (4, 2));
    }

    #[test]
    fn test_flip_moves_pixels() {
        let mut raw = RgbImage::new(2, 1);
        raw.put_pixel(0, 0, Rgb([255, 0, 0]));
        let flipped = apply_rotation(DynamicImage::ImageRgb8(raw), ExifOrientation::TopRight);
        assert_eq!(flipped.to_rgb8().get_pixel(1, 0), &Rgb([255, 0, 0]));
        assert!(!ExifOrientation::TopRight.is_identity());
        assert!(ExifOrientation::Undefined.is_identity());
    }
}
