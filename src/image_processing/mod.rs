pub mod convert;
pub mod orientation;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::cli::Algorithm;
use orientation::{apply_rotation, read_exif_orientation};

/// `(image bytes, quality) -> JPEG bytes`
pub type TransformFn = fn(&[u8], u8) -> Result<Vec<u8>>;

/// Fixed mapping from the configured algorithm to its transform
pub fn transform_for(algorithm: Algorithm) -> TransformFn {
    match algorithm {
        Algorithm::Greyscale => greyscale,
        Algorithm::Quantize => quantize,
        Algorithm::Compress => compress,
        Algorithm::Dither => dither,
    }
}

/// Run the configured transform. Failures are returned untouched.
pub fn run_transform(algorithm: Algorithm, bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    transform_for(algorithm)(bytes, quality)
}

/// Re-encode as JPEG
pub fn compress(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = decode(bytes)?;
    encode_jpeg(&img, quality)
}

/// Luminance-only JPEG
pub fn greyscale(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = decode(bytes)?;
    let gray = convert::convert_to_grayscale(&img);
    encode_jpeg(&DynamicImage::ImageLuma8(gray), quality)
}

/// Two-colour palette, then JPEG
pub fn quantize(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = decode(bytes)?;
    let quantized = convert::quantize_two_colors(&img);
    encode_jpeg(&DynamicImage::ImageRgb8(quantized), quality)
}

/// RGB565 ordered dither, then JPEG
pub fn dither(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let img = decode(bytes)?;
    let dithered = convert::dither_rgb565(&img);
    encode_jpeg(&DynamicImage::ImageRgb8(dithered), quality)
}

/// Decode an in-memory image and apply its EXIF orientation
fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let img = image::load_from_memory(bytes).context("Failed to decode image")?;
    let orientation = read_exif_orientation(bytes);
    if orientation.is_identity() {
        return Ok(img);
    }
    Ok(apply_rotation(img, orientation))
}

/// Encode as baseline JPEG. Alpha is dropped; single-channel images stay single-channel.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);

    match img {
        DynamicImage::ImageLuma8(gray) => gray
            .write_with_encoder(encoder)
            .context("Failed to encode greyscale JPEG")?,
        other => other
            .to_rgb8()
            .write_with_encoder(encoder)
            .context("Failed to encode JPEG")?,
    }

    Ok(buffer)
}
