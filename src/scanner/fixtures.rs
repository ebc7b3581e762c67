//! Image fixtures for scanner tests. EXIF-bearing JPEGs are assembled
//! by hand since the exif crate only reads.

use std::io::Cursor;

pub fn plain_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([20, 90, 160]),
    ));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// A PNG whose left half is fully transparent and right half opaque.
pub fn rgba_png(width: u32, height: u32) -> Vec<u8> {
    let mut img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 30, 255]));
    for (x, _, pixel) in img.enumerate_pixels_mut() {
        if x < width / 2 {
            *pixel = image::Rgba([0, 0, 0, 0]);
        }
    }
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn plain_jpeg(width: u32, height: u32) -> Vec<u8> {
    base_jpeg(width, height)
}

/// A JPEG tagged with Make="Canon", Orientation=6, ExposureTime=1/500,
/// FNumber=28/10, ISO=100 and DateTimeOriginal=2023:06:15 14:30:00.
pub fn canon_exif_jpeg() -> Vec<u8> {
    let mut tiff = tiff_header();

    // IFD0 at offset 8, three entries
    push_u16(&mut tiff, 3);
    push_entry(&mut tiff, 0x010F, ASCII, 6, 140); // Make
    push_entry(&mut tiff, 0x0112, SHORT, 1, 6); // Orientation
    push_entry(&mut tiff, 0x8769, LONG, 1, 50); // Exif IFD pointer
    push_u32(&mut tiff, 0);

    // Exif IFD at offset 50, four entries
    push_u16(&mut tiff, 4);
    push_entry(&mut tiff, 0x829A, RATIONAL, 1, 104); // ExposureTime
    push_entry(&mut tiff, 0x829D, RATIONAL, 1, 112); // FNumber
    push_entry(&mut tiff, 0x8827, SHORT, 1, 100); // PhotographicSensitivity
    push_entry(&mut tiff, 0x9003, ASCII, 20, 120); // DateTimeOriginal
    push_u32(&mut tiff, 0);

    // Value area
    push_u32(&mut tiff, 1); // 104: 1/500 s
    push_u32(&mut tiff, 500);
    push_u32(&mut tiff, 28); // 112: f/2.8
    push_u32(&mut tiff, 10);
    tiff.extend_from_slice(b"2023:06:15 14:30:00\0"); // 120
    tiff.extend_from_slice(b"Canon\0"); // 140

    with_exif_segment(&base_jpeg(4, 4), &tiff)
}

/// A JPEG carrying only the plain DateTime tag, no DateTimeOriginal.
pub fn datetime_fallback_jpeg() -> Vec<u8> {
    let mut tiff = tiff_header();

    push_u16(&mut tiff, 1);
    push_entry(&mut tiff, 0x0132, ASCII, 20, 26); // DateTime
    push_u32(&mut tiff, 0);

    tiff.extend_from_slice(b"2021:01:02 03:04:05\0"); // 26

    with_exif_segment(&base_jpeg(4, 4), &tiff)
}

const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;

fn tiff_header() -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    push_u16(&mut tiff, 42);
    push_u32(&mut tiff, 8);
    tiff
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_entry(out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32) {
    push_u16(out, tag);
    push_u16(out, kind);
    push_u32(out, count);
    push_u32(out, value);
}

fn base_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([180, 60, 40]),
    ));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .unwrap();
    bytes
}

fn with_exif_segment(jpeg: &[u8], tiff: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.push(0xFF);
    out.push(0xE1);
    let length = (2 + 6 + tiff.len()) as u16;
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}
