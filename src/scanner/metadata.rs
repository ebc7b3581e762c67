use chrono::NaiveDateTime;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Fixed layout of EXIF date fields.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Clone, Default)]
pub struct ImageMetadata {
    // Capture time, "YYYY:MM:DD HH:MM:SS"
    pub date_taken: Option<String>,

    // Camera info
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,

    // Exposure settings
    pub focal_length: Option<f64>,
    pub focal_length_35mm: Option<f64>,
    pub aperture: Option<f64>,
    pub shutter_speed: Option<String>,
    pub iso: Option<i64>,

    // GPS
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_altitude: Option<f64>,

    // Enumerated tags rendered as display text
    pub orientation: Option<String>,
    pub color_space: Option<String>,
    pub white_balance: Option<String>,
    pub metering_mode: Option<String>,
    pub exposure_program: Option<String>,
    pub flash: Option<String>,
}

/// Extract the EXIF block of an image file into a normalized record.
///
/// Extraction never fails: a file without EXIF, or one the parser
/// rejects, yields an empty record. A malformed individual tag drops
/// that field only.
pub fn extract_metadata(path: &Path) -> ImageMetadata {
    let mut metadata = ImageMetadata::default();

    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return metadata,
    };
    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(e) => e,
        Err(_) => return metadata,
    };

    // Capture timestamp: original capture preferred, file-modified fallback
    metadata.date_taken = date_field(&exif, exif::Tag::DateTimeOriginal)
        .or_else(|| date_field(&exif, exif::Tag::DateTime));

    metadata.camera_make = string_field(&exif, exif::Tag::Make);
    metadata.camera_model = string_field(&exif, exif::Tag::Model);
    metadata.lens_model = string_field(&exif, exif::Tag::LensModel);

    metadata.focal_length = rational_field(&exif, exif::Tag::FocalLength);
    metadata.focal_length_35mm =
        uint_field(&exif, exif::Tag::FocalLengthIn35mmFilm).map(|v| v as f64);
    metadata.aperture = rational_field(&exif, exif::Tag::FNumber);
    metadata.shutter_speed = shutter_field(&exif);
    metadata.iso = uint_field(&exif, exif::Tag::PhotographicSensitivity);

    if let (Some(lat), Some(lat_ref)) = (
        exif.get_field(exif::Tag::GPSLatitude, exif::In::PRIMARY),
        exif.get_field(exif::Tag::GPSLatitudeRef, exif::In::PRIMARY),
    ) {
        if let exif::Value::Rational(ref values) = lat.value {
            let reference = lat_ref.display_value().to_string();
            metadata.gps_latitude = gps_to_decimal(values, &reference);
        }
    }

    if let (Some(lon), Some(lon_ref)) = (
        exif.get_field(exif::Tag::GPSLongitude, exif::In::PRIMARY),
        exif.get_field(exif::Tag::GPSLongitudeRef, exif::In::PRIMARY),
    ) {
        if let exif::Value::Rational(ref values) = lon.value {
            let reference = lon_ref.display_value().to_string();
            metadata.gps_longitude = gps_to_decimal(values, &reference);
        }
    }

    metadata.gps_altitude = rational_field(&exif, exif::Tag::GPSAltitude);

    metadata.orientation = enum_field(&exif, exif::Tag::Orientation, orientation_text);
    metadata.color_space = enum_field(&exif, exif::Tag::ColorSpace, color_space_text);
    metadata.white_balance = enum_field(&exif, exif::Tag::WhiteBalance, white_balance_text);
    metadata.metering_mode = enum_field(&exif, exif::Tag::MeteringMode, metering_mode_text);
    metadata.exposure_program =
        enum_field(&exif, exif::Tag::ExposureProgram, exposure_program_text);
    metadata.flash = enum_field(&exif, exif::Tag::Flash, flash_text);

    metadata
}

fn string_field(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    exif.get_field(tag, exif::In::PRIMARY)
        .map(|field| field.display_value().to_string().trim_matches('"').to_string())
}

/// Date fields are kept as raw EXIF text, but only when they parse as a
/// well-formed timestamp.
fn date_field(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    let raw = match field.value {
        exif::Value::Ascii(ref v) => v
            .first()
            .map(|bytes| {
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string()
            })?,
        _ => return None,
    };
    NaiveDateTime::parse_from_str(&raw, EXIF_DATETIME_FORMAT).ok()?;
    Some(raw)
}

fn rational_field(exif: &exif::Exif, tag: exif::Tag) -> Option<f64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    if let exif::Value::Rational(ref v) = field.value {
        let r = v.first()?;
        if r.denom != 0 {
            return Some(r.num as f64 / r.denom as f64);
        }
    }
    None
}

fn uint_field(exif: &exif::Exif, tag: exif::Tag) -> Option<i64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Short(ref v) => v.first().map(|&x| x as i64),
        exif::Value::Long(ref v) => v.first().map(|&x| x as i64),
        _ => None,
    }
}

fn enum_field(exif: &exif::Exif, tag: exif::Tag, text: fn(i64) -> String) -> Option<String> {
    uint_field(exif, tag).map(text)
}

fn shutter_field(exif: &exif::Exif) -> Option<String> {
    let field = exif.get_field(exif::Tag::ExposureTime, exif::In::PRIMARY)?;
    if let exif::Value::Rational(ref v) = field.value {
        let r = v.first()?;
        return render_shutter(r.num, r.denom);
    }
    None
}

/// Render an exposure time rational as the conventional "1/N" text.
fn render_shutter(num: u32, denom: u32) -> Option<String> {
    if num == 0 || denom == 0 {
        return None;
    }
    let n = (denom as f64 / num as f64).round() as i64;
    Some(format!("1/{}", n))
}

fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

/// Convert a degrees/minutes/seconds rational triple to signed decimal
/// degrees. South and West references negate the result.
fn gps_to_decimal(values: &[exif::Rational], reference: &str) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }
    if values[..3].iter().any(|r| r.denom == 0) {
        return None;
    }
    let decimal = dms_to_decimal(
        values[0].num as f64 / values[0].denom as f64,
        values[1].num as f64 / values[1].denom as f64,
        values[2].num as f64 / values[2].denom as f64,
    );
    if reference.contains('S') || reference.contains('W') {
        Some(-decimal)
    } else {
        Some(decimal)
    }
}

fn orientation_text(code: i64) -> String {
    match code {
        1 => "Horizontal (normal)".to_string(),
        2 => "Mirror horizontal".to_string(),
        3 => "Rotate 180".to_string(),
        4 => "Mirror vertical".to_string(),
        5 => "Mirror horizontal and rotate 270 CW".to_string(),
        6 => "Rotate 90 CW".to_string(),
        7 => "Mirror horizontal and rotate 90 CW".to_string(),
        8 => "Rotate 270 CW".to_string(),
        _ => code.to_string(),
    }
}

fn color_space_text(code: i64) -> String {
    match code {
        1 => "sRGB".to_string(),
        2 => "Adobe RGB".to_string(),
        65535 => "Uncalibrated".to_string(),
        _ => code.to_string(),
    }
}

fn white_balance_text(code: i64) -> String {
    match code {
        0 => "Auto".to_string(),
        1 => "Manual".to_string(),
        2 => "Custom".to_string(),
        3 => "One-touch".to_string(),
        4 => "Subtle".to_string(),
        _ => code.to_string(),
    }
}

fn metering_mode_text(code: i64) -> String {
    match code {
        0 => "Unknown".to_string(),
        1 => "Average".to_string(),
        2 => "Center-weighted average".to_string(),
        3 => "Spot".to_string(),
        4 => "Multi-spot".to_string(),
        5 => "Pattern".to_string(),
        6 => "Partial".to_string(),
        255 => "Other".to_string(),
        _ => code.to_string(),
    }
}

fn exposure_program_text(code: i64) -> String {
    match code {
        0 => "Not defined".to_string(),
        1 => "Manual".to_string(),
        2 => "Normal program".to_string(),
        3 => "Aperture priority".to_string(),
        4 => "Shutter priority".to_string(),
        5 => "Creative program".to_string(),
        6 => "Action program".to_string(),
        7 => "Portrait mode".to_string(),
        8 => "Landscape mode".to_string(),
        _ => code.to_string(),
    }
}

fn flash_text(code: i64) -> String {
    match code {
        0 => "No Flash".to_string(),
        1 => "Fired".to_string(),
        5 => "Fired, Return not detected".to_string(),
        7 => "Fired, Return detected".to_string(),
        9 => "On".to_string(),
        13 => "On, Return not detected".to_string(),
        15 => "On, Return detected".to_string(),
        16 => "Off".to_string(),
        24 => "Auto, Did not fire".to_string(),
        25 => "Auto, Fired".to_string(),
        29 => "Auto, Fired, Return not detected".to_string(),
        31 => "Auto, Fired, Return detected".to_string(),
        32 => "No flash function".to_string(),
        65 => "Fired, Red-eye reduction".to_string(),
        69 => "Fired, Red-eye reduction, Return not detected".to_string(),
        71 => "Fired, Red-eye reduction, Return detected".to_string(),
        73 => "On, Red-eye reduction".to_string(),
        77 => "On, Red-eye reduction, Return not detected".to_string(),
        79 => "On, Red-eye reduction, Return detected".to_string(),
        89 => "Auto, Fired, Red-eye reduction".to_string(),
        93 => "Auto, Fired, Red-eye reduction, Return not detected".to_string(),
        95 => "Auto, Fired, Red-eye reduction, Return detected".to_string(),
        _ => code.to_string(),
    }
}
