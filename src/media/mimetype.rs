use std::io::Cursor;

use image::ImageReader;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Sniff the content type from the leading bytes.
pub fn detect_mimetype(bytes: &[u8]) -> String {
    match infer::get(bytes) {
        Some(kind) => kind.mime_type().to_string(),
        None => OCTET_STREAM.to_string(),
    }
}

pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

pub fn is_image(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

/// Pixel dimensions from the image header, without decoding the pixels.
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::new(width, height);
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mimetype_detection() {
        let png = png_bytes(3, 2);
        assert_eq!(detect_mimetype(&png), "image/png");
        assert_eq!(extension_for(&detect_mimetype(&png)), "png");
        assert_eq!(detect_mimetype(b"plain text"), OCTET_STREAM);
        assert!(!is_image(OCTET_STREAM));
    }

    #[test]
    fn test_probe_dimensions() {
        assert_eq!(probe_dimensions(&png_bytes(64, 32)), Some((64, 32)));
        assert_eq!(probe_dimensions(b"not an image"), None);
    }
}
