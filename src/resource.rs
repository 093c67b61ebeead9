//! Image resources referenced from markup.
//!
//! Sources are `data:` URIs or local files. Relative references are resolved
//! against the converter's base URL, which must name a local directory (a
//! plain path or a `file://` URL).

use crate::error::{FolioError, Result};
use base64::Engine;
use image::GenericImageView;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A decoded image ready to be written as a PDF image XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    id: String,
    pub width: u32,
    pub height: u32,
    pub color_space: &'static str,
    pub bits_per_component: u8,
    pub filter: Option<&'static str>,
    pub data: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

impl ImageData {
    /// Content-derived key; identical images share one PDF object.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn decode(data: &[u8], mime: Option<&str>) -> std::result::Result<ImageData, String> {
        let format = match mime {
            Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
            Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
                Some(image::ImageFormat::Jpeg)
            }
            _ => image::guess_format(data).ok(),
        };
        let decoded = image::load_from_memory(data).map_err(|err| err.to_string())?;
        let (width, height) = decoded.dimensions();
        let id = format!("img-{:016x}", hash_bytes(data));

        if matches!(format, Some(image::ImageFormat::Jpeg)) {
            let color_space = match decoded.color() {
                image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
                _ => "/DeviceRGB",
            };
            return Ok(ImageData {
                id,
                width,
                height,
                color_space,
                bits_per_component: 8,
                filter: Some("/DCTDecode"),
                data: data.to_vec(),
                alpha: None,
            });
        }

        let rgba = decoded.to_rgba8();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        let mut has_alpha = false;
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            has_alpha |= a != 255;
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
        }
        Ok(ImageData {
            id,
            width,
            height,
            color_space: "/DeviceRGB",
            bits_per_component: 8,
            filter: None,
            data: rgb,
            alpha: has_alpha.then_some(alpha),
        })
    }
}

/// Loads and decodes the image named by an `img src` value.
pub fn load_image(source: &str, base_url: Option<&str>) -> Result<Arc<ImageData>> {
    let source = source.trim();
    let fail = |reason: String| FolioError::Resource {
        reference: source.to_string(),
        reason,
    };
    if source.is_empty() {
        return Err(fail("empty image reference".to_string()));
    }
    if source.starts_with("data:") {
        let (mime, bytes) =
            parse_data_uri(source).ok_or_else(|| fail("malformed data URI".to_string()))?;
        return ImageData::decode(&bytes, Some(&mime))
            .map(Arc::new)
            .map_err(fail);
    }
    let path = resolve_path(source, base_url).map_err(fail)?;
    let bytes =
        std::fs::read(&path).map_err(|err| fail(format!("{}: {err}", path.display())))?;
    ImageData::decode(&bytes, None).map(Arc::new).map_err(fail)
}

fn resolve_path(source: &str, base_url: Option<&str>) -> std::result::Result<PathBuf, String> {
    if is_remote(source) {
        return Err("remote resources are not fetched".to_string());
    }
    let local = strip_file_scheme(source);
    let path = Path::new(local);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    match base_url.map(str::trim).filter(|base| !base.is_empty()) {
        Some(base) if is_remote(base) => Err(format!(
            "base URL {base} is remote; remote resources are not fetched"
        )),
        Some(base) => Ok(Path::new(strip_file_scheme(base)).join(path)),
        None => Ok(path.to_path_buf()),
    }
}

fn is_remote(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

fn strip_file_scheme(reference: &str) -> &str {
    reference.strip_prefix("file://").unwrap_or(reference)
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let (header, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_ascii_lowercase();
    let data = if header.contains(";base64") {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A 2x1 PNG with one opaque red and one half-transparent blue pixel.
    pub(crate) fn tiny_png() -> Vec<u8> {
        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([0, 0, 255, 128]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    pub(crate) fn tiny_png_data_uri() -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(tiny_png())
        )
    }

    #[test]
    fn decodes_png_data_uri_with_alpha() {
        let image = load_image(&tiny_png_data_uri(), None).unwrap();
        assert_eq!((image.width, image.height), (2, 1));
        assert_eq!(image.data, vec![255, 0, 0, 0, 0, 255]);
        assert_eq!(image.alpha.as_deref(), Some(&[255u8, 128][..]));
        assert!(image.id().starts_with("img-"));
    }

    #[test]
    fn relative_paths_resolve_against_base_url() {
        let dir = std::env::temp_dir().join(format!("folio-res-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("dot.png"), tiny_png()).unwrap();
        let base = format!("file://{}", dir.display());
        let image = load_image("dot.png", Some(&base)).unwrap();
        assert_eq!(image.width, 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unresolvable_images_are_resource_errors() {
        let err = load_image("https://example.com/a.png", None).unwrap_err();
        assert!(matches!(err, FolioError::Resource { .. }));
        let err = load_image("definitely/not/here.png", None).unwrap_err();
        assert!(matches!(err, FolioError::Resource { ref reference, .. } if reference == "definitely/not/here.png"));
        let err = load_image("data:image/png;base64,!!!", None).unwrap_err();
        assert!(matches!(err, FolioError::Resource { .. }));
    }
}
