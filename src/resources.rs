//! Image resources referenced by the composed source.
//!
//! Sources are either base64 `data:` URIs or `file://` URIs. Each is read and
//! decoded once; both layout (intrinsic size) and the PDF writer (embedding)
//! draw from the same [`ResourceSet`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

use crate::layout::ImageSizes;

#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub px_width: u32,
    pub px_height: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    images: HashMap<String, LoadedImage>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: impl Into<String>, image: LoadedImage) {
        self.images.insert(src.into(), image);
    }

    pub fn get(&self, src: &str) -> Option<&LoadedImage> {
        self.images.get(src)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn image_sizes(&self) -> ImageSizes {
        self.images
            .iter()
            .map(|(src, img)| (src.clone(), (img.px_width as f32, img.px_height as f32)))
            .collect()
    }
}

/// Load every source. Sources that cannot be read or decoded are left out
/// and render as empty boxes.
pub fn load_all(sources: &[String]) -> ResourceSet {
    let mut set = ResourceSet::new();
    for src in sources {
        match load_image(src) {
            Ok(img) => {
                log::debug!(
                    "Loaded image {}×{} ({} bytes) from {}",
                    img.px_width,
                    img.px_height,
                    img.bytes.len(),
                    preview(src)
                );
                set.insert(src.clone(), img);
            }
            Err(e) => log::warn!("Skipping image {}: {e}", preview(src)),
        }
    }
    set
}

pub fn load_image(src: &str) -> Result<LoadedImage, String> {
    let bytes = fetch(src)?;
    let decoded = ::image::load_from_memory(&bytes).map_err(|e| format!("decode error: {e}"))?;
    Ok(LoadedImage {
        px_width: decoded.width(),
        px_height: decoded.height(),
        bytes,
    })
}

/// Raw bytes behind a `data:` or `file://` URI.
pub fn fetch(src: &str) -> Result<Vec<u8>, String> {
    if let Some(rest) = src.strip_prefix("data:") {
        let (header, data) = rest
            .split_once(',')
            .ok_or("data URI is missing the `,` separator")?;
        if !header.ends_with(";base64") {
            return Err("only base64 data URIs are supported".to_string());
        }
        return BASE64_STD
            .decode(data.trim())
            .map_err(|e| format!("base64 decode error: {e}"));
    }
    if let Some(path) = src.strip_prefix("file://") {
        let path = PathBuf::from(percent_decode(path));
        return fs::read(&path).map_err(|e| format!("cannot read {}: {e}", path.display()));
    }
    Err("unsupported image source, expected a data: or file:// URI".to_string())
}

/// `file://` URI for `path`. Characters that [`fetch`] would decode or that
/// end a URI path are escaped.
pub fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut out = String::with_capacity(raw.len() + 7);
    out.push_str("file://");
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            c => out.push(c),
        }
    }
    out
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn preview(src: &str) -> &str {
    match src.char_indices().nth(60) {
        Some((i, _)) => &src[..i],
        None => src,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::FALLBACK_PIXEL_URI;
    use std::io::Write;

    #[test]
    fn inline_pixel_decodes_to_one_by_one() {
        let img = load_image(FALLBACK_PIXEL_URI).unwrap();
        assert_eq!((img.px_width, img.px_height), (1, 1));
    }

    #[test]
    fn file_uri_reads_from_disk() {
        let bytes = fetch(FALLBACK_PIXEL_URI).unwrap();
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&bytes).unwrap();
        let uri = format!("file://{}", file.path().display());
        let img = load_image(&uri).unwrap();
        assert_eq!(img.bytes, bytes);
    }

    #[test]
    fn broken_sources_are_skipped() {
        let sources = vec![
            FALLBACK_PIXEL_URI.to_string(),
            "file:///nonexistent/rx-forge/logo.png".to_string(),
            "https://example.com/logo.png".to_string(),
        ];
        let set = load_all(&sources);
        assert_eq!(set.len(), 1);
        assert!(set.get(FALLBACK_PIXEL_URI).is_some());
        assert_eq!(set.image_sizes()[FALLBACK_PIXEL_URI], (1.0, 1.0));
    }

    #[test]
    fn percent_escapes_in_paths() {
        assert_eq!(percent_decode("/srv/my%20assets/logo.png"), "/srv/my assets/logo.png");
        assert_eq!(percent_decode("/srv/100%"), "/srv/100%");
    }

    #[test]
    fn file_uri_survives_percent_in_path() {
        let bytes = fetch(FALLBACK_PIXEL_URI).unwrap();
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a%41b #1?");
        fs::create_dir(&dir).unwrap();
        let path = dir.join("logo.png");
        fs::write(&path, &bytes).unwrap();

        let uri = file_uri(&path);
        assert!(uri.contains("a%2541b%20%231%3F"), "{uri}");
        assert_eq!(load_image(&uri).unwrap().bytes, bytes);
    }
}
