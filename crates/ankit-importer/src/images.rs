//! Image discovery and validation.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File extensions treated as images, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Whether the path has a supported image extension (case-insensitive).
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Image files directly inside `folder`, in lexical filename order.
///
/// Files with other extensions are ignored. Subdirectories are not searched.
pub fn scan_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported(path))
        .collect();
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

/// MIME type from the file signature, if it is a supported image.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// A validated image, ready to send.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub path: PathBuf,
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Sniffed from the content, not the extension.
    pub mime_type: &'static str,
}

/// Read and validate an image: non-empty, at most `max_bytes`, and a
/// recognised image signature.
pub async fn load(path: &Path, max_bytes: u64) -> Result<ImageData> {
    let invalid = |reason: String| Error::InvalidImage {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| invalid(format!("cannot read file: {}", e)))?;
    if !metadata.is_file() {
        return Err(invalid("not a file".to_string()));
    }
    let size = metadata.len();
    if size == 0 {
        return Err(invalid("file is empty".to_string()));
    }
    if size > max_bytes {
        return Err(invalid(format!(
            "file too large ({:.1} MB, max {:.1} MB)",
            megabytes(size),
            megabytes(max_bytes)
        )));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| invalid(format!("cannot read file: {}", e)))?;
    let mime_type = sniff_mime(&bytes).ok_or_else(|| {
        invalid("content is not a PNG, JPEG, GIF, BMP or WEBP image".to_string())
    })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(ImageData {
        path: path.to_path_buf(),
        filename,
        bytes,
        mime_type,
    })
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("a/page-1.PNG")));
        assert!(is_supported(Path::new("scan.jpeg")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(PNG), Some("image/png"));
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"GIF89a...."), Some("image/gif"));
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime(b"hello world"), None);
        assert_eq!(sniff_mime(b""), None);
    }

    #[test]
    fn test_scan_folder_is_lexical_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-2.png", "page-1.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), PNG).unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<_> = scan_folder(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-10.png", "page-2.png"]);
    }

    #[tokio::test]
    async fn test_load_validates() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.jpg");
        std::fs::write(&good, PNG).unwrap();
        let image = load(&good, 1024).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.filename, "good.jpg");

        let empty = dir.path().join("empty.png");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            load(&empty, 1024).await,
            Err(Error::InvalidImage { ref reason, .. }) if reason.contains("empty")
        ));

        assert!(matches!(
            load(&good, 4).await,
            Err(Error::InvalidImage { ref reason, .. }) if reason.contains("too large")
        ));

        let fake = dir.path().join("fake.png");
        std::fs::write(&fake, b"not an image").unwrap();
        assert!(matches!(load(&fake, 1024).await, Err(Error::InvalidImage { .. })));

        assert!(matches!(
            load(&dir.path().join("missing.png"), 1024).await,
            Err(Error::InvalidImage { .. })
        ));
    }
}
