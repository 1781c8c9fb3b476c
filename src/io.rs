use image::codecs::png::PngEncoder;
use image::{ImageError, RgbaImage};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

// ============================================================================
// ERRORS
// ============================================================================

/// Failure to produce a decoded image from disk.
#[derive(Debug)]
pub enum AssetError {
    Io { path: PathBuf, source: std::io::Error },
    Decode { path: PathBuf, message: String },
}

impl std::fmt::Display for AssetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetError::Io { path, source } => write!(f, "cannot read {}: {}", path.display(), source),
            AssetError::Decode { path, message } => write!(f, "cannot decode {}: {}", path.display(), message),
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::Io { source, .. } => Some(source),
            AssetError::Decode { .. } => None,
        }
    }
}

/// Failure while rendering or writing an export.
#[derive(Debug)]
pub enum ExportError {
    /// No view is displayed, so there is nothing to export.
    NothingToExport,
    Io(std::io::Error),
    Encode(ImageError),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::NothingToExport => write!(f, "nothing to export: no car view is loaded"),
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
            ExportError::Encode(e) => write!(f, "PNG encode error: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<ImageError> for ExportError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::IoError(io) => ExportError::Io(io),
            other => ExportError::Encode(other),
        }
    }
}

// ============================================================================
// LOAD
// ============================================================================

/// Synchronously decode any format the `image` crate recognises into RGBA8.
/// The format is sniffed from the file contents, not the extension.
pub fn load_image_sync(path: &Path) -> Result<RgbaImage, AssetError> {
    let file = File::open(path).map_err(|source| AssetError::Io { path: path.to_path_buf(), source })?;
    let reader = image::io::Reader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(|source| AssetError::Io { path: path.to_path_buf(), source })?;
    let img = reader.decode().map_err(|e| AssetError::Decode { path: path.to_path_buf(), message: e.to_string() })?;
    Ok(img.to_rgba8())
}

/// View name derived from a file path (its stem).
pub fn view_name_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("view")
        .to_string()
}

// ============================================================================
// EXPORT
// ============================================================================

/// `car-<view>.png`, with path separators in the view name replaced.
pub fn export_file_name(view_name: &str) -> String {
    let safe: String = view_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect();
    format!("car-{}.png", safe)
}

/// Encode `image` as PNG into any writer.
pub fn encode_png<W: Write>(image: &RgbaImage, writer: W) -> Result<(), ExportError> {
    let encoder = PngEncoder::new(writer);
    #[allow(deprecated)]
    encoder.encode(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)?;
    Ok(())
}

/// Encode and write a PNG file, creating the parent directory if needed.
pub fn encode_and_write(image: &RgbaImage, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_png(image, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("right"), "car-right.png");
        assert_eq!(export_file_name("a/b"), "car-a_b.png");
    }

    #[test]
    fn test_png_write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        encode_and_write(&img, &path).unwrap();
        let back = load_image_sync(&path).unwrap();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(*back.get_pixel(2, 1), Rgba([1, 2, 3, 4]));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_image_sync(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
        assert!(err.to_string().contains("here.png"));
    }

    #[test]
    fn test_garbage_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"not an image at all").unwrap();
        let err = load_image_sync(&path).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }

    #[test]
    fn test_view_name_from_path() {
        assert_eq!(view_name_from_path(Path::new("shots/front-left.jpg")), "front-left");
    }
}
