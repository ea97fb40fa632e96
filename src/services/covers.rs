use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tokio::fs;
use tokio::task;
use tracing::info;

/// Covers are downscaled to fit inside this square, preserving aspect ratio.
pub const COVER_MAX_DIMENSION: u32 = 800;
pub const COVER_JPEG_QUALITY: u8 = 85;

const COVERS_DIR: &str = "covers";

/// EXIF orientation values 2 through 8; anything else decodes as `Normal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Orientation {
    #[default]
    Normal,
    MirroredHorizontal,
    Rotate90,
    MirroredVertical,
    MirroredHorizontalRotate270,
    MirroredHorizontalRotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    const fn from_exif_value(value: u32) -> Self {
        match value {
            2 => Self::MirroredHorizontal,
            3 => Self::Rotate180,
            4 => Self::MirroredVertical,
            5 => Self::MirroredHorizontalRotate270,
            6 => Self::Rotate90,
            7 => Self::MirroredHorizontalRotate90,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    fn correct(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::MirroredHorizontal => img.fliph(),
            Self::Rotate90 => img.rotate90(),
            Self::MirroredVertical => img.flipv(),
            Self::MirroredHorizontalRotate270 => img.fliph().rotate270(),
            Self::MirroredHorizontalRotate90 => img.fliph().rotate90(),
            Self::Rotate180 => img.rotate180(),
            Self::Rotate270 => img.rotate270(),
        }
    }
}

/// Normalizes uploaded and downloaded cover images and manages their files
/// under the media directory.
pub struct CoverService {
    media_dir: PathBuf,
    max_bytes: usize,
}

impl CoverService {
    pub fn new(media_dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            media_dir: media_dir.into(),
            max_bytes,
        }
    }

    /// Processes raw image bytes and writes the result to
    /// `covers/{media_id}.jpg`. Returns the relative path stored on the
    /// media row.
    pub async fn store(&self, media_id: i32, bytes: Vec<u8>) -> Result<String> {
        if bytes.len() > self.max_bytes {
            anyhow::bail!(
                "Cover is {} bytes, above the {} byte limit",
                bytes.len(),
                self.max_bytes
            );
        }

        let processed = task::spawn_blocking(move || process_cover(&bytes))
            .await
            .context("Cover processing task failed")??;

        let covers_dir = self.media_dir.join(COVERS_DIR);
        if !covers_dir.exists() {
            fs::create_dir_all(&covers_dir).await?;
        }

        let filename = format!("{media_id}.jpg");
        let file_path = covers_dir.join(&filename);

        fs::write(&file_path, processed)
            .await
            .with_context(|| format!("Failed to write cover to {}", file_path.display()))?;

        info!(path = %file_path.display(), "Stored cover image");

        Ok(format!("{COVERS_DIR}/{filename}"))
    }

    /// Deletes the file behind a stored cover path. Missing files are fine;
    /// paths escaping the media directory are not.
    pub async fn remove(&self, relative_path: &str) -> Result<()> {
        let relative = Path::new(relative_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|part| matches!(part, std::path::Component::ParentDir))
        {
            anyhow::bail!("Refusing to delete cover outside the media directory: {relative_path}");
        }

        let file_path = self.media_dir.join(relative);
        match fs::remove_file(&file_path).await {
            Ok(()) => {
                info!(path = %file_path.display(), "Deleted cover image");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("Failed to delete cover at {}", file_path.display())
            }),
        }
    }

    #[must_use]
    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }
}

/// Decode, orient, downscale, flatten to RGB and re-encode as JPEG.
/// CPU-bound; callers run it through `spawn_blocking`.
fn process_cover(bytes: &[u8]) -> Result<Vec<u8>> {
    let format = image::guess_format(bytes).context("Unrecognized image data")?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
    ) {
        anyhow::bail!("Unsupported cover format: {format:?}");
    }

    let decoded = image::load_from_memory_with_format(bytes, format)
        .context("Failed to decode cover image")?;

    let oriented = orientation_from_exif(bytes).correct(decoded);

    let resized = if oriented.width() > COVER_MAX_DIMENSION || oriented.height() > COVER_MAX_DIMENSION
    {
        oriented.resize(COVER_MAX_DIMENSION, COVER_MAX_DIMENSION, FilterType::Triangle)
    } else {
        oriented
    };

    let flattened = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut output = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut output, COVER_JPEG_QUALITY);
    flattened
        .write_with_encoder(encoder)
        .context("Failed to encode cover JPEG")?;

    Ok(output.into_inner())
}

fn orientation_from_exif(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);
    let Ok(data) = exif::Reader::new().read_from_container(&mut cursor) else {
        return Orientation::default();
    };

    data.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .map_or_else(Orientation::default, Orientation::from_exif_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([200, 40, 40, 255]),
        ));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_process_downscales_to_fit() {
        let processed = process_cover(&png_bytes(1920, 1080)).unwrap();
        let result = image::load_from_memory(&processed).unwrap();
        assert_eq!((result.width(), result.height()), (800, 450));
        assert_eq!(image::guess_format(&processed).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_process_keeps_small_images() {
        let processed = process_cover(&png_bytes(300, 200)).unwrap();
        let result = image::load_from_memory(&processed).unwrap();
        assert_eq!((result.width(), result.height()), (300, 200));
    }

    #[test]
    fn test_process_rejects_tiff() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 255])));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Tiff).unwrap();

        let err = process_cover(&bytes.into_inner()).unwrap_err();
        assert!(err.to_string().contains("Unsupported cover format"));
    }

    #[test]
    fn test_process_rejects_garbage() {
        assert!(process_cover(b"definitely not an image").is_err());
    }

    #[test]
    fn test_orientation_mapping() {
        assert_eq!(Orientation::from_exif_value(1), Orientation::Normal);
        assert_eq!(Orientation::from_exif_value(3), Orientation::Rotate180);
        assert_eq!(Orientation::from_exif_value(6), Orientation::Rotate90);
        assert_eq!(Orientation::from_exif_value(8), Orientation::Rotate270);
        assert_eq!(Orientation::from_exif_value(99), Orientation::Normal);
    }

    #[test]
    fn test_orientation_correct_rotates_dimensions() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(200, 100));
        let corrected = Orientation::Rotate90.correct(img);
        assert_eq!((corrected.width(), corrected.height()), (100, 200));
    }

    #[test]
    fn test_plain_png_has_no_orientation() {
        assert_eq!(orientation_from_exif(&png_bytes(4, 4)), Orientation::Normal);
    }

    #[tokio::test]
    async fn test_store_and_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let service = CoverService::new(dir.path(), 10 * 1024 * 1024);

        let stored = service.store(7, png_bytes(1000, 500)).await.unwrap();
        assert_eq!(stored, "covers/7.jpg");
        assert!(dir.path().join("covers/7.jpg").exists());

        service.remove(&stored).await.unwrap();
        assert!(!dir.path().join("covers/7.jpg").exists());

        // A second remove is a no-op.
        service.remove(&stored).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_rejects_oversized_payload() {
        let dir = tempfile::tempdir().unwrap();
        let service = CoverService::new(dir.path(), 10);

        let err = service.store(1, png_bytes(100, 100)).await.unwrap_err();
        assert!(err.to_string().contains("byte limit"));
    }

    #[tokio::test]
    async fn test_remove_refuses_path_escape() {
        let dir = tempfile::tempdir().unwrap();
        let service = CoverService::new(dir.path(), 1024);

        assert!(service.remove("../outside.jpg").await.is_err());
        assert!(service.remove("/etc/passwd").await.is_err());
    }
}
