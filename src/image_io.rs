//! Image file I/O through the `image` crate
//!
//! 8-bit files load as [`BitDepth::U8`], 16-bit files as [`BitDepth::U16`]
//! unless a narrower depth is requested (thermal sensors commonly store 12- or
//! 14-bit counts in 16-bit containers). Luma and RGB are kept as they are;
//! anything else (alpha, float) is converted to the nearest of the two.
//!
//! Saving writes sample values unchanged, so 8-bit images become 8-bit files
//! and every deeper image becomes a 16-bit file.

use std::io::{Cursor, Write};
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};

use crate::image::{BitDepth, Image, Shape};
use crate::{Error, Result};

fn io_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::ImageIo(format!("{}: {e}", path.display()))
}

/// Load an image; identity becomes `file:<path>`.
///
/// # Errors
///
/// Returns [`Error::ImageIo`] if the file cannot be decoded.
pub fn load(path: impl AsRef<Path>) -> Result<Image> {
    load_inner(path.as_ref(), None)
}

/// Load a 16-bit container holding samples of a narrower `depth`.
///
/// # Errors
///
/// Returns [`Error::ImageIo`] if the file cannot be decoded, if its container
/// and `depth` disagree (an 8-bit file with a deeper depth, a 16-bit file with
/// [`BitDepth::U8`]), or if it holds samples outside `depth`'s range.
pub fn load_with_depth(path: impl AsRef<Path>, depth: BitDepth) -> Result<Image> {
    load_inner(path.as_ref(), Some(depth))
}

fn load_inner(path: &Path, depth: Option<BitDepth>) -> Result<Image> {
    let decoded = image::open(path).map_err(|e| io_error(path, e))?;
    let (width, height) = (decoded.width() as usize, decoded.height() as usize);
    let color = decoded.color();
    let wide = color.bytes_per_pixel() / color.channel_count() > 1;
    let channels = if color.has_color() { 3 } else { 1 };

    let (native, samples): (BitDepth, Vec<u16>) = match (wide, channels) {
        (false, 1) => (BitDepth::U8, widen(decoded.to_luma8().into_raw())),
        (false, _) => (BitDepth::U8, widen(decoded.to_rgb8().into_raw())),
        (true, 1) => (BitDepth::U16, decoded.to_luma16().into_raw()),
        (true, _) => (BitDepth::U16, decoded.to_rgb16().into_raw()),
    };
    let depth = match depth {
        None => native,
        Some(requested) if requested == native => native,
        Some(BitDepth::U8) => {
            return Err(io_error(
                path,
                "16-bit file requested as 8-bit; samples would not fit",
            ))
        }
        Some(requested) if native == BitDepth::U16 => requested,
        Some(requested) => {
            return Err(io_error(
                path,
                format!("8-bit file cannot hold {}-bit samples", requested.bits()),
            ))
        }
    };

    let shape = Shape {
        width,
        height,
        channels,
    };
    let identity = format!("file:{}", path.display());
    let image = Image::new(shape, depth, samples, identity).map_err(|e| io_error(path, e))?;
    tracing::debug!(path = %path.display(), %shape, bits = depth.bits(), "image loaded");
    Ok(image)
}

fn widen(bytes: Vec<u8>) -> Vec<u16> {
    bytes.into_iter().map(u16::from).collect()
}

/// Encode `image` for saving.
///
/// # Errors
///
/// Returns [`Error::ImageIo`] if the buffer does not match the image shape.
pub fn to_dynamic(image: &Image) -> Result<DynamicImage> {
    let width = u32::try_from(image.width()).map_err(|e| Error::ImageIo(e.to_string()))?;
    let height = u32::try_from(image.height()).map_err(|e| Error::ImageIo(e.to_string()))?;
    let mismatch = || Error::ImageIo(format!("buffer does not match shape {}", image.shape()));
    let samples = image.samples();

    let dynamic = if image.depth() == BitDepth::U8 {
        #[allow(clippy::cast_possible_truncation)]
        let bytes: Vec<u8> = samples.iter().map(|&s| s as u8).collect();
        if image.channels() == 1 {
            DynamicImage::ImageLuma8(
                ImageBuffer::<Luma<u8>, _>::from_raw(width, height, bytes).ok_or_else(mismatch)?,
            )
        } else {
            DynamicImage::ImageRgb8(
                ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, bytes).ok_or_else(mismatch)?,
            )
        }
    } else if image.channels() == 1 {
        DynamicImage::ImageLuma16(
            ImageBuffer::<Luma<u16>, _>::from_raw(width, height, samples.to_vec())
                .ok_or_else(mismatch)?,
        )
    } else {
        DynamicImage::ImageRgb16(
            ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, samples.to_vec())
                .ok_or_else(mismatch)?,
        )
    };
    Ok(dynamic)
}

/// Save `image`, creating parent directories. The format follows the
/// extension.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written and
/// [`Error::ImageIo`] if encoding fails (e.g. 16-bit JPEG).
pub fn save(image: &Image, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path).map_err(|e| io_error(path, e))?;
    let mut encoded = Cursor::new(Vec::new());
    to_dynamic(image)?
        .write_to(&mut encoded, format)
        .map_err(|e| io_error(path, e))?;
    write_atomic(path, encoded.get_ref())?;
    tracing::debug!(path = %path.display(), identity = image.identity(), "image saved");
    Ok(())
}

/// Write `bytes` to `path` through a temporary file in the same directory,
/// creating the directory first. Readers see the old file or the new one,
/// never a partial write.
///
/// # Errors
///
/// Returns [`Error::Io`] on any filesystem failure.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_round_trip_8bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.png");
        let original = Image::gradient(16, 8, BitDepth::U8).unwrap();
        save(&original, &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.samples(), original.samples());
        assert_eq!(loaded.depth(), BitDepth::U8);
        assert!(loaded.identity().starts_with("file:"));
        assert_eq!(loaded.stem(), "g");
    }

    #[test]
    fn test_png_round_trip_14bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/h.png");
        let original = Image::hot_spots(12, 10, BitDepth::U14).unwrap();
        save(&original, &path).unwrap();

        assert_eq!(load(&path).unwrap().depth(), BitDepth::U16);
        let loaded = load_with_depth(&path, BitDepth::U14).unwrap();
        assert_eq!(loaded.samples(), original.samples());
    }

    #[test]
    fn test_narrow_container_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.png");
        save(&Image::gradient(4, 4, BitDepth::U8).unwrap(), &path).unwrap();
        assert!(matches!(
            load_with_depth(&path, BitDepth::U12),
            Err(Error::ImageIo(_))
        ));
    }

    #[test]
    fn test_wide_container_not_narrowed_to_8bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.png");
        save(&Image::hot_spots(8, 8, BitDepth::U12).unwrap(), &path).unwrap();
        assert!(matches!(
            load_with_depth(&path, BitDepth::U8),
            Err(Error::ImageIo(_))
        ));
        assert_eq!(load_with_depth(&path, BitDepth::U16).unwrap().depth(), BitDepth::U16);

        let narrow = dir.path().join("g.png");
        save(&Image::gradient(4, 4, BitDepth::U8).unwrap(), &narrow).unwrap();
        assert_eq!(load_with_depth(&narrow, BitDepth::U8).unwrap().depth(), BitDepth::U8);
    }

    #[test]
    fn test_save_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/g.png");
        save(&Image::gradient(8, 8, BitDepth::U8).unwrap(), &path).unwrap();
        save(&Image::gradient(8, 8, BitDepth::U8).unwrap(), &path).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["g.png"]);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            save(&Image::gradient(4, 4, BitDepth::U8).unwrap(), dir.path().join("g.xyz")),
            Err(Error::ImageIo(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(load("/nonexistent/x.png"), Err(Error::ImageIo(_))));
    }
}
