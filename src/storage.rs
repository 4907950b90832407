// SPDX-License-Identifier: GPL-3.0-only

//! Loading and saving still images off the async runtime

use crate::errors::StorageError;
use chrono::Local;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default folder name for filtered images
const DEFAULT_SAVE_FOLDER: &str = "framefx";

/// Decode `path` to RGBA on a blocking thread
pub async fn load_image(path: PathBuf) -> Result<RgbaImage, StorageError> {
    let bytes = tokio::fs::read(&path).await?;
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??;
    debug!(path = %path.display(), width = image.width(), height = image.height(), "Loaded image");
    Ok(image.to_rgba8())
}

/// Encode `image` to `path`, creating parent directories.
///
/// The format follows the extension.
pub async fn save_image(image: RgbaImage, path: PathBuf) -> Result<PathBuf, StorageError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let path = tokio::task::spawn_blocking(move || image.save(&path).map(|()| path)).await??;
    debug!(path = %path.display(), "Saved image");
    Ok(path)
}

/// Pictures directory, falling back to home and then the working directory
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

/// `<dir>/<stem>_<filter>_<timestamp>.png`
pub fn default_output_path(dir: &Path, input: &Path, filter_name: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{}_{}_{}.png", stem, filter_name, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_default_output_path_shape() {
        let path = default_output_path(Path::new("/tmp/out"), Path::new("/a/cat.jpg"), "Noir");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("cat_Noir_"));
        assert!(name.ends_with(".png"));
        assert_eq!(path.parent(), Some(Path::new("/tmp/out")));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("px.png");
        let image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));

        let saved = save_image(image.clone(), path.clone()).await.unwrap();
        assert_eq!(saved, path);
        assert_eq!(load_image(path).await.unwrap(), image);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(dir.path().join("nope.png")).await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
