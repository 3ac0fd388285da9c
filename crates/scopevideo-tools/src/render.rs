use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use image::{ImageFormat, RgbaImage};
use scopevideo::Frame;

/// File name for the `index`-th decoded frame.
pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{:05}.png", index))
}

/// Write a frame as an RGBA PNG.
pub fn save_png(frame: &Frame, path: &Path) -> Result<()> {
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_path_is_zero_padded() {
        assert_eq!(
            frame_path(Path::new("out"), 7),
            Path::new("out").join("frame_00007.png")
        );
    }
}
