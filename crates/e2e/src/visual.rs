//! Screenshots: redaction, hashing and CI step frames

use std::path::{Path, PathBuf};

use chrono::Utc;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::driver::Rect;
use crate::error::E2eResult;
use crate::locator::Locator;
use crate::primitives::Session;

/// Elements carrying this attribute are blacked out in saved screenshots.
pub const SENSITIVE_SELECTOR: &str = "[data-sensitive]";

const MAX_NAME_LEN: usize = 100;

/// A screenshot written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    pub path: PathBuf,
    pub sha256: String,
    pub redacted_regions: usize,
}

/// Black out `regions` of a PNG screenshot.
pub fn redact(png: &[u8], regions: &[Rect]) -> E2eResult<RgbaImage> {
    let mut img = image::load_from_memory(png)?.to_rgba8();
    let (width, height) = img.dimensions();
    for region in regions {
        let x0 = region.x.max(0.0).floor() as u32;
        let y0 = region.y.max(0.0).floor() as u32;
        let x1 = ((region.x + region.width).ceil().max(0.0) as u32).min(width);
        let y1 = ((region.y + region.height).ceil().max(0.0) as u32).min(height);
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
    }
    Ok(img)
}

/// Hash bytes using SHA256
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// File-system safe name for a screenshot, capped in length.
pub fn screenshot_name(title: &str) -> String {
    let mut name: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    name.truncate(MAX_NAME_LEN);
    name
}

/// Take a screenshot with sensitive regions redacted and save it as
/// `<dir>/<name>.png`.
pub async fn capture_redacted(
    session: &mut Session,
    dir: &Path,
    name: &str,
) -> E2eResult<ScreenshotArtifact> {
    let regions = session.regions_of(&Locator::css(SENSITIVE_SELECTOR)).await?;
    let png = session.screenshot_png().await?;
    let img = redact(&png, &regions)?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.png", screenshot_name(name)));
    img.save(&path)?;
    let sha256 = hash_bytes(&std::fs::read(&path)?);

    info!(path = %path.display(), redacted = regions.len(), "Screenshot saved");
    Ok(ScreenshotArtifact {
        path,
        sha256,
        redacted_regions: regions.len(),
    })
}

/// Name for a failure screenshot: `FAILED_<title>_<millis>`.
pub fn failure_screenshot_name(title: &str) -> String {
    format!("FAILED_{}_{}", title, Utc::now().timestamp_millis())
}

/// Sequence of per-step frames, written while a scenario runs in CI mode.
#[derive(Debug)]
pub struct FrameRecorder {
    dir: PathBuf,
    index: usize,
}

impl FrameRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> E2eResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, index: 0 })
    }

    /// Write one frame as `<dir>/<index>-<action>.png`.
    pub fn record(&mut self, png: &[u8], action: &str) -> E2eResult<PathBuf> {
        self.index += 1;
        let path = self
            .dir
            .join(format!("{:04}-{}.png", self.index, screenshot_name(action)));
        std::fs::write(&path, png)?;
        debug!(frame = self.index, path = %path.display(), "Frame recorded");
        Ok(path)
    }

    pub fn frames(&self) -> usize {
        self.index
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ColorType, ImageEncoder};

    fn white_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(img.as_raw(), width, height, ColorType::Rgba8)
            .unwrap();
        png
    }

    #[test]
    fn redaction_blacks_out_regions_only() {
        let png = white_png(40, 20);
        let img = redact(
            &png,
            &[Rect { x: 5.0, y: 5.0, width: 10.0, height: 5.0 }],
        )
        .unwrap();
        assert_eq!(img.get_pixel(10, 7), &Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(30, 15), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn redaction_clamps_to_image() {
        let png = white_png(10, 10);
        let img = redact(
            &png,
            &[Rect { x: 5.0, y: -3.0, width: 100.0, height: 100.0 }],
        )
        .unwrap();
        assert_eq!(img.get_pixel(9, 9), &Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn names_are_sanitized_and_capped() {
        assert_eq!(screenshot_name("login: ok/1"), "login__ok_1");
        assert_eq!(screenshot_name(&"x".repeat(300)).len(), 100);
    }

    #[test]
    fn frames_are_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = FrameRecorder::new(dir.path().join("frames")).unwrap();
        let first = recorder.record(b"png", "click login-button").unwrap();
        let second = recorder.record(b"png", "visit").unwrap();
        assert!(first.ends_with("0001-click_login_button.png"));
        assert!(second.ends_with("0002-visit.png"));
        assert_eq!(recorder.frames(), 2);
    }
}
