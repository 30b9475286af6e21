use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::{ImageFormat, RgbaImage};
use xcap::Monitor;

use super::rect::CaptureRegion;

/// Raw pixels sampled for one tick, plus the screen-space region they came
/// from. Short-lived: captured immediately before use and dropped at the
/// end of the capture-and-dispatch sequence.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: RgbaImage,
    pub region: CaptureRegion,
}

impl Frame {
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("failed to encode frame as PNG")?;
        Ok(bytes)
    }
}

/// Pixel-acquisition seam. The scheduler only sees this trait; the default
/// implementation goes through the compositor, tests substitute a canned
/// one.
pub trait ScreenCapturer: Send + Sync {
    fn capture(&self, region: &CaptureRegion) -> Result<Frame>;
}

/// Captures the monitor under the region's top-left and crops to the
/// region.
pub struct MonitorCapturer;

impl ScreenCapturer for MonitorCapturer {
    fn capture(&self, region: &CaptureRegion) -> Result<Frame> {
        if !region.is_capturable() {
            bail!("capture region below 1px: {:?}", region);
        }

        let monitor = Monitor::from_point(region.left as i32, region.top as i32)
            .context("no monitor under capture region")?;
        let image = monitor
            .capture_image()
            .context("monitor capture failed")?;

        let monitor_x = monitor.x()? as f64;
        let monitor_y = monitor.y()? as f64;

        // Region is in screen coordinates; the captured image is
        // monitor-local.
        let crop_x = (region.left - monitor_x).max(0.0) as u32;
        let crop_y = (region.top - monitor_y).max(0.0) as u32;
        let crop_w = (region.width as u32).min(image.width().saturating_sub(crop_x));
        let crop_h = (region.height as u32).min(image.height().saturating_sub(crop_y));

        if crop_w < 1 || crop_h < 1 {
            bail!("capture region lies outside the monitor");
        }

        let pixels = image::imageops::crop_imm(&image, crop_x, crop_y, crop_w, crop_h).to_image();

        Ok(Frame {
            pixels,
            region: *region,
        })
    }
}

/// Persist a debug copy of a captured frame, returning the written path.
pub fn save_debug_frame(frame: &Frame, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create debug frame dir {}", dir.display()))?;

    let name = format!("frame-{}.png", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f"));
    let path = dir.join(name);
    let bytes = frame.encode_png()?;
    std::fs::write(&path, bytes)
        .with_context(|| format!("failed to write debug frame to {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_png_produces_a_png_header() {
        let frame = Frame {
            pixels: RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255])),
            region: CaptureRegion {
                left: 0.0,
                top: 0.0,
                width: 4.0,
                height: 4.0,
            },
        };

        let bytes = frame.encode_png().unwrap();
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }

    #[test]
    fn capturer_rejects_sub_pixel_regions() {
        let region = CaptureRegion {
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 100.0,
        };
        assert!(MonitorCapturer.capture(&region).is_err());
    }
}
