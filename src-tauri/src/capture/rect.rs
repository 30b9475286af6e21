use serde::{Deserialize, Serialize};

/// Height of the toolbar row when the frontend has not reported a measured
/// value (e.g. before the first layout pass, or when wrapping state is
/// unknown).
pub const CHROME_HEIGHT_FALLBACK: f64 = 64.0;

/// Fixed insets subtracted from each edge of the window so the sampled
/// region never includes the resize border.
pub const DEFAULT_BORDER_INSETS: BorderInsets = BorderInsets {
    left: 2.0,
    top: 2.0,
    right: 2.0,
    bottom: 2.0,
};

/// Screen-space rectangle sampled on each tick, excluding window chrome and
/// borders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRegion {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CaptureRegion {
    /// Anything below 1px in either dimension is a no-op for the tick.
    pub fn is_capturable(&self) -> bool {
        self.width >= 1.0 && self.height >= 1.0
    }
}

/// Outer bounds of the host window in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct BorderInsets {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// Result of one [`RectTracker::recompute`] call: the fresh region plus the
/// rigid translation of its top-left since the previous tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectUpdate {
    pub region: CaptureRegion,
    pub dx: f64,
    pub dy: f64,
}

/// Supplies window geometry to the scheduler. The host wires in a
/// window-manager-backed implementation; tests use a fixed one.
pub trait WindowGeometry: Send + Sync {
    /// Outer bounds of the tracked window, or `None` when there is no valid
    /// window to sample (the tick is skipped).
    fn window_bounds(&self) -> Option<WindowBounds>;

    /// Measured chrome height for the current toolbar wrapping, if the
    /// frontend has reported one.
    fn chrome_height(&self) -> Option<f64>;
}

/// Computes the capture region from window geometry and detects
/// frame-to-frame positional drift.
///
/// The tracker only reports the delta; the caller applies it to text-object
/// positions. That keeps overlays glued to the underlying window during a
/// drag or resize without re-running OCR.
pub struct RectTracker {
    insets: BorderInsets,
    previous: Option<CaptureRegion>,
}

impl RectTracker {
    pub fn new(insets: BorderInsets) -> Self {
        Self {
            insets,
            previous: None,
        }
    }

    pub fn recompute(
        &mut self,
        bounds: WindowBounds,
        chrome_height: Option<f64>,
        has_text_objects: bool,
    ) -> RectUpdate {
        let chrome = chrome_height.unwrap_or(CHROME_HEIGHT_FALLBACK);

        let region = CaptureRegion {
            left: bounds.x + self.insets.left,
            top: bounds.y + chrome + self.insets.top,
            width: (bounds.width - self.insets.left - self.insets.right).max(0.0),
            height: (bounds.height - chrome - self.insets.top - self.insets.bottom).max(0.0),
        };

        let (dx, dy) = match self.previous {
            // A delta only matters when there are placed overlays to move.
            Some(prev) if has_text_objects => (region.left - prev.left, region.top - prev.top),
            _ => (0.0, 0.0),
        };

        self.previous = Some(region);

        RectUpdate { region, dx, dy }
    }

    /// Forget the previous region so the next recompute reports no drift.
    /// Called after an overlay clear, where stale deltas would move nothing.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// The most recently computed region, if any tick has run yet.
    pub fn current(&self) -> Option<CaptureRegion> {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(x: f64, y: f64) -> WindowBounds {
        WindowBounds {
            x,
            y,
            width: 800.0,
            height: 600.0,
        }
    }

    #[test]
    fn region_excludes_chrome_and_insets() {
        let mut tracker = RectTracker::new(DEFAULT_BORDER_INSETS);
        let update = tracker.recompute(bounds(100.0, 200.0), Some(50.0), false);

        assert_eq!(update.region.left, 102.0);
        assert_eq!(update.region.top, 252.0);
        assert_eq!(update.region.width, 796.0);
        assert_eq!(update.region.height, 544.0);
    }

    #[test]
    fn falls_back_to_static_chrome_height() {
        let mut tracker = RectTracker::new(DEFAULT_BORDER_INSETS);
        let update = tracker.recompute(bounds(0.0, 0.0), None, false);

        assert_eq!(update.region.top, CHROME_HEIGHT_FALLBACK + 2.0);
    }

    #[test]
    fn reports_drift_when_text_objects_exist() {
        let mut tracker = RectTracker::new(DEFAULT_BORDER_INSETS);
        tracker.recompute(bounds(100.0, 200.0), Some(50.0), true);
        let update = tracker.recompute(bounds(130.0, 180.0), Some(50.0), true);

        assert_eq!(update.dx, 30.0);
        assert_eq!(update.dy, -20.0);
    }

    #[test]
    fn suppresses_drift_without_text_objects() {
        let mut tracker = RectTracker::new(DEFAULT_BORDER_INSETS);
        tracker.recompute(bounds(100.0, 200.0), Some(50.0), true);
        let update = tracker.recompute(bounds(130.0, 180.0), Some(50.0), false);

        assert_eq!((update.dx, update.dy), (0.0, 0.0));
    }

    #[test]
    fn first_recompute_reports_no_drift() {
        let mut tracker = RectTracker::new(DEFAULT_BORDER_INSETS);
        let update = tracker.recompute(bounds(100.0, 200.0), Some(50.0), true);

        assert_eq!((update.dx, update.dy), (0.0, 0.0));
    }

    #[test]
    fn reset_forgets_previous_region() {
        let mut tracker = RectTracker::new(DEFAULT_BORDER_INSETS);
        tracker.recompute(bounds(100.0, 200.0), Some(50.0), true);
        tracker.reset();
        let update = tracker.recompute(bounds(500.0, 500.0), Some(50.0), true);

        assert_eq!((update.dx, update.dy), (0.0, 0.0));
    }

    #[test]
    fn degenerate_window_clamps_to_zero() {
        let mut tracker = RectTracker::new(DEFAULT_BORDER_INSETS);
        let update = tracker.recompute(
            WindowBounds {
                x: 0.0,
                y: 0.0,
                width: 3.0,
                height: 10.0,
            },
            Some(50.0),
            false,
        );

        assert_eq!(update.region.height, 0.0);
        assert!(!update.region.is_capturable());
    }
}
