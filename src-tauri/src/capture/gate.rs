use std::time::{Duration, Instant};

use log::debug;

/// Debounced admission flag deciding whether a scheduler tick may dispatch
/// to OCR.
///
/// The gate is single-shot from the scheduler's point of view: the tick
/// disables it right before dispatching, and something else (the delayed
/// post-cooldown callback, the snapshot trigger, a continuous-mode start)
/// must re-enable it. `arm_cooldown` opens a dead zone after an
/// overlay-clear so the very next tick cannot re-run OCR before the screen
/// has visually settled.
pub struct OcrGate {
    wanted: bool,
    reenable_at: Option<Instant>,
}

impl OcrGate {
    pub fn new() -> Self {
        Self {
            wanted: false,
            reenable_at: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.wanted
    }

    /// Request the gate on or off. Enabling is refused while the cooldown
    /// window is open; the refusal is silent to the caller apart from the
    /// returned flag and a trace line. Disabling always succeeds.
    pub fn request_enable(&mut self, wanted: bool) -> bool {
        self.request_enable_at(wanted, Instant::now())
    }

    pub(crate) fn request_enable_at(&mut self, wanted: bool, now: Instant) -> bool {
        if wanted {
            if let Some(at) = self.reenable_at {
                if now < at {
                    debug!("ocr gate enable refused, cooldown active");
                    return false;
                }
            }
            // The one enable that lands after the window clears it.
            self.reenable_at = None;
        }

        self.wanted = wanted;
        true
    }

    /// Force the gate off and refuse enables for `duration`.
    pub fn arm_cooldown(&mut self, duration: Duration) {
        self.arm_cooldown_at(duration, Instant::now());
    }

    pub(crate) fn arm_cooldown_at(&mut self, duration: Duration, now: Instant) {
        self.wanted = false;
        self.reenable_at = Some(now + duration);
    }

    /// Drop any pending cooldown without touching the flag. The snapshot
    /// trigger uses this: a snapshot is meant to be immediate.
    pub fn clear_cooldown(&mut self) {
        self.reenable_at = None;
    }
}

impl Default for OcrGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disabled_and_unrestricted() {
        let mut gate = OcrGate::new();
        assert!(!gate.is_enabled());
        assert!(gate.request_enable(true));
        assert!(gate.is_enabled());
    }

    #[test]
    fn enable_refused_during_cooldown() {
        let mut gate = OcrGate::new();
        let t0 = Instant::now();
        gate.request_enable_at(true, t0);
        gate.arm_cooldown_at(Duration::from_secs(2), t0);

        assert!(!gate.is_enabled());
        assert!(!gate.request_enable_at(true, t0 + Duration::from_secs(1)));
        assert!(!gate.is_enabled());
    }

    #[test]
    fn enable_succeeds_once_cooldown_elapses() {
        let mut gate = OcrGate::new();
        let t0 = Instant::now();
        gate.arm_cooldown_at(Duration::from_secs(2), t0);

        assert!(gate.request_enable_at(true, t0 + Duration::from_secs(2)));
        assert!(gate.is_enabled());
    }

    #[test]
    fn successful_enable_clears_the_window() {
        let mut gate = OcrGate::new();
        let t0 = Instant::now();
        gate.arm_cooldown_at(Duration::from_secs(2), t0);
        assert!(gate.request_enable_at(true, t0 + Duration::from_secs(3)));

        // A later disable/enable cycle is no longer restricted.
        assert!(gate.request_enable_at(false, t0 + Duration::from_secs(3)));
        assert!(gate.request_enable_at(true, t0 + Duration::from_secs(3)));
    }

    #[test]
    fn disable_always_succeeds() {
        let mut gate = OcrGate::new();
        let t0 = Instant::now();
        gate.request_enable_at(true, t0);
        gate.arm_cooldown_at(Duration::from_secs(60), t0);

        assert!(gate.request_enable_at(false, t0));
        assert!(!gate.is_enabled());
    }

    #[test]
    fn arm_cooldown_forces_gate_off() {
        let mut gate = OcrGate::new();
        let t0 = Instant::now();
        gate.request_enable_at(true, t0);
        gate.arm_cooldown_at(Duration::from_secs(2), t0);

        assert!(!gate.is_enabled());
    }

    #[test]
    fn clear_cooldown_permits_immediate_enable() {
        let mut gate = OcrGate::new();
        let t0 = Instant::now();
        gate.arm_cooldown_at(Duration::from_secs(60), t0);
        gate.clear_cooldown();

        assert!(gate.request_enable_at(true, t0));
        assert!(gate.is_enabled());
    }

    #[test]
    fn refused_enable_leaves_cooldown_intact() {
        let mut gate = OcrGate::new();
        let t0 = Instant::now();
        gate.arm_cooldown_at(Duration::from_secs(10), t0);

        assert!(!gate.request_enable_at(true, t0 + Duration::from_secs(5)));
        // Still refused later within the window.
        assert!(!gate.request_enable_at(true, t0 + Duration::from_secs(9)));
        // And granted after it.
        assert!(gate.request_enable_at(true, t0 + Duration::from_secs(10)));
    }
}
