use serde::{Deserialize, Serialize};

/// One-shot snapshot capture lifecycle.
///
/// `Idle → InProgress → Displayed → Idle`, with `InProgress → Idle` on
/// cancel or failure and `Displayed → Idle` on toggle-clear. Exactly one of
/// `InProgress`/`Displayed` holds at a time; `Idle` is neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotState {
    Idle,
    InProgress,
    Displayed,
}

impl Default for SnapshotState {
    fn default() -> Self {
        SnapshotState::Idle
    }
}

/// What a trigger press should do given the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDisposition {
    /// Start a fresh capture-and-dispatch cycle.
    Begin,
    /// Toggle mode: the same trigger acts as an off switch, cancelling
    /// outstanding work and wiping the overlay.
    Clear,
    /// Re-entrancy guard: a capture is already running.
    Ignore,
}

impl SnapshotState {
    pub fn on_trigger(self, toggle_mode: bool) -> TriggerDisposition {
        match self {
            SnapshotState::InProgress | SnapshotState::Displayed if toggle_mode => {
                TriggerDisposition::Clear
            }
            SnapshotState::InProgress => TriggerDisposition::Ignore,
            // Displayed without toggle mode starts over; Idle always starts.
            SnapshotState::Idle | SnapshotState::Displayed => TriggerDisposition::Begin,
        }
    }

    /// Apply a completion callback. Completions that arrive when no capture
    /// is in progress are stale (they raced a cancel) and change nothing.
    pub fn on_completion(self, success: bool) -> SnapshotState {
        match self {
            SnapshotState::InProgress if success => SnapshotState::Displayed,
            SnapshotState::InProgress => SnapshotState::Idle,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_mode_walk() {
        // trigger -> InProgress
        assert_eq!(
            SnapshotState::Idle.on_trigger(true),
            TriggerDisposition::Begin
        );
        // second trigger while InProgress -> clear back to Idle
        assert_eq!(
            SnapshotState::InProgress.on_trigger(true),
            TriggerDisposition::Clear
        );
        // success completion -> Displayed
        assert_eq!(
            SnapshotState::InProgress.on_completion(true),
            SnapshotState::Displayed
        );
        // second trigger while Displayed -> clear back to Idle
        assert_eq!(
            SnapshotState::Displayed.on_trigger(true),
            TriggerDisposition::Clear
        );
    }

    #[test]
    fn non_toggle_trigger_while_in_progress_is_ignored() {
        assert_eq!(
            SnapshotState::InProgress.on_trigger(false),
            TriggerDisposition::Ignore
        );
    }

    #[test]
    fn non_toggle_trigger_while_displayed_starts_over() {
        assert_eq!(
            SnapshotState::Displayed.on_trigger(false),
            TriggerDisposition::Begin
        );
    }

    #[test]
    fn failure_completion_returns_to_idle() {
        assert_eq!(
            SnapshotState::InProgress.on_completion(false),
            SnapshotState::Idle
        );
    }

    #[test]
    fn stale_completion_is_ignored() {
        assert_eq!(
            SnapshotState::Idle.on_completion(true),
            SnapshotState::Idle
        );
        assert_eq!(
            SnapshotState::Displayed.on_completion(false),
            SnapshotState::Displayed
        );
    }
}
