/// Runtime commands for the processing module, normally bound to hotkeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerCommand {
    /// Stops counting money deltas. The baseline keeps following the balance
    /// so shopping sprees don't show up as losses on resume.
    PauseTracking,
    ResumeTracking,
    ToggleOverlay,
    ShowWindow,
}
