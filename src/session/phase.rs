//! Controller phase

use serde::Serialize;

/// Position of the controller in the capture → reply → playback cycle
///
/// Exactly one phase is current at any time. Each phase owns at most one live
/// asynchronous resource: a capture session while `Listening`, a reply
/// request while `AwaitingReply`, a playback while `Speaking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing live; a delayed resume may be pending
    #[default]
    Idle,
    /// Capture session running
    Listening,
    /// Reply request in flight
    AwaitingReply,
    /// Reply audio playing
    Speaking,
    /// Reply request failed; waiting to resume capture
    Erroring,
}

impl Phase {
    /// Short status label for display
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Listening => "Listening...",
            Self::AwaitingReply => "Processing...",
            Self::Speaking => "Speaking",
            Self::Erroring => "Error",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
