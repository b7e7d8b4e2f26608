//! Pure state transition table for the scan pipeline.

use crate::types::AppState;

/// What happened, stripped of payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A capture handle was emitted
    Captured,
    /// The confidence gate accepted the top prediction
    Accepted,
    /// Decode, classification, or the gate failed
    Failed,
    /// Enrichment returned (real or fallback content)
    Enriched,
    /// User dismissed the result
    Reset,
    /// User chose "try again" on the error screen
    TryAgain,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Captured,
        EventKind::Accepted,
        EventKind::Failed,
        EventKind::Enriched,
        EventKind::Reset,
        EventKind::TryAgain,
    ];
}

/// Next state for `event` in `from`, or `None` if the event is ignored there.
pub fn transition(from: AppState, event: EventKind) -> Option<AppState> {
    use AppState::*;
    use EventKind::*;

    match (from, event) {
        (Home, Captured) => Some(AnalyzingImage),
        (AnalyzingImage, Accepted) => Some(FetchingInfo),
        (AnalyzingImage, Failed) => Some(Error),
        (FetchingInfo, Enriched) => Some(Result),
        (Result, Reset) => Some(Home),
        (Error, TryAgain) => Some(Home),
        _ => None,
    }
}
