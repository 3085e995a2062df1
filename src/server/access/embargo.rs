/// Result of evaluating an embargo window against an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbargoState {
    /// The embargo is in force
    Active,
    /// The window exists but does not cover `now`
    Inactive,
    /// No embargo is configured at all
    NotApplicable,
}

/// Evaluates an embargo window. The start bound is inclusive and the end
/// bound is exclusive: an embargo ends at its end instant, not after it.
/// A start bound alone means an indefinite embargo from that date.
pub fn embargo_state(start: Option<u64>, end: Option<u64>, now: u64) -> EmbargoState {
    match (start, end) {
        (None, None) => EmbargoState::NotApplicable,
        (Some(start), None) => {
            if now >= start {
                EmbargoState::Active
            } else {
                EmbargoState::Inactive
            }
        }
        (None, Some(end)) => {
            if now < end {
                EmbargoState::Active
            } else {
                EmbargoState::Inactive
            }
        }
        (Some(start), Some(end)) => {
            if start <= now && now < end {
                EmbargoState::Active
            } else {
                EmbargoState::Inactive
            }
        }
    }
}
