//! Events that can occur during a turn

use crate::knowledge::Monument;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserInput {
        text: String,
    },
    /// Abandon the verification flow
    Cancel,

    // Effect results
    LookupCompleted {
        query: String,
        outcome: LookupOutcome,
    },
    CodeIssued {
        email: String,
        delivered: bool,
    },
    CodeChecked {
        submitted: String,
        /// Code currently stored for the address; `None` when absent or expired
        stored: Option<String>,
    },
    GuideDelivered {
        email: String,
        delivered: bool,
    },
}

/// Result of a knowledge lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Answered {
        answer: String,
        matches: Vec<Monument>,
    },
    /// Search returned nothing: not a monument question
    NoMatch,
    /// Gateway error or timeout
    Failed {
        message: String,
    },
}
