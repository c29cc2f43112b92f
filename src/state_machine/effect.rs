//! Effects produced by state transitions

/// Effects to be executed by the runtime after a transition.
/// Each result-producing effect answers with exactly one `Event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Search the knowledge gateway and compose a brief answer
    LookupKnowledge { query: String },

    /// Generate, store and e-mail a passcode
    IssueCode { email: String },

    /// Read the stored passcode for comparison
    CheckCode { email: String, submitted: String },

    /// Drop the stored passcode (no result event)
    ConsumeCode { email: String },

    /// E-mail the expanded answer for `query`
    DeliverGuide { email: String, query: String },
}

impl Effect {
    pub fn lookup(query: impl Into<String>) -> Self {
        Effect::LookupKnowledge {
            query: query.into(),
        }
    }

    pub fn issue_code(email: impl Into<String>) -> Self {
        Effect::IssueCode {
            email: email.into(),
        }
    }

    pub fn consume_code(email: impl Into<String>) -> Self {
        Effect::ConsumeCode {
            email: email.into(),
        }
    }

    /// Whether this effect sends mail to the user
    pub fn is_delivery(&self) -> bool {
        matches!(self, Effect::IssueCode { .. } | Effect::DeliverGuide { .. })
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Effect::LookupKnowledge { .. } => "lookup_knowledge",
            Effect::IssueCode { .. } => "issue_code",
            Effect::CheckCode { .. } => "check_code",
            Effect::ConsumeCode { .. } => "consume_code",
            Effect::DeliverGuide { .. } => "deliver_guide",
        }
    }
}
