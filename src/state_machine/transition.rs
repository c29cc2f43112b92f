//! Pure state transition function
//!
//! Given the same session, policy and event, `transition` always produces the
//! same result. Lookups, passcode storage and mail delivery are requested as
//! `Effect`s; their results come back as events.

use super::event::LookupOutcome;
use super::{Effect, Event, Policy, Session, Stage};
use crate::extract::{extract_code, find_email};
use thiserror::Error;

pub const EMAIL_PROMPT: &str =
    "If you'd like more details e-mailed to you, please share your e-mail address.";
pub const NOT_A_MONUMENT: &str = "I'm sorry, I can only answer questions about historical \
     monuments. Try asking about a landmark such as the Colosseum or the Taj Mahal.";
pub const LOOKUP_FAILED: &str =
    "Sorry, I couldn't look that up right now. Please try again in a moment.";
pub const ENTER_CODE: &str = "Please enter the 6-digit code that was e-mailed to you.";
pub const INCORRECT_CODE: &str = "That code is incorrect. Please try again.";
pub const VERIFICATION_FAILED: &str = "Too many incorrect attempts or the code expired. \
     E-mail verification failed; ask your question again and resend your e-mail address.";
pub const VERIFIED: &str = "Thank you! Your e-mail is verified. I will send more details shortly.";
pub const CANCELLED: &str = "Email verification cancelled. How else can I help?";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_session: Session,
    /// User-visible reply produced by this step, if any
    pub reply: Option<String>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            new_session: session,
            reply: None,
            effects: vec![],
        }
    }

    /// Set the reply and record it in history
    pub fn with_reply(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.new_session.push_assistant(text.clone());
        self.reply = Some(text);
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Empty input")]
    EmptyInput,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl TransitionError {
    /// Text shown to the user when a turn cannot be processed
    pub fn user_message(&self) -> &'static str {
        match self {
            TransitionError::EmptyInput => "Please type a question about a historical monument.",
            TransitionError::InvalidTransition(_) => {
                "Sorry, something went wrong on my side. Please try again."
            }
        }
    }
}

/// Pure transition function
pub fn transition(
    session: &Session,
    policy: &Policy,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (session.stage, event) {
        // ============================================================
        // User input
        // ============================================================
        (_, Event::UserInput { text }) if text.trim().is_empty() => Err(TransitionError::EmptyInput),

        (Stage::Idle, Event::UserInput { text }) => {
            let mut next = session.clone();
            next.push_user(&text);

            if policy.accept_unsolicited_email && next.pending_query.is_some() {
                if let Some(email) = find_email(&text) {
                    let email = email.to_string();
                    return Ok(request_code(next, email));
                }
            }

            Ok(fresh_query(next, text))
        }

        (Stage::AwaitingEmail, Event::UserInput { text }) => {
            let mut next = session.clone();
            next.push_user(&text);

            match find_email(&text) {
                Some(email) => {
                    let email = email.to_string();
                    Ok(request_code(next, email))
                }
                // Single re-entry into the idle branch: the input is a new question
                None => Ok(fresh_query(next, text)),
            }
        }

        (Stage::AwaitingOtp, Event::UserInput { text }) => {
            let mut next = session.clone();
            next.push_user(&text);

            let Some(code) = extract_code(&text, policy.code_digits).map(str::to_string) else {
                return Ok(TransitionResult::new(next).with_reply(ENTER_CODE));
            };

            match next.verified_email.clone() {
                Some(email) => Ok(TransitionResult::new(next).with_effect(Effect::CheckCode {
                    email,
                    submitted: code,
                })),
                // No address to verify against: fail closed
                None => Ok(reset_after_failure(next, None).with_reply(VERIFICATION_FAILED)),
            }
        }

        // ============================================================
        // Knowledge lookup
        // ============================================================
        (Stage::Idle, Event::LookupCompleted { query, outcome }) => {
            let mut next = session.clone();
            match outcome {
                LookupOutcome::Answered { answer, .. } => {
                    next.stage = Stage::AwaitingEmail;
                    next.pending_query = Some(query);
                    next.verified_email = None;
                    next.otp_attempts = 0;
                    Ok(TransitionResult::new(next).with_reply(format!("{answer}\n\n{EMAIL_PROMPT}")))
                }
                LookupOutcome::NoMatch => {
                    next.pending_query = None;
                    Ok(TransitionResult::new(next).with_reply(NOT_A_MONUMENT))
                }
                LookupOutcome::Failed { .. } => {
                    Ok(TransitionResult::new(next).with_reply(LOOKUP_FAILED))
                }
            }
        }

        // ============================================================
        // Passcode issue
        // ============================================================
        (Stage::AwaitingEmail, Event::CodeIssued { email, delivered })
            if session.verified_email.as_deref() == Some(email.as_str()) =>
        {
            let mut next = session.clone();
            if delivered {
                next.stage = Stage::AwaitingOtp;
                next.otp_attempts = 0;
                Ok(TransitionResult::new(next).with_reply(format!(
                    "Thank you. A 6-digit code has been sent to {email}. Please enter it here \
                     to verify your e-mail and receive more details."
                )))
            } else {
                next.verified_email = None;
                Ok(TransitionResult::new(next).with_reply(format!(
                    "Sorry, I couldn't send the code to {email}. Please check the address \
                     or provide a different one."
                )))
            }
        }

        // ============================================================
        // Passcode check
        // ============================================================
        (Stage::AwaitingOtp, Event::CodeChecked { submitted, stored }) => {
            let mut next = session.clone();

            if stored.as_deref() == Some(submitted.as_str()) {
                let email = next.verified_email.take();
                let query = next.pending_query.take();
                next.stage = Stage::Idle;
                next.otp_attempts = 0;

                let mut effects = Vec::new();
                if let Some(email) = email {
                    effects.push(Effect::consume_code(email.clone()));
                    if let Some(query) = query {
                        effects.push(Effect::DeliverGuide { email, query });
                    }
                }
                return Ok(TransitionResult::new(next)
                    .with_reply(VERIFIED)
                    .with_effects(effects));
            }

            next.otp_attempts += 1;
            if next.otp_attempts >= policy.max_attempts || stored.is_none() {
                let had_code = stored.is_some();
                let email = next.verified_email.clone();
                let consume = email.filter(|_| had_code).map(Effect::consume_code);
                return Ok(reset_after_failure(next, consume).with_reply(VERIFICATION_FAILED));
            }

            Ok(TransitionResult::new(next).with_reply(INCORRECT_CODE))
        }

        // ============================================================
        // Guide delivery
        // ============================================================
        (Stage::Idle, Event::GuideDelivered { email, delivered }) => {
            let next = session.clone();
            if delivered {
                return Ok(TransitionResult::new(next));
            }
            Ok(TransitionResult::new(next).with_reply(format!(
                "Your e-mail is verified, but I couldn't send the detailed guide to {email} \
                 right now. Please ask your question again later."
            )))
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (_, Event::Cancel) => {
            let mut next = session.clone();
            let email = next.verified_email.take();
            next.stage = Stage::Idle;
            next.otp_attempts = 0;
            next.pending_query = None;

            let consume = email.map(Effect::consume_code);
            Ok(TransitionResult::new(next)
                .with_reply(CANCELLED)
                .with_effects(consume))
        }

        // ============================================================
        // Invalid transitions
        // ============================================================
        (stage, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {stage} with event {event:?}"
        ))),
    }
}

/// Idle-branch handling of a question: reset verification flags and look it up
fn fresh_query(mut next: Session, text: String) -> TransitionResult {
    next.stage = Stage::Idle;
    next.verified_email = None;
    next.otp_attempts = 0;
    TransitionResult::new(next).with_effect(Effect::lookup(text))
}

/// Hold the candidate address and ask the runtime to send a code
fn request_code(mut next: Session, email: String) -> TransitionResult {
    next.stage = Stage::AwaitingEmail;
    next.verified_email = Some(email.clone());
    next.otp_attempts = 0;
    TransitionResult::new(next).with_effect(Effect::issue_code(email))
}

/// Fail closed: back to idle, the user has to start the e-mail step again
fn reset_after_failure(mut next: Session, consume: Option<Effect>) -> TransitionResult {
    next.stage = Stage::Idle;
    next.verified_email = None;
    next.otp_attempts = 0;
    TransitionResult::new(next).with_effects(consume)
}
