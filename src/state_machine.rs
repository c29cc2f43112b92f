//! Conversation state machine
//!
//! Elm-style pure transitions: the runtime feeds events in and executes the
//! effects that come out.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Event, LookupOutcome};
pub use state::{Policy, Session, Stage};
pub use transition::{transition, TransitionError, TransitionResult};
