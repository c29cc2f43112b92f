//! Runtime for executing conversation turns
//!
//! Loads a session, drives the state machine through one turn while
//! executing the effects it requests, and persists the result.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{
    ConversationRuntime, RuntimeError, RuntimeSettings, TurnReply,
};
pub use traits::*;

use crate::knowledge::CatalogKnowledge;
use std::sync::Arc;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime =
    ConversationRuntime<DatabaseStorage, CatalogKnowledge, Arc<dyn DeliveryGateway>>;
