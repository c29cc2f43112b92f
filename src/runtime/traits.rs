//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::delivery::{code_email_body, DeliveryError, CODE_SUBJECT};
use crate::knowledge::{AnswerDetail, KnowledgeError, Monument};
use crate::state_machine::Session;
use async_trait::async_trait;
use std::time::Duration;

/// Storage for conversation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session; `None` when absent or unreadable
    async fn load_session(&self, id: &str) -> Result<Option<Session>, String>;

    /// Insert or replace a session
    async fn save_session(&self, session: &Session) -> Result<(), String>;
}

/// Short-lived passcodes keyed by e-mail address.
///
/// Expiry is passive: `peek` simply stops returning a code once its
/// lifetime has elapsed.
#[async_trait]
pub trait PasscodeStore: Send + Sync {
    /// Store `code` for `email`, replacing any previous code
    async fn issue_code(&self, email: &str, code: &str, ttl: Duration) -> Result<(), String>;

    /// Current unexpired code, without consuming it
    async fn peek_code(&self, email: &str) -> Result<Option<String>, String>;

    /// Remove the code for `email`; a missing code is not an error
    async fn consume_code(&self, email: &str) -> Result<(), String>;
}

/// Monument search and answer composition
#[async_trait]
pub trait KnowledgeGateway: Send + Sync {
    /// Up to `k` relevant records, best first; empty means "not a monument question"
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Monument>, KnowledgeError>;

    async fn answer(
        &self,
        query: &str,
        matches: &[Monument],
        detail: AnswerDetail,
    ) -> Result<String, KnowledgeError>;
}

/// Outbound e-mail
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn send_text(&self, address: &str, subject: &str, body: &str)
        -> Result<(), DeliveryError>;

    /// Send a passcode message
    async fn send_code(&self, address: &str, code: &str) -> Result<(), DeliveryError> {
        self.send_text(address, CODE_SUBJECT, &code_email_body(code))
            .await
    }
}

/// Combined storage trait for convenience
pub trait Storage: SessionStore + PasscodeStore {}
impl<T: SessionStore + PasscodeStore> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn load_session(&self, id: &str) -> Result<Option<Session>, String> {
        (**self).load_session(id).await
    }

    async fn save_session(&self, session: &Session) -> Result<(), String> {
        (**self).save_session(session).await
    }
}

#[async_trait]
impl<T: PasscodeStore + ?Sized> PasscodeStore for Arc<T> {
    async fn issue_code(&self, email: &str, code: &str, ttl: Duration) -> Result<(), String> {
        (**self).issue_code(email, code, ttl).await
    }

    async fn peek_code(&self, email: &str) -> Result<Option<String>, String> {
        (**self).peek_code(email).await
    }

    async fn consume_code(&self, email: &str) -> Result<(), String> {
        (**self).consume_code(email).await
    }
}

#[async_trait]
impl<T: KnowledgeGateway + ?Sized> KnowledgeGateway for Arc<T> {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Monument>, KnowledgeError> {
        (**self).search(query, k).await
    }

    async fn answer(
        &self,
        query: &str,
        matches: &[Monument],
        detail: AnswerDetail,
    ) -> Result<String, KnowledgeError> {
        (**self).answer(query, matches, detail).await
    }
}

#[async_trait]
impl<T: DeliveryGateway + ?Sized> DeliveryGateway for Arc<T> {
    async fn send_text(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        (**self).send_text(address, subject, body).await
    }

    async fn send_code(&self, address: &str, code: &str) -> Result<(), DeliveryError> {
        (**self).send_code(address, code).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::db::Database;
use crate::passcode::{expires_at, Clock, SystemClock};
use std::sync::Arc;

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn load_session(&self, id: &str) -> Result<Option<Session>, String> {
        self.db.load_session(id).map_err(|e| e.to_string())
    }

    async fn save_session(&self, session: &Session) -> Result<(), String> {
        self.db
            .save_session(session, self.clock.now())
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl PasscodeStore for DatabaseStorage {
    async fn issue_code(&self, email: &str, code: &str, ttl: Duration) -> Result<(), String> {
        let expiry = expires_at(self.clock.now(), ttl)
            .ok_or_else(|| format!("Passcode lifetime out of range: {ttl:?}"))?;
        self.db
            .put_passcode(email, code, expiry)
            .map_err(|e| e.to_string())
    }

    async fn peek_code(&self, email: &str) -> Result<Option<String>, String> {
        self.db
            .get_passcode(email, self.clock.now())
            .map_err(|e| e.to_string())
    }

    async fn consume_code(&self, email: &str) -> Result<(), String> {
        self.db.delete_passcode(email).map_err(|e| e.to_string())
    }
}
