//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::delivery::DeliveryError;
use crate::knowledge::{
    AnswerDetail, AnswerService, CatalogAnswers, KnowledgeError, Monument,
};
use crate::passcode::{expires_at, Clock};
use crate::state_machine::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Manual Clock
// ============================================================================

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// Mock Knowledge Gateway
// ============================================================================

/// Knowledge gateway over a fixed catalog.
///
/// A monument matches when its name appears in the query. Clones share
/// their failure switches.
#[derive(Clone)]
pub struct MockKnowledge {
    monuments: Arc<Vec<Monument>>,
    delay: Option<Duration>,
    fail_detailed: Arc<AtomicBool>,
    /// Record of answer requests
    pub requests: Arc<Mutex<Vec<(String, AnswerDetail)>>>,
}

impl MockKnowledge {
    pub fn new(monuments: Vec<Monument>) -> Self {
        Self {
            monuments: Arc::new(monuments),
            delay: None,
            fail_detailed: Arc::new(AtomicBool::new(false)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep before every search
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make detailed answers fail
    pub fn fail_detailed(&self, fail: bool) {
        self.fail_detailed.store(fail, Ordering::SeqCst);
    }

    pub fn recorded_requests(&self) -> Vec<(String, AnswerDetail)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeGateway for MockKnowledge {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Monument>, KnowledgeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let query = query.to_lowercase();
        let mut found: Vec<Monument> = self
            .monuments
            .iter()
            .filter(|m| query.contains(&m.name.to_lowercase()))
            .cloned()
            .collect();
        found.truncate(k);
        Ok(found)
    }

    async fn answer(
        &self,
        query: &str,
        matches: &[Monument],
        detail: AnswerDetail,
    ) -> Result<String, KnowledgeError> {
        self.requests
            .lock()
            .unwrap()
            .push((query.to_string(), detail));
        if detail == AnswerDetail::Detailed && self.fail_detailed.load(Ordering::SeqCst) {
            return Err(KnowledgeError::server_error("mock detailed answer failure"));
        }
        CatalogAnswers.compose(query, matches, detail).await
    }
}

/// Small knowledge base used across runtime tests
pub fn sample_knowledge() -> MockKnowledge {
    MockKnowledge::new(vec![
        Monument::new(
            "Colosseum",
            "Rome, Italy",
            "An oval amphitheatre completed in 80 AD that held up to 50,000 spectators.",
        ),
        Monument::new(
            "Taj Mahal",
            "Agra, India",
            "An ivory-white marble mausoleum commissioned in 1632 by Shah Jahan.",
        ),
        Monument::new(
            "Machu Picchu",
            "Cusco Region, Peru",
            "A 15th-century Inca citadel on a mountain ridge above the Urubamba valley.",
        ),
    ])
}

// ============================================================================
// Mock Delivery Gateway
// ============================================================================

/// One recorded outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub address: String,
    pub subject: String,
    pub body: String,
}

/// Delivery gateway that records messages and can be switched to fail
#[derive(Default)]
pub struct MockDelivery {
    sent: Mutex<Vec<SentMail>>,
    failing: AtomicBool,
}

impl MockDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages successfully sent so far
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryGateway for MockDelivery {
    async fn send_text(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected {
                status: 503,
                body: "mock outage".to_string(),
            });
        }
        self.sent.lock().unwrap().push(SentMail {
            address: address.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// In-memory sessions and passcodes with a manual clock
pub struct InMemoryStorage {
    sessions: Mutex<HashMap<String, Session>>,
    passcodes: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
    clock: Arc<ManualClock>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            passcodes: Mutex::new(HashMap::new()),
            clock: Arc::new(ManualClock::new(Utc::now())),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemoryStorage {
    async fn load_session(&self, id: &str) -> Result<Option<Session>, String> {
        Ok(self.sessions.lock().unwrap().get(id).cloned())
    }

    async fn save_session(&self, session: &Session) -> Result<(), String> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }
}

#[async_trait]
impl PasscodeStore for InMemoryStorage {
    async fn issue_code(&self, email: &str, code: &str, ttl: Duration) -> Result<(), String> {
        let expiry = expires_at(self.clock.now(), ttl)
            .ok_or_else(|| format!("Passcode lifetime out of range: {ttl:?}"))?;
        self.passcodes
            .lock()
            .unwrap()
            .insert(email.to_string(), (code.to_string(), expiry));
        Ok(())
    }

    async fn peek_code(&self, email: &str) -> Result<Option<String>, String> {
        let now = self.clock.now();
        Ok(self
            .passcodes
            .lock()
            .unwrap()
            .get(email)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(code, _)| code.clone()))
    }

    async fn consume_code(&self, email: &str) -> Result<(), String> {
        self.passcodes.lock().unwrap().remove(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_knowledge_matches_by_name() {
        let knowledge = sample_knowledge();
        let found = knowledge.search("Is the Taj Mahal open?", 2).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Taj Mahal");

        assert!(knowledge.search("weather", 2).await.unwrap().is_empty());

        let answer = knowledge
            .answer("taj mahal", &found, AnswerDetail::Brief)
            .await
            .unwrap();
        assert!(answer.starts_with("Taj Mahal is in Agra"));
        assert_eq!(knowledge.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_delivery_records_and_fails() {
        let delivery = MockDelivery::new();
        delivery.send_code("alice@example.com", "123456").await.unwrap();
        assert_eq!(delivery.sent().len(), 1);
        assert!(delivery.sent()[0].body.contains("123456"));

        delivery.set_failing(true);
        assert!(delivery.send_text("a@b.io", "s", "b").await.is_err());
        assert_eq!(delivery.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_passcode_expiry() {
        let storage = InMemoryStorage::new();
        storage
            .issue_code("alice@example.com", "123456", Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(
            storage.peek_code("alice@example.com").await.unwrap().as_deref(),
            Some("123456")
        );

        storage.clock().advance(chrono::Duration::seconds(300));
        assert!(storage.peek_code("alice@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consume_is_idempotent() {
        let db = crate::db::Database::open_in_memory().unwrap();
        let storage = DatabaseStorage::new(db);
        storage
            .issue_code("alice@example.com", "123456", Duration::from_secs(300))
            .await
            .unwrap();

        storage.consume_code("alice@example.com").await.unwrap();
        storage.consume_code("alice@example.com").await.unwrap();
        storage.consume_code("never@example.com").await.unwrap();

        assert!(storage.peek_code("alice@example.com").await.unwrap().is_none());
        assert!(storage.peek_code("never@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_error() {
        let db = crate::db::Database::open_in_memory().unwrap();
        let storage = DatabaseStorage::new(db);
        let huge = Duration::from_secs(10_000_000_000_000);

        assert!(storage.issue_code("alice@example.com", "123456", huge).await.is_err());
        assert!(storage.peek_code("alice@example.com").await.unwrap().is_none());
        assert!(InMemoryStorage::new()
            .issue_code("alice@example.com", "123456", huge)
            .await
            .is_err());
    }
}
