//! Conversation runtime executor

use super::traits::{DeliveryGateway, KnowledgeGateway, Storage};

use crate::delivery::guide_subject;
use crate::extract::mask_email;
use crate::knowledge::{AnswerDetail, KnowledgeError};
use crate::passcode::{generate_code, CODE_TTL_SECS};
use crate::state_machine::{transition, Effect, Event, LookupOutcome, Policy, Session, Stage, TransitionError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Reply used when a turn ends without any message
pub const NO_RESPONSE: &str = "Sorry, I couldn't generate a response.";

/// Guide body used when no detailed answer could be composed
pub const GUIDE_FALLBACK: &str = "Thank you for verifying. Stay tuned for more historical details.";

/// Tunables for effect execution
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub policy: Policy,
    /// Records requested per knowledge search
    pub search_k: usize,
    pub otp_ttl: Duration,
    pub lookup_timeout: Duration,
    pub delivery_timeout: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            search_k: 2,
            otp_ttl: Duration::from_secs(CODE_TTL_SECS),
            lookup_timeout: Duration::from_secs(10),
            delivery_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of one user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReply {
    pub session_id: String,
    pub message: String,
    pub stage: Stage,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Generic conversation runtime that can work with any storage, knowledge and
/// delivery implementations
pub struct ConversationRuntime<S, K, D>
where
    S: Storage + 'static,
    K: KnowledgeGateway + 'static,
    D: DeliveryGateway + 'static,
{
    storage: S,
    knowledge: K,
    delivery: D,
    settings: RuntimeSettings,
    /// Serializes turns per session id. Entries live only while a turn holds them.
    session_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Claim on a per-session lock; removes the map entry when the last claim drops
struct SessionLease<'a> {
    locks: &'a StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    session_id: String,
    lock: Arc<Mutex<()>>,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap();
        // The map and this lease hold the only references
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.session_id);
        }
    }
}

impl<S, K, D> ConversationRuntime<S, K, D>
where
    S: Storage + 'static,
    K: KnowledgeGateway + 'static,
    D: DeliveryGateway + 'static,
{
    pub fn new(storage: S, knowledge: K, delivery: D, settings: RuntimeSettings) -> Self {
        Self {
            storage,
            knowledge,
            delivery,
            settings,
            session_locks: StdMutex::new(HashMap::new()),
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Process one chat message.
    ///
    /// A missing session id mints a fresh one; an unknown or unreadable id
    /// starts a new session under that id.
    pub async fn handle_turn(
        &self,
        session_id: Option<&str>,
        text: &str,
    ) -> Result<TurnReply, RuntimeError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TransitionError::EmptyInput.into());
        }

        let session_id = session_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);

        let lease = self.lease(&session_id);
        let _guard = lease.lock.lock().await;

        let mut session = self
            .storage
            .load_session(&session_id)
            .await
            .map_err(RuntimeError::Storage)?
            .unwrap_or_else(|| {
                tracing::info!(session_id = %session_id, "Starting new session");
                Session::new(session_id.clone())
            });

        let reply = self
            .drive(
                &mut session,
                Event::UserInput {
                    text: text.to_string(),
                },
            )
            .await?;

        Ok(self.finish_turn(&session, reply).await)
    }

    /// Abandon any verification in progress. Returns `None` for unknown sessions.
    pub async fn cancel(&self, session_id: &str) -> Result<Option<TurnReply>, RuntimeError> {
        if self
            .storage
            .load_session(session_id)
            .await
            .map_err(RuntimeError::Storage)?
            .is_none()
        {
            return Ok(None);
        }

        let lease = self.lease(session_id);
        let _guard = lease.lock.lock().await;

        let Some(mut session) = self
            .storage
            .load_session(session_id)
            .await
            .map_err(RuntimeError::Storage)?
        else {
            return Ok(None);
        };

        let reply = self.drive(&mut session, Event::Cancel).await?;
        Ok(Some(self.finish_turn(&session, reply).await))
    }

    fn lease(&self, session_id: &str) -> SessionLease<'_> {
        let lock = self
            .session_locks
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .clone();
        SessionLease {
            locks: &self.session_locks,
            session_id: session_id.to_string(),
            lock,
        }
    }

    async fn finish_turn(&self, session: &Session, reply: Option<String>) -> TurnReply {
        if let Err(e) = self.storage.save_session(session).await {
            tracing::error!(session_id = %session.id, error = %e, "Failed to persist session");
        }

        TurnReply {
            session_id: session.id.clone(),
            message: reply.unwrap_or_else(|| NO_RESPONSE.to_string()),
            stage: session.stage,
        }
    }

    /// Run `event` and every event produced by its effects to completion.
    /// Returns the last reply produced during the turn.
    async fn drive(
        &self,
        session: &mut Session,
        event: Event,
    ) -> Result<Option<String>, TransitionError> {
        let mut reply = None;
        let mut is_first = true;

        // Process events in a loop - no recursion
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(session, &self.settings.policy, current_event) {
                Ok(r) => r,
                // Rejected user input leaves the session untouched
                Err(e) if is_first => return Err(e),
                Err(e) => {
                    tracing::error!(session_id = %session.id, error = %e, "Dropping effect result");
                    break;
                }
            };
            is_first = false;

            if result.new_session.stage != session.stage {
                tracing::info!(
                    session_id = %session.id,
                    from = %session.stage,
                    to = %result.new_session.stage,
                    "Stage changed"
                );
            }
            *session = result.new_session;

            if let Some(text) = result.reply {
                reply = Some(text);
            }

            // Execute effects and collect generated events
            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(&session.id, effect).await {
                    events_to_process.push(generated_event);
                }
            }
        }

        Ok(reply)
    }

    async fn execute_effect(&self, session_id: &str, effect: Effect) -> Option<Event> {
        tracing::debug!(
            session_id = %session_id,
            effect = effect.name(),
            outbound_mail = effect.is_delivery(),
            "Executing effect"
        );

        match effect {
            Effect::LookupKnowledge { query } => {
                let outcome = self.lookup(&query).await;
                if let LookupOutcome::Failed { message } = &outcome {
                    tracing::warn!(session_id = %session_id, error = %message, "Knowledge lookup failed");
                }
                Some(Event::LookupCompleted { query, outcome })
            }

            Effect::IssueCode { email } => {
                let delivered = self.issue_code(session_id, &email).await;
                Some(Event::CodeIssued { email, delivered })
            }

            Effect::CheckCode { email, submitted } => {
                let stored = match self.storage.peek_code(&email).await {
                    Ok(code) => code,
                    Err(e) => {
                        tracing::error!(session_id = %session_id, error = %e, "Failed to read passcode");
                        None
                    }
                };
                Some(Event::CodeChecked { submitted, stored })
            }

            Effect::ConsumeCode { email } => {
                if let Err(e) = self.storage.consume_code(&email).await {
                    tracing::error!(session_id = %session_id, error = %e, "Failed to consume passcode");
                }
                None
            }

            Effect::DeliverGuide { email, query } => {
                let delivered = self.deliver_guide(session_id, &email, &query).await;
                Some(Event::GuideDelivered { email, delivered })
            }
        }
    }

    async fn lookup(&self, query: &str) -> LookupOutcome {
        let work = async {
            let matches = self.knowledge.search(query, self.settings.search_k).await?;
            if matches.is_empty() {
                return Ok(LookupOutcome::NoMatch);
            }
            let answer = self
                .knowledge
                .answer(query, &matches, AnswerDetail::Brief)
                .await?;
            Ok::<_, KnowledgeError>(LookupOutcome::Answered { answer, matches })
        };

        match tokio::time::timeout(self.settings.lookup_timeout, work).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => LookupOutcome::Failed {
                message: e.to_string(),
            },
            Err(_) => LookupOutcome::Failed {
                message: "Knowledge lookup timed out".to_string(),
            },
        }
    }

    /// Generate, store and mail a code. A code that could not be mailed is
    /// discarded so it can never be verified.
    async fn issue_code(&self, session_id: &str, email: &str) -> bool {
        let code = generate_code(self.settings.policy.code_digits);

        if let Err(e) = self
            .storage
            .issue_code(email, &code, self.settings.otp_ttl)
            .await
        {
            tracing::error!(session_id = %session_id, error = %e, "Failed to store passcode");
            return false;
        }

        let sent = tokio::time::timeout(
            self.settings.delivery_timeout,
            self.delivery.send_code(email, &code),
        )
        .await;

        match sent {
            Ok(Ok(())) => {
                tracing::info!(session_id = %session_id, to = %mask_email(email), "Passcode sent");
                true
            }
            failed => {
                let error = match failed {
                    Ok(Err(e)) => e.to_string(),
                    _ => "delivery timed out".to_string(),
                };
                tracing::warn!(
                    session_id = %session_id,
                    to = %mask_email(email),
                    error = %error,
                    "Passcode delivery failed"
                );
                if let Err(e) = self.storage.consume_code(email).await {
                    tracing::error!(session_id = %session_id, error = %e, "Failed to discard passcode");
                }
                false
            }
        }
    }

    async fn deliver_guide(&self, session_id: &str, email: &str, query: &str) -> bool {
        let compose = async {
            let matches = self.knowledge.search(query, self.settings.search_k).await?;
            self.knowledge
                .answer(query, &matches, AnswerDetail::Detailed)
                .await
        };

        let body = match tokio::time::timeout(self.settings.lookup_timeout, compose).await {
            Ok(Ok(body)) if !body.trim().is_empty() => body,
            Ok(Ok(_)) => GUIDE_FALLBACK.to_string(),
            Ok(Err(e)) => {
                tracing::warn!(session_id = %session_id, error = %e, "Detailed answer failed, sending fallback guide");
                GUIDE_FALLBACK.to_string()
            }
            Err(_) => {
                tracing::warn!(session_id = %session_id, "Detailed answer timed out, sending fallback guide");
                GUIDE_FALLBACK.to_string()
            }
        };

        let subject = guide_subject(query);
        let sent = tokio::time::timeout(
            self.settings.delivery_timeout,
            self.delivery.send_text(email, &subject, &body),
        )
        .await;

        match sent {
            Ok(Ok(())) => {
                tracing::info!(session_id = %session_id, to = %mask_email(email), "Guide delivered");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(session_id = %session_id, to = %mask_email(email), error = %e, "Guide delivery failed");
                false
            }
            Err(_) => {
                tracing::warn!(session_id = %session_id, to = %mask_email(email), "Guide delivery timed out");
                false
            }
        }
    }
}
