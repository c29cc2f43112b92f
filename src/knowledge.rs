//! Monument knowledge: catalog search plus answer generation
//!
//! The catalog decides whether a query is about a known monument; an
//! `AnswerService` turns the matches into prose.

mod catalog;
mod error;
mod openai;

pub use catalog::{Monument, MonumentCatalog};
pub use error::{KnowledgeError, KnowledgeErrorKind};
pub use openai::{OpenAiAnswers, OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};

use crate::runtime::KnowledgeGateway;
use async_trait::async_trait;
use std::sync::Arc;

/// How much detail an answer should carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerDetail {
    /// Chat reply shown before the e-mail prompt
    Brief,
    /// Guide delivered by e-mail after verification
    Detailed,
}

/// Turns catalog matches into an answer
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn compose(
        &self,
        query: &str,
        matches: &[Monument],
        detail: AnswerDetail,
    ) -> Result<String, KnowledgeError>;

    fn name(&self) -> &str;
}

/// Answers composed directly from catalog text (no model required)
#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogAnswers;

#[async_trait]
impl AnswerService for CatalogAnswers {
    async fn compose(
        &self,
        _query: &str,
        matches: &[Monument],
        detail: AnswerDetail,
    ) -> Result<String, KnowledgeError> {
        let Some(top) = matches.first() else {
            return Err(KnowledgeError::unknown("No matches to answer from"));
        };

        Ok(match detail {
            AnswerDetail::Brief => format!("{} is in {}. {}", top.name, top.location, top.description),
            AnswerDetail::Detailed => {
                let mut body = format!(
                    "Here's more detailed information on {} ({}):\n\n{}\n",
                    top.name, top.location, top.description
                );
                let related: Vec<_> = matches.iter().skip(1).map(Monument::context_line).collect();
                if !related.is_empty() {
                    body.push_str("\nYou may also enjoy:\n");
                    for line in related {
                        body.push_str("- ");
                        body.push_str(&line);
                        body.push('\n');
                    }
                }
                body.push_str("\nEnjoy your visit!");
                body
            }
        })
    }

    fn name(&self) -> &str {
        "catalog"
    }
}

/// Logging wrapper for answer services
pub struct LoggingAnswers {
    inner: Arc<dyn AnswerService>,
}

impl LoggingAnswers {
    pub fn new(inner: Arc<dyn AnswerService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AnswerService for LoggingAnswers {
    async fn compose(
        &self,
        query: &str,
        matches: &[Monument],
        detail: AnswerDetail,
    ) -> Result<String, KnowledgeError> {
        let start = std::time::Instant::now();
        let result = self.inner.compose(query, matches, detail).await;
        let duration = start.elapsed();

        match &result {
            Ok(answer) => {
                tracing::info!(
                    service = %self.inner.name(),
                    detail = ?detail,
                    duration_ms = %duration.as_millis(),
                    answer_len = answer.len(),
                    "Answer composed"
                );
            }
            Err(e) => {
                tracing::error!(
                    service = %self.inner.name(),
                    detail = ?detail,
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    error = %e.message,
                    "Answer composition failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Production knowledge gateway: catalog ranking + pluggable answers
pub struct CatalogKnowledge {
    catalog: Arc<MonumentCatalog>,
    answers: Arc<dyn AnswerService>,
}

impl CatalogKnowledge {
    pub fn new(catalog: Arc<MonumentCatalog>, answers: Arc<dyn AnswerService>) -> Self {
        Self { catalog, answers }
    }
}

#[async_trait]
impl KnowledgeGateway for CatalogKnowledge {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Monument>, KnowledgeError> {
        Ok(self.catalog.search(query, k))
    }

    async fn answer(
        &self,
        query: &str,
        matches: &[Monument],
        detail: AnswerDetail,
    ) -> Result<String, KnowledgeError> {
        self.answers.compose(query, matches, detail).await
    }
}
