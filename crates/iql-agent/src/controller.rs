//! Retry controller: generate, parse, validate, and feed errors back
//!
//! Each attempt asks the model for IQL. A response containing the sentinel
//! ends the run as [`Outcome::Unsupported`]. A response that fails to parse
//! or validate is answered with a feedback turn and regenerated until the
//! retry budget runs out. Infrastructure failures (model or similarity
//! store) end the run immediately.

use futures::future::BoxFuture;
use futures::FutureExt;
use iql_ast::{parse_aggregation, parse_filter, IqlError, ParseError};
use iql_ir::{Context, FunctionCall, IqlQuery, Node};
use iql_registry::{Catalog, SimilarityError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::llm::{LlmClient, LlmError, Message};
use crate::prompt;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Language model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Similarity lookup error: {0}")]
    Similarity(#[from] SimilarityError),

    #[error("IQL still invalid after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: usize,
        iql: String,
        last: IqlError,
    },
}

/// Expression shape requested from the model
pub trait Mode {
    type Output: Serialize + fmt::Display + Send;

    const NAME: &'static str;

    fn prompt() -> &'static str;

    fn parse<'a>(
        source: &'a str,
        catalog: &'a Catalog,
        contexts: &'a [Context],
    ) -> BoxFuture<'a, Result<IqlQuery<Self::Output>, ParseError>>;
}

/// Boolean combination of calls
pub struct FilterMode;

/// Single call
pub struct AggregationMode;

impl Mode for FilterMode {
    type Output = Node;

    const NAME: &'static str = "filter";

    fn prompt() -> &'static str {
        prompt::FILTER_PROMPT
    }

    fn parse<'a>(
        source: &'a str,
        catalog: &'a Catalog,
        contexts: &'a [Context],
    ) -> BoxFuture<'a, Result<IqlQuery<Node>, ParseError>> {
        parse_filter(source, catalog, contexts).boxed()
    }
}

impl Mode for AggregationMode {
    type Output = FunctionCall;

    const NAME: &'static str = "aggregation";

    fn prompt() -> &'static str {
        prompt::AGGREGATION_PROMPT
    }

    fn parse<'a>(
        source: &'a str,
        catalog: &'a Catalog,
        contexts: &'a [Context],
    ) -> BoxFuture<'a, Result<IqlQuery<FunctionCall>, ParseError>> {
        parse_aggregation(source, catalog, contexts).boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Success { query: IqlQuery<T> },
    /// The model signalled that no expression answers the question
    Unsupported { response: String },
}

/// Result of a generation run with the conversation kept for audit
#[derive(Debug, Clone, Serialize)]
pub struct Generation<T> {
    pub outcome: Outcome<T>,
    pub attempts: usize,
    pub conversation: Vec<Message>,
}

pub struct RetryController<L> {
    llm: L,
    config: AgentConfig,
}

impl<L: LlmClient> RetryController<L> {
    pub fn new(llm: L, config: AgentConfig) -> Self {
        Self { llm, config }
    }

    pub async fn generate_filter(
        &self,
        question: &str,
        catalog: &Catalog,
        contexts: &[Context],
    ) -> Result<Generation<Node>, AgentError> {
        self.generate::<FilterMode>(question, catalog, contexts).await
    }

    pub async fn generate_aggregation(
        &self,
        question: &str,
        catalog: &Catalog,
        contexts: &[Context],
    ) -> Result<Generation<FunctionCall>, AgentError> {
        self.generate::<AggregationMode>(question, catalog, contexts).await
    }

    pub async fn generate<M: Mode>(
        &self,
        question: &str,
        catalog: &Catalog,
        contexts: &[Context],
    ) -> Result<Generation<M::Output>, AgentError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("iql_generation", %request_id, mode = M::NAME);
        self.run::<M>(question, catalog, contexts).instrument(span).await
    }

    async fn run<M: Mode>(
        &self,
        question: &str,
        catalog: &Catalog,
        contexts: &[Context],
    ) -> Result<Generation<M::Output>, AgentError> {
        let sentinel = &self.config.unsupported_sentinel;
        let max_attempts = self.config.n_retries + 1;
        let mut conversation = prompt::conversation(M::prompt(), question, catalog, contexts, sentinel);

        info!(question = %question, max_attempts, "Generating IQL");

        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self.llm.generate(&conversation).await?;
            info!(attempt, response = %response, "LLM response");
            conversation.push(Message::assistant(response.clone()));

            if is_unsupported(&response, sentinel) {
                info!(attempt, "Question not expressible in IQL");
                return Ok(Generation {
                    outcome: Outcome::Unsupported { response },
                    attempts: attempt,
                    conversation,
                });
            }

            let iql = clean_response(&response);
            match M::parse(iql, catalog, contexts).await {
                Ok(query) => {
                    info!(
                        attempt,
                        iql = %query.root,
                        fingerprint = %query.fingerprint(),
                        "IQL validated"
                    );
                    return Ok(Generation {
                        outcome: Outcome::Success { query },
                        attempts: attempt,
                        conversation,
                    });
                }
                Err(ParseError::Similarity(e)) => return Err(e.into()),
                Err(ParseError::Iql(error)) => {
                    warn!(
                        attempt,
                        iql = %iql,
                        fragment = error.snippet().map(|s| s.text.as_str()).unwrap_or(""),
                        error = %error,
                        "Invalid IQL"
                    );
                    if attempt >= max_attempts {
                        return Err(AgentError::Exhausted {
                            attempts: attempt,
                            iql: iql.to_string(),
                            last: error,
                        });
                    }
                    conversation.push(prompt::feedback(question, iql, &error));
                }
            }
        }
    }
}

/// Case-insensitive sentinel match anywhere in the response
fn is_unsupported(response: &str, sentinel: &str) -> bool {
    !sentinel.is_empty() && response.to_lowercase().contains(&sentinel.to_lowercase())
}

/// Strip surrounding whitespace and a markdown code fence, if any.
pub fn clean_response(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`python`, `iql`, ...) on the opening fence line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
