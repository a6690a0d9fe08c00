//! Completion fallback for messages no canned intent matches.
//!
//! The user's text is optionally screened by the moderation endpoint
//! (fail-open), then sent with the knowledge document as system context.
//! Any failure is retried with jittered exponential backoff; the answer
//! is filtered to a conservative character set before it is shown.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, warn};

use crate::openai::{self, Message, Role};
use crate::rate_limit::FailMode;

pub const INAPPROPRIATE: &str = "⚠️ Your request contains inappropriate content.";

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,!?\-@#$%&*()]").expect("valid regex"));

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("all {attempts} completion attempts failed: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: openai::Error,
    },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: usize,
    /// Upper bound of the first wait; each later wait doubles it.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Waits between attempts: base, 2*base, 4*base, ... capped, each
    /// scaled by a uniform random factor.
    fn delays(&self) -> impl Iterator<Item = Duration> {
        let half_base_ms = (self.base_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(half_base_ms)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.attempts.saturating_sub(1))
    }
}

#[derive(Debug, Clone)]
pub struct AssistantOptions {
    pub max_tokens: u32,
    pub moderation: bool,
    pub sanitize: bool,
    pub retry: RetryPolicy,
}

pub struct Assistant {
    client: openai::Client,
    options: AssistantOptions,
    on_moderation_error: FailMode,
}

/// Strip everything outside the allow-list, then trim.
pub fn sanitize_output(text: &str, enabled: bool) -> String {
    if enabled {
        DISALLOWED.replace_all(text, "").trim().to_string()
    } else {
        text.trim().to_string()
    }
}

fn system_context(knowledge: &str) -> String {
    format!("Knowledge Base:\n{knowledge}\n\nRules:\n- Be concise\n- Use only provided information")
}

impl Assistant {
    pub fn new(client: openai::Client, options: AssistantOptions) -> Self {
        Self {
            client,
            options,
            on_moderation_error: FailMode::Open,
        }
    }

    /// Answer `prompt` from `knowledge`, retrying per the policy.
    pub async fn respond(&self, prompt: &str, knowledge: &str) -> Result<String, AssistantError> {
        Retry::start(self.options.retry.delays(), || self.attempt(prompt, knowledge))
            .await
            .map_err(|last| {
                error!(attempts = self.options.retry.attempts, error = %last, "All completion attempts failed");
                AssistantError::Exhausted {
                    attempts: self.options.retry.attempts,
                    last,
                }
            })
    }

    async fn attempt(&self, prompt: &str, knowledge: &str) -> Result<String, openai::Error> {
        if self.options.moderation && self.is_unsafe(prompt).await {
            return Ok(INAPPROPRIATE.to_string());
        }

        let messages = [
            Message {
                role: Role::System,
                content: system_context(knowledge),
            },
            Message {
                role: Role::User,
                content: prompt.to_string(),
            },
        ];

        match self.client.chat(&messages, self.options.max_tokens).await {
            Ok(text) => {
                debug!("Completion returned {} chars", text.len());
                Ok(sanitize_output(&text, self.options.sanitize))
            }
            Err(e) => {
                error!("AI service error: {e}");
                Err(e)
            }
        }
    }

    async fn is_unsafe(&self, text: &str) -> bool {
        match self.client.moderate(text).await {
            Ok(flagged) => flagged,
            Err(e) => {
                warn!("Moderation API error: {e}");
                !self.on_moderation_error.allows()
            }
        }
    }
}
