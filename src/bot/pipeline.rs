//! Per-message handling: rate limit, commands, verification, intents, fallback.

use std::sync::Arc;

use teloxide::types::{ChatId, Update, UpdateKind, UserId};
use tracing::{debug, info, warn};

use super::commands::Command;
use super::intents::route;
use super::replies;
use super::telegram::Messenger;
use super::verification::parse_student_id;
use crate::assistant::Assistant;
use crate::audit::{self, SecurityLog};
use crate::knowledge::{KnowledgeError, KnowledgeStore};
use crate::rate_limit::RateLimiter;
use crate::session::{SessionStore, SessionUpdate};

const PREVIEW_CHARS: usize = 50;

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// A text message reduced to what the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub text: String,
}

impl Incoming {
    /// `None` for updates that are not text messages from a user.
    pub fn from_update(update: &Update) -> Option<Self> {
        let UpdateKind::Message(msg) = &update.kind else {
            return None;
        };
        let user = msg.from.as_ref()?;
        let text = msg.text()?;
        Some(Self {
            chat_id: msg.chat.id,
            user_id: user.id,
            text: text.to_string(),
        })
    }
}

pub struct Pipeline {
    messenger: Arc<dyn Messenger>,
    sessions: SessionStore,
    limiter: RateLimiter,
    security: SecurityLog,
    knowledge: Arc<KnowledgeStore>,
    assistant: Assistant,
    admin_id: UserId,
    bot_username: String,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        messenger: Arc<dyn Messenger>,
        sessions: SessionStore,
        limiter: RateLimiter,
        security: SecurityLog,
        knowledge: Arc<KnowledgeStore>,
        assistant: Assistant,
        admin_id: UserId,
        bot_username: String,
    ) -> Self {
        Self {
            messenger,
            sessions,
            limiter,
            security,
            knowledge,
            assistant,
            admin_id,
            bot_username,
        }
    }

    /// Handle one webhook update. Non-text updates are ignored.
    pub async fn process_update(&self, update: &Update) {
        match Incoming::from_update(update) {
            Some(incoming) => self.handle(incoming).await,
            None => debug!(update_id = update.id.0, "Ignoring non-text update"),
        }
    }

    pub async fn handle(&self, incoming: Incoming) {
        let Incoming { chat_id, user_id, text } = incoming;
        info!(user_id = user_id.0, "Message: {:?}", preview(&text));

        if !self.limiter.check(user_id).await {
            self.send(chat_id, replies::RATE_LIMITED).await;
            return;
        }

        if text.starts_with('/') {
            match Command::recognize(&text, &self.bot_username) {
                Some(command) => self.handle_command(chat_id, user_id, command).await,
                None => debug!(user_id = user_id.0, "Ignoring unknown command"),
            }
            return;
        }

        let session = self.sessions.get(user_id).await;
        if session.awaiting_id {
            self.verify_student_id(chat_id, user_id, &text).await;
            return;
        }

        let lowered = text.to_lowercase();
        let knowledge = self.knowledge.snapshot();
        let reply = match route(&lowered) {
            Some(intent) => {
                debug!(user_id = user_id.0, ?intent, "Matched intent");
                intent.reply(&knowledge)
            }
            None => match self.assistant.respond(&lowered, &knowledge.text_summary()).await {
                Ok(answer) => replies::ai_response(&answer),
                Err(e) => {
                    warn!(user_id = user_id.0, "Completion fallback failed: {e}");
                    replies::technical_difficulty(&knowledge)
                }
            },
        };
        self.send(chat_id, &reply).await;
    }

    async fn handle_command(&self, chat_id: ChatId, user_id: UserId, command: Command) {
        match command {
            Command::Start | Command::Help => {
                self.send(chat_id, &replies::welcome()).await;
                self.sessions.update(user_id, SessionUpdate::new_user()).await;
            }
            Command::UpdateKnowledge(payload) => {
                if user_id != self.admin_id {
                    self.security.record(user_id, audit::UNAUTHORIZED_KNOWLEDGE_UPDATE).await;
                    self.send(chat_id, replies::ADMIN_REQUIRED).await;
                    return;
                }
                let reply = match self.knowledge.apply_update(&payload).await {
                    Ok(keys) => replies::knowledge_updated(&keys),
                    Err(e @ (KnowledgeError::InvalidJson(_) | KnowledgeError::NotAnObject)) => {
                        replies::update_failed(&format!("Invalid format: {e}"))
                    }
                    Err(e) => {
                        warn!("Knowledge update failed: {e}");
                        replies::update_failed(&format!("Error: {e}"))
                    }
                };
                self.send(chat_id, &reply).await;
            }
        }
    }

    async fn verify_student_id(&self, chat_id: ChatId, user_id: UserId, text: &str) {
        match parse_student_id(text) {
            Some(student_id) => {
                info!(user_id = user_id.0, "Student ID verified");
                self.sessions.update(user_id, SessionUpdate::verified(student_id)).await;
                self.send(chat_id, &replies::id_validated()).await;
            }
            None => {
                let knowledge = self.knowledge.snapshot();
                self.send(chat_id, &replies::invalid_id_format(&knowledge)).await;
                self.security.record(user_id, audit::INVALID_ID_FORMAT).await;
            }
        }
    }

    async fn send(&self, chat_id: ChatId, text: &str) {
        // Failures are already logged by the messenger.
        let _ = self.messenger.send_text(chat_id, text).await;
    }
}
