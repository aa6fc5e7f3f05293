//! Outbound chat operations used by the workflow.
//!
//! The workflow only ever talks to `dyn Messenger`; `TelegramMessenger` is
//! the production implementation and tests plug in a recording fake.

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::payloads::setters::*;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};

/// Handle to a message the bot sent, enough to edit or delete it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Inline action attached to a message. `token` comes back verbatim in the
/// callback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str, buttons: &[Button]) -> Result<MessageRef>;
    /// Replace text and buttons of a sent message. An empty `buttons`
    /// removes the keyboard.
    async fn edit(&self, target: MessageRef, text: &str, buttons: &[Button]) -> Result<()>;
    async fn delete(&self, target: MessageRef) -> Result<()>;
    async fn reply(
        &self,
        chat_id: i64,
        reply_to: i32,
        text: &str,
        buttons: &[Button],
    ) -> Result<MessageRef>;
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn keyboard(buttons: &[Button]) -> Option<InlineKeyboardMarkup> {
    if buttons.is_empty() {
        return None;
    }
    let row = buttons
        .iter()
        .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.token.clone()))
        .collect::<Vec<_>>();
    Some(InlineKeyboardMarkup::new(vec![row]))
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, chat_id: i64, text: &str, buttons: &[Button]) -> Result<MessageRef> {
        let mut req = self.bot.send_message(ChatId(chat_id), text);
        if let Some(kb) = keyboard(buttons) {
            req = req.reply_markup(kb);
        }
        let sent = req
            .await
            .with_context(|| format!("send_message to {chat_id}"))?;
        Ok(MessageRef {
            chat_id,
            message_id: sent.id.0,
        })
    }

    async fn edit(&self, target: MessageRef, text: &str, buttons: &[Button]) -> Result<()> {
        let mut req = self.bot.edit_message_text(
            ChatId(target.chat_id),
            MessageId(target.message_id),
            text,
        );
        if let Some(kb) = keyboard(buttons) {
            req = req.reply_markup(kb);
        }
        req.await.with_context(|| {
            format!(
                "edit_message_text {}:{}",
                target.chat_id, target.message_id
            )
        })?;
        Ok(())
    }

    async fn delete(&self, target: MessageRef) -> Result<()> {
        self.bot
            .delete_message(ChatId(target.chat_id), MessageId(target.message_id))
            .await
            .with_context(|| format!("delete_message {}:{}", target.chat_id, target.message_id))?;
        Ok(())
    }

    async fn reply(
        &self,
        chat_id: i64,
        reply_to: i32,
        text: &str,
        buttons: &[Button],
    ) -> Result<MessageRef> {
        let mut req = self
            .bot
            .send_message(ChatId(chat_id), text)
            .reply_to_message_id(MessageId(reply_to));
        if let Some(kb) = keyboard(buttons) {
            req = req.reply_markup(kb);
        }
        let sent = req
            .await
            .with_context(|| format!("reply to {chat_id}:{reply_to}"))?;
        Ok(MessageRef {
            chat_id,
            message_id: sent.id.0,
        })
    }
}
