#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use celebcheck::config::{self, Config, Matching};
use celebcheck::db::{self, Pool};
use celebcheck::messenger::{Button, MessageRef, Messenger};
use celebcheck::moderation::Workflow;
use celebcheck::synonyms::SynonymResolver;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

pub const ADMIN: i64 = 1000;

pub async fn setup_pool() -> Pool {
    let pool = db::init_pool("sqlite::memory:", 1).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

pub fn example_config() -> Config {
    config::parse(config::example()).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send {
        chat_id: i64,
        text: String,
        buttons: Vec<String>,
    },
    Edit {
        target: MessageRef,
        text: String,
    },
    Delete(MessageRef),
    Reply {
        chat_id: i64,
        reply_to: i32,
        text: String,
    },
}

/// Messenger fake that records every call and fails on demand per chat.
#[derive(Default)]
pub struct RecordingMessenger {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<i64>>,
    next_id: AtomicI32,
}

impl RecordingMessenger {
    pub async fn fail_chat(&self, chat_id: i64) {
        self.failing.lock().await.insert(chat_id);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn sends_to(&self, chat_id: i64) -> Vec<(String, Vec<String>)> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                Call::Send {
                    chat_id: id,
                    text,
                    buttons,
                } if id == chat_id => Some((text, buttons)),
                _ => None,
            })
            .collect()
    }

    pub async fn edits_in(&self, chat_id: i64) -> Vec<(MessageRef, String)> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit { target, text } if target.chat_id == chat_id => Some((target, text)),
                _ => None,
            })
            .collect()
    }

    pub async fn replies_in(&self, chat_id: i64) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                Call::Reply {
                    chat_id: id, text, ..
                } if id == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    async fn check(&self, chat_id: i64) -> Result<()> {
        if self.failing.lock().await.contains(&chat_id) {
            return Err(anyhow!("chat {chat_id} unreachable"));
        }
        Ok(())
    }

    fn next_ref(&self, chat_id: i64) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 100,
        }
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, chat_id: i64, text: &str, buttons: &[Button]) -> Result<MessageRef> {
        self.check(chat_id).await?;
        self.calls.lock().await.push(Call::Send {
            chat_id,
            text: text.to_string(),
            buttons: buttons.iter().map(|b| b.token.clone()).collect(),
        });
        Ok(self.next_ref(chat_id))
    }

    async fn edit(&self, target: MessageRef, text: &str, _buttons: &[Button]) -> Result<()> {
        self.check(target.chat_id).await?;
        self.calls.lock().await.push(Call::Edit {
            target,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, target: MessageRef) -> Result<()> {
        self.check(target.chat_id).await?;
        self.calls.lock().await.push(Call::Delete(target));
        Ok(())
    }

    async fn reply(
        &self,
        chat_id: i64,
        reply_to: i32,
        text: &str,
        _buttons: &[Button],
    ) -> Result<MessageRef> {
        self.check(chat_id).await?;
        self.calls.lock().await.push(Call::Reply {
            chat_id,
            reply_to,
            text: text.to_string(),
        });
        Ok(self.next_ref(chat_id))
    }
}

/// Records like [`RecordingMessenger`] but parks sends to one chat until
/// [`release`](Self::release) is called.
pub struct GatedMessenger {
    pub inner: RecordingMessenger,
    gated: i64,
    entered: Notify,
    open: Notify,
}

impl GatedMessenger {
    pub fn new(gated: i64) -> Self {
        Self {
            inner: RecordingMessenger::default(),
            gated,
            entered: Notify::new(),
            open: Notify::new(),
        }
    }

    /// Wait until a send to the gated chat is parked.
    pub async fn parked(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.open.notify_one();
    }
}

#[async_trait]
impl Messenger for GatedMessenger {
    async fn send(&self, chat_id: i64, text: &str, buttons: &[Button]) -> Result<MessageRef> {
        if chat_id == self.gated {
            self.entered.notify_one();
            self.open.notified().await;
        }
        self.inner.send(chat_id, text, buttons).await
    }

    async fn edit(&self, target: MessageRef, text: &str, buttons: &[Button]) -> Result<()> {
        self.inner.edit(target, text, buttons).await
    }

    async fn delete(&self, target: MessageRef) -> Result<()> {
        self.inner.delete(target).await
    }

    async fn reply(
        &self,
        chat_id: i64,
        reply_to: i32,
        text: &str,
        buttons: &[Button],
    ) -> Result<MessageRef> {
        self.inner.reply(chat_id, reply_to, text, buttons).await
    }
}

pub fn workflow<M: Messenger + 'static>(pool: Pool, messenger: Arc<M>) -> Workflow {
    let cfg = example_config();
    Workflow::new(
        pool,
        messenger,
        SynonymResolver::from_config(&cfg.synonyms),
        Matching::default(),
        ADMIN,
    )
}
