use crate::cards;
use crate::commands::{self, Command};
use crate::messenger::MessageRef;
use crate::model::{EntryPatch, Role};
use crate::moderation::{Actor, ModerationAction, QueryContext, Resolution, Workflow};
use anyhow::Result;
use std::sync::Arc;
use teloxide::payloads::setters::*;
use teloxide::prelude::*;
use tracing::{error, instrument, warn};

/// Message endpoint. Errors stop here: they are logged and the user gets a
/// generic apology.
pub async fn handle_message(bot: Bot, msg: Message, workflow: Arc<Workflow>) -> ResponseResult<()> {
    if let Err(err) = dispatch_message(&msg, &workflow).await {
        error!(?err, chat_id = msg.chat.id.0, "failed to handle message");
        if let Err(err) = bot.send_message(msg.chat.id, cards::GENERIC_FAILURE).await {
            warn!(?err, "failed to report failure");
        }
    }
    Ok(())
}

/// Callback endpoint for the inline decision buttons.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    workflow: Arc<Workflow>,
) -> ResponseResult<()> {
    let notice = match dispatch_callback(&q, &workflow).await {
        Ok(notice) => notice,
        Err(err) => {
            error!(?err, data = ?q.data, "failed to handle callback");
            cards::GENERIC_FAILURE
        }
    };
    if let Err(err) = bot.answer_callback_query(q.id.clone()).text(notice).await {
        warn!(?err, "failed to answer callback query");
    }
    Ok(())
}

#[instrument(skip_all, fields(chat_id = msg.chat.id.0))]
async fn dispatch_message(msg: &Message, workflow: &Workflow) -> Result<()> {
    let chat_id = msg.chat.id.0;
    let user = msg.from();
    let username = user.and_then(|u| u.username.clone());
    let role = workflow.register(chat_id, username.as_deref()).await?;
    let messenger = workflow.messenger();

    let Some(text) = msg.text() else {
        messenger.send(chat_id, cards::QUERY_FORMAT, &[]).await?;
        return Ok(());
    };

    match commands::parse(text) {
        None => {
            let prompt = match messenger.reply(chat_id, msg.id.0, "Searching...", &[]).await {
                Ok(prompt) => Some(prompt),
                Err(err) => {
                    warn!(?err, "failed to send search prompt");
                    None
                }
            };
            let ctx = QueryContext {
                user_id: user.map(|u| u.id.0 as i64).unwrap_or(chat_id),
                chat_id,
                message_id: msg.id.0,
                prompt,
                username: username.clone(),
            };
            workflow.submit_query(&ctx, text).await?;
        }
        Some(Err(err)) => {
            messenger.send(chat_id, &err.to_string(), &[]).await?;
        }
        Some(Ok(command)) => {
            let actor = Actor {
                chat_id,
                username,
                card: None,
            };
            run_command(workflow, &actor, role, command).await?;
        }
    }
    Ok(())
}

async fn run_command(workflow: &Workflow, actor: &Actor, role: Role, command: Command) -> Result<()> {
    let messenger = workflow.messenger();
    match command {
        Command::Start | Command::Help => {
            messenger.send(actor.chat_id, &cards::help(role), &[]).await?;
        }
        Command::Search => {
            messenger.send(actor.chat_id, cards::QUERY_FORMAT, &[]).await?;
        }
        Command::Approved { region, category } => {
            workflow
                .approved_names(actor.chat_id, &region, &category)
                .await?;
        }
        Command::Requests => {
            workflow.backlog(actor).await?;
        }
        Command::Users => {
            workflow.list_users(actor).await?;
        }
        Command::Export => {
            workflow.export_catalog(actor).await?;
        }
        Command::Role { chat_id, role } => {
            workflow.assign_role(actor, chat_id, role).await?;
        }
        Command::Status { id, status, reason } => {
            let patch = match reason {
                Some(reason) => EntryPatch::new().status(status).reason(reason),
                None => EntryPatch::new().status(status).clear_reason(),
            };
            workflow.edit_entry(actor, id, patch).await?;
        }
        Command::Rename { id, name } => {
            workflow
                .edit_entry(actor, id, EntryPatch::new().name(name))
                .await?;
        }
        Command::Move {
            id,
            category,
            region,
        } => {
            let patch = EntryPatch::new().category(category).region(region);
            workflow.edit_entry(actor, id, patch).await?;
        }
        Command::Remove { id } => {
            workflow.delete_entry(actor, id).await?;
        }
    }
    Ok(())
}

#[instrument(skip_all, fields(user_id = q.from.id.0))]
async fn dispatch_callback(q: &CallbackQuery, workflow: &Workflow) -> Result<&'static str> {
    let Some(action) = q.data.as_deref().and_then(ModerationAction::decode) else {
        warn!(data = ?q.data, "unknown callback token");
        return Ok("Unknown action.");
    };
    let actor = Actor {
        chat_id: q.from.id.0 as i64,
        username: q.from.username.clone(),
        card: q.message.as_ref().map(|m| MessageRef {
            chat_id: m.chat.id.0,
            message_id: m.id.0,
        }),
    };
    let notice = match workflow.resolve(&actor, action).await? {
        Resolution::Decided { .. } => "Saved.",
        Resolution::Discarded(_) => "Discarded.",
        Resolution::AlreadyHandled(_) => "Already handled.",
        Resolution::Forbidden => cards::NOT_ALLOWED,
    };
    Ok(notice)
}
