//! Moderation workflow.
//!
//! A query that misses the catalog becomes a pending request. The request
//! card is broadcast to every moderator, observer and the admin; the
//! delivered copies are remembered in a [`FanoutRegistry`] until the first
//! moderator decides. The decision is written to the catalog, every copy is
//! edited to show the outcome and the requester gets the answer in place of
//! their prompt message.

use crate::cards;
use crate::config::Matching;
use crate::db::{self, Pool};
use crate::error::{QueryRejection, StoreError};
use crate::matcher::{self, MatchOutcome};
use crate::messenger::{Button, MessageRef, Messenger};
use crate::model::{
    Capability, CatalogEntry, EntryKey, EntryPatch, NewPendingRequest, PendingRequest, Role,
    Status, Subscriber, UNIVERSAL_CATEGORY,
};
use crate::synonyms::SynonymResolver;
use anyhow::{anyhow, Result};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Decoded callback action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Approve(i64),
    Ban(i64),
    Discard(i64),
}

impl ModerationAction {
    pub fn decode(token: &str) -> Option<Self> {
        let (verb, id) = token.split_once(':')?;
        let id = id.parse::<i64>().ok()?;
        match verb {
            "approve" => Some(ModerationAction::Approve(id)),
            "ban" => Some(ModerationAction::Ban(id)),
            "delete" => Some(ModerationAction::Discard(id)),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ModerationAction::Approve(id) => format!("approve:{id}"),
            ModerationAction::Ban(id) => format!("ban:{id}"),
            ModerationAction::Discard(id) => format!("delete:{id}"),
        }
    }

    pub fn request_id(&self) -> i64 {
        match self {
            ModerationAction::Approve(id)
            | ModerationAction::Ban(id)
            | ModerationAction::Discard(id) => *id,
        }
    }

    /// Catalog status written by this action, if any.
    pub fn verdict(&self) -> Option<Status> {
        match self {
            ModerationAction::Approve(_) => Some(Status::Approved),
            ModerationAction::Ban(_) => Some(Status::Forbidden),
            ModerationAction::Discard(_) => None,
        }
    }
}

fn decision_buttons(request_id: i64) -> Vec<Button> {
    vec![
        Button::new("Approve", ModerationAction::Approve(request_id).encode()),
        Button::new("Ban", ModerationAction::Ban(request_id).encode()),
    ]
}

fn backlog_buttons(request_id: i64) -> Vec<Button> {
    let mut buttons = decision_buttons(request_id);
    buttons.push(Button::new(
        "Delete",
        ModerationAction::Discard(request_id).encode(),
    ));
    buttons
}

/// Messages showing a pending request, by request id.
///
/// Senders announce their sends with [`begin`](Self::begin) and report each
/// one with [`deliver`](Self::deliver). Resolution calls
/// [`close`](Self::close), which hands back the copies delivered so far. If
/// sends are still in flight the final card is kept until they settle, so a
/// late copy is updated as soon as it lands and nothing outlives the request.
#[derive(Debug, Default)]
pub struct FanoutRegistry {
    requests: Mutex<HashMap<i64, Fanout>>,
}

#[derive(Debug, Default)]
struct Fanout {
    copies: Vec<MessageRef>,
    in_flight: usize,
    outcome: Option<String>,
}

impl FanoutRegistry {
    pub async fn begin(&self, request_id: i64, sends: usize) {
        if sends == 0 {
            return;
        }
        let mut requests = self.requests.lock().await;
        requests.entry(request_id).or_default().in_flight += sends;
    }

    /// Settle one announced send. Returns the final card when the request
    /// was closed while this copy was on its way.
    pub async fn deliver(&self, request_id: i64, copy: Option<MessageRef>) -> Option<String> {
        let mut requests = self.requests.lock().await;
        let fanout = requests.get_mut(&request_id)?;
        fanout.in_flight = fanout.in_flight.saturating_sub(1);
        let Some(outcome) = fanout.outcome.clone() else {
            fanout.copies.extend(copy);
            return None;
        };
        if fanout.in_flight == 0 {
            requests.remove(&request_id);
        }
        copy.map(|_| outcome)
    }

    /// Settle `sends` announced sends that were never made.
    pub async fn abandon(&self, request_id: i64, sends: usize) {
        let mut requests = self.requests.lock().await;
        let Some(fanout) = requests.get_mut(&request_id) else {
            return;
        };
        fanout.in_flight = fanout.in_flight.saturating_sub(sends);
        if fanout.in_flight == 0 && (fanout.outcome.is_some() || fanout.copies.is_empty()) {
            requests.remove(&request_id);
        }
    }

    /// Stop tracking a resolved request and return its delivered copies.
    pub async fn close(&self, request_id: i64, outcome: String) -> Vec<MessageRef> {
        let mut requests = self.requests.lock().await;
        let Some(mut fanout) = requests.remove(&request_id) else {
            return Vec::new();
        };
        let copies = std::mem::take(&mut fanout.copies);
        if fanout.in_flight > 0 {
            fanout.outcome = Some(outcome);
            requests.insert(request_id, fanout);
        }
        copies
    }

    /// Requests with copies or sends still tracked.
    pub async fn tracked(&self) -> usize {
        self.requests.lock().await.len()
    }
}

/// A search query with category and region already mapped to canonical keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub name: String,
    pub category: String,
    pub region: String,
}

/// Split `Name, Category, Region`.
pub fn parse_query(raw: &str) -> Result<(String, String, String), QueryRejection> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [name, category, region] = parts.as_slice() else {
        return Err(QueryRejection::BadFormat);
    };
    for (value, field) in [(name, "name"), (category, "category"), (region, "region")] {
        if value.is_empty() {
            return Err(QueryRejection::MissingField(field));
        }
    }
    Ok((name.to_string(), category.to_string(), region.to_string()))
}

/// Where a query came from and which bot message to answer in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: i32,
    /// Bot message ("Searching...") replaced by the answer.
    pub prompt: Option<MessageRef>,
    pub username: Option<String>,
}

/// The subscriber issuing a moderation command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub chat_id: i64,
    pub username: Option<String>,
    /// Request card whose button was pressed, for callback actions.
    pub card: Option<MessageRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Rejected(QueryRejection),
    Found(CatalogEntry),
    Ambiguous(Vec<CatalogEntry>),
    Queued { request_id: i64, notified: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Decided {
        request: PendingRequest,
        entry: CatalogEntry,
        /// Broadcast copies successfully edited.
        notified: usize,
    },
    Discarded(PendingRequest),
    AlreadyHandled(i64),
    Forbidden,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Access<T> {
    Granted(T),
    Denied,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Updated {
        entry: CatalogEntry,
        /// Concrete-category rows that took over a universal verdict.
        synced: Vec<CatalogEntry>,
    },
    NotFound,
    Rejected(QueryRejection),
}

pub struct Workflow {
    pool: Pool,
    messenger: Arc<dyn Messenger>,
    synonyms: SynonymResolver,
    matching: Matching,
    admin_id: i64,
    fanout: FanoutRegistry,
}

impl Workflow {
    pub fn new(
        pool: Pool,
        messenger: Arc<dyn Messenger>,
        synonyms: SynonymResolver,
        matching: Matching,
        admin_id: i64,
    ) -> Self {
        Self {
            pool,
            messenger,
            synonyms,
            matching,
            admin_id,
            fanout: FanoutRegistry::default(),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn fanout(&self) -> &FanoutRegistry {
        &self.fanout
    }

    pub fn messenger(&self) -> &dyn Messenger {
        self.messenger.as_ref()
    }

    /// The configured admin chat is always Admin, whatever the table says.
    pub async fn role_of(&self, chat_id: i64) -> Result<Role> {
        if chat_id == self.admin_id {
            return Ok(Role::Admin);
        }
        db::role_of(&self.pool, chat_id).await
    }

    pub async fn register(&self, chat_id: i64, username: Option<&str>) -> Result<Role> {
        db::register_subscriber(&self.pool, chat_id, username).await?;
        self.role_of(chat_id).await
    }

    /// Parse a raw query and map category and region to canonical keys.
    pub fn resolve_query(&self, raw: &str) -> Result<Query, QueryRejection> {
        let (name, category, region) = parse_query(raw)?;
        let category = self
            .synonyms
            .category(&category)
            .ok_or(QueryRejection::UnsupportedCategory(category.clone()))?
            .to_string();
        let region = self
            .synonyms
            .region(&region)
            .ok_or(QueryRejection::UnsupportedRegion(region.clone()))?
            .to_string();
        Ok(Query {
            name,
            category,
            region,
        })
    }

    #[instrument(skip_all, fields(chat_id = ctx.chat_id))]
    pub async fn submit_query(&self, ctx: &QueryContext, raw: &str) -> Result<SearchOutcome> {
        let query = match self.resolve_query(raw) {
            Ok(q) => q,
            Err(rejection) => {
                self.answer(ctx, &self.rejection_text(&rejection)).await;
                return Ok(SearchOutcome::Rejected(rejection));
            }
        };

        let outcome = matcher::find_celebrity(
            &self.pool,
            &query.name,
            &query.category,
            &query.region,
            &self.matching,
        )
        .await?;
        match outcome {
            MatchOutcome::Exact(entry) => {
                let text = if self.can_edit(ctx.chat_id).await? {
                    cards::entry_with_id(&entry)
                } else {
                    cards::entry(&entry)
                };
                self.answer(ctx, &text).await;
                Ok(SearchOutcome::Found(entry))
            }
            MatchOutcome::Candidates { tier, entries } => {
                let with_ids = self.can_edit(ctx.chat_id).await?;
                self.answer(ctx, &cards::candidates(&entries, tier, with_ids))
                    .await;
                Ok(SearchOutcome::Ambiguous(entries))
            }
            MatchOutcome::NotFound => {
                let request_id = db::enqueue_request(
                    &self.pool,
                    &NewPendingRequest {
                        user_id: ctx.user_id,
                        chat_id: ctx.chat_id,
                        message_id: ctx.message_id,
                        prompt_message_id: ctx.prompt.map(|p| p.message_id),
                        name: query.name,
                        category: query.category,
                        region: query.region,
                        username: ctx.username.clone(),
                    },
                )
                .await?;
                info!(request_id, "query queued for moderation");
                self.answer(ctx, &cards::queued(request_id)).await;
                let request = db::get_request(&self.pool, request_id)
                    .await?
                    .ok_or_else(|| anyhow!("request {request_id} vanished before broadcast"))?;
                let notified = self.broadcast(&request).await?;
                Ok(SearchOutcome::Queued {
                    request_id,
                    notified,
                })
            }
        }
    }

    /// Send the request card to moderators (with decision buttons),
    /// observers (read-only) and the admin. Returns how many copies were
    /// delivered.
    #[instrument(skip_all, fields(request_id = request.id))]
    pub async fn broadcast(&self, request: &PendingRequest) -> Result<usize> {
        let mut recipients: Vec<(i64, bool)> = vec![(self.admin_id, true)];
        let staff = db::subscribers_with_roles(
            &self.pool,
            &[Role::Admin, Role::Moderator, Role::Observer],
        )
        .await?;
        for s in staff {
            if recipients.iter().all(|(chat_id, _)| *chat_id != s.chat_id) {
                recipients.push((s.chat_id, s.role.allows(Capability::ResolveRequests)));
            }
        }

        let text = cards::request(request);
        let buttons = decision_buttons(request.id);
        self.fanout.begin(request.id, recipients.len()).await;
        let open = db::get_request(&self.pool, request.id)
            .await
            .map(|r| r.is_some());
        if !matches!(open, Ok(true)) {
            self.fanout.abandon(request.id, recipients.len()).await;
            open?;
            info!("request closed before broadcast");
            return Ok(0);
        }
        let sends = recipients.iter().map(|&(chat_id, can_resolve)| {
            let text = &text;
            let buttons: &[Button] = if can_resolve { &buttons } else { &[] };
            async move {
                let sent = self.messenger.send(chat_id, text, buttons).await;
                if let Err(err) = &sent {
                    warn!(?err, chat_id, "failed to deliver request card");
                }
                self.settle(request.id, sent.ok()).await
            }
        });
        let count = join_all(sends).await.into_iter().filter(|&ok| ok).count();
        info!(notified = count, recipients = recipients.len(), "request broadcast");
        Ok(count)
    }

    /// Report a finished send to the fan-out. A copy that landed after the
    /// request was closed is switched to the final card right away.
    async fn settle(&self, request_id: i64, copy: Option<MessageRef>) -> bool {
        let Some(msg) = copy else {
            self.fanout.deliver(request_id, None).await;
            return false;
        };
        if let Some(outcome) = self.fanout.deliver(request_id, Some(msg)).await {
            if let Err(err) = self.messenger.edit(msg, &outcome, &[]).await {
                warn!(?err, chat_id = msg.chat_id, "failed to update late request copy");
            }
        }
        true
    }

    /// Apply a moderator decision. The first caller for a request id wins;
    /// everyone after gets `AlreadyHandled`.
    #[instrument(skip_all, fields(chat_id = actor.chat_id, request_id = action.request_id()))]
    pub async fn resolve(&self, actor: &Actor, action: ModerationAction) -> Result<Resolution> {
        if !self.authorize(actor, Capability::ResolveRequests).await? {
            return Ok(Resolution::Forbidden);
        }
        let request_id = action.request_id();
        let Some(request) = db::dequeue_request(&self.pool, request_id).await? else {
            info!("request already handled");
            self.retire_card(actor, request_id).await;
            return Ok(Resolution::AlreadyHandled(request_id));
        };

        let Some(status) = action.verdict() else {
            let text = cards::discarded(&request, actor.username.as_deref(), actor.chat_id);
            let copies = self.fanout.close(request_id, text.clone()).await;
            self.edit_copies(&copies, &text).await;
            self.notify(actor.chat_id, &format!("Request #{request_id} discarded."))
                .await;
            info!("request discarded");
            return Ok(Resolution::Discarded(request));
        };

        let key = EntryKey::new(&request.name, &request.category, &request.region);
        let entry = match db::insert_entry(&self.pool, &key, status, None).await {
            Ok(entry) => entry,
            Err(err) => {
                self.fanout
                    .close(request_id, cards::already_handled(request_id))
                    .await;
                return Err(err);
            }
        };

        let text = cards::resolved(&request, &entry, actor.username.as_deref(), actor.chat_id);
        let copies = self.fanout.close(request_id, text.clone()).await;
        let notified = self.edit_copies(&copies, &text).await;

        let prompt = request.prompt_message_id.map(|message_id| MessageRef {
            chat_id: request.chat_id,
            message_id,
        });
        self.edit_or_reply(
            prompt,
            request.chat_id,
            request.message_id,
            &cards::answer(&request, &entry),
        )
        .await;
        self.notify(actor.chat_id, &cards::decision_confirmed(&request, &entry))
            .await;
        info!(entry_id = entry.id, status = status.as_str(), "request resolved");
        Ok(Resolution::Decided {
            request,
            entry,
            notified,
        })
    }

    /// Re-send every open request to the actor. Their copies join the
    /// fan-out so a later decision updates them as well.
    #[instrument(skip_all, fields(chat_id = actor.chat_id))]
    pub async fn backlog(&self, actor: &Actor) -> Result<Access<usize>> {
        if !self.authorize(actor, Capability::ViewBacklog).await? {
            return Ok(Access::Denied);
        }
        let requests = db::list_requests(&self.pool).await?;
        if requests.is_empty() {
            self.notify(actor.chat_id, cards::NO_REQUESTS).await;
            return Ok(Access::Granted(0));
        }
        let can_resolve = self
            .role_of(actor.chat_id)
            .await?
            .allows(Capability::ResolveRequests);
        for request in &requests {
            self.fanout.begin(request.id, 1).await;
            let open = db::get_request(&self.pool, request.id)
                .await
                .map(|r| r.is_some());
            if !matches!(open, Ok(true)) {
                self.fanout.abandon(request.id, 1).await;
                open?;
                continue;
            }
            let buttons = if can_resolve {
                backlog_buttons(request.id)
            } else {
                Vec::new()
            };
            let sent = self
                .messenger
                .send(actor.chat_id, &cards::request(request), &buttons)
                .await;
            if let Err(err) = &sent {
                warn!(?err, request_id = request.id, "failed to send backlog card");
            }
            self.settle(request.id, sent.ok()).await;
        }
        Ok(Access::Granted(requests.len()))
    }

    /// Moderator edit of a catalog row. A verdict change on a universal row
    /// is copied onto the concrete-category rows of the same name and
    /// region.
    #[instrument(skip_all, fields(chat_id = actor.chat_id, id = id))]
    pub async fn edit_entry(
        &self,
        actor: &Actor,
        id: i64,
        patch: EntryPatch,
    ) -> Result<Access<EditOutcome>> {
        if !self.authorize(actor, Capability::EditCatalog).await? {
            return Ok(Access::Denied);
        }
        let patch = match self.canonical_patch(patch) {
            Ok(p) => p,
            Err(rejection) => {
                self.notify(actor.chat_id, &self.rejection_text(&rejection))
                    .await;
                return Ok(Access::Granted(EditOutcome::Rejected(rejection)));
            }
        };

        let entry = match db::update_entry_by_id(&self.pool, id, &patch).await {
            Ok(entry) => entry,
            Err(err) => {
                if matches!(
                    err.downcast_ref::<StoreError>(),
                    Some(StoreError::NotFound { .. })
                ) {
                    self.notify(actor.chat_id, &format!("Entry #{id} not found."))
                        .await;
                    return Ok(Access::Granted(EditOutcome::NotFound));
                }
                return Err(err);
            }
        };

        let synced = if entry.is_universal() && patch.touches_verdict() {
            db::sync_status_from_universal(
                &self.pool,
                &entry.region,
                &entry.name,
                entry.status,
                entry.reason.as_deref(),
            )
            .await?
        } else {
            Vec::new()
        };

        let mut text = format!("Updated:\n{}", cards::entry_with_id(&entry));
        if !synced.is_empty() {
            text.push_str(&format!(
                "\nAlso updated {} row(s) in other categories.",
                synced.len()
            ));
        }
        self.notify(actor.chat_id, &text).await;
        info!(synced = synced.len(), "catalog entry edited");
        Ok(Access::Granted(EditOutcome::Updated { entry, synced }))
    }

    fn canonical_patch(&self, mut patch: EntryPatch) -> Result<EntryPatch, QueryRejection> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(QueryRejection::MissingField("name"));
            }
        }
        if let Some(category) = patch.category.take() {
            let canonical = self
                .synonyms
                .category(&category)
                .ok_or(QueryRejection::UnsupportedCategory(category.clone()))?;
            patch.category = Some(canonical.to_string());
        }
        if let Some(region) = patch.region.take() {
            let canonical = self
                .synonyms
                .region(&region)
                .ok_or(QueryRejection::UnsupportedRegion(region.clone()))?;
            patch.region = Some(canonical.to_string());
        }
        Ok(patch)
    }

    #[instrument(skip_all, fields(chat_id = actor.chat_id, id = id))]
    pub async fn delete_entry(&self, actor: &Actor, id: i64) -> Result<Access<bool>> {
        if !self.authorize(actor, Capability::EditCatalog).await? {
            return Ok(Access::Denied);
        }
        let deleted = db::delete_entry_by_id(&self.pool, id).await?;
        let text = if deleted {
            format!("Entry #{id} removed.")
        } else {
            format!("Entry #{id} not found.")
        };
        self.notify(actor.chat_id, &text).await;
        Ok(Access::Granted(deleted))
    }

    /// Send the approved names for a region and category to `chat_id`. An
    /// unknown category is answered with the categories the region has.
    pub async fn approved_names(
        &self,
        chat_id: i64,
        region: &str,
        category: &str,
    ) -> Result<Vec<String>> {
        let Some(region) = self.synonyms.region(region) else {
            let rejection = QueryRejection::UnsupportedRegion(region.to_string());
            self.notify(chat_id, &self.rejection_text(&rejection)).await;
            return Ok(Vec::new());
        };
        let Some(category) = self.synonyms.category(category) else {
            let rejection = QueryRejection::UnsupportedCategory(category.to_string());
            let present = db::categories_by_region(&self.pool, region).await?;
            let choices: Vec<&str> = present
                .iter()
                .map(String::as_str)
                .filter(|c| *c != UNIVERSAL_CATEGORY)
                .collect();
            self.notify(chat_id, &cards::rejection_with_choices(&rejection, &choices))
                .await;
            return Ok(Vec::new());
        };
        let names = db::list_approved(&self.pool, region, category).await?;
        self.notify(chat_id, &cards::approved_list(region, category, &names))
            .await;
        Ok(names)
    }

    pub async fn list_users(&self, actor: &Actor) -> Result<Access<Vec<Subscriber>>> {
        if !self.authorize(actor, Capability::ManageRoles).await? {
            return Ok(Access::Denied);
        }
        let users = db::list_subscribers(&self.pool).await?;
        self.notify(actor.chat_id, &cards::subscribers(&users)).await;
        Ok(Access::Granted(users))
    }

    /// Queue every catalog row for the sheet mirror.
    #[instrument(skip_all, fields(chat_id = actor.chat_id))]
    pub async fn export_catalog(&self, actor: &Actor) -> Result<Access<u64>> {
        if !self.authorize(actor, Capability::ExportCatalog).await? {
            return Ok(Access::Denied);
        }
        let queued = db::requeue_catalog(&self.pool).await?;
        info!(queued, "catalog export queued");
        self.notify(actor.chat_id, &cards::export_queued(queued)).await;
        Ok(Access::Granted(queued))
    }

    /// Admin-only. The Admin role itself is never granted from chat.
    #[instrument(skip_all, fields(chat_id = actor.chat_id, target = chat_id))]
    pub async fn assign_role(
        &self,
        actor: &Actor,
        chat_id: i64,
        role: Role,
    ) -> Result<Access<Subscriber>> {
        if !self.authorize(actor, Capability::ManageRoles).await? {
            return Ok(Access::Denied);
        }
        if role == Role::Admin || chat_id == self.admin_id {
            self.notify(actor.chat_id, "The admin role cannot be changed from chat.")
                .await;
            return Ok(Access::Denied);
        }
        let subscriber = db::set_role(&self.pool, chat_id, role).await?;
        info!(role = role.as_str(), "role assigned");
        self.notify(
            actor.chat_id,
            &format!("{} is now {}.", chat_id, role.as_str()),
        )
        .await;
        self.notify(chat_id, &format!("Your role is now {}.", role.as_str()))
            .await;
        Ok(Access::Granted(subscriber))
    }

    fn rejection_text(&self, rejection: &QueryRejection) -> String {
        let choices = match rejection {
            QueryRejection::UnsupportedCategory(_) => self.synonyms.category_keys(),
            QueryRejection::UnsupportedRegion(_) => self.synonyms.region_keys(),
            QueryRejection::MissingField(_) | QueryRejection::BadFormat => Vec::new(),
        };
        cards::rejection_with_choices(rejection, &choices)
    }

    async fn can_edit(&self, chat_id: i64) -> Result<bool> {
        Ok(self.role_of(chat_id).await?.allows(Capability::EditCatalog))
    }

    /// Take a stale request card out of the actor's chat. Without a card
    /// the actor is told in a new message.
    async fn retire_card(&self, actor: &Actor, request_id: i64) {
        let text = cards::already_handled(request_id);
        let Some(card) = actor.card else {
            self.notify(actor.chat_id, &text).await;
            return;
        };
        if let Err(err) = self.messenger.delete(card).await {
            warn!(?err, chat_id = card.chat_id, "failed to delete stale request card");
            if let Err(err) = self.messenger.edit(card, &text, &[]).await {
                warn!(?err, chat_id = card.chat_id, "failed to update stale request card");
            }
        }
    }

    async fn authorize(&self, actor: &Actor, capability: Capability) -> Result<bool> {
        let allowed = self.role_of(actor.chat_id).await?.allows(capability);
        if !allowed {
            info!(chat_id = actor.chat_id, ?capability, "denied");
            self.notify(actor.chat_id, cards::NOT_ALLOWED).await;
        }
        Ok(allowed)
    }

    async fn answer(&self, ctx: &QueryContext, text: &str) {
        self.edit_or_reply(ctx.prompt, ctx.chat_id, ctx.message_id, text)
            .await;
    }

    /// Put `text` into `prompt`, or reply to the original message when
    /// there is no prompt or it can no longer be edited.
    async fn edit_or_reply(
        &self,
        prompt: Option<MessageRef>,
        chat_id: i64,
        reply_to: i32,
        text: &str,
    ) -> Option<MessageRef> {
        if let Some(prompt) = prompt {
            match self.messenger.edit(prompt, text, &[]).await {
                Ok(()) => return Some(prompt),
                Err(err) => warn!(?err, chat_id, "failed to edit prompt; replying instead"),
            }
        }
        match self.messenger.reply(chat_id, reply_to, text, &[]).await {
            Ok(msg) => Some(msg),
            Err(err) => {
                warn!(?err, chat_id, "failed to answer requester");
                None
            }
        }
    }

    async fn edit_copies(&self, copies: &[MessageRef], text: &str) -> usize {
        let edits = copies
            .iter()
            .map(|&copy| async move { (copy, self.messenger.edit(copy, text, &[]).await) });
        let mut edited = 0;
        for (copy, res) in join_all(edits).await {
            match res {
                Ok(()) => edited += 1,
                Err(err) => warn!(
                    ?err,
                    chat_id = copy.chat_id,
                    message_id = copy.message_id,
                    "failed to update request copy"
                ),
            }
        }
        edited
    }

    async fn notify(&self, chat_id: i64, text: &str) {
        if let Err(err) = self.messenger.send(chat_id, text, &[]).await {
            warn!(?err, chat_id, "failed to notify");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tokens_decode() {
        assert_eq!(
            ModerationAction::decode("approve:42"),
            Some(ModerationAction::Approve(42))
        );
        assert_eq!(
            ModerationAction::decode("ban:7"),
            Some(ModerationAction::Ban(7))
        );
        assert_eq!(
            ModerationAction::decode("delete:3"),
            Some(ModerationAction::Discard(3))
        );
        assert_eq!(ModerationAction::decode("approve:x"), None);
        assert_eq!(ModerationAction::decode("promote:1"), None);
        assert_eq!(ModerationAction::decode("approve"), None);
    }

    #[test]
    fn action_tokens_encode_back() {
        for action in [
            ModerationAction::Approve(1),
            ModerationAction::Ban(2),
            ModerationAction::Discard(3),
        ] {
            assert_eq!(ModerationAction::decode(&action.encode()), Some(action));
        }
        assert_eq!(ModerationAction::Discard(3).verdict(), None);
        assert_eq!(
            ModerationAction::Ban(3).verdict(),
            Some(Status::Forbidden)
        );
    }

    #[test]
    fn query_needs_three_fields() {
        assert_eq!(
            parse_query(" Anna Smith , beauty, italy "),
            Ok(("Anna Smith".into(), "beauty".into(), "italy".into()))
        );
        assert_eq!(parse_query("Anna Smith"), Err(QueryRejection::BadFormat));
        assert_eq!(
            parse_query("a, b, c, d"),
            Err(QueryRejection::BadFormat)
        );
        assert_eq!(
            parse_query(" , beauty, italy"),
            Err(QueryRejection::MissingField("name"))
        );
        assert_eq!(
            parse_query("Anna, beauty, "),
            Err(QueryRejection::MissingField("region"))
        );
    }

    fn copy(chat_id: i64, message_id: i32) -> MessageRef {
        MessageRef {
            chat_id,
            message_id,
        }
    }

    #[tokio::test]
    async fn fanout_close_returns_delivered_copies() {
        let registry = FanoutRegistry::default();
        registry.begin(5, 2).await;
        assert_eq!(registry.deliver(5, Some(copy(1, 10))).await, None);
        assert_eq!(registry.deliver(5, Some(copy(2, 20))).await, None);
        assert_eq!(
            registry.close(5, "done".into()).await,
            vec![copy(1, 10), copy(2, 20)]
        );
        assert!(registry.close(5, "done".into()).await.is_empty());
        assert_eq!(registry.tracked().await, 0);
    }

    #[tokio::test]
    async fn fanout_late_copy_gets_final_card() {
        let registry = FanoutRegistry::default();
        registry.begin(5, 3).await;
        registry.deliver(5, Some(copy(1, 10))).await;
        assert_eq!(registry.close(5, "done".into()).await, vec![copy(1, 10)]);
        assert_eq!(registry.tracked().await, 1);

        assert_eq!(registry.deliver(5, None).await, None);
        assert_eq!(
            registry.deliver(5, Some(copy(2, 20))).await,
            Some("done".to_string())
        );
        assert_eq!(registry.tracked().await, 0);
    }

    #[tokio::test]
    async fn fanout_abandoned_sends_leave_nothing() {
        let registry = FanoutRegistry::default();
        registry.begin(5, 2).await;
        registry.abandon(5, 2).await;
        assert_eq!(registry.tracked().await, 0);

        registry.begin(6, 1).await;
        registry.deliver(6, Some(copy(1, 10))).await;
        registry.begin(6, 1).await;
        registry.abandon(6, 1).await;
        assert_eq!(registry.tracked().await, 1);
    }
}
