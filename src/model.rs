use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category value that matches every requested category.
pub const UNIVERSAL_CATEGORY: &str = "all";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Approved,
    Forbidden,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Approved => "approved",
            Status::Forbidden => "forbidden",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "approved" | "approve" => Some(Status::Approved),
            "forbidden" | "ban" | "banned" => Some(Status::Forbidden),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Approved => "Approved ✅",
            Status::Forbidden => "Forbidden ⛔",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    Observer,
    #[default]
    User,
}

/// Things a subscriber may be allowed to do through the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReceiveBroadcast,
    ViewBacklog,
    ResolveRequests,
    EditCatalog,
    ManageRoles,
    ExportCatalog,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Observer => "observer",
            Role::User => "user",
        }
    }

    pub fn parse_role(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "moderator" => Some(Role::Moderator),
            "observer" => Some(Role::Observer),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    /// The single role gate used by every privileged code path.
    pub fn allows(&self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Admin => true,
            Role::Moderator => matches!(
                capability,
                ReceiveBroadcast | ViewBacklog | ResolveRequests | EditCatalog
            ),
            Role::Observer => matches!(capability, ReceiveBroadcast | ViewBacklog),
            Role::User => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub ascii_name: String,
    pub category: String,
    pub region: String,
    pub status: Status,
    pub reason: Option<String>,
}

impl CatalogEntry {
    pub fn is_universal(&self) -> bool {
        self.category == UNIVERSAL_CATEGORY
    }
}

/// The natural key of a catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKey {
    pub name: String,
    pub category: String,
    pub region: String,
}

impl EntryKey {
    pub fn new(name: &str, category: &str, region: &str) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            category: category.trim().to_lowercase(),
            region: region.trim().to_lowercase(),
        }
    }
}

/// Partial update of a catalog row. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
    pub status: Option<Status>,
    pub reason: Option<Option<String>>,
}

impl EntryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(Some(reason.into()));
        self
    }

    pub fn clear_reason(mut self) -> Self {
        self.reason = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.region.is_none()
            && self.status.is_none()
            && self.reason.is_none()
    }

    /// True when the patch changes the verdict rather than the identity.
    pub fn touches_verdict(&self) -> bool {
        self.status.is_some() || self.reason.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: i32,
    pub prompt_message_id: Option<i32>,
    pub name: String,
    pub category: String,
    pub region: String,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPendingRequest {
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: i32,
    pub prompt_message_id: Option<i32>,
    pub name: String,
    pub category: String,
    pub region: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscriber {
    pub chat_id: i64,
    pub username: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MirrorTaskKind {
    PushEntry,
    ClearEntry,
}

impl MirrorTaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorTaskKind::PushEntry => "push_entry",
            MirrorTaskKind::ClearEntry => "clear_entry",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "push_entry" => Some(MirrorTaskKind::PushEntry),
            "clear_entry" => Some(MirrorTaskKind::ClearEntry),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_capabilities() {
        assert!(Role::Admin.allows(Capability::ManageRoles));
        assert!(Role::Moderator.allows(Capability::ResolveRequests));
        assert!(!Role::Moderator.allows(Capability::ManageRoles));
        assert!(Role::Observer.allows(Capability::ReceiveBroadcast));
        assert!(!Role::Observer.allows(Capability::ResolveRequests));
        assert!(!Role::User.allows(Capability::ViewBacklog));
    }

    #[test]
    fn status_parsing_accepts_aliases() {
        assert_eq!(Status::parse_status("Approved"), Some(Status::Approved));
        assert_eq!(Status::parse_status("ban"), Some(Status::Forbidden));
        assert_eq!(Status::parse_status("maybe"), None);
    }

    #[test]
    fn patch_builder() {
        let patch = EntryPatch::new().status(Status::Forbidden).reason("scandal");
        assert!(patch.touches_verdict());
        assert_eq!(patch.reason, Some(Some("scandal".to_string())));
        assert!(EntryPatch::new().is_empty());
    }
}
