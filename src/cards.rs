//! Plain-text cards shown to requesters and moderators.

use crate::error::QueryRejection;
use crate::matcher::Tier;
use crate::model::{Capability, CatalogEntry, PendingRequest, Role, Subscriber};

pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again later.";

pub const QUERY_FORMAT: &str = "Send a query as: Name, Category, Region\nExample: Anna Smith, beauty, italy";

/// Capitalize the first letter of every word.
pub fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn handle(username: Option<&str>, fallback: i64) -> String {
    match username {
        Some(u) if !u.is_empty() => format!("@{u}"),
        _ => format!("id {fallback}"),
    }
}

pub fn help(role: Role) -> String {
    let mut text = format!(
        "{QUERY_FORMAT}\n\nCommands:\n/search - how to search\n/approved <region>, <category> - approved names"
    );
    if role.allows(Capability::ViewBacklog) {
        text.push_str("\n/requests - open requests");
    }
    if role.allows(Capability::EditCatalog) {
        text.push_str(
            "\n/status <id> <approved|forbidden> [reason]\n/rename <id> <name>\n/move <id> <category>, <region>\n/remove <id>",
        );
    }
    if role.allows(Capability::ManageRoles) {
        text.push_str("\n/users - subscribers\n/role <chat_id> <moderator|observer|user>");
    }
    if role.allows(Capability::ExportCatalog) {
        text.push_str("\n/export - resend the whole catalog to the sheet");
    }
    text
}

pub fn entry(e: &CatalogEntry) -> String {
    let mut text = format!(
        "{}\nCategory: {}\nRegion: {}\nStatus: {}",
        title_case(&e.name),
        e.category,
        title_case(&e.region),
        e.status.label()
    );
    if let Some(reason) = &e.reason {
        text.push_str(&format!("\nReason: {reason}"));
    }
    text
}

pub fn entry_with_id(e: &CatalogEntry) -> String {
    format!("#{} {}", e.id, entry(e))
}

/// Candidate list. `with_ids` prefixes each line with the catalog id for
/// viewers who can edit the catalog.
pub fn candidates(entries: &[CatalogEntry], tier: Tier, with_ids: bool) -> String {
    let heading = match tier {
        Tier::Substring => "No exact match. Did you mean:",
        Tier::Fuzzy => "No exact match. Similar names:",
    };
    let lines = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let id = if with_ids {
                format!("#{} ", e.id)
            } else {
                String::new()
            };
            format!(
                "{}. {id}{} ({}, {}) - {}",
                i + 1,
                title_case(&e.name),
                e.category,
                title_case(&e.region),
                e.status.label()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{heading}\n{lines}")
}

pub fn rejection(r: &QueryRejection) -> String {
    match r {
        QueryRejection::UnsupportedCategory(_) | QueryRejection::UnsupportedRegion(_) => {
            format!("Sorry, {r}.")
        }
        QueryRejection::MissingField(_) | QueryRejection::BadFormat => {
            format!("Invalid query: {r}.\n{QUERY_FORMAT}")
        }
    }
}

/// A rejection followed by the values accepted instead.
pub fn rejection_with_choices(r: &QueryRejection, choices: &[&str]) -> String {
    let mut text = rejection(r);
    if !choices.is_empty() {
        text.push_str(&format!("\nSupported: {}.", choices.join(", ")));
    }
    text
}

pub fn export_queued(count: u64) -> String {
    format!("Queued {count} entries for the sheet.")
}

pub fn queued(request_id: i64) -> String {
    format!("Nothing found yet. Request #{request_id} was sent to moderators, you will get the answer here.")
}

pub fn request(req: &PendingRequest) -> String {
    format!(
        "Request #{}\nName: {}\nCategory: {}\nRegion: {}\nFrom: {}",
        req.id,
        title_case(&req.name),
        req.category,
        title_case(&req.region),
        handle(req.username.as_deref(), req.user_id)
    )
}

pub fn resolved(req: &PendingRequest, entry: &CatalogEntry, moderator: Option<&str>, moderator_id: i64) -> String {
    format!(
        "Request #{} resolved: {}\nEntry: #{}\nName: {}\nCategory: {}\nRegion: {}\nFrom: {}\nBy: {}",
        req.id,
        entry.status.label(),
        entry.id,
        title_case(&entry.name),
        entry.category,
        title_case(&entry.region),
        handle(req.username.as_deref(), req.user_id),
        handle(moderator, moderator_id)
    )
}

pub fn answer(req: &PendingRequest, entry: &CatalogEntry) -> String {
    format!("Answer to request #{}:\n{}", req.id, self::entry(entry))
}

pub fn discarded(req: &PendingRequest, moderator: Option<&str>, moderator_id: i64) -> String {
    format!(
        "Request #{} discarded\nName: {}\nBy: {}",
        req.id,
        title_case(&req.name),
        handle(moderator, moderator_id)
    )
}

pub fn decision_confirmed(req: &PendingRequest, entry: &CatalogEntry) -> String {
    format!(
        "Saved: {} is {} (entry #{}).",
        title_case(&req.name),
        entry.status.label(),
        entry.id
    )
}

pub fn already_handled(request_id: i64) -> String {
    format!("Request #{request_id} was already handled.")
}

pub const NOT_ALLOWED: &str = "You are not allowed to do that.";

pub const NO_REQUESTS: &str = "No open requests.";

pub fn approved_list(region: &str, category: &str, names: &[String]) -> String {
    if names.is_empty() {
        return format!("No approved names for {category} in {}.", title_case(region));
    }
    let lines = names
        .iter()
        .map(|n| format!("- {}", title_case(n)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Approved for {category} in {}:\n{lines}", title_case(region))
}

pub fn subscribers(list: &[Subscriber]) -> String {
    if list.is_empty() {
        return "No subscribers.".to_string();
    }
    list.iter()
        .map(|s| format!("{} {} - {}", s.chat_id, handle(s.username.as_deref(), s.chat_id), s.role.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("anna smith"), "Anna Smith");
        assert_eq!(title_case("пётр"), "Пётр");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn entry_card_shows_reason_only_when_present() {
        let mut e = CatalogEntry {
            id: 7,
            name: "jhon doe".into(),
            normalized_name: String::new(),
            ascii_name: String::new(),
            category: "beauty".into(),
            region: "italy".into(),
            status: Status::Approved,
            reason: None,
        };
        assert!(!entry(&e).contains("Reason"));
        e.status = Status::Forbidden;
        e.reason = Some("scandal".into());
        let text = entry_with_id(&e);
        assert!(text.starts_with("#7 Jhon Doe"));
        assert!(text.contains("Reason: scandal"));
    }

    #[test]
    fn candidate_ids_only_for_editors() {
        let e = CatalogEntry {
            id: 12,
            name: "anna smith".into(),
            normalized_name: String::new(),
            ascii_name: String::new(),
            category: "beauty".into(),
            region: "italy".into(),
            status: Status::Approved,
            reason: None,
        };
        let plain = candidates(std::slice::from_ref(&e), Tier::Fuzzy, false);
        assert!(plain.contains("1. Anna Smith (beauty, Italy)"));
        assert!(!plain.contains("#12"));
        let with_ids = candidates(&[e], Tier::Fuzzy, true);
        assert!(with_ids.contains("1. #12 Anna Smith"));
    }

    #[test]
    fn help_grows_with_role() {
        assert!(!help(Role::User).contains("/requests"));
        assert!(help(Role::Observer).contains("/requests"));
        assert!(!help(Role::Moderator).contains("/role"));
        assert!(help(Role::Admin).contains("/role"));
        assert!(!help(Role::Moderator).contains("/export"));
        assert!(help(Role::Admin).contains("/export"));
    }
}
