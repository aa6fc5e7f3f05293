//! Database module: pool setup, migrations and per-table repositories.
//!
//! - `repo`: pool construction, migrations and the mirror outbox queue.
//! - `catalog`: celebrity catalog rows and the lookups used by the matcher.
//! - `requests`: pending moderation requests.
//! - `subscribers`: chats known to the bot and their roles.
//! - `model`: view models returned by the outbox queries.
//!
//! Callers import everything from `celebcheck::db`.

pub mod catalog;
pub mod model;
pub mod repo;
pub mod requests;
pub mod subscribers;

pub use catalog::*;
pub use repo::*;
pub use requests::*;
pub use subscribers::*;

pub use model::MirrorTask;
