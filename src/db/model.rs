//! View models returned by repository queries that do not map onto a
//! domain entity one-to-one.

use crate::model::MirrorTaskKind;

/// A due mirror task as seen by the outbox worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorTask {
    pub id: i64,
    pub kind: MirrorTaskKind,
    pub ref_id: i64,
    pub attempt: i32,
}
