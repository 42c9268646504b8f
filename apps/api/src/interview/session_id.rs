//! Session identifiers and the non-persisted marker.
//!
//! When the store rejects a new session, the caller still receives the session,
//! under `temp_<id>`. Completion strips the marker and retries the lookup on the
//! underlying id. Both directions go through this module only.

use uuid::Uuid;

const TEMPORARY_PREFIX: &str = "temp_";

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Marks an identifier as belonging to a session that was never stored.
/// Applying it to an already-marked id is a no-op.
pub fn to_temporary_id(session_id: &str) -> String {
    if is_temporary(session_id) {
        session_id.to_string()
    } else {
        format!("{TEMPORARY_PREFIX}{session_id}")
    }
}

/// Returns the underlying identifier of a marked id, or `None` for a normal id.
pub fn from_temporary_id(session_id: &str) -> Option<&str> {
    session_id
        .strip_prefix(TEMPORARY_PREFIX)
        .filter(|rest| !rest.is_empty())
}

pub fn is_temporary(session_id: &str) -> bool {
    from_temporary_id(session_id).is_some()
}
