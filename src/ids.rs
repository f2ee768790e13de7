use uuid::Uuid;

/// Returns a fresh opaque id for counters, log entries and sessions.
///
/// Random v4 UUIDs: collisions are not a practical concern for a single
/// user's local collection, and nothing relies on the ids being unguessable.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
