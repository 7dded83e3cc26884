//! Process-wide shared state: the session store and auxiliary counters.
//!
//! These are the only pieces of mutable state visible across connection
//! tasks. Everything else (parsed request, context, output buffer) is owned
//! by exactly one task. Both maps are sharded ([`DashMap`]), so access is
//! serialized per key rather than behind one global lock; requests touching
//! different session ids never contend.

use dashmap::DashMap;
use rand::RngCore;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;

/// Name of the session cookie issued to clients.
pub const SESSION_COOKIE: &str = "SESSIONID";

/// Session payload: string keys to arbitrary JSON values.
pub type SessionData = HashMap<String, Value>;

/// Shared map from session id to session data.
///
/// Entries are created on first contact from a client without a valid session
/// cookie and are never expired (eviction/TTL is an extension point). The
/// sandbox is the only writer: it loads a snapshot before the handler runs
/// and commits the whole map back afterwards, last-writer-wins per id.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionData>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the given id was minted by this store.
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Snapshot a session's data. Unknown ids yield an empty map.
    pub fn load(&self, id: &str) -> SessionData {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Register a fresh, empty session under `id`.
    pub fn register(&self, id: &str) {
        self.sessions.insert(id.to_string(), SessionData::new());
    }

    /// Replace the stored data for `id` wholesale.
    ///
    /// The insert is atomic per shard, so two tasks committing the same id
    /// serialize; the later commit wins. Other ids are untouched.
    pub fn commit(&self, id: &str, data: SessionData) {
        self.sessions.insert(id.to_string(), data);
    }

    /// Number of known sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Mint a new session id: 128 bits from the OS-seeded CSPRNG, hex encoded.
pub fn mint_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(32), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Auxiliary cross-request bookkeeping for handlers: named counters plus an
/// arbitrary value container.
///
/// Same concurrency discipline as the session store: access serializes per
/// key, never globally.
#[derive(Default)]
pub struct SharedState {
    counters: DashMap<String, i64>,
    container: DashMap<String, Value>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a named counter and return the new value.
    pub fn increment(&self, key: &str) -> i64 {
        let mut entry = self.counters.entry(key.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Current value of a named counter (0 if never incremented).
    pub fn counter(&self, key: &str) -> i64 {
        self.counters.get(key).map(|v| *v).unwrap_or(0)
    }

    /// Store an arbitrary value in the shared container.
    pub fn put(&self, key: &str, value: Value) {
        self.container.insert(key.to_string(), value);
    }

    /// Fetch a value from the shared container.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.container.get(key).map(|v| v.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minted_ids_are_32_hex_chars_and_unique() {
        let a = mint_session_id();
        let b = mint_session_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn load_returns_snapshot_not_reference() {
        let store = SessionStore::new();
        store.register("abc");
        let mut snap = store.load("abc");
        snap.insert("k".into(), json!(1));
        // mutating the snapshot must not touch the store
        assert!(store.load("abc").is_empty());
        store.commit("abc", snap);
        assert_eq!(store.load("abc").get("k"), Some(&json!(1)));
    }

    #[test]
    fn commit_is_last_writer_wins_per_id() {
        let store = SessionStore::new();
        store.register("a");
        store.register("b");
        let mut first = SessionData::new();
        first.insert("n".into(), json!(1));
        let mut second = SessionData::new();
        second.insert("n".into(), json!(2));
        store.commit("a", first);
        store.commit("a", second);
        assert_eq!(store.load("a").get("n"), Some(&json!(2)));
        assert!(store.load("b").is_empty());
    }

    #[test]
    fn counters_track_per_key() {
        let shared = SharedState::new();
        assert_eq!(shared.increment("hits"), 1);
        assert_eq!(shared.increment("hits"), 2);
        assert_eq!(shared.counter("hits"), 2);
        assert_eq!(shared.counter("misses"), 0);
    }

    #[test]
    fn container_stores_arbitrary_values() {
        let shared = SharedState::new();
        assert_eq!(shared.get("motd"), None);
        shared.put("motd", json!({"text": "hi"}));
        assert_eq!(shared.get("motd"), Some(json!({"text": "hi"})));
    }
}
