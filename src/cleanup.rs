//! Background sweep of expired in-memory session records.
//!
//! Redis expires `session:{token}` keys on its own; the in-memory store
//! has no TTLs, so this loop periodically drops records past their expiry.

use crate::storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

/// Run the sweep loop forever, every `interval`.
pub async fn run_session_sweep(store: Arc<MemoryStore>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        sweep_once(&store);
    }
}

/// Purge expired records once. Returns the number of sessions removed.
pub fn sweep_once(store: &MemoryStore) -> usize {
    let removed = store.purge_expired();
    if removed > 0 {
        tracing::info!(
            action = "session_sweep",
            removed,
            remaining = store.session_count(),
            "Expired sessions purged"
        );
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::models::StoredSession;

    fn session(token: &str, expires_at: i64) -> StoredSession {
        StoredSession {
            token: token.to_string(),
            pk_hash: "h".to_string(),
            created_at: 0,
            expires_at,
        }
    }

    #[test]
    fn test_sweep_once() {
        let clock = Arc::new(ManualClock::new(100));
        let store = MemoryStore::new(clock.clone());
        store.store_session(session("old", 150));
        store.store_session(session("new", 500));

        assert_eq!(sweep_once(&store), 0);

        clock.set(151);
        assert_eq!(sweep_once(&store), 1);
        assert_eq!(store.session_count(), 1);
        assert!(store.session_exists("new"));
    }

    #[tokio::test]
    async fn test_sweep_loop_runs_on_interval() {
        let clock = Arc::new(ManualClock::new(100));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        store.store_session(session("old", 150));
        clock.set(200);

        let handle = tokio::spawn(run_session_sweep(store.clone(), Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.session_count(), 0);
        handle.abort();
    }
}
