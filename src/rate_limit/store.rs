//! Window Store
//!
//! In-memory map from scope key to its window. Each window sits behind its own
//! mutex; the map lock is only held to look a window up or insert it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::window::{Scope, ScopeKey, Window};

/// Shared handle to one window
pub type WindowHandle = Arc<Mutex<Window>>;

/// Lock a window, recovering from poisoning
pub(crate) fn lock_window(handle: &WindowHandle) -> MutexGuard<'_, Window> {
    handle.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory window store
#[derive(Debug, Clone, Default)]
pub struct WindowStore {
    windows: Arc<RwLock<HashMap<ScopeKey, WindowHandle>>>,
}

impl WindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the window for `key`
    pub async fn get_or_create(&self, key: &ScopeKey, now: Instant) -> WindowHandle {
        if let Some(handle) = self.windows.read().await.get(key) {
            return Arc::clone(handle);
        }

        let mut windows = self.windows.write().await;
        Arc::clone(
            windows
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Window::new(now)))),
        )
    }

    /// Get the window for `key` if it exists
    pub async fn get(&self, key: &ScopeKey) -> Option<WindowHandle> {
        self.windows.read().await.get(key).cloned()
    }

    /// Drop expired windows that no request currently holds
    ///
    /// Returns the number of windows removed.
    pub async fn prune<F>(&self, now: Instant, window_len: F) -> usize
    where
        F: Fn(Scope) -> Duration,
    {
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|key, handle| {
            Arc::strong_count(handle) > 1
                || !lock_window(handle).is_expired(now, window_len(key.scope))
        });
        before - windows.len()
    }

    /// Number of tracked windows in a scope
    pub async fn count_scope(&self, scope: Scope) -> usize {
        self.windows
            .read()
            .await
            .keys()
            .filter(|k| k.scope == scope)
            .count()
    }

    /// Total number of tracked windows
    pub async fn len(&self) -> usize {
        self.windows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.windows.read().await.is_empty()
    }

    /// Snapshot of every key with its current count
    pub async fn snapshot(&self) -> Vec<(ScopeKey, u32)> {
        let windows = self.windows.read().await;
        let mut entries: Vec<_> = windows
            .iter()
            .map(|(k, h)| (k.clone(), lock_window(h).count()))
            .collect();
        entries.sort();
        entries
    }

    /// Clear all windows
    pub async fn clear(&self) {
        self.windows.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_returns_same_window() {
        let store = WindowStore::new();
        let now = Instant::now();
        let key = ScopeKey::source("198.51.100.1");

        let a = store.get_or_create(&key, now).await;
        lock_window(&a).increment();
        let b = store.get_or_create(&key, now).await;

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(lock_window(&b).count(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_count_scope() {
        let store = WindowStore::new();
        let now = Instant::now();
        store.get_or_create(&ScopeKey::global(), now).await;
        store.get_or_create(&ScopeKey::source("a"), now).await;
        store.get_or_create(&ScopeKey::source("b"), now).await;
        store.get_or_create(&ScopeKey::credential("k"), now).await;

        assert_eq!(store.count_scope(Scope::Source).await, 2);
        assert_eq!(store.count_scope(Scope::Credential).await, 1);
    }

    #[tokio::test]
    async fn test_prune_keeps_live_and_held_windows() {
        let store = WindowStore::new();
        let t0 = Instant::now();
        let len = Duration::from_secs(60);

        store.get_or_create(&ScopeKey::source("old"), t0).await;
        let held = store.get_or_create(&ScopeKey::source("held"), t0).await;
        store
            .get_or_create(&ScopeKey::source("fresh"), t0 + len)
            .await;

        let removed = store.prune(t0 + len, |_| len).await;
        assert_eq!(removed, 1);
        assert!(store.get(&ScopeKey::source("old")).await.is_none());
        assert!(store.get(&ScopeKey::source("fresh")).await.is_some());
        assert!(store.get(&ScopeKey::source("held")).await.is_some());
        drop(held);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = WindowStore::new();
        store
            .get_or_create(&ScopeKey::global(), Instant::now())
            .await;
        store.clear().await;
        assert!(store.is_empty().await);
    }
}
