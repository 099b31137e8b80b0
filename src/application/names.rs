//! In-process name caches backing the typeahead endpoints.
//!
//! Agent and submolt names are fetched from the remote at most once per TTL
//! window and filtered locally per keystroke. A failed refresh keeps serving
//! the stale list instead of breaking the typeahead.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::warn;

use crate::infra::api::ApiError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
const TYPEAHEAD_LIMIT: usize = 15;

#[derive(Default)]
struct State {
    names: Vec<String>,
    refreshed_at: Option<Instant>,
}

pub struct NameCache {
    label: &'static str,
    ttl: Duration,
    state: RwLock<State>,
}

impl NameCache {
    pub fn new(label: &'static str, ttl: Duration) -> Self {
        Self {
            label,
            ttl,
            state: RwLock::new(State::default()),
        }
    }

    /// Current name list, refreshing through `fetch` when the TTL expired.
    pub async fn names<F, Fut>(&self, fetch: F) -> Vec<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, ApiError>>,
    {
        {
            let state = self.state.read().await;
            if let Some(refreshed_at) = state.refreshed_at
                && refreshed_at.elapsed() < self.ttl
                && !state.names.is_empty()
            {
                return state.names.clone();
            }
        }

        match fetch().await {
            Ok(fetched) => {
                let mut names: Vec<String> = Vec::with_capacity(fetched.len());
                for name in fetched {
                    if !name.is_empty() && !names.contains(&name) {
                        names.push(name);
                    }
                }
                let mut state = self.state.write().await;
                state.names = names.clone();
                state.refreshed_at = Some(Instant::now());
                names
            }
            Err(err) => {
                warn!(
                    target: "moltchat::names",
                    cache = self.label,
                    error = %err,
                    "name cache refresh failed, serving stale list"
                );
                self.state.read().await.names.clone()
            }
        }
    }

    /// Case-insensitive typeahead matches, capped at 15. Prefix matches rank
    /// ahead of plain substring matches; source order is kept within each
    /// group.
    pub async fn matches<F, Fut>(&self, query: &str, fetch: F) -> Vec<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, ApiError>>,
    {
        if query.is_empty() {
            return Vec::new();
        }
        let query = query.to_lowercase();
        let mut prefixed = Vec::new();
        let mut contained = Vec::new();
        for name in self.names(fetch).await {
            let lower = name.to_lowercase();
            if lower.starts_with(&query) {
                prefixed.push(name);
            } else if lower.contains(&query) {
                contained.push(name);
            }
        }
        prefixed.extend(contained);
        prefixed.truncate(TYPEAHEAD_LIMIT);
        prefixed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn counted_fetch(
        counter: &Arc<AtomicUsize>,
        names: Vec<&str>,
    ) -> impl Future<Output = Result<Vec<String>, ApiError>> {
        let counter = Arc::clone(counter);
        let names: Vec<String> = names.into_iter().map(str::to_string).collect();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(names)
        }
    }

    #[tokio::test]
    async fn second_call_within_ttl_skips_fetch() {
        let cache = NameCache::new("agents", Duration::from_secs(300));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.names(|| counted_fetch(&calls, vec!["alice", "bob"])).await;
        let second = cache.names(|| counted_fetch(&calls, vec!["other"])).await;

        assert_eq!(first, vec!["alice", "bob"]);
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_ttl_refetches() {
        let cache = NameCache::new("agents", Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.names(|| counted_fetch(&calls, vec!["alice"])).await;
        cache.names(|| counted_fetch(&calls, vec!["bob"])).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_serves_stale_list() {
        let cache = NameCache::new("agents", Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.names(|| counted_fetch(&calls, vec!["alice"])).await;
        let stale = cache
            .names(|| async { Err(ApiError::Timeout) })
            .await;

        assert_eq!(stale, vec!["alice"]);
    }

    #[tokio::test]
    async fn matches_filter_case_insensitively() {
        let cache = NameCache::new("agents", Duration::from_secs(300));
        let calls = Arc::new(AtomicUsize::new(0));

        let matches = cache
            .matches("AL", || counted_fetch(&calls, vec!["alice", "bob", "salty"]))
            .await;
        assert_eq!(matches, vec!["alice", "salty"]);

        let empty = cache
            .matches("", || counted_fetch(&calls, vec!["alice"]))
            .await;
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn prefix_matches_rank_ahead_of_substring_matches() {
        let cache = NameCache::new("agents", Duration::from_secs(300));
        let calls = Arc::new(AtomicUsize::new(0));

        let matches = cache
            .matches("al", || counted_fetch(&calls, vec!["salty", "alice", "bob"]))
            .await;
        assert_eq!(matches, vec!["alice", "salty"]);
    }

    #[tokio::test]
    async fn duplicate_names_collapse() {
        let cache = NameCache::new("agents", Duration::from_secs(300));
        let calls = Arc::new(AtomicUsize::new(0));

        let names = cache
            .names(|| counted_fetch(&calls, vec!["alice", "alice", "bob"]))
            .await;
        assert_eq!(names, vec!["alice", "bob"]);
    }
}
