// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Memoized model loading
//!
//! Loading weights is expensive, so each distinct `(model path, GPU layers)`
//! pair is loaded at most once. The cache stores the load *operation* rather
//! than its result: a caller arriving while a load is still running awaits
//! the same shared future instead of starting another load.
//!
//! A failed load removes its entry before any waiter observes the error, so
//! the next `acquire` starts a fresh load. Tasks already waiting all receive
//! the same failure. Successful loads are kept for the life of the cache.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::error::Result;
use crate::llm::runtime::NativeModel;

/// Identity of a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub model_path: PathBuf,
    pub gpu_layers: u32,
}

impl Fingerprint {
    pub fn new(model_path: impl Into<PathBuf>, gpu_layers: u32) -> Self {
        Self {
            model_path: model_path.into(),
            gpu_layers,
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

type PendingLoad<M> = Shared<BoxFuture<'static, Result<M>>>;
type Entries<M> = Arc<Mutex<HashMap<Fingerprint, PendingLoad<M>>>>;

/// Cache of in-flight or completed model loads, keyed by [`Fingerprint`]
pub struct ModelCache<M> {
    entries: Entries<M>,
}

/// Model cache holding runtime models
pub type NativeModelCache = ModelCache<Arc<dyn NativeModel>>;

static PROCESS_CACHE: OnceLock<Arc<NativeModelCache>> = OnceLock::new();

/// The process-wide model cache used by clients that are not given one.
pub fn process_cache() -> Arc<NativeModelCache> {
    PROCESS_CACHE
        .get_or_init(|| Arc::new(ModelCache::new()))
        .clone()
}

impl<M> Default for ModelCache<M>
where
    M: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ModelCache<M>
where
    M: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the model for `fingerprint`, calling `loader` only if no load for
    /// it is cached.
    ///
    /// `loader` runs while the cache lock is held and must only construct
    /// the load future; the actual work happens when the future is polled.
    pub async fn acquire<F, Fut>(&self, fingerprint: &Fingerprint, loader: F) -> Result<M>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<M>> + Send + 'static,
    {
        let pending = {
            let mut entries = lock_entries(&self.entries);
            match entries.get(fingerprint) {
                Some(existing) => {
                    tracing::debug!(
                        model_path = %fingerprint.model_path.display(),
                        gpu_layers = fingerprint.gpu_layers,
                        "Model cache hit"
                    );
                    existing.clone()
                }
                None => {
                    tracing::debug!(
                        model_path = %fingerprint.model_path.display(),
                        gpu_layers = fingerprint.gpu_layers,
                        "Model cache miss, starting load"
                    );
                    let pending = self.track(fingerprint.clone(), loader());
                    entries.insert(fingerprint.clone(), pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Wrap a load so a failure evicts its own entry before it is reported.
    fn track<Fut>(&self, fingerprint: Fingerprint, load: Fut) -> PendingLoad<M>
    where
        Fut: Future<Output = Result<M>> + Send + 'static,
    {
        let entries = Arc::downgrade(&self.entries);
        async move {
            let result = load.await;
            match &result {
                Ok(_) => tracing::info!(
                    model_path = %fingerprint.model_path.display(),
                    gpu_layers = fingerprint.gpu_layers,
                    "Model loaded"
                ),
                Err(e) => {
                    if let Some(entries) = entries.upgrade() {
                        lock_entries(&entries).remove(&fingerprint);
                    }
                    tracing::warn!(
                        model_path = %fingerprint.model_path.display(),
                        gpu_layers = fingerprint.gpu_layers,
                        error = %e,
                        "Model load failed, entry evicted"
                    );
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Whether an entry (pending or loaded) exists for `fingerprint`
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        lock_entries(&self.entries).contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        lock_entries(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_entries<M>(
    entries: &Mutex<HashMap<Fingerprint, PendingLoad<M>>>,
) -> MutexGuard<'_, HashMap<Fingerprint, PendingLoad<M>>> {
    match entries.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Model cache lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LocalChatError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn load_error(fingerprint: &Fingerprint) -> LocalChatError {
        LocalChatError::ModelLoad {
            model_path: fingerprint.model_path.clone(),
            gpu_layers: fingerprint.gpu_layers,
            message: "missing weights".to_string(),
        }
    }

    #[tokio::test]
    async fn test_acquire_loads_once_for_sequential_calls() {
        let cache: ModelCache<Arc<String>> = ModelCache::new();
        let fingerprint = Fingerprint::new("/models/a.gguf", 0);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let model = cache
                .acquire(&fingerprint, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new("model-a".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(model.as_str(), "model-a");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&fingerprint));
    }

    #[tokio::test]
    async fn test_concurrent_acquire_shares_one_load() {
        let cache: Arc<ModelCache<Arc<String>>> = Arc::new(ModelCache::new());
        let fingerprint = Fingerprint::new("/models/a.gguf", 12);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            let fingerprint = fingerprint.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .acquire(&fingerprint, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Arc::new("shared".to_string()))
                    })
                    .await
            }));
        }

        let mut models = Vec::new();
        for handle in handles {
            models.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(models.iter().all(|m| Arc::ptr_eq(m, &models[0])));
    }

    #[tokio::test]
    async fn test_distinct_fingerprints_load_separately() {
        let cache: ModelCache<Arc<String>> = ModelCache::new();
        let cpu = Fingerprint::new("/models/a.gguf", 0);
        let gpu = Fingerprint::new("/models/a.gguf", 32);

        let a = cache
            .acquire(&cpu, || async { Ok(Arc::new("cpu".to_string())) })
            .await
            .unwrap();
        let b = cache
            .acquire(&gpu, || async { Ok(Arc::new("gpu".to_string())) })
            .await
            .unwrap();

        assert_eq!(a.as_str(), "cpu");
        assert_eq!(b.as_str(), "gpu");
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_evicts_entry_and_allows_retry() {
        let cache: ModelCache<Arc<String>> = ModelCache::new();
        let fingerprint = Fingerprint::new("/models/broken.gguf", 4);

        let err = cache
            .acquire(&fingerprint, {
                let fingerprint = fingerprint.clone();
                move || async move { Err::<Arc<String>, _>(load_error(&fingerprint)) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LocalChatError::ModelLoad { .. }));
        assert!(!cache.contains(&fingerprint));
        assert!(cache.is_empty());

        let model = cache
            .acquire(&fingerprint, || async { Ok(Arc::new("fixed".to_string())) })
            .await
            .unwrap();
        assert_eq!(model.as_str(), "fixed");
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_failure() {
        let cache: Arc<ModelCache<Arc<String>>> = Arc::new(ModelCache::new());
        let fingerprint = Fingerprint::new("/models/broken.gguf", 0);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            let fingerprint = fingerprint.clone();
            handles.push(tokio::spawn(async move {
                let err_fingerprint = fingerprint.clone();
                cache
                    .acquire(&fingerprint, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Err::<Arc<String>, _>(load_error(&err_fingerprint))
                    })
                    .await
            }));
        }

        let mut errors = Vec::new();
        for handle in handles {
            errors.push(handle.await.unwrap().unwrap_err());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(errors.iter().all(|e| *e == errors[0]));
        assert!(!cache.contains(&fingerprint));
    }

    #[test]
    fn test_process_cache_is_shared() {
        assert!(Arc::ptr_eq(&process_cache(), &process_cache()));
    }
}
