//! Deferred, keyed multi-value caches
//!
//! A [`LazyMultimap`] is built with a frozen key set and a loader. The first
//! read of any key runs the loader once for the whole key set; every later
//! read is served from memory. A failed load poisons the instance: later reads
//! return the same error instead of retrying with partial state.

use crate::domain::{CourierError, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Map from key to zero or more values
#[derive(Debug, Clone, PartialEq)]
pub struct Multimap<K: Eq + Hash, V> {
    inner: HashMap<K, Vec<V>>,
}

impl<K: Eq + Hash, V> Multimap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Group `items` by the key `key_of` extracts, preserving item order per key
    pub fn group<I, F>(items: I, key_of: F) -> Self
    where
        I: IntoIterator<Item = V>,
        F: Fn(&V) -> K,
    {
        let mut map = Self::new();
        for item in items {
            map.insert(key_of(&item), item);
        }
        map
    }

    /// Like [`Multimap::group`], for values referenced by several keys
    pub fn group_many<I, F, KI>(items: I, keys_of: F) -> Self
    where
        I: IntoIterator<Item = V>,
        F: Fn(&V) -> KI,
        KI: IntoIterator<Item = K>,
        V: Clone,
    {
        let mut map = Self::new();
        for item in items {
            for key in keys_of(&item) {
                map.insert(key, item.clone());
            }
        }
        map
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.inner.entry(key).or_default().push(value);
    }

    /// Values for `key`; empty when the key is unknown
    pub fn get(&self, key: &K) -> &[V] {
        self.inner.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Total number of values across all keys
    pub fn value_count(&self) -> usize {
        self.inner.values().map(Vec::len).sum()
    }
}

impl<K: Eq + Hash, V> Default for Multimap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Batch loader for a [`LazyMultimap`]
///
/// Implementations must query the whole key set at once.
#[async_trait]
pub trait MultimapLoader<K, V>: Send + Sync
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + 'static,
{
    async fn load(&self, keys: &[K]) -> Result<Multimap<K, V>>;
}

#[async_trait]
impl<K, V, F> MultimapLoader<K, V> for F
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(Vec<K>) -> BoxFuture<'static, Result<Multimap<K, V>>> + Send + Sync,
{
    async fn load(&self, keys: &[K]) -> Result<Multimap<K, V>> {
        (self)(keys.to_vec()).await
    }
}

enum LoadState<K: Eq + Hash, V> {
    Unloaded,
    Loaded(Multimap<K, V>),
    Failed(String),
    Cleared,
}

/// Deferred multi-value cache over a frozen key set
///
/// # Example
///
/// ```
/// use courier::core::batch::{LazyMultimap, Multimap};
/// use futures::FutureExt;
///
/// # async fn example() -> courier::domain::Result<()> {
/// let tags = LazyMultimap::new(vec![1_i64, 2], |keys: Vec<i64>| {
///     async move {
///         Ok::<_, courier::domain::CourierError>(Multimap::group(
///             keys.into_iter().map(|k| (k, format!("tag-{k}"))),
///             |(k, _)| *k,
///         ))
///     }
///     .boxed()
/// });
///
/// assert_eq!(tags.get(&1).await?.len(), 1);
/// assert!(tags.get(&3).await?.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct LazyMultimap<K: Eq + Hash, V> {
    keys: Vec<K>,
    loader: Arc<dyn MultimapLoader<K, V>>,
    state: Mutex<LoadState<K, V>>,
}

impl<K, V> LazyMultimap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    /// Freeze `keys` (duplicates dropped, first occurrence order kept)
    pub fn new<I, L>(keys: I, loader: L) -> Self
    where
        I: IntoIterator<Item = K>,
        L: MultimapLoader<K, V> + 'static,
    {
        Self::with_loader(keys, Arc::new(loader))
    }

    pub fn with_loader<I>(keys: I, loader: Arc<dyn MultimapLoader<K, V>>) -> Self
    where
        I: IntoIterator<Item = K>,
    {
        let mut seen = HashSet::new();
        let keys = keys
            .into_iter()
            .filter(|k| seen.insert(k.clone()))
            .collect();

        Self {
            keys,
            loader,
            state: Mutex::new(LoadState::Unloaded),
        }
    }

    /// The frozen key set
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Values for `key`, loading the whole key set on first use
    ///
    /// # Errors
    ///
    /// Returns [`CourierError::DataLoad`] when the load fails (now or on an
    /// earlier call) or the map was cleared.
    pub async fn get(&self, key: &K) -> Result<Vec<V>> {
        let mut state = self.state.lock().await;
        self.materialize(&mut state).await?;
        match &*state {
            LoadState::Loaded(map) => Ok(map.get(key).to_vec()),
            _ => Err(CourierError::DataLoad("lazy map is not loaded".to_string())),
        }
    }

    /// Whether `key` has at least one value
    pub async fn contains_key(&self, key: &K) -> Result<bool> {
        Ok(!self.get(key).await?.is_empty())
    }

    /// Force the load without reading a key
    pub async fn ensure_loaded(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.materialize(&mut state).await
    }

    /// True once the loader has completed successfully
    pub fn is_loaded(&self) -> bool {
        match self.state.try_lock() {
            Ok(state) => matches!(*state, LoadState::Loaded(_)),
            Err(_) => false,
        }
    }

    /// Release the cached values and the key set. Idempotent; the instance
    /// cannot be reloaded afterwards.
    pub fn clear(&mut self) {
        self.keys = Vec::new();
        *self.state.get_mut() = LoadState::Cleared;
    }

    async fn materialize(&self, state: &mut LoadState<K, V>) -> Result<()> {
        match state {
            LoadState::Loaded(_) => Ok(()),
            LoadState::Failed(message) => Err(CourierError::DataLoad(message.clone())),
            LoadState::Cleared => Err(CourierError::DataLoad(
                "lazy map was cleared and cannot be reloaded".to_string(),
            )),
            LoadState::Unloaded => {
                if self.keys.is_empty() {
                    *state = LoadState::Loaded(Multimap::new());
                    return Ok(());
                }

                match self.loader.load(&self.keys).await {
                    Ok(map) => {
                        tracing::trace!(
                            keys = self.keys.len(),
                            values = map.value_count(),
                            "Lazy map loaded"
                        );
                        *state = LoadState::Loaded(map);
                        Ok(())
                    }
                    Err(CourierError::OutOfMemory(message)) => {
                        *state = LoadState::Failed(message.clone());
                        Err(CourierError::OutOfMemory(message))
                    }
                    Err(CourierError::Cancelled) => {
                        *state = LoadState::Failed("load cancelled".to_string());
                        Err(CourierError::Cancelled)
                    }
                    Err(e) => {
                        let message = match e {
                            CourierError::DataLoad(message) => message,
                            other => other.to_string(),
                        };
                        tracing::error!(keys = self.keys.len(), error = %message, "Lazy map load failed");
                        *state = LoadState::Failed(message.clone());
                        Err(CourierError::DataLoad(message))
                    }
                }
            }
        }
    }
}
