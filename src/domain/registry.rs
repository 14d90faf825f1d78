//! Concurrent keyed storage with per-row fine-grained locking.
//!
//! [`Registry`] stores rows in a `HashMap` where each row is individually
//! protected by a [`tokio::sync::RwLock`]. This allows concurrent reads of
//! the same row and concurrent writes to different rows, while writes to
//! the same row are serialized. There is no lock spanning rows, so two
//! contests (or two rosters) never contend with each other.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::GatewayError;

/// Central store for one entity kind.
///
/// Uses a `RwLock<HashMap<...>>` for the outer map and per-row
/// `Arc<RwLock<V>>` for fine-grained locking. The outer lock is only held
/// long enough to clone the row handle.
#[derive(Debug)]
pub struct Registry<K, V> {
    rows: RwLock<HashMap<K, Arc<RwLock<V>>>>,
    not_found: fn(K) -> GatewayError,
}

impl<K, V> Registry<K, V>
where
    K: Copy + Eq + Hash + fmt::Display,
{
    /// Creates an empty registry. `not_found` builds the error returned when
    /// a key is missing.
    #[must_use]
    pub fn new(not_found: fn(K) -> GatewayError) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            not_found,
        }
    }

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlreadyExists`] if a row with the same key
    /// is already present.
    pub async fn insert(&self, key: K, value: V) -> Result<Arc<RwLock<V>>, GatewayError> {
        let mut map = self.rows.write().await;
        if map.contains_key(&key) {
            return Err(GatewayError::AlreadyExists(key.to_string()));
        }
        let row = Arc::new(RwLock::new(value));
        map.insert(key, Arc::clone(&row));
        Ok(row)
    }

    /// Inserts or replaces a row. Used when hydrating from storage.
    pub async fn upsert(&self, key: K, value: V) {
        self.rows
            .write()
            .await
            .insert(key, Arc::new(RwLock::new(value)));
    }

    /// Returns the row handle behind its per-row lock.
    ///
    /// # Errors
    ///
    /// Returns the registry's not-found error if no row has the given key.
    pub async fn get(&self, key: K) -> Result<Arc<RwLock<V>>, GatewayError> {
        let map = self.rows.read().await;
        map.get(&key).cloned().ok_or_else(|| (self.not_found)(key))
    }

    /// Returns a clone of every row's current value.
    pub async fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        let handles: Vec<Arc<RwLock<V>>> = self.rows.read().await.values().cloned().collect();
        let mut values = Vec::with_capacity(handles.len());
        for handle in handles {
            values.push(handle.read().await.clone());
        }
        values
    }
}
