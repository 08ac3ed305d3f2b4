// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Crash Behavior
//
// - All identities are lost on restart
// - The next apply recreates every record set from scratch
//
// ## When to Use
//
// - Testing environments
// - One-shot runs where the caller tracks identity itself

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{StateRecord, StateStore};

/// In-memory state store implementation
///
/// Clones share the same underlying map.
///
/// # Example
///
/// ```rust,no_run
/// use nsupdate_core::resource::RecordSet;
/// use nsupdate_core::state::MemoryStateStore;
/// use nsupdate_core::traits::{StateRecord, StateStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     let record_set = RecordSet::new("example.com.", "www", ["10.0.0.1"], 300)?;
///
///     store.set_record(&record_set.fqdn(), &StateRecord::pending(&record_set)).await?;
///     assert!(store.get_record("www.example.com.").await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, StateRecord>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_record(&self, fqdn: &str) -> Result<Option<StateRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(fqdn).cloned())
    }

    async fn set_record(&self, fqdn: &str, record: &StateRecord) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(fqdn.to_string(), record.clone());
        Ok(())
    }

    async fn delete_record(&self, fqdn: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(fqdn);
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressSet;
    use crate::resource::RecordSet;

    fn record_set(name: &str) -> RecordSet {
        RecordSet::new("example.com.", name, ["10.0.0.1"], 300).unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStateStore::new();
        assert!(store.is_empty().await);

        let www = record_set("www");
        store.set_record(&www.fqdn(), &StateRecord::pending(&www)).await.unwrap();
        assert_eq!(store.len().await, 1);

        let retrieved = store.get_record("www.example.com.").await.unwrap().unwrap();
        assert_eq!(retrieved.ttl, 300);
        assert!(retrieved.addresses.is_empty());

        store.delete_record("www.example.com.").await.unwrap();
        assert!(store.is_empty().await);

        // Deleting an unknown identity is not an error
        tokio_test::assert_ok!(store.delete_record("www.example.com.").await);
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_state() {
        let store = MemoryStateStore::new();
        let clone = store.clone();

        let www = record_set("www");
        let applied = StateRecord::pending(&www).applied(AddressSet::parse(["10.0.0.1"]).unwrap());
        store.set_record(&www.fqdn(), &applied).await.unwrap();

        let seen = clone.get_record(&www.fqdn()).await.unwrap().unwrap();
        assert!(seen.addresses.contains("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_memory_store_list_sorted() {
        let store = MemoryStateStore::new();
        for name in ["www", "api", "mail"] {
            let set = record_set(name);
            store.set_record(&set.fqdn(), &StateRecord::pending(&set)).await.unwrap();
        }

        let records = store.list_records().await.unwrap();
        assert_eq!(
            records,
            vec!["api.example.com.", "mail.example.com.", "www.example.com."]
        );
    }
}
