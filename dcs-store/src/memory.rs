//! In-process adapters. Used by tests, and by the desk when no Redis is
//! configured for the local cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dcs_core::cache::CacheResult;
use dcs_core::{CacheError, Collection, DocumentStore, LocalCache, StoreError, StoreResult, WriteBatch, WriteOp};
use serde_json::Value;
use tokio::sync::RwLock;

type DocKey = (Collection, String);

/// Document store held in memory. `set_available(false)` makes every call
/// fail with [`StoreError::Unavailable`], which is how tests simulate a lost
/// connection.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    docs: RwLock<BTreeMap<DocKey, Value>>,
    available: AtomicBool,
    commits: AtomicUsize,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_into(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(existing), Some(fields)) => {
            for (k, v) in fields {
                existing.insert(k.clone(), v.clone());
            }
        }
        _ => *target = patch.clone(),
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            commits: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of batches committed so far
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn count(&self, collection: Collection) -> usize {
        self.docs
            .read()
            .await
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }

    fn check(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        }
    }

    fn apply(docs: &mut BTreeMap<DocKey, Value>, op: &WriteOp) {
        match op {
            WriteOp::Put { collection, id, doc } => {
                docs.insert((*collection, id.clone()), doc.clone());
            }
            WriteOp::Merge { collection, id, patch } => {
                let entry = docs
                    .entry((*collection, id.clone()))
                    .or_insert_with(|| Value::Object(Default::default()));
                merge_into(entry, patch);
            }
            WriteOp::Delete { collection, id } => {
                docs.remove(&(*collection, id.clone()));
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>> {
        self.check()?;
        Ok(self.docs.read().await.get(&(collection, id.to_string())).cloned())
    }

    async fn put(&self, collection: Collection, id: &str, doc: Value) -> StoreResult<()> {
        self.check()?;
        let mut docs = self.docs.write().await;
        Self::apply(
            &mut docs,
            &WriteOp::Put {
                collection,
                id: id.to_string(),
                doc,
            },
        );
        Ok(())
    }

    async fn merge(&self, collection: Collection, id: &str, patch: Value) -> StoreResult<()> {
        self.check()?;
        let mut docs = self.docs.write().await;
        Self::apply(
            &mut docs,
            &WriteOp::Merge {
                collection,
                id: id.to_string(),
                patch,
            },
        );
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        self.check()?;
        self.docs.write().await.remove(&(collection, id.to_string()));
        Ok(())
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        self.check()?;
        Ok(self
            .docs
            .read()
            .await
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Value>> {
        self.check()?;
        Ok(self
            .docs
            .read()
            .await
            .iter()
            .filter(|((c, _), doc)| *c == collection && doc.get(field) == Some(value))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.check()?;
        let mut docs = self.docs.write().await;
        for op in &batch.ops {
            Self::apply(&mut docs, op);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Local cache held in memory; `set_failing(true)` simulates a broken disk.
#[derive(Debug, Default)]
pub struct MemoryLocalCache {
    entries: RwLock<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryLocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> CacheResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Backend("memory cache switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LocalCache for MemoryLocalCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.check()?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.entries.write().await.remove(key);
        Ok(())
    }
}
