//! Key-value collection seam used by the workload.
//!
//! The workload only needs point reads and writes. [`MemoryCollection`]
//! keeps everything in a map and can be told to fail or drop operations,
//! which is how the verifier itself is exercised.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Collection operation errors. All of them are retried by the workload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectionError {
    /// The backing store could not be reached.
    #[error("collection unavailable: {0}")]
    Unavailable(String),

    /// The operation timed out.
    #[error("collection operation timed out")]
    Timeout,
}

/// Point operations on a key-value collection.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Read a key; `None` if absent.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CollectionError>;

    /// Write a key.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), CollectionError>;

    /// Remove a key. Removing an absent key succeeds.
    async fn delete(&self, key: &[u8]) -> Result<(), CollectionError>;
}

/// In-memory collection with failure injection.
///
/// Clones share the same map.
#[derive(Debug, Default, Clone)]
pub struct MemoryCollection {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    data: HashMap<Vec<u8>, Vec<u8>>,
    puts: u64,
    fail_gets: u32,
    fail_puts: u32,
    lose_put: Option<u64>,
}

impl MemoryCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    /// Successful puts so far, including a lost one.
    pub fn puts(&self) -> u64 {
        self.lock().puts
    }

    /// Fail the next `n` gets with [`CollectionError::Unavailable`].
    pub fn fail_next_gets(&self, n: u32) {
        self.lock().fail_gets = n;
    }

    /// Fail the next `n` puts with [`CollectionError::Unavailable`].
    pub fn fail_next_puts(&self, n: u32) {
        self.lock().fail_puts = n;
    }

    /// Acknowledge the `n`th successful put (1-based) without storing it.
    pub fn lose_put_at(&self, n: u64) {
        self.lock().lose_put = Some(n);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // A panicked holder cannot leave the map half-written.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CollectionError> {
        let mut inner = self.lock();
        if inner.fail_gets > 0 {
            inner.fail_gets -= 1;
            return Err(CollectionError::Unavailable("injected get failure".into()));
        }
        Ok(inner.data.get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), CollectionError> {
        let mut inner = self.lock();
        if inner.fail_puts > 0 {
            inner.fail_puts -= 1;
            return Err(CollectionError::Unavailable("injected put failure".into()));
        }
        inner.puts += 1;
        if inner.lose_put == Some(inner.puts) {
            tracing::debug!("dropping put #{}", inner.puts);
            return Ok(());
        }
        inner.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<(), CollectionError> {
        self.lock().data.remove(key);
        Ok(())
    }
}
