/// Collaborators the topology cache talks to: where the destinations
/// document comes from, and where it is persisted between processes.

use crate::core::Endpoint;
use crate::error::OperationError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Fetches the destinations document from the primary
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// `Ok(None)` when the primary has no such document
    async fn fetch_document(&self, primary: &Endpoint, key: &str) -> Result<Option<Value>, OperationError>;
}

/// Persists the last known destinations document, keyed by server hash
pub trait TopologyStore: Send + Sync {
    fn load(&self, server_hash: &str) -> Option<Value>;

    fn save(&self, server_hash: &str, document: &Value);
}

/// Store that remembers nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTopologyStore;

impl TopologyStore for NoopTopologyStore {
    fn load(&self, _server_hash: &str) -> Option<Value> {
        None
    }

    fn save(&self, _server_hash: &str, _document: &Value) {}
}

/// In-process store, mostly useful for sharing a document across clients
#[derive(Debug, Default)]
pub struct MemoryTopologyStore {
    documents: Mutex<HashMap<String, Value>>,
}

impl MemoryTopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}

impl TopologyStore for MemoryTopologyStore {
    fn load(&self, server_hash: &str) -> Option<Value> {
        self.documents.lock().get(server_hash).cloned()
    }

    fn save(&self, server_hash: &str, document: &Value) {
        self.documents
            .lock()
            .insert(server_hash.to_string(), document.clone());
    }
}
