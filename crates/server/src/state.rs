use shared::LiveStore;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{document::DocumentStore, relational::RelationalStore};

#[derive(Clone)]
pub struct AppState {
    pub relational: RelationalStore,
    pub documents: DocumentStore,
    /// Store currently serving reads and rental writes. Switches hold the
    /// write lock for their whole migration or reset.
    pub live: Arc<RwLock<LiveStore>>,
}

impl AppState {
    pub fn new(relational: RelationalStore, documents: DocumentStore) -> Self {
        Self {
            relational,
            documents,
            live: Arc::new(RwLock::new(LiveStore::default())),
        }
    }

    pub async fn live_store(&self) -> LiveStore {
        *self.live.read().await
    }
}
